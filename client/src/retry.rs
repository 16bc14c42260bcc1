use crate::config::RetrySettings;
use crate::error::ClientError;
use std::collections::hash_map::RandomState;
use std::hash::{BuildHasher, Hasher};
use std::thread::sleep;
use std::time::Duration;
use tracing::warn;

/// Runs `f` up to `retry_count + 1` times. Only retryable kinds (network,
/// timeout) are attempted again, with exponential backoff from
/// `retry_delay_ms` plus jitter. Everything else is returned immediately.
pub(crate) fn with_backoff<T, F>(settings: &RetrySettings, mut f: F) -> Result<T, ClientError>
where
    F: FnMut() -> Result<T, ClientError>,
{
    let mut delay = Duration::from_millis(settings.retry_delay_ms);
    let mut last_err = None;
    for attempt in 0..=settings.retry_count {
        if attempt > 0 {
            sleep(jittered(delay));
            delay = delay.saturating_mul(2);
        }
        match f() {
            Ok(value) => return Ok(value),
            Err(err) if err.is_retryable() => {
                warn!(attempt, %err, "retryable request failure");
                last_err = Some(err);
            }
            Err(err) => return Err(err),
        }
    }
    Err(last_err.expect("some error must exist at this point"))
}

/// Adds up to 25% random spread so colliding hosts do not retry in lockstep.
fn jittered(delay: Duration) -> Duration {
    let spread = (delay.as_millis() as u64 / 4).max(1);
    let entropy = RandomState::new().build_hasher().finish();
    delay + Duration::from_millis(entropy % spread)
}
