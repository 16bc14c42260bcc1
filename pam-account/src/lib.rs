//! # SGNL PAM account module
//!
//! Account-management hook for PAM stacks: on session establishment the
//! module asks the SGNL access service whether the principal may use the
//! service, and maps the answer onto the framework's accept/reject codes.
//! The decision core is plain Rust; the libpam binding lives in [ffi]
//! behind the `pam` feature.

#[cfg(feature = "pam")]
pub mod ffi;

use sgnl_client::access::AccessEvaluator;
use sgnl_client::logging::LogDestination;
use sgnl_client::{ClientBuilder, Decision, SgnlClient};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Linux-PAM return codes this module produces. The values are part of the
/// loader contract and must not drift.
pub const PAM_SUCCESS: i32 = 0;
pub const PAM_PERM_DENIED: i32 = 6;
pub const PAM_AUTHINFO_UNAVAIL: i32 = 9;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccountVerdict {
    Success,
    PermDenied,
    AuthInfoUnavailable,
}

impl AccountVerdict {
    pub fn pam_code(&self) -> i32 {
        match self {
            AccountVerdict::Success => PAM_SUCCESS,
            AccountVerdict::PermDenied => PAM_PERM_DENIED,
            AccountVerdict::AuthInfoUnavailable => PAM_AUTHINFO_UNAVAIL,
        }
    }
}

/// The account decision: is `user` allowed on `service`. Absent identity
/// information and every client failure map to `AuthInfoUnavailable`; the
/// module never grants on a broken pathway.
pub fn account_decision<E>(
    evaluator: &E,
    user: Option<&str>,
    service: Option<&str>,
    rhost: Option<&str>,
) -> AccountVerdict
where
    E: AccessEvaluator,
{
    let Some(user) = user.filter(|user| !user.is_empty()) else {
        warn!("account check without a user");
        return AccountVerdict::AuthInfoUnavailable;
    };
    let Some(service) = service.filter(|service| !service.is_empty()) else {
        warn!(user, "account check without a service");
        return AccountVerdict::AuthInfoUnavailable;
    };
    debug!(user, service, rhost, "account management check");

    match evaluator.check_access(user, service, None) {
        Ok(Decision::Allowed) => {
            info!(user, service, "account allowed");
            AccountVerdict::Success
        }
        Ok(Decision::Denied) => {
            info!(user, service, "account denied");
            AccountVerdict::PermDenied
        }
        Err(err) => {
            warn!(user, service, %err, "account check unavailable");
            AccountVerdict::AuthInfoUnavailable
        }
    }
}

static PROCESS_CLIENT: Mutex<Option<Arc<SgnlClient>>> = Mutex::new(None);

/// The process-wide client, created on first use. A failed initialization
/// is not cached: the next hook invocation tries again (the configuration
/// may have been fixed in between).
fn process_client() -> Option<Arc<SgnlClient>> {
    let mut guard = match PROCESS_CLIENT.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    if guard.is_none() {
        match ClientBuilder::new()
            .with_log_destination(LogDestination::Syslog)
            .build()
        {
            Ok(client) => *guard = Some(Arc::new(client)),
            Err(err) => {
                warn!(%err, "client initialization failed");
                return None;
            }
        }
    }
    guard.clone()
}

/// Hook entry used by the FFI layer (and by tests): resolves the process
/// client lazily, then decides.
pub fn account_check(
    user: Option<&str>,
    service: Option<&str>,
    rhost: Option<&str>,
) -> AccountVerdict {
    match process_client() {
        Some(client) => account_decision(client.as_ref(), user, service, rhost),
        None => AccountVerdict::AuthInfoUnavailable,
    }
}

/// Drops the process client. Called from the module-unload path; the token
/// buffer is zeroed when the client drops.
pub fn cleanup() {
    let mut guard = match PROCESS_CLIENT.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    };
    *guard = None;
}
