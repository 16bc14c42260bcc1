use std::fmt;
use ulid::Ulid;

/// Per-invocation correlation token, surfaced in the `X-Request-Id` header
/// and in every result. Opaque to callers; the encoding mixes the process
/// id with a ULID (wall-clock milliseconds plus entropy).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(String);

impl RequestId {
    pub fn generate() -> Self {
        Self(format!("{:x}-{}", std::process::id(), Ulid::new()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
