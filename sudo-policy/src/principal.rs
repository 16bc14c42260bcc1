//! Acting-principal resolution for a sudo invocation.

use nix::unistd::{getuid, User};
use std::collections::HashMap;
use std::env;
use tracing::debug;

/// Placeholder when no identity source answers. Never sent to the service.
pub const UNKNOWN_PRINCIPAL: &str = "unknown";

const SUDO_USER_ENV_VAR: &str = "SUDO_USER";

/// Preference order: the `user=` entry sudo passes in `user_info`, the
/// `SUDO_USER` environment variable, the password-database name of the real
/// uid, and finally [UNKNOWN_PRINCIPAL].
pub fn resolve_principal(user_info: &HashMap<String, String>) -> String {
    if let Some(user) = user_info.get("user").filter(|user| !user.is_empty()) {
        return user.clone();
    }
    if let Ok(user) = env::var(SUDO_USER_ENV_VAR) {
        if !user.is_empty() {
            return user;
        }
    }
    match User::from_uid(getuid()) {
        Ok(Some(user)) => user.name,
        Ok(None) => UNKNOWN_PRINCIPAL.to_string(),
        Err(err) => {
            debug!(%err, "password database lookup failed");
            UNKNOWN_PRINCIPAL.to_string()
        }
    }
}

/// A principal the service can be asked about.
pub fn principal_is_valid(principal: &str) -> bool {
    !principal.is_empty() && principal != UNKNOWN_PRINCIPAL
}
