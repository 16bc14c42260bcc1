use crate::config::HttpSettings;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct HttpConfig {
    pub(crate) timeout: Duration,
    pub(crate) conn_timeout: Duration,
    pub(crate) verify_tls: bool,
    pub(crate) user_agent: String,
}

impl HttpConfig {
    pub fn new(timeout: Duration, conn_timeout: Duration, user_agent: impl Into<String>) -> Self {
        Self {
            timeout,
            conn_timeout,
            verify_tls: true,
            user_agent: user_agent.into(),
        }
    }

    pub fn without_tls_verification(self) -> Self {
        Self {
            verify_tls: false,
            ..self
        }
    }
}

impl From<&HttpSettings> for HttpConfig {
    fn from(settings: &HttpSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout),
            conn_timeout: Duration::from_secs(settings.connect_timeout),
            verify_tls: settings.verify_tls(),
            user_agent: settings.user_agent.clone(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self::from(&HttpSettings::default())
    }
}
