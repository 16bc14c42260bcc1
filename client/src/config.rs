//! SGNL configuration document: discovery, parsing, validation.
//!
//! The configuration is a single JSON document, `/etc/sgnl/config.json` by
//! default. Unrecognized keys are ignored so that documents written for
//! newer revisions keep loading. Loading is deterministic: the same document
//! always produces the same [SgnlConfig].

pub mod token;

use crate::logging::LogLevel;
use fs::file::reader::FileReader;
use fs::LocalFile;
use serde::{Deserialize, Deserializer, Serialize};
use std::env;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub use self::token::ApiToken;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/sgnl/config.json";
/// Overrides the default configuration path. Intended for testing only.
pub const CONFIG_PATH_ENV_VAR: &str = "SGNL_CONFIG_PATH";

pub const DEFAULT_USER_AGENT: &str = "SGNL-Client/1.0";

const TIMEOUT_BOUNDS: (u64, u64) = (1, 300);
const CONNECT_TIMEOUT_BOUNDS: (u64, u64) = (1, 60);
const RETRY_COUNT_MAX: u32 = 5;
const RETRY_DELAY_MS_MAX: u64 = 10_000;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("configuration file not found: `{0}`")]
    FileNotFound(String),

    #[error("error reading configuration: `{0}`")]
    Read(String),

    #[error("malformed configuration document: `{0}`")]
    Malformed(String),

    #[error("missing required configuration field: `{0}`")]
    MissingField(&'static str),

    #[error("missing configuration section: `{0}`")]
    MissingSection(&'static str),

    #[error("`{field}` out of bounds: {value} (allowed {min}..={max})")]
    OutOfRange {
        field: &'static str,
        value: u64,
        min: u64,
        max: u64,
    },

    #[error("logging initialization failed: `{0}`")]
    Logging(String),
}

/// Attribute of a command asset used as the query identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum CommandAttribute {
    #[default]
    #[serde(rename = "id")]
    Id,
    #[serde(rename = "name")]
    Name,
    #[serde(rename = "displayName")]
    DisplayName,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HttpSettings {
    pub timeout: u64,
    pub connect_timeout: u64,
    pub ssl_verify_peer: bool,
    pub ssl_verify_host: bool,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout: 10,
            connect_timeout: 3,
            ssl_verify_peer: true,
            ssl_verify_host: true,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpSettings {
    /// TLS verification collapses to a single toggle: the rustls backend has
    /// no hostname-only switch, so disabling either knob disables both.
    pub fn verify_tls(&self) -> bool {
        self.ssl_verify_peer && self.ssl_verify_host
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SudoSettings {
    pub access_msg: bool,
    pub command_attribute: CommandAttribute,
    pub batch_evaluation: bool,
}

impl Default for SudoSettings {
    fn default() -> Self {
        Self {
            access_msg: true,
            command_attribute: CommandAttribute::Id,
            batch_evaluation: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RetrySettings {
    pub retry_count: u32,
    pub retry_delay_ms: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            retry_count: 0,
            retry_delay_ms: 250,
        }
    }
}

/// Validated configuration. Accessors are read-only; mutation is reserved to
/// the in-crate builder override path.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SgnlConfig {
    pub(crate) api_url: String,
    pub(crate) api_token: ApiToken,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) tenant: Option<String>,
    pub(crate) debug: bool,
    pub(crate) log_level: LogLevel,
    pub(crate) http: HttpSettings,
    pub(crate) sudo: SudoSettings,
    pub(crate) retry: RetrySettings,
}

impl SgnlConfig {
    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn api_token(&self) -> &ApiToken {
        &self.api_token
    }

    pub fn tenant(&self) -> Option<&str> {
        self.tenant.as_deref()
    }

    pub fn debug(&self) -> bool {
        self.debug
    }

    /// Effective minimum level: the `debug` flag admits debug logging even
    /// when `log_level` is stricter.
    pub fn log_level(&self) -> LogLevel {
        if self.debug {
            LogLevel::Debug
        } else {
            self.log_level
        }
    }

    pub fn http(&self) -> &HttpSettings {
        &self.http
    }

    pub fn sudo(&self) -> &SudoSettings {
        &self.sudo
    }

    pub fn retry(&self) -> &RetrySettings {
        &self.retry
    }

    /// Service origin. A scheme in `api_url` is honored verbatim (local
    /// deployments); otherwise the tenant is prepended as a subdomain of the
    /// HTTPS origin.
    pub fn origin(&self) -> String {
        if self.api_url.contains("://") {
            return self.api_url.trim_end_matches('/').to_string();
        }
        match &self.tenant {
            Some(tenant) => format!("https://{tenant}.{}", self.api_url),
            None => format!("https://{}", self.api_url),
        }
    }

    pub(crate) fn validate(&self) -> Result<(), ConfigError> {
        if self.api_url.is_empty() {
            return Err(ConfigError::MissingField("api_url"));
        }
        if self.api_token.is_empty() {
            return Err(ConfigError::MissingField("api_token"));
        }
        check_bounds("http.timeout", self.http.timeout, TIMEOUT_BOUNDS)?;
        check_bounds(
            "http.connect_timeout",
            self.http.connect_timeout,
            CONNECT_TIMEOUT_BOUNDS,
        )?;
        check_bounds(
            "retry.retry_count",
            u64::from(self.retry.retry_count),
            (0, u64::from(RETRY_COUNT_MAX)),
        )?;
        check_bounds(
            "retry.retry_delay_ms",
            self.retry.retry_delay_ms,
            (0, RETRY_DELAY_MS_MAX),
        )?;
        Ok(())
    }
}

fn check_bounds(
    field: &'static str,
    value: u64,
    (min, max): (u64, u64),
) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            field,
            value,
            min,
            max,
        });
    }
    Ok(())
}

/// Booleans in the document may be literal or the strings "true"/"1"
/// ("false"/"0" for completeness).
fn flexible_bool<'de, D>(deserializer: D) -> Result<Option<bool>, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum BoolOrString {
        Bool(bool),
        Str(String),
    }

    match Option::<BoolOrString>::deserialize(deserializer)? {
        None => Ok(None),
        Some(BoolOrString::Bool(b)) => Ok(Some(b)),
        Some(BoolOrString::Str(s)) => match s.as_str() {
            "true" | "1" => Ok(Some(true)),
            "false" | "0" => Ok(Some(false)),
            other => Err(serde::de::Error::custom(format!(
                "invalid boolean value `{other}`"
            ))),
        },
    }
}

#[derive(Debug, Default, Deserialize)]
struct RawConfig {
    #[serde(default)]
    api_url: Option<String>,
    #[serde(default)]
    api_token: Option<ApiToken>,
    /// Legacy alias for `api_token`, honored at second preference.
    #[serde(default)]
    protected_system_token: Option<ApiToken>,
    #[serde(default)]
    tenant: Option<String>,
    #[serde(default, deserialize_with = "flexible_bool")]
    debug: Option<bool>,
    /// Legacy top-level override for `http.timeout`.
    #[serde(default)]
    timeout_seconds: Option<u64>,
    #[serde(default)]
    log_level: Option<LogLevel>,
    #[serde(default)]
    http: Option<RawHttpSettings>,
    #[serde(default)]
    sudo: Option<RawSudoSettings>,
    #[serde(default)]
    retry: Option<RawRetrySettings>,
}

#[derive(Debug, Default, Deserialize)]
struct RawHttpSettings {
    #[serde(default)]
    timeout: Option<u64>,
    #[serde(default)]
    connect_timeout: Option<u64>,
    #[serde(default, deserialize_with = "flexible_bool")]
    ssl_verify_peer: Option<bool>,
    #[serde(default, deserialize_with = "flexible_bool")]
    ssl_verify_host: Option<bool>,
    #[serde(default)]
    user_agent: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct RawSudoSettings {
    #[serde(default, deserialize_with = "flexible_bool")]
    access_msg: Option<bool>,
    #[serde(default)]
    command_attribute: Option<CommandAttribute>,
    #[serde(default, deserialize_with = "flexible_bool")]
    batch_evaluation: Option<bool>,
}

#[derive(Debug, Default, Deserialize)]
struct RawRetrySettings {
    #[serde(default)]
    retry_count: Option<u32>,
    #[serde(default)]
    retry_delay_ms: Option<u64>,
}

impl RawConfig {
    fn resolve(self) -> Result<SgnlConfig, ConfigError> {
        let api_url = self
            .api_url
            .filter(|url| !url.is_empty())
            .ok_or(ConfigError::MissingField("api_url"))?;
        // `api_token` takes precedence over the legacy alias.
        let api_token = self
            .api_token
            .or(self.protected_system_token)
            .filter(|token| !token.is_empty())
            .ok_or(ConfigError::MissingField("api_token"))?;

        let http_defaults = HttpSettings::default();
        let raw_http = self.http.unwrap_or_default();
        let http = HttpSettings {
            timeout: raw_http
                .timeout
                .or(self.timeout_seconds)
                .unwrap_or(http_defaults.timeout),
            connect_timeout: raw_http
                .connect_timeout
                .unwrap_or(http_defaults.connect_timeout),
            ssl_verify_peer: raw_http
                .ssl_verify_peer
                .unwrap_or(http_defaults.ssl_verify_peer),
            ssl_verify_host: raw_http
                .ssl_verify_host
                .unwrap_or(http_defaults.ssl_verify_host),
            user_agent: raw_http.user_agent.unwrap_or(http_defaults.user_agent),
        };

        let sudo_defaults = SudoSettings::default();
        let raw_sudo = self.sudo.unwrap_or_default();
        let sudo = SudoSettings {
            access_msg: raw_sudo.access_msg.unwrap_or(sudo_defaults.access_msg),
            command_attribute: raw_sudo
                .command_attribute
                .unwrap_or(sudo_defaults.command_attribute),
            batch_evaluation: raw_sudo
                .batch_evaluation
                .unwrap_or(sudo_defaults.batch_evaluation),
        };

        let retry_defaults = RetrySettings::default();
        let raw_retry = self.retry.unwrap_or_default();
        let retry = RetrySettings {
            retry_count: raw_retry.retry_count.unwrap_or(retry_defaults.retry_count),
            retry_delay_ms: raw_retry
                .retry_delay_ms
                .unwrap_or(retry_defaults.retry_delay_ms),
        };

        Ok(SgnlConfig {
            api_url,
            api_token,
            tenant: self.tenant.filter(|tenant| !tenant.is_empty()),
            debug: self.debug.unwrap_or(false),
            log_level: self.log_level.unwrap_or_default(),
            http,
            sudo,
            retry,
        })
    }
}

/// Resolves the configuration path: explicit argument, then the environment
/// override, then the fixed default.
pub fn discover_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }
    if let Ok(path) = env::var(CONFIG_PATH_ENV_VAR) {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    PathBuf::from(DEFAULT_CONFIG_PATH)
}

pub struct ConfigLoader<F = LocalFile>
where
    F: FileReader,
{
    file_reader: F,
    strict_validation: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new(LocalFile)
    }
}

impl<F> ConfigLoader<F>
where
    F: FileReader,
{
    pub fn new(file_reader: F) -> Self {
        Self {
            file_reader,
            strict_validation: false,
        }
    }

    /// Requires the optional `http` and `sudo` sections to be spelled out.
    /// Required fields are required either way.
    pub fn with_strict_validation(self) -> Self {
        Self {
            strict_validation: true,
            ..self
        }
    }

    pub fn load(&self) -> Result<SgnlConfig, ConfigError> {
        self.load_from(&discover_path(None))
    }

    pub fn load_from(&self, path: &Path) -> Result<SgnlConfig, ConfigError> {
        let contents = self.file_reader.read(path).map_err(|err| {
            if err.kind() == io::ErrorKind::NotFound {
                ConfigError::FileNotFound(path.display().to_string())
            } else {
                ConfigError::Read(err.to_string())
            }
        })?;
        self.parse(&contents)
    }

    pub fn parse(&self, contents: &str) -> Result<SgnlConfig, ConfigError> {
        let raw: RawConfig = serde_json::from_str(contents)
            .map_err(|err| ConfigError::Malformed(err.to_string()))?;
        if self.strict_validation {
            if raw.http.is_none() {
                return Err(ConfigError::MissingSection("http"));
            }
            if raw.sudo.is_none() {
                return Err(ConfigError::MissingSection("sudo"));
            }
        }
        let config = raw.resolve()?;
        config.validate()?;
        Ok(config)
    }
}
