//! Process-wide logging setup.
//!
//! Levels follow the 8 syslog names so that documents written for the host
//! frameworks read naturally; they collapse onto `tracing` levels for
//! filtering. Only this workspace's crates are enabled at the configured
//! level, logs from external crates stay off.

mod syslog;

use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use std::sync::OnceLock;
use thiserror::Error;
use tracing::debug;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Directive;
use tracing_subscriber::EnvFilter;

pub use self::syslog::Syslog;

const LOGGING_ENABLED_CRATES: &[&str] = &[
    "sgnl_client",
    "sgnl_sudo_policy",
    "sgnl_pam_account",
    "device_id",
];

const SYSLOG_IDENT: &str = "sgnl";

#[derive(Error, Debug)]
pub enum LoggingError {
    #[error("invalid directive `{directive}`: {err}")]
    InvalidDirective { directive: String, err: String },
    #[error("system log unavailable: `{0}`")]
    SyslogUnavailable(String),
}

/// Minimum level, syslog-aligned. Severities 0 (emergency) through
/// 7 (debug).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Emergency,
    Alert,
    Critical,
    Error,
    Warning,
    Notice,
    #[default]
    Info,
    Debug,
}

impl LogLevel {
    pub fn severity(&self) -> u8 {
        match self {
            LogLevel::Emergency => 0,
            LogLevel::Alert => 1,
            LogLevel::Critical => 2,
            LogLevel::Error => 3,
            LogLevel::Warning => 4,
            LogLevel::Notice => 5,
            LogLevel::Info => 6,
            LogLevel::Debug => 7,
        }
    }

    /// The tracing filter admitting exactly the messages this level admits.
    /// The syslog severities above `error` all collapse onto `error`.
    pub fn as_level_filter(&self) -> LevelFilter {
        match self {
            LogLevel::Emergency | LogLevel::Alert | LogLevel::Critical | LogLevel::Error => {
                LevelFilter::ERROR
            }
            LogLevel::Warning => LevelFilter::WARN,
            LogLevel::Notice | LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
        }
    }

    pub fn admits_debug(&self) -> bool {
        matches!(self, LogLevel::Debug)
    }

    fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Emergency => "emergency",
            LogLevel::Alert => "alert",
            LogLevel::Critical => "critical",
            LogLevel::Error => "error",
            LogLevel::Warning => "warning",
            LogLevel::Notice => "notice",
            LogLevel::Info => "info",
            LogLevel::Debug => "debug",
        }
    }
}

#[derive(Error, Debug)]
#[error("unknown log level `{0}`")]
pub struct ParseLogLevelError(String);

impl FromStr for LogLevel {
    type Err = ParseLogLevelError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.to_ascii_lowercase().as_str() {
            "emergency" | "emerg" => Ok(LogLevel::Emergency),
            "alert" => Ok(LogLevel::Alert),
            "critical" | "crit" => Ok(LogLevel::Critical),
            "error" | "err" => Ok(LogLevel::Error),
            "warning" | "warn" => Ok(LogLevel::Warning),
            "notice" => Ok(LogLevel::Notice),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            other => Err(ParseLogLevelError(other.to_string())),
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for LogLevel {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = String::deserialize(deserializer)?;
        value.parse().map_err(serde::de::Error::custom)
    }
}

impl Serialize for LogLevel {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
pub enum LogDestination {
    #[default]
    #[serde(rename = "stderr")]
    Stderr,
    #[serde(rename = "syslog")]
    Syslog,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoggingConfig {
    pub level: LogLevel,
    pub destination: LogDestination,
    /// Include the emitting module target in each line.
    pub structured: bool,
    pub timestamps: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: LogLevel::default(),
            destination: LogDestination::default(),
            structured: true,
            timestamps: true,
        }
    }
}

static INITIALIZED: OnceLock<()> = OnceLock::new();

impl LoggingConfig {
    /// Installs the global subscriber. The subscriber lives for the rest of
    /// the process; repeated calls (and calls from a process that already
    /// installed one) are no-ops, so clients may be created and destroyed
    /// freely while logging stays available.
    pub fn try_init(&self) -> Result<(), LoggingError> {
        if INITIALIZED.get().is_some() {
            return Ok(());
        }
        let filter = self.logging_filter()?;

        let install_result = match self.destination {
            LogDestination::Stderr => {
                let builder = tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(self.structured)
                    .with_ansi(false);
                if self.timestamps {
                    builder.try_init()
                } else {
                    builder.without_time().try_init()
                }
            }
            LogDestination::Syslog => match Syslog::connect(SYSLOG_IDENT) {
                // The syslog daemon stamps its own timestamps.
                Ok(writer) => tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(writer)
                    .with_target(self.structured)
                    .with_ansi(false)
                    .without_time()
                    .try_init(),
                // A host without a log socket still gets its decisions;
                // diagnostics fall back to standard error.
                Err(_) => tracing_subscriber::fmt()
                    .with_env_filter(filter)
                    .with_writer(std::io::stderr)
                    .with_target(self.structured)
                    .with_ansi(false)
                    .try_init(),
            },
        };

        // An Err here means another subscriber was installed first (test
        // harness, embedding host); it keeps precedence.
        if install_result.is_ok() {
            debug!("logging initialized");
        }
        let _ = INITIALIZED.set(());
        Ok(())
    }

    fn logging_filter(&self) -> Result<EnvFilter, LoggingError> {
        let level = self.level.as_level_filter().to_string().to_lowercase();

        let mut env_filter = EnvFilter::builder()
            .with_default_directive(LevelFilter::OFF.into()) // Disables logs for any crate
            .parse_lossy("");
        // Enables and sets up the log level for known crates
        for crate_name in LOGGING_ENABLED_CRATES {
            let directive = format!("{}={}", crate_name, &level);
            env_filter = env_filter.add_directive(Self::logging_directive(directive.as_str())?)
        }
        Ok(env_filter)
    }

    fn logging_directive(directive: &str) -> Result<Directive, LoggingError> {
        directive
            .parse::<Directive>()
            .map_err(|err| LoggingError::InvalidDirective {
                directive: directive.to_string(),
                err: err.to_string(),
            })
    }
}
