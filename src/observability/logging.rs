//! Log format and filter resolution.

use crate::config::LoggingSettings;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

/// Filter directive override.
pub const LOG_FILTER_ENV: &str = "DRIVERCI_LOG";
/// Format override (`pretty` or `json`).
pub const LOG_FORMAT_ENV: &str = "DRIVERCI_LOG_FORMAT";
/// Log file override.
pub const LOG_FILE_ENV: &str = "DRIVERCI_LOG_FILE";

const DEFAULT_LEVEL: &str = "warn";
const VERBOSE_LEVEL: &str = "info";

/// Output format for log events.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; unknown names fall back to pretty.
    #[must_use]
    pub fn parse(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("json") {
            Self::Json
        } else {
            Self::Pretty
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Event format.
    pub format: LogFormat,
    /// `EnvFilter` directive string.
    pub filter: String,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: DEFAULT_LEVEL.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Resolves logging from config settings and the process environment.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        Self::from_lookup(settings, verbose, |key| std::env::var(key).ok())
    }

    /// Resolves logging with an injectable environment lookup.
    ///
    /// Precedence for the filter is `DRIVERCI_LOG`, then `RUST_LOG`, then
    /// `info` when verbose, then the configured level, then `warn`.
    pub fn from_lookup<F>(settings: &LoggingSettings, verbose: bool, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let filter = non_empty(LOG_FILTER_ENV)
            .or_else(|| non_empty("RUST_LOG"))
            .or_else(|| verbose.then(|| VERBOSE_LEVEL.to_string()))
            .or_else(|| settings.level.clone())
            .unwrap_or_else(|| DEFAULT_LEVEL.to_string());

        let format = non_empty(LOG_FORMAT_ENV)
            .or_else(|| settings.format.clone())
            .map_or(LogFormat::Pretty, |value| LogFormat::parse(&value));

        let file = non_empty(LOG_FILE_ENV)
            .map(PathBuf::from)
            .or_else(|| settings.file.clone());

        Self {
            format,
            filter,
            file,
        }
    }

    /// Builds the subscriber filter. Invalid directives fall back to `warn`.
    #[must_use]
    pub fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_new(&self.filter).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LEVEL))
    }
}
