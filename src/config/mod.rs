//! Configuration management.
//!
//! Every setting has a default; a TOML file only needs the keys it changes:
//!
//! ```toml
//! repo_root = "/work/edge-drivers"
//!
//! [logging]
//! format = "json"
//! level = "debug"
//!
//! [tests]
//! interpreter = "lua5.3"
//! workers = 4
//!
//! [deploy]
//! max_retries = 5
//!
//! [stamp]
//! api_version = 20
//! ```

use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Environment variable naming an explicit config file.
pub const CONFIG_PATH_ENV: &str = "DRIVERCI_CONFIG_PATH";

/// Main configuration for driverci.
#[derive(Debug, Clone, Default)]
pub struct DriverCiConfig {
    /// Repository root; detected from git when unset.
    pub repo_root: Option<PathBuf>,
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Lua test runner settings.
    pub tests: TestSettings,
    /// Deploy pipeline settings.
    pub deploy: DeploySettings,
    /// Source stamping settings.
    pub stamp: StampSettings,
}

/// Logging section.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingSettings {
    /// `pretty` or `json`.
    pub format: Option<String>,
    /// Default filter directive (for example `info` or `driverci=debug`).
    pub level: Option<String>,
    /// Optional log file; logs go to stderr when unset.
    pub file: Option<PathBuf>,
}

/// Lua test runner settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestSettings {
    /// Lua interpreter program.
    pub interpreter: String,
    /// Interpreter argument that loads the coverage module.
    pub coverage_flag: String,
    /// Coverage report program run after each covered file.
    pub luacov: String,
    /// `luacov` config, relative to the repository root.
    pub luacov_config: PathBuf,
    /// Cobertura converter run per changed driver.
    pub cobertura: String,
    /// Cobertura converter config, relative to the repository root.
    pub cobertura_config: PathBuf,
    /// Parallel runner pool size; CPU count when unset.
    pub workers: Option<usize>,
}

impl Default for TestSettings {
    fn default() -> Self {
        Self {
            interpreter: "lua".to_string(),
            coverage_flag: "-lluacov".to_string(),
            luacov: "luacov".to_string(),
            luacov_config: PathBuf::from(".circleci/config.luacov"),
            cobertura: "luacov-cobertura".to_string(),
            cobertura_config: PathBuf::from("tools/config.luacov"),
            workers: None,
        }
    }
}

/// Deploy pipeline settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeploySettings {
    /// `Accept` header sent with every API request.
    pub accept: String,
    /// Value of the `X-ST-LOG-LEVEL` header.
    pub api_log_level: String,
    /// Retries after the first attempt for retryable statuses.
    pub max_retries: u32,
    /// Wait before retrying a rate-limited request, in seconds.
    pub rate_limit_delay_secs: u64,
    /// Attempts at building a driver archive.
    pub zip_attempts: u32,
    /// Per-request timeout, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for DeploySettings {
    fn default() -> Self {
        Self {
            accept: "application/vnd.smartthings+json;v=20200810".to_string(),
            api_log_level: "TRACE".to_string(),
            max_retries: 3,
            rate_limit_delay_secs: 10,
            zip_attempts: 5,
            request_timeout_secs: 120,
        }
    }
}

/// Source stamping settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StampSettings {
    /// `min_api_version` value to insert.
    pub api_version: u32,
}

impl Default for StampSettings {
    fn default() -> Self {
        Self { api_version: 19 }
    }
}

/// Configuration file structure (for TOML parsing).
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFile {
    /// Repository root.
    pub repo_root: Option<String>,
    /// Logging section.
    pub logging: Option<LoggingSettings>,
    /// Tests section.
    pub tests: Option<ConfigFileTests>,
    /// Deploy section.
    pub deploy: Option<ConfigFileDeploy>,
    /// Stamp section.
    pub stamp: Option<ConfigFileStamp>,
}

/// Tests section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileTests {
    /// Interpreter program.
    pub interpreter: Option<String>,
    /// Coverage flag.
    pub coverage_flag: Option<String>,
    /// Coverage report program.
    pub luacov: Option<String>,
    /// Coverage report config.
    pub luacov_config: Option<String>,
    /// Cobertura converter program.
    pub cobertura: Option<String>,
    /// Cobertura converter config.
    pub cobertura_config: Option<String>,
    /// Worker count.
    pub workers: Option<usize>,
}

/// Deploy section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileDeploy {
    /// Accept header.
    pub accept: Option<String>,
    /// API log level header.
    pub api_log_level: Option<String>,
    /// Max retries.
    pub max_retries: Option<u32>,
    /// Rate-limit delay.
    pub rate_limit_delay_secs: Option<u64>,
    /// Zip attempts.
    pub zip_attempts: Option<u32>,
    /// Request timeout.
    pub request_timeout_secs: Option<u64>,
}

/// Stamp section in config file.
#[derive(Debug, Deserialize, Default)]
pub struct ConfigFileStamp {
    /// API version.
    pub api_version: Option<u32>,
}

impl DriverCiConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> crate::Result<Self> {
        let contents =
            std::fs::read_to_string(path).map_err(|e| crate::Error::OperationFailed {
                operation: "read_config_file".to_string(),
                cause: format!("{}: {e}", path.display()),
            })?;

        Self::parse(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration TOML.
    pub fn parse(contents: &str) -> crate::Result<Self> {
        let file: ConfigFile =
            toml::from_str(contents).map_err(|e| crate::Error::OperationFailed {
                operation: "parse_config_file".to_string(),
                cause: e.to_string(),
            })?;

        Ok(Self::from_config_file(file))
    }

    /// Loads configuration from the default location.
    ///
    /// Checks `DRIVERCI_CONFIG_PATH`, then `<config dir>/driverci/config.toml`.
    /// Returns default configuration if no config file is found.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load_default() -> crate::Result<Self> {
        Self::load_with(|name| std::env::var(name).ok())
    }

    /// Like [`Self::load_default`], reading environment variables through
    /// `lookup`.
    ///
    /// # Errors
    ///
    /// Returns an error if a config file exists but cannot be parsed.
    pub fn load_with(lookup: impl Fn(&str) -> Option<String>) -> crate::Result<Self> {
        if let Some(path) = lookup(CONFIG_PATH_ENV).filter(|path| !path.is_empty()) {
            return Self::load_from_file(Path::new(&path));
        }

        let Some(base_dirs) = directories::BaseDirs::new() else {
            return Ok(Self::default());
        };
        let platform_config = base_dirs.config_dir().join("driverci").join("config.toml");
        if platform_config.exists() {
            return Self::load_from_file(&platform_config);
        }

        Ok(Self::default())
    }

    /// Converts a `ConfigFile` to `DriverCiConfig`.
    fn from_config_file(file: ConfigFile) -> Self {
        let mut config = Self {
            repo_root: file.repo_root.map(PathBuf::from),
            ..Self::default()
        };

        if let Some(logging) = file.logging {
            config.logging = logging;
        }
        if let Some(tests) = file.tests {
            let target = &mut config.tests;
            if let Some(v) = tests.interpreter {
                target.interpreter = v;
            }
            if let Some(v) = tests.coverage_flag {
                target.coverage_flag = v;
            }
            if let Some(v) = tests.luacov {
                target.luacov = v;
            }
            if let Some(v) = tests.luacov_config {
                target.luacov_config = PathBuf::from(v);
            }
            if let Some(v) = tests.cobertura {
                target.cobertura = v;
            }
            if let Some(v) = tests.cobertura_config {
                target.cobertura_config = PathBuf::from(v);
            }
            target.workers = tests.workers.filter(|workers| *workers > 0);
        }
        if let Some(deploy) = file.deploy {
            let target = &mut config.deploy;
            if let Some(v) = deploy.accept {
                target.accept = v;
            }
            if let Some(v) = deploy.api_log_level {
                target.api_log_level = v;
            }
            if let Some(v) = deploy.max_retries {
                target.max_retries = v;
            }
            if let Some(v) = deploy.rate_limit_delay_secs {
                target.rate_limit_delay_secs = v;
            }
            if let Some(v) = deploy.zip_attempts {
                target.zip_attempts = v.max(1);
            }
            if let Some(v) = deploy.request_timeout_secs {
                target.request_timeout_secs = v;
            }
        }
        if let Some(stamp) = file.stamp {
            if let Some(v) = stamp.api_version {
                config.stamp.api_version = v;
            }
        }

        config
    }

    /// Sets the repository root.
    #[must_use]
    pub fn with_repo_root(mut self, path: impl Into<PathBuf>) -> Self {
        self.repo_root = Some(path.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = DriverCiConfig::new();
        assert!(config.repo_root.is_none());
        assert_eq!(config.tests.interpreter, "lua");
        assert_eq!(config.tests.coverage_flag, "-lluacov");
        assert_eq!(config.deploy.max_retries, 3);
        assert_eq!(config.deploy.rate_limit_delay_secs, 10);
        assert_eq!(config.deploy.zip_attempts, 5);
        assert_eq!(config.stamp.api_version, 19);
    }

    #[test]
    fn test_parse_partial_file() {
        let config = DriverCiConfig::parse(
            r#"
repo_root = "/work/drivers"

[logging]
format = "json"

[tests]
interpreter = "lua5.3"
workers = 4

[deploy]
max_retries = 5
zip_attempts = 0

[stamp]
api_version = 20
"#,
        )
        .expect("config should parse");

        assert_eq!(config.repo_root, Some(PathBuf::from("/work/drivers")));
        assert_eq!(config.logging.format.as_deref(), Some("json"));
        assert_eq!(config.tests.interpreter, "lua5.3");
        assert_eq!(config.tests.luacov, "luacov");
        assert_eq!(config.tests.workers, Some(4));
        assert_eq!(config.deploy.max_retries, 5);
        assert_eq!(config.deploy.zip_attempts, 1);
        assert_eq!(config.deploy.rate_limit_delay_secs, 10);
        assert_eq!(config.stamp.api_version, 20);
    }

    #[test]
    fn test_parse_invalid_toml() {
        let result = DriverCiConfig::parse("[tests\ninterpreter = 1");
        assert!(matches!(result, Err(crate::Error::OperationFailed { .. })));
    }

    #[test]
    fn test_load_with_explicit_path() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("driverci.toml");
        std::fs::write(&path, "[stamp]\napi_version = 21\n").expect("write");
        let path_str = path.to_string_lossy().into_owned();

        let config = DriverCiConfig::load_with(|name| {
            (name == CONFIG_PATH_ENV).then(|| path_str.clone())
        })
        .expect("config should load");
        assert_eq!(config.stamp.api_version, 21);
    }

    #[test]
    fn test_load_with_missing_explicit_path_fails() {
        let result = DriverCiConfig::load_with(|_| Some("/nonexistent/driverci.toml".to_string()));
        assert!(result.is_err());
    }
}
