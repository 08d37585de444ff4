//! Application configuration loaded from environment variables.
//!
//! # Configuration Hierarchy
//!
//! All configuration is loaded from environment variables with sensible defaults
//! for development. A `.env` file in the working directory is read first.
//!
//! # Logging
//!
//! - `LOG_LEVEL`: Minimum record level (default: `info`; unknown values mean `info`)
//! - `LOG_FORMAT`: `json` or `text` (default: `json`; unknown values mean `json`)
//! - `LOG_ADD_SOURCE`: Include `file:line` of the logging call (default: `true`)
//! - `LOG_FILE`: Output path, or `stdout` (default: `stdout`)
//! - `LOG_SET_DEFAULT`: Install the logger as the process default (default: `true`)
//!
//! # Access Log and Memory Reporting
//!
//! - `ACCESS_LOG_NAME`: `name` attribute of access records (default: `access`)
//! - `MEMSTAT_INTERVAL_SECS`: Memory report interval, `0` disables (default: 60)
//! - `MEMSTAT_GC`: Request a reclaim pass before each report (default: `false`)

use std::env;
use std::time::Duration;

use crate::error::{LogError, LogResult};
use crate::format::OutputFormat;
use crate::logger::LoggerBuilder;

/// Application configuration loaded from environment variables.
///
/// # Example
///
/// ```rust,ignore
/// let config = Config::from_env()?;
/// let logger = config.logger_builder().build();
/// ```
#[derive(Debug, Clone)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Server host address (default: "0.0.0.0")
    pub host: String,

    /// Server port (default: 3000)
    pub port: u16,

    // =========================================================================
    // Logger Configuration
    // =========================================================================
    /// Minimum level name (default: "info")
    pub log_level: String,

    /// Record encoding (default: JSON)
    pub log_format: OutputFormat,

    /// Record the source location of each logging call (default: true)
    pub log_add_source: bool,

    /// Output path; "stdout" and "" select standard output
    pub log_file: String,

    /// Replace the process default logger on build (default: true)
    pub log_set_default: bool,

    // =========================================================================
    // Access Log Configuration
    // =========================================================================
    /// Value of the `name` attribute on access records (default: "access")
    pub access_log_name: String,

    // =========================================================================
    // Memory Reporting Configuration
    // =========================================================================
    /// Interval between memory records; zero disables reporting (default: 60s)
    pub memstat_interval: Duration,

    /// Request a reclaim pass before each sample (default: false)
    pub memstat_gc: bool,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `LogError::ConfigError` for malformed values. Unknown
    /// `LOG_LEVEL` and `LOG_FORMAT` names fall back to `info` and `json`.
    pub fn from_env() -> LogResult<Self> {
        // Load an .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let config = Self {
            // Server
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: Self::parse_env("PORT", 3000)?,

            // Logger
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: env::var("LOG_FORMAT")
                .map_or(OutputFormat::Json, |val| OutputFormat::from_name(&val)),
            log_add_source: Self::parse_env("LOG_ADD_SOURCE", true)?,
            log_file: env::var("LOG_FILE").unwrap_or_else(|_| "stdout".to_string()),
            log_set_default: Self::parse_env("LOG_SET_DEFAULT", true)?,

            // Access log
            access_log_name: env::var("ACCESS_LOG_NAME").unwrap_or_else(|_| "access".to_string()),

            // Memory reporting
            memstat_interval: Duration::from_secs(Self::parse_env("MEMSTAT_INTERVAL_SECS", 60)?),
            memstat_gc: Self::parse_env("MEMSTAT_GC", false)?,
        };

        // Validate configuration before returning
        config.validate()?;

        Ok(config)
    }

    fn validate(&self) -> LogResult<()> {
        if self.access_log_name.trim().is_empty() {
            return Err(LogError::ConfigError(
                "ACCESS_LOG_NAME must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Get the server bind address as a string.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Check if periodic memory reporting is enabled.
    pub fn memstat_enabled(&self) -> bool {
        !self.memstat_interval.is_zero()
    }

    /// Logger options described by this configuration.
    pub fn logger_builder(&self) -> LoggerBuilder {
        LoggerBuilder::new()
            .level(&self.log_level)
            .output_format(self.log_format)
            .add_source(self.log_add_source)
            .log_file(self.log_file.as_str())
            .set_default(self.log_set_default)
    }

    /// Parse an environment variable with a default value.
    fn parse_env<T>(name: &str, default: T) -> LogResult<T>
    where
        T: std::str::FromStr,
        T::Err: std::fmt::Display,
    {
        match env::var(name) {
            Ok(val) => val
                .trim()
                .parse()
                .map_err(|e| LogError::ConfigError(format!("Invalid {name}: {e}"))),
            Err(_) => Ok(default),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            // Server
            host: "0.0.0.0".to_string(),
            port: 3000,
            // Logger
            log_level: "info".to_string(),
            log_format: OutputFormat::Json,
            log_add_source: true,
            log_file: "stdout".to_string(),
            log_set_default: true,
            // Access log
            access_log_name: "access".to_string(),
            // Memory reporting
            memstat_interval: Duration::from_secs(60),
            memstat_gc: false,
        }
    }
}
