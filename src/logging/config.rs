//! Logging configuration

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

const VALID_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level for this crate when `RUST_LOG` is unset (trace, debug, info, warn, error)
    pub global_level: String,

    pub console_output: bool,

    /// Directory for daily-rolling JSON logs (None = no file logging)
    pub log_directory: Option<PathBuf>,

    /// Include file and line in console output
    pub include_file_location: bool,

    /// Level for the `algorithms` module
    pub algorithm_level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            global_level: "info".to_string(),
            console_output: true,
            log_directory: None,
            include_file_location: false,
            algorithm_level: "info".to_string(),
        }
    }
}

impl LoggingConfig {
    /// Verbose console and file logging
    pub fn development() -> Self {
        Self {
            global_level: "debug".to_string(),
            console_output: true,
            log_directory: Some(PathBuf::from("logs")),
            include_file_location: true,
            algorithm_level: "trace".to_string(),
        }
    }

    /// Warnings only, to files
    pub fn production() -> Self {
        Self {
            global_level: "warn".to_string(),
            console_output: false,
            log_directory: Some(PathBuf::from("/var/log/rigid-align")),
            include_file_location: false,
            algorithm_level: "info".to_string(),
        }
    }

    pub fn validate(&self) -> Result<(), String> {
        for (field, level) in [
            ("global_level", &self.global_level),
            ("algorithm_level", &self.algorithm_level),
        ] {
            if !VALID_LEVELS.contains(&level.as_str()) {
                return Err(format!(
                    "Invalid {}: {}. Must be one of: {:?}",
                    field, level, VALID_LEVELS
                ));
            }
        }

        if let Some(ref log_dir) = self.log_directory {
            if let Some(parent) = log_dir.parent() {
                if !parent.as_os_str().is_empty() && !parent.exists() {
                    return Err(format!("Log directory parent does not exist: {:?}", parent));
                }
            }
        }

        Ok(())
    }

    /// Filter directive used when `RUST_LOG` is not set
    pub fn filter_directive(&self) -> String {
        let krate = env!("CARGO_PKG_NAME").replace('-', "_");
        let level = |l: &str| if VALID_LEVELS.contains(&l) { l.to_string() } else { "info".to_string() };
        format!(
            "{krate}={},{krate}::algorithms={}",
            level(&self.global_level),
            level(&self.algorithm_level)
        )
    }
}
