//! Configuration related error types

use thiserror::Error;

/// Invalid engine configuration
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// A setting holds a value the engine cannot run with
    #[error("Invalid setting '{setting}': {reason}")]
    InvalidSetting { setting: String, reason: String },
}

impl ConfigError {
    /// Create an invalid setting error
    pub fn invalid(setting: &str, reason: &str) -> Self {
        Self::InvalidSetting {
            setting: setting.to_string(),
            reason: reason.to_string(),
        }
    }
}
