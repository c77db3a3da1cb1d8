//! Configuration errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    /// A source could not be read or the merged result did not deserialize
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config_crate::ConfigError),

    /// Loaded fine, but the combination of values is unusable
    #[error("Invalid configuration for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },

    #[error("Failed to expand {field}: {reason}")]
    Expansion { field: &'static str, reason: String },

    #[error("Failed to render configuration: {0}")]
    Render(#[from] toml::ser::Error),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field,
            reason: reason.into(),
        }
    }
}
