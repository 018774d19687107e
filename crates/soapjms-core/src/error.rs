//! Error types for the transport URI model and configuration

use thiserror::Error;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Core error types
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The locator does not match the `jms:<variant>:<destination>` shape
    #[error("malformed locator {uri}: {reason}")]
    MalformedLocator { uri: String, reason: String },

    /// A configuration value exists but cannot be interpreted
    #[error("invalid configuration value for {key}: {value}")]
    InvalidConfig { key: String, value: String },

    /// A configuration document could not be read
    #[error("configuration parse error: {0}")]
    ConfigParse(String),
}

impl Error {
    pub(crate) fn malformed(uri: &str, reason: impl Into<String>) -> Self {
        Error::MalformedLocator {
            uri: uri.to_string(),
            reason: reason.into(),
        }
    }
}
