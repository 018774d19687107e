//! Messaging error types

use thiserror::Error;

pub type Result<T> = std::result::Result<T, MessagingError>;

/// Errors raised by the host messaging subsystem
///
/// Cloneable so a single failure can be handed to several waiters.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MessagingError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    #[error("connection closed: {0}")]
    ConnectionClosed(String),

    #[error("session closed")]
    SessionClosed,

    #[error("session error: {0}")]
    Session(String),

    #[error("name not found in directory: {0}")]
    NameNotFound(String),

    #[error("directory entry {0} is not a connection factory")]
    NotAConnectionFactory(String),

    #[error("directory entry {0} is not a destination")]
    NotADestination(String),

    #[error("directory unavailable: {0}")]
    DirectoryUnavailable(String),

    #[error("invalid selector: {0}")]
    InvalidSelector(String),

    #[error("connection already registered: {0}")]
    DuplicateConnection(String),

    #[error("message listener already registered: {0}")]
    DuplicateListener(String),

    #[error("unknown connection: {0}")]
    UnknownConnection(String),

    #[error("invalid connection definition: {0}")]
    InvalidDefinition(String),

    #[error("transaction error: {0}")]
    Transaction(String),

    #[error("messaging error: {0}")]
    Other(String),
}

impl From<soapjms_core::Error> for MessagingError {
    fn from(e: soapjms_core::Error) -> Self {
        MessagingError::InvalidDefinition(e.to_string())
    }
}
