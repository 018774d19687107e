//! Transport binding error types

use soapjms_messaging::MessagingError;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised while resolving connections and binding endpoints
///
/// `Clone` so that one failed connection load can be reported to every
/// caller that was waiting on it.
#[derive(Error, Debug, Clone)]
pub enum Error {
    /// Locator or configuration could not be interpreted
    #[error(transparent)]
    Locator(#[from] soapjms_core::Error),

    #[error("missing {parameter} parameter for JMS URI {uri}")]
    MissingParameter { parameter: &'static str, uri: String },

    #[error("unsupported lookup variant {variant} for JMS URI {uri}")]
    UnsupportedLookupVariant { variant: String, uri: String },

    #[error("unable to resolve connection for JMS URI {uri}: {reason}")]
    ConnectionResolutionFailed { uri: String, reason: String },

    #[error("unable to create connection for JMS URI {uri}")]
    ConnectionFailed {
        uri: String,
        #[source]
        source: MessagingError,
    },

    #[error("directory lookup failed for JMS URI {uri}")]
    Directory {
        uri: String,
        #[source]
        source: MessagingError,
    },

    #[error("unable to create JMS session for endpoint {endpoint}")]
    SessionCreationFailed {
        endpoint: String,
        #[source]
        source: MessagingError,
    },

    #[error("unable to create JMS destination for endpoint {endpoint}")]
    DestinationResolutionFailed {
        endpoint: String,
        #[source]
        source: MessagingError,
    },

    #[error("unable to register message listener {listener}")]
    ListenerRegistrationFailed {
        listener: String,
        #[source]
        source: MessagingError,
    },

    #[error("unknown message poller {name} for listener {listener}")]
    InvalidPollerClass { name: String, listener: String },

    #[error("unable to create invocation adapter for endpoint {endpoint}: {reason}")]
    AdapterCreationFailed { endpoint: String, reason: String },

    #[error("invocation failed: {0}")]
    Invocation(String),

    #[error("unable to roll back message {message_id}")]
    RollbackFailed {
        message_id: String,
        #[source]
        source: MessagingError,
    },

    /// Binding of one endpoint failed; aborts startup
    #[error("unable to bind WS endpoint {service}-{port}")]
    Endpoint {
        service: String,
        port: String,
        #[source]
        source: Box<Error>,
    },

    #[error("transport already started")]
    AlreadyStarted,

    #[error(transparent)]
    Messaging(#[from] MessagingError),
}
