//! SOAP/JMS Transport
//!
//! Exposes web-service endpoints over JMS:
//! - Connection cache keyed by transport URI (directory-created or
//!   host-registered connections)
//! - Endpoint binder registering one SOAP listener per endpoint
//! - Lifecycle controller binding all endpoints at start, releasing
//!   connections at stop
//!
//! # Example
//!
//! ```ignore
//! let transport = SoapJmsTransport::new(config, host, directories);
//! let bound = transport.start(&registry).await?;
//! // ...
//! transport.stop().await;
//! ```

pub mod binder;
pub mod cache;
pub mod endpoint;
pub mod error;
pub mod lifecycle;
pub mod listener;
pub mod poller;

pub use binder::{listener_name, resolve_destination, EndpointBinder, EndpointBinding};
pub use cache::{CacheStats, ConnectionCache, ConnectionOrigin, ANONYMOUS_CONNECTION_PREFIX};
pub use endpoint::{
    EndpointDefinition, EndpointRegistry, InvocationAdapter, SoapRequest, SoapResponse,
    StaticEndpointRegistry,
};
pub use error::{Error, Result};
pub use lifecycle::{BoundEndpoints, SoapJmsTransport, SUPPORTED_BINDINGS};
pub use listener::{ReplyProperties, SoapJmsListener};
pub use poller::PollerRegistry;
