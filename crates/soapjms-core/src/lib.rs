//! SOAP/JMS Core
//!
//! Leaf types shared by the messaging contract and the transport binding:
//! - Transport URI model (`jms:<variant>:<destination>?params`)
//! - Immutable dotted-key configuration views
//! - Cache sizing configuration

pub mod cache_config;
pub mod config;
pub mod error;
pub mod uri;

pub use cache_config::CacheConfig;
pub use config::Configuration;
pub use error::{Error, Result};
pub use uri::{DeliveryMode, DirectoryEnvironment, LookupVariant, TransportUri};

/// Binding identifier of the W3C SOAP/JMS binding
pub const SOAP_JMS_BINDING: &str = "http://www.w3.org/2010/soapjms/";
