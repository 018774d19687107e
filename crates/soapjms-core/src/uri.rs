//! Transport URI parsing
//!
//! SOAP/JMS endpoint locators follow this format:
//! ```text
//! jms:<variant>:<destination>[?name=value[&name=value]...]
//! jms:queue:orders.requests?connectionName=broker1
//! jms:jndi:jms/OrdersQueue?jndiConnectionFactoryName=jms/Factory&jndiURL=memory://local
//! ```
//!
//! The variant says how the connection is located:
//! - `jndi` looks a connection factory up in a directory service and creates a connection
//! - `queue` and `topic` reuse a connection already registered under `connectionName`
//!
//! Unknown variants parse fine and are kept verbatim; they are rejected by
//! whoever has to resolve them.

use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use url::Url;

use crate::config::Configuration;
use crate::{Error, Result};

/// URI scheme of SOAP/JMS locators
pub const SCHEME: &str = "jms";

/// Directory name of the connection factory (JNDI variant)
pub const JNDI_CONNECTION_FACTORY_NAME: &str = "jndiConnectionFactoryName";
/// Name of a connection registered with the messaging host
pub const CONNECTION_NAME: &str = "connectionName";
/// Directory context factory (JNDI variant)
pub const JNDI_INITIAL_CONTEXT_FACTORY: &str = "jndiInitialContextFactory";
/// Directory provider URL (JNDI variant)
pub const JNDI_URL: &str = "jndiURL";
/// Prefix of arbitrary directory environment properties
pub const JNDI_PROPERTY_PREFIX: &str = "jndi-";
/// Destination replies are sent to when a request carries none
pub const REPLY_TO_NAME: &str = "replyToName";
pub const TARGET_SERVICE: &str = "targetService";
pub const DELIVERY_MODE: &str = "deliveryMode";
pub const TIME_TO_LIVE: &str = "timeToLive";
pub const PRIORITY: &str = "priority";

/// Characters escaped when rendering a locator component
const COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'"')
    .add(b'#')
    .add(b'%')
    .add(b'&')
    .add(b'<')
    .add(b'=')
    .add(b'>')
    .add(b'?')
    .add(b'`');

/// The variant token additionally escapes the separator and `/`
const VARIANT: &AsciiSet = &COMPONENT.add(b':').add(b'/');

/// How a transport URI locates its connection
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum LookupVariant {
    /// Directory lookup of a connection factory
    Jndi,
    /// Named connection, queue destination
    Queue,
    /// Named connection, topic destination
    Topic,
    /// Unrecognised token, preserved as written
    Other(String),
}

impl LookupVariant {
    fn from_token(token: &str) -> Self {
        match token {
            "jndi" => LookupVariant::Jndi,
            "queue" => LookupVariant::Queue,
            "topic" => LookupVariant::Topic,
            other => LookupVariant::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            LookupVariant::Jndi => "jndi",
            LookupVariant::Queue => "queue",
            LookupVariant::Topic => "topic",
            LookupVariant::Other(token) => token,
        }
    }

    /// Queue and topic variants reuse a registered connection
    pub fn is_named(&self) -> bool {
        matches!(self, LookupVariant::Queue | LookupVariant::Topic)
    }
}

impl fmt::Display for LookupVariant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Message delivery mode requested by a locator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryMode {
    Persistent,
    NonPersistent,
}

/// Directory service environment encoded in a locator
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DirectoryEnvironment {
    /// Context factory identifier (`jndiInitialContextFactory`)
    pub initial_context_factory: Option<String>,
    /// Provider URL (`jndiURL`)
    pub url: Option<String>,
    /// Extra properties from `jndi-<name>` parameters, prefix stripped
    pub properties: BTreeMap<String, String>,
}

/// A parsed SOAP/JMS transport URI
///
/// Equality and hashing cover the locator only (variant, destination and
/// parameters). The endpoint name is carried along but ignored, so endpoints
/// declaring the same locator share one cached connection.
#[derive(Debug, Clone)]
pub struct TransportUri {
    variant: LookupVariant,
    destination: String,
    parameters: BTreeMap<String, String>,
    endpoint_name: Option<String>,
}

impl TransportUri {
    /// Parse a locator string
    pub fn parse(raw: &str) -> Result<Self> {
        let url = Url::parse(raw).map_err(|e| Error::malformed(raw, e.to_string()))?;

        if url.scheme() != SCHEME {
            return Err(Error::malformed(
                raw,
                format!("expected scheme '{}', got '{}'", SCHEME, url.scheme()),
            ));
        }
        if !url.cannot_be_a_base() {
            return Err(Error::malformed(
                raw,
                "expected jms:<variant>:<destination>",
            ));
        }
        if url.fragment().is_some() {
            return Err(Error::malformed(raw, "fragments are not allowed"));
        }

        let (variant, destination) = url
            .path()
            .split_once(':')
            .ok_or_else(|| Error::malformed(raw, "missing lookup variant"))?;
        if variant.is_empty() {
            return Err(Error::malformed(raw, "empty lookup variant"));
        }
        let destination = decode(raw, destination)?;
        if destination.is_empty() {
            return Err(Error::malformed(raw, "empty destination name"));
        }

        let mut parameters = BTreeMap::new();
        if let Some(query) = url.query() {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (name, value) = pair.split_once('=').ok_or_else(|| {
                    Error::malformed(raw, format!("parameter without value: {}", pair))
                })?;
                let name = decode(raw, name)?;
                if name.is_empty() {
                    return Err(Error::malformed(raw, "empty parameter name"));
                }
                let value = decode(raw, value)?;
                if parameters.insert(name.clone(), value).is_some() {
                    return Err(Error::malformed(
                        raw,
                        format!("duplicate parameter: {}", name),
                    ));
                }
            }
        }

        Ok(Self {
            variant: LookupVariant::from_token(&decode(raw, variant)?),
            destination,
            parameters,
            endpoint_name: None,
        })
    }

    /// Attach the owning endpoint's name
    pub fn with_endpoint_name(mut self, name: impl Into<String>) -> Self {
        self.endpoint_name = Some(name.into());
        self
    }

    pub fn lookup_variant(&self) -> &LookupVariant {
        &self.variant
    }

    /// Destination name (directory name for `jndi`, queue/topic name otherwise)
    pub fn destination_name(&self) -> &str {
        &self.destination
    }

    pub fn endpoint_name(&self) -> Option<&str> {
        self.endpoint_name.as_deref()
    }

    pub fn parameter(&self, name: &str) -> Option<&str> {
        self.parameters.get(name).map(|v| v.as_str())
    }

    pub fn parameters(&self) -> &BTreeMap<String, String> {
        &self.parameters
    }

    /// Registered connection name (`connectionName`)
    pub fn connection_name(&self) -> Option<&str> {
        self.parameter(CONNECTION_NAME)
    }

    /// Connection factory directory name (`jndiConnectionFactoryName`)
    pub fn jndi_connection_factory_name(&self) -> Option<&str> {
        self.parameter(JNDI_CONNECTION_FACTORY_NAME)
    }

    pub fn reply_to_name(&self) -> Option<&str> {
        self.parameter(REPLY_TO_NAME)
    }

    pub fn target_service(&self) -> Option<&str> {
        self.parameter(TARGET_SERVICE)
    }

    /// `deliveryMode`, either `PERSISTENT` or `NON_PERSISTENT`
    pub fn delivery_mode(&self) -> Result<Option<DeliveryMode>> {
        match self.parameter(DELIVERY_MODE) {
            None => Ok(None),
            Some("PERSISTENT") => Ok(Some(DeliveryMode::Persistent)),
            Some("NON_PERSISTENT") => Ok(Some(DeliveryMode::NonPersistent)),
            Some(other) => Err(Error::malformed(
                &self.to_string(),
                format!("invalid deliveryMode: {}", other),
            )),
        }
    }

    /// `timeToLive` in milliseconds
    pub fn time_to_live(&self) -> Result<Option<u64>> {
        self.parameter(TIME_TO_LIVE)
            .map(|v| {
                v.parse().map_err(|_| {
                    Error::malformed(&self.to_string(), format!("invalid timeToLive: {}", v))
                })
            })
            .transpose()
    }

    /// `priority`, 0 to 9
    pub fn priority(&self) -> Result<Option<u8>> {
        self.parameter(PRIORITY)
            .map(|v| match v.parse::<u8>() {
                Ok(p) if p <= 9 => Ok(p),
                _ => Err(Error::malformed(
                    &self.to_string(),
                    format!("invalid priority: {}", v),
                )),
            })
            .transpose()
    }

    /// Directory environment for the `jndi` variant
    pub fn directory_environment(&self) -> DirectoryEnvironment {
        DirectoryEnvironment {
            initial_context_factory: self
                .parameter(JNDI_INITIAL_CONTEXT_FACTORY)
                .map(str::to_string),
            url: self.parameter(JNDI_URL).map(str::to_string),
            properties: self
                .parameters
                .iter()
                .filter_map(|(k, v)| {
                    k.strip_prefix(JNDI_PROPERTY_PREFIX)
                        .map(|name| (name.to_string(), v.clone()))
                })
                .collect(),
        }
    }

    /// Effective configuration for this endpoint
    ///
    /// Layers, lowest precedence first: `base`, the `jms.*` subset of `base`,
    /// the `endpoint.<endpointName>.*` subset of `base`, then the locator's
    /// own parameters.
    pub fn configuration(&self, base: &Configuration) -> Configuration {
        let mut effective = base.overlay(&base.subset("jms"));
        if let Some(name) = &self.endpoint_name {
            effective = effective.overlay(&base.subset(&format!("endpoint.{}", name)));
        }
        effective.overlay(&Configuration::from_pairs(
            self.parameters.iter().map(|(k, v)| (k.clone(), v.clone())),
        ))
    }
}

fn decode(raw: &str, component: &str) -> Result<String> {
    percent_decode_str(component)
        .decode_utf8()
        .map(|s| s.into_owned())
        .map_err(|_| Error::malformed(raw, "invalid percent-encoding"))
}

impl PartialEq for TransportUri {
    fn eq(&self, other: &Self) -> bool {
        self.variant == other.variant
            && self.destination == other.destination
            && self.parameters == other.parameters
    }
}

impl Eq for TransportUri {}

impl Hash for TransportUri {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.variant.hash(state);
        self.destination.hash(state);
        self.parameters.hash(state);
    }
}

impl fmt::Display for TransportUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{}:{}",
            SCHEME,
            utf8_percent_encode(self.variant.as_str(), VARIANT),
            utf8_percent_encode(&self.destination, COMPONENT)
        )?;
        for (i, (name, value)) in self.parameters.iter().enumerate() {
            write!(
                f,
                "{}{}={}",
                if i == 0 { '?' } else { '&' },
                utf8_percent_encode(name, COMPONENT),
                utf8_percent_encode(value, COMPONENT)
            )?;
        }
        Ok(())
    }
}

impl FromStr for TransportUri {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        TransportUri::parse(s)
    }
}

impl TryFrom<&str> for TransportUri {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self> {
        TransportUri::parse(s)
    }
}

impl TryFrom<String> for TransportUri {
    type Error = Error;

    fn try_from(s: String) -> Result<Self> {
        TransportUri::parse(&s)
    }
}
