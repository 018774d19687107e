//! Service configuration file
//!
//! ```toml
//! [ws]
//! transactional = true
//!
//! [ws.transport-cache]
//! max-size = 16
//!
//! [[connections]]
//! name = "conn1"
//!
//! [[directory]]
//! name = "jms/OrdersFactory"
//! kind = "connection-factory"
//!
//! [[directory]]
//! name = "jms/Orders"
//! kind = "queue"
//! destination = "orders.in"
//!
//! [[endpoints]]
//! name = "orders"
//! service = "OrderService"
//! port = "OrderPort"
//! url = "jms:jndi:jms/Orders?jndiConnectionFactoryName=jms/OrdersFactory"
//! adapter = "echo"
//! ```

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use soapjms_core::{Configuration, SOAP_JMS_BINDING};
use std::path::Path;

/// Whole service configuration
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// WS configuration root handed to the transport
    #[serde(default)]
    pub ws: Configuration,
    /// Connections registered with the host before startup
    #[serde(default)]
    pub connections: Vec<ConnectionEntry>,
    /// Directory bindings
    #[serde(default)]
    pub directory: Vec<DirectoryBinding>,
    #[serde(default)]
    pub endpoints: Vec<EndpointEntry>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConnectionEntry {
    pub name: String,
}

/// What a directory name resolves to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DirectoryKind {
    ConnectionFactory,
    Queue,
    Topic,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DirectoryBinding {
    pub name: String,
    pub kind: DirectoryKind,
    /// Broker destination for `queue` and `topic` bindings
    pub destination: Option<String>,
    /// Provider URL; the default directory when absent
    pub url: Option<String>,
}

/// Built-in invocation adapters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdapterKind {
    /// Reply with the request body
    #[default]
    Echo,
    /// Log the request, send no reply
    Log,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct EndpointEntry {
    pub name: String,
    pub service: String,
    pub port: String,
    pub url: String,
    #[serde(default = "default_binding")]
    pub binding: String,
    #[serde(default)]
    pub adapter: AdapterKind,
}

fn default_binding() -> String {
    SOAP_JMS_BINDING.to_string()
}

impl ServiceConfig {
    /// Read and validate a configuration file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::parse(&text).with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse and validate configuration text
    pub fn parse(text: &str) -> Result<Self> {
        let config: ServiceConfig = toml::from_str(text).context("Failed to parse TOML")?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        for binding in &self.directory {
            match (binding.kind, &binding.destination) {
                (DirectoryKind::ConnectionFactory, Some(_)) => {
                    bail!("directory entry {} is a factory and takes no destination", binding.name)
                }
                (DirectoryKind::Queue | DirectoryKind::Topic, None) => {
                    bail!("directory entry {} needs a destination", binding.name)
                }
                _ => {}
            }
        }

        let mut names: Vec<&str> = self.endpoints.iter().map(|e| e.name.as_str()).collect();
        names.sort_unstable();
        if let Some(pair) = names.windows(2).find(|pair| pair[0] == pair[1]) {
            bail!("endpoint {} is declared twice", pair[0]);
        }
        Ok(())
    }
}
