//! SOAP/JMS Service
//!
//! Runs the SOAP/JMS transport over the in-process broker, with endpoints,
//! connections and directory entries taken from a TOML file.

pub mod adapter;
pub mod config;

use anyhow::{Context, Result};
use soapjms_messaging::{
    Destination, MemoryBroker, MemoryConnection, MemoryConnectionFactory,
    MemoryDirectoryProvider, MemoryHost,
};
use soapjms_transport::{
    BoundEndpoints, EndpointDefinition, SoapJmsTransport, StaticEndpointRegistry,
};
use std::sync::Arc;
use tracing::info;

pub use config::ServiceConfig;

use config::DirectoryKind;

/// A configured service, ready to start
pub struct Service {
    broker: Arc<MemoryBroker>,
    host: Arc<MemoryHost>,
    registry: StaticEndpointRegistry,
    transport: SoapJmsTransport,
}

impl Service {
    /// Wire the broker, host, directories and endpoints described by `config`
    pub fn new(config: ServiceConfig) -> Result<Self> {
        let broker = MemoryBroker::new();
        let host = Arc::new(MemoryHost::new());
        let directories = Arc::new(MemoryDirectoryProvider::new());

        for entry in &config.connections {
            host.add_connection(Arc::new(MemoryConnection::new(&entry.name, broker.clone())))
                .with_context(|| format!("Failed to register connection {}", entry.name))?;
        }

        let factory = Arc::new(MemoryConnectionFactory::new(broker.clone()));
        for binding in &config.directory {
            let directory = match &binding.url {
                Some(url) => directories.directory(url),
                None => directories.default_directory(),
            };
            match (binding.kind, binding.destination.as_deref()) {
                (DirectoryKind::ConnectionFactory, _) => {
                    directory.bind_factory(binding.name.clone(), factory.clone())
                }
                (DirectoryKind::Queue, Some(name)) => {
                    directory.bind_destination(binding.name.clone(), Destination::queue(name))
                }
                (DirectoryKind::Topic, Some(name)) => {
                    directory.bind_destination(binding.name.clone(), Destination::topic(name))
                }
                (_, None) => anyhow::bail!("directory entry {} needs a destination", binding.name),
            }
        }

        let mut registry = StaticEndpointRegistry::new();
        for entry in &config.endpoints {
            registry.register(
                EndpointDefinition::new(&entry.name, &entry.service, &entry.port, &entry.url)
                    .with_binding(&entry.binding),
                adapter::adapter_for(entry.adapter),
            );
        }

        let transport = SoapJmsTransport::new(config.ws, host.clone(), directories);

        Ok(Self {
            broker,
            host,
            registry,
            transport,
        })
    }

    pub fn broker(&self) -> &Arc<MemoryBroker> {
        &self.broker
    }

    pub fn host(&self) -> &Arc<MemoryHost> {
        &self.host
    }

    pub fn transport(&self) -> &SoapJmsTransport {
        &self.transport
    }

    /// Bind every configured endpoint
    pub async fn start(&self) -> Result<BoundEndpoints> {
        let bound = self
            .transport
            .start(&self.registry)
            .await
            .context("Failed to start SOAP/JMS transport")?;
        for binding in &bound {
            info!(
                endpoint = %binding.endpoint_name,
                destination = %binding.destination,
                "endpoint ready"
            );
        }
        Ok(bound)
    }

    /// Stop listeners and release connections
    pub async fn stop(&self) {
        self.host.stop_listeners();
        self.transport.stop().await;
    }
}
