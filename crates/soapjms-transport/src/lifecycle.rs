//! Transport lifecycle
//!
//! `start` builds the connection cache and binds every endpoint declared on a
//! supported binding, in order. The first endpoint that fails to bind aborts
//! startup. `stop` releases whatever the cache holds and may be called any
//! number of times, including before or after a failed start.

use parking_lot::Mutex;
use soapjms_core::{CacheConfig, Configuration, SOAP_JMS_BINDING};
use soapjms_messaging::{DirectoryProvider, MessagingHost};
use std::sync::Arc;
use tracing::{debug, info};

use crate::binder::{EndpointBinder, EndpointBinding};
use crate::cache::ConnectionCache;
use crate::endpoint::EndpointRegistry;
use crate::error::{Error, Result};
use crate::poller::PollerRegistry;

/// Bindings this transport serves
pub const SUPPORTED_BINDINGS: &[&str] = &[SOAP_JMS_BINDING];

/// Endpoints bound by a successful start, in binding order
#[derive(Debug, Clone, Default)]
pub struct BoundEndpoints {
    bindings: Vec<EndpointBinding>,
}

impl BoundEndpoints {
    pub fn get(&self, endpoint_name: &str) -> Option<&EndpointBinding> {
        self.bindings
            .iter()
            .find(|binding| binding.endpoint_name == endpoint_name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &EndpointBinding> {
        self.bindings.iter()
    }

    pub fn listener_names(&self) -> Vec<&str> {
        self.bindings
            .iter()
            .map(|binding| binding.listener_name.as_str())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.bindings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }
}

impl<'a> IntoIterator for &'a BoundEndpoints {
    type Item = &'a EndpointBinding;
    type IntoIter = std::slice::Iter<'a, EndpointBinding>;

    fn into_iter(self) -> Self::IntoIter {
        self.bindings.iter()
    }
}

/// The SOAP/JMS transport
pub struct SoapJmsTransport {
    config: Configuration,
    host: Arc<dyn MessagingHost>,
    directories: Arc<dyn DirectoryProvider>,
    pollers: Arc<PollerRegistry>,
    cache: Mutex<Option<ConnectionCache>>,
}

impl SoapJmsTransport {
    /// `config` is the WS configuration root
    pub fn new(
        config: Configuration,
        host: Arc<dyn MessagingHost>,
        directories: Arc<dyn DirectoryProvider>,
    ) -> Self {
        Self {
            config,
            host,
            directories,
            pollers: Arc::new(PollerRegistry::with_defaults()),
            cache: Mutex::new(None),
        }
    }

    /// Replace the poller registry
    pub fn with_pollers(mut self, pollers: PollerRegistry) -> Self {
        self.pollers = Arc::new(pollers);
        self
    }

    /// The connection cache, once `start` has built it
    pub fn connection_cache(&self) -> Option<ConnectionCache> {
        self.cache.lock().clone()
    }

    /// Bind every endpoint on a supported binding
    pub async fn start(&self, registry: &dyn EndpointRegistry) -> Result<BoundEndpoints> {
        let cache = {
            let mut slot = self.cache.lock();
            if slot.is_some() {
                return Err(Error::AlreadyStarted);
            }
            let cache = ConnectionCache::new(
                CacheConfig::from_configuration(&self.config)?,
                self.config.clone(),
                self.host.clone(),
                self.directories.clone(),
            )?;
            *slot = Some(cache.clone());
            cache
        };

        let binder = EndpointBinder::new(
            cache,
            self.host.clone(),
            self.directories.clone(),
            self.pollers.clone(),
            self.config.clone(),
        );

        let mut bindings = Vec::new();
        for definition in registry.endpoint_definitions(SUPPORTED_BINDINGS) {
            let bound = match registry.create_adapter(&definition) {
                Ok(adapter) => binder.bind(&definition, adapter).await,
                Err(e) => Err(Error::AdapterCreationFailed {
                    endpoint: definition.name.clone(),
                    reason: format!("{:#}", e),
                }),
            };
            let binding = bound.map_err(|source| Error::Endpoint {
                service: definition.service_name.clone(),
                port: definition.port_name.clone(),
                source: Box::new(source),
            })?;
            bindings.push(binding);
        }

        info!(endpoints = bindings.len(), "SOAP/JMS transport started");
        Ok(BoundEndpoints { bindings })
    }

    /// Release every cached connection
    pub async fn stop(&self) {
        let cache = self.cache.lock().clone();
        match cache {
            Some(cache) => {
                let released = cache.len();
                cache.invalidate_all();
                cache.clean_up().await;
                info!(connections = released, "SOAP/JMS transport stopped");
            }
            None => debug!("SOAP/JMS transport was never started"),
        }
    }
}
