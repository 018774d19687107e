//! Endpoint binding
//!
//! Binding an endpoint wires its transport URI to a running listener:
//! resolve the connection, open a session, resolve the destination, then
//! register a [`SoapJmsListener`] with the host as `ws-<endpoint>-listener`.

use soapjms_core::{Configuration, LookupVariant, TransportUri};
use soapjms_messaging::{
    Destination, DirectoryEntry, DirectoryProvider, ListenerDefinition, MessagingError,
    MessagingHost, Session,
};
use std::sync::Arc;
use tracing::{info, warn};

use crate::cache::ConnectionCache;
use crate::endpoint::{EndpointDefinition, InvocationAdapter};
use crate::error::{Error, Result};
use crate::listener::{ReplyProperties, SoapJmsListener};
use crate::poller::PollerRegistry;

pub const TRANSACTIONAL_KEY: &str = "transactional";
pub const SELECTOR_KEY: &str = "selector";
pub const POLLER_KEY: &str = "poller";

/// Name under which an endpoint's listener is registered
pub fn listener_name(endpoint: &str) -> String {
    format!("ws-{}-listener", endpoint)
}

/// A bound endpoint
#[derive(Clone)]
pub struct EndpointBinding {
    pub endpoint_name: String,
    pub listener_name: String,
    /// Name of the connection the listener's session belongs to
    pub connection_name: String,
    pub uri: TransportUri,
    pub session: Arc<dyn Session>,
    pub destination: Destination,
    pub transacted: bool,
    pub selector: Option<String>,
    pub poller: Option<String>,
    pub listener: Arc<SoapJmsListener>,
}

impl std::fmt::Debug for EndpointBinding {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EndpointBinding")
            .field("endpoint_name", &self.endpoint_name)
            .field("listener_name", &self.listener_name)
            .field("connection_name", &self.connection_name)
            .field("uri", &self.uri.to_string())
            .field("destination", &self.destination)
            .field("transacted", &self.transacted)
            .field("selector", &self.selector)
            .field("poller", &self.poller)
            .finish()
    }
}

/// Binds endpoints through a shared connection cache
pub struct EndpointBinder {
    cache: ConnectionCache,
    host: Arc<dyn MessagingHost>,
    directories: Arc<dyn DirectoryProvider>,
    pollers: Arc<PollerRegistry>,
    config: Configuration,
}

impl EndpointBinder {
    pub fn new(
        cache: ConnectionCache,
        host: Arc<dyn MessagingHost>,
        directories: Arc<dyn DirectoryProvider>,
        pollers: Arc<PollerRegistry>,
        config: Configuration,
    ) -> Self {
        Self {
            cache,
            host,
            directories,
            pollers,
            config,
        }
    }

    pub fn cache(&self) -> &ConnectionCache {
        &self.cache
    }

    /// Bind one endpoint and start its listener
    pub async fn bind(
        &self,
        definition: &EndpointDefinition,
        adapter: Arc<dyn InvocationAdapter>,
    ) -> Result<EndpointBinding> {
        let endpoint = definition.name.as_str();
        let uri = TransportUri::parse(&definition.url)?.with_endpoint_name(endpoint);
        let reply_properties = ReplyProperties::from_uri(&uri)?;
        let config = uri.configuration(&self.config);

        let connection = self.cache.resolve(&uri).await?;
        let transacted = config.get_bool(TRANSACTIONAL_KEY, true)?;
        let session = connection
            .create_session(transacted)
            .await
            .map_err(|source| Error::SessionCreationFailed {
                endpoint: endpoint.to_string(),
                source,
            })?;

        match self
            .register(
                endpoint,
                &uri,
                &config,
                connection.name(),
                session.clone(),
                transacted,
                reply_properties,
                adapter,
            )
            .await
        {
            Ok(binding) => {
                info!(
                    endpoint = %endpoint,
                    listener = %binding.listener_name,
                    connection = %binding.connection_name,
                    destination = %binding.destination,
                    transacted,
                    "bound WS endpoint"
                );
                Ok(binding)
            }
            Err(e) => {
                if let Err(close) = session.close().await {
                    warn!(endpoint = %endpoint, "failed to close session: {}", close);
                }
                Err(e)
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn register(
        &self,
        endpoint: &str,
        uri: &TransportUri,
        config: &Configuration,
        connection_name: &str,
        session: Arc<dyn Session>,
        transacted: bool,
        reply_properties: ReplyProperties,
        adapter: Arc<dyn InvocationAdapter>,
    ) -> Result<EndpointBinding> {
        let destination = resolve_destination(uri, session.as_ref(), self.directories.as_ref())
            .await
            .map_err(|source| Error::DestinationResolutionFailed {
                endpoint: endpoint.to_string(),
                source,
            })?;

        let listener_name = listener_name(endpoint);
        let selector = config.get_string(SELECTOR_KEY);
        let poller = config.get_string(POLLER_KEY);
        let poller_factory = poller
            .as_deref()
            .map(|name| self.pollers.resolve(name, &listener_name))
            .transpose()?;

        let listener = Arc::new(SoapJmsListener::with_reply_properties(
            uri.clone(),
            reply_properties,
            adapter,
            session.clone(),
        ));
        self.host
            .register_message_listener(ListenerDefinition {
                name: listener_name.clone(),
                connection_name: connection_name.to_string(),
                session: session.clone(),
                destination: destination.clone(),
                selector: selector.clone(),
                listener: listener.clone(),
                poller: poller_factory,
            })
            .await
            .map_err(|source| Error::ListenerRegistrationFailed {
                listener: listener_name.clone(),
                source,
            })?;

        Ok(EndpointBinding {
            endpoint_name: endpoint.to_string(),
            listener_name,
            connection_name: connection_name.to_string(),
            uri: uri.clone(),
            session,
            destination,
            transacted,
            selector,
            poller,
            listener,
        })
    }
}

/// Destination a URI names, as seen from `session`
///
/// `jndi` destinations are looked up in the URI's directory, `queue` and
/// `topic` destinations are created by the session.
pub async fn resolve_destination(
    uri: &TransportUri,
    session: &dyn Session,
    directories: &dyn DirectoryProvider,
) -> std::result::Result<Destination, MessagingError> {
    let name = uri.destination_name();
    match uri.lookup_variant() {
        LookupVariant::Jndi => {
            let directory = directories.open(&uri.directory_environment())?;
            match directory.lookup(name).await? {
                DirectoryEntry::Destination(destination) => Ok(destination),
                DirectoryEntry::ConnectionFactory(_) => {
                    Err(MessagingError::NotADestination(name.to_string()))
                }
            }
        }
        LookupVariant::Queue => session.create_queue(name),
        LookupVariant::Topic => session.create_topic(name),
        LookupVariant::Other(variant) => Err(MessagingError::Other(format!(
            "unsupported lookup variant {}",
            variant
        ))),
    }
}
