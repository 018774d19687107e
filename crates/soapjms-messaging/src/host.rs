//! In-process messaging host
//!
//! Keeps the registries the transport binding talks to: named connections
//! and named message listeners. Each registered listener is driven by its own
//! tokio task, either a push loop or the listener's poller.

use async_trait::async_trait;
use dashmap::DashMap;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::definition::{ConnectionDefinition, ListenerDefinition};
use crate::error::{MessagingError, Result};
use crate::message::Destination;
use crate::traits::{Connection, MessageConsumer, MessageListener, MessagingHost};

struct RegisteredConnection {
    connection: Arc<dyn Connection>,
    definition: Option<ConnectionDefinition>,
}

struct RegisteredListener {
    info: ListenerInfo,
    task: JoinHandle<()>,
}

/// What the host knows about a registered listener
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListenerInfo {
    pub name: String,
    pub connection_name: String,
    pub destination: Destination,
    pub selector: Option<String>,
    pub polled: bool,
}

/// Messaging host backed by in-process registries
#[derive(Default)]
pub struct MemoryHost {
    connections: DashMap<String, RegisteredConnection>,
    listeners: DashMap<String, RegisteredListener>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connection that was configured outside the transport binding
    pub fn add_connection(&self, connection: Arc<dyn Connection>) -> Result<()> {
        let name = connection.name().to_string();
        if self.connections.contains_key(&name) {
            return Err(MessagingError::DuplicateConnection(name));
        }
        self.connections.insert(
            name,
            RegisteredConnection {
                connection,
                definition: None,
            },
        );
        Ok(())
    }

    /// Definition a connection was registered with, if it came through `register_connection`
    pub fn connection_definition(&self, name: &str) -> Option<ConnectionDefinition> {
        self.connections
            .get(name)
            .and_then(|entry| entry.definition.clone())
    }

    pub fn connection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.connections.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn listener(&self, name: &str) -> Option<ListenerInfo> {
        self.listeners.get(name).map(|entry| entry.info.clone())
    }

    pub fn listener_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.listeners.iter().map(|e| e.key().clone()).collect();
        names.sort();
        names
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    /// Stop every listener task
    pub fn stop_listeners(&self) {
        for entry in self.listeners.iter() {
            entry.task.abort();
        }
        self.listeners.clear();
    }
}

impl Drop for MemoryHost {
    fn drop(&mut self) {
        for entry in self.listeners.iter() {
            entry.task.abort();
        }
    }
}

#[async_trait]
impl MessagingHost for MemoryHost {
    fn register_connection(
        &self,
        connection: Arc<dyn Connection>,
        definition: ConnectionDefinition,
    ) -> Result<()> {
        let name = definition.name.clone();
        if self.connections.contains_key(&name) {
            return Err(MessagingError::DuplicateConnection(name));
        }
        debug!(connection = %name, "registered connection");
        self.connections.insert(
            name,
            RegisteredConnection {
                connection,
                definition: Some(definition),
            },
        );
        Ok(())
    }

    fn connection(&self, name: &str) -> Option<Arc<dyn Connection>> {
        self.connections
            .get(name)
            .map(|entry| entry.connection.clone())
    }

    async fn register_message_listener(&self, definition: ListenerDefinition) -> Result<()> {
        if self.listeners.contains_key(&definition.name) {
            return Err(MessagingError::DuplicateListener(definition.name));
        }
        if !self.connections.contains_key(&definition.connection_name) {
            return Err(MessagingError::UnknownConnection(definition.connection_name));
        }

        let consumer = definition
            .session
            .create_consumer(&definition.destination, definition.selector.as_deref())
            .await?;

        let info = ListenerInfo {
            name: definition.name.clone(),
            connection_name: definition.connection_name.clone(),
            destination: definition.destination.clone(),
            selector: definition.selector.clone(),
            polled: definition.poller.is_some(),
        };

        let name = definition.name.clone();
        let listener = definition.listener;
        let task = match definition.poller {
            Some(factory) => {
                let poller = factory();
                let name = name.clone();
                tokio::spawn(async move {
                    if let Err(e) = poller.run(consumer, listener).await {
                        warn!(listener = %name, "poller stopped: {}", e);
                    }
                })
            }
            None => tokio::spawn(push_loop(name.clone(), consumer, listener)),
        };

        info!(
            listener = %name,
            connection = %info.connection_name,
            destination = %info.destination,
            polled = info.polled,
            "registered message listener"
        );
        self.listeners
            .insert(name, RegisteredListener { info, task });
        Ok(())
    }
}

async fn push_loop(
    name: String,
    mut consumer: Box<dyn MessageConsumer>,
    listener: Arc<dyn MessageListener>,
) {
    while let Some(message) = consumer.receive().await {
        let id = message.id.clone();
        if let Err(e) = listener.on_message(message).await {
            warn!(listener = %name, message = %id, "listener failed: {:#}", e);
        }
    }
    debug!(listener = %name, "session closed, listener exiting");
}
