//! Host messaging contract
//!
//! The transport binding only sees the host subsystem through these traits:
//! connections own sessions, sessions create destinations and consumers, and
//! the host keeps registries of named connections and message listeners.

use async_trait::async_trait;
use soapjms_core::{Configuration, DirectoryEnvironment};
use std::fmt;
use std::sync::Arc;

use crate::definition::{ConnectionDefinition, ListenerDefinition};
use crate::error::Result;
use crate::message::{Destination, Message};

/// An open connection to a broker
#[async_trait]
pub trait Connection: Send + Sync {
    /// Name the connection is registered under
    fn name(&self) -> &str;

    /// Open a session; transacted sessions buffer work until commit
    async fn create_session(&self, transacted: bool) -> Result<Arc<dyn Session>>;

    /// Close the connection and every session it opened
    async fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// A single-threaded unit of work on a connection
#[async_trait]
pub trait Session: Send + Sync {
    /// Fails once the session is closed
    fn is_transacted(&self) -> Result<bool>;

    fn create_queue(&self, name: &str) -> Result<Destination>;

    fn create_topic(&self, name: &str) -> Result<Destination>;

    /// Start consuming from a destination, optionally filtered by a selector
    async fn create_consumer(
        &self,
        destination: &Destination,
        selector: Option<&str>,
    ) -> Result<Box<dyn MessageConsumer>>;

    async fn send(&self, destination: &Destination, message: Message) -> Result<()>;

    async fn commit(&self) -> Result<()>;

    async fn rollback(&self) -> Result<()>;

    async fn close(&self) -> Result<()>;

    fn is_closed(&self) -> bool;
}

/// Pull side of a destination
#[async_trait]
pub trait MessageConsumer: Send {
    /// Wait for the next message; `None` once the session is closed
    async fn receive(&mut self) -> Option<Message>;
}

/// Creates connections from a definition
#[async_trait]
pub trait ConnectionFactory: Send + Sync {
    async fn create_connection(
        &self,
        definition: &ConnectionDefinition,
    ) -> Result<Arc<dyn Connection>>;
}

/// Something bound in a directory service
#[derive(Clone)]
pub enum DirectoryEntry {
    ConnectionFactory(Arc<dyn ConnectionFactory>),
    Destination(Destination),
}

impl fmt::Debug for DirectoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DirectoryEntry::ConnectionFactory(_) => f.write_str("ConnectionFactory"),
            DirectoryEntry::Destination(d) => f.debug_tuple("Destination").field(d).finish(),
        }
    }
}

/// A naming service holding connection factories and destinations
#[async_trait]
pub trait Directory: Send + Sync {
    async fn lookup(&self, name: &str) -> Result<DirectoryEntry>;
}

/// Opens directories from the environment a locator describes
pub trait DirectoryProvider: Send + Sync {
    fn open(&self, environment: &DirectoryEnvironment) -> Result<Arc<dyn Directory>>;
}

/// Push-style message callback
#[async_trait]
pub trait MessageListener: Send + Sync {
    async fn on_message(&self, message: Message) -> anyhow::Result<()>;
}

/// Pull-style consumption strategy, used instead of push delivery
#[async_trait]
pub trait MessagePoller: Send + Sync {
    /// Drain the consumer into the listener until the session closes
    async fn run(
        &self,
        consumer: Box<dyn MessageConsumer>,
        listener: Arc<dyn MessageListener>,
    ) -> Result<()>;
}

/// The host messaging subsystem
#[async_trait]
pub trait MessagingHost: Send + Sync {
    /// Build a definition for a connection the caller is about to create
    fn create_connection_definition(
        &self,
        name: &str,
        config: &Configuration,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<ConnectionDefinition> {
        ConnectionDefinition::from_configuration(name, config, factory)
    }

    async fn create_connection(
        &self,
        definition: &ConnectionDefinition,
    ) -> Result<Arc<dyn Connection>> {
        definition.factory.create_connection(definition).await
    }

    /// Make a connection available by name
    fn register_connection(
        &self,
        connection: Arc<dyn Connection>,
        definition: ConnectionDefinition,
    ) -> Result<()>;

    /// A connection registered under `name`
    fn connection(&self, name: &str) -> Option<Arc<dyn Connection>>;

    /// Start delivering messages to a listener
    async fn register_message_listener(&self, definition: ListenerDefinition) -> Result<()>;
}
