//! SOAP/JMS Messaging Contract
//!
//! The host messaging subsystem as seen by the transport binding:
//! - Connection, session, consumer and destination traits
//! - Directory service lookup of connection factories and destinations
//! - Connection and listener registries on the host
//! - Push listeners and pull-based pollers
//!
//! An in-process implementation (`MemoryBroker`, `MemoryHost`,
//! `MemoryDirectoryProvider`) backs tests and local runs.

pub mod broker;
pub mod definition;
pub mod directory;
pub mod error;
pub mod host;
pub mod memory;
pub mod message;
pub mod poller;
pub mod selector;
pub mod traits;

pub use broker::MemoryBroker;
pub use definition::{ConnectionDefinition, ListenerDefinition, PollerFactory};
pub use directory::{MemoryDirectory, MemoryDirectoryProvider, MEMORY_CONTEXT_FACTORY};
pub use error::{MessagingError, Result};
pub use host::{ListenerInfo, MemoryHost};
pub use memory::{MemoryConnection, MemoryConnectionFactory, MemorySession};
pub use message::{Destination, Message};
pub use poller::{SimpleMessagePoller, SIMPLE_POLLER};
pub use selector::Selector;
pub use traits::{
    Connection, ConnectionFactory, Directory, DirectoryEntry, DirectoryProvider,
    MessageConsumer, MessageListener, MessagePoller, MessagingHost, Session,
};
