//! Messages and destinations

use bytes::Bytes;
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// A queue or topic address
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Point-to-point: each message goes to one consumer
    Queue(String),
    /// Publish/subscribe: each message goes to every consumer
    Topic(String),
}

impl Destination {
    pub fn queue(name: impl Into<String>) -> Self {
        Destination::Queue(name.into())
    }

    pub fn topic(name: impl Into<String>) -> Self {
        Destination::Topic(name.into())
    }

    pub fn name(&self) -> &str {
        match self {
            Destination::Queue(name) | Destination::Topic(name) => name,
        }
    }

    pub fn is_queue(&self) -> bool {
        matches!(self, Destination::Queue(_))
    }
}

impl fmt::Display for Destination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Destination::Queue(name) => write!(f, "queue://{}", name),
            Destination::Topic(name) => write!(f, "topic://{}", name),
        }
    }
}

/// A message carried by the host subsystem
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    /// Unique message ID
    pub id: String,
    /// Payload
    pub body: Bytes,
    /// String properties (selectors match against these)
    pub properties: BTreeMap<String, String>,
    /// ID of the message this one answers
    pub correlation_id: Option<String>,
    /// Where replies should go
    pub reply_to: Option<Destination>,
    /// Set when a message is delivered again after a rollback
    pub redelivered: bool,
}

impl Message {
    /// Create a message with a fresh ID
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            id: format!("ID:{}", Uuid::new_v4()),
            body: body.into(),
            properties: BTreeMap::new(),
            correlation_id: None,
            reply_to: None,
            redelivered: false,
        }
    }

    pub fn with_property(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(name.into(), value.into());
        self
    }

    pub fn with_reply_to(mut self, destination: Destination) -> Self {
        self.reply_to = Some(destination);
        self
    }

    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(|v| v.as_str())
    }

    /// Body as UTF-8 text, if it is valid UTF-8
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}
