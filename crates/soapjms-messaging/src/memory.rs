//! In-process connections, sessions and consumers
//!
//! Backed by a [`MemoryBroker`]. Transacted sessions buffer sends until
//! commit and put received messages back on rollback.

use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::debug;

use crate::broker::{Mailbox, MemoryBroker};
use crate::definition::ConnectionDefinition;
use crate::error::{MessagingError, Result};
use crate::message::{Destination, Message};
use crate::selector::Selector;
use crate::traits::{Connection, ConnectionFactory, MessageConsumer, Session};

/// Creates connections to a shared [`MemoryBroker`]
#[derive(Debug)]
pub struct MemoryConnectionFactory {
    broker: Arc<MemoryBroker>,
    created: AtomicUsize,
}

impl MemoryConnectionFactory {
    pub fn new(broker: Arc<MemoryBroker>) -> Self {
        Self {
            broker,
            created: AtomicUsize::new(0),
        }
    }

    /// Number of connections created so far
    pub fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ConnectionFactory for MemoryConnectionFactory {
    async fn create_connection(
        &self,
        definition: &ConnectionDefinition,
    ) -> Result<Arc<dyn Connection>> {
        self.created.fetch_add(1, Ordering::SeqCst);
        debug!(connection = %definition.name, "creating in-process connection");
        Ok(Arc::new(MemoryConnection::new(
            &definition.name,
            self.broker.clone(),
        )))
    }
}

/// A connection to a [`MemoryBroker`]
#[derive(Debug)]
pub struct MemoryConnection {
    name: String,
    broker: Arc<MemoryBroker>,
    closed: AtomicBool,
    sessions: Mutex<Vec<Arc<MemorySession>>>,
}

impl MemoryConnection {
    pub fn new(name: &str, broker: Arc<MemoryBroker>) -> Self {
        Self {
            name: name.to_string(),
            broker,
            closed: AtomicBool::new(false),
            sessions: Mutex::new(Vec::new()),
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.lock().len()
    }
}

#[async_trait]
impl Connection for MemoryConnection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn create_session(&self, transacted: bool) -> Result<Arc<dyn Session>> {
        if self.is_closed() {
            return Err(MessagingError::ConnectionClosed(self.name.clone()));
        }
        let session = Arc::new(MemorySession::new(self.broker.clone(), transacted));
        self.sessions.lock().push(session.clone());
        Ok(session)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        let sessions = std::mem::take(&mut *self.sessions.lock());
        for session in sessions {
            session.shutdown();
        }
        debug!(connection = %self.name, "closed in-process connection");
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

/// Session state shared with the consumers it created
#[derive(Debug)]
struct SessionShared {
    broker: Arc<MemoryBroker>,
    transacted: bool,
    closed: AtomicBool,
    closed_notify: Notify,
    pending_sends: Mutex<Vec<(Destination, Message)>>,
    pending_receipts: Mutex<Vec<(Arc<Mailbox>, Message)>>,
}

/// A session on a [`MemoryConnection`]
#[derive(Debug)]
pub struct MemorySession {
    shared: Arc<SessionShared>,
}

impl MemorySession {
    fn new(broker: Arc<MemoryBroker>, transacted: bool) -> Self {
        Self {
            shared: Arc::new(SessionShared {
                broker,
                transacted,
                closed: AtomicBool::new(false),
                closed_notify: Notify::new(),
                pending_sends: Mutex::new(Vec::new()),
                pending_receipts: Mutex::new(Vec::new()),
            }),
        }
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_closed() {
            Err(MessagingError::SessionClosed)
        } else {
            Ok(())
        }
    }

    fn shutdown(&self) {
        if !self.shared.closed.swap(true, Ordering::SeqCst) {
            // uncommitted work is discarded, received messages go back
            self.shared.pending_sends.lock().clear();
            let receipts = std::mem::take(&mut *self.shared.pending_receipts.lock());
            for (mailbox, message) in receipts.into_iter().rev() {
                mailbox.requeue(Message {
                    redelivered: true,
                    ..message
                });
            }
            self.shared.closed_notify.notify_waiters();
        }
    }
}

#[async_trait]
impl Session for MemorySession {
    fn is_transacted(&self) -> Result<bool> {
        self.ensure_open()?;
        Ok(self.shared.transacted)
    }

    fn create_queue(&self, name: &str) -> Result<Destination> {
        self.ensure_open()?;
        Ok(Destination::queue(name))
    }

    fn create_topic(&self, name: &str) -> Result<Destination> {
        self.ensure_open()?;
        Ok(Destination::topic(name))
    }

    async fn create_consumer(
        &self,
        destination: &Destination,
        selector: Option<&str>,
    ) -> Result<Box<dyn MessageConsumer>> {
        self.ensure_open()?;
        let selector = selector.map(Selector::parse).transpose()?;
        let mailbox = match destination {
            Destination::Queue(name) => self.shared.broker.queue(name),
            Destination::Topic(name) => self.shared.broker.subscribe(name),
        };
        Ok(Box::new(MemoryConsumer {
            session: self.shared.clone(),
            mailbox,
            selector,
        }))
    }

    async fn send(&self, destination: &Destination, message: Message) -> Result<()> {
        self.ensure_open()?;
        if self.shared.transacted {
            self.shared
                .pending_sends
                .lock()
                .push((destination.clone(), message));
        } else {
            self.shared.broker.publish(destination, message);
        }
        Ok(())
    }

    async fn commit(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.shared.transacted {
            return Err(MessagingError::Transaction(
                "commit on a non-transacted session".to_string(),
            ));
        }
        let sends = std::mem::take(&mut *self.shared.pending_sends.lock());
        for (destination, message) in sends {
            self.shared.broker.publish(&destination, message);
        }
        self.shared.pending_receipts.lock().clear();
        Ok(())
    }

    async fn rollback(&self) -> Result<()> {
        self.ensure_open()?;
        if !self.shared.transacted {
            return Err(MessagingError::Transaction(
                "rollback on a non-transacted session".to_string(),
            ));
        }
        self.shared.pending_sends.lock().clear();
        let receipts = std::mem::take(&mut *self.shared.pending_receipts.lock());
        for (mailbox, message) in receipts.into_iter().rev() {
            mailbox.requeue(Message {
                redelivered: true,
                ..message
            });
        }
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.shutdown();
        Ok(())
    }

    fn is_closed(&self) -> bool {
        self.shared.closed.load(Ordering::SeqCst)
    }
}

/// Consumer bound to one mailbox
struct MemoryConsumer {
    session: Arc<SessionShared>,
    mailbox: Arc<Mailbox>,
    selector: Option<Selector>,
}

#[async_trait]
impl MessageConsumer for MemoryConsumer {
    async fn receive(&mut self) -> Option<Message> {
        loop {
            // register interest before checking so no wakeup is lost
            let arrived = self.mailbox.arrived.notified();
            let closed = self.session.closed_notify.notified();

            if self.session.closed.load(Ordering::SeqCst) {
                return None;
            }
            if let Some(message) = self.mailbox.take(self.selector.as_ref()) {
                if self.session.transacted {
                    self.session
                        .pending_receipts
                        .lock()
                        .push((self.mailbox.clone(), message.clone()));
                }
                return Some(message);
            }

            tokio::select! {
                _ = arrived => {}
                _ = closed => {}
            }
        }
    }
}
