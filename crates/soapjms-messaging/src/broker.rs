//! In-process message broker
//!
//! Queues hold one mailbox shared by competing consumers. Topics fan each
//! message out to one mailbox per live consumer; mailboxes of dropped
//! consumers are pruned on the next publish.

use dashmap::DashMap;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::{Arc, Weak};
use tokio::sync::Notify;
use tracing::trace;

use crate::message::{Destination, Message};
use crate::selector::Selector;

/// Pending messages for one queue or one topic subscriber
#[derive(Debug, Default)]
pub(crate) struct Mailbox {
    messages: Mutex<VecDeque<Message>>,
    pub(crate) arrived: Notify,
}

impl Mailbox {
    pub(crate) fn push(&self, message: Message) {
        self.messages.lock().push_back(message);
        self.arrived.notify_waiters();
    }

    /// Put a rolled-back message back at the head
    pub(crate) fn requeue(&self, message: Message) {
        self.messages.lock().push_front(message);
        self.arrived.notify_waiters();
    }

    /// Take the first message accepted by the selector
    pub(crate) fn take(&self, selector: Option<&Selector>) -> Option<Message> {
        let mut messages = self.messages.lock();
        let index = match selector {
            None => 0,
            Some(selector) => messages.iter().position(|m| selector.matches(m))?,
        };
        messages.remove(index)
    }

    fn len(&self) -> usize {
        self.messages.lock().len()
    }
}

/// Shared broker state for every connection created from the same broker
#[derive(Debug, Default)]
pub struct MemoryBroker {
    queues: DashMap<String, Arc<Mailbox>>,
    topics: DashMap<String, Vec<Weak<Mailbox>>>,
}

impl MemoryBroker {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Deliver a message right away
    pub fn publish(&self, destination: &Destination, message: Message) {
        trace!(%destination, id = %message.id, "publish");
        match destination {
            Destination::Queue(name) => self.queue(name).push(message),
            Destination::Topic(name) => {
                if let Some(mut subscribers) = self.topics.get_mut(name) {
                    subscribers.retain(|weak| weak.strong_count() > 0);
                    for mailbox in subscribers.iter().filter_map(Weak::upgrade) {
                        mailbox.push(message.clone());
                    }
                }
            }
        }
    }

    /// Number of messages waiting on a queue
    pub fn queue_depth(&self, name: &str) -> usize {
        self.queues.get(name).map(|q| q.len()).unwrap_or(0)
    }

    /// Take the next message from a queue without a consumer
    pub fn try_receive(&self, name: &str) -> Option<Message> {
        self.queues.get(name).and_then(|q| q.take(None))
    }

    pub(crate) fn queue(&self, name: &str) -> Arc<Mailbox> {
        self.queues
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(Mailbox::default()))
            .clone()
    }

    pub(crate) fn subscribe(&self, topic: &str) -> Arc<Mailbox> {
        let mailbox = Arc::new(Mailbox::default());
        self.topics
            .entry(topic.to_string())
            .or_default()
            .push(Arc::downgrade(&mailbox));
        mailbox
    }
}
