//! Built-in message pollers

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::error::Result;
use crate::traits::{MessageConsumer, MessageListener, MessagePoller};

/// Registry name of [`SimpleMessagePoller`]
pub const SIMPLE_POLLER: &str = "simple";

/// Receives with a bounded wait, hands each message to the listener in turn
#[derive(Debug, Clone)]
pub struct SimpleMessagePoller {
    receive_timeout: Duration,
}

impl Default for SimpleMessagePoller {
    fn default() -> Self {
        Self {
            receive_timeout: Duration::from_millis(500),
        }
    }
}

impl SimpleMessagePoller {
    pub fn new(receive_timeout: Duration) -> Self {
        Self { receive_timeout }
    }
}

#[async_trait]
impl MessagePoller for SimpleMessagePoller {
    async fn run(
        &self,
        mut consumer: Box<dyn MessageConsumer>,
        listener: Arc<dyn MessageListener>,
    ) -> Result<()> {
        loop {
            match tokio::time::timeout(self.receive_timeout, consumer.receive()).await {
                Ok(Some(message)) => {
                    let id = message.id.clone();
                    if let Err(e) = listener.on_message(message).await {
                        warn!(message = %id, "listener failed: {:#}", e);
                    }
                }
                Ok(None) => {
                    debug!("session closed, poller exiting");
                    return Ok(());
                }
                Err(_) => continue,
            }
        }
    }
}
