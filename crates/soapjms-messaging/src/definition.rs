//! Connection and listener definitions

use soapjms_core::Configuration;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use crate::error::{MessagingError, Result};
use crate::message::Destination;
use crate::traits::{ConnectionFactory, MessageListener, MessagePoller, Session};

pub const CLIENT_ID_KEY: &str = "client-id";
pub const USER_KEY: &str = "user";
pub const PASSWORD_KEY: &str = "password";
pub const RECONNECTION_DELAY_KEY: &str = "reconnection-delay";

/// Default delay between reconnection attempts (milliseconds)
pub const DEFAULT_RECONNECTION_DELAY_MS: u64 = 30_000;

/// Builds a fresh poller for each listener that asks for one
pub type PollerFactory = Arc<dyn Fn() -> Box<dyn MessagePoller> + Send + Sync>;

/// Everything needed to create and register one connection
#[derive(Clone)]
pub struct ConnectionDefinition {
    pub name: String,
    pub client_id: Option<String>,
    pub user: Option<String>,
    pub password: Option<String>,
    pub reconnection_delay: Duration,
    pub factory: Arc<dyn ConnectionFactory>,
}

impl ConnectionDefinition {
    /// Read connection settings from an endpoint's effective configuration
    pub fn from_configuration(
        name: &str,
        config: &Configuration,
        factory: Arc<dyn ConnectionFactory>,
    ) -> Result<Self> {
        if name.trim().is_empty() {
            return Err(MessagingError::InvalidDefinition(
                "connection name is blank".to_string(),
            ));
        }
        let user = config.get_string(USER_KEY);
        let password = config.get_string(PASSWORD_KEY);
        if password.is_some() && user.is_none() {
            return Err(MessagingError::InvalidDefinition(format!(
                "connection {} has a password but no user",
                name
            )));
        }

        Ok(Self {
            name: name.to_string(),
            client_id: config.get_string(CLIENT_ID_KEY),
            user,
            password,
            reconnection_delay: Duration::from_millis(
                config.get_u64(RECONNECTION_DELAY_KEY, DEFAULT_RECONNECTION_DELAY_MS)?,
            ),
            factory,
        })
    }
}

impl fmt::Debug for ConnectionDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionDefinition")
            .field("name", &self.name)
            .field("client_id", &self.client_id)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("reconnection_delay", &self.reconnection_delay)
            .finish()
    }
}

/// A message listener ready to be registered with the host
#[derive(Clone)]
pub struct ListenerDefinition {
    pub name: String,
    /// Connection the session belongs to
    pub connection_name: String,
    pub session: Arc<dyn Session>,
    pub destination: Destination,
    pub selector: Option<String>,
    pub listener: Arc<dyn MessageListener>,
    /// Pull-based delivery when set, push delivery otherwise
    pub poller: Option<PollerFactory>,
}

impl fmt::Debug for ListenerDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ListenerDefinition")
            .field("name", &self.name)
            .field("connection_name", &self.connection_name)
            .field("destination", &self.destination)
            .field("selector", &self.selector)
            .field("poller", &self.poller.is_some())
            .finish()
    }
}
