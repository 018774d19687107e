//! SOAP/JMS message listener
//!
//! Turns JMS messages into SOAP requests for an endpoint's invocation adapter
//! and sends the adapter's response back to the requester. On transacted
//! sessions the receive and the reply are committed together, or rolled back
//! so the request is redelivered.

use async_trait::async_trait;
use soapjms_core::{DeliveryMode, TransportUri};
use soapjms_messaging::{Destination, Message, MessageListener, Session};
use std::sync::Arc;
use tracing::{debug, error, warn};

use crate::endpoint::{InvocationAdapter, SoapRequest, SoapResponse};
use crate::error::{Error, Result};

pub const SOAP_ACTION_PROPERTY: &str = "SOAPJMS_soapAction";
pub const CONTENT_TYPE_PROPERTY: &str = "SOAPJMS_contentType";
pub const TARGET_SERVICE_PROPERTY: &str = "SOAPJMS_targetService";
pub const BINDING_VERSION_PROPERTY: &str = "SOAPJMS_bindingVersion";
pub const IS_FAULT_PROPERTY: &str = "SOAPJMS_isFault";
pub const REQUEST_URI_PROPERTY: &str = "SOAPJMS_requestURI";

pub const DELIVERY_MODE_PROPERTY: &str = "JMSDeliveryMode";
pub const TIME_TO_LIVE_PROPERTY: &str = "JMSTimeToLive";
pub const PRIORITY_PROPERTY: &str = "JMSPriority";

pub const BINDING_VERSION: &str = "1.0";
pub const DEFAULT_CONTENT_TYPE: &str = "text/xml; charset=utf-8";

/// Delivery settings a locator requests for replies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplyProperties {
    pub delivery_mode: Option<DeliveryMode>,
    pub time_to_live: Option<u64>,
    pub priority: Option<u8>,
}

impl ReplyProperties {
    /// Read `deliveryMode`, `timeToLive` and `priority`, rejecting bad values
    pub fn from_uri(uri: &TransportUri) -> Result<Self> {
        Ok(Self {
            delivery_mode: uri.delivery_mode()?,
            time_to_live: uri.time_to_live()?,
            priority: uri.priority()?,
        })
    }

    fn apply(&self, mut reply: Message) -> Message {
        if let Some(mode) = self.delivery_mode {
            let mode = match mode {
                DeliveryMode::Persistent => "PERSISTENT",
                DeliveryMode::NonPersistent => "NON_PERSISTENT",
            };
            reply = reply.with_property(DELIVERY_MODE_PROPERTY, mode);
        }
        if let Some(ttl) = self.time_to_live {
            reply = reply.with_property(TIME_TO_LIVE_PROPERTY, ttl.to_string());
        }
        if let Some(priority) = self.priority {
            reply = reply.with_property(PRIORITY_PROPERTY, priority.to_string());
        }
        reply
    }
}

/// Listener serving one endpoint on one session
pub struct SoapJmsListener {
    uri: TransportUri,
    reply_properties: ReplyProperties,
    adapter: Arc<dyn InvocationAdapter>,
    session: Arc<dyn Session>,
}

impl SoapJmsListener {
    /// Create a listener, failing if the locator's reply settings are invalid
    pub fn new(
        uri: TransportUri,
        adapter: Arc<dyn InvocationAdapter>,
        session: Arc<dyn Session>,
    ) -> Result<Self> {
        let reply_properties = ReplyProperties::from_uri(&uri)?;
        Ok(Self::with_reply_properties(
            uri,
            reply_properties,
            adapter,
            session,
        ))
    }

    /// Create a listener from reply settings already read from `uri`
    pub fn with_reply_properties(
        uri: TransportUri,
        reply_properties: ReplyProperties,
        adapter: Arc<dyn InvocationAdapter>,
        session: Arc<dyn Session>,
    ) -> Self {
        Self {
            uri,
            reply_properties,
            adapter,
            session,
        }
    }

    pub fn uri(&self) -> &TransportUri {
        &self.uri
    }

    fn endpoint(&self) -> &str {
        self.uri.endpoint_name().unwrap_or_default()
    }

    /// Process one message, completing the session's transaction if it has one
    pub async fn handle(&self, message: Message) -> Result<()> {
        let transacted = self.session.is_transacted()?;
        let message_id = message.id.clone();
        let outcome = self.process(message).await;

        if transacted {
            match &outcome {
                Ok(()) => self.session.commit().await?,
                Err(e) => {
                    debug!(endpoint = %self.endpoint(), message = %message_id, "rolling back: {}", e);
                    if let Err(source) = self.session.rollback().await {
                        error!(
                            endpoint = %self.endpoint(),
                            message = %message_id,
                            "unable to roll back message: {}", source
                        );
                        return Err(Error::RollbackFailed { message_id, source });
                    }
                }
            }
        }
        outcome
    }

    async fn process(&self, message: Message) -> Result<()> {
        let reply_to = message
            .reply_to
            .clone()
            .or_else(|| self.uri.reply_to_name().map(Destination::queue));
        let request = SoapRequest {
            endpoint: self.endpoint().to_string(),
            message_id: message.id.clone(),
            soap_action: message.property(SOAP_ACTION_PROPERTY).map(str::to_string),
            content_type: message.property(CONTENT_TYPE_PROPERTY).map(str::to_string),
            target_service: message
                .property(TARGET_SERVICE_PROPERTY)
                .or_else(|| self.uri.target_service())
                .map(str::to_string),
            body: message.body.clone(),
        };
        let request_content_type = request.content_type.clone();

        let response = self
            .adapter
            .invoke(request)
            .await
            .map_err(|e| Error::Invocation(format!("{:#}", e)))?;

        match (response, reply_to) {
            (Some(response), Some(destination)) => {
                let reply = self.reply(&message, response, request_content_type);
                self.session.send(&destination, reply).await?;
                debug!(endpoint = %self.endpoint(), destination = %destination, "sent SOAP reply");
            }
            (Some(_), None) => {
                warn!(
                    endpoint = %self.endpoint(),
                    message = %message.id,
                    "response dropped, request has no reply destination"
                );
            }
            (None, _) => {}
        }
        Ok(())
    }

    fn reply(
        &self,
        request: &Message,
        response: SoapResponse,
        request_content_type: Option<String>,
    ) -> Message {
        let content_type = response
            .content_type
            .or(request_content_type)
            .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());

        let reply = Message::new(response.body)
            .with_correlation_id(request.id.clone())
            .with_property(BINDING_VERSION_PROPERTY, BINDING_VERSION)
            .with_property(IS_FAULT_PROPERTY, response.fault.to_string())
            .with_property(CONTENT_TYPE_PROPERTY, content_type)
            .with_property(REQUEST_URI_PROPERTY, self.uri.to_string());
        self.reply_properties.apply(reply)
    }
}

#[async_trait]
impl MessageListener for SoapJmsListener {
    async fn on_message(&self, message: Message) -> anyhow::Result<()> {
        self.handle(message).await.map_err(anyhow::Error::from)
    }
}

impl std::fmt::Debug for SoapJmsListener {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SoapJmsListener")
            .field("uri", &self.uri.to_string())
            .field("reply_properties", &self.reply_properties)
            .finish()
    }
}
