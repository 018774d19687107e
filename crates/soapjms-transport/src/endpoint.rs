//! Web-service endpoints exposed over JMS
//!
//! The endpoint registry owns endpoint declarations and knows how to build an
//! invocation adapter for each one. The transport only asks it for the
//! endpoints that use a binding it supports.

use async_trait::async_trait;
use bytes::Bytes;
use soapjms_core::SOAP_JMS_BINDING;
use std::collections::HashMap;
use std::sync::Arc;

/// One declared endpoint
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndpointDefinition {
    /// Endpoint name, unique in the registry
    pub name: String,
    pub service_name: String,
    pub port_name: String,
    /// Transport locator, `jms:<variant>:<destination>?params`
    pub url: String,
    pub binding: String,
}

impl EndpointDefinition {
    /// Declare an endpoint on the SOAP/JMS binding
    pub fn new(
        name: impl Into<String>,
        service_name: impl Into<String>,
        port_name: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            service_name: service_name.into(),
            port_name: port_name.into(),
            url: url.into(),
            binding: SOAP_JMS_BINDING.to_string(),
        }
    }

    pub fn with_binding(mut self, binding: impl Into<String>) -> Self {
        self.binding = binding.into();
        self
    }
}

/// A SOAP request taken off the queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapRequest {
    pub endpoint: String,
    pub message_id: String,
    pub soap_action: Option<String>,
    pub content_type: Option<String>,
    pub target_service: Option<String>,
    pub body: Bytes,
}

impl SoapRequest {
    pub fn text(&self) -> Option<&str> {
        std::str::from_utf8(&self.body).ok()
    }
}

/// A SOAP response to send back to the requester
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapResponse {
    pub body: Bytes,
    pub content_type: Option<String>,
    pub fault: bool,
}

impl SoapResponse {
    pub fn new(body: impl Into<Bytes>) -> Self {
        Self {
            body: body.into(),
            content_type: None,
            fault: false,
        }
    }

    pub fn fault(body: impl Into<Bytes>) -> Self {
        Self {
            fault: true,
            ..Self::new(body)
        }
    }

    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

/// Dispatches requests to the service implementation behind an endpoint
#[async_trait]
pub trait InvocationAdapter: Send + Sync {
    /// Handle one request; `None` for one-way operations
    async fn invoke(&self, request: SoapRequest) -> anyhow::Result<Option<SoapResponse>>;
}

/// Source of endpoint declarations
pub trait EndpointRegistry: Send + Sync {
    /// Endpoints whose binding is one of `bindings`, in declaration order
    fn endpoint_definitions(&self, bindings: &[&str]) -> Vec<EndpointDefinition>;

    /// Build the adapter serving `definition`
    fn create_adapter(
        &self,
        definition: &EndpointDefinition,
    ) -> anyhow::Result<Arc<dyn InvocationAdapter>>;
}

/// Registry over a fixed list of endpoints and their adapters
#[derive(Default)]
pub struct StaticEndpointRegistry {
    endpoints: Vec<EndpointDefinition>,
    adapters: HashMap<String, Arc<dyn InvocationAdapter>>,
}

impl StaticEndpointRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare an endpoint served by `adapter`, replacing any with the same name
    pub fn register(
        &mut self,
        definition: EndpointDefinition,
        adapter: Arc<dyn InvocationAdapter>,
    ) -> &mut Self {
        self.endpoints.retain(|existing| existing.name != definition.name);
        self.adapters.insert(definition.name.clone(), adapter);
        self.endpoints.push(definition);
        self
    }

    pub fn with_endpoint(
        mut self,
        definition: EndpointDefinition,
        adapter: Arc<dyn InvocationAdapter>,
    ) -> Self {
        self.register(definition, adapter);
        self
    }

    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }
}

impl EndpointRegistry for StaticEndpointRegistry {
    fn endpoint_definitions(&self, bindings: &[&str]) -> Vec<EndpointDefinition> {
        self.endpoints
            .iter()
            .filter(|definition| bindings.contains(&definition.binding.as_str()))
            .cloned()
            .collect()
    }

    fn create_adapter(
        &self,
        definition: &EndpointDefinition,
    ) -> anyhow::Result<Arc<dyn InvocationAdapter>> {
        self.adapters
            .get(&definition.name)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("no adapter registered for endpoint {}", definition.name))
    }
}
