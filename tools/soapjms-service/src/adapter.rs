//! Built-in invocation adapters

use async_trait::async_trait;
use soapjms_transport::{InvocationAdapter, SoapRequest, SoapResponse};
use std::sync::Arc;
use tracing::info;

use crate::config::AdapterKind;

/// Replies with the request body
#[derive(Debug, Default)]
pub struct EchoAdapter;

#[async_trait]
impl InvocationAdapter for EchoAdapter {
    async fn invoke(&self, request: SoapRequest) -> anyhow::Result<Option<SoapResponse>> {
        let mut response = SoapResponse::new(request.body);
        if let Some(content_type) = request.content_type {
            response = response.with_content_type(content_type);
        }
        Ok(Some(response))
    }
}

/// Logs each request, never replies
#[derive(Debug, Default)]
pub struct LogAdapter;

#[async_trait]
impl InvocationAdapter for LogAdapter {
    async fn invoke(&self, request: SoapRequest) -> anyhow::Result<Option<SoapResponse>> {
        info!(
            endpoint = %request.endpoint,
            message = %request.message_id,
            action = request.soap_action.as_deref().unwrap_or("-"),
            bytes = request.body.len(),
            "received SOAP request"
        );
        Ok(None)
    }
}

pub fn adapter_for(kind: AdapterKind) -> Arc<dyn InvocationAdapter> {
    match kind {
        AdapterKind::Echo => Arc::new(EchoAdapter),
        AdapterKind::Log => Arc::new(LogAdapter),
    }
}
