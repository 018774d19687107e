//! Common test helpers for the SOAP/JMS crates
//!
//! This crate provides:
//! - Condition-based waiting (no hardcoded sleeps)
//! - An in-process messaging environment (broker, host, directories)
//! - Connection factories that count, delay and fail on demand
//! - Invocation adapters that record requests

use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use soapjms_core::Configuration;
use soapjms_messaging::{
    Connection, ConnectionDefinition, ConnectionFactory, MemoryBroker, MemoryConnection,
    MemoryDirectory, MemoryDirectoryProvider, MemoryHost, MessagingError, Session,
};
use soapjms_transport::{
    EndpointDefinition, InvocationAdapter, SoapJmsTransport, SoapRequest, SoapResponse,
    StaticEndpointRegistry,
};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Default test timeout
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default condition check interval
pub const DEFAULT_CHECK_INTERVAL: Duration = Duration::from_millis(10);

// ============================================================================
// Condition-Based Waiting
// ============================================================================

/// Wait for a condition with timeout - condition-based, not time-based
pub async fn wait_for<F>(check: F, max_wait: Duration) -> bool
where
    F: Fn() -> bool,
{
    let start = Instant::now();
    while start.elapsed() < max_wait {
        if check() {
            return true;
        }
        tokio::time::sleep(DEFAULT_CHECK_INTERVAL).await;
    }
    check()
}

/// Wait for a counter to reach a target value
pub async fn wait_for_count(counter: &AtomicUsize, target: usize, max_wait: Duration) -> bool {
    wait_for(|| counter.load(Ordering::SeqCst) >= target, max_wait).await
}

/// Whether two handles point at the same connection
pub fn same_connection(a: &Arc<dyn Connection>, b: &Arc<dyn Connection>) -> bool {
    Arc::as_ptr(a) as *const u8 == Arc::as_ptr(b) as *const u8
}

// ============================================================================
// Messaging Environment
// ============================================================================

/// Broker, host and directories wired together
pub struct TestEnvironment {
    pub broker: Arc<MemoryBroker>,
    pub host: Arc<MemoryHost>,
    pub directories: Arc<MemoryDirectoryProvider>,
}

impl TestEnvironment {
    pub fn new() -> Self {
        Self {
            broker: MemoryBroker::new(),
            host: Arc::new(MemoryHost::new()),
            directories: Arc::new(MemoryDirectoryProvider::new()),
        }
    }

    /// Register a named connection with the host
    pub fn add_connection(&self, name: &str) -> Arc<MemoryConnection> {
        let connection = Arc::new(MemoryConnection::new(name, self.broker.clone()));
        self.host
            .add_connection(connection.clone())
            .expect("connection name already registered");
        connection
    }

    /// Bind a counting factory in the default directory
    pub fn bind_factory(&self, name: &str) -> Arc<CountingConnectionFactory> {
        let factory = Arc::new(CountingConnectionFactory::new(self.broker.clone()));
        self.directory().bind_factory(name, factory.clone());
        factory
    }

    pub fn directory(&self) -> Arc<MemoryDirectory> {
        self.directories.default_directory()
    }

    /// A transport over this environment
    pub fn transport(&self, config: Configuration) -> SoapJmsTransport {
        SoapJmsTransport::new(config, self.host.clone(), self.directories.clone())
    }
}

impl Default for TestEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry with one SOAP/JMS endpoint per `(name, url)` pair, service `svc-<name>`
pub fn registry_of(
    endpoints: &[(&str, &str)],
    adapter: Arc<dyn InvocationAdapter>,
) -> StaticEndpointRegistry {
    let mut registry = StaticEndpointRegistry::new();
    for (name, url) in endpoints {
        registry.register(
            EndpointDefinition::new(*name, format!("svc-{}", name), format!("{}Port", name), *url),
            adapter.clone(),
        );
    }
    registry
}

// ============================================================================
// Connection Factories
// ============================================================================

/// Connection factory that counts, delays and fails on demand
pub struct CountingConnectionFactory {
    broker: Arc<MemoryBroker>,
    delay: Mutex<Duration>,
    fail_next: AtomicUsize,
    fail_close: Mutex<bool>,
    attempts: AtomicUsize,
    connections: Mutex<Vec<Arc<TestConnection>>>,
}

impl CountingConnectionFactory {
    pub fn new(broker: Arc<MemoryBroker>) -> Self {
        Self {
            broker,
            delay: Mutex::new(Duration::ZERO),
            fail_next: AtomicUsize::new(0),
            fail_close: Mutex::new(false),
            attempts: AtomicUsize::new(0),
            connections: Mutex::new(Vec::new()),
        }
    }

    /// Wait this long before each connection is produced
    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    /// Fail the next `count` creations
    pub fn fail_next(&self, count: usize) {
        self.fail_next.store(count, Ordering::SeqCst);
    }

    /// Make connections created from now on fail to close
    pub fn set_fail_close(&self, fail: bool) {
        *self.fail_close.lock() = fail;
    }

    /// Creation attempts, failed ones included
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    /// Connections successfully created
    pub fn created(&self) -> usize {
        self.connections.lock().len()
    }

    pub fn connections(&self) -> Vec<Arc<TestConnection>> {
        self.connections.lock().clone()
    }
}

#[async_trait]
impl ConnectionFactory for CountingConnectionFactory {
    async fn create_connection(
        &self,
        definition: &ConnectionDefinition,
    ) -> soapjms_messaging::Result<Arc<dyn Connection>> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        let delay = *self.delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let should_fail = self
            .fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(MessagingError::ConnectionFailed(format!(
                "refused connection {}",
                definition.name
            )));
        }
        let connection = Arc::new(TestConnection {
            inner: MemoryConnection::new(&definition.name, self.broker.clone()),
            fail_close: *self.fail_close.lock(),
            close_calls: AtomicUsize::new(0),
        });
        self.connections.lock().push(connection.clone());
        Ok(connection)
    }
}

/// In-process connection that records close calls
pub struct TestConnection {
    inner: MemoryConnection,
    fail_close: bool,
    close_calls: AtomicUsize,
}

impl TestConnection {
    pub fn close_calls(&self) -> usize {
        self.close_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for TestConnection {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn create_session(&self, transacted: bool) -> soapjms_messaging::Result<Arc<dyn Session>> {
        self.inner.create_session(transacted).await
    }

    async fn close(&self) -> soapjms_messaging::Result<()> {
        self.close_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_close {
            return Err(MessagingError::Other(format!(
                "connection {} refused to close",
                self.inner.name()
            )));
        }
        self.inner.close().await
    }

    fn is_closed(&self) -> bool {
        self.inner.is_closed()
    }
}

// ============================================================================
// Invocation Adapters
// ============================================================================

/// Adapter that records requests and answers with a fixed outcome
pub struct RecordingAdapter {
    requests: Mutex<Vec<SoapRequest>>,
    outcome: Outcome,
    calls: AtomicUsize,
}

enum Outcome {
    Echo,
    OneWay,
    Fail(String),
}

impl RecordingAdapter {
    /// Reply with the request body
    pub fn echo() -> Arc<Self> {
        Self::with_outcome(Outcome::Echo)
    }

    /// Never reply
    pub fn one_way() -> Arc<Self> {
        Self::with_outcome(Outcome::OneWay)
    }

    /// Fail every invocation
    pub fn failing(reason: &str) -> Arc<Self> {
        Self::with_outcome(Outcome::Fail(reason.to_string()))
    }

    fn with_outcome(outcome: Outcome) -> Arc<Self> {
        Arc::new(Self {
            requests: Mutex::new(Vec::new()),
            outcome,
            calls: AtomicUsize::new(0),
        })
    }

    pub fn requests(&self) -> Vec<SoapRequest> {
        self.requests.lock().clone()
    }

    pub fn calls(&self) -> &AtomicUsize {
        &self.calls
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InvocationAdapter for RecordingAdapter {
    async fn invoke(&self, request: SoapRequest) -> anyhow::Result<Option<SoapResponse>> {
        let body: Bytes = request.body.clone();
        self.requests.lock().push(request);
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.outcome {
            Outcome::Echo => Ok(Some(SoapResponse::new(body))),
            Outcome::OneWay => Ok(None),
            Outcome::Fail(reason) => Err(anyhow::anyhow!("{}", reason)),
        }
    }
}
