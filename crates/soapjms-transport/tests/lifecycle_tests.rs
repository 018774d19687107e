//! Transport lifecycle and endpoint binding tests
//!
//! Covers:
//! - Binding endpoints over registered and directory connections
//! - Per-endpoint listener configuration
//! - Startup failures
//! - Request/reply through a bound endpoint
//! - Stop semantics

use soapjms_core::Configuration;
use soapjms_messaging::{Connection, Destination, Message, MessagingError};
use soapjms_test_utils::{registry_of, wait_for, RecordingAdapter, TestEnvironment, DEFAULT_TIMEOUT};
use soapjms_transport::{EndpointDefinition, Error, StaticEndpointRegistry};
use std::sync::Arc;

// ============================================================================
// Binding
// ============================================================================

#[tokio::test]
async fn test_bind_endpoint_on_registered_connection() {
    let env = TestEnvironment::new();
    env.add_connection("conn1");
    let transport = env.transport(Configuration::new());
    let registry = registry_of(
        &[("svcA", "jms:queue:svcA.requests?connectionName=conn1")],
        RecordingAdapter::echo(),
    );

    let bound = transport.start(&registry).await.unwrap();

    assert_eq!(bound.len(), 1);
    let binding = bound.get("svcA").unwrap();
    assert_eq!(binding.listener_name, "ws-svcA-listener");
    assert_eq!(binding.connection_name, "conn1");
    assert_eq!(binding.destination, Destination::queue("svcA.requests"));
    assert!(binding.transacted);
    assert_eq!(binding.selector, None);
    assert_eq!(binding.poller, None);

    let listener = env.host.listener("ws-svcA-listener").unwrap();
    assert_eq!(listener.connection_name, "conn1");
    assert_eq!(listener.selector, None);
    assert!(!listener.polled);

    transport.stop().await;
}

#[tokio::test]
async fn test_endpoints_share_registered_connection() {
    let env = TestEnvironment::new();
    env.add_connection("conn1");
    let transport = env.transport(Configuration::new());
    let registry = registry_of(
        &[
            ("svcA", "jms:queue:svcA.requests?connectionName=conn1"),
            ("svcB", "jms:topic:svcB.events?connectionName=conn1"),
        ],
        RecordingAdapter::one_way(),
    );

    let bound = transport.start(&registry).await.unwrap();

    assert_eq!(bound.listener_names(), vec!["ws-svcA-listener", "ws-svcB-listener"]);
    assert!(bound.iter().all(|b| b.connection_name == "conn1"));
    assert_eq!(
        bound.get("svcB").unwrap().destination,
        Destination::topic("svcB.events")
    );
    assert_eq!(env.host.connection_names(), vec!["conn1"]);
}

#[tokio::test]
async fn test_identical_directory_locators_share_connection() {
    let env = TestEnvironment::new();
    let factory = env.bind_factory("cf");
    env.directory()
        .bind_destination("orders", Destination::queue("orders.in"));
    let transport = env.transport(Configuration::new());
    let url = "jms:jndi:orders?jndiConnectionFactoryName=cf";
    let registry = registry_of(&[("first", url), ("second", url)], RecordingAdapter::echo());

    let bound = transport.start(&registry).await.unwrap();

    assert_eq!(factory.created(), 1);
    assert_eq!(
        bound.get("first").unwrap().connection_name,
        "ws-anon-connection-0"
    );
    assert_eq!(
        bound.get("second").unwrap().connection_name,
        "ws-anon-connection-0"
    );
    assert_eq!(
        bound.get("first").unwrap().destination,
        Destination::queue("orders.in")
    );
    assert_eq!(transport.connection_cache().unwrap().len(), 1);
}

#[tokio::test]
async fn test_endpoint_configuration_overrides() {
    let env = TestEnvironment::new();
    env.add_connection("conn1");
    let config = Configuration::from_pairs([
        ("endpoint.svcA.selector", "region = 'EU'"),
        ("endpoint.svcA.poller", "simple"),
        ("endpoint.svcA.transactional", "false"),
        ("jms.selector", "region = 'US'"),
    ]);
    let transport = env.transport(config);
    let registry = registry_of(
        &[
            ("svcA", "jms:queue:svcA.requests?connectionName=conn1"),
            ("svcB", "jms:queue:svcB.requests?connectionName=conn1"),
        ],
        RecordingAdapter::echo(),
    );

    let bound = transport.start(&registry).await.unwrap();

    let a = bound.get("svcA").unwrap();
    assert_eq!(a.selector.as_deref(), Some("region = 'EU'"));
    assert_eq!(a.poller.as_deref(), Some("simple"));
    assert!(!a.transacted);
    assert!(env.host.listener("ws-svcA-listener").unwrap().polled);

    let b = bound.get("svcB").unwrap();
    assert_eq!(b.selector.as_deref(), Some("region = 'US'"));
    assert_eq!(b.poller, None);
    assert!(b.transacted);
}

#[tokio::test]
async fn test_other_bindings_are_ignored() {
    let env = TestEnvironment::new();
    env.add_connection("conn1");
    let transport = env.transport(Configuration::new());
    let registry = StaticEndpointRegistry::new()
        .with_endpoint(
            EndpointDefinition::new(
                "svcA",
                "ServiceA",
                "PortA",
                "jms:queue:svcA.requests?connectionName=conn1",
            ),
            RecordingAdapter::echo(),
        )
        .with_endpoint(
            EndpointDefinition::new("http", "ServiceH", "PortH", "jms:queue:ignored")
                .with_binding("http://schemas.xmlsoap.org/soap/http"),
            RecordingAdapter::echo(),
        );

    let bound = transport.start(&registry).await.unwrap();

    assert_eq!(bound.len(), 1);
    assert!(bound.get("http").is_none());
}

#[tokio::test]
async fn test_no_endpoints() {
    let env = TestEnvironment::new();
    let transport = env.transport(Configuration::new());

    let bound = transport.start(&StaticEndpointRegistry::new()).await.unwrap();

    assert!(bound.is_empty());
    assert!(transport.connection_cache().unwrap().is_empty());
}

// ============================================================================
// Startup Failures
// ============================================================================

#[tokio::test]
async fn test_unknown_poller() {
    let env = TestEnvironment::new();
    env.add_connection("conn1");
    let transport = env.transport(Configuration::from_pairs([("poller", "missing")]));
    let registry = registry_of(
        &[("svcA", "jms:queue:svcA.requests?connectionName=conn1")],
        RecordingAdapter::echo(),
    );

    let err = transport.start(&registry).await.unwrap_err();

    match err {
        Error::Endpoint {
            service,
            port,
            source,
        } => {
            assert_eq!(service, "svc-svcA");
            assert_eq!(port, "svcAPort");
            match *source {
                Error::InvalidPollerClass { name, listener } => {
                    assert_eq!(name, "missing");
                    assert_eq!(listener, "ws-svcA-listener");
                }
                other => panic!("unexpected source: {}", other),
            }
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(env.host.listener_count(), 0);
}

#[tokio::test]
async fn test_malformed_url_names_endpoint() {
    let env = TestEnvironment::new();
    let transport = env.transport(Configuration::new());
    let registry = registry_of(&[("svcA", "http://example.com/svcA")], RecordingAdapter::echo());

    let err = transport.start(&registry).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Endpoint { ref service, ref source, .. }
            if service == "svc-svcA"
                && matches!(**source, Error::Locator(soapjms_core::Error::MalformedLocator { .. }))
    ));
}

#[tokio::test]
async fn test_invalid_reply_priority_fails_startup() {
    let env = TestEnvironment::new();
    let factory = env.bind_factory("cf");
    env.add_connection("conn1");
    let transport = env.transport(Configuration::new());
    let registry = registry_of(
        &[
            ("svcA", "jms:queue:svcA.requests?connectionName=conn1&priority=42"),
            ("svcB", "jms:jndi:q?jndiConnectionFactoryName=cf&timeToLive=-5"),
        ],
        RecordingAdapter::echo(),
    );

    let err = transport.start(&registry).await.unwrap_err();

    match err {
        Error::Endpoint {
            service,
            port,
            source,
        } => {
            assert_eq!(service, "svc-svcA");
            assert_eq!(port, "svcAPort");
            assert!(matches!(
                *source,
                Error::Locator(soapjms_core::Error::MalformedLocator { .. })
            ));
        }
        other => panic!("unexpected error: {}", other),
    }
    assert_eq!(env.host.listener_count(), 0);
    assert!(transport.connection_cache().unwrap().is_empty());
    assert_eq!(factory.attempts(), 0);
}

#[tokio::test]
async fn test_listener_registration_failure() {
    let env = TestEnvironment::new();
    env.add_connection("conn1");
    let transport = env.transport(Configuration::from_pairs([("selector", "not a selector")]));
    let registry = registry_of(
        &[("svcA", "jms:queue:svcA.requests?connectionName=conn1")],
        RecordingAdapter::echo(),
    );

    let err = transport.start(&registry).await.unwrap_err();

    match err {
        Error::Endpoint { source, .. } => match *source {
            Error::ListenerRegistrationFailed { listener, source } => {
                assert_eq!(listener, "ws-svcA-listener");
                assert!(matches!(source, MessagingError::InvalidSelector(_)));
            }
            other => panic!("unexpected source: {}", other),
        },
        other => panic!("unexpected error: {}", other),
    }
}

#[tokio::test]
async fn test_first_failure_aborts_startup() {
    let env = TestEnvironment::new();
    env.add_connection("conn1");
    let transport = env.transport(Configuration::new());
    let registry = registry_of(
        &[
            ("svcA", "jms:queue:svcA.requests?connectionName=conn1"),
            ("svcB", "jms:queue:svcB.requests?connectionName=missing"),
            ("svcC", "jms:queue:svcC.requests?connectionName=conn1"),
        ],
        RecordingAdapter::echo(),
    );

    let err = transport.start(&registry).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Endpoint { ref service, ref source, .. }
            if service == "svc-svcB"
                && matches!(**source, Error::ConnectionResolutionFailed { .. })
    ));
    assert!(env.host.listener("ws-svcA-listener").is_some());
    assert!(env.host.listener("ws-svcC-listener").is_none());

    // teardown after a failed start still works
    transport.stop().await;
}

#[tokio::test]
async fn test_jndi_destination_must_be_a_destination() {
    let env = TestEnvironment::new();
    env.bind_factory("cf");
    let transport = env.transport(Configuration::new());
    let registry = registry_of(
        &[("svcA", "jms:jndi:cf?jndiConnectionFactoryName=cf")],
        RecordingAdapter::echo(),
    );

    let err = transport.start(&registry).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Endpoint { ref source, .. }
            if matches!(
                **source,
                Error::DestinationResolutionFailed {
                    source: MessagingError::NotADestination(_),
                    ..
                }
            )
    ));
}

#[tokio::test]
async fn test_start_twice() {
    let env = TestEnvironment::new();
    let transport = env.transport(Configuration::new());
    let registry = StaticEndpointRegistry::new();

    transport.start(&registry).await.unwrap();

    assert!(matches!(
        transport.start(&registry).await,
        Err(Error::AlreadyStarted)
    ));
}

#[tokio::test]
async fn test_invalid_cache_size() {
    let env = TestEnvironment::new();
    let transport = env.transport(Configuration::from_pairs([(
        "transport-cache.max-size",
        "lots",
    )]));

    let err = transport.start(&StaticEndpointRegistry::new()).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Locator(soapjms_core::Error::InvalidConfig { .. })
    ));
}

// ============================================================================
// Request / Reply
// ============================================================================

#[tokio::test]
async fn test_request_reply_through_bound_endpoint() {
    let env = TestEnvironment::new();
    env.add_connection("conn1");
    let adapter = RecordingAdapter::echo();
    let transport = env.transport(Configuration::new());
    let registry = registry_of(
        &[("svcA", "jms:queue:svcA.requests?connectionName=conn1")],
        adapter.clone(),
    );
    transport.start(&registry).await.unwrap();

    let request = Message::new("<Envelope/>")
        .with_property("SOAPJMS_soapAction", "urn:getOrder")
        .with_property("SOAPJMS_contentType", "text/xml")
        .with_reply_to(Destination::queue("svcA.replies"));
    let request_id = request.id.clone();
    env.broker
        .publish(&Destination::queue("svcA.requests"), request);

    assert!(wait_for(|| env.broker.queue_depth("svcA.replies") == 1, DEFAULT_TIMEOUT).await);
    let reply = env.broker.try_receive("svcA.replies").unwrap();
    assert_eq!(reply.correlation_id.as_deref(), Some(request_id.as_str()));
    assert_eq!(reply.text(), Some("<Envelope/>"));
    assert_eq!(reply.property("SOAPJMS_bindingVersion"), Some("1.0"));
    assert_eq!(reply.property("SOAPJMS_isFault"), Some("false"));
    assert_eq!(reply.property("SOAPJMS_contentType"), Some("text/xml"));

    let requests = adapter.requests();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].endpoint, "svcA");
    assert_eq!(requests[0].soap_action.as_deref(), Some("urn:getOrder"));

    transport.stop().await;
}

#[tokio::test]
async fn test_polled_endpoint_receives_requests() {
    let env = TestEnvironment::new();
    env.add_connection("conn1");
    let adapter = RecordingAdapter::one_way();
    let transport = env.transport(Configuration::from_pairs([("poller", "simple")]));
    let registry = registry_of(
        &[("svcA", "jms:queue:svcA.requests?connectionName=conn1")],
        adapter.clone(),
    );
    transport.start(&registry).await.unwrap();

    for i in 0..3 {
        env.broker.publish(
            &Destination::queue("svcA.requests"),
            Message::new(format!("request-{}", i)),
        );
    }

    assert!(wait_for(|| adapter.call_count() == 3, DEFAULT_TIMEOUT).await);
    assert_eq!(env.broker.queue_depth("svcA.requests"), 0);
}

// ============================================================================
// Stop
// ============================================================================

#[tokio::test]
async fn test_stop_without_start() {
    let env = TestEnvironment::new();
    let transport = env.transport(Configuration::new());

    transport.stop().await;
    transport.stop().await;

    assert!(transport.connection_cache().is_none());
}

#[tokio::test]
async fn test_stop_releases_created_connections() {
    let env = TestEnvironment::new();
    let factory = env.bind_factory("cf");
    env.directory()
        .bind_destination("orders", Destination::queue("orders.in"));
    let registered = env.add_connection("conn1");
    let transport = env.transport(Configuration::new());
    let registry = registry_of(
        &[
            ("orders", "jms:jndi:orders?jndiConnectionFactoryName=cf"),
            ("svcA", "jms:queue:svcA.requests?connectionName=conn1"),
        ],
        RecordingAdapter::echo(),
    );
    transport.start(&registry).await.unwrap();

    transport.stop().await;
    transport.stop().await;

    let created = factory.connections();
    assert_eq!(created.len(), 1);
    assert!(created[0].is_closed());
    assert_eq!(created[0].close_calls(), 1);
    assert!(!registered.is_closed());
    assert!(transport.connection_cache().unwrap().is_empty());
}

#[tokio::test]
async fn test_adapter_creation_failure() {
    struct NoAdapters;

    impl soapjms_transport::EndpointRegistry for NoAdapters {
        fn endpoint_definitions(&self, _bindings: &[&str]) -> Vec<EndpointDefinition> {
            vec![EndpointDefinition::new(
                "svcA",
                "ServiceA",
                "PortA",
                "jms:queue:svcA.requests?connectionName=conn1",
            )]
        }

        fn create_adapter(
            &self,
            _definition: &EndpointDefinition,
        ) -> anyhow::Result<Arc<dyn soapjms_transport::InvocationAdapter>> {
            anyhow::bail!("implementation class not found")
        }
    }

    let env = TestEnvironment::new();
    env.add_connection("conn1");
    let transport = env.transport(Configuration::new());

    let err = transport.start(&NoAdapters).await.unwrap_err();

    assert!(matches!(
        err,
        Error::Endpoint { ref port, ref source, .. }
            if port == "PortA" && matches!(**source, Error::AdapterCreationFailed { .. })
    ));
}
