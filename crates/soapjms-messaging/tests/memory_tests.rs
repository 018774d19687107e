//! In-process broker tests
//!
//! Covers:
//! - Queue and topic delivery
//! - Selector filtering
//! - Transacted sessions (commit / rollback / redelivery)
//! - Closing connections and sessions

use soapjms_core::Configuration;
use soapjms_messaging::{
    Connection, ConnectionDefinition, ConnectionFactory, Destination, MemoryBroker,
    MemoryConnection, MemoryConnectionFactory, Message, MessageConsumer, MessagingError, Session,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

const WAIT: Duration = Duration::from_secs(2);

fn connection(broker: &Arc<MemoryBroker>) -> MemoryConnection {
    MemoryConnection::new("test", broker.clone())
}

#[tokio::test]
async fn test_queue_delivers_to_one_consumer() {
    let broker = MemoryBroker::new();
    let conn = connection(&broker);
    let session = conn.create_session(false).await.unwrap();
    let queue = session.create_queue("orders").unwrap();

    let mut first = session.create_consumer(&queue, None).await.unwrap();
    let mut second = session.create_consumer(&queue, None).await.unwrap();

    session.send(&queue, Message::new("one")).await.unwrap();

    let got = timeout(WAIT, first.receive()).await.unwrap().unwrap();
    assert_eq!(got.text(), Some("one"));
    assert!(
        timeout(Duration::from_millis(50), second.receive()).await.is_err(),
        "queue message must not be delivered twice"
    );
}

#[tokio::test]
async fn test_receive_waits_for_message() {
    let broker = MemoryBroker::new();
    let conn = connection(&broker);
    let session = conn.create_session(false).await.unwrap();
    let queue = Destination::queue("late");
    let mut consumer = session.create_consumer(&queue, None).await.unwrap();

    let publisher = broker.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        publisher.publish(&Destination::queue("late"), Message::new("eventually"));
    });

    let got = timeout(WAIT, consumer.receive()).await.unwrap().unwrap();
    assert_eq!(got.text(), Some("eventually"));
}

#[tokio::test]
async fn test_topic_fans_out() {
    let broker = MemoryBroker::new();
    let conn = connection(&broker);
    let session = conn.create_session(false).await.unwrap();
    let topic = session.create_topic("prices").unwrap();

    let mut a = session.create_consumer(&topic, None).await.unwrap();
    let mut b = session.create_consumer(&topic, None).await.unwrap();
    session.send(&topic, Message::new("tick")).await.unwrap();

    assert_eq!(timeout(WAIT, a.receive()).await.unwrap().unwrap().text(), Some("tick"));
    assert_eq!(timeout(WAIT, b.receive()).await.unwrap().unwrap().text(), Some("tick"));
}

#[tokio::test]
async fn test_selector_skips_non_matching() {
    let broker = MemoryBroker::new();
    let conn = connection(&broker);
    let session = conn.create_session(false).await.unwrap();
    let queue = Destination::queue("regional");

    let mut eu = session
        .create_consumer(&queue, Some("region = 'EU'"))
        .await
        .unwrap();
    session
        .send(&queue, Message::new("us").with_property("region", "US"))
        .await
        .unwrap();
    session
        .send(&queue, Message::new("eu").with_property("region", "EU"))
        .await
        .unwrap();

    let got = timeout(WAIT, eu.receive()).await.unwrap().unwrap();
    assert_eq!(got.text(), Some("eu"));
    assert_eq!(broker.queue_depth("regional"), 1);
}

#[tokio::test]
async fn test_invalid_selector_is_rejected() {
    let broker = MemoryBroker::new();
    let conn = connection(&broker);
    let session = conn.create_session(false).await.unwrap();
    let result = session
        .create_consumer(&Destination::queue("q"), Some("nonsense"))
        .await;
    assert!(matches!(result, Err(MessagingError::InvalidSelector(_))));
}

#[tokio::test]
async fn test_transacted_send_waits_for_commit() {
    let broker = MemoryBroker::new();
    let conn = connection(&broker);
    let session = conn.create_session(true).await.unwrap();
    assert!(session.is_transacted().unwrap());

    let queue = Destination::queue("tx");
    session.send(&queue, Message::new("a")).await.unwrap();
    assert_eq!(broker.queue_depth("tx"), 0);

    session.commit().await.unwrap();
    assert_eq!(broker.queue_depth("tx"), 1);
}

#[tokio::test]
async fn test_rollback_redelivers() {
    let broker = MemoryBroker::new();
    let conn = connection(&broker);
    let session = conn.create_session(true).await.unwrap();
    let queue = Destination::queue("retry");
    broker.publish(&queue, Message::new("payload"));

    let mut consumer = session.create_consumer(&queue, None).await.unwrap();
    let first = timeout(WAIT, consumer.receive()).await.unwrap().unwrap();
    assert!(!first.redelivered);
    assert_eq!(broker.queue_depth("retry"), 0);

    session.rollback().await.unwrap();
    let again = timeout(WAIT, consumer.receive()).await.unwrap().unwrap();
    assert!(again.redelivered);
    assert_eq!(again.id, first.id);

    session.commit().await.unwrap();
    assert_eq!(broker.queue_depth("retry"), 0);
}

#[tokio::test]
async fn test_commit_on_non_transacted_session_fails() {
    let broker = MemoryBroker::new();
    let conn = connection(&broker);
    let session = conn.create_session(false).await.unwrap();
    assert!(matches!(
        session.commit().await,
        Err(MessagingError::Transaction(_))
    ));
}

#[tokio::test]
async fn test_close_connection_closes_sessions_and_wakes_consumers() {
    let broker = MemoryBroker::new();
    let conn = Arc::new(connection(&broker));
    let session = conn.create_session(false).await.unwrap();
    let mut consumer = session
        .create_consumer(&Destination::queue("idle"), None)
        .await
        .unwrap();

    let closer = conn.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        closer.close().await.unwrap();
    });

    assert!(timeout(WAIT, consumer.receive()).await.unwrap().is_none());
    assert!(conn.is_closed());
    assert!(session.is_closed());
    assert!(matches!(
        session.is_transacted(),
        Err(MessagingError::SessionClosed)
    ));
    assert!(matches!(
        conn.create_session(false).await,
        Err(MessagingError::ConnectionClosed(_))
    ));

    // closing twice is harmless
    conn.close().await.unwrap();
}

#[tokio::test]
async fn test_factory_counts_connections() {
    let broker = MemoryBroker::new();
    let factory = Arc::new(MemoryConnectionFactory::new(broker));
    let definition =
        ConnectionDefinition::from_configuration("c1", &Configuration::new(), factory.clone())
            .unwrap();

    let conn = factory.create_connection(&definition).await.unwrap();
    assert_eq!(conn.name(), "c1");
    assert_eq!(factory.created(), 1);
}

#[tokio::test]
async fn test_connection_definition_from_configuration() {
    let broker = MemoryBroker::new();
    let factory = Arc::new(MemoryConnectionFactory::new(broker));
    let config = Configuration::from_pairs([
        ("client-id", "ws-client"),
        ("user", "svc"),
        ("password", "secret"),
        ("reconnection-delay", "1500"),
    ]);
    let definition =
        ConnectionDefinition::from_configuration("c1", &config, factory.clone()).unwrap();
    assert_eq!(definition.client_id.as_deref(), Some("ws-client"));
    assert_eq!(definition.reconnection_delay, Duration::from_millis(1500));
    assert!(!format!("{:?}", definition).contains("secret"));

    let orphan_password = Configuration::from_pairs([("password", "secret")]);
    assert!(ConnectionDefinition::from_configuration("c1", &orphan_password, factory.clone())
        .is_err());
    assert!(
        ConnectionDefinition::from_configuration(" ", &Configuration::new(), factory).is_err()
    );
}
