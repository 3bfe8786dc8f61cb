//! Integration tests for the Kafka message channel

use rdkafka::admin::{AdminClient, AdminOptions, NewTopic, TopicReplication};
use rdkafka::client::DefaultClientContext;
use rdkafka::config::ClientConfig;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

use procurement_relay::broker::{
    BrokerConfig, ChannelMessage, Destination, KafkaChannel, MessageChannel, OrderEnqueuer,
    QueueDrainer,
};
use procurement_relay::catalog::{ArrivalListener, BookCatalog, InMemoryCatalog};
use procurement_relay::models::{BookRecord, Category};
use procurement_relay::relay::{CategoryRouter, RouteOutcome};

/// Test Kafka broker address
const TEST_KAFKA_BROKER: &str = "localhost:9092";

/// Broker settings with names unique to one test run
fn test_config() -> BrokerConfig {
    let run = Uuid::new_v4().simple().to_string();
    BrokerConfig {
        bootstrap_servers: TEST_KAFKA_BROKER.to_string(),
        orders_queue: format!("test.orders.{}", run),
        topic_prefix: format!("test.book.{}", run),
        queue_group: format!("test-relay-{}", run),
        subscriber_group: format!("test-catalog-{}", run),
        idle_receive_timeout_ms: 5000,
        send_timeout_ms: 5000,
        session_timeout_ms: 6000,
        ..BrokerConfig::default()
    }
}

/// Create test topics for integration testing
async fn create_test_topics(topics: &[String]) -> Result<(), Box<dyn std::error::Error>> {
    let admin: AdminClient<DefaultClientContext> =
        ClientConfig::new().set("bootstrap.servers", TEST_KAFKA_BROKER).create()?;

    let new_topics: Vec<NewTopic<'_>> = topics
        .iter()
        .map(|topic| NewTopic::new(topic, 1, TopicReplication::Fixed(1)))
        .collect();

    let results = admin.create_topics(&new_topics, &AdminOptions::new()).await?;

    for result in results {
        match result {
            Ok(topic) => println!("Created topic: {}", topic),
            Err((topic, err)) => {
                // Ignore if topic already exists
                if !err.to_string().contains("already exists") {
                    return Err(format!("Failed to create topic {}: {}", topic, err).into());
                }
            },
        }
    }

    Ok(())
}

#[tokio::test]
#[ignore] // Requires Kafka to be running
async fn test_enqueued_orders_are_drained_in_order() {
    let config = test_config();
    create_test_topics(&[config.orders_queue.clone()])
        .await
        .expect("Failed to create topics");

    let channel: Arc<dyn MessageChannel> = Arc::new(KafkaChannel::new(config.clone()));
    let enqueuer = OrderEnqueuer::new(channel.clone(), config.orders_queue.clone());
    for isbn in [10, 11, 12] {
        enqueuer.enqueue("79417", isbn).await.expect("Failed to enqueue");
    }

    let drainer = QueueDrainer::new(channel);
    let isbns = drainer
        .drain(&config.orders_queue, Duration::from_secs(10))
        .await;

    assert_eq!(isbns, vec![10, 11, 12]);
}

#[tokio::test]
#[ignore] // Requires Kafka to be running
async fn test_drained_orders_are_not_redelivered() {
    let config = test_config();
    create_test_topics(&[config.orders_queue.clone()])
        .await
        .expect("Failed to create topics");

    let channel: Arc<dyn MessageChannel> = Arc::new(KafkaChannel::new(config.clone()));
    OrderEnqueuer::new(channel.clone(), config.orders_queue.clone())
        .enqueue("79417", 7)
        .await
        .expect("Failed to enqueue");

    let drainer = QueueDrainer::new(channel);
    let first = drainer
        .drain(&config.orders_queue, Duration::from_secs(10))
        .await;
    assert_eq!(first, vec![7]);

    // Commits are asynchronous
    tokio::time::sleep(Duration::from_secs(1)).await;

    let second = drainer
        .drain(&config.orders_queue, Duration::from_secs(3))
        .await;
    assert!(second.is_empty());
}

#[tokio::test]
#[ignore] // Requires Kafka to be running
async fn test_routed_record_reaches_subscriber() {
    let config = test_config();
    let topic = config.topic_for(Category::Comics);
    create_test_topics(&[topic.clone()])
        .await
        .expect("Failed to create topics");

    let channel: Arc<dyn MessageChannel> = Arc::new(KafkaChannel::new(config.clone()));
    let router = CategoryRouter::from_config(channel.clone(), &config);

    let record = BookRecord {
        isbn: 77,
        title: "Watchmen".to_string(),
        category: "Comics".to_string(),
        cover_image: "http://w".to_string(),
    };
    assert_eq!(router.route(&record).await, RouteOutcome::Published(topic.clone()));

    let catalog = Arc::new(InMemoryCatalog::new());
    let listener = ArrivalListener::new(channel.clone(), catalog.clone(), Duration::from_secs(1));
    let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
    let handles = listener.spawn(vec![topic], shutdown_rx);

    let mut arrived = None;
    for _ in 0..30 {
        arrived = catalog.get(77).await.unwrap();
        if arrived.is_some() {
            break;
        }
        tokio::time::sleep(Duration::from_millis(500)).await;
    }

    shutdown_tx.send(true).unwrap();
    for handle in handles {
        handle.await.unwrap();
    }

    let book = arrived.expect("Routed record never arrived");
    assert_eq!(book.title, "Watchmen");
    assert_eq!(book.category, "Comics");
}

#[tokio::test]
#[ignore] // Requires Kafka to be running
async fn test_binary_message_is_skipped_by_drain() {
    let config = test_config();
    create_test_topics(&[config.orders_queue.clone()])
        .await
        .expect("Failed to create topics");

    let channel: Arc<dyn MessageChannel> = Arc::new(KafkaChannel::new(config.clone()));
    let queue = Destination::Queue(config.orders_queue.clone());
    let publisher = channel.connect_publisher(&queue).await.unwrap();
    publisher
        .publish(ChannelMessage::binary(b"79417:1".to_vec()))
        .await
        .unwrap();
    publisher
        .publish(ChannelMessage::text("79417:2"))
        .await
        .unwrap();
    publisher.close().await.unwrap();

    let isbns = QueueDrainer::new(channel)
        .drain(&config.orders_queue, Duration::from_secs(10))
        .await;

    assert_eq!(isbns, vec![2]);
}

#[test]
fn test_topic_names_follow_prefix() {
    let config = BrokerConfig::default();
    assert_eq!(config.topic_for(Category::Computer), "library.book.computer");
    assert_eq!(
        config.topic_for(Category::SelfImprovement),
        "library.book.selfimprovement"
    );
}

#[test]
fn test_consumer_config_uses_given_group() {
    let config = BrokerConfig::default();
    let client = config.build_consumer_config("test-group");

    assert_eq!(client.get("group.id"), Some("test-group"));
    assert_eq!(client.get("enable.auto.commit"), Some("false"));
    assert_eq!(client.get("bootstrap.servers"), Some("localhost:9092"));
    assert_eq!(client.get("security.protocol"), None);
}

#[test]
fn test_credentials_enable_sasl() {
    let config = BrokerConfig {
        user: "relay".to_string(),
        password: "secret".to_string(),
        ..BrokerConfig::default()
    };
    let client = config.build_producer_config();

    assert_eq!(client.get("security.protocol"), Some("SASL_PLAINTEXT"));
    assert_eq!(client.get("sasl.username"), Some("relay"));
    assert_eq!(client.get("acks"), Some("all"));
}
