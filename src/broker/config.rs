//! Broker configuration module

use envconfig::Envconfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::models::Category;

/// Broker connection and naming settings
#[derive(Debug, Clone, Deserialize, Serialize, Envconfig)]
pub struct BrokerConfig {
    /// Kafka bootstrap servers (comma-separated)
    #[serde(default = "default_bootstrap_servers")]
    #[envconfig(from = "BROKER_BOOTSTRAP_SERVERS", default = "localhost:9092")]
    pub bootstrap_servers: String,

    /// SASL user; empty disables authentication
    #[serde(default)]
    #[envconfig(from = "BROKER_USER", default = "")]
    pub user: String,

    /// SASL password
    #[serde(default)]
    #[envconfig(from = "BROKER_PASSWORD", default = "")]
    pub password: String,

    /// Point-to-point queue carrying book orders
    #[serde(default = "default_orders_queue")]
    #[envconfig(from = "BROKER_ORDERS_QUEUE", default = "library.book.orders")]
    pub orders_queue: String,

    /// Prefix of the category topics (`<prefix>.<category>`)
    #[serde(default = "default_topic_prefix")]
    #[envconfig(from = "BROKER_TOPIC_PREFIX", default = "library.book")]
    pub topic_prefix: String,

    /// Consumer group shared by every reader of the orders queue
    #[serde(default = "default_queue_group")]
    #[envconfig(from = "BROKER_QUEUE_GROUP", default = "procurement-relay")]
    pub queue_group: String,

    /// Consumer group of this process when subscribing to category topics
    #[serde(default = "default_subscriber_group")]
    #[envconfig(from = "BROKER_SUBSCRIBER_GROUP", default = "library-catalog")]
    pub subscriber_group: String,

    /// How long a drain waits for the next order before calling the queue empty
    #[serde(default = "default_idle_receive_timeout_ms")]
    #[envconfig(from = "BROKER_IDLE_RECEIVE_TIMEOUT_MS", default = "5000")]
    pub idle_receive_timeout_ms: u64,

    /// Upper bound for a single publish
    #[serde(default = "default_send_timeout_ms")]
    #[envconfig(from = "BROKER_SEND_TIMEOUT_MS", default = "30000")]
    pub send_timeout_ms: u64,

    /// Consumer session timeout in milliseconds
    #[serde(default = "default_session_timeout")]
    #[envconfig(from = "BROKER_SESSION_TIMEOUT_MS", default = "30000")]
    pub session_timeout_ms: u32,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            bootstrap_servers: default_bootstrap_servers(),
            user: String::new(),
            password: String::new(),
            orders_queue: default_orders_queue(),
            topic_prefix: default_topic_prefix(),
            queue_group: default_queue_group(),
            subscriber_group: default_subscriber_group(),
            idle_receive_timeout_ms: default_idle_receive_timeout_ms(),
            send_timeout_ms: default_send_timeout_ms(),
            session_timeout_ms: default_session_timeout(),
        }
    }
}

impl BrokerConfig {
    /// Create a new BrokerConfig from environment variables
    pub fn from_env() -> Result<Self, envconfig::Error> {
        <Self as envconfig::Envconfig>::init_from_env()
    }

    /// Get idle receive timeout as Duration
    pub fn idle_receive_timeout(&self) -> Duration {
        Duration::from_millis(self.idle_receive_timeout_ms)
    }

    /// Get send timeout as Duration
    pub fn send_timeout(&self) -> Duration {
        Duration::from_millis(self.send_timeout_ms)
    }

    /// Topic carrying records of one category
    pub fn topic_for(&self, category: Category) -> String {
        format!("{}.{}", self.topic_prefix, category.as_str())
    }

    /// Whether SASL credentials are configured
    pub fn has_credentials(&self) -> bool {
        !self.user.is_empty()
    }

    /// Build rdkafka consumer configuration for the given group
    pub fn build_consumer_config(&self, group_id: &str) -> rdkafka::ClientConfig {
        let mut config = self.base_config();

        config
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("session.timeout.ms", self.session_timeout_ms.to_string())
            .set("enable.partition.eof", "false")
            .set("auto.offset.reset", "earliest");

        config
    }

    /// Build rdkafka producer configuration
    pub fn build_producer_config(&self) -> rdkafka::ClientConfig {
        let mut config = self.base_config();

        config
            .set("message.timeout.ms", self.send_timeout_ms.to_string())
            .set("acks", "all");

        config
    }

    fn base_config(&self) -> rdkafka::ClientConfig {
        let mut config = rdkafka::ClientConfig::new();
        config.set("bootstrap.servers", &self.bootstrap_servers);

        if self.has_credentials() {
            config
                .set("security.protocol", "SASL_PLAINTEXT")
                .set("sasl.mechanism", "PLAIN")
                .set("sasl.username", &self.user)
                .set("sasl.password", &self.password);
        }

        config
    }
}

// Default value functions
fn default_bootstrap_servers() -> String {
    "localhost:9092".to_string()
}

fn default_orders_queue() -> String {
    "library.book.orders".to_string()
}

fn default_topic_prefix() -> String {
    "library.book".to_string()
}

fn default_queue_group() -> String {
    "procurement-relay".to_string()
}

fn default_subscriber_group() -> String {
    "library-catalog".to_string()
}

fn default_idle_receive_timeout_ms() -> u64 {
    5000
}

fn default_send_timeout_ms() -> u64 {
    30000
}

fn default_session_timeout() -> u32 {
    30000 // 30 seconds
}
