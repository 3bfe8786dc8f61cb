//! Message channel module
//!
//! This module provides:
//! - The [`MessageChannel`] abstraction over a broker offering point-to-point
//!   queues and publish/subscribe topics
//! - A Kafka implementation of that abstraction
//! - The order enqueuer (producer side of the orders queue)
//! - The queue drainer (consumer side of the orders queue)

mod config;
mod consumer;
mod kafka;
mod producer;

pub use config::BrokerConfig;
pub use consumer::QueueDrainer;
pub use kafka::KafkaChannel;
pub use producer::OrderEnqueuer;

use async_trait::async_trait;
use rdkafka::error::KafkaError;
use std::time::Duration;
use thiserror::Error;

/// Broker-specific error types
#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("Kafka connection error: {0}")]
    ConnectionError(#[from] KafkaError),

    #[error("Failed to connect to {destination}: {reason}")]
    Connect { destination: String, reason: String },

    #[error("Receive failed: {0}")]
    Receive(String),

    #[error("Publish to {destination} failed: {reason}")]
    Publish { destination: String, reason: String },
}

/// Result type for channel operations
pub type BrokerResult<T> = std::result::Result<T, BrokerError>;

impl From<BrokerError> for crate::error::Error {
    fn from(err: BrokerError) -> Self {
        match err {
            BrokerError::ConnectionError(_) | BrokerError::Connect { .. } => {
                crate::error::Error::connection(err.to_string())
            },
            BrokerError::Receive(_) | BrokerError::Publish { .. } => {
                crate::error::Error::broker(err.to_string())
            },
        }
    }
}

/// Where a message goes or comes from
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Destination {
    /// Point-to-point: each message reaches exactly one consumer
    Queue(String),
    /// Publish/subscribe: each message reaches every subscriber
    Topic(String),
}

impl Destination {
    pub fn name(&self) -> &str {
        match self {
            Destination::Queue(name) | Destination::Topic(name) => name,
        }
    }
}

impl std::fmt::Display for Destination {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Destination::Queue(name) => write!(f, "queue:{}", name),
            Destination::Topic(name) => write!(f, "topic:{}", name),
        }
    }
}

/// Message payload kinds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MessageBody {
    Text(String),
    Binary(Vec<u8>),
}

/// A message as exchanged with the broker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelMessage {
    pub body: MessageBody,
    /// Send time in epoch milliseconds
    pub id: i64,
}

impl ChannelMessage {
    /// Text message stamped with the current time
    pub fn text(body: impl Into<String>) -> Self {
        Self {
            body: MessageBody::Text(body.into()),
            id: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Binary message stamped with the current time
    pub fn binary(body: Vec<u8>) -> Self {
        Self {
            body: MessageBody::Binary(body),
            id: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Text body, if this is a text message
    pub fn as_text(&self) -> Option<&str> {
        match &self.body {
            MessageBody::Text(text) => Some(text),
            MessageBody::Binary(_) => None,
        }
    }

    /// Name of the body kind, for logs
    pub fn kind(&self) -> &'static str {
        match self.body {
            MessageBody::Text(_) => "text",
            MessageBody::Binary(_) => "bytes",
        }
    }
}

/// Connection to a broker with queues and topics
#[async_trait]
pub trait MessageChannel: Send + Sync {
    /// Open a receiver on a queue or topic
    async fn connect_receiver(&self, source: &Destination)
        -> BrokerResult<Box<dyn MessageReceiver>>;

    /// Open a publisher to a queue or topic
    async fn connect_publisher(
        &self,
        destination: &Destination,
    ) -> BrokerResult<Box<dyn MessagePublisher>>;
}

/// Receiving end of a connection
#[async_trait]
pub trait MessageReceiver: Send {
    /// Wait at most `timeout` for the next message; `None` when nothing arrived
    async fn receive(&mut self, timeout: Duration) -> BrokerResult<Option<ChannelMessage>>;

    /// Release the connection
    async fn close(self: Box<Self>) -> BrokerResult<()>;
}

/// Publishing end of a connection
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Publish one message
    async fn publish(&self, message: ChannelMessage) -> BrokerResult<()>;

    /// Flush and release the connection
    async fn close(self: Box<Self>) -> BrokerResult<()>;
}
