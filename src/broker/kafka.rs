//! Kafka implementation of the message channel
//!
//! A queue is a Kafka topic read by one shared consumer group, so every
//! order reaches a single drainer. A broadcast topic is read by each
//! subscriber with its own group. The send timestamp travels in the `id`
//! header and the body kind in the `message-type` header.

use async_trait::async_trait;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::{Header, Headers, Message, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use std::time::Duration;
use tracing::debug;

use super::{
    BrokerConfig, BrokerError, BrokerResult, ChannelMessage, Destination, MessageBody,
    MessageChannel, MessagePublisher, MessageReceiver,
};

const ID_HEADER: &str = "id";
const TYPE_HEADER: &str = "message-type";
const TEXT_TYPE: &str = "text";
const BYTES_TYPE: &str = "bytes";

/// Message channel backed by a Kafka cluster
#[derive(Debug, Clone)]
pub struct KafkaChannel {
    config: BrokerConfig,
}

impl KafkaChannel {
    /// Create a channel for the configured cluster
    pub fn new(config: BrokerConfig) -> Self {
        Self { config }
    }

    fn group_for(&self, source: &Destination) -> &str {
        match source {
            Destination::Queue(_) => &self.config.queue_group,
            Destination::Topic(_) => &self.config.subscriber_group,
        }
    }
}

#[async_trait]
impl MessageChannel for KafkaChannel {
    async fn connect_receiver(
        &self,
        source: &Destination,
    ) -> BrokerResult<Box<dyn MessageReceiver>> {
        let group = self.group_for(source);

        let consumer: StreamConsumer =
            self.config.build_consumer_config(group).create().map_err(|e| {
                BrokerError::Connect {
                    destination: source.to_string(),
                    reason: e.to_string(),
                }
            })?;

        consumer
            .subscribe(&[source.name()])
            .map_err(|e| BrokerError::Connect {
                destination: source.to_string(),
                reason: format!("subscribe failed: {}", e),
            })?;

        debug!(source = %source, group, "Kafka receiver connected");

        Ok(Box::new(KafkaReceiver {
            consumer,
            source: source.clone(),
        }))
    }

    async fn connect_publisher(
        &self,
        destination: &Destination,
    ) -> BrokerResult<Box<dyn MessagePublisher>> {
        let producer: FutureProducer = self.config.build_producer_config().create()?;

        debug!(destination = %destination, "Kafka publisher connected");

        Ok(Box::new(KafkaPublisher {
            producer,
            destination: destination.clone(),
            send_timeout: self.config.send_timeout(),
        }))
    }
}

/// Consumer side of a Kafka connection
pub struct KafkaReceiver {
    consumer: StreamConsumer,
    source: Destination,
}

#[async_trait]
impl MessageReceiver for KafkaReceiver {
    async fn receive(&mut self, timeout: Duration) -> BrokerResult<Option<ChannelMessage>> {
        let message = match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Err(_elapsed) => return Ok(None),
            Ok(Err(e)) => return Err(BrokerError::Receive(e.to_string())),
            Ok(Ok(message)) => message,
        };

        let received = to_channel_message(&message);

        // Acknowledge on receipt
        self.consumer
            .commit_message(&message, CommitMode::Async)
            .map_err(|e| BrokerError::Receive(format!("commit failed: {}", e)))?;

        Ok(Some(received))
    }

    async fn close(self: Box<Self>) -> BrokerResult<()> {
        self.consumer.unsubscribe();
        debug!(source = %self.source, "Kafka receiver closed");
        Ok(())
    }
}

/// Producer side of a Kafka connection
pub struct KafkaPublisher {
    producer: FutureProducer,
    destination: Destination,
    send_timeout: Duration,
}

#[async_trait]
impl MessagePublisher for KafkaPublisher {
    async fn publish(&self, message: ChannelMessage) -> BrokerResult<()> {
        let id = message.id.to_string();
        let (payload, kind): (&[u8], &str) = match &message.body {
            MessageBody::Text(text) => (text.as_bytes(), TEXT_TYPE),
            MessageBody::Binary(bytes) => (bytes.as_slice(), BYTES_TYPE),
        };

        let headers = OwnedHeaders::new()
            .insert(Header {
                key: ID_HEADER,
                value: Some(id.as_str()),
            })
            .insert(Header {
                key: TYPE_HEADER,
                value: Some(kind),
            });

        let record: FutureRecord<'_, str, [u8]> = FutureRecord::to(self.destination.name())
            .payload(payload)
            .headers(headers);

        match self.producer.send(record, self.send_timeout).await {
            Ok(_) => {
                debug!(destination = %self.destination, id = message.id, "Message published");
                Ok(())
            },
            Err((kafka_error, _)) => Err(BrokerError::Publish {
                destination: self.destination.to_string(),
                reason: kafka_error.to_string(),
            }),
        }
    }

    async fn close(self: Box<Self>) -> BrokerResult<()> {
        self.producer
            .flush(self.send_timeout)
            .map_err(|e| BrokerError::Publish {
                destination: self.destination.to_string(),
                reason: format!("flush failed: {}", e),
            })
    }
}

/// Convert a Kafka message, reading the `id` and `message-type` headers
///
/// Without a type header the payload is text when it is valid UTF-8. Without
/// an `id` header the broker timestamp is used.
fn to_channel_message<M: Message>(message: &M) -> ChannelMessage {
    let mut id = message.timestamp().to_millis();
    let mut kind: Option<String> = None;

    if let Some(headers) = message.headers() {
        for header in headers.iter() {
            let value = header.value.and_then(|v| std::str::from_utf8(v).ok());
            match header.key {
                ID_HEADER => id = value.and_then(|v| v.parse().ok()).or(id),
                TYPE_HEADER => kind = value.map(str::to_string),
                _ => {},
            }
        }
    }

    let payload = message.payload().unwrap_or_default().to_vec();
    let body = match kind.as_deref() {
        None | Some(TEXT_TYPE) => match String::from_utf8(payload) {
            Ok(text) => MessageBody::Text(text),
            Err(e) => MessageBody::Binary(e.into_bytes()),
        },
        Some(_) => MessageBody::Binary(payload),
    };

    ChannelMessage {
        body,
        id: id.unwrap_or_default(),
    }
}
