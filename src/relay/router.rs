//! Category fan-out of procured book records

use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

use crate::broker::{BrokerConfig, BrokerResult, ChannelMessage, Destination, MessageChannel};
use crate::models::{BookRecord, Category, RoutedMessage};

/// Result of routing one record
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteOutcome {
    /// Published to the named topic
    Published(String),
    /// Category has no topic; dropped
    Unrouted,
    /// Publishing failed
    Failed(String),
}

/// Publishes each record to the topic of its category
#[derive(Clone)]
pub struct CategoryRouter {
    channel: Arc<dyn MessageChannel>,
    routes: HashMap<Category, Destination>,
}

impl CategoryRouter {
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        routes: impl IntoIterator<Item = (Category, String)>,
    ) -> Self {
        Self {
            channel,
            routes: routes
                .into_iter()
                .map(|(category, topic)| (category, Destination::Topic(topic)))
                .collect(),
        }
    }

    /// Route every category to `<topic_prefix>.<category>`
    pub fn from_config(channel: Arc<dyn MessageChannel>, config: &BrokerConfig) -> Self {
        Self::new(
            channel,
            Category::ALL
                .into_iter()
                .map(|category| (category, config.topic_for(category))),
        )
    }

    /// Publish one record to its category topic
    ///
    /// A failure is logged and reported; it is never returned as an error so
    /// the caller can keep routing the remaining records.
    pub async fn route(&self, record: &BookRecord) -> RouteOutcome {
        let Some(topic) = record
            .routable_category()
            .and_then(|category| self.routes.get(&category))
        else {
            debug!(isbn = record.isbn, category = %record.category, "No topic for category, dropping");
            return RouteOutcome::Unrouted;
        };

        let message = ChannelMessage::text(RoutedMessage::new(record.clone()).encode());
        match self.publish(topic, message).await {
            Ok(()) => {
                info!(isbn = record.isbn, topic = %topic, "Book record routed");
                RouteOutcome::Published(topic.name().to_string())
            },
            Err(e) => {
                error!(isbn = record.isbn, topic = %topic, error = %e, "Failed to route book record");
                RouteOutcome::Failed(e.to_string())
            },
        }
    }

    async fn publish(&self, topic: &Destination, message: ChannelMessage) -> BrokerResult<()> {
        let publisher = self.channel.connect_publisher(topic).await?;
        let published = publisher.publish(message).await;
        let closed = publisher.close().await;
        published?;
        closed
    }
}
