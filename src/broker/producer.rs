//! Order enqueuer: producer side of the orders queue

use std::sync::Arc;
use tracing::{error, info};

use super::{ChannelMessage, Destination, MessageChannel};
use crate::error::Result;
use crate::models::OrderRecord;

/// Publishes single orders onto the orders queue
#[derive(Clone)]
pub struct OrderEnqueuer {
    channel: Arc<dyn MessageChannel>,
    queue: Destination,
}

impl OrderEnqueuer {
    /// Create a new enqueuer for the given queue
    pub fn new(channel: Arc<dyn MessageChannel>, queue: impl Into<String>) -> Self {
        Self {
            channel,
            queue: Destination::Queue(queue.into()),
        }
    }

    /// Publish `<library_id>:<isbn>` stamped with the send time
    ///
    /// Connection and publish failures are returned to the caller; nothing
    /// is retried here.
    pub async fn enqueue(&self, library_id: &str, isbn: i64) -> Result<()> {
        let order = OrderRecord::new(library_id, isbn)?;
        let message = ChannelMessage::text(order.encode());
        let id = message.id;

        let publisher = self.channel.connect_publisher(&self.queue).await?;
        let published = publisher.publish(message).await;
        let closed = publisher.close().await;

        if let Err(e) = published {
            error!(queue = %self.queue, library_id, isbn, error = %e, "Failed to enqueue order");
            return Err(e.into());
        }
        closed?;

        info!(queue = %self.queue, library_id, isbn, id, "Order enqueued");
        Ok(())
    }
}
