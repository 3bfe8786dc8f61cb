//! Orders queue drainer with a bounded idle wait

use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn, Instrument};

use super::{BrokerResult, Destination, MessageChannel};
use crate::error::Error;
use crate::models::order_isbn;

/// Reads every pending order from the orders queue
#[derive(Clone)]
pub struct QueueDrainer {
    channel: Arc<dyn MessageChannel>,
}

impl QueueDrainer {
    /// Create a new drainer over a channel
    pub fn new(channel: Arc<dyn MessageChannel>) -> Self {
        Self { channel }
    }

    /// Drain the queue, returning ISBNs in arrival order
    ///
    /// A connection failure is logged and yields an empty batch, which the
    /// caller treats as nothing to do this cycle.
    pub async fn drain(&self, queue: &str, idle_timeout: Duration) -> Vec<i64> {
        match self
            .try_drain(queue, idle_timeout)
            .instrument(crate::broker_span!(queue))
            .await
        {
            Ok(isbns) => isbns,
            Err(e) => {
                error!(queue, error = %e, "Failed to connect to orders queue");
                Vec::new()
            },
        }
    }

    /// Drain the queue, failing only if the receiver cannot be connected
    ///
    /// Stops at the first receive that yields nothing within `idle_timeout`.
    /// Non-text messages and bodies without a positive ISBN in the second
    /// `:`-separated field are skipped. A broker error mid-drain ends the drain with what was
    /// collected so far.
    pub async fn try_drain(&self, queue: &str, idle_timeout: Duration) -> BrokerResult<Vec<i64>> {
        let source = Destination::Queue(queue.to_string());
        let mut receiver = self.channel.connect_receiver(&source).await?;

        info!(queue, "Fetching messages from orders queue");

        let mut isbns = Vec::new();
        loop {
            let message = match receiver.receive(idle_timeout).await {
                Ok(Some(message)) => message,
                Ok(None) => {
                    debug!(
                        queue,
                        idle_timeout_ms = idle_timeout.as_millis() as u64,
                        "No message within idle timeout"
                    );
                    break;
                },
                Err(e) => {
                    error!(queue, error = %e, "Receive failed, ending drain early");
                    break;
                },
            };

            let Some(body) = message.as_text() else {
                let violation = Error::protocol(format!("unexpected {} message", message.kind()));
                warn!(queue, id = message.id, error = %violation, "Skipping message");
                continue;
            };

            match order_isbn(body) {
                Ok(isbn) => {
                    debug!(queue, body, isbn, "Received order");
                    isbns.push(isbn);
                },
                Err(e) => {
                    warn!(queue, body, error = %e, "Malformed order message, skipping");
                },
            }
        }

        if let Err(e) = receiver.close().await {
            warn!(queue, error = %e, "Failed to close orders queue receiver");
        }

        info!(queue, count = isbns.len(), "Orders queue drained");
        Ok(isbns)
    }
}
