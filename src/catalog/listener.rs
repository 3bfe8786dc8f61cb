//! Subscriber applying procured books to the catalog

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{ArrivalOutcome, BookCatalog};
use crate::broker::{ChannelMessage, Destination, MessageChannel};
use crate::models::RoutedMessage;

/// Pause before reconnecting after a broker failure
const RECONNECT_DELAY: Duration = Duration::from_secs(5);

/// Listens on category topics and marks arrived books available
#[derive(Clone)]
pub struct ArrivalListener {
    channel: Arc<dyn MessageChannel>,
    catalog: Arc<dyn BookCatalog>,
    poll_timeout: Duration,
}

impl ArrivalListener {
    pub fn new(
        channel: Arc<dyn MessageChannel>,
        catalog: Arc<dyn BookCatalog>,
        poll_timeout: Duration,
    ) -> Self {
        Self {
            channel,
            catalog,
            poll_timeout,
        }
    }

    /// Start one listening task per topic
    pub fn spawn(self, topics: Vec<String>, shutdown: watch::Receiver<bool>) -> Vec<JoinHandle<()>> {
        topics
            .into_iter()
            .map(|topic| {
                let listener = self.clone();
                let shutdown = shutdown.clone();
                tokio::spawn(async move { listener.listen(Destination::Topic(topic), shutdown).await })
            })
            .collect()
    }

    /// Receive from one topic until shutdown is signalled
    pub async fn listen(&self, topic: Destination, mut shutdown: watch::Receiver<bool>) {
        info!(topic = %topic, "Arrival listener started");

        while !*shutdown.borrow() {
            let mut receiver = match self.channel.connect_receiver(&topic).await {
                Ok(receiver) => receiver,
                Err(e) => {
                    error!(topic = %topic, error = %e, "Failed to subscribe, retrying");
                    tokio::select! {
                        _ = tokio::time::sleep(RECONNECT_DELAY) => continue,
                        _ = shutdown.changed() => break,
                    }
                },
            };

            let mut failed = false;
            while !*shutdown.borrow() {
                match receiver.receive(self.poll_timeout).await {
                    Ok(Some(message)) => {
                        self.apply(&message).await;
                    },
                    Ok(None) => {},
                    Err(e) => {
                        error!(topic = %topic, error = %e, "Receive failed, resubscribing");
                        failed = true;
                        break;
                    },
                }
            }

            if let Err(e) = receiver.close().await {
                warn!(topic = %topic, error = %e, "Failed to close subscription");
            }

            if failed {
                tokio::select! {
                    _ = tokio::time::sleep(RECONNECT_DELAY) => {},
                    _ = shutdown.changed() => break,
                }
            }
        }

        info!(topic = %topic, "Arrival listener stopped");
    }

    /// Apply one routed message to the catalog
    ///
    /// Returns `None` when the message was skipped.
    pub async fn apply(&self, message: &ChannelMessage) -> Option<ArrivalOutcome> {
        let Some(body) = message.as_text() else {
            warn!(kind = message.kind(), id = message.id, "Unexpected message type, skipping");
            return None;
        };

        let routed = match RoutedMessage::decode(body) {
            Ok(routed) => routed,
            Err(e) => {
                warn!(body, error = %e, "Malformed book message, skipping");
                return None;
            },
        };

        let isbn = routed.record.isbn;
        match self.catalog.mark_arrived(routed.record).await {
            Ok(outcome) => {
                debug!(isbn, ?outcome, "Arrival applied");
                Some(outcome)
            },
            Err(e) => {
                warn!(isbn, error = %e, "Failed to apply arrival");
                None
            },
        }
    }
}
