//! Test doubles for the relay
//!
//! [`MemoryChannel`] stands in for the broker and [`MockProcurementGateway`]
//! for the remote procurement service.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::time::Instant;

use crate::broker::{
    BrokerError, BrokerResult, ChannelMessage, Destination, MessageChannel, MessagePublisher,
    MessageReceiver,
};
use crate::error::{Error, Result};
use crate::models::OrderBatch;
use crate::procurement::{ProcurementGateway, SubmitOutcome};

const POLL_INTERVAL: Duration = Duration::from_millis(2);

#[derive(Debug, Default)]
struct ChannelState {
    pending: HashMap<Destination, VecDeque<ChannelMessage>>,
    published: Vec<(Destination, ChannelMessage)>,
    fail_connections: bool,
    fail_receives: bool,
    connects: usize,
    failing_destinations: HashSet<String>,
}

/// In-memory broker
///
/// Every destination is a FIFO list. Published messages are both logged and
/// made available to receivers of the same destination.
#[derive(Debug, Clone, Default)]
pub struct MemoryChannel {
    state: Arc<Mutex<ChannelState>>,
}

impl MemoryChannel {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make a message available without logging it as published
    pub fn push(&self, destination: &Destination, message: ChannelMessage) {
        self.state
            .lock()
            .unwrap()
            .pending
            .entry(destination.clone())
            .or_default()
            .push_back(message);
    }

    /// Messages waiting on a destination
    pub fn pending(&self, destination: &Destination) -> usize {
        self.state
            .lock()
            .unwrap()
            .pending
            .get(destination)
            .map_or(0, VecDeque::len)
    }

    /// Messages published to a destination, in order
    pub fn published_to(&self, destination: &Destination) -> Vec<ChannelMessage> {
        self.state
            .lock()
            .unwrap()
            .published
            .iter()
            .filter(|(d, _)| d == destination)
            .map(|(_, m)| m.clone())
            .collect()
    }

    /// Messages published anywhere
    pub fn published_count(&self) -> usize {
        self.state.lock().unwrap().published.len()
    }

    /// Make every connection attempt fail
    pub fn fail_connections(&self, fail: bool) {
        self.state.lock().unwrap().fail_connections = fail;
    }

    /// Make every receive on a connected receiver fail
    pub fn fail_receives(&self, fail: bool) {
        self.state.lock().unwrap().fail_receives = fail;
    }

    /// Connection attempts so far, failed ones included
    pub fn connect_count(&self) -> usize {
        self.state.lock().unwrap().connects
    }

    /// Make publishing to the named destination fail
    pub fn fail_publish_to(&self, name: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_destinations
            .insert(name.to_string());
    }

    fn check_connect(&self, destination: &Destination) -> BrokerResult<()> {
        let mut state = self.state.lock().unwrap();
        state.connects += 1;
        if state.fail_connections {
            return Err(BrokerError::Connect {
                destination: destination.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl MessageChannel for MemoryChannel {
    async fn connect_receiver(
        &self,
        source: &Destination,
    ) -> BrokerResult<Box<dyn MessageReceiver>> {
        self.check_connect(source)?;
        Ok(Box::new(MemoryReceiver {
            state: self.state.clone(),
            source: source.clone(),
        }))
    }

    async fn connect_publisher(
        &self,
        destination: &Destination,
    ) -> BrokerResult<Box<dyn MessagePublisher>> {
        self.check_connect(destination)?;
        Ok(Box::new(MemoryPublisher {
            state: self.state.clone(),
            destination: destination.clone(),
        }))
    }
}

struct MemoryReceiver {
    state: Arc<Mutex<ChannelState>>,
    source: Destination,
}

#[async_trait]
impl MessageReceiver for MemoryReceiver {
    async fn receive(&mut self, timeout: Duration) -> BrokerResult<Option<ChannelMessage>> {
        if self.state.lock().unwrap().fail_receives {
            return Err(BrokerError::Receive("transport failure".to_string()));
        }

        let deadline = Instant::now() + timeout;
        loop {
            let next = self
                .state
                .lock()
                .unwrap()
                .pending
                .get_mut(&self.source)
                .and_then(VecDeque::pop_front);
            if next.is_some() {
                return Ok(next);
            }

            let now = Instant::now();
            if now >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(POLL_INTERVAL.min(deadline - now)).await;
        }
    }

    async fn close(self: Box<Self>) -> BrokerResult<()> {
        Ok(())
    }
}

struct MemoryPublisher {
    state: Arc<Mutex<ChannelState>>,
    destination: Destination,
}

#[async_trait]
impl MessagePublisher for MemoryPublisher {
    async fn publish(&self, message: ChannelMessage) -> BrokerResult<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_destinations.contains(self.destination.name()) {
            return Err(BrokerError::Publish {
                destination: self.destination.to_string(),
                reason: "injected failure".to_string(),
            });
        }

        state
            .published
            .push((self.destination.clone(), message.clone()));
        state
            .pending
            .entry(self.destination.clone())
            .or_default()
            .push_back(message);
        Ok(())
    }

    async fn close(self: Box<Self>) -> BrokerResult<()> {
        Ok(())
    }
}

#[derive(Debug)]
struct GatewayState {
    submitted: Vec<OrderBatch>,
    submit_attempts: usize,
    submit_status: u16,
    fetch_status: u16,
    unreachable: bool,
    panic_on_submit: bool,
    results: String,
    fetches: usize,
    heartbeats: usize,
}

impl Default for GatewayState {
    fn default() -> Self {
        Self {
            submitted: Vec::new(),
            submit_attempts: 0,
            submit_status: 200,
            fetch_status: 200,
            unreachable: false,
            panic_on_submit: false,
            results: String::new(),
            fetches: 0,
            heartbeats: 0,
        }
    }
}

/// Scriptable procurement service
#[derive(Debug, Clone, Default)]
pub struct MockProcurementGateway {
    state: Arc<Mutex<GatewayState>>,
}

impl MockProcurementGateway {
    pub fn new() -> Self {
        Self::default()
    }

    /// Body returned by result fetches
    pub fn set_results(&self, body: &str) {
        self.state.lock().unwrap().results = body.to_string();
    }

    /// Answer submissions with the given status
    pub fn reject_submissions(&self, status: u16) {
        self.state.lock().unwrap().submit_status = status;
    }

    /// Answer result fetches with the given status
    pub fn reject_fetches(&self, status: u16) {
        self.state.lock().unwrap().fetch_status = status;
    }

    /// Fail every call as if the service were down
    pub fn set_unreachable(&self, unreachable: bool) {
        self.state.lock().unwrap().unreachable = unreachable;
    }

    /// Panic inside every submission, after counting the attempt
    pub fn panic_on_submit(&self, panic: bool) {
        self.state.lock().unwrap().panic_on_submit = panic;
    }

    /// Batches the service accepted
    pub fn submitted_batches(&self) -> Vec<OrderBatch> {
        self.state.lock().unwrap().submitted.clone()
    }

    /// Submissions that reached the service, accepted or not
    pub fn submit_attempts(&self) -> usize {
        self.state.lock().unwrap().submit_attempts
    }

    pub fn fetch_count(&self) -> usize {
        self.state.lock().unwrap().fetches
    }

    pub fn heartbeat_count(&self) -> usize {
        self.state.lock().unwrap().heartbeats
    }
}

#[async_trait]
impl ProcurementGateway for MockProcurementGateway {
    async fn submit(&self, batch: &OrderBatch) -> Result<SubmitOutcome> {
        if batch.is_empty() {
            return Ok(SubmitOutcome::SkippedEmpty);
        }

        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(Error::connection("procurement service unreachable"));
        }

        state.submit_attempts += 1;
        if state.panic_on_submit {
            drop(state);
            panic!("procurement gateway failed unexpectedly");
        }
        if state.submit_status != 200 {
            return Err(Error::RemoteRejection {
                stage: "submit",
                status: state.submit_status,
            });
        }

        state.submitted.push(batch.clone());
        Ok(SubmitOutcome::Submitted)
    }

    async fn fetch_results(&self, _library_id: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        if state.unreachable {
            return Err(Error::connection("procurement service unreachable"));
        }

        state.fetches += 1;
        if state.fetch_status != 200 {
            return Err(Error::RemoteRejection {
                stage: "fetch",
                status: state.fetch_status,
            });
        }

        Ok(state.results.clone())
    }

    async fn heartbeat(&self) -> Result<Option<u16>> {
        self.state.lock().unwrap().heartbeats += 1;
        Ok(Some(200))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_channel_round_trip() {
        let channel = MemoryChannel::new();
        let topic = Destination::Topic("t".to_string());

        let publisher = channel.connect_publisher(&topic).await.unwrap();
        publisher.publish(ChannelMessage::text("hello")).await.unwrap();

        let mut receiver = channel.connect_receiver(&topic).await.unwrap();
        let message = receiver.receive(Duration::from_millis(10)).await.unwrap();
        assert_eq!(message.unwrap().as_text(), Some("hello"));
        assert!(receiver.receive(Duration::from_millis(10)).await.unwrap().is_none());

        assert_eq!(channel.published_to(&topic).len(), 1);
    }

    #[tokio::test]
    async fn test_receiver_waits_for_late_message() {
        let channel = MemoryChannel::new();
        let queue = Destination::Queue("q".to_string());
        let mut receiver = channel.connect_receiver(&queue).await.unwrap();

        let late = channel.clone();
        let target = queue.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            late.push(&target, ChannelMessage::text("late"));
        });

        let message = receiver.receive(Duration::from_secs(2)).await.unwrap();
        assert_eq!(message.unwrap().as_text(), Some("late"));
    }

    #[tokio::test]
    async fn test_mock_gateway_scripting() {
        let gateway = MockProcurementGateway::new();
        let batch = OrderBatch::new("L1", vec![1]);

        assert_eq!(gateway.submit(&batch).await.unwrap(), SubmitOutcome::Submitted);

        gateway.reject_submissions(503);
        assert!(gateway.submit(&batch).await.is_err());
        assert_eq!(gateway.submit_attempts(), 2);
        assert_eq!(gateway.submitted_batches().len(), 1);

        gateway.set_unreachable(true);
        let err = gateway.fetch_results("L1").await.unwrap_err();
        assert!(matches!(err, Error::Connection(_)));
    }
}
