//! In-process [`Broker`] over a shared [`MemoryBus`].
//!
//! Every memory broker in the process publishes into the same bus, so a
//! producer of topic `orders` reaches the consumer group `orders`.

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{broadcast, watch};
use tracing::{debug, warn};

use crate::traits::{BackendError, Broker, BrokerMessage, MessageStream};

/// Per-topic queue depth before slow subscribers start losing messages.
const TOPIC_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// MemoryBus
// ---------------------------------------------------------------------------

/// Topic fan-out shared by all memory brokers of one process.
pub struct MemoryBus {
    topics: DashMap<String, broadcast::Sender<BrokerMessage>>,
}

impl MemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self {
            topics: DashMap::new(),
        }
    }

    fn sender(&self, topic: &str) -> broadcast::Sender<BrokerMessage> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(TOPIC_CAPACITY).0)
            .clone()
    }

    /// Delivers to current subscribers of `topic`. Returns how many received it.
    pub fn send(&self, topic: &str, message: BrokerMessage) -> usize {
        // No subscribers is not an error: the message is simply not retained.
        self.sender(topic).send(message).unwrap_or(0)
    }

    #[must_use]
    pub fn receiver(&self, topic: &str) -> broadcast::Receiver<BrokerMessage> {
        self.sender(topic).subscribe()
    }
}

impl Default for MemoryBus {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// MemoryBroker
// ---------------------------------------------------------------------------

/// Broker bound to one topic on a shared bus.
pub struct MemoryBroker {
    bus: Arc<MemoryBus>,
    topic: String,
    subscriptions: DashMap<String, watch::Sender<bool>>,
}

impl MemoryBroker {
    #[must_use]
    pub fn new(bus: Arc<MemoryBus>, topic: impl Into<String>) -> Self {
        Self {
            bus,
            topic: topic.into(),
            subscriptions: DashMap::new(),
        }
    }

    #[must_use]
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn publish(&self, message: BrokerMessage) -> Result<(), BackendError> {
        let topic = if message.topic.is_empty() {
            self.topic.clone()
        } else {
            message.topic.clone()
        };
        let delivered = self.bus.send(&topic, message);
        debug!(topic = %topic, delivered, "memory broker publish");
        Ok(())
    }

    /// Consumer groups subscribe to the topic of the same name.
    async fn subscribe(&self, group: &str) -> Result<MessageStream, BackendError> {
        let rx = self.bus.receiver(group);
        let (stop_tx, stop_rx) = watch::channel(false);
        if let Some(previous) = self.subscriptions.insert(group.to_string(), stop_tx) {
            let _ = previous.send(true);
        }

        let group = group.to_string();
        let stream = futures_util::stream::unfold(
            (rx, stop_rx, group),
            |(mut rx, mut stop_rx, group)| async move {
                loop {
                    if *stop_rx.borrow() {
                        return None;
                    }
                    tokio::select! {
                        changed = stop_rx.changed() => {
                            if changed.is_err() || *stop_rx.borrow() {
                                return None;
                            }
                        }
                        received = rx.recv() => match received {
                            Ok(message) => return Some((Ok(message), (rx, stop_rx, group))),
                            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                                warn!(group = %group, skipped, "memory broker subscriber lagged");
                            }
                            Err(broadcast::error::RecvError::Closed) => return None,
                        },
                    }
                }
            },
        );
        Ok(Box::pin(stream))
    }

    async fn unsubscribe(&self, group: &str) -> Result<(), BackendError> {
        if let Some((_, stop)) = self.subscriptions.remove(group) {
            let _ = stop.send(true);
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
