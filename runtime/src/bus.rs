//! Process-local event bus.
//!
//! Each topic owns a `tokio::sync::broadcast` channel, created on first
//! subscription. Publishing to a topic nobody listens on is a silent success,
//! and channels whose receivers are all gone are pruned on the next publish or
//! subscribe.
//!
//! Delivery is at-most-once. A subscriber that falls more than `capacity`
//! events behind receives an [`EventBusError::Lagged`] item and should resync
//! from a snapshot.

use duel_arena_core::{ArenaEvent, EventBus, EventBusError, EventStream};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::{RwLock, broadcast};

use crate::config::DEFAULT_BUS_CAPACITY;

/// Map of topic name → broadcast channel.
type Channels = Arc<RwLock<HashMap<String, broadcast::Sender<ArenaEvent>>>>;

/// In-memory [`EventBus`] for a single server instance.
///
/// # Example
///
/// ```
/// use duel_arena_core::{ArenaEvent, EventBus, PlayerId};
/// use duel_arena_runtime::LocalEventBus;
/// use futures::StreamExt;
///
/// # tokio_test::block_on(async {
/// let bus = LocalEventBus::new();
/// let mut events = bus.subscribe(&["duel-code:ABC"]).await.unwrap();
///
/// let event = ArenaEvent::Answer { player_id: PlayerId::new(), choice_index: 2 };
/// bus.publish("duel-code:ABC", &event).await.unwrap();
///
/// assert_eq!(events.next().await.unwrap().unwrap(), event);
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct LocalEventBus {
    channels: Channels,
    capacity: usize,
}

impl LocalEventBus {
    /// Create a bus with the default per-topic capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_BUS_CAPACITY)
    }

    /// Create a bus buffering up to `capacity` events per topic.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            channels: Arc::new(RwLock::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Number of topics with a live channel.
    pub async fn topic_count(&self) -> usize {
        self.channels.read().await.len()
    }

    /// Number of receivers currently subscribed to `topic`.
    pub async fn subscriber_count(&self, topic: &str) -> usize {
        self.channels
            .read()
            .await
            .get(topic)
            .map_or(0, broadcast::Sender::receiver_count)
    }

    async fn prune(&self) {
        self.channels
            .write()
            .await
            .retain(|_, sender| sender.receiver_count() > 0);
    }
}

impl Default for LocalEventBus {
    fn default() -> Self {
        Self::new()
    }
}

fn receiver_stream(
    topic: String,
    mut receiver: broadcast::Receiver<ArenaEvent>,
) -> impl futures::Stream<Item = Result<ArenaEvent, EventBusError>> + Send {
    async_stream::stream! {
        loop {
            match receiver.recv().await {
                Ok(event) => yield Ok(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!(topic = %topic, skipped, "Subscriber lagged, events dropped");
                    yield Err(EventBusError::Lagged { topic: topic.clone(), skipped });
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    }
}

impl EventBus for LocalEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &ArenaEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();
        Box::pin(async move {
            let delivered = {
                let channels = self.channels.read().await;
                channels
                    .get(&topic)
                    .map(|sender| sender.send(event).is_ok())
            };

            match delivered {
                Some(true) => tracing::trace!(topic = %topic, "Event delivered"),
                // Channel exists but every receiver is gone
                Some(false) => self.prune().await,
                None => tracing::trace!(topic = %topic, "No subscribers, event dropped"),
            }
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let mut topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
        topics.sort();
        topics.dedup();

        Box::pin(async move {
            if topics.is_empty() {
                return Err(EventBusError::SubscriptionFailed {
                    topics,
                    reason: "no topics given".to_string(),
                });
            }

            self.prune().await;
            let mut channels = self.channels.write().await;
            let streams: Vec<_> = topics
                .into_iter()
                .map(|topic| {
                    let receiver = channels
                        .entry(topic.clone())
                        .or_insert_with(|| broadcast::channel(self.capacity).0)
                        .subscribe();
                    receiver_stream(topic, receiver).boxed()
                })
                .collect();

            Ok(Box::pin(stream::select_all(streams)) as EventStream)
        })
    }
}
