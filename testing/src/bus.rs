//! Event bus that records every publish.

use duel_arena_core::{ArenaEvent, EventBus, EventBusError, EventStream};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::broadcast;

/// [`EventBus`] that keeps a log of `(topic, event)` pairs.
///
/// Subscriptions work too, so WebSocket-style consumers can be tested against
/// it. With [`RecordingEventBus::failing`] every publish is still recorded but
/// reported as failed, for exercising the "bus errors never fail a request" path.
///
/// # Example
///
/// ```
/// use duel_arena_core::{ArenaEvent, EventBus, PlayerId};
/// use duel_arena_testing::RecordingEventBus;
///
/// # tokio_test::block_on(async {
/// let bus = RecordingEventBus::new();
/// let event = ArenaEvent::Answer { player_id: PlayerId::new(), choice_index: 0 };
/// bus.publish("duel-code:ABC", &event).await.unwrap();
///
/// assert_eq!(bus.events_on("duel-code:ABC"), vec![event]);
/// # });
/// ```
#[derive(Clone, Debug)]
pub struct RecordingEventBus {
    published: Arc<Mutex<Vec<(String, ArenaEvent)>>>,
    sender: broadcast::Sender<(String, ArenaEvent)>,
    fail_publishes: bool,
}

impl RecordingEventBus {
    /// Create a bus whose publishes succeed
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(256);
        Self {
            published: Arc::new(Mutex::new(Vec::new())),
            sender,
            fail_publishes: false,
        }
    }

    /// Create a bus whose publishes are recorded but return an error
    #[must_use]
    pub fn failing() -> Self {
        Self {
            fail_publishes: true,
            ..Self::new()
        }
    }

    /// Everything published so far, in order
    #[must_use]
    pub fn published(&self) -> Vec<(String, ArenaEvent)> {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Events published on one topic, in order
    #[must_use]
    pub fn events_on(&self, topic: &str) -> Vec<ArenaEvent> {
        self.published()
            .into_iter()
            .filter(|(t, _)| t == topic)
            .map(|(_, event)| event)
            .collect()
    }

    /// Number of publishes of a given event type (`"round-start"`, …)
    #[must_use]
    pub fn count_of(&self, event_type: &str) -> usize {
        self.published()
            .iter()
            .filter(|(_, event)| event.event_type() == event_type)
            .count()
    }

    /// Forget everything recorded so far
    pub fn clear(&self) {
        self.published
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Default for RecordingEventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus for RecordingEventBus {
    fn publish(
        &self,
        topic: &str,
        event: &ArenaEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>> {
        let topic = topic.to_string();
        let event = event.clone();
        Box::pin(async move {
            self.published
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push((topic.clone(), event.clone()));

            if self.fail_publishes {
                return Err(EventBusError::PublishFailed {
                    topic,
                    reason: "recording bus configured to fail".to_string(),
                });
            }
            // No receivers is fine
            let _ = self.sender.send((topic, event));
            Ok(())
        })
    }

    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>> {
        let topics: Vec<String> = topics.iter().map(|t| (*t).to_string()).collect();
        let mut receiver = self.sender.subscribe();
        Box::pin(async move {
            let stream = async_stream::stream! {
                loop {
                    match receiver.recv().await {
                        Ok((topic, event)) => {
                            if topics.contains(&topic) {
                                yield Ok(event);
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            yield Err(EventBusError::Lagged {
                                topic: topics.join(","),
                                skipped,
                            });
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    }
                }
            };
            Ok(Box::pin(stream) as EventStream)
        })
    }
}
