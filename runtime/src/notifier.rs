//! Best-effort publishing of arena events.

use duel_arena_core::{ArenaEvent, DuelSession, EventBus, Topic};
use std::sync::Arc;

/// Who an event is meant for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Audience {
    /// Session-id topic only (host tooling).
    Internal,
    /// Session-id and join-code topics.
    Everyone,
}

impl Audience {
    fn topics(self, session: &DuelSession) -> Vec<Topic> {
        match self {
            Self::Internal => vec![Topic::session(session.id)],
            Self::Everyone => vec![Topic::session(session.id), Topic::code(&session.code)],
        }
    }
}

/// Publishes events after their rows are stored.
///
/// The store is authoritative, so a failed publish is logged and counted but
/// never turned into an error for the caller.
#[derive(Clone)]
pub struct Notifier {
    bus: Arc<dyn EventBus>,
}

impl Notifier {
    /// Wrap an event bus.
    #[must_use]
    pub fn new(bus: Arc<dyn EventBus>) -> Self {
        Self { bus }
    }

    /// The underlying bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<dyn EventBus> {
        &self.bus
    }

    /// Publish `event` to every topic of `audience`.
    pub async fn notify(&self, session: &DuelSession, audience: Audience, event: &ArenaEvent) {
        let event_type = event.event_type();
        for topic in audience.topics(session) {
            match self.bus.publish(topic.as_str(), event).await {
                Ok(()) => {
                    metrics::counter!("arena_events_published_total", "type" => event_type).increment(1);
                    tracing::debug!(topic = %topic, event_type, "Published event");
                }
                Err(error) => {
                    metrics::counter!("arena_event_publish_errors_total", "type" => event_type).increment(1);
                    tracing::warn!(topic = %topic, event_type, error = %error, "Failed to publish event");
                }
            }
        }
    }
}

impl std::fmt::Debug for Notifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Notifier").finish_non_exhaustive()
    }
}
