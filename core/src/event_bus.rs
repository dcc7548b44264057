//! Event bus abstraction for live duel notifications.
//!
//! The bus fans arena events out to whoever is listening on a topic. It is a
//! notification convenience only: the session store is the single source of
//! truth, and a listener that missed a publish resynchronizes from a snapshot.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐
//! │ RoundScheduler  │
//! │  AnswerLedger   │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │  1. Write row   │◄─── Source of truth
//! │ (session store) │
//! └────────┬────────┘
//!          │
//!          ▼
//! ┌─────────────────┐
//! │ 2. Publish to   │◄─── At-most-once, best effort
//! │    Event Bus    │
//! └────────┬────────┘
//!          │
//!     ┌────┴────┐
//!     ▼         ▼
//! duel:<id>  duel-code:<CODE>
//! ```
//!
//! # Key Principles
//!
//! - **Store first**: rows are written before anything is published
//! - **At-most-once**: subscriptions are ephemeral; there is no replay
//! - **Dual-keyed**: a session is reachable by its id topic and its code topic
//!
//! # Implementations
//!
//! - `LocalEventBus` (in `duel-arena-runtime`): process-local fanout
//! - `RecordingEventBus` (in `duel-arena-testing`): captures publishes for assertions
//!
//! A multi-instance deployment needs a broker-backed implementation of this trait.

use crate::event::ArenaEvent;
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during event bus operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// Failed to publish an event to a topic
    #[error("Publish failed for topic '{topic}': {reason}")]
    PublishFailed {
        /// The topic that failed
        topic: String,
        /// The reason for failure
        reason: String,
    },

    /// Failed to subscribe to topics
    #[error("Subscription failed for topics {topics:?}: {reason}")]
    SubscriptionFailed {
        /// The topics that failed to subscribe
        topics: Vec<String>,
        /// The reason for failure
        reason: String,
    },

    /// The subscriber fell behind and missed events; it must resynchronize
    #[error("Subscriber on '{topic}' lagged and missed {skipped} events")]
    Lagged {
        /// Topic the events were missed on
        topic: String,
        /// Number of events dropped
        skipped: u64,
    },
}

/// Stream of events from a subscription.
///
/// Items are `Err(EventBusError::Lagged)` when the subscriber missed events;
/// the stream keeps going afterwards.
pub type EventStream = Pin<Box<dyn Stream<Item = Result<ArenaEvent, EventBusError>> + Send>>;

/// Trait for event bus implementations.
///
/// # Dyn Compatibility
///
/// This trait uses explicit `Pin<Box<dyn Future>>` returns instead of `async fn`
/// so it can be shared as `Arc<dyn EventBus>` between the scheduler, the ledger
/// and the WebSocket handlers.
pub trait EventBus: Send + Sync {
    /// Publish an event to every current subscriber of `topic`.
    ///
    /// Publishing to a topic nobody listens on succeeds and drops the event.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::PublishFailed`] if the transport rejects the event.
    fn publish(
        &self,
        topic: &str,
        event: &ArenaEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), EventBusError>> + Send + '_>>;

    /// Subscribe to one or more topics and receive a merged stream of events.
    ///
    /// Only events published after the subscription exists are delivered.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError::SubscriptionFailed`] if subscription fails.
    fn subscribe(
        &self,
        topics: &[&str],
    ) -> Pin<Box<dyn Future<Output = Result<EventStream, EventBusError>> + Send + '_>>;
}
