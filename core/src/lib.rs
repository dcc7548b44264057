//! # Duel Arena Core
//!
//! Domain types and pure logic for the real-time Duel Arena: a multiplayer quiz
//! engine that sequences timed rounds, builds fair multiple-choice questions and
//! records exactly-once scored answers.
//!
//! ## Core Concepts
//!
//! - **Session**: a duel lobby with a stable join code, owned by the lobby subsystem
//! - **Round**: one timed question cycle, `Pending → Live → Resolved`
//! - **Question**: a pure function of `(round id, question card, card pool)`
//! - **Answer**: at most one scored answer per player per round
//! - **Event bus**: non-authoritative live notifications keyed by topic
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────┐     ┌─────────────────┐
//! │ SessionStore │◄────│ RoundScheduler  │──► EventBus (round-start, round-resolve)
//! │  (durable)   │◄────│ AnswerLedger    │──► EventBus (answer)
//! │              │◄────│ SnapshotService │
//! └──────────────┘     └────────┬────────┘
//!                               │
//!                               ▼
//!                      ┌─────────────────┐
//!                      │ QuestionBuilder │  (pure, recomputed on demand)
//!                      └─────────────────┘
//! ```
//!
//! This crate holds the functional core. Storage, fanout and time are injected
//! through the traits in [`store`], [`event_bus`] and [`environment`]; the
//! services that drive them live in `duel-arena-runtime`.

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use serde::{Deserialize, Serialize};

pub mod answer;
pub mod error;
pub mod event;
pub mod event_bus;
pub mod question;
pub mod round;
pub mod shuffle;
pub mod store;
pub mod types;

pub use answer::{DuelAnswer, NewAnswer, normalize_response_ms, validate_choice};
pub use error::ArenaError;
pub use event::{ArenaEvent, RoundAnnouncement, Topic};
pub use event_bus::{EventBus, EventBusError, EventStream};
pub use question::{CHOICE_COUNT, PublicQuestion, QuestionBuilder, QuestionPayload};
pub use round::{DuelRound, InvalidTransition, NewRound, RoundState, RoundTransition};
pub use shuffle::{ChaChaShuffle, ShuffleStrategy, derive_seed};
pub use store::{AnswerInsert, CardRepository, SessionStore, StoreError};
pub use types::{
    AnswerId, Card, CardId, DuelMode, DuelPlayer, DuelSession, JoinCode, PlayerId, RoundId,
    SessionId, SessionStatus, SetId, UserId,
};

/// Environment module - Dependency injection traits
///
/// All time-dependent operations read the clock through this trait so tests can
/// pin `startedAt`/`endedAt`/`createdAt` to known instants.
pub mod environment {
    use chrono::{DateTime, Utc};

    /// Clock trait - abstracts time operations for testability
    ///
    /// # Examples
    ///
    /// ```
    /// use duel_arena_core::environment::{Clock, SystemClock};
    ///
    /// let clock = SystemClock;
    /// let before = clock.now();
    /// assert!(clock.now() >= before);
    /// ```
    pub trait Clock: Send + Sync {
        /// Get the current time
        fn now(&self) -> DateTime<Utc>;
    }

    /// Wall-clock time, used in production.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct SystemClock;

    impl Clock for SystemClock {
        fn now(&self) -> DateTime<Utc> {
            Utc::now()
        }
    }
}
