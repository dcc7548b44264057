//! # Duel Arena Runtime
//!
//! Services that drive the Duel Arena over the traits of `duel-arena-core`.
//!
//! ## Core Components
//!
//! - **[`RoundScheduler`]**: the round state machine (`start`, `next`, `resolve`)
//! - **[`AnswerLedger`]**: exactly-once, server-scored answers
//! - **[`SnapshotService`]**: full state from the store alone, for (re)joining clients
//! - **[`LocalEventBus`]**: process-local topic fanout
//! - **[`RoundTimer`]**: resolves rounds when their advisory timer elapses
//! - **[`Arena`]**: all of the above behind operations keyed by join code
//!
//! ## Example
//!
//! ```ignore
//! let arena = Arena::new(store, cards, Arc::new(LocalEventBus::new()), Arc::new(SystemClock), ArenaConfig::default());
//!
//! let started = arena.start(&code).await?;
//! arena.answer(&code, AnswerRequest { player_id, choice_index: 2, response_ms: Some(1830.0) }).await?;
//! arena.resolve(&code).await?;
//!
//! let snapshot = arena.snapshot(&code).await?;
//! assert_eq!(snapshot.answered_count, 1);
//! ```

/// Transport-neutral facade
pub mod arena;

/// Process-local event bus
pub mod bus;

/// Arena tunables
pub mod config;

/// Shared collaborators
pub mod context;

/// Answer recording and scoring
pub mod ledger;

/// Prometheus metrics for observability
pub mod metrics;

/// Best-effort event publishing
pub mod notifier;

/// Round lifecycle
pub mod scheduler;

/// State reconstruction
pub mod snapshot;

/// Automatic round resolution
pub mod timer;

pub use arena::{Arena, AnswerRequest};
pub use bus::LocalEventBus;
pub use config::ArenaConfig;
pub use context::ArenaContext;
pub use ledger::{AnswerLedger, AnswerSubmission, SubmitOutcome};
pub use notifier::{Audience, Notifier};
pub use scheduler::{NextOutcome, ResolveOutcome, RoundScheduler, StartOutcome};
pub use snapshot::{RoundView, ScoreLine, Snapshot, SnapshotService};
pub use timer::RoundTimer;
