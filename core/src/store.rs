//! Persistence traits for duel sessions, rounds, answers and cards.
//!
//! The store is the single source of truth. Implementations must provide two
//! atomic primitives the services rely on:
//!
//! - [`SessionStore::resolve_round`] is a conditional update (`LIVE → RESOLVED`)
//!   that reports whether *this* call performed the transition
//! - [`SessionStore::insert_answer`] is insert-if-absent on `(round_id, player_id)`
//!   and returns the existing row when it loses
//!
//! # Implementations
//!
//! - `PostgresSessionStore` (in `duel-arena-postgres`): production implementation
//! - `InMemorySessionStore` (in `duel-arena-testing`): fast, deterministic testing

use crate::answer::{DuelAnswer, NewAnswer};
use crate::round::{DuelRound, NewRound};
use crate::types::{Card, DuelPlayer, DuelSession, JoinCode, PlayerId, RoundId, SessionId, SetId};
use chrono::{DateTime, Utc};
use std::future::Future;
use std::pin::Pin;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Referenced record does not exist.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Kind of record
        resource: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// A uniqueness rule was violated (e.g. a second LIVE round for a session).
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Database connection or query error.
    #[error("Database error: {0}")]
    Database(String),
}

/// Boxed future returned by store methods.
pub type StoreFuture<'a, T> = Pin<Box<dyn Future<Output = Result<T, StoreError>> + Send + 'a>>;

/// Outcome of an insert-if-absent answer write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum AnswerInsert {
    /// This call wrote the row.
    Inserted(DuelAnswer),
    /// A row for `(round_id, player_id)` already existed and is returned unchanged.
    Existing(DuelAnswer),
}

impl AnswerInsert {
    /// The stored answer, whichever call wrote it.
    #[must_use]
    pub const fn answer(&self) -> &DuelAnswer {
        match self {
            Self::Inserted(answer) | Self::Existing(answer) => answer,
        }
    }

    /// Consume into the stored answer.
    #[must_use]
    pub fn into_answer(self) -> DuelAnswer {
        match self {
            Self::Inserted(answer) | Self::Existing(answer) => answer,
        }
    }

    /// Whether an earlier write already existed.
    #[must_use]
    pub const fn is_duplicate(&self) -> bool {
        matches!(self, Self::Existing(_))
    }
}

/// Durable storage of sessions, players, rounds and answers.
///
/// Sessions and players are created by the lobby subsystem; this trait only reads
/// them. Rounds and answers are written here.
///
/// # Dyn Compatibility
///
/// Methods return [`StoreFuture`] instead of using `async fn` so the store can be
/// shared as `Arc<dyn SessionStore>`.
pub trait SessionStore: Send + Sync {
    /// Look a session up by its join code.
    fn find_session_by_code<'a>(&'a self, code: &'a JoinCode) -> StoreFuture<'a, Option<DuelSession>>;

    /// Look a session up by id.
    fn find_session(&self, id: SessionId) -> StoreFuture<'_, Option<DuelSession>>;

    /// Players of a session, in join order.
    fn list_players(&self, session_id: SessionId) -> StoreFuture<'_, Vec<DuelPlayer>>;

    /// Look a player up by id.
    fn find_player(&self, id: PlayerId) -> StoreFuture<'_, Option<DuelPlayer>>;

    /// Rounds of a session ordered by `round_no`.
    fn list_rounds(&self, session_id: SessionId) -> StoreFuture<'_, Vec<DuelRound>>;

    /// Round with the highest `round_no`, if any.
    fn latest_round(&self, session_id: SessionId) -> StoreFuture<'_, Option<DuelRound>>;

    /// Look a round up by id.
    fn find_round(&self, id: RoundId) -> StoreFuture<'_, Option<DuelRound>>;

    /// Insert the next round of a session in state `LIVE`.
    ///
    /// The store assigns `round_no = max(round_no) + 1` (or `1`) and the round id.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the session already has a `LIVE` round or
    /// a concurrent insert took the same `round_no`.
    fn create_round(&self, new_round: NewRound) -> StoreFuture<'_, DuelRound>;

    /// Atomically move a round from `LIVE` to `RESOLVED`.
    ///
    /// Returns `Some(round)` only if this call performed the transition, `None` if
    /// the round was not live (already resolved or unknown).
    fn resolve_round(&self, id: RoundId, ended_at: DateTime<Utc>) -> StoreFuture<'_, Option<DuelRound>>;

    /// Insert an answer unless one exists for `(round_id, player_id)`.
    fn insert_answer(&self, answer: NewAnswer) -> StoreFuture<'_, AnswerInsert>;

    /// A player's answer to a round, if recorded.
    fn find_answer(&self, round_id: RoundId, player_id: PlayerId) -> StoreFuture<'_, Option<DuelAnswer>>;

    /// Answers of one round, oldest first.
    fn list_answers_for_round(&self, round_id: RoundId) -> StoreFuture<'_, Vec<DuelAnswer>>;

    /// Answers of every round of a session, oldest first.
    fn list_answers_for_session(&self, session_id: SessionId) -> StoreFuture<'_, Vec<DuelAnswer>>;
}

/// Read access to study-set cards.
pub trait CardRepository: Send + Sync {
    /// Cards of a study set ordered by card id. Unknown sets yield an empty list.
    fn cards_for_set(&self, set_id: SetId) -> StoreFuture<'_, Vec<Card>>;
}
