//! In-memory storage for fast, deterministic tests.
//!
//! All tables sit behind one lock, so every trait method is atomic in the same
//! way a single SQL statement is: `create_round` checks the live-round rule and
//! assigns the round number in one step, `resolve_round` is a conditional update
//! and `insert_answer` honours the `(round_id, player_id)` uniqueness.

use duel_arena_core::store::StoreFuture;
use duel_arena_core::{
    AnswerInsert, Card, CardRepository, DuelAnswer, DuelPlayer, DuelRound, DuelSession, JoinCode,
    NewAnswer, NewRound, PlayerId, RoundId, SessionId, SessionStatus, SessionStore, SetId,
    StoreError,
};
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Tables {
    sessions: Vec<DuelSession>,
    players: Vec<DuelPlayer>,
    rounds: Vec<DuelRound>,
    answers: Vec<DuelAnswer>,
}

/// In-memory [`SessionStore`].
///
/// Besides the trait, it exposes the writes owned by the lobby subsystem
/// (sessions, players, status) so tests can set the stage.
#[derive(Clone, Debug, Default)]
pub struct InMemorySessionStore {
    tables: Arc<RwLock<Tables>>,
}

impl InMemorySessionStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a session, as the lobby would.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the id or join code is taken.
    pub async fn insert_session(&self, session: DuelSession) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if tables
            .sessions
            .iter()
            .any(|existing| existing.id == session.id || existing.code == session.code)
        {
            return Err(StoreError::Conflict(format!(
                "session {} / code {} already exists",
                session.id, session.code
            )));
        }
        tables.sessions.push(session);
        Ok(())
    }

    /// Seat a player in an existing session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] if the session does not exist.
    pub async fn add_player(&self, player: DuelPlayer) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        if !tables.sessions.iter().any(|s| s.id == player.session_id) {
            return Err(StoreError::NotFound {
                resource: "session",
                id: player.session_id.to_string(),
            });
        }
        tables.players.push(player);
        Ok(())
    }

    /// Move a session's status forward.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown session and
    /// [`StoreError::Conflict`] for a backwards transition.
    pub async fn set_status(&self, id: SessionId, status: SessionStatus) -> Result<(), StoreError> {
        let mut tables = self.tables.write().await;
        let session = tables
            .sessions
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| StoreError::NotFound {
                resource: "session",
                id: id.to_string(),
            })?;
        if !session.status.can_advance_to(status) {
            return Err(StoreError::Conflict(format!(
                "session status cannot move from {} to {}",
                session.status.as_str(),
                status.as_str()
            )));
        }
        session.status = status;
        Ok(())
    }

    /// Number of rounds stored for a session
    pub async fn round_count(&self, session_id: SessionId) -> usize {
        self.tables
            .read()
            .await
            .rounds
            .iter()
            .filter(|r| r.session_id == session_id)
            .count()
    }

    /// Number of answers stored for a round
    pub async fn answer_count(&self, round_id: RoundId) -> usize {
        self.tables
            .read()
            .await
            .answers
            .iter()
            .filter(|a| a.round_id == round_id)
            .count()
    }

    /// Rounds of a session currently in state `LIVE`
    pub async fn live_round_count(&self, session_id: SessionId) -> usize {
        self.tables
            .read()
            .await
            .rounds
            .iter()
            .filter(|r| r.session_id == session_id && r.state.is_live())
            .count()
    }
}

fn sorted_rounds(tables: &Tables, session_id: SessionId) -> Vec<DuelRound> {
    let mut rounds: Vec<DuelRound> = tables
        .rounds
        .iter()
        .filter(|r| r.session_id == session_id)
        .cloned()
        .collect();
    rounds.sort_by_key(|r| r.round_no);
    rounds
}

impl SessionStore for InMemorySessionStore {
    fn find_session_by_code<'a>(&'a self, code: &'a JoinCode) -> StoreFuture<'a, Option<DuelSession>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables.sessions.iter().find(|s| &s.code == code).cloned())
        })
    }

    fn find_session(&self, id: SessionId) -> StoreFuture<'_, Option<DuelSession>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables.sessions.iter().find(|s| s.id == id).cloned())
        })
    }

    fn list_players(&self, session_id: SessionId) -> StoreFuture<'_, Vec<DuelPlayer>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables
                .players
                .iter()
                .filter(|p| p.session_id == session_id)
                .cloned()
                .collect())
        })
    }

    fn find_player(&self, id: PlayerId) -> StoreFuture<'_, Option<DuelPlayer>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables.players.iter().find(|p| p.id == id).cloned())
        })
    }

    fn list_rounds(&self, session_id: SessionId) -> StoreFuture<'_, Vec<DuelRound>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(sorted_rounds(&tables, session_id))
        })
    }

    fn latest_round(&self, session_id: SessionId) -> StoreFuture<'_, Option<DuelRound>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables
                .rounds
                .iter()
                .filter(|r| r.session_id == session_id)
                .max_by_key(|r| r.round_no)
                .cloned())
        })
    }

    fn find_round(&self, id: RoundId) -> StoreFuture<'_, Option<DuelRound>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables.rounds.iter().find(|r| r.id == id).cloned())
        })
    }

    fn create_round(&self, new_round: NewRound) -> StoreFuture<'_, DuelRound> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let session_id = new_round.session_id;
            let mut last_no = 0;
            for round in tables.rounds.iter().filter(|r| r.session_id == session_id) {
                if round.state.is_live() {
                    return Err(StoreError::Conflict(format!(
                        "session {session_id} already has live round {}",
                        round.round_no
                    )));
                }
                last_no = last_no.max(round.round_no);
            }

            let round = DuelRound::open(new_round, RoundId::new(), last_no + 1)
                .map_err(|e| StoreError::Conflict(e.to_string()))?;
            tables.rounds.push(round.clone());
            Ok(round)
        })
    }

    fn resolve_round(&self, id: RoundId, ended_at: DateTime<Utc>) -> StoreFuture<'_, Option<DuelRound>> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            let Some(round) = tables.rounds.iter_mut().find(|r| r.id == id) else {
                return Ok(None);
            };
            // Only a LIVE round transitions; anything else leaves the row untouched
            Ok(round.resolve(ended_at).ok().map(|()| round.clone()))
        })
    }

    fn insert_answer(&self, answer: NewAnswer) -> StoreFuture<'_, AnswerInsert> {
        Box::pin(async move {
            let mut tables = self.tables.write().await;
            if let Some(existing) = tables
                .answers
                .iter()
                .find(|a| a.round_id == answer.round_id && a.player_id == answer.player_id)
            {
                return Ok(AnswerInsert::Existing(existing.clone()));
            }

            let stored = DuelAnswer {
                id: answer.id,
                round_id: answer.round_id,
                player_id: answer.player_id,
                choice_index: answer.choice_index,
                is_correct: answer.is_correct,
                response_ms: answer.response_ms,
                created_at: answer.created_at,
            };
            tables.answers.push(stored.clone());
            Ok(AnswerInsert::Inserted(stored))
        })
    }

    fn find_answer(&self, round_id: RoundId, player_id: PlayerId) -> StoreFuture<'_, Option<DuelAnswer>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables
                .answers
                .iter()
                .find(|a| a.round_id == round_id && a.player_id == player_id)
                .cloned())
        })
    }

    fn list_answers_for_round(&self, round_id: RoundId) -> StoreFuture<'_, Vec<DuelAnswer>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            Ok(tables
                .answers
                .iter()
                .filter(|a| a.round_id == round_id)
                .cloned()
                .collect())
        })
    }

    fn list_answers_for_session(&self, session_id: SessionId) -> StoreFuture<'_, Vec<DuelAnswer>> {
        Box::pin(async move {
            let tables = self.tables.read().await;
            let round_ids: Vec<RoundId> = tables
                .rounds
                .iter()
                .filter(|r| r.session_id == session_id)
                .map(|r| r.id)
                .collect();
            Ok(tables
                .answers
                .iter()
                .filter(|a| round_ids.contains(&a.round_id))
                .cloned()
                .collect())
        })
    }
}

/// In-memory [`CardRepository`] keyed by study set.
#[derive(Clone, Debug, Default)]
pub struct InMemoryCardRepository {
    sets: Arc<RwLock<HashMap<SetId, Vec<Card>>>>,
}

impl InMemoryCardRepository {
    /// Create an empty repository
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add cards to a set
    pub async fn insert_cards(&self, set_id: SetId, cards: impl IntoIterator<Item = Card>) {
        self.sets.write().await.entry(set_id).or_default().extend(cards);
    }
}

impl CardRepository for InMemoryCardRepository {
    fn cards_for_set(&self, set_id: SetId) -> StoreFuture<'_, Vec<Card>> {
        Box::pin(async move {
            let mut cards = self.sets.read().await.get(&set_id).cloned().unwrap_or_default();
            cards.sort_by_key(|c| c.id);
            Ok(cards)
        })
    }
}
