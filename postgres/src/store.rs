//! `PostgreSQL` implementation of the arena store traits.

use crate::rows::{AnswerRow, CardRow, PlayerRow, RoundRow, SessionRow, convert_all};
use chrono::{DateTime, Utc};
use duel_arena_core::store::StoreFuture;
use duel_arena_core::{
    AnswerInsert, Card, CardRepository, DuelAnswer, DuelPlayer, DuelRound, DuelSession, JoinCode,
    NewAnswer, NewRound, PlayerId, RoundId, SessionId, SessionStatus, SessionStore, SetId,
    StoreError,
};
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;

/// Map a write error, turning unique violations into [`StoreError::Conflict`].
fn write_error(e: sqlx::Error, action: &str) -> StoreError {
    if let sqlx::Error::Database(db_err) = &e {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(format!(
                "{action}: {}",
                db_err.constraint().unwrap_or("unique constraint")
            ));
        }
    }
    StoreError::Database(format!("Failed to {action}: {e}"))
}

fn read_error(e: &sqlx::Error, what: &str) -> StoreError {
    StoreError::Database(format!("Failed to load {what}: {e}"))
}

fn to_i32(value: u32, what: &str) -> Result<i32, StoreError> {
    i32::try_from(value).map_err(|_| StoreError::Database(format!("{what} out of range: {value}")))
}

/// `PostgreSQL` session store.
///
/// Cloning is cheap; clones share the connection pool.
#[derive(Clone, Debug)]
pub struct PostgresSessionStore {
    pool: PgPool,
}

impl PostgresSessionStore {
    /// Wrap an existing connection pool.
    #[must_use]
    pub const fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to `database_url` with at most `max_connections` pooled connections.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the pool cannot connect.
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| StoreError::Database(format!("Failed to connect: {e}")))?;
        tracing::info!(max_connections, "Connected to PostgreSQL");
        Ok(Self::from_pool(pool))
    }

    /// The underlying pool.
    #[must_use]
    pub const fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run database migrations.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if a migration fails.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(format!("Migration failed: {e}")))?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Lobby-side writes. The arena never calls these; they exist for the
    // lobby service, seeding and tests.
    // ------------------------------------------------------------------

    /// Insert a session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if the id or join code is taken.
    pub async fn create_session(&self, session: &DuelSession) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO duel_sessions (id, code, host_id, mode, status, set_id, created_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7)",
        )
        .bind(session.id.as_uuid())
        .bind(session.code.as_str())
        .bind(session.host_id.as_uuid())
        .bind(session.mode.as_str())
        .bind(session.status.as_str())
        .bind(session.set_id.as_uuid())
        .bind(session.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "create session"))?;
        Ok(())
    }

    /// Seat a player in a session.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Database`] if the session does not exist.
    pub async fn add_player(&self, player: &DuelPlayer) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO duel_players (id, session_id, user_id, display_name)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(player.id.as_uuid())
        .bind(player.session_id.as_uuid())
        .bind(player.user_id.as_uuid())
        .bind(&player.display_name)
        .execute(&self.pool)
        .await
        .map_err(|e| write_error(e, "add player"))?;
        Ok(())
    }

    /// Move a session forward in its lifecycle.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::NotFound`] for an unknown session and
    /// [`StoreError::Conflict`] if the move would go backwards.
    pub async fn set_status(&self, id: SessionId, status: SessionStatus) -> Result<(), StoreError> {
        let current = self.find_session(id).await?.ok_or_else(|| StoreError::NotFound {
            resource: "session",
            id: id.to_string(),
        })?;
        if !current.status.can_advance_to(status) {
            return Err(StoreError::Conflict(format!(
                "session {} cannot go from {} to {}",
                current.code,
                current.status.as_str(),
                status.as_str()
            )));
        }
        sqlx::query("UPDATE duel_sessions SET status = $2 WHERE id = $1")
            .bind(id.as_uuid())
            .bind(status.as_str())
            .execute(&self.pool)
            .await
            .map_err(|e| write_error(e, "update session status"))?;
        Ok(())
    }

    /// Add cards to a study set.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Conflict`] if a card id already exists.
    pub async fn insert_cards(&self, set_id: SetId, cards: &[Card]) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to begin transaction: {e}")))?;
        for card in cards {
            sqlx::query(
                "INSERT INTO study_cards (id, set_id, term, definition) VALUES ($1, $2, $3, $4)",
            )
            .bind(card.id.as_uuid())
            .bind(set_id.as_uuid())
            .bind(&card.term)
            .bind(&card.definition)
            .execute(&mut *tx)
            .await
            .map_err(|e| write_error(e, "insert card"))?;
        }
        tx.commit()
            .await
            .map_err(|e| StoreError::Database(format!("Failed to commit cards: {e}")))?;
        Ok(())
    }

    async fn answer_for(
        &self,
        round_id: RoundId,
        player_id: PlayerId,
    ) -> Result<Option<DuelAnswer>, StoreError> {
        let row = sqlx::query_as::<_, AnswerRow>(
            "SELECT id, round_id, player_id, choice_index, is_correct, response_ms, created_at
             FROM duel_answers WHERE round_id = $1 AND player_id = $2",
        )
        .bind(round_id.as_uuid())
        .bind(player_id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| read_error(&e, "answer"))?;
        row.map(DuelAnswer::try_from).transpose()
    }
}

impl SessionStore for PostgresSessionStore {
    fn find_session_by_code<'a>(&'a self, code: &'a JoinCode) -> StoreFuture<'a, Option<DuelSession>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, SessionRow>(
                "SELECT id, code, host_id, mode, status, set_id, created_at
                 FROM duel_sessions WHERE code = $1",
            )
            .bind(code.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_error(&e, "session"))?;
            row.map(DuelSession::try_from).transpose()
        })
    }

    fn find_session(&self, id: SessionId) -> StoreFuture<'_, Option<DuelSession>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, SessionRow>(
                "SELECT id, code, host_id, mode, status, set_id, created_at
                 FROM duel_sessions WHERE id = $1",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_error(&e, "session"))?;
            row.map(DuelSession::try_from).transpose()
        })
    }

    fn list_players(&self, session_id: SessionId) -> StoreFuture<'_, Vec<DuelPlayer>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, PlayerRow>(
                "SELECT id, session_id, user_id, display_name
                 FROM duel_players WHERE session_id = $1
                 ORDER BY joined_at, id",
            )
            .bind(session_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_error(&e, "players"))?;
            Ok(rows.into_iter().map(DuelPlayer::from).collect())
        })
    }

    fn find_player(&self, id: PlayerId) -> StoreFuture<'_, Option<DuelPlayer>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, PlayerRow>(
                "SELECT id, session_id, user_id, display_name FROM duel_players WHERE id = $1",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_error(&e, "player"))?;
            Ok(row.map(DuelPlayer::from))
        })
    }

    fn list_rounds(&self, session_id: SessionId) -> StoreFuture<'_, Vec<DuelRound>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, RoundRow>(
                "SELECT id, session_id, round_no, state, question_card_id, timer_sec, started_at, ended_at
                 FROM duel_rounds WHERE session_id = $1
                 ORDER BY round_no",
            )
            .bind(session_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_error(&e, "rounds"))?;
            convert_all(rows)
        })
    }

    fn latest_round(&self, session_id: SessionId) -> StoreFuture<'_, Option<DuelRound>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, RoundRow>(
                "SELECT id, session_id, round_no, state, question_card_id, timer_sec, started_at, ended_at
                 FROM duel_rounds WHERE session_id = $1
                 ORDER BY round_no DESC LIMIT 1",
            )
            .bind(session_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_error(&e, "latest round"))?;
            row.map(DuelRound::try_from).transpose()
        })
    }

    fn find_round(&self, id: RoundId) -> StoreFuture<'_, Option<DuelRound>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, RoundRow>(
                "SELECT id, session_id, round_no, state, question_card_id, timer_sec, started_at, ended_at
                 FROM duel_rounds WHERE id = $1",
            )
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| read_error(&e, "round"))?;
            row.map(DuelRound::try_from).transpose()
        })
    }

    fn create_round(&self, new_round: NewRound) -> StoreFuture<'_, DuelRound> {
        Box::pin(async move {
            // Numbering happens in the same statement; a concurrent insert trips
            // either the (session_id, round_no) key or the one-live index.
            let draft = DuelRound::open(new_round, RoundId::new(), 0)
                .map_err(|e| StoreError::Conflict(e.to_string()))?;
            let row = sqlx::query_as::<_, RoundRow>(
                "INSERT INTO duel_rounds
                     (id, session_id, round_no, state, question_card_id, timer_sec, started_at)
                 SELECT $1, $2, COALESCE(MAX(round_no), 0) + 1, $3, $4, $5, $6
                 FROM duel_rounds WHERE session_id = $2
                 RETURNING id, session_id, round_no, state, question_card_id, timer_sec, started_at, ended_at",
            )
            .bind(draft.id.as_uuid())
            .bind(draft.session_id.as_uuid())
            .bind(draft.state.as_str())
            .bind(draft.question_card_id.as_uuid())
            .bind(to_i32(draft.timer_sec, "round timer")?)
            .bind(draft.started_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|e| write_error(e, "create round"))?;
            DuelRound::try_from(row)
        })
    }

    fn resolve_round(&self, id: RoundId, ended_at: DateTime<Utc>) -> StoreFuture<'_, Option<DuelRound>> {
        Box::pin(async move {
            let row = sqlx::query_as::<_, RoundRow>(
                "UPDATE duel_rounds SET state = 'RESOLVED', ended_at = $2
                 WHERE id = $1 AND state = 'LIVE'
                 RETURNING id, session_id, round_no, state, question_card_id, timer_sec, started_at, ended_at",
            )
            .bind(id.as_uuid())
            .bind(ended_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, "resolve round"))?;
            row.map(DuelRound::try_from).transpose()
        })
    }

    fn insert_answer(&self, answer: NewAnswer) -> StoreFuture<'_, AnswerInsert> {
        Box::pin(async move {
            let inserted = sqlx::query_as::<_, AnswerRow>(
                "INSERT INTO duel_answers
                     (id, round_id, player_id, choice_index, is_correct, response_ms, created_at)
                 VALUES ($1, $2, $3, $4, $5, $6, $7)
                 ON CONFLICT (round_id, player_id) DO NOTHING
                 RETURNING id, round_id, player_id, choice_index, is_correct, response_ms, created_at",
            )
            .bind(answer.id.as_uuid())
            .bind(answer.round_id.as_uuid())
            .bind(answer.player_id.as_uuid())
            .bind(i16::from(answer.choice_index))
            .bind(answer.is_correct)
            .bind(i64::from(answer.response_ms))
            .bind(answer.created_at)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| write_error(e, "record answer"))?;

            if let Some(row) = inserted {
                return Ok(AnswerInsert::Inserted(DuelAnswer::try_from(row)?));
            }

            // Lost to an earlier write; hand back the stored answer
            self.answer_for(answer.round_id, answer.player_id)
                .await?
                .map(AnswerInsert::Existing)
                .ok_or_else(|| {
                    StoreError::Database(format!(
                        "answer for player {} in round {} conflicted but cannot be read",
                        answer.player_id, answer.round_id
                    ))
                })
        })
    }

    fn find_answer(&self, round_id: RoundId, player_id: PlayerId) -> StoreFuture<'_, Option<DuelAnswer>> {
        Box::pin(self.answer_for(round_id, player_id))
    }

    fn list_answers_for_round(&self, round_id: RoundId) -> StoreFuture<'_, Vec<DuelAnswer>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, AnswerRow>(
                "SELECT id, round_id, player_id, choice_index, is_correct, response_ms, created_at
                 FROM duel_answers WHERE round_id = $1
                 ORDER BY created_at, id",
            )
            .bind(round_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_error(&e, "answers"))?;
            convert_all(rows)
        })
    }

    fn list_answers_for_session(&self, session_id: SessionId) -> StoreFuture<'_, Vec<DuelAnswer>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, AnswerRow>(
                "SELECT a.id, a.round_id, a.player_id, a.choice_index, a.is_correct, a.response_ms, a.created_at
                 FROM duel_answers a
                 JOIN duel_rounds r ON r.id = a.round_id
                 WHERE r.session_id = $1
                 ORDER BY r.round_no, a.created_at, a.id",
            )
            .bind(session_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_error(&e, "answers"))?;
            convert_all(rows)
        })
    }
}

impl CardRepository for PostgresSessionStore {
    fn cards_for_set(&self, set_id: SetId) -> StoreFuture<'_, Vec<Card>> {
        Box::pin(async move {
            let rows = sqlx::query_as::<_, CardRow>(
                "SELECT id, term, definition FROM study_cards WHERE set_id = $1 ORDER BY id",
            )
            .bind(set_id.as_uuid())
            .fetch_all(&self.pool)
            .await
            .map_err(|e| read_error(&e, "cards"))?;
            Ok(rows.into_iter().map(Card::from).collect())
        })
    }
}
