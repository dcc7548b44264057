//! Row types and their conversion into domain types.

use chrono::{DateTime, Utc};
use duel_arena_core::{
    AnswerId, Card, CardId, DuelAnswer, DuelMode, DuelPlayer, DuelRound, DuelSession, PlayerId,
    RoundId, RoundState, SessionId, SessionStatus, SetId, StoreError, UserId,
};
use uuid::Uuid;

fn corrupt(what: &str, value: impl std::fmt::Display) -> StoreError {
    StoreError::Database(format!("Invalid {what} in database: {value}"))
}

#[derive(sqlx::FromRow)]
pub(crate) struct SessionRow {
    id: Uuid,
    code: String,
    host_id: Uuid,
    mode: String,
    status: String,
    set_id: Uuid,
    created_at: DateTime<Utc>,
}

impl TryFrom<SessionRow> for DuelSession {
    type Error = StoreError;

    fn try_from(row: SessionRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: SessionId::from_uuid(row.id),
            code: row.code.parse().map_err(|_| corrupt("join code", &row.code))?,
            host_id: UserId::from_uuid(row.host_id),
            mode: DuelMode::parse(&row.mode).ok_or_else(|| corrupt("mode", &row.mode))?,
            status: SessionStatus::parse(&row.status).ok_or_else(|| corrupt("status", &row.status))?,
            set_id: SetId::from_uuid(row.set_id),
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct PlayerRow {
    id: Uuid,
    session_id: Uuid,
    user_id: Uuid,
    display_name: String,
}

impl From<PlayerRow> for DuelPlayer {
    fn from(row: PlayerRow) -> Self {
        Self {
            id: PlayerId::from_uuid(row.id),
            session_id: SessionId::from_uuid(row.session_id),
            user_id: UserId::from_uuid(row.user_id),
            display_name: row.display_name,
        }
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct RoundRow {
    id: Uuid,
    session_id: Uuid,
    round_no: i32,
    state: String,
    question_card_id: Uuid,
    timer_sec: i32,
    started_at: DateTime<Utc>,
    ended_at: Option<DateTime<Utc>>,
}

impl TryFrom<RoundRow> for DuelRound {
    type Error = StoreError;

    fn try_from(row: RoundRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: RoundId::from_uuid(row.id),
            session_id: SessionId::from_uuid(row.session_id),
            round_no: u32::try_from(row.round_no).map_err(|_| corrupt("round number", row.round_no))?,
            state: RoundState::parse(&row.state).ok_or_else(|| corrupt("round state", &row.state))?,
            question_card_id: CardId::from_uuid(row.question_card_id),
            timer_sec: u32::try_from(row.timer_sec).map_err(|_| corrupt("round timer", row.timer_sec))?,
            started_at: row.started_at,
            ended_at: row.ended_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct AnswerRow {
    id: Uuid,
    round_id: Uuid,
    player_id: Uuid,
    choice_index: i16,
    is_correct: bool,
    response_ms: i64,
    created_at: DateTime<Utc>,
}

impl TryFrom<AnswerRow> for DuelAnswer {
    type Error = StoreError;

    fn try_from(row: AnswerRow) -> Result<Self, Self::Error> {
        Ok(Self {
            id: AnswerId::from_uuid(row.id),
            round_id: RoundId::from_uuid(row.round_id),
            player_id: PlayerId::from_uuid(row.player_id),
            choice_index: u8::try_from(row.choice_index)
                .map_err(|_| corrupt("choice index", row.choice_index))?,
            is_correct: row.is_correct,
            response_ms: u32::try_from(row.response_ms)
                .map_err(|_| corrupt("response time", row.response_ms))?,
            created_at: row.created_at,
        })
    }
}

#[derive(sqlx::FromRow)]
pub(crate) struct CardRow {
    id: Uuid,
    term: String,
    definition: String,
}

impl From<CardRow> for Card {
    fn from(row: CardRow) -> Self {
        Self {
            id: CardId::from_uuid(row.id),
            term: row.term,
            definition: row.definition,
        }
    }
}

/// Convert a batch of rows, failing on the first corrupt one.
pub(crate) fn convert_all<R, T>(rows: Vec<R>) -> Result<Vec<T>, StoreError>
where
    T: TryFrom<R, Error = StoreError>,
{
    rows.into_iter().map(T::try_from).collect()
}
