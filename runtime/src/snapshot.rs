//! Full state reconstruction for joining and reconnecting clients.
//!
//! Snapshots read the session store only and rebuild the question on demand,
//! so they are correct even if the event bus delivered nothing.

use crate::context::ArenaContext;
use duel_arena_core::{
    ArenaError, DuelAnswer, DuelPlayer, DuelRound, DuelSession, JoinCode, PlayerId, PublicQuestion,
    RoundId, RoundState, SessionId,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::HashMap;

/// Current state of a duel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// The session
    pub session: DuelSession,
    /// Seated players
    pub players: Vec<DuelPlayer>,
    /// Latest round, if any was ever started
    pub round: Option<RoundView>,
    /// Answers recorded for the latest round
    pub answered_count: usize,
    /// Number of seated players
    pub total_players: usize,
    /// Per-player totals over every round of the session
    pub scoreboard: Vec<ScoreLine>,
}

/// Client view of a round. The answer key is only present once resolved.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundView {
    /// Round id
    pub id: RoundId,
    /// Round number
    pub round_no: u32,
    /// Round state
    pub state: RoundState,
    /// Advisory timer length
    pub timer_sec: u32,
    /// Start instant
    pub started_at: DateTime<Utc>,
    /// Resolution instant
    pub ended_at: Option<DateTime<Utc>>,
    /// Prompt and choices
    pub question: PublicQuestion,
    /// Answer key; `None` while live
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_index: Option<u8>,
}

/// One player's running totals.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreLine {
    /// Player
    pub player_id: PlayerId,
    /// Display name
    pub display_name: String,
    /// Correct answers
    pub correct: u32,
    /// Answers given
    pub answered: u32,
    /// Sum of response times of all answers
    pub total_response_ms: u64,
}

/// Builds [`Snapshot`]s.
#[derive(Clone, Debug)]
pub struct SnapshotService {
    ctx: ArenaContext,
}

impl SnapshotService {
    /// Create a snapshot service over the shared context.
    #[must_use]
    pub const fn new(ctx: ArenaContext) -> Self {
        Self { ctx }
    }

    /// Snapshot of the session with join code `code`.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::NotFound`] for an unknown code and
    /// [`ArenaError::Storage`] on store failures.
    #[tracing::instrument(skip(self, code), fields(code = %code), name = "snapshot")]
    pub async fn snapshot(&self, code: &JoinCode) -> Result<Snapshot, ArenaError> {
        let session = self.ctx.session_by_code(code).await?;
        self.build(session).await
    }

    /// Snapshot of the session with id `id`.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::NotFound`] for an unknown session and
    /// [`ArenaError::Storage`] on store failures.
    #[tracing::instrument(skip(self), name = "snapshot_by_id")]
    pub async fn snapshot_by_id(&self, id: SessionId) -> Result<Snapshot, ArenaError> {
        let session = self.ctx.session_by_id(id).await?;
        self.build(session).await
    }

    async fn build(&self, session: DuelSession) -> Result<Snapshot, ArenaError> {
        let store = &self.ctx.store;
        let players = store.list_players(session.id).await?;
        let answers = store.list_answers_for_session(session.id).await?;

        let (round, answered_count) = match store.latest_round(session.id).await? {
            Some(round) => {
                let answered = answers.iter().filter(|a| a.round_id == round.id).count();
                (Some(self.round_view(&session, round).await?), answered)
            }
            None => (None, 0),
        };

        let scoreboard = scoreboard(&players, &answers);
        Ok(Snapshot {
            total_players: players.len(),
            session,
            players,
            round,
            answered_count,
            scoreboard,
        })
    }

    async fn round_view(&self, session: &DuelSession, round: DuelRound) -> Result<RoundView, ArenaError> {
        let question = self.ctx.question(session, &round).await?;
        let correct_index = if round.state.is_resolved() {
            question.correct_index
        } else {
            None
        };
        Ok(RoundView {
            id: round.id,
            round_no: round.round_no,
            state: round.state,
            timer_sec: round.timer_sec,
            started_at: round.started_at,
            ended_at: round.ended_at,
            question: question.public(),
            correct_index,
        })
    }
}

/// Totals per seated player: most correct first, then fastest, then by name.
fn scoreboard(players: &[DuelPlayer], answers: &[DuelAnswer]) -> Vec<ScoreLine> {
    let mut lines: HashMap<PlayerId, ScoreLine> = players
        .iter()
        .map(|p| {
            (
                p.id,
                ScoreLine {
                    player_id: p.id,
                    display_name: p.display_name.clone(),
                    correct: 0,
                    answered: 0,
                    total_response_ms: 0,
                },
            )
        })
        .collect();

    for answer in answers {
        if let Some(line) = lines.get_mut(&answer.player_id) {
            line.answered += 1;
            line.correct += u32::from(answer.is_correct);
            line.total_response_ms += u64::from(answer.response_ms);
        }
    }

    let mut lines: Vec<ScoreLine> = lines.into_values().collect();
    lines.sort_by(|a, b| {
        (Reverse(a.correct), a.total_response_ms, &a.display_name, a.player_id).cmp(&(
            Reverse(b.correct),
            b.total_response_ms,
            &b.display_name,
            b.player_id,
        ))
    });
    lines
}

#[cfg(test)]
mod tests {
    use super::*;
    use duel_arena_core::{AnswerId, UserId};

    fn player(name: &str) -> DuelPlayer {
        DuelPlayer {
            id: PlayerId::new(),
            session_id: SessionId::new(),
            user_id: UserId::new(),
            display_name: name.to_string(),
        }
    }

    fn answer(player: &DuelPlayer, is_correct: bool, response_ms: u32) -> DuelAnswer {
        DuelAnswer {
            id: AnswerId::new(),
            round_id: RoundId::new(),
            player_id: player.id,
            choice_index: 0,
            is_correct,
            response_ms,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn scoreboard_orders_by_correct_then_speed_then_name() {
        let ann = player("ann");
        let bob = player("bob");
        let cy = player("cy");
        let dee = player("dee");
        let answers = vec![
            answer(&ann, true, 900),
            answer(&bob, true, 400),
            answer(&cy, false, 100),
            answer(&ann, true, 900),
            answer(&bob, true, 1500),
        ];

        let board = scoreboard(&[dee, cy, bob, ann], &answers);
        let names: Vec<&str> = board.iter().map(|l| l.display_name.as_str()).collect();
        // ann and bob tie on correct; ann is faster overall (1800 < 1900).
        // dee never answered, so a zero total beats cy's 100 ms.
        assert_eq!(names, ["ann", "bob", "dee", "cy"]);
        assert_eq!(board[2].answered, 0);
        assert_eq!(board[3].answered, 1);
        assert_eq!(board[3].correct, 0);
    }

    #[test]
    fn answers_from_unseated_players_are_ignored() {
        let ann = player("ann");
        let ghost = player("ghost");
        let board = scoreboard(&[ann], &[answer(&ghost, true, 1)]);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].answered, 0);
    }
}
