//! Live channel events and topic naming.
//!
//! Events are JSON objects tagged by `type`:
//!
//! ```json
//! {"type":"start","roundNo":3,"roundId":"…","questionCardId":"…"}
//! {"type":"round-start","round":{"id":"…","roundNo":3,"timerSec":20,"startedAt":"…"},
//!  "question":{"prompt":"…","choices":["…","…","…","…"]}}
//! {"type":"round-resolve","roundId":"…","correctIndex":2,"endedAt":"…"}
//! {"type":"answer","playerId":"…","choiceIndex":1}
//! ```
//!
//! Every session is reachable under two topics, its internal id and its join
//! code. `round-start` never carries the answer key.

use crate::question::PublicQuestion;
use crate::round::DuelRound;
use crate::types::{CardId, JoinCode, PlayerId, RoundId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Notification published on the event bus.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ArenaEvent {
    /// Host-side notice that a round was opened. Carries the target card, so it
    /// is only published on the session-id topic.
    #[serde(rename_all = "camelCase")]
    Start {
        /// Round number
        round_no: u32,
        /// Round id
        round_id: RoundId,
        /// Target card
        question_card_id: CardId,
    },

    /// A round went live.
    #[serde(rename_all = "camelCase")]
    RoundStart {
        /// Round timing
        round: RoundAnnouncement,
        /// Prompt and choices, without the answer key
        question: PublicQuestion,
    },

    /// A round was resolved and its answer key revealed.
    #[serde(rename_all = "camelCase")]
    RoundResolve {
        /// Round id
        round_id: RoundId,
        /// Correct choice; `null` if the question was degraded
        correct_index: Option<u8>,
        /// Resolution instant
        ended_at: DateTime<Utc>,
    },

    /// A player's first answer to the live round was recorded.
    #[serde(rename_all = "camelCase")]
    Answer {
        /// Answering player
        player_id: PlayerId,
        /// Chosen position
        choice_index: u8,
    },
}

impl ArenaEvent {
    /// Wire name of the event.
    #[must_use]
    pub const fn event_type(&self) -> &'static str {
        match self {
            Self::Start { .. } => "start",
            Self::RoundStart { .. } => "round-start",
            Self::RoundResolve { .. } => "round-resolve",
            Self::Answer { .. } => "answer",
        }
    }
}

/// Public timing data of a round.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoundAnnouncement {
    /// Round id
    pub id: RoundId,
    /// Round number
    pub round_no: u32,
    /// Advisory timer length
    pub timer_sec: u32,
    /// Start instant
    pub started_at: DateTime<Utc>,
}

impl From<&DuelRound> for RoundAnnouncement {
    fn from(round: &DuelRound) -> Self {
        Self {
            id: round.id,
            round_no: round.round_no,
            timer_sec: round.timer_sec,
            started_at: round.started_at,
        }
    }
}

/// Event bus topic name.
///
/// # Examples
///
/// ```
/// use duel_arena_core::{JoinCode, Topic};
///
/// let code: JoinCode = "ab12".parse().unwrap();
/// assert_eq!(Topic::code(&code).as_str(), "duel-code:AB12");
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Topic(String);

impl Topic {
    /// Topic keyed by the session's internal id.
    #[must_use]
    pub fn session(id: SessionId) -> Self {
        Self(format!("duel:{id}"))
    }

    /// Topic keyed by the session's public join code.
    #[must_use]
    pub fn code(code: &JoinCode) -> Self {
        Self(format!("duel-code:{code}"))
    }

    /// Topic name.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
