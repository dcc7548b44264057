//! Round state machine.
//!
//! A round is `Pending` until its row exists, `Live` while it accepts answers and
//! `Resolved` once correctness has been revealed. Transitions are modelled as a
//! closed enum so every state/transition pair is handled explicitly.

use crate::types::{CardId, RoundId, SessionId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// State of a single round.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RoundState {
    /// No row yet
    Pending,
    /// Accepting answers
    Live,
    /// Terminal; correct choice revealed
    Resolved,
}

/// Transitions a round can be asked to take.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RoundTransition {
    /// `Pending → Live`
    GoLive,
    /// `Live → Resolved`
    Resolve,
}

/// A transition that is not allowed from the current state.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("cannot apply {transition:?} to a round in state {from:?}")]
pub struct InvalidTransition {
    /// State the round was in
    pub from: RoundState,
    /// Transition that was refused
    pub transition: RoundTransition,
}

impl RoundState {
    /// Apply a transition, returning the next state.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] for every pair other than
    /// `Pending + GoLive` and `Live + Resolve`.
    ///
    /// # Examples
    ///
    /// ```
    /// use duel_arena_core::{RoundState, RoundTransition};
    ///
    /// let live = RoundState::Pending.transition(RoundTransition::GoLive).unwrap();
    /// assert_eq!(live, RoundState::Live);
    /// assert!(RoundState::Resolved.transition(RoundTransition::Resolve).is_err());
    /// ```
    pub const fn transition(self, transition: RoundTransition) -> Result<Self, InvalidTransition> {
        match (self, transition) {
            (Self::Pending, RoundTransition::GoLive) => Ok(Self::Live),
            (Self::Live, RoundTransition::Resolve) => Ok(Self::Resolved),
            (Self::Pending, RoundTransition::Resolve)
            | (Self::Live | Self::Resolved, RoundTransition::GoLive)
            | (Self::Resolved, RoundTransition::Resolve) => Err(InvalidTransition {
                from: self,
                transition,
            }),
        }
    }

    /// Whether the round accepts answers.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, Self::Live)
    }

    /// Whether the answer key may be revealed.
    #[must_use]
    pub const fn is_resolved(self) -> bool {
        matches!(self, Self::Resolved)
    }

    /// Database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Live => "LIVE",
            Self::Resolved => "RESOLVED",
        }
    }

    /// Parse from the database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PENDING" => Some(Self::Pending),
            "LIVE" => Some(Self::Live),
            "RESOLVED" => Some(Self::Resolved),
            _ => None,
        }
    }
}

/// A persisted round. Rows are created live and never deleted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuelRound {
    /// Round id; also the seed source for the question shuffle
    pub id: RoundId,
    /// Owning session
    pub session_id: SessionId,
    /// Strictly increasing per session, never reused
    pub round_no: u32,
    /// Current state
    pub state: RoundState,
    /// Target card of the question
    pub question_card_id: CardId,
    /// Advisory timer length
    pub timer_sec: u32,
    /// When the round went live
    pub started_at: DateTime<Utc>,
    /// When the round was resolved
    pub ended_at: Option<DateTime<Utc>>,
}

impl DuelRound {
    /// Materialize a round row from a request, numbering it `round_no`.
    ///
    /// # Errors
    ///
    /// Never in practice; the `Pending → Live` step is checked through the state
    /// machine like every other transition.
    pub fn open(new: NewRound, id: RoundId, round_no: u32) -> Result<Self, InvalidTransition> {
        let state = RoundState::Pending.transition(RoundTransition::GoLive)?;
        Ok(Self {
            id,
            session_id: new.session_id,
            round_no,
            state,
            question_card_id: new.question_card_id,
            timer_sec: new.timer_sec,
            started_at: new.started_at,
            ended_at: None,
        })
    }

    /// Resolve the round in place.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidTransition`] if the round is not live; the round is left untouched.
    pub fn resolve(&mut self, ended_at: DateTime<Utc>) -> Result<(), InvalidTransition> {
        self.state = self.state.transition(RoundTransition::Resolve)?;
        self.ended_at = Some(ended_at);
        Ok(())
    }
}

/// Request to create the next round of a session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewRound {
    /// Owning session
    pub session_id: SessionId,
    /// Target card
    pub question_card_id: CardId,
    /// Advisory timer length
    pub timer_sec: u32,
    /// Start instant
    pub started_at: DateTime<Utc>,
}
