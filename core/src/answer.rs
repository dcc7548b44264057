//! Answer records and input normalization.

use crate::error::ArenaError;
use crate::question::CHOICE_COUNT;
use crate::types::{AnswerId, PlayerId, RoundId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A scored answer. At most one per `(round_id, player_id)`; immutable once written.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuelAnswer {
    /// Answer id
    pub id: AnswerId,
    /// Round answered
    pub round_id: RoundId,
    /// Answering player
    pub player_id: PlayerId,
    /// Chosen position in the shuffled choices
    pub choice_index: u8,
    /// Server-computed correctness
    pub is_correct: bool,
    /// Client-reported response time, normalized
    pub response_ms: u32,
    /// When the answer was first recorded
    pub created_at: DateTime<Utc>,
}

/// Answer to be inserted; the store assigns nothing but enforces uniqueness.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct NewAnswer {
    /// Answer id to use if this write wins
    pub id: AnswerId,
    /// Round answered
    pub round_id: RoundId,
    /// Answering player
    pub player_id: PlayerId,
    /// Chosen position
    pub choice_index: u8,
    /// Server-computed correctness
    pub is_correct: bool,
    /// Normalized response time
    pub response_ms: u32,
    /// Insert instant
    pub created_at: DateTime<Utc>,
}

/// Check a client-supplied choice index against the fixed choice count.
///
/// # Errors
///
/// Returns [`ArenaError::Validation`] when the index is outside `0..4`.
///
/// # Examples
///
/// ```
/// use duel_arena_core::validate_choice;
///
/// assert_eq!(validate_choice(3).unwrap(), 3);
/// assert!(validate_choice(4).is_err());
/// assert!(validate_choice(-1).is_err());
/// ```
pub fn validate_choice(choice_index: i64) -> Result<u8, ArenaError> {
    u8::try_from(choice_index)
        .ok()
        .filter(|index| usize::from(*index) < CHOICE_COUNT)
        .ok_or_else(|| {
            ArenaError::Validation(format!(
                "choiceIndex must be between 0 and {}, got {choice_index}",
                CHOICE_COUNT - 1
            ))
        })
}

/// Normalize a client-reported response time to whole non-negative milliseconds.
///
/// Missing, non-finite and negative values become `0`; fractional values are
/// floored and anything beyond `u32::MAX` saturates.
///
/// # Examples
///
/// ```
/// use duel_arena_core::normalize_response_ms;
///
/// assert_eq!(normalize_response_ms(Some(1234.9)), 1234);
/// assert_eq!(normalize_response_ms(Some(-5.0)), 0);
/// assert_eq!(normalize_response_ms(Some(f64::NAN)), 0);
/// assert_eq!(normalize_response_ms(None), 0);
/// ```
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn normalize_response_ms(raw: Option<f64>) -> u32 {
    match raw {
        Some(ms) if ms.is_finite() && ms > 0.0 => {
            if ms >= f64::from(u32::MAX) {
                u32::MAX
            } else {
                // In range and non-negative after the guards above
                ms.floor() as u32
            }
        }
        _ => 0,
    }
}
