//! Deterministic multiple-choice question construction.
//!
//! A question is a pure function of `(round id, question card, card pool)`, so it
//! never needs to be stored: the scheduler, the answer ledger and the snapshot
//! service each rebuild it and always agree on the choices and the answer key.
//!
//! # Algorithm
//!
//! 1. Sort the pool by card id and locate the target card.
//! 2. Collect up to three distractor definitions, walking from the target with
//!    strides 1, 2, 3, … (offsets 1, 3, 6, 10, …) and then sweeping the remaining
//!    offsets, skipping the target and any definition already taken.
//! 3. Pad with the target's own definition when the pool cannot supply three
//!    distinct distractors (sets with fewer than four distinct definitions).
//! 4. Permute `[correct, d1, d2, d3]` with a generator seeded from the round id.
//! 5. `correct_index` is where the correct entry landed.

use crate::round::DuelRound;
use crate::shuffle::{ChaChaShuffle, ShuffleStrategy, derive_seed};
use crate::types::{Card, CardId, RoundId};
use serde::{Deserialize, Serialize};

/// Number of choices in every question.
pub const CHOICE_COUNT: usize = 4;

const DISTRACTOR_COUNT: usize = CHOICE_COUNT - 1;

/// Full question including the answer key. Never sent to clients while live.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QuestionPayload {
    /// Target card's term
    pub prompt: String,
    /// Shuffled definitions; empty when degraded
    pub choices: Vec<String>,
    /// Position of the correct definition; `None` when degraded
    pub correct_index: Option<u8>,
}

impl QuestionPayload {
    fn degraded(question_card_id: CardId) -> Self {
        Self {
            prompt: format!("Question unavailable: card {question_card_id} is not in this set"),
            choices: Vec::new(),
            correct_index: None,
        }
    }

    /// Whether the target card was missing from the pool.
    #[must_use]
    pub fn is_degraded(&self) -> bool {
        self.correct_index.is_none()
    }

    /// Client-safe view without the answer key.
    #[must_use]
    pub fn public(&self) -> PublicQuestion {
        PublicQuestion {
            prompt: self.prompt.clone(),
            choices: self.choices.clone(),
        }
    }
}

/// Question as shown to players.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicQuestion {
    /// Prompt text
    pub prompt: String,
    /// Choices in display order
    pub choices: Vec<String>,
}

/// Builds questions from a card pool.
///
/// # Examples
///
/// ```
/// use duel_arena_core::{Card, CardId, QuestionBuilder, RoundId};
/// use uuid::Uuid;
///
/// let pool: Vec<Card> = ["alpha", "beta", "gamma", "delta", "epsilon"]
///     .iter()
///     .enumerate()
///     .map(|(i, d)| Card {
///         id: CardId::from_uuid(Uuid::from_u128(i as u128 + 1)),
///         term: format!("term {i}"),
///         definition: (*d).to_string(),
///     })
///     .collect();
///
/// let builder = QuestionBuilder::new();
/// let round_id = RoundId::new();
/// let question = builder.build(round_id, pool[0].id, &pool);
///
/// assert_eq!(question.choices.len(), 4);
/// let correct = usize::from(question.correct_index.unwrap());
/// assert_eq!(question.choices[correct], "alpha");
/// assert_eq!(question, builder.build(round_id, pool[0].id, &pool));
/// ```
#[derive(Debug, Clone, Default)]
pub struct QuestionBuilder<S = ChaChaShuffle> {
    shuffle: S,
}

impl QuestionBuilder {
    /// Builder using the default ChaCha shuffle.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            shuffle: ChaChaShuffle,
        }
    }
}

impl<S: ShuffleStrategy> QuestionBuilder<S> {
    /// Builder using a custom shuffle strategy.
    #[must_use]
    pub const fn with_strategy(shuffle: S) -> Self {
        Self { shuffle }
    }

    /// Build the question of `round` from the set's cards.
    #[must_use]
    pub fn build_for(&self, round: &DuelRound, pool: &[Card]) -> QuestionPayload {
        self.build(round.id, round.question_card_id, pool)
    }

    /// Build a question. Never fails; a missing target yields a degraded payload.
    #[must_use]
    pub fn build(&self, round_id: RoundId, question_card_id: CardId, pool: &[Card]) -> QuestionPayload {
        let mut sorted: Vec<&Card> = pool.iter().collect();
        sorted.sort_by_key(|card| card.id);

        let Some(target_idx) = sorted.iter().position(|card| card.id == question_card_id) else {
            return QuestionPayload::degraded(question_card_id);
        };
        let target = sorted[target_idx];

        let mut options: Vec<&str> = Vec::with_capacity(CHOICE_COUNT);
        options.push(target.definition.as_str());
        options.extend(pick_distractors(&sorted, target_idx));
        while options.len() < CHOICE_COUNT {
            options.push(target.definition.as_str());
        }

        let order = self
            .shuffle
            .permutation(derive_seed(&round_id.to_string()), CHOICE_COUNT);
        let choices = order
            .iter()
            .filter_map(|&slot| options.get(slot).map(|text| (*text).to_string()))
            .collect();
        let correct_index = order
            .iter()
            .position(|&slot| slot == 0)
            .and_then(|position| u8::try_from(position).ok());

        QuestionPayload {
            prompt: target.term.clone(),
            choices,
            correct_index,
        }
    }
}

fn pick_distractors<'a>(sorted: &[&'a Card], target_idx: usize) -> Vec<&'a str> {
    let len = sorted.len();
    let mut picked: Vec<&'a str> = Vec::with_capacity(DISTRACTOR_COUNT);
    if len < 2 {
        return picked;
    }
    let target_card: &'a Card = sorted[target_idx];
    let target_definition = target_card.definition.as_str();

    let consider = |offset: usize, picked: &mut Vec<&'a str>| {
        let card: &'a Card = sorted[(target_idx + offset) % len];
        let candidate = card.definition.as_str();
        if candidate != target_definition && !picked.contains(&candidate) {
            picked.push(candidate);
        }
    };

    let mut offset = 0;
    for stride in 1..=2 * len {
        if picked.len() == DISTRACTOR_COUNT {
            return picked;
        }
        offset = (offset + stride) % len;
        if offset != 0 {
            consider(offset, &mut picked);
        }
    }

    for offset in 1..len {
        if picked.len() == DISTRACTOR_COUNT {
            break;
        }
        consider(offset, &mut picked);
    }
    picked
}
