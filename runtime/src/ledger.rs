//! Exactly-once answer recording.
//!
//! Correctness is always computed here, by rebuilding the round's question and
//! comparing the submitted position with its answer key. The store's
//! `(round_id, player_id)` uniqueness decides which of several concurrent
//! submissions wins; the others get the winner's row back.

use crate::context::ArenaContext;
use crate::notifier::Audience;
use duel_arena_core::{
    AnswerId, AnswerInsert, ArenaError, ArenaEvent, DuelAnswer, NewAnswer, PlayerId, RoundId,
    normalize_response_ms, validate_choice,
};
use serde::Serialize;

/// A raw answer as received from a client.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerSubmission {
    /// Round being answered
    pub round_id: RoundId,
    /// Answering player
    pub player_id: PlayerId,
    /// Chosen position, validated against `0..4`
    pub choice_index: i64,
    /// Client-measured response time; normalized before storage
    pub response_ms: Option<f64>,
}

/// Result of [`AnswerLedger::submit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitOutcome {
    /// The stored answer (the first one, for replays)
    pub answer: DuelAnswer,
    /// Whether an earlier submission had already been recorded
    pub duplicate: bool,
}

/// Records and scores answers.
#[derive(Clone, Debug)]
pub struct AnswerLedger {
    ctx: ArenaContext,
}

impl AnswerLedger {
    /// Create a ledger over the shared context.
    #[must_use]
    pub const fn new(ctx: ArenaContext) -> Self {
        Self { ctx }
    }

    /// Record a player's answer to a live round.
    ///
    /// Resubmissions return the first stored answer unchanged and publish nothing.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::Validation`] if `choice_index` is outside `0..4` (checked before any read)
    /// - [`ArenaError::NotFound`] for an unknown round, or a player not seated in its session
    /// - [`ArenaError::InvalidState`] if the round is not live
    /// - [`ArenaError::Storage`] on store failures
    #[tracing::instrument(
        skip(self, submission),
        fields(round_id = %submission.round_id, player_id = %submission.player_id),
        name = "answer_submit"
    )]
    pub async fn submit(&self, submission: AnswerSubmission) -> Result<SubmitOutcome, ArenaError> {
        let choice_index = validate_choice(submission.choice_index)?;
        let store = &self.ctx.store;

        let round = store
            .find_round(submission.round_id)
            .await?
            .ok_or_else(|| ArenaError::not_found("round", submission.round_id))?;
        match store.find_player(submission.player_id).await? {
            Some(player) if player.session_id == round.session_id => {}
            _ => return Err(ArenaError::not_found("player", submission.player_id)),
        }

        if !round.state.is_live() {
            return Err(ArenaError::InvalidState(format!(
                "round {} is {}, answers are closed",
                round.round_no,
                round.state.as_str()
            )));
        }

        if let Some(existing) = store.find_answer(round.id, submission.player_id).await? {
            return Ok(Self::replayed(existing));
        }

        let session = self.ctx.session_by_id(round.session_id).await?;
        let question = self.ctx.question(&session, &round).await?;
        let is_correct = question.correct_index == Some(choice_index);

        let inserted = store
            .insert_answer(NewAnswer {
                id: AnswerId::new(),
                round_id: round.id,
                player_id: submission.player_id,
                choice_index,
                is_correct,
                response_ms: normalize_response_ms(submission.response_ms),
                created_at: self.ctx.clock.now(),
            })
            .await?;

        let answer = match inserted {
            AnswerInsert::Inserted(answer) => answer,
            // Lost the race to a concurrent submission
            AnswerInsert::Existing(existing) => return Ok(Self::replayed(existing)),
        };

        metrics::counter!(
            "arena_answers_recorded_total",
            "correct" => if answer.is_correct { "true" } else { "false" }
        )
        .increment(1);
        tracing::info!(
            round_no = round.round_no,
            is_correct = answer.is_correct,
            response_ms = answer.response_ms,
            "Answer recorded"
        );

        self.ctx
            .notifier
            .notify(
                &session,
                Audience::Everyone,
                &ArenaEvent::Answer {
                    player_id: answer.player_id,
                    choice_index: answer.choice_index,
                },
            )
            .await;

        Ok(SubmitOutcome {
            answer,
            duplicate: false,
        })
    }

    fn replayed(answer: DuelAnswer) -> SubmitOutcome {
        metrics::counter!("arena_answers_duplicate_total").increment(1);
        tracing::debug!("Answer already recorded, returning original");
        SubmitOutcome {
            answer,
            duplicate: true,
        }
    }
}
