//! Round lifecycle: `start`, `next` and `resolve`.
//!
//! Every operation reads the latest round from the store, branches on its state
//! and then performs a single atomic store write. The store refuses a second
//! `LIVE` round per session and resolves rounds with a conditional update, so
//! overlapping calls converge on the same state:
//!
//! | call      | latest round LIVE           | otherwise                    |
//! |-----------|-----------------------------|------------------------------|
//! | `start`   | `InvalidState`              | open round `n + 1`           |
//! | `next`    | `AlreadyLive` (no change)   | open round `n + 1`           |
//! | `resolve` | resolve, broadcast once     | `NothingLive` (no broadcast) |

use crate::context::ArenaContext;
use crate::notifier::Audience;
use duel_arena_core::{
    ArenaError, ArenaEvent, Card, DuelRound, DuelSession, NewRound, PublicQuestion, RoundAnnouncement,
    RoundId, SessionStatus, StoreError,
};
use serde::Serialize;
use std::collections::HashMap;

/// A round that was opened by this call.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartOutcome {
    /// The new live round
    pub round: DuelRound,
    /// Question as broadcast to players
    pub question: PublicQuestion,
}

/// Result of [`RoundScheduler::next`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum NextOutcome {
    /// A new round was opened.
    Started(StartOutcome),
    /// The latest round was already live; nothing changed.
    AlreadyLive {
        /// The round that is live
        round: DuelRound,
    },
}

impl NextOutcome {
    /// The live round after the call.
    #[must_use]
    pub const fn round(&self) -> &DuelRound {
        match self {
            Self::Started(started) => &started.round,
            Self::AlreadyLive { round } => round,
        }
    }
}

/// Result of [`RoundScheduler::resolve`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "kebab-case")]
pub enum ResolveOutcome {
    /// This call resolved the round and broadcast the answer key.
    #[serde(rename_all = "camelCase")]
    Resolved {
        /// The resolved round
        round: DuelRound,
        /// Revealed answer key; `None` for a degraded question
        correct_index: Option<u8>,
    },
    /// No round was live; nothing changed and nothing was broadcast.
    NothingLive,
}

impl ResolveOutcome {
    /// Whether this call changed state.
    #[must_use]
    pub const fn is_resolved(&self) -> bool {
        matches!(self, Self::Resolved { .. })
    }
}

/// Drives the round state machine of a session.
#[derive(Clone, Debug)]
pub struct RoundScheduler {
    ctx: ArenaContext,
}

impl RoundScheduler {
    /// Create a scheduler over the shared context.
    #[must_use]
    pub const fn new(ctx: ArenaContext) -> Self {
        Self { ctx }
    }

    /// Open the next round of a running session.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::InvalidState`] if the session is not `RUNNING`, a round is
    ///   already live or the study set has no cards
    /// - [`ArenaError::Storage`] on store failures
    #[tracing::instrument(skip(self, session), fields(session_id = %session.id), name = "round_start")]
    pub async fn start(&self, session: &DuelSession) -> Result<StartOutcome, ArenaError> {
        if let Some(latest) = self.ctx.store.latest_round(session.id).await? {
            if latest.state.is_live() {
                return Err(ArenaError::InvalidState(format!(
                    "round {} is already live",
                    latest.round_no
                )));
            }
        }
        self.open_round(session)
            .await?
            .ok_or_else(|| ArenaError::InvalidState("a round is already live".to_string()))
    }

    /// Idempotent `start`: if the latest round is live, return it unchanged.
    ///
    /// # Errors
    ///
    /// Same as [`RoundScheduler::start`], except that a live round is a success.
    #[tracing::instrument(skip(self, session), fields(session_id = %session.id), name = "round_next")]
    pub async fn next(&self, session: &DuelSession) -> Result<NextOutcome, ArenaError> {
        if let Some(latest) = self.ctx.store.latest_round(session.id).await? {
            if latest.state.is_live() {
                tracing::debug!(round_no = latest.round_no, "Round already live, next is a no-op");
                return Ok(NextOutcome::AlreadyLive { round: latest });
            }
        }

        if let Some(started) = self.open_round(session).await? {
            return Ok(NextOutcome::Started(started));
        }

        // Lost a race against a concurrent open; report the winner.
        match self.ctx.store.latest_round(session.id).await? {
            Some(round) if round.state.is_live() => Ok(NextOutcome::AlreadyLive { round }),
            _ => Err(ArenaError::InvalidState(
                "round creation conflicted and no round is live".to_string(),
            )),
        }
    }

    /// Resolve the latest round if it is live.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::Storage`] on store failures. A session without a
    /// live round is a success ([`ResolveOutcome::NothingLive`]).
    #[tracing::instrument(skip(self, session), fields(session_id = %session.id), name = "round_resolve")]
    pub async fn resolve(&self, session: &DuelSession) -> Result<ResolveOutcome, ArenaError> {
        match self.ctx.store.latest_round(session.id).await? {
            Some(round) if round.state.is_live() => self.resolve_round(session, &round).await,
            _ => {
                tracing::debug!("No live round, resolve is a no-op");
                Ok(ResolveOutcome::NothingLive)
            }
        }
    }

    /// Resolve one specific round if it is still live.
    ///
    /// Used by round timers, which must never resolve a round other than the
    /// one they were armed for.
    ///
    /// # Errors
    ///
    /// Returns [`ArenaError::NotFound`] if the round does not belong to the
    /// session and [`ArenaError::Storage`] on store failures.
    #[tracing::instrument(skip(self, session), fields(session_id = %session.id), name = "round_resolve_if_current")]
    pub async fn resolve_if_current(
        &self,
        session: &DuelSession,
        round_id: RoundId,
    ) -> Result<ResolveOutcome, ArenaError> {
        match self.ctx.store.find_round(round_id).await? {
            Some(round) if round.session_id == session.id => self.resolve_round(session, &round).await,
            _ => Err(ArenaError::not_found("round", round_id)),
        }
    }

    /// Every fallible read happens before the conditional update, so once the
    /// round is `RESOLVED` the only remaining step is the best-effort broadcast.
    async fn resolve_round(
        &self,
        session: &DuelSession,
        live: &DuelRound,
    ) -> Result<ResolveOutcome, ArenaError> {
        let correct_index = self.ctx.question(session, live).await?.correct_index;

        let ended_at = self.ctx.clock.now();
        let Some(round) = self.ctx.store.resolve_round(live.id, ended_at).await? else {
            // Someone else resolved it first
            return Ok(ResolveOutcome::NothingLive);
        };

        metrics::counter!("arena_rounds_resolved_total").increment(1);
        if let Some(ended) = round.ended_at {
            #[allow(clippy::cast_precision_loss)]
            let seconds = (ended - round.started_at).num_milliseconds() as f64 / 1000.0;
            metrics::histogram!("arena_round_duration_seconds").record(seconds);
        }
        tracing::info!(round_no = round.round_no, ?correct_index, "Round resolved");

        self.ctx
            .notifier
            .notify(
                session,
                Audience::Everyone,
                &ArenaEvent::RoundResolve {
                    round_id: round.id,
                    correct_index,
                    ended_at: round.ended_at.unwrap_or(ended_at),
                },
            )
            .await;

        Ok(ResolveOutcome::Resolved {
            round,
            correct_index,
        })
    }

    /// Create and announce a round. `Ok(None)` means the store refused it
    /// because another round is live.
    async fn open_round(&self, session: &DuelSession) -> Result<Option<StartOutcome>, ArenaError> {
        if session.status != SessionStatus::Running {
            return Err(ArenaError::InvalidState(format!(
                "session {} is {}, not RUNNING",
                session.code,
                session.status.as_str()
            )));
        }

        let pool = self.ctx.pool(session).await?;
        let history = self.ctx.store.list_rounds(session.id).await?;
        let card = choose_card(&pool, &history)
            .ok_or_else(|| ArenaError::InvalidState("study set has no cards".to_string()))?;

        let new_round = NewRound {
            session_id: session.id,
            question_card_id: card.id,
            timer_sec: self.ctx.config.round_timer_secs,
            started_at: self.ctx.clock.now(),
        };
        let round = match self.ctx.store.create_round(new_round).await {
            Ok(round) => round,
            Err(StoreError::Conflict(reason)) => {
                tracing::debug!(%reason, "Round creation conflicted");
                return Ok(None);
            }
            Err(e) => return Err(e.into()),
        };

        let question = self.ctx.questions.build_for(&round, &pool).public();
        metrics::counter!("arena_rounds_started_total").increment(1);
        tracing::info!(round_no = round.round_no, round_id = %round.id, "Round started");

        self.announce(session, &round, &question).await;
        Ok(Some(StartOutcome { round, question }))
    }

    async fn announce(&self, session: &DuelSession, round: &DuelRound, question: &PublicQuestion) {
        let notifier = &self.ctx.notifier;
        notifier
            .notify(
                session,
                Audience::Internal,
                &ArenaEvent::Start {
                    round_no: round.round_no,
                    round_id: round.id,
                    question_card_id: round.question_card_id,
                },
            )
            .await;
        notifier
            .notify(
                session,
                Audience::Everyone,
                &ArenaEvent::RoundStart {
                    round: RoundAnnouncement::from(round),
                    question: question.clone(),
                },
            )
            .await;
    }
}

/// Least-used card of the id-ordered pool; ties go to the earliest card.
fn choose_card<'a>(pool: &'a [Card], history: &[DuelRound]) -> Option<&'a Card> {
    let mut usage: HashMap<_, usize> = HashMap::new();
    for round in history {
        *usage.entry(round.question_card_id).or_default() += 1;
    }
    pool.iter()
        .min_by_key(|card| usage.get(&card.id).copied().unwrap_or(0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::Utc;
    use duel_arena_core::{CardId, RoundState, SessionId};

    fn card(id: CardId) -> Card {
        Card {
            id,
            term: id.to_string(),
            definition: format!("def {id}"),
        }
    }

    fn played(card_id: CardId, round_no: u32) -> DuelRound {
        DuelRound {
            id: RoundId::new(),
            session_id: SessionId::new(),
            round_no,
            state: RoundState::Resolved,
            question_card_id: card_id,
            timer_sec: 20,
            started_at: Utc::now(),
            ended_at: Some(Utc::now()),
        }
    }

    #[test]
    fn choose_card_walks_the_pool_then_wraps() {
        let mut ids: Vec<CardId> = (0..3).map(|_| CardId::new()).collect();
        ids.sort();
        let pool: Vec<Card> = ids.iter().copied().map(card).collect();

        let mut history = Vec::new();
        let mut picked = Vec::new();
        for round_no in 1..=4 {
            let next = choose_card(&pool, &history).unwrap().id;
            picked.push(next);
            history.push(played(next, round_no));
        }
        assert_eq!(picked, vec![ids[0], ids[1], ids[2], ids[0]]);
    }

    #[test]
    fn choose_card_on_empty_pool() {
        assert!(choose_card(&[], &[]).is_none());
    }

    proptest::proptest! {
        #[test]
        fn usage_never_differs_by_more_than_one(pool_size in 1usize..12, rounds in 0u32..40) {
            let pool: Vec<Card> = (0..pool_size).map(|_| card(CardId::new())).collect();
            let mut history = Vec::new();
            for round_no in 1..=rounds {
                let next = choose_card(&pool, &history).unwrap().id;
                history.push(played(next, round_no));
            }

            let mut usage: HashMap<CardId, u32> = pool.iter().map(|c| (c.id, 0)).collect();
            for round in &history {
                *usage.get_mut(&round.question_card_id).unwrap() += 1;
            }
            let min = usage.values().min().copied().unwrap();
            let max = usage.values().max().copied().unwrap();
            proptest::prop_assert!(max - min <= 1);
        }
    }
}
