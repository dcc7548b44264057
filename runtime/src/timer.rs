//! Automatic round resolution.

use crate::scheduler::{ResolveOutcome, RoundScheduler};
use duel_arena_core::{DuelRound, DuelSession};
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::Instrument;

/// Resolves a round once its advisory timer has elapsed.
///
/// The timer only ever resolves the round it was armed for, so a round that was
/// resolved manually (and possibly followed by a new one) is left alone.
/// Resolution is idempotent, so a timer racing a manual resolve is harmless.
#[derive(Clone, Debug)]
pub struct RoundTimer {
    scheduler: RoundScheduler,
}

impl RoundTimer {
    /// Create a timer that resolves through `scheduler`.
    #[must_use]
    pub const fn new(scheduler: RoundScheduler) -> Self {
        Self { scheduler }
    }

    /// Spawn a task that resolves `round` after `round.timer_sec` seconds.
    pub fn arm(&self, session: DuelSession, round: &DuelRound) -> JoinHandle<()> {
        let scheduler = self.scheduler.clone();
        let round_id = round.id;
        let delay = Duration::from_secs(u64::from(round.timer_sec));
        let span = tracing::info_span!(
            "round_timer",
            session_id = %session.id,
            round_no = round.round_no
        );

        tokio::spawn(
            async move {
                tokio::time::sleep(delay).await;
                match scheduler.resolve_if_current(&session, round_id).await {
                    Ok(ResolveOutcome::Resolved { .. }) => {
                        tracing::info!("Round timer elapsed, round resolved");
                    }
                    Ok(ResolveOutcome::NothingLive) => {
                        tracing::debug!("Round timer elapsed, round already resolved");
                    }
                    Err(error) => {
                        tracing::warn!(error = %error, "Round timer failed to resolve round");
                    }
                }
            }
            .instrument(span),
        )
    }
}
