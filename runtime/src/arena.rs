//! Transport-neutral entry points keyed by join code.

use crate::config::ArenaConfig;
use crate::context::ArenaContext;
use crate::ledger::{AnswerLedger, AnswerSubmission, SubmitOutcome};
use crate::scheduler::{NextOutcome, ResolveOutcome, RoundScheduler, StartOutcome};
use crate::snapshot::{Snapshot, SnapshotService};
use crate::timer::RoundTimer;
use duel_arena_core::environment::Clock;
use duel_arena_core::{
    ArenaError, CardRepository, DuelRound, DuelSession, EventBus, EventStream, JoinCode, PlayerId,
    SessionStore, Topic, validate_choice,
};
use std::sync::Arc;

/// An answer as received from a player.
#[derive(Debug, Clone, PartialEq)]
pub struct AnswerRequest {
    /// Answering player
    pub player_id: PlayerId,
    /// Chosen position
    pub choice_index: i64,
    /// Client-measured response time
    pub response_ms: Option<f64>,
}

/// The duel arena: scheduler, ledger, snapshots and live subscriptions behind
/// one handle.
///
/// # Example
///
/// ```no_run
/// use duel_arena_runtime::{Arena, ArenaConfig, LocalEventBus};
/// use duel_arena_core::environment::SystemClock;
/// use duel_arena_core::{CardRepository, JoinCode, SessionStore};
/// use std::sync::Arc;
///
/// # async fn example(
/// #     store: Arc<dyn SessionStore>,
/// #     cards: Arc<dyn CardRepository>,
/// # ) -> Result<(), Box<dyn std::error::Error>> {
/// let arena = Arena::new(
///     store,
///     cards,
///     Arc::new(LocalEventBus::new()),
///     Arc::new(SystemClock),
///     ArenaConfig::default(),
/// );
///
/// let code: JoinCode = "ABC123".parse()?;
/// let started = arena.start(&code).await?;
/// println!("round {} is live", started.round.round_no);
/// # Ok(())
/// # }
/// ```
#[derive(Clone, Debug)]
pub struct Arena {
    ctx: ArenaContext,
    scheduler: RoundScheduler,
    ledger: AnswerLedger,
    snapshots: SnapshotService,
    timer: RoundTimer,
}

impl Arena {
    /// Assemble an arena from its collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        cards: Arc<dyn CardRepository>,
        bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        config: ArenaConfig,
    ) -> Self {
        Self::from_context(ArenaContext::new(store, cards, bus, clock, config))
    }

    /// Assemble an arena over an existing context.
    #[must_use]
    pub fn from_context(ctx: ArenaContext) -> Self {
        let scheduler = RoundScheduler::new(ctx.clone());
        Self {
            ledger: AnswerLedger::new(ctx.clone()),
            snapshots: SnapshotService::new(ctx.clone()),
            timer: RoundTimer::new(scheduler.clone()),
            scheduler,
            ctx,
        }
    }

    /// The round scheduler
    #[must_use]
    pub const fn scheduler(&self) -> &RoundScheduler {
        &self.scheduler
    }

    /// The answer ledger
    #[must_use]
    pub const fn ledger(&self) -> &AnswerLedger {
        &self.ledger
    }

    /// The snapshot service
    #[must_use]
    pub const fn snapshots(&self) -> &SnapshotService {
        &self.snapshots
    }

    /// Shared collaborators
    #[must_use]
    pub const fn context(&self) -> &ArenaContext {
        &self.ctx
    }

    /// Start a round.
    ///
    /// # Errors
    ///
    /// [`ArenaError::NotFound`] for an unknown code, otherwise as [`RoundScheduler::start`].
    pub async fn start(&self, code: &JoinCode) -> Result<StartOutcome, ArenaError> {
        let session = self.ctx.session_by_code(code).await?;
        let outcome = self.scheduler.start(&session).await?;
        self.arm_timer(session, &outcome.round);
        Ok(outcome)
    }

    /// Advance to the next round unless one is live.
    ///
    /// # Errors
    ///
    /// [`ArenaError::NotFound`] for an unknown code, otherwise as [`RoundScheduler::next`].
    pub async fn next(&self, code: &JoinCode) -> Result<NextOutcome, ArenaError> {
        let session = self.ctx.session_by_code(code).await?;
        let outcome = self.scheduler.next(&session).await?;
        if let NextOutcome::Started(started) = &outcome {
            self.arm_timer(session, &started.round);
        }
        Ok(outcome)
    }

    /// Resolve the live round, if any.
    ///
    /// # Errors
    ///
    /// [`ArenaError::NotFound`] for an unknown code, otherwise as [`RoundScheduler::resolve`].
    pub async fn resolve(&self, code: &JoinCode) -> Result<ResolveOutcome, ArenaError> {
        let session = self.ctx.session_by_code(code).await?;
        self.scheduler.resolve(&session).await
    }

    /// Answer the session's latest round.
    ///
    /// # Errors
    ///
    /// - [`ArenaError::Validation`] for an out-of-range choice, before any read
    /// - [`ArenaError::NotFound`] for an unknown code or player
    /// - [`ArenaError::InvalidState`] if no round was ever started or the latest is not live
    pub async fn answer(&self, code: &JoinCode, request: AnswerRequest) -> Result<SubmitOutcome, ArenaError> {
        validate_choice(request.choice_index)?;
        let session = self.ctx.session_by_code(code).await?;
        let round = self
            .ctx
            .store
            .latest_round(session.id)
            .await?
            .ok_or_else(|| ArenaError::InvalidState("no round has been started".to_string()))?;

        self.ledger
            .submit(AnswerSubmission {
                round_id: round.id,
                player_id: request.player_id,
                choice_index: request.choice_index,
                response_ms: request.response_ms,
            })
            .await
    }

    /// Current state of the session.
    ///
    /// # Errors
    ///
    /// As [`SnapshotService::snapshot`].
    pub async fn snapshot(&self, code: &JoinCode) -> Result<Snapshot, ArenaError> {
        self.snapshots.snapshot(code).await
    }

    /// Live events of the session, via its join-code topic.
    ///
    /// # Errors
    ///
    /// [`ArenaError::NotFound`] for an unknown code, [`ArenaError::Bus`] if the
    /// subscription fails.
    pub async fn subscribe(&self, code: &JoinCode) -> Result<EventStream, ArenaError> {
        let session = self.ctx.session_by_code(code).await?;
        let topic = Topic::code(&session.code);
        Ok(self.ctx.bus().subscribe(&[topic.as_str()]).await?)
    }

    fn arm_timer(&self, session: DuelSession, round: &DuelRound) {
        if self.ctx.config.auto_resolve {
            // Detached: the task ends on its own after one resolve attempt
            drop(self.timer.arm(session, round));
        }
    }
}
