//! Collaborators shared by the arena services.

use crate::config::ArenaConfig;
use crate::notifier::Notifier;
use duel_arena_core::environment::Clock;
use duel_arena_core::{
    ArenaError, Card, CardRepository, DuelRound, DuelSession, EventBus, JoinCode, QuestionBuilder,
    QuestionPayload, SessionId, SessionStore,
};
use std::sync::Arc;

/// Store, cards, clock and bus, cloned into every service.
#[derive(Clone)]
pub struct ArenaContext {
    pub(crate) store: Arc<dyn SessionStore>,
    pub(crate) cards: Arc<dyn CardRepository>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) notifier: Notifier,
    pub(crate) questions: QuestionBuilder,
    pub(crate) config: ArenaConfig,
}

impl ArenaContext {
    /// Bundle the collaborators.
    #[must_use]
    pub fn new(
        store: Arc<dyn SessionStore>,
        cards: Arc<dyn CardRepository>,
        bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
        config: ArenaConfig,
    ) -> Self {
        Self {
            store,
            cards,
            clock,
            notifier: Notifier::new(bus),
            questions: QuestionBuilder::new(),
            config,
        }
    }

    /// The session store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// The event bus.
    #[must_use]
    pub fn bus(&self) -> &Arc<dyn EventBus> {
        self.notifier.bus()
    }

    /// Active configuration.
    #[must_use]
    pub const fn config(&self) -> &ArenaConfig {
        &self.config
    }

    pub(crate) async fn session_by_code(&self, code: &JoinCode) -> Result<DuelSession, ArenaError> {
        self.store
            .find_session_by_code(code)
            .await?
            .ok_or_else(|| ArenaError::not_found("session", code))
    }

    pub(crate) async fn session_by_id(&self, id: SessionId) -> Result<DuelSession, ArenaError> {
        self.store
            .find_session(id)
            .await?
            .ok_or_else(|| ArenaError::not_found("session", id))
    }

    pub(crate) async fn pool(&self, session: &DuelSession) -> Result<Vec<Card>, ArenaError> {
        Ok(self.cards.cards_for_set(session.set_id).await?)
    }

    /// Rebuild the question of `round` from the session's current card pool.
    pub(crate) async fn question(
        &self,
        session: &DuelSession,
        round: &DuelRound,
    ) -> Result<QuestionPayload, ArenaError> {
        let pool = self.pool(session).await?;
        Ok(self.questions.build_for(round, &pool))
    }
}

impl std::fmt::Debug for ArenaContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArenaContext")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}
