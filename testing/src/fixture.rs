//! Builder for a ready-to-play duel.

#![allow(clippy::missing_panics_doc)] // Fixture setup panics on broken test input

use crate::mocks::ManualClock;
use crate::{InMemoryCardRepository, InMemorySessionStore, RecordingEventBus};
use duel_arena_core::environment::Clock;
use duel_arena_core::{
    Card, CardId, DuelMode, DuelPlayer, DuelSession, JoinCode, PlayerId, SessionId, SessionStatus,
    SetId, UserId,
};
use std::sync::Arc;
use uuid::Uuid;

/// A session with players and a study set, backed by in-memory collaborators.
///
/// Card ids are `00000000-0000-0000-0000-000000000001`, `…02`, … in the order
/// the cards were given, so the id-ordered pool matches the builder input.
#[derive(Clone, Debug)]
pub struct ArenaFixture {
    /// Session store with the session and players inserted
    pub store: Arc<InMemorySessionStore>,
    /// Card repository holding the deck
    pub cards: Arc<InMemoryCardRepository>,
    /// Recording bus
    pub bus: Arc<RecordingEventBus>,
    /// Shared manual clock
    pub clock: ManualClock,
    /// The session
    pub session: DuelSession,
    /// Seated players, in the order given
    pub players: Vec<DuelPlayer>,
    /// Cards of the session's set, in id order
    pub deck: Vec<Card>,
}

impl ArenaFixture {
    /// Start building a fixture
    #[must_use]
    pub fn builder() -> ArenaFixtureBuilder {
        ArenaFixtureBuilder::default()
    }

    /// The session's join code
    #[must_use]
    pub fn code(&self) -> &JoinCode {
        &self.session.code
    }

    /// Look a deck card up by term
    #[must_use]
    pub fn card(&self, term: &str) -> Option<&Card> {
        self.deck.iter().find(|c| c.term == term)
    }
}

/// Builder for [`ArenaFixture`].
///
/// Defaults: code `DUEL42`, status `Running`, players `ann` and `bob`, and the
/// five cards `A`..`E` with definitions `A-def`..`E-def`.
#[derive(Clone, Debug)]
pub struct ArenaFixtureBuilder {
    code: String,
    status: SessionStatus,
    players: Vec<String>,
    cards: Vec<(String, String)>,
    bus: Option<RecordingEventBus>,
}

impl Default for ArenaFixtureBuilder {
    fn default() -> Self {
        Self {
            code: "DUEL42".to_string(),
            status: SessionStatus::Running,
            players: vec!["ann".to_string(), "bob".to_string()],
            cards: ["A", "B", "C", "D", "E"]
                .iter()
                .map(|t| ((*t).to_string(), format!("{t}-def")))
                .collect(),
            bus: None,
        }
    }
}

impl ArenaFixtureBuilder {
    /// Join code of the session
    #[must_use]
    pub fn code(mut self, code: &str) -> Self {
        self.code = code.to_string();
        self
    }

    /// Session status
    #[must_use]
    pub const fn status(mut self, status: SessionStatus) -> Self {
        self.status = status;
        self
    }

    /// Player display names
    #[must_use]
    pub fn players(mut self, names: &[&str]) -> Self {
        self.players = names.iter().map(|n| (*n).to_string()).collect();
        self
    }

    /// `(term, definition)` pairs of the study set
    #[must_use]
    pub fn cards(mut self, cards: &[(&str, &str)]) -> Self {
        self.cards = cards
            .iter()
            .map(|(term, definition)| ((*term).to_string(), (*definition).to_string()))
            .collect();
        self
    }

    /// Use a specific bus, e.g. [`RecordingEventBus::failing`]
    #[must_use]
    pub fn bus(mut self, bus: RecordingEventBus) -> Self {
        self.bus = Some(bus);
        self
    }

    /// Insert everything and return the fixture.
    ///
    /// # Panics
    ///
    /// Panics if the join code is invalid.
    #[allow(clippy::unwrap_used, clippy::expect_used)]
    pub async fn build(self) -> ArenaFixture {
        let store = Arc::new(InMemorySessionStore::new());
        let cards = Arc::new(InMemoryCardRepository::new());
        let clock = ManualClock::default();
        let set_id = SetId::new();

        let session = DuelSession {
            id: SessionId::new(),
            code: self.code.parse().expect("fixture join code must be valid"),
            host_id: UserId::new(),
            mode: DuelMode::Arena,
            status: self.status,
            set_id,
            created_at: clock.now(),
        };
        store.insert_session(session.clone()).await.unwrap();

        let mut players = Vec::with_capacity(self.players.len());
        for name in self.players {
            let player = DuelPlayer {
                id: PlayerId::new(),
                session_id: session.id,
                user_id: UserId::new(),
                display_name: name,
            };
            store.add_player(player.clone()).await.unwrap();
            players.push(player);
        }

        let deck: Vec<Card> = self
            .cards
            .into_iter()
            .enumerate()
            .map(|(i, (term, definition))| Card {
                id: CardId::from_uuid(Uuid::from_u128(i as u128 + 1)),
                term,
                definition,
            })
            .collect();
        cards.insert_cards(set_id, deck.clone()).await;

        ArenaFixture {
            store,
            cards,
            bus: Arc::new(self.bus.unwrap_or_default()),
            clock,
            session,
            players,
            deck,
        }
    }
}
