//! # Duel Arena Testing
//!
//! Testing utilities for the Duel Arena.
//!
//! This crate provides:
//! - Deterministic clocks ([`FixedClock`], [`ManualClock`])
//! - [`InMemorySessionStore`] and [`InMemoryCardRepository`], in-memory
//!   implementations of the storage traits with the same atomicity guarantees
//!   as the Postgres store
//! - [`RecordingEventBus`], which captures every publish for assertions
//! - [`ArenaFixture`], a builder for a running session with players and cards
//!
//! ## Example
//!
//! ```
//! use duel_arena_testing::ArenaFixture;
//!
//! # tokio_test::block_on(async {
//! let fixture = ArenaFixture::builder()
//!     .cards(&[("A", "A-def"), ("B", "B-def")])
//!     .players(&["ann"])
//!     .build()
//!     .await;
//!
//! assert_eq!(fixture.deck.len(), 2);
//! assert_eq!(fixture.players[0].display_name, "ann");
//! # });
//! ```

use chrono::{DateTime, Utc};
use duel_arena_core::environment::Clock;

mod bus;
mod fixture;
mod store;

pub use bus::RecordingEventBus;
pub use fixture::{ArenaFixture, ArenaFixtureBuilder};
pub use store::{InMemoryCardRepository, InMemorySessionStore};

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};
    use std::sync::{Arc, Mutex, PoisonError};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use duel_arena_testing::mocks::FixedClock;
    /// use duel_arena_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    #[must_use]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(epoch())
    }

    /// Clock that only moves when told to.
    ///
    /// Clones share the same instant, so a test can hold one handle while the
    /// services under test read another.
    ///
    /// # Example
    ///
    /// ```
    /// use duel_arena_testing::mocks::ManualClock;
    /// use duel_arena_core::environment::Clock;
    /// use chrono::Duration;
    ///
    /// let clock = ManualClock::default();
    /// let start = clock.now();
    /// clock.advance(Duration::seconds(20));
    /// assert_eq!(clock.now() - start, Duration::seconds(20));
    /// ```
    #[derive(Debug, Clone)]
    pub struct ManualClock {
        time: Arc<Mutex<DateTime<Utc>>>,
    }

    impl ManualClock {
        /// Start the clock at `time`
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(Mutex::new(time)),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: chrono::Duration) {
            let mut time = self.time.lock().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Jump to an exact instant
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Default for ManualClock {
        fn default() -> Self {
            Self::new(epoch())
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.lock().unwrap_or_else(PoisonError::into_inner)
        }
    }

    fn epoch() -> DateTime<Utc> {
        DateTime::from_timestamp(1_735_689_600, 0).unwrap_or_default()
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, ManualClock, test_clock};
