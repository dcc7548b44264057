//! `PostgreSQL` session store for the Duel Arena.
//!
//! [`PostgresSessionStore`] implements [`SessionStore`](duel_arena_core::SessionStore)
//! and [`CardRepository`](duel_arena_core::CardRepository) on top of sqlx. The
//! schema enforces the arena's concurrency rules itself:
//!
//! - `UNIQUE (session_id, round_no)` and a partial unique index on `LIVE` rounds
//!   make round creation atomic
//! - rounds are resolved with a conditional `UPDATE ... WHERE state = 'LIVE'`
//! - `UNIQUE (round_id, player_id)` keeps exactly one answer per player per round
//!
//! # Example
//!
//! ```ignore
//! use duel_arena_postgres::PostgresSessionStore;
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = PostgresSessionStore::connect("postgres://localhost/arena", 10).await?;
//!     store.migrate().await?;
//!     Ok(())
//! }
//! ```

mod rows;
mod store;

pub use store::PostgresSessionStore;
