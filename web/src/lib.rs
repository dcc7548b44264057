//! Axum HTTP and WebSocket surface for the Duel Arena.
//!
//! Handlers are thin adapters: they parse the join code and body, call the
//! matching [`Arena`](duel_arena_runtime::Arena) operation and map
//! [`ArenaError`](duel_arena_core::ArenaError) to a status code through
//! [`AppError`].
//!
//! # Example
//!
//! ```ignore
//! use duel_arena_web::{AppState, build_router};
//!
//! let app = build_router(AppState::new(arena));
//! let listener = tokio::net::TcpListener::bind("0.0.0.0:8080").await?;
//! axum::serve(listener, app).await?;
//! ```

#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use routes::build_router;
pub use state::AppState;
