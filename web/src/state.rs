//! Application state for Axum handlers.

use duel_arena_runtime::Arena;

/// Application state shared across all HTTP handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The arena every handler drives
    pub arena: Arena,
}

impl AppState {
    /// Create a new application state.
    #[must_use]
    pub const fn new(arena: Arena) -> Self {
        Self { arena }
    }
}
