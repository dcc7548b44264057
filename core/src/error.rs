//! Error taxonomy surfaced to callers of arena operations.
//!
//! Redundant orchestration calls (`next` while live, `resolve` while nothing is
//! live) are successes and never produce one of these errors.

use crate::event_bus::EventBusError;
use crate::store::StoreError;
use thiserror::Error;

/// Errors returned by arena operations.
#[derive(Error, Debug)]
pub enum ArenaError {
    /// Unknown session, round or player.
    #[error("{resource} not found: {id}")]
    NotFound {
        /// Kind of record that was looked up
        resource: &'static str,
        /// Identifier that was looked up
        id: String,
    },

    /// Operation is not allowed in the current state (e.g. answering a resolved round).
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Input rejected before any read or write.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Storage failure.
    #[error("Storage error: {0}")]
    Storage(String),

    /// Live channel subscription failure.
    #[error(transparent)]
    Bus(#[from] EventBusError),
}

impl ArenaError {
    /// Shorthand for [`ArenaError::NotFound`].
    #[must_use]
    pub fn not_found(resource: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            resource,
            id: id.to_string(),
        }
    }
}

impl From<StoreError> for ArenaError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound { resource, id } => Self::NotFound { resource, id },
            StoreError::Conflict(message) => Self::InvalidState(message),
            StoreError::Database(message) => Self::Storage(message),
        }
    }
}
