//! HTTP and WebSocket handlers.

pub mod duel;
pub mod health;
pub mod live;

pub use health::health_check;
