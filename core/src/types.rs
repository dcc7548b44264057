//! Domain types for the Duel Arena.
//!
//! Identifiers, sessions, players and study cards. Rounds and answers have their
//! own modules ([`crate::round`], [`crate::answer`]) because they carry behavior.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use uuid::Uuid;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Unique identifier for a duel session
    SessionId
);
uuid_id!(
    /// Unique identifier for a round within a session
    RoundId
);
uuid_id!(
    /// Unique identifier for a player seat in a session (not the user account)
    PlayerId
);
uuid_id!(
    /// Unique identifier for a recorded answer
    AnswerId
);
uuid_id!(
    /// Identifier of a user account, owned by the authentication subsystem
    UserId
);
uuid_id!(
    /// Identifier of a study set, owned by the card repository
    SetId
);
uuid_id!(
    /// Identifier of a study card; card pools are ordered by this id
    CardId
);

// ============================================================================
// Join codes
// ============================================================================

/// Maximum length of a join code.
pub const MAX_JOIN_CODE_LEN: usize = 16;

/// Error returned when a join code is malformed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Invalid join code '{0}': expected 1-16 ASCII letters or digits")]
pub struct InvalidJoinCode(String);

/// Human-facing join code of a session.
///
/// Codes are immutable for the session's lifetime. Parsing trims whitespace and
/// upper-cases, so `" ab12 "` and `"AB12"` name the same session.
///
/// # Examples
///
/// ```
/// use duel_arena_core::JoinCode;
///
/// let code: JoinCode = " ab12 ".parse().unwrap();
/// assert_eq!(code.as_str(), "AB12");
/// assert!("".parse::<JoinCode>().is_err());
/// ```
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct JoinCode(String);

impl JoinCode {
    /// Get the code as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for JoinCode {
    type Err = InvalidJoinCode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let valid = !trimmed.is_empty()
            && trimmed.len() <= MAX_JOIN_CODE_LEN
            && trimmed.chars().all(|c| c.is_ascii_alphanumeric());
        if valid {
            Ok(Self(trimmed.to_ascii_uppercase()))
        } else {
            Err(InvalidJoinCode(s.to_string()))
        }
    }
}

impl TryFrom<String> for JoinCode {
    type Error = InvalidJoinCode;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<JoinCode> for String {
    fn from(code: JoinCode) -> Self {
        code.0
    }
}

impl fmt::Display for JoinCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ============================================================================
// Sessions and players
// ============================================================================

/// Lifecycle of a duel session. Transitions only move forward.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    /// Players are joining; no rounds may start
    Lobby,
    /// Rounds may be started and answered
    Running,
    /// Duel is over
    Ended,
}

impl SessionStatus {
    /// Whether moving from `self` to `next` keeps the lifecycle monotonic.
    ///
    /// Staying in the same status is allowed so repeated lobby calls stay idempotent.
    #[must_use]
    pub fn can_advance_to(self, next: Self) -> bool {
        next >= self
    }

    /// Database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Lobby => "LOBBY",
            Self::Running => "RUNNING",
            Self::Ended => "ENDED",
        }
    }

    /// Parse from the database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "LOBBY" => Some(Self::Lobby),
            "RUNNING" => Some(Self::Running),
            "ENDED" => Some(Self::Ended),
            _ => None,
        }
    }
}

/// Game mode of a session. Only the lives-based Arena round lifecycle exists.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DuelMode {
    /// Timed rounds broadcast identically to all players
    #[default]
    Arena,
}

impl DuelMode {
    /// Database representation.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Arena => "ARENA",
        }
    }

    /// Parse from the database representation.
    #[must_use]
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "ARENA" => Some(Self::Arena),
            _ => None,
        }
    }
}

/// A duel session, created and advanced to `Running` by the lobby subsystem.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuelSession {
    /// Internal id (also a live topic key)
    pub id: SessionId,
    /// Public join code (also a live topic key)
    pub code: JoinCode,
    /// Host user
    pub host_id: UserId,
    /// Game mode
    pub mode: DuelMode,
    /// Lifecycle status
    pub status: SessionStatus,
    /// Study set the questions are drawn from
    pub set_id: SetId,
    /// When the lobby created the session
    pub created_at: DateTime<Utc>,
}

/// A player seat in a session. Kept for history after rounds end.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DuelPlayer {
    /// Seat id
    pub id: PlayerId,
    /// Owning session
    pub session_id: SessionId,
    /// User account behind the seat
    pub user_id: UserId,
    /// Name shown to other players
    pub display_name: String,
}

// ============================================================================
// Study cards
// ============================================================================

/// One study card as provided by the card repository.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Card {
    /// Card id; pools are ordered by it
    pub id: CardId,
    /// Term, used as the question prompt
    pub term: String,
    /// Definition, used as answer choices
    pub definition: String,
}
