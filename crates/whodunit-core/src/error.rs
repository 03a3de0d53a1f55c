//! Domain error types.

use thiserror::Error;
use uuid::Uuid;

/// Top-level domain error type.
///
/// Every variant has a stable machine-readable [`kind`](DomainError::kind)
/// that is safe to expose across the system boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DomainError {
    /// No session exists for the given identifier.
    #[error("session not found: {0}")]
    SessionNotFound(Uuid),

    /// The script catalog has no script with the given identifier.
    #[error("script not found: {0}")]
    ScriptNotFound(String),

    /// The character is not part of the session's script.
    #[error("unknown character: {0}")]
    UnknownCharacter(String),

    /// The player has not joined the session.
    #[error("unknown player: {0}")]
    UnknownPlayer(String),

    /// The character is already occupied by another player.
    #[error("character {character_id} is already assigned to player {player_id}")]
    AlreadyAssigned {
        /// The contested character.
        character_id: String,
        /// The player currently holding the character.
        player_id: String,
    },

    /// The player has already joined the session.
    #[error("player {0} has already joined this session")]
    AlreadyJoined(String),

    /// The requested action or phase change is not legal in the current phase.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    /// The character has no questions left in the current act.
    #[error("question quota exhausted for character {character_id} in act {act_number} (limit {limit})")]
    QuotaExceeded {
        /// The character that was questioned.
        character_id: String,
        /// The act the quota applies to.
        act_number: u32,
        /// The configured per-act limit.
        limit: u32,
    },

    /// The action input is malformed.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Another action holds the session lock.
    #[error("session {0} is busy, retry later")]
    SessionBusy(Uuid),

    /// Loading or saving session state failed.
    #[error("persistence error: {0}")]
    Persistence(String),
}

impl DomainError {
    /// Returns the stable error kind reported to callers.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::SessionNotFound(_) => "session_not_found",
            Self::ScriptNotFound(_) => "script_not_found",
            Self::UnknownCharacter(_) => "unknown_character",
            Self::UnknownPlayer(_) => "unknown_player",
            Self::AlreadyAssigned { .. } => "already_assigned",
            Self::AlreadyJoined(_) => "already_joined",
            Self::InvalidTransition(_) => "invalid_transition",
            Self::QuotaExceeded { .. } => "quota_exceeded",
            Self::InvalidInput(_) => "invalid_input",
            Self::SessionBusy(_) => "session_busy",
            Self::Persistence(_) => "persistence",
        }
    }

    /// Returns `true` for errors that leave the session untouched and are
    /// caused by the request itself.
    #[must_use]
    pub const fn is_validation(&self) -> bool {
        !matches!(self, Self::SessionBusy(_) | Self::Persistence(_))
    }
}
