//! Error types for the matchmaking service
//!
//! This module defines all error types using anyhow for consistent error handling
//! throughout the application. Callers that need to branch on a specific failure
//! downcast to [`MatchmakingError`].

/// Result type alias for convenience
pub type Result<T> = anyhow::Result<T>;

/// Custom error types for specific matchmaking scenarios
#[derive(Debug, thiserror::Error)]
pub enum MatchmakingError {
    #[error("Ticket store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Malformed ticket record for player {player_id}: {reason}")]
    MalformedRecord { player_id: String, reason: String },

    #[error("No ticket found for player: {player_id}")]
    TicketNotFound { player_id: String },

    #[error("Invalid ticket parameters: {reason}")]
    InvalidTicketParameters { reason: String },

    #[error("Invalid player parameters: {reason}")]
    InvalidPlayerParameters { reason: String },

    #[error("Player {player_id} already has a pending ticket")]
    TicketAlreadyPending { player_id: String },

    #[error("Operator '{operator}' cannot be evaluated by a range query")]
    UnsupportedOperator { operator: String },

    #[error("Ticket for player {player_id} cannot move from {from} to {to}")]
    InvalidStatusTransition {
        player_id: String,
        from: String,
        to: String,
    },

    #[error("Configuration error: {message}")]
    ConfigurationError { message: String },

    #[error("Internal service error: {message}")]
    InternalError { message: String },
}

impl MatchmakingError {
    /// Whether the failure is transient and the whole pass can be retried later
    pub fn is_transient(&self) -> bool {
        matches!(self, MatchmakingError::StoreUnavailable { .. })
    }
}

/// Look up the matchmaking error kind behind an `anyhow::Error`, if any
pub fn kind_of(error: &anyhow::Error) -> Option<&MatchmakingError> {
    error.downcast_ref::<MatchmakingError>()
}
