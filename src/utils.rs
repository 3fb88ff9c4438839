//! Utility functions for the matchmaking service

use crate::error::{MatchmakingError, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Generate a new unique ticket ID
pub fn generate_ticket_id() -> String {
    Uuid::new_v4().to_string()
}

/// Generate a new unique game session ID
pub fn generate_session_id() -> Uuid {
    Uuid::new_v4()
}

/// Get the current UTC timestamp
pub fn current_timestamp() -> DateTime<Utc> {
    Utc::now()
}

/// Convert a std duration into a chrono duration for timestamp arithmetic
pub fn to_chrono(duration: std::time::Duration) -> Result<chrono::Duration> {
    chrono::Duration::from_std(duration).map_err(|e| {
        anyhow::Error::from(MatchmakingError::ConfigurationError {
            message: format!("Duration {:?} out of range: {}", duration, e),
        })
    })
}
