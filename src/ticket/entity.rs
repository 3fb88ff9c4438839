//! Ticket record and its status state machine
//!
//! A ticket starts out `Pending` and moves exactly once, either to `Found`
//! (carrying the game session it was placed in) or to `Expired`.

use crate::error::{MatchmakingError, Result};
use crate::types::{
    MatchParameter, PlayerId, PlayerParameter, SessionId, TicketId, TicketStatus,
};
use crate::utils::{generate_ticket_id, to_chrono};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// A player's standing request to be matched
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Ticket {
    pub id: TicketId,
    pub player_id: PlayerId,
    pub created_at: DateTime<Utc>,
    pub status: TicketStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub game_session_id: Option<SessionId>,
    pub match_parameters: Vec<MatchParameter>,
    #[serde(default)]
    pub player_parameters: Vec<PlayerParameter>,
}

impl Ticket {
    /// Create a new pending ticket
    pub fn new(
        player_id: impl Into<PlayerId>,
        match_parameters: Vec<MatchParameter>,
        player_parameters: Vec<PlayerParameter>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: generate_ticket_id(),
            player_id: player_id.into(),
            created_at,
            status: TicketStatus::Pending,
            game_session_id: None,
            match_parameters,
            player_parameters,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.status == TicketStatus::Pending
    }

    /// Whether the ticket has waited longer than `timeout` at `now`
    pub fn has_expired(&self, now: DateTime<Utc>, timeout: Duration) -> Result<bool> {
        Ok(now > self.created_at + to_chrono(timeout)?)
    }

    /// Whether the ticket was created strictly before `now - age`
    pub fn is_older_than(&self, now: DateTime<Utc>, age: Duration) -> Result<bool> {
        Ok(self.created_at < now - to_chrono(age)?)
    }

    /// Score the player declared for a parameter type, if any
    pub fn declared_value(&self, parameter_type: &str) -> Option<f64> {
        self.player_parameters
            .iter()
            .find(|p| p.parameter_type == parameter_type)
            .map(|p| p.value)
    }

    /// Parameter types the player is visible on
    pub fn declared_types(&self) -> impl Iterator<Item = &str> {
        self.player_parameters
            .iter()
            .map(|p| p.parameter_type.as_str())
    }

    /// Whether every constraint can be answered by a range query
    pub fn has_only_queryable_constraints(&self) -> bool {
        self.match_parameters
            .iter()
            .all(|p| p.operator.is_range_queryable())
    }

    /// Move the ticket into a game session
    pub fn mark_found(&mut self, session_id: SessionId) -> Result<()> {
        self.transition(TicketStatus::Found)?;
        self.game_session_id = Some(session_id);
        Ok(())
    }

    /// Give up on the ticket after its timeout
    pub fn mark_expired(&mut self) -> Result<()> {
        self.transition(TicketStatus::Expired)
    }

    fn transition(&mut self, to: TicketStatus) -> Result<()> {
        if self.status != TicketStatus::Pending {
            return Err(MatchmakingError::InvalidStatusTransition {
                player_id: self.player_id.clone(),
                from: self.status.to_string(),
                to: to.to_string(),
            }
            .into());
        }

        self.status = to;
        Ok(())
    }
}
