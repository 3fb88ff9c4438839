//! Ticket creation and lookup
//!
//! Requests are validated before anything touches the store. A player may hold
//! at most one pending ticket; once a ticket is found or expired the player is
//! free to file a new one, which replaces the old record.

use crate::error::{MatchmakingError, Result};
use crate::store::TicketStore;
use crate::ticket::Ticket;
use crate::types::{MatchParameter, PlayerId, PlayerParameter};
use crate::utils::current_timestamp;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// A player's request to join the queue
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateTicketRequest {
    pub player_id: PlayerId,
    pub match_parameters: Vec<MatchParameter>,
    pub player_parameters: Vec<PlayerParameter>,
}

impl CreateTicketRequest {
    pub fn new(
        player_id: impl Into<PlayerId>,
        match_parameters: Vec<MatchParameter>,
        player_parameters: Vec<PlayerParameter>,
    ) -> Self {
        Self {
            player_id: player_id.into(),
            match_parameters,
            player_parameters,
        }
    }

    /// Reject requests the matching engine could never serve
    pub fn validate(&self) -> Result<()> {
        if self.player_id.trim().is_empty() {
            return Err(invalid_ticket("player id must not be empty"));
        }

        if self.match_parameters.is_empty() {
            return Err(invalid_ticket("at least one match parameter is required"));
        }

        for param in &self.match_parameters {
            if param.parameter_type.is_empty() {
                return Err(invalid_ticket("match parameter type must not be empty"));
            }
            if !param.value.is_finite() {
                return Err(invalid_ticket(&format!(
                    "value for '{}' must be a finite number",
                    param.parameter_type
                )));
            }
            if !param.operator.is_range_queryable() {
                return Err(invalid_ticket(&format!(
                    "operator '{}' on '{}' is not supported",
                    param.operator, param.parameter_type
                )));
            }
        }

        if self.player_parameters.is_empty() {
            return Err(invalid_player("at least one player parameter is required"));
        }

        let mut seen = HashSet::new();
        for param in &self.player_parameters {
            if param.parameter_type.is_empty() {
                return Err(invalid_player("player parameter type must not be empty"));
            }
            if !param.value.is_finite() {
                return Err(invalid_player(&format!(
                    "value for '{}' must be a finite number",
                    param.parameter_type
                )));
            }
            if !seen.insert(param.parameter_type.as_str()) {
                return Err(invalid_player(&format!(
                    "'{}' declared more than once",
                    param.parameter_type
                )));
            }
        }

        Ok(())
    }
}

fn invalid_ticket(reason: &str) -> anyhow::Error {
    MatchmakingError::InvalidTicketParameters {
        reason: reason.to_string(),
    }
    .into()
}

fn invalid_player(reason: &str) -> anyhow::Error {
    MatchmakingError::InvalidPlayerParameters {
        reason: reason.to_string(),
    }
    .into()
}

/// Files and reads tickets on behalf of players
pub struct TicketService {
    store: Arc<dyn TicketStore>,
}

impl TicketService {
    pub fn new(store: Arc<dyn TicketStore>) -> Self {
        Self { store }
    }

    /// Validate and store a new pending ticket
    pub async fn create_ticket(&self, request: CreateTicketRequest) -> Result<Ticket> {
        self.create_ticket_at(request, current_timestamp()).await
    }

    /// Same as [`create_ticket`](Self::create_ticket) with an explicit creation time
    pub async fn create_ticket_at(
        &self,
        request: CreateTicketRequest,
        created_at: DateTime<Utc>,
    ) -> Result<Ticket> {
        request.validate()?;

        match self.store.get_ticket(&request.player_id).await {
            Ok(existing) if existing.is_pending() => {
                return Err(MatchmakingError::TicketAlreadyPending {
                    player_id: request.player_id,
                }
                .into());
            }
            Ok(existing) => {
                debug!(
                    "Replacing {} ticket {} for player {}",
                    existing.status, existing.id, existing.player_id
                );
            }
            Err(e) if matches!(
                e.downcast_ref::<MatchmakingError>(),
                Some(MatchmakingError::TicketNotFound { .. })
            ) => {}
            Err(e) => return Err(e),
        }

        let ticket = Ticket::new(
            request.player_id,
            request.match_parameters,
            request.player_parameters,
            created_at,
        );
        self.store.create_ticket(&ticket).await?;

        info!(
            "Created ticket {} for player {} with {} constraints",
            ticket.id,
            ticket.player_id,
            ticket.match_parameters.len()
        );

        Ok(ticket)
    }

    /// Read a player's ticket in whatever state it is in
    pub async fn get_ticket(&self, player_id: &str) -> Result<Ticket> {
        self.store.get_ticket(player_id).await
    }
}
