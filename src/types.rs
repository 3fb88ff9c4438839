//! Common types used throughout the matchmaking service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for players
pub type PlayerId = String;

/// Unique identifier for tickets
pub type TicketId = String;

/// Unique identifier for game sessions
pub type SessionId = Uuid;

/// Name of a numeric matching axis (e.g. "league", "table")
pub type ParameterType = String;

/// Status of a matchmaking ticket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Pending,
    Found,
    Expired,
}

impl std::fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TicketStatus::Pending => write!(f, "pending"),
            TicketStatus::Found => write!(f, "found"),
            TicketStatus::Expired => write!(f, "expired"),
        }
    }
}

/// Comparison applied between a constraint value and an opponent's score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterOperator {
    #[serde(rename = "=")]
    Equal,
    #[serde(rename = "<>", alias = "!=")]
    NotEqual,
    #[serde(rename = "<")]
    SmallerThan,
    #[serde(rename = ">")]
    GreaterThan,
}

impl ParameterOperator {
    /// Whether an ordered score index can answer this operator
    pub fn is_range_queryable(&self) -> bool {
        !matches!(self, ParameterOperator::NotEqual)
    }

    /// Evaluate the operator for a single score
    pub fn evaluate(&self, score: f64, value: f64) -> bool {
        match self {
            ParameterOperator::Equal => score == value,
            ParameterOperator::NotEqual => score != value,
            ParameterOperator::SmallerThan => score < value,
            ParameterOperator::GreaterThan => score > value,
        }
    }
}

impl std::fmt::Display for ParameterOperator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ParameterOperator::Equal => write!(f, "="),
            ParameterOperator::NotEqual => write!(f, "<>"),
            ParameterOperator::SmallerThan => write!(f, "<"),
            ParameterOperator::GreaterThan => write!(f, ">"),
        }
    }
}

/// A constraint a ticket places on its opponents
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchParameter {
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
    pub operator: ParameterOperator,
    pub value: f64,
}

impl MatchParameter {
    pub fn new(parameter_type: impl Into<String>, operator: ParameterOperator, value: f64) -> Self {
        Self {
            parameter_type: parameter_type.into(),
            operator,
            value,
        }
    }
}

/// A score the player advertises on one axis
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlayerParameter {
    #[serde(rename = "type")]
    pub parameter_type: ParameterType,
    pub value: f64,
}

impl PlayerParameter {
    pub fn new(parameter_type: impl Into<String>, value: f64) -> Self {
        Self {
            parameter_type: parameter_type.into(),
            value,
        }
    }
}

/// Outcome of a successful match: a fixed group of players
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: SessionId,
    pub player_ids: Vec<PlayerId>,
    pub created_at: DateTime<Utc>,
}

impl Session {
    pub fn contains(&self, player_id: &str) -> bool {
        self.player_ids.iter().any(|p| p == player_id)
    }

    pub fn size(&self) -> usize {
        self.player_ids.len()
    }
}
