//! Matchmaker - ticket-queue matchmaking worker
//!
//! This crate groups waiting players into game sessions by evaluating the
//! numeric constraints on their tickets against per-parameter score indices,
//! relaxing session size for players who have waited past a timeout.

pub mod config;
pub mod error;
pub mod matching;
pub mod metrics;
pub mod service;
pub mod store;
pub mod sweeper;
pub mod ticket;
pub mod types;
pub mod utils;

// Re-export commonly used types and traits
pub use error::{MatchmakingError, Result};
pub use types::*;

// Re-export key components
pub use matching::MatchingEngine;
pub use store::{InMemoryTicketStore, TicketStore};
pub use sweeper::ExpirationSweeper;
pub use ticket::{CreateTicketRequest, Ticket, TicketService};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
