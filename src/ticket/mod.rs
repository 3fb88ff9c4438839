//! Matchmaking tickets
//!
//! This module contains the ticket record with its status state machine and
//! the lifecycle service that validates and files new tickets.

pub mod entity;
pub mod lifecycle;

pub use entity::Ticket;
pub use lifecycle::{CreateTicketRequest, TicketService};
