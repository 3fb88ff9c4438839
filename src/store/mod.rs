//! Ticket storage interface and implementations
//!
//! The store persists ticket records keyed by player and keeps one ordered
//! score index per parameter type. Every operation is atomic on its own; the
//! store offers no multi-key transactions, so callers compose single-key
//! operations and keep each of them idempotent.

pub mod index;
pub mod memory;

pub use index::{IndexRegistry, ParameterIndex, Score};
pub use memory::InMemoryTicketStore;

use crate::error::Result;
use crate::ticket::Ticket;
use crate::types::{ParameterOperator, PlayerId};
use async_trait::async_trait;

/// Opaque scan position. `0` starts a scan, and a returned `0` ends it.
pub type ScanCursor = u64;

/// One page of a ticket scan
#[derive(Debug, Clone, Default)]
pub struct TicketPage {
    pub tickets: Vec<Ticket>,
    pub next_cursor: ScanCursor,
}

impl TicketPage {
    /// Whether this page was the last one of the scan
    pub fn is_last(&self) -> bool {
        self.next_cursor == 0
    }
}

/// Trait for ticket storage operations
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TicketStore: Send + Sync {
    /// Insert a ticket and index every value the player declared
    async fn create_ticket(&self, ticket: &Ticket) -> Result<()>;

    /// Get a player's ticket regardless of status
    async fn get_ticket(&self, player_id: &str) -> Result<Ticket>;

    /// Read up to `batch_size` tickets starting at `cursor`
    async fn scan_tickets(&self, cursor: ScanCursor, batch_size: usize) -> Result<TicketPage>;

    /// Players whose score on `parameter_type` satisfies `operator` against `value`
    async fn range_query(
        &self,
        parameter_type: &str,
        operator: ParameterOperator,
        value: f64,
        limit: usize,
    ) -> Result<Vec<PlayerId>>;

    /// Drop a player's entry from one parameter index (no-op when absent)
    async fn remove_from_index(&self, parameter_type: &str, player_id: &str) -> Result<()>;

    /// Delete a player's ticket record (no-op when absent)
    async fn delete_ticket(&self, player_id: &str) -> Result<()>;

    /// Overwrite an existing ticket record
    async fn update_ticket(&self, ticket: &Ticket) -> Result<()>;
}
