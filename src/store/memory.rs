//! In-memory ticket store
//!
//! Records are kept JSON-encoded, the same shape a networked store would hold,
//! so decode failures surface exactly where they would in production. Scan
//! cursors are insertion slots: deleting a record never shifts the records
//! after it, and a re-created ticket takes a fresh slot at the end.

use super::index::IndexRegistry;
use super::{ScanCursor, TicketPage, TicketStore};
use crate::error::{MatchmakingError, Result};
use crate::ticket::Ticket;
use crate::types::{ParameterOperator, PlayerId};
use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Clone)]
struct StoredRecord {
    slot: u64,
    payload: String,
}

#[derive(Debug, Default)]
struct StoreState {
    records: HashMap<PlayerId, StoredRecord>,
    slots: BTreeMap<u64, PlayerId>,
    last_slot: u64,
    indices: IndexRegistry,
}

impl StoreState {
    fn allocate_slot(&mut self) -> u64 {
        self.last_slot += 1;
        self.last_slot
    }

    /// Replace a player's record, moving it to a new slot
    fn put_record(&mut self, player_id: &str, payload: String) {
        if let Some(previous) = self.records.remove(player_id) {
            self.slots.remove(&previous.slot);
        }

        let slot = self.allocate_slot();
        self.slots.insert(slot, player_id.to_string());
        self.records
            .insert(player_id.to_string(), StoredRecord { slot, payload });
    }
}

/// Ticket store backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryTicketStore {
    state: RwLock<StoreState>,
}

impl InMemoryTicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn read_state(&self) -> Result<RwLockReadGuard<'_, StoreState>> {
        self.state.read().map_err(|_| {
            MatchmakingError::StoreUnavailable {
                message: "Failed to acquire ticket store read lock".to_string(),
            }
            .into()
        })
    }

    fn write_state(&self) -> Result<RwLockWriteGuard<'_, StoreState>> {
        self.state.write().map_err(|_| {
            MatchmakingError::StoreUnavailable {
                message: "Failed to acquire ticket store write lock".to_string(),
            }
            .into()
        })
    }

    /// Store a raw payload for a player without indexing it (for restores and testing)
    pub fn insert_raw(&self, player_id: &str, payload: impl Into<String>) -> Result<()> {
        let mut state = self.write_state()?;
        state.put_record(player_id, payload.into());
        Ok(())
    }

    /// Number of ticket records held, regardless of status
    pub fn ticket_count(&self) -> Result<usize> {
        Ok(self.read_state()?.records.len())
    }

    /// Number of players visible on one parameter axis
    pub fn index_len(&self, parameter_type: &str) -> Result<usize> {
        let state = self.read_state()?;
        Ok(state
            .indices
            .get(parameter_type)
            .map(|index| index.len())
            .unwrap_or(0))
    }

    /// Whether a player is visible on one parameter axis
    pub fn is_indexed(&self, parameter_type: &str, player_id: &str) -> Result<bool> {
        let state = self.read_state()?;
        Ok(state
            .indices
            .get(parameter_type)
            .map(|index| index.contains(player_id))
            .unwrap_or(false))
    }

    /// Advertise a score on one axis directly (for restores and testing)
    pub fn index_player(&self, parameter_type: &str, player_id: &str, value: f64) -> Result<()> {
        let mut state = self.write_state()?;
        state.indices.index_mut(parameter_type).insert(player_id, value);
        Ok(())
    }
}

fn encode(ticket: &Ticket) -> Result<String> {
    serde_json::to_string(ticket).map_err(|e| {
        MatchmakingError::InternalError {
            message: format!("Failed to encode ticket {}: {}", ticket.id, e),
        }
        .into()
    })
}

fn decode(player_id: &str, payload: &str) -> Result<Ticket> {
    serde_json::from_str(payload).map_err(|e| {
        MatchmakingError::MalformedRecord {
            player_id: player_id.to_string(),
            reason: e.to_string(),
        }
        .into()
    })
}

#[async_trait]
impl TicketStore for InMemoryTicketStore {
    async fn create_ticket(&self, ticket: &Ticket) -> Result<()> {
        let payload = encode(ticket)?;
        let mut state = self.write_state()?;

        // Values from an earlier ticket of the same player must not linger
        state.indices.remove_everywhere(&ticket.player_id);
        state.put_record(&ticket.player_id, payload);

        for param in &ticket.player_parameters {
            state
                .indices
                .index_mut(&param.parameter_type)
                .insert(&ticket.player_id, param.value);
        }

        Ok(())
    }

    async fn get_ticket(&self, player_id: &str) -> Result<Ticket> {
        let state = self.read_state()?;
        let record =
            state
                .records
                .get(player_id)
                .ok_or_else(|| MatchmakingError::TicketNotFound {
                    player_id: player_id.to_string(),
                })?;

        decode(player_id, &record.payload)
    }

    async fn scan_tickets(&self, cursor: ScanCursor, batch_size: usize) -> Result<TicketPage> {
        if batch_size == 0 {
            return Err(MatchmakingError::ConfigurationError {
                message: "Scan batch size must be greater than 0".to_string(),
            }
            .into());
        }

        let state = self.read_state()?;
        let mut tickets = Vec::with_capacity(batch_size);
        let mut last_slot = None;

        for (slot, player_id) in state.slots.range(cursor..).take(batch_size) {
            let record =
                state
                    .records
                    .get(player_id)
                    .ok_or_else(|| MatchmakingError::InternalError {
                        message: format!("Slot {} points at a missing record", slot),
                    })?;
            tickets.push(decode(player_id, &record.payload)?);
            last_slot = Some(*slot);
        }

        let next_cursor = match last_slot {
            Some(slot) if state.slots.range(slot + 1..).next().is_some() => slot + 1,
            _ => 0,
        };

        Ok(TicketPage {
            tickets,
            next_cursor,
        })
    }

    async fn range_query(
        &self,
        parameter_type: &str,
        operator: ParameterOperator,
        value: f64,
        limit: usize,
    ) -> Result<Vec<PlayerId>> {
        let state = self.read_state()?;
        state
            .indices
            .range_query(parameter_type, operator, value, limit)
    }

    async fn remove_from_index(&self, parameter_type: &str, player_id: &str) -> Result<()> {
        let mut state = self.write_state()?;
        state.indices.remove(parameter_type, player_id);
        Ok(())
    }

    async fn delete_ticket(&self, player_id: &str) -> Result<()> {
        let mut state = self.write_state()?;
        if let Some(record) = state.records.remove(player_id) {
            state.slots.remove(&record.slot);
        }
        state.indices.remove_everywhere(player_id);
        Ok(())
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<()> {
        let payload = encode(ticket)?;
        let mut state = self.write_state()?;

        let record = state.records.get_mut(&ticket.player_id).ok_or_else(|| {
            MatchmakingError::TicketNotFound {
                player_id: ticket.player_id.clone(),
            }
        })?;
        record.payload = payload;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{MatchParameter, PlayerParameter, TicketStatus};
    use crate::utils::{current_timestamp, generate_session_id};

    fn create_test_ticket(player_id: &str, league: f64) -> Ticket {
        Ticket::new(
            player_id,
            vec![MatchParameter::new(
                "league",
                ParameterOperator::Equal,
                league,
            )],
            vec![PlayerParameter::new("league", league)],
            current_timestamp(),
        )
    }

    async fn scan_all(store: &InMemoryTicketStore, batch_size: usize) -> Vec<Ticket> {
        let mut cursor = 0;
        let mut tickets = Vec::new();
        loop {
            let page = store.scan_tickets(cursor, batch_size).await.unwrap();
            tickets.extend(page.tickets);
            if page.next_cursor == 0 {
                break;
            }
            cursor = page.next_cursor;
        }
        tickets
    }

    #[tokio::test]
    async fn test_create_and_get_ticket() {
        let store = InMemoryTicketStore::new();
        let ticket = create_test_ticket("player1", 5.0);

        store.create_ticket(&ticket).await.unwrap();

        let stored = store.get_ticket("player1").await.unwrap();
        assert_eq!(stored, ticket);
        assert!(store.is_indexed("league", "player1").unwrap());
    }

    #[tokio::test]
    async fn test_get_missing_ticket() {
        let store = InMemoryTicketStore::new();
        let err = store.get_ticket("nobody").await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::TicketNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_scan_pages_until_cursor_returns_to_zero() {
        let store = InMemoryTicketStore::new();
        for i in 0..7 {
            store
                .create_ticket(&create_test_ticket(&format!("player{}", i), i as f64))
                .await
                .unwrap();
        }

        let first = store.scan_tickets(0, 3).await.unwrap();
        assert_eq!(first.tickets.len(), 3);
        assert_ne!(first.next_cursor, 0);

        let all = scan_all(&store, 3).await;
        assert_eq!(all.len(), 7);
        assert_eq!(all[0].player_id, "player0");
        assert_eq!(all[6].player_id, "player6");
    }

    #[tokio::test]
    async fn test_scan_of_empty_store() {
        let store = InMemoryTicketStore::new();
        let page = store.scan_tickets(0, 10).await.unwrap();
        assert!(page.tickets.is_empty());
        assert!(page.is_last());
    }

    #[tokio::test]
    async fn test_deletion_during_scan_does_not_skip_records() {
        let store = InMemoryTicketStore::new();
        for i in 0..4 {
            store
                .create_ticket(&create_test_ticket(&format!("player{}", i), 1.0))
                .await
                .unwrap();
        }

        let first = store.scan_tickets(0, 2).await.unwrap();
        store.delete_ticket("player0").await.unwrap();
        store.delete_ticket("player1").await.unwrap();

        let second = store.scan_tickets(first.next_cursor, 2).await.unwrap();
        let ids: Vec<_> = second.tickets.iter().map(|t| t.player_id.as_str()).collect();
        assert_eq!(ids, vec!["player2", "player3"]);
        assert!(second.is_last());
    }

    #[tokio::test]
    async fn test_zero_batch_size_is_rejected() {
        let store = InMemoryTicketStore::new();
        assert!(store.scan_tickets(0, 0).await.is_err());
    }

    #[tokio::test]
    async fn test_malformed_record_surfaces() {
        let store = InMemoryTicketStore::new();
        store.insert_raw("broken", "{not json").unwrap();

        let err = store.scan_tickets(0, 10).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::MalformedRecord { player_id, .. }) if player_id == "broken"
        ));

        assert!(store.get_ticket("broken").await.is_err());
    }

    #[tokio::test]
    async fn test_range_query_through_store() {
        let store = InMemoryTicketStore::new();
        for (id, league) in [("a", 3.0), ("b", 5.0), ("c", 7.0)] {
            store
                .create_ticket(&create_test_ticket(id, league))
                .await
                .unwrap();
        }

        let above = store
            .range_query("league", ParameterOperator::GreaterThan, 3.0, 10)
            .await
            .unwrap();
        assert_eq!(above, vec!["b".to_string(), "c".to_string()]);

        let unknown = store
            .range_query("table", ParameterOperator::Equal, 3.0, 10)
            .await
            .unwrap();
        assert!(unknown.is_empty());

        assert!(store
            .range_query("league", ParameterOperator::NotEqual, 3.0, 10)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_update_keeps_scan_position_and_index() {
        let store = InMemoryTicketStore::new();
        let mut ticket = create_test_ticket("player1", 5.0);
        store.create_ticket(&ticket).await.unwrap();

        ticket.mark_found(generate_session_id()).unwrap();
        store.update_ticket(&ticket).await.unwrap();

        let stored = store.get_ticket("player1").await.unwrap();
        assert_eq!(stored.status, TicketStatus::Found);
        // Index maintenance is the caller's job
        assert!(store.is_indexed("league", "player1").unwrap());
    }

    #[tokio::test]
    async fn test_update_missing_ticket_fails() {
        let store = InMemoryTicketStore::new();
        let ticket = create_test_ticket("ghost", 1.0);
        let err = store.update_ticket(&ticket).await.unwrap_err();
        assert!(matches!(
            err.downcast_ref::<MatchmakingError>(),
            Some(MatchmakingError::TicketNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_removal_and_deletion_are_idempotent() {
        let store = InMemoryTicketStore::new();
        store
            .create_ticket(&create_test_ticket("player1", 5.0))
            .await
            .unwrap();

        store.remove_from_index("league", "player1").await.unwrap();
        store.remove_from_index("league", "player1").await.unwrap();
        store.remove_from_index("unknown", "player1").await.unwrap();
        assert!(!store.is_indexed("league", "player1").unwrap());

        store.delete_ticket("player1").await.unwrap();
        store.delete_ticket("player1").await.unwrap();
        assert_eq!(store.ticket_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_recreate_replaces_previous_index_entries() {
        let store = InMemoryTicketStore::new();
        store
            .create_ticket(&create_test_ticket("player1", 5.0))
            .await
            .unwrap();

        let replacement = Ticket::new(
            "player1",
            vec![MatchParameter::new("table", ParameterOperator::Equal, 2.0)],
            vec![PlayerParameter::new("table", 2.0)],
            current_timestamp(),
        );
        store.create_ticket(&replacement).await.unwrap();

        assert!(!store.is_indexed("league", "player1").unwrap());
        assert!(store.is_indexed("table", "player1").unwrap());
        assert_eq!(store.ticket_count().unwrap(), 1);
        assert_eq!(scan_all(&store, 10).await.len(), 1);
    }
}
