//! Test fixtures and store wrappers for integration testing

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, TimeZone, Utc};
use matchmaker::error::{MatchmakingError, Result};
use matchmaker::store::{InMemoryTicketStore, ScanCursor, TicketPage, TicketStore};
use matchmaker::ticket::{CreateTicketRequest, Ticket, TicketService};
use matchmaker::types::{MatchParameter, ParameterOperator, PlayerId, PlayerParameter};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Fixed reference time so every scenario runs on a simulated clock
pub fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
}

pub fn seconds_after_base(seconds: i64) -> DateTime<Utc> {
    base_time() + ChronoDuration::seconds(seconds)
}

/// Request whose constraints demand exactly the values the player declares
pub fn equal_request(player_id: &str, league: f64, table: f64) -> CreateTicketRequest {
    CreateTicketRequest::new(
        player_id,
        vec![
            MatchParameter::new("league", ParameterOperator::Equal, league),
            MatchParameter::new("table", ParameterOperator::Equal, table),
        ],
        vec![
            PlayerParameter::new("league", league),
            PlayerParameter::new("table", table),
        ],
    )
}

/// Request with a single `league` constraint and declared value
pub fn league_request(player_id: &str, league: f64) -> CreateTicketRequest {
    CreateTicketRequest::new(
        player_id,
        vec![MatchParameter::new("league", ParameterOperator::Equal, league)],
        vec![PlayerParameter::new("league", league)],
    )
}

/// Request with custom constraints over the declared `league` and `table` values
pub fn constrained_request(
    player_id: &str,
    constraints: Vec<MatchParameter>,
    league: f64,
    table: f64,
) -> CreateTicketRequest {
    CreateTicketRequest::new(
        player_id,
        constraints,
        vec![
            PlayerParameter::new("league", league),
            PlayerParameter::new("table", table),
        ],
    )
}

/// Store wrapper that starts failing ticket updates after a set number succeed
pub struct FaultInjectingStore {
    inner: Arc<InMemoryTicketStore>,
    updates_before_failure: AtomicUsize,
    updates_seen: AtomicUsize,
}

impl FaultInjectingStore {
    pub fn new(inner: Arc<InMemoryTicketStore>, updates_before_failure: usize) -> Self {
        Self {
            inner,
            updates_before_failure: AtomicUsize::new(updates_before_failure),
            updates_seen: AtomicUsize::new(0),
        }
    }

    /// Stop injecting failures
    pub fn heal(&self) {
        self.updates_before_failure
            .store(usize::MAX, Ordering::SeqCst);
    }

    pub fn updates_seen(&self) -> usize {
        self.updates_seen.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TicketStore for FaultInjectingStore {
    async fn create_ticket(&self, ticket: &Ticket) -> Result<()> {
        self.inner.create_ticket(ticket).await
    }

    async fn get_ticket(&self, player_id: &str) -> Result<Ticket> {
        self.inner.get_ticket(player_id).await
    }

    async fn scan_tickets(&self, cursor: ScanCursor, batch_size: usize) -> Result<TicketPage> {
        self.inner.scan_tickets(cursor, batch_size).await
    }

    async fn range_query(
        &self,
        parameter_type: &str,
        operator: ParameterOperator,
        value: f64,
        limit: usize,
    ) -> Result<Vec<PlayerId>> {
        self.inner
            .range_query(parameter_type, operator, value, limit)
            .await
    }

    async fn remove_from_index(&self, parameter_type: &str, player_id: &str) -> Result<()> {
        self.inner.remove_from_index(parameter_type, player_id).await
    }

    async fn delete_ticket(&self, player_id: &str) -> Result<()> {
        self.inner.delete_ticket(player_id).await
    }

    async fn update_ticket(&self, ticket: &Ticket) -> Result<()> {
        let seen = self.updates_seen.fetch_add(1, Ordering::SeqCst);
        if seen >= self.updates_before_failure.load(Ordering::SeqCst) {
            return Err(MatchmakingError::StoreUnavailable {
                message: "injected update failure".to_string(),
            }
            .into());
        }
        self.inner.update_ticket(ticket).await
    }
}

/// In-memory store with a ticket service filing into it
pub fn create_test_system() -> (Arc<InMemoryTicketStore>, TicketService) {
    let store = Arc::new(InMemoryTicketStore::new());
    let tickets = TicketService::new(store.clone());
    (store, tickets)
}
