//! Scan-and-match pass over pending tickets
//!
//! A pass pages through every stored ticket. Each pending ticket that has not
//! already been placed during the pass queries the parameter indices for
//! opponents satisfying all of its constraints and, when enough qualify, forms
//! a session with them. Tickets past their timeout may settle for one player
//! fewer; if even that fails they expire.
//!
//! The store has no multi-key transactions. Members of a session are committed
//! one at a time, record first and index second, so an interrupted commit
//! leaves at worst a found player still indexed. Such entries are detected
//! when the member is re-read before the next commit and removed then.

use crate::config::MatchmakingSettings;
use crate::error::{MatchmakingError, Result};
use crate::metrics::collector::MATCHING_WORKER;
use crate::metrics::MetricsCollector;
use crate::store::TicketStore;
use crate::ticket::Ticket;
use crate::types::{PlayerId, Session};
use crate::utils::generate_session_id;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Statistics about matching engine operations
#[derive(Debug, Clone, Default, Serialize)]
pub struct MatchingEngineStats {
    /// Passes that ran to completion
    pub passes_completed: u64,
    /// Passes aborted by a store error
    pub passes_failed: u64,
    /// Total sessions formed
    pub sessions_created: u64,
    /// Sessions formed one player short of the maximum
    pub relaxed_sessions: u64,
    /// Total players placed into sessions
    pub players_matched: u64,
    /// Tickets moved to expired
    pub tickets_expired: u64,
    /// Index entries removed for tickets that were no longer pending
    pub stale_entries_healed: u64,
    /// Start of the most recent pass
    pub last_pass_at: Option<DateTime<Utc>>,
    /// Error message of the most recent pass, if it failed
    pub last_error: Option<String>,
}

impl MatchingEngineStats {
    /// Whether the most recent pass, if any, succeeded
    pub fn last_pass_succeeded(&self) -> bool {
        self.last_error.is_none()
    }
}

/// Tallies for a single pass
#[derive(Debug, Default)]
struct PassTally {
    sessions: Vec<Session>,
    relaxed_sessions: u64,
    tickets_scanned: u64,
    tickets_expired: u64,
    stale_entries_healed: u64,
}

/// Pass-local bookkeeping shared by every ticket in the pass
#[derive(Debug, Default)]
struct PassState {
    matched: HashSet<PlayerId>,
    tally: PassTally,
}

/// The matching engine
#[derive(Clone)]
pub struct MatchingEngine {
    /// Ticket storage
    store: Arc<dyn TicketStore>,
    /// Engine statistics
    stats: Arc<RwLock<MatchingEngineStats>>,
    /// Metrics collector for recording pass outcomes
    metrics_collector: Arc<MetricsCollector>,
}

impl MatchingEngine {
    /// Create a new engine with its own metrics registry
    pub fn new(store: Arc<dyn TicketStore>) -> Result<Self> {
        let metrics_collector = Arc::new(MetricsCollector::new()?);
        Ok(Self::with_metrics(store, metrics_collector))
    }

    /// Create a new engine reporting to a shared metrics collector
    pub fn with_metrics(store: Arc<dyn TicketStore>, metrics_collector: Arc<MetricsCollector>) -> Self {
        Self {
            store,
            stats: Arc::new(RwLock::new(MatchingEngineStats::default())),
            metrics_collector,
        }
    }

    /// Run one full pass and return the sessions it formed.
    ///
    /// A store error aborts the remainder of the pass; sessions committed
    /// before the failure stay committed.
    pub async fn run_pass(
        &self,
        now: DateTime<Utc>,
        settings: &MatchmakingSettings,
    ) -> Result<Vec<Session>> {
        settings.validate_pass().map_err(|e| MatchmakingError::ConfigurationError {
            message: e.to_string(),
        })?;

        let timer = self.metrics_collector.start_timer();
        let mut state = PassState::default();
        let result = self.execute_pass(now, settings, &mut state).await;
        let duration = timer.stop();

        self.record_pass(now, &state.tally, result.as_ref().err(), duration)?;

        match result {
            Ok(()) => {
                let tally = state.tally;
                info!(
                    "Matching pass finished in {:?} - scanned: {}, sessions: {}, relaxed: {}, expired: {}",
                    duration,
                    tally.tickets_scanned,
                    tally.sessions.len(),
                    tally.relaxed_sessions,
                    tally.tickets_expired
                );
                Ok(tally.sessions)
            }
            Err(e) => {
                if let Some(MatchmakingError::MalformedRecord { player_id, reason }) =
                    e.downcast_ref::<MatchmakingError>()
                {
                    error!(
                        "Data integrity error: ticket record for player {} cannot be decoded: {}",
                        player_id, reason
                    );
                }
                error!(
                    "Matching pass aborted after {} sessions: {}",
                    state.tally.sessions.len(),
                    e
                );
                Err(e)
            }
        }
    }

    async fn execute_pass(
        &self,
        now: DateTime<Utc>,
        settings: &MatchmakingSettings,
        state: &mut PassState,
    ) -> Result<()> {
        let mut cursor = 0;

        loop {
            let page = self
                .store
                .scan_tickets(cursor, settings.scan_batch_size)
                .await?;

            for ticket in page.tickets {
                state.tally.tickets_scanned += 1;

                if state.matched.contains(&ticket.player_id) || !ticket.is_pending() {
                    continue;
                }

                self.process_ticket(ticket, now, settings, state).await?;
            }

            if page.next_cursor == 0 {
                break;
            }
            cursor = page.next_cursor;
        }

        Ok(())
    }

    async fn process_ticket(
        &self,
        ticket: Ticket,
        now: DateTime<Utc>,
        settings: &MatchmakingSettings,
        state: &mut PassState,
    ) -> Result<()> {
        let max = settings.max_players_per_session;
        let min = settings.min_players_per_session;
        let has_expired = ticket.has_expired(now, settings.match_timeout())?;

        let relaxed_size = max - 1;
        let target = if has_expired && relaxed_size >= min {
            relaxed_size
        } else {
            max
        };
        let acceptable = |size: usize| size == target;

        let eligible = if ticket.has_only_queryable_constraints() {
            self.collect_eligible(&ticket, max, &state.matched).await?
        } else {
            warn!(
                "Ticket {} for player {} carries a constraint no index can answer, skipping search",
                ticket.id, ticket.player_id
            );
            vec![ticket.player_id.clone()]
        };

        debug!(
            "Player {} has {} eligible (target {}, expired: {})",
            ticket.player_id,
            eligible.len(),
            target,
            has_expired
        );

        if acceptable(eligible.len()) {
            let Some(members) = self.confirm_members(&ticket, eligible, state).await? else {
                // The initiating ticket itself has left the queue
                return Ok(());
            };

            if acceptable(members.len()) {
                let relaxed = members.len() < max;
                self.commit_session(members, now, relaxed, state).await?;
                return Ok(());
            }

            debug!(
                "Group for player {} fell to {} after re-reading members",
                ticket.player_id,
                members.len()
            );
        }

        if has_expired {
            self.expire_ticket(ticket, state).await?;
        }

        Ok(())
    }

    /// Opponents satisfying every constraint of `ticket`, self first
    async fn collect_eligible(
        &self,
        ticket: &Ticket,
        max: usize,
        matched: &HashSet<PlayerId>,
    ) -> Result<Vec<PlayerId>> {
        let required = ticket.match_parameters.len();
        let mut eligible = vec![ticket.player_id.clone()];
        let mut hits: HashMap<PlayerId, usize> = HashMap::new();

        if eligible.len() >= max {
            return Ok(eligible);
        }

        'constraints: for param in &ticket.match_parameters {
            let candidates = self
                .store
                .range_query(&param.parameter_type, param.operator, param.value, max)
                .await?;

            for candidate in candidates {
                if candidate == ticket.player_id || matched.contains(&candidate) {
                    continue;
                }

                let count = hits.entry(candidate.clone()).or_insert(0);
                *count += 1;

                if *count == required {
                    eligible.push(candidate);
                    if eligible.len() >= max {
                        break 'constraints;
                    }
                }
            }
        }

        Ok(eligible)
    }

    /// Re-read every member and drop those that are no longer pending.
    ///
    /// Returns `None` when the initiating ticket itself is gone or settled.
    async fn confirm_members(
        &self,
        initiator: &Ticket,
        eligible: Vec<PlayerId>,
        state: &mut PassState,
    ) -> Result<Option<Vec<Ticket>>> {
        let mut members = Vec::with_capacity(eligible.len());

        for player_id in eligible {
            let current = match self.store.get_ticket(&player_id).await {
                Ok(ticket) => Some(ticket),
                Err(e)
                    if matches!(
                        e.downcast_ref::<MatchmakingError>(),
                        Some(MatchmakingError::TicketNotFound { .. })
                    ) =>
                {
                    None
                }
                Err(e) => return Err(e),
            };

            match current {
                Some(ticket) if ticket.is_pending() => members.push(ticket),
                _ if player_id == initiator.player_id => return Ok(None),
                other => {
                    warn!(
                        "Removing stale index entries for player {} ({})",
                        player_id,
                        other
                            .as_ref()
                            .map(|t| t.status.to_string())
                            .unwrap_or_else(|| "missing".to_string())
                    );
                    match &other {
                        Some(stale) => self.remove_from_indices(stale).await?,
                        // No record left to name its axes, so clear the ones just queried
                        None => {
                            for param in &initiator.match_parameters {
                                self.store
                                    .remove_from_index(&param.parameter_type, &player_id)
                                    .await?;
                            }
                        }
                    }
                    state.tally.stale_entries_healed += 1;
                    self.metrics_collector.record_stale_index_entry();
                }
            }
        }

        Ok(Some(members))
    }

    async fn commit_session(
        &self,
        members: Vec<Ticket>,
        now: DateTime<Utc>,
        relaxed: bool,
        state: &mut PassState,
    ) -> Result<()> {
        let session = Session {
            id: generate_session_id(),
            player_ids: members.iter().map(|t| t.player_id.clone()).collect(),
            created_at: now,
        };

        for mut member in members {
            member.mark_found(session.id)?;
            self.store.update_ticket(&member).await?;
            self.remove_from_indices(&member).await?;
            state.matched.insert(member.player_id);
        }

        info!(
            "Session {} formed with {} players{}: {:?}",
            session.id,
            session.size(),
            if relaxed { " (relaxed)" } else { "" },
            session.player_ids
        );

        self.metrics_collector
            .record_session_created(session.size(), relaxed);
        if relaxed {
            state.tally.relaxed_sessions += 1;
        }
        state.tally.sessions.push(session);

        Ok(())
    }

    async fn expire_ticket(&self, mut ticket: Ticket, state: &mut PassState) -> Result<()> {
        ticket.mark_expired()?;
        self.store.update_ticket(&ticket).await?;
        self.remove_from_indices(&ticket).await?;

        debug!("Ticket {} for player {} expired", ticket.id, ticket.player_id);
        self.metrics_collector.record_ticket_expired();
        state.tally.tickets_expired += 1;

        Ok(())
    }

    async fn remove_from_indices(&self, ticket: &Ticket) -> Result<()> {
        for parameter_type in ticket.declared_types() {
            self.store
                .remove_from_index(parameter_type, &ticket.player_id)
                .await?;
        }
        Ok(())
    }

    fn record_pass(
        &self,
        started_at: DateTime<Utc>,
        tally: &PassTally,
        failure: Option<&anyhow::Error>,
        duration: Duration,
    ) -> Result<()> {
        let players_matched: u64 = tally.sessions.iter().map(|s| s.size() as u64).sum();

        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire engine stats lock".to_string(),
                })?;

            if failure.is_some() {
                stats.passes_failed += 1;
            } else {
                stats.passes_completed += 1;
            }
            stats.sessions_created += tally.sessions.len() as u64;
            stats.relaxed_sessions += tally.relaxed_sessions;
            stats.players_matched += players_matched;
            stats.tickets_expired += tally.tickets_expired;
            stats.stale_entries_healed += tally.stale_entries_healed;
            stats.last_pass_at = Some(started_at);
            stats.last_error = failure.map(|e| e.to_string());
        }

        self.metrics_collector.record_pass(
            MATCHING_WORKER,
            failure.is_none(),
            tally.tickets_scanned,
            duration,
        );

        Ok(())
    }

    /// Get current engine statistics
    pub async fn get_stats(&self) -> Result<MatchingEngineStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire engine stats lock".to_string(),
            })?;

        Ok(stats.clone())
    }

    /// Get the metrics collector
    pub fn metrics(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }
}
