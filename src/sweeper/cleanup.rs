//! Deletion of expired tickets past their grace period

use crate::error::{MatchmakingError, Result};
use crate::metrics::collector::CLEANUP_WORKER;
use crate::metrics::MetricsCollector;
use crate::store::TicketStore;
use crate::types::TicketStatus;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, error, info};

/// Statistics about sweeper operations
#[derive(Debug, Clone, Default, Serialize)]
pub struct SweeperStats {
    /// Sweeps that ran to completion
    pub passes_completed: u64,
    /// Sweeps aborted by a store error
    pub passes_failed: u64,
    /// Total tickets deleted
    pub tickets_removed: u64,
    /// Start of the most recent sweep
    pub last_pass_at: Option<DateTime<Utc>>,
    /// Error message of the most recent sweep, if it failed
    pub last_error: Option<String>,
}

impl SweeperStats {
    pub fn last_pass_succeeded(&self) -> bool {
        self.last_error.is_none()
    }
}

/// Garbage collector for expired tickets
#[derive(Clone)]
pub struct ExpirationSweeper {
    store: Arc<dyn TicketStore>,
    stats: Arc<RwLock<SweeperStats>>,
    metrics_collector: Arc<MetricsCollector>,
}

impl ExpirationSweeper {
    pub fn new(store: Arc<dyn TicketStore>) -> Result<Self> {
        let metrics_collector = Arc::new(MetricsCollector::new()?);
        Ok(Self::with_metrics(store, metrics_collector))
    }

    pub fn with_metrics(store: Arc<dyn TicketStore>, metrics_collector: Arc<MetricsCollector>) -> Self {
        Self {
            store,
            stats: Arc::new(RwLock::new(SweeperStats::default())),
            metrics_collector,
        }
    }

    /// Delete every expired ticket created before `now - grace_period`.
    ///
    /// Returns the number of tickets removed. A failure aborts the sweep and
    /// the next invocation starts over from the beginning.
    pub async fn run_pass(
        &self,
        now: DateTime<Utc>,
        grace_period: Duration,
        batch_size: usize,
    ) -> Result<u64> {
        let timer = self.metrics_collector.start_timer();
        let mut scanned = 0u64;
        let mut removed = 0u64;

        let result = self
            .sweep(now, grace_period, batch_size, &mut scanned, &mut removed)
            .await;
        let duration = timer.stop();

        {
            let mut stats = self
                .stats
                .write()
                .map_err(|_| MatchmakingError::InternalError {
                    message: "Failed to acquire sweeper stats lock".to_string(),
                })?;

            match &result {
                Ok(()) => stats.passes_completed += 1,
                Err(_) => stats.passes_failed += 1,
            }
            stats.tickets_removed += removed;
            stats.last_pass_at = Some(now);
            stats.last_error = result.as_ref().err().map(|e| e.to_string());
        }

        self.metrics_collector
            .record_pass(CLEANUP_WORKER, result.is_ok(), scanned, duration);
        self.metrics_collector.record_tickets_removed(removed);

        match result {
            Ok(()) => {
                if removed > 0 {
                    info!("Removed {} expired tickets in {:?}", removed, duration);
                }
                Ok(removed)
            }
            Err(e) => {
                error!("Expiration sweep aborted after removing {}: {}", removed, e);
                Err(e)
            }
        }
    }

    async fn sweep(
        &self,
        now: DateTime<Utc>,
        grace_period: Duration,
        batch_size: usize,
        scanned: &mut u64,
        removed: &mut u64,
    ) -> Result<()> {
        let mut cursor = 0;

        loop {
            let page = self.store.scan_tickets(cursor, batch_size).await?;
            let next_cursor = page.next_cursor;

            for ticket in page.tickets {
                *scanned += 1;

                if ticket.status != TicketStatus::Expired
                    || !ticket.is_older_than(now, grace_period)?
                {
                    continue;
                }

                self.store.delete_ticket(&ticket.player_id).await?;
                *removed += 1;
                debug!(
                    "Deleted expired ticket {} for player {}",
                    ticket.id, ticket.player_id
                );
            }

            if next_cursor == 0 {
                break;
            }
            cursor = next_cursor;
        }

        Ok(())
    }

    /// Get current sweeper statistics
    pub async fn get_stats(&self) -> Result<SweeperStats> {
        let stats = self
            .stats
            .read()
            .map_err(|_| MatchmakingError::InternalError {
                message: "Failed to acquire sweeper stats lock".to_string(),
            })?;

        Ok(stats.clone())
    }
}
