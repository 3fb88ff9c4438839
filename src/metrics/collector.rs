//! Metrics collection using Prometheus
//!
//! This module provides metrics collection for the matchmaker workers:
//! matching passes, expiration sweeps and service health.

use anyhow::Result;
use prometheus::{
    Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, IntGaugeVec,
    Opts, Registry,
};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Worker label for matching passes
pub const MATCHING_WORKER: &str = "matching";

/// Worker label for expiration sweeps
pub const CLEANUP_WORKER: &str = "cleanup";

/// Main metrics collector for the matchmaker
#[derive(Clone)]
pub struct MetricsCollector {
    /// Prometheus registry
    registry: Arc<Registry>,

    /// Service-level metrics
    service_metrics: ServiceMetrics,

    /// Matching pass metrics
    matching_metrics: MatchingMetrics,

    /// Expiration sweep metrics
    cleanup_metrics: CleanupMetrics,

    /// Performance metrics
    performance_metrics: PerformanceMetrics,
}

/// Service-level metrics
#[derive(Clone)]
pub struct ServiceMetrics {
    /// Service uptime in seconds
    pub uptime_seconds: IntGauge,

    /// Health check status (0=unhealthy, 1=degraded, 2=healthy)
    pub health_status: IntGauge,

    /// Component health status
    pub component_health: IntGaugeVec,
}

/// Matching pass metrics
#[derive(Clone)]
pub struct MatchingMetrics {
    /// Total sessions created
    pub sessions_created_total: IntCounter,

    /// Sessions formed below the maximum size after a timeout
    pub relaxed_sessions_total: IntCounter,

    /// Total players placed into sessions
    pub players_matched_total: IntCounter,

    /// Tickets that timed out without a session
    pub tickets_expired_total: IntCounter,

    /// Index entries dropped because their ticket had already left the queue
    pub stale_index_entries_total: IntCounter,

    /// Players per session
    pub session_size: Histogram,
}

/// Expiration sweep metrics
#[derive(Clone)]
pub struct CleanupMetrics {
    /// Expired tickets deleted by the sweeper
    pub tickets_removed_total: IntCounter,
}

/// Performance metrics
#[derive(Clone)]
pub struct PerformanceMetrics {
    /// Worker passes by outcome
    pub passes_total: IntCounterVec,

    /// Worker pass durations
    pub pass_duration: HistogramVec,

    /// Tickets read per pass
    pub tickets_scanned: HistogramVec,
}

impl MetricsCollector {
    /// Create a new metrics collector with default registry
    pub fn new() -> Result<Self> {
        let registry = Arc::new(Registry::new());
        Self::with_registry(registry)
    }

    /// Create a new metrics collector with custom registry
    pub fn with_registry(registry: Arc<Registry>) -> Result<Self> {
        let service_metrics = ServiceMetrics::new(&registry)?;
        let matching_metrics = MatchingMetrics::new(&registry)?;
        let cleanup_metrics = CleanupMetrics::new(&registry)?;
        let performance_metrics = PerformanceMetrics::new(&registry)?;

        Ok(Self {
            registry,
            service_metrics,
            matching_metrics,
            cleanup_metrics,
            performance_metrics,
        })
    }

    /// Get the Prometheus registry
    pub fn registry(&self) -> Arc<Registry> {
        self.registry.clone()
    }

    /// Get service metrics
    pub fn service(&self) -> &ServiceMetrics {
        &self.service_metrics
    }

    /// Get matching metrics
    pub fn matching(&self) -> &MatchingMetrics {
        &self.matching_metrics
    }

    /// Get cleanup metrics
    pub fn cleanup(&self) -> &CleanupMetrics {
        &self.cleanup_metrics
    }

    /// Get performance metrics
    pub fn performance(&self) -> &PerformanceMetrics {
        &self.performance_metrics
    }

    /// Record a finished worker pass
    pub fn record_pass(&self, worker: &str, success: bool, tickets_scanned: u64, duration: Duration) {
        let status = if success { "success" } else { "error" };

        self.performance_metrics
            .passes_total
            .with_label_values(&[worker, status])
            .inc();

        self.performance_metrics
            .pass_duration
            .with_label_values(&[worker])
            .observe(duration.as_secs_f64());

        self.performance_metrics
            .tickets_scanned
            .with_label_values(&[worker])
            .observe(tickets_scanned as f64);
    }

    /// Record a session being formed
    pub fn record_session_created(&self, size: usize, relaxed: bool) {
        self.matching_metrics.sessions_created_total.inc();
        self.matching_metrics
            .players_matched_total
            .inc_by(size as u64);
        self.matching_metrics.session_size.observe(size as f64);

        if relaxed {
            self.matching_metrics.relaxed_sessions_total.inc();
        }
    }

    /// Record a ticket timing out
    pub fn record_ticket_expired(&self) {
        self.matching_metrics.tickets_expired_total.inc();
    }

    /// Record a stale index entry being healed
    pub fn record_stale_index_entry(&self) {
        self.matching_metrics.stale_index_entries_total.inc();
    }

    /// Record expired tickets deleted by a sweep
    pub fn record_tickets_removed(&self, count: u64) {
        self.cleanup_metrics.tickets_removed_total.inc_by(count);
    }

    /// Update service uptime
    pub fn update_uptime(&self, uptime: Duration) {
        self.service_metrics
            .uptime_seconds
            .set(uptime.as_secs() as i64);
    }

    /// Update health status
    pub fn update_health_status(&self, status: u8) {
        self.service_metrics.health_status.set(status as i64);
    }

    /// Update component health
    pub fn update_component_health(&self, component: &str, healthy: bool) {
        let status = if healthy { 1 } else { 0 };
        self.service_metrics
            .component_health
            .with_label_values(&[component])
            .set(status);
    }

    /// Create a timer for measuring operation duration
    pub fn start_timer(&self) -> MetricsTimer {
        MetricsTimer::new()
    }
}

/// Timer for measuring operation durations
pub struct MetricsTimer {
    start: Instant,
}

impl MetricsTimer {
    fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }

    /// Get the elapsed duration
    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }

    /// Stop the timer and return the duration
    pub fn stop(self) -> Duration {
        self.elapsed()
    }
}

impl ServiceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let uptime_seconds =
            IntGauge::new("matchmaker_uptime_seconds", "Service uptime in seconds")?;
        registry.register(Box::new(uptime_seconds.clone()))?;

        let health_status = IntGauge::new(
            "matchmaker_health_status",
            "Health status (0=unhealthy, 1=degraded, 2=healthy)",
        )?;
        registry.register(Box::new(health_status.clone()))?;

        let component_health = IntGaugeVec::new(
            Opts::new("matchmaker_component_health", "Component health status"),
            &["component"],
        )?;
        registry.register(Box::new(component_health.clone()))?;

        Ok(Self {
            uptime_seconds,
            health_status,
            component_health,
        })
    }
}

impl MatchingMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let sessions_created_total = IntCounter::new(
            "matchmaker_sessions_created_total",
            "Total game sessions created",
        )?;
        registry.register(Box::new(sessions_created_total.clone()))?;

        let relaxed_sessions_total = IntCounter::new(
            "matchmaker_relaxed_sessions_total",
            "Sessions formed below maximum size after a timeout",
        )?;
        registry.register(Box::new(relaxed_sessions_total.clone()))?;

        let players_matched_total = IntCounter::new(
            "matchmaker_players_matched_total",
            "Total players placed into sessions",
        )?;
        registry.register(Box::new(players_matched_total.clone()))?;

        let tickets_expired_total = IntCounter::new(
            "matchmaker_tickets_expired_total",
            "Tickets that timed out without a session",
        )?;
        registry.register(Box::new(tickets_expired_total.clone()))?;

        let stale_index_entries_total = IntCounter::new(
            "matchmaker_stale_index_entries_total",
            "Index entries removed for tickets no longer pending",
        )?;
        registry.register(Box::new(stale_index_entries_total.clone()))?;

        let session_size = Histogram::with_opts(
            HistogramOpts::new("matchmaker_session_size", "Players per session")
                .buckets(vec![1.0, 2.0, 3.0, 4.0, 6.0, 8.0, 12.0, 16.0]),
        )?;
        registry.register(Box::new(session_size.clone()))?;

        Ok(Self {
            sessions_created_total,
            relaxed_sessions_total,
            players_matched_total,
            tickets_expired_total,
            stale_index_entries_total,
            session_size,
        })
    }
}

impl CleanupMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let tickets_removed_total = IntCounter::new(
            "matchmaker_tickets_removed_total",
            "Expired tickets deleted by the sweeper",
        )?;
        registry.register(Box::new(tickets_removed_total.clone()))?;

        Ok(Self {
            tickets_removed_total,
        })
    }
}

impl PerformanceMetrics {
    fn new(registry: &Registry) -> Result<Self> {
        let passes_total = IntCounterVec::new(
            Opts::new("matchmaker_passes_total", "Worker passes by outcome"),
            &["worker", "status"],
        )?;
        registry.register(Box::new(passes_total.clone()))?;

        let pass_duration = HistogramVec::new(
            HistogramOpts::new(
                "matchmaker_pass_duration_seconds",
                "Worker pass duration",
            )
            .buckets(vec![0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0, 10.0]),
            &["worker"],
        )?;
        registry.register(Box::new(pass_duration.clone()))?;

        let tickets_scanned = HistogramVec::new(
            HistogramOpts::new("matchmaker_tickets_scanned", "Tickets read per pass")
                .buckets(vec![0.0, 10.0, 100.0, 1000.0, 10000.0, 100000.0]),
            &["worker"],
        )?;
        registry.register(Box::new(tickets_scanned.clone()))?;

        Ok(Self {
            passes_total,
            pass_duration,
            tickets_scanned,
        })
    }
}
