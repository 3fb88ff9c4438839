//! Health check reporting
//!
//! This module aggregates the state of the matchmaker workers into a single
//! health report for readiness and liveness probes.

use crate::service::app::AppState;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::error;

/// Health check status
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    /// Value exported on the health status gauge
    pub fn as_gauge(&self) -> u8 {
        match self {
            HealthStatus::Healthy => 2,
            HealthStatus::Degraded => 1,
            HealthStatus::Unhealthy => 0,
        }
    }

    /// Combine with another status, keeping the worse of the two
    fn worst(self, other: &HealthStatus) -> HealthStatus {
        match (&self, other) {
            (HealthStatus::Unhealthy, _) | (_, HealthStatus::Unhealthy) => HealthStatus::Unhealthy,
            (HealthStatus::Degraded, _) | (_, HealthStatus::Degraded) => HealthStatus::Degraded,
            _ => HealthStatus::Healthy,
        }
    }
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "✅ healthy"),
            HealthStatus::Degraded => write!(f, "⚠️  degraded"),
            HealthStatus::Unhealthy => write!(f, "❌ unhealthy"),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthCheck {
    /// Overall service status
    pub status: HealthStatus,
    /// Service name
    pub service: String,
    /// Service version
    pub version: String,
    /// Current timestamp
    pub timestamp: chrono::DateTime<chrono::Utc>,
    /// Detailed component checks
    pub checks: Vec<ComponentCheck>,
    /// Service statistics
    pub stats: ServiceStats,
}

/// Individual component health check
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentCheck {
    /// Component name
    pub name: String,
    /// Component status
    pub status: HealthStatus,
    /// Optional error message if not healthy
    pub message: Option<String>,
    /// Check duration in milliseconds
    pub duration_ms: u64,
}

/// Service statistics for health reporting
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceStats {
    /// Matching passes completed since start
    pub matching_passes: u64,
    /// Sessions formed since start
    pub sessions_created: u64,
    /// Players placed into sessions since start
    pub players_matched: u64,
    /// Tickets expired since start
    pub tickets_expired: u64,
    /// Expired tickets deleted since start
    pub tickets_removed: u64,
    /// Service uptime in seconds
    pub uptime_seconds: u64,
}

impl HealthCheck {
    /// Perform a full health check of the service
    pub async fn check(app_state: Arc<AppState>) -> Result<Self> {
        let service_check = Self::check_service_running(&app_state).await;
        let engine_check = Self::check_matching_engine(&app_state).await;
        let sweeper_check = Self::check_sweeper(&app_state).await;

        // A stopped service is unhealthy regardless of its workers
        let status = if service_check.status != HealthStatus::Healthy {
            HealthStatus::Unhealthy
        } else {
            HealthStatus::Healthy
                .worst(&engine_check.status)
                .worst(&sweeper_check.status)
        };

        let stats = Self::gather_service_stats(&app_state).await;

        Ok(HealthCheck {
            status,
            service: app_state.config().service.name.clone(),
            version: crate::VERSION.to_string(),
            timestamp: chrono::Utc::now(),
            checks: vec![service_check, engine_check, sweeper_check],
            stats,
        })
    }

    /// Simple liveness check - just verify service is running
    pub async fn liveness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if app_state.is_running().await {
            Ok(HealthStatus::Healthy)
        } else {
            Ok(HealthStatus::Unhealthy)
        }
    }

    /// Readiness check - the service is running and its last passes succeeded
    pub async fn readiness_check(app_state: Arc<AppState>) -> Result<HealthStatus> {
        if !app_state.is_running().await {
            return Ok(HealthStatus::Unhealthy);
        }

        let engine = Self::check_matching_engine(&app_state).await.status;
        let sweeper = Self::check_sweeper(&app_state).await.status;
        Ok(engine.worst(&sweeper))
    }

    async fn check_service_running(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = if app_state.is_running().await {
            (HealthStatus::Healthy, None)
        } else {
            (
                HealthStatus::Unhealthy,
                Some("Service is not running".to_string()),
            )
        };

        ComponentCheck {
            name: "service_running".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    /// A failed last pass degrades the engine; unreadable stats make it unhealthy
    async fn check_matching_engine(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match app_state.engine().get_stats().await {
            Ok(stats) if stats.last_pass_succeeded() => (HealthStatus::Healthy, None),
            Ok(stats) => (
                HealthStatus::Degraded,
                stats.last_error.map(|e| format!("Last pass failed: {}", e)),
            ),
            Err(e) => {
                error!("Matching engine stats check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Stats check failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "matching_engine".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn check_sweeper(app_state: &AppState) -> ComponentCheck {
        let start = std::time::Instant::now();

        let (status, message) = match app_state.sweeper().get_stats().await {
            Ok(stats) if stats.last_pass_succeeded() => (HealthStatus::Healthy, None),
            Ok(stats) => (
                HealthStatus::Degraded,
                stats.last_error.map(|e| format!("Last sweep failed: {}", e)),
            ),
            Err(e) => {
                error!("Sweeper stats check failed: {}", e);
                (
                    HealthStatus::Unhealthy,
                    Some(format!("Stats check failed: {}", e)),
                )
            }
        };

        ComponentCheck {
            name: "expiration_sweeper".to_string(),
            status,
            message,
            duration_ms: start.elapsed().as_millis() as u64,
        }
    }

    async fn gather_service_stats(app_state: &AppState) -> ServiceStats {
        let mut stats = ServiceStats {
            uptime_seconds: app_state.uptime().as_secs(),
            ..ServiceStats::default()
        };

        if let Ok(engine) = app_state.engine().get_stats().await {
            stats.matching_passes = engine.passes_completed;
            stats.sessions_created = engine.sessions_created;
            stats.players_matched = engine.players_matched;
            stats.tickets_expired = engine.tickets_expired;
        }
        if let Ok(sweeper) = app_state.sweeper().get_stats().await {
            stats.tickets_removed = sweeper.tickets_removed;
        }

        stats
    }
}

/// Convert health check to JSON string
impl HealthCheck {
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| anyhow::anyhow!("Failed to serialize health check: {}", e))
    }
}
