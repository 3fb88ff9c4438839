//! Metrics and monitoring for the matchmaker
//!
//! This module provides Prometheus metrics collection and the HTTP server
//! exposing health probes and metrics.

pub mod collector;
pub mod health;

pub use collector::{
    CleanupMetrics, MatchingMetrics, MetricsCollector, PerformanceMetrics, ServiceMetrics,
};
pub use health::{render_metrics, HealthServer};
