//! Main application state and service coordination
//!
//! This module contains the AppState shared by the health endpoints and
//! the MatchmakerService that owns the periodic matching and cleanup workers.

use crate::config::AppConfig;
use crate::matching::MatchingEngine;
use crate::metrics::health::HealthServerConfig;
use crate::metrics::{HealthServer, MetricsCollector};
use crate::store::{InMemoryTicketStore, TicketStore};
use crate::sweeper::ExpirationSweeper;
use crate::ticket::TicketService;
use crate::utils::current_timestamp;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tokio::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Service-level errors
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Service initialization error: {message}")]
    Initialization { message: String },

    #[error("Background task error: {message}")]
    BackgroundTask { message: String },
}

/// Application state shared by workers and health endpoints
pub struct AppState {
    /// Application configuration
    config: AppConfig,

    /// Ticket storage
    store: Arc<dyn TicketStore>,

    /// Ticket creation and lookup
    tickets: TicketService,

    /// Matching pass runner
    engine: MatchingEngine,

    /// Expired ticket garbage collector
    sweeper: ExpirationSweeper,

    /// Metrics collector shared by all components
    metrics_collector: Arc<MetricsCollector>,

    /// Service status
    is_running: RwLock<bool>,

    /// Time the state was created
    started_at: Instant,
}

impl AppState {
    /// Build the application around an in-memory ticket store
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        Self::with_store(config, Arc::new(InMemoryTicketStore::new()))
    }

    /// Build the application around a given ticket store
    pub fn with_store(
        config: AppConfig,
        store: Arc<dyn TicketStore>,
    ) -> Result<Self, ServiceError> {
        crate::config::validate_config(&config).map_err(|e| ServiceError::Configuration {
            message: e.to_string(),
        })?;

        info!("Initializing {} components", config.service.name);

        let metrics_collector =
            Arc::new(
                MetricsCollector::new().map_err(|e| ServiceError::Initialization {
                    message: format!("Failed to create metrics collector: {}", e),
                })?,
            );

        let engine = MatchingEngine::with_metrics(store.clone(), metrics_collector.clone());
        let sweeper = ExpirationSweeper::with_metrics(store.clone(), metrics_collector.clone());
        let tickets = TicketService::new(store.clone());

        Ok(Self {
            config,
            store,
            tickets,
            engine,
            sweeper,
            metrics_collector,
            is_running: RwLock::new(false),
            started_at: Instant::now(),
        })
    }

    /// Get service configuration
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Check if service is running
    pub async fn is_running(&self) -> bool {
        *self.is_running.read().await
    }

    async fn set_running(&self, running: bool) {
        *self.is_running.write().await = running;
    }

    pub fn store(&self) -> Arc<dyn TicketStore> {
        self.store.clone()
    }

    pub fn tickets(&self) -> &TicketService {
        &self.tickets
    }

    pub fn engine(&self) -> &MatchingEngine {
        &self.engine
    }

    pub fn sweeper(&self) -> &ExpirationSweeper {
        &self.sweeper
    }

    pub fn metrics_collector(&self) -> Arc<MetricsCollector> {
        self.metrics_collector.clone()
    }

    pub fn uptime(&self) -> Duration {
        self.started_at.elapsed()
    }

    /// Run one matching pass with the configured settings
    pub async fn run_matching_pass(&self) -> crate::error::Result<usize> {
        let sessions = self
            .engine
            .run_pass(current_timestamp(), &self.config.matchmaking)
            .await?;
        Ok(sessions.len())
    }

    /// Run one expiration sweep with the configured settings
    pub async fn run_cleanup_pass(&self) -> crate::error::Result<u64> {
        self.sweeper
            .run_pass(
                current_timestamp(),
                self.config.cleanup.grace_period(),
                self.config.cleanup.scan_batch_size,
            )
            .await
    }
}

/// The matchmaker worker service
pub struct MatchmakerService {
    /// Shared application state
    state: Arc<AppState>,

    /// Health and metrics endpoints
    health_server: Arc<HealthServer>,

    /// Background task handles
    background_tasks: Vec<JoinHandle<()>>,
}

impl MatchmakerService {
    pub fn new(config: AppConfig) -> Result<Self, ServiceError> {
        Self::from_state(Arc::new(AppState::new(config)?))
    }

    pub fn from_state(state: Arc<AppState>) -> Result<Self, ServiceError> {
        let health_config = HealthServerConfig {
            port: state.config().service.health_port,
            host: "0.0.0.0".to_string(),
        };

        let health_server = Arc::new(
            HealthServer::new(health_config, state.metrics_collector())
                .with_app_state(state.clone()),
        );

        Ok(Self {
            state,
            health_server,
            background_tasks: Vec::new(),
        })
    }

    pub fn state(&self) -> Arc<AppState> {
        self.state.clone()
    }

    /// Start the health server and all background workers
    pub async fn start(&mut self) -> Result<(), ServiceError> {
        info!("Starting {}", self.state.config().service.name);

        self.state.set_running(true).await;

        self.start_health_server().await;
        self.start_background_tasks();

        info!("✅ {} started successfully", self.state.config().service.name);
        Ok(())
    }

    /// Perform graceful shutdown
    pub async fn shutdown(&mut self) -> Result<(), ServiceError> {
        info!("Starting graceful shutdown of {}", self.state.config().service.name);

        self.state.set_running(false).await;

        self.stop_background_tasks().await;

        info!("Stopping health server...");
        if let Err(e) = self.health_server.stop().await {
            warn!("Failed to stop health server: {}", e);
        } else {
            info!("✅ Health server stopped");
        }

        let engine_stats =
            self.state
                .engine()
                .get_stats()
                .await
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final engine stats: {}", e),
                })?;
        let sweeper_stats =
            self.state
                .sweeper()
                .get_stats()
                .await
                .map_err(|e| ServiceError::BackgroundTask {
                    message: format!("Failed to get final sweeper stats: {}", e),
                })?;

        info!("Final matching statistics: {:?}", engine_stats);
        info!("Final cleanup statistics: {:?}", sweeper_stats);
        info!("✅ Shutdown completed");

        Ok(())
    }

    async fn start_health_server(&mut self) {
        let health_server = self.health_server.clone();
        let port = self.state.config().service.health_port;

        let handle = tokio::spawn(async move {
            if let Err(e) = health_server.start().await {
                error!("Health server failed: {}", e);
            } else {
                info!("Health server task completed");
            }
        });
        self.background_tasks.push(handle);

        // Give the server a moment to bind
        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        info!("✅ Health server started on port {}", port);
    }

    fn start_background_tasks(&mut self) {
        let pass_interval = self.state.config().matchmaking.pass_interval();
        info!(
            "Starting matching worker ({}s interval)...",
            pass_interval.as_secs()
        );
        let matching_task = {
            let state = self.state.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(pass_interval);
                info!("Matching worker started");

                while state.is_running().await {
                    interval.tick().await;

                    match state.run_matching_pass().await {
                        Ok(0) => debug!("Matching pass completed - no sessions formed"),
                        Ok(sessions) => info!("Matching pass formed {} sessions", sessions),
                        Err(e) => warn!("Matching pass failed: {}", e),
                    }
                }

                info!("Matching worker stopped");
            })
        };

        let sweep_interval = self.state.config().cleanup.sweep_interval();
        info!(
            "Starting cleanup worker ({}s interval)...",
            sweep_interval.as_secs()
        );
        let cleanup_task = {
            let state = self.state.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(sweep_interval);
                info!("Cleanup worker started");

                while state.is_running().await {
                    interval.tick().await;

                    match state.run_cleanup_pass().await {
                        Ok(0) => debug!("Cleanup pass completed - nothing to remove"),
                        Ok(removed) => info!("Cleanup pass removed {} expired tickets", removed),
                        Err(e) => warn!("Cleanup pass failed: {}", e),
                    }
                }

                info!("Cleanup worker stopped");
            })
        };

        info!("Starting health metrics task (30s interval)...");
        let health_metrics_task = {
            let state = self.state.clone();

            tokio::spawn(async move {
                let mut interval = tokio::time::interval(Duration::from_secs(30));

                while state.is_running().await {
                    interval.tick().await;

                    let metrics_collector = state.metrics_collector();
                    metrics_collector.update_uptime(state.uptime());

                    match crate::service::health::HealthCheck::check(state.clone()).await {
                        Ok(health) => {
                            metrics_collector.update_health_status(health.status.as_gauge());
                            for check in &health.checks {
                                metrics_collector.update_component_health(
                                    &check.name,
                                    check.status != crate::service::health::HealthStatus::Unhealthy,
                                );
                            }
                            debug!("Health check: {}", health.status);
                        }
                        Err(e) => warn!("Health check failed: {}", e),
                    }
                }

                info!("Health metrics task stopped");
            })
        };

        self.background_tasks.push(matching_task);
        self.background_tasks.push(cleanup_task);
        self.background_tasks.push(health_metrics_task);

        info!("3 background tasks started successfully");
    }

    /// Stop all background tasks
    async fn stop_background_tasks(&mut self) {
        let task_count = self.background_tasks.len();
        if task_count == 0 {
            info!("No background tasks to stop");
            return;
        }

        info!("Stopping {} background tasks...", task_count);

        for (i, task) in self.background_tasks.drain(..).enumerate() {
            debug!("Aborting background task {}/{}", i + 1, task_count);
            task.abort();
        }

        tokio::time::sleep(std::time::Duration::from_millis(100)).await;

        info!("✅ All {} background tasks stopped", task_count);
    }
}
