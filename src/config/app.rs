//! Main application configuration
//!
//! This module defines the primary configuration structures for the matchmaker,
//! including TOML file loading, environment variable overrides and validation.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub service: ServiceSettings,
    pub matchmaking: MatchmakingSettings,
    pub cleanup: CleanupSettings,
}

/// Service-level settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceSettings {
    /// Service name for logging and metrics
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Port for health check endpoint
    pub health_port: u16,
    /// Graceful shutdown timeout in seconds
    pub shutdown_timeout_seconds: u64,
}

/// Matching pass settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MatchmakingSettings {
    /// Smallest session the engine may form
    pub min_players_per_session: usize,
    /// Preferred and largest session size
    pub max_players_per_session: usize,
    /// Ticket age after which constraints relax, in seconds
    pub match_timeout_seconds: u64,
    /// Tickets read per scan page
    pub scan_batch_size: usize,
    /// Delay between matching passes in seconds
    pub pass_interval_seconds: u64,
}

/// Expiration sweep settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CleanupSettings {
    /// How long an expired ticket stays readable before deletion, in seconds
    pub expired_ticket_grace_period_seconds: u64,
    /// Tickets read per scan page
    pub scan_batch_size: usize,
    /// Delay between sweeps in seconds
    pub sweep_interval_seconds: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            name: "matchmaker".to_string(),
            log_level: "info".to_string(),
            health_port: 8080,
            shutdown_timeout_seconds: 30,
        }
    }
}

impl Default for MatchmakingSettings {
    fn default() -> Self {
        Self {
            min_players_per_session: 2,
            max_players_per_session: 2,
            match_timeout_seconds: 60,
            scan_batch_size: 100,
            pass_interval_seconds: 10,
        }
    }
}

impl Default for CleanupSettings {
    fn default() -> Self {
        Self {
            expired_ticket_grace_period_seconds: 300, // 5 minutes
            scan_batch_size: 100,
            sweep_interval_seconds: 20,
        }
    }
}

impl MatchmakingSettings {
    /// Settings with explicit session bounds and timeout, defaults elsewhere.
    ///
    /// The timeout is kept in whole seconds; any fraction rounds up.
    pub fn new(min_players: usize, max_players: usize, match_timeout: Duration) -> Self {
        let whole_seconds = match_timeout.as_secs();
        let match_timeout_seconds = if match_timeout.subsec_nanos() > 0 {
            whole_seconds.saturating_add(1)
        } else {
            whole_seconds
        };

        Self {
            min_players_per_session: min_players,
            max_players_per_session: max_players,
            match_timeout_seconds,
            ..Self::default()
        }
    }

    /// Get match timeout as Duration
    pub fn match_timeout(&self) -> Duration {
        Duration::from_secs(self.match_timeout_seconds)
    }

    /// Get pass interval as Duration
    pub fn pass_interval(&self) -> Duration {
        Duration::from_secs(self.pass_interval_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        self.validate_pass()?;
        if self.pass_interval_seconds == 0 {
            return Err(anyhow!("Pass interval must be greater than 0"));
        }
        Ok(())
    }

    /// Check only the values a single matching pass reads
    pub fn validate_pass(&self) -> Result<()> {
        if self.min_players_per_session == 0 {
            return Err(anyhow!("Minimum players per session must be at least 1"));
        }
        if self.min_players_per_session > self.max_players_per_session {
            return Err(anyhow!(
                "Minimum players per session ({}) exceeds maximum ({})",
                self.min_players_per_session,
                self.max_players_per_session
            ));
        }
        if self.match_timeout_seconds == 0 {
            return Err(anyhow!("Match timeout must be greater than 0"));
        }
        if self.scan_batch_size == 0 {
            return Err(anyhow!("Matchmaking scan batch size must be greater than 0"));
        }
        Ok(())
    }
}

impl CleanupSettings {
    /// Get grace period as Duration
    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.expired_ticket_grace_period_seconds)
    }

    /// Get sweep interval as Duration
    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_seconds)
    }

    pub fn validate(&self) -> Result<()> {
        if self.scan_batch_size == 0 {
            return Err(anyhow!("Cleanup scan batch size must be greater than 0"));
        }
        if self.sweep_interval_seconds == 0 {
            return Err(anyhow!("Sweep interval must be greater than 0"));
        }
        Ok(())
    }
}

/// Parse an environment variable if it is set
fn read_env<T: FromStr>(name: &str) -> Result<Option<T>> {
    match env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| anyhow!("Invalid {} value: {}", name, raw)),
        Err(_) => Ok(None),
    }
}

impl AppConfig {
    /// Load configuration from environment variables with fallback to defaults
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    /// Load configuration from a TOML file, then apply environment overrides
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;

        let mut config: AppConfig = toml::from_str(&raw)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;

        config.apply_env()?;
        validate_config(&config)?;
        Ok(config)
    }

    fn apply_env(&mut self) -> Result<()> {
        // Service settings
        if let Some(name) = read_env("SERVICE_NAME")? {
            self.service.name = name;
        }
        if let Some(log_level) = read_env("LOG_LEVEL")? {
            self.service.log_level = log_level;
        }
        if let Some(port) = read_env("HEALTH_PORT")? {
            self.service.health_port = port;
        }
        if let Some(timeout) = read_env("SHUTDOWN_TIMEOUT_SECONDS")? {
            self.service.shutdown_timeout_seconds = timeout;
        }

        // Matchmaking settings
        if let Some(min) = read_env("MATCHMAKER_MIN_PLAYERS_PER_SESSION")? {
            self.matchmaking.min_players_per_session = min;
        }
        if let Some(max) = read_env("MATCHMAKER_MAX_PLAYERS_PER_SESSION")? {
            self.matchmaking.max_players_per_session = max;
        }
        if let Some(timeout) = read_env("MATCHMAKER_TIMEOUT_SECONDS")? {
            self.matchmaking.match_timeout_seconds = timeout;
        }
        if let Some(batch) = read_env("MATCHMAKER_SCAN_BATCH_SIZE")? {
            self.matchmaking.scan_batch_size = batch;
        }
        if let Some(interval) = read_env("MATCHMAKER_PASS_INTERVAL_SECONDS")? {
            self.matchmaking.pass_interval_seconds = interval;
        }

        // Cleanup settings
        if let Some(grace) = read_env("CLEANER_GRACE_PERIOD_SECONDS")? {
            self.cleanup.expired_ticket_grace_period_seconds = grace;
        }
        if let Some(batch) = read_env("CLEANER_SCAN_BATCH_SIZE")? {
            self.cleanup.scan_batch_size = batch;
        }
        if let Some(interval) = read_env("CLEANER_SWEEP_INTERVAL_SECONDS")? {
            self.cleanup.sweep_interval_seconds = interval;
        }

        Ok(())
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.service.shutdown_timeout_seconds)
    }
}

/// Validate configuration values
pub fn validate_config(config: &AppConfig) -> Result<()> {
    // Validate log level
    match config.service.log_level.to_lowercase().as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => {}
        _ => return Err(anyhow!("Invalid log level: {}", config.service.log_level)),
    }

    // Validate ports
    if config.service.health_port == 0 {
        return Err(anyhow!("Health port cannot be 0"));
    }

    // Validate timeouts
    if config.service.shutdown_timeout_seconds == 0 {
        return Err(anyhow!("Shutdown timeout must be greater than 0"));
    }

    config.matchmaking.validate()?;
    config.cleanup.validate()?;

    Ok(())
}
