//! Configuration management for the matchmaker
//!
//! This module handles configuration loading from TOML files and environment
//! variables, validation, and default values for the matchmaker workers.

pub mod app;

// Re-export commonly used types
pub use app::{validate_config, AppConfig, CleanupSettings, MatchmakingSettings, ServiceSettings};
