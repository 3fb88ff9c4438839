//! Service layer for the matchmaker
//!
//! This module contains the shared application state, the periodic worker
//! runtime and health reporting for the production service.

pub mod app;
pub mod health;

pub use app::{AppState, MatchmakerService, ServiceError};
pub use health::{HealthCheck, HealthStatus};
