//! Matching engine
//!
//! One pass groups pending tickets into sessions using the store's parameter
//! indices, relaxing the session size for tickets past their timeout.

pub mod engine;

pub use engine::{MatchingEngine, MatchingEngineStats};
