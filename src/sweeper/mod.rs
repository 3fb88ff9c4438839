//! Expiration sweeper
//!
//! Expired tickets stay readable for a grace period so players can learn
//! their outcome, then the sweeper deletes them.

pub mod cleanup;

pub use cleanup::{ExpirationSweeper, SweeperStats};
