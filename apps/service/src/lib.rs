//! Vigil monitoring engine
//!
//! Watches services through periodic health checks and checkins through
//! heartbeat deadlines, records failures, and tells attached notifiers
//! whenever something changes state.

pub mod checkins;
pub mod clock;
pub mod config;
pub mod database;
pub mod engine;
pub mod error;
pub mod failures;
pub mod monitoring;
pub mod notifier;
pub mod validation;

#[cfg(test)]
mod testing;

pub use engine::{Core, CoreOptions};
pub use error::{CoreError, CoreResult};
