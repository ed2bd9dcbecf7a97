//! Reelcut Common Utilities
//!
//! Shared infrastructure for all Reelcut crates:
//! - Error taxonomy and result aliases
//! - Frame timing and timeline drift measurement
//! - Tracing/logging initialization
//! - Engine configuration loading

pub mod config;
pub mod error;
pub mod logging;
pub mod timing;

pub use config::*;
pub use error::*;
pub use timing::*;
