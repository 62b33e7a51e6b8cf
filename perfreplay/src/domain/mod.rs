//! Domain model for perfreplay
//!
//! This module contains core domain types and errors that provide:
//! - Compile-time safety via newtype pattern
//! - Structured error handling

pub mod errors;
pub mod types;

// Re-export common types for convenience
pub use types::{Millis, SpeedFactor};

pub use errors::{CaptureError, ClassifyError, ConfigError, ReplayError, SendError};
