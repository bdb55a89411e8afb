//! # symsync utilities
//!
//! Shared utilities and helpers for symsync.
//!
//! This crate provides the logging setup used by the symsync binaries, built
//! on `tracing`.

pub mod logging;

// Re-export commonly used logging functions for convenience
pub use logging::{init_logging, init_logging_to_dir, init_logging_with_level, LogFormat, LogLevel, LoggingError};
pub use tracing::{debug, error, info, trace, warn};
