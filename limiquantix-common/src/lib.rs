//! # limiquantix Common
//!
//! Shared utilities for the limiquantix components.
//!
//! ## Logging
//!
//! ```rust,no_run
//! use limiquantix_common::{init_logging_with, LogFormat};
//!
//! init_logging_with(LogFormat::Json, "info").unwrap();
//! tracing::info!(pool = "default", "Storage pool loaded");
//! ```

pub mod logging;

// Re-export logging functions
pub use logging::{
    init_logging,
    init_logging_json,
    init_logging_with,
    LogFormat,
};
