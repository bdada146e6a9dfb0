//! Logging initialization using tracing.

use anyhow::{anyhow, Result};
use serde::Deserialize;
use tracing_subscriber::{
    fmt::{self, time::ChronoLocal},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Output format of the log subscriber.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human readable lines with file/line and thread ids
    #[default]
    Pretty,
    /// One JSON object per event, for log aggregation
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow!("Unknown log format: {}", other)),
        }
    }
}

/// Build the level filter. `RUST_LOG` wins over the requested level.
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level))
}

/// Initialize the tracing subscriber with the specified log level.
///
/// # Arguments
/// * `level` - Log level string (trace, debug, info, warn, error)
///
/// # Example
/// ```
/// limiquantix_common::init_logging("info").unwrap();
/// ```
pub fn init_logging(level: &str) -> Result<()> {
    init_logging_with(LogFormat::Pretty, level)
}

/// Initialize logging with JSON output format.
/// Suitable for production environments with log aggregation.
pub fn init_logging_json(level: &str) -> Result<()> {
    init_logging_with(LogFormat::Json, level)
}

/// Initialize logging with an explicit format.
///
/// Returns an error if a global subscriber has already been installed.
pub fn init_logging_with(format: LogFormat, level: &str) -> Result<()> {
    let registry = tracing_subscriber::registry().with(env_filter(level));

    let installed = match format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_timer(ChronoLocal::rfc_3339())
                    .with_target(true)
                    .with_thread_ids(true)
                    .with_file(true)
                    .with_line_number(true),
            )
            .try_init(),
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .json()
                    .with_timer(ChronoLocal::rfc_3339())
                    .with_target(true)
                    .with_thread_ids(true),
            )
            .try_init(),
    };

    installed.map_err(|e| anyhow!("Failed to install log subscriber: {}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_format_parse() {
        assert_eq!("json".parse::<LogFormat>().unwrap(), LogFormat::Json);
        assert_eq!("Pretty".parse::<LogFormat>().unwrap(), LogFormat::Pretty);
        assert!("xml".parse::<LogFormat>().is_err());
    }

    #[test]
    fn test_second_init_is_an_error() {
        // Whichever call wins, the other must report instead of panicking.
        let first = init_logging("debug");
        let second = init_logging_json("debug");
        assert!(first.is_err() || second.is_err());
    }
}
