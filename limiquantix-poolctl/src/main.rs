//! # limiquantix Pool Control
//!
//! Loads the on-disk storage pool, network and secret directories through
//! the pool object registry and reports what it finds.
//!
//! ## Usage
//! ```bash
//! limiquantix-poolctl pools --active
//! limiquantix-poolctl --storage-config-dir /srv/pools volumes images
//! limiquantix-poolctl --config /etc/limiquantix/poolctl.yaml check
//! ```

use anyhow::Result;
use clap::Parser;
use tracing::{debug, error, info, warn};

mod cli;
mod commands;
mod config;

use cli::Args;
use config::{Config, DEFAULT_CONFIG_PATH};

/// Resolve the configuration and say where it came from.
fn load_config(args: &Args) -> Result<(Config, String)> {
    match &args.config {
        // Explicit config file must load
        Some(config_path) => {
            let config = Config::load(config_path)?.with_cli_overrides(args);
            Ok((config, config_path.clone()))
        }
        // Try default location, fall back to CLI-only config
        None => match Config::load(DEFAULT_CONFIG_PATH) {
            Ok(config) => Ok((config.with_cli_overrides(args), DEFAULT_CONFIG_PATH.to_string())),
            Err(_) => Ok((
                Config::default().with_cli_overrides(args),
                "defaults".to_string(),
            )),
        },
    }
}

fn main() -> Result<()> {
    // Parse CLI arguments
    let args = Args::parse();

    let (config, source) = load_config(&args)?;

    // Initialize logging
    limiquantix_common::init_logging_with(config.logging.format, &config.logging.level)?;

    debug!(
        version = env!("CARGO_PKG_VERSION"),
        config = %source,
        "Starting limiquantix-poolctl"
    );

    for dir in [
        &config.storage.config_dir,
        &config.networks.config_dir,
        &config.secrets.config_dir,
    ] {
        if !dir.is_dir() {
            warn!(dir = %dir.display(), "Config directory does not exist");
        }
    }

    info!(
        storage = %config.storage.config_dir.display(),
        networks = %config.networks.config_dir.display(),
        secrets = %config.secrets.config_dir.display(),
        "Pool control configured"
    );

    if let Err(e) = commands::run(&args.command, &config) {
        error!(error = %e, "Command failed");
        return Err(e);
    }

    Ok(())
}
