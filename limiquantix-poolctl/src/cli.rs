//! Command-line argument parsing.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// limiquantix Pool Control - inspect on-disk storage pools, networks and secrets
#[derive(Parser, Debug)]
#[command(name = "limiquantix-poolctl")]
#[command(about = "limiquantix Pool Control - inspect on-disk storage pools, networks and secrets")]
#[command(version)]
pub struct Args {
    /// Path to configuration file (optional, defaults used if not found)
    #[arg(short, long)]
    pub config: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, env = "POOLCTL_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Emit JSON log lines instead of human readable ones
    #[arg(long)]
    pub json_logs: bool,

    /// Directory holding storage pool configs
    #[arg(long)]
    pub storage_config_dir: Option<PathBuf>,

    /// Directory holding network configs
    #[arg(long)]
    pub networks_config_dir: Option<PathBuf>,

    /// Directory holding secret configs and values
    #[arg(long)]
    pub secrets_config_dir: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// List storage pools
    Pools {
        /// Only running pools
        #[arg(long, conflicts_with = "inactive")]
        active: bool,

        /// Only stopped pools
        #[arg(long)]
        inactive: bool,
    },

    /// List the volumes of a directory-backed pool
    Volumes {
        /// Pool name
        pool: String,
    },

    /// List virtual networks
    Networks {
        /// Only running networks
        #[arg(long, conflicts_with = "inactive")]
        active: bool,

        /// Only stopped networks
        #[arg(long)]
        inactive: bool,
    },

    /// List secrets
    Secrets,

    /// Load everything and report conflicting definitions
    Check,
}
