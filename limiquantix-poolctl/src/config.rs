//! Configuration management for the pool control CLI.

use anyhow::{Context, Result};
use limiquantix_common::LogFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::cli::Args;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/limiquantix/poolctl.yaml";

/// Main configuration structure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Storage pool directories
    pub storage: StorageConfig,
    /// Virtual network directories
    pub networks: NetworksConfig,
    /// Secret directories
    pub secrets: SecretsConfig,
    /// Log output
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a YAML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(anyhow::anyhow!("Config file not found: {}", path.display()));
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config =
            serde_yaml::from_str(&content).with_context(|| "Failed to parse config file")?;

        Ok(config)
    }

    /// Apply CLI argument overrides to the configuration.
    pub fn with_cli_overrides(mut self, args: &Args) -> Self {
        if let Some(ref level) = args.log_level {
            self.logging.level = level.clone();
        }

        if args.json_logs {
            self.logging.format = LogFormat::Json;
        }

        if let Some(ref dir) = args.storage_config_dir {
            self.storage.autostart_dir = dir.join("autostart");
            self.storage.config_dir = dir.clone();
        }

        if let Some(ref dir) = args.networks_config_dir {
            self.networks.autostart_dir = dir.join("autostart");
            self.networks.config_dir = dir.clone();
        }

        if let Some(ref dir) = args.secrets_config_dir {
            self.secrets.config_dir = dir.clone();
        }

        self
    }
}

/// Storage pool directories.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Persistent pool configs (`<name>.json`)
    pub config_dir: PathBuf,
    /// Autostart links to pool configs
    pub autostart_dir: PathBuf,
    /// State files of running pools
    pub state_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/etc/limiquantix/storage"),
            autostart_dir: PathBuf::from("/etc/limiquantix/storage/autostart"),
            state_dir: PathBuf::from("/run/limiquantix/storage"),
        }
    }
}

/// Virtual network directories.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworksConfig {
    /// Persistent network configs (`<name>.json`)
    pub config_dir: PathBuf,
    /// Autostart links to network configs
    pub autostart_dir: PathBuf,
    /// Status files of running networks
    pub state_dir: PathBuf,
}

impl Default for NetworksConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/etc/limiquantix/networks"),
            autostart_dir: PathBuf::from("/etc/limiquantix/networks/autostart"),
            state_dir: PathBuf::from("/run/limiquantix/networks"),
        }
    }
}

/// Secret directories.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SecretsConfig {
    /// Secret configs (`<uuid>.json`) and values (`<uuid>.base64`)
    pub config_dir: PathBuf,
}

impl Default for SecretsConfig {
    fn default() -> Self {
        Self {
            config_dir: PathBuf::from("/etc/limiquantix/secrets"),
        }
    }
}

/// Log output configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Level filter, overridden by `RUST_LOG`
    pub level: String,
    /// Line format
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
            format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.storage.config_dir, PathBuf::from("/etc/limiquantix/storage"));
        assert_eq!(config.networks.state_dir, PathBuf::from("/run/limiquantix/networks"));
        assert_eq!(config.secrets.config_dir, PathBuf::from("/etc/limiquantix/secrets"));
        assert_eq!(config.logging.level, "warn");
        assert_eq!(config.logging.format, LogFormat::Pretty);
    }

    #[test]
    fn test_partial_yaml() {
        let yaml = r#"
storage:
  config_dir: /srv/pools
logging:
  level: debug
  format: json
"#;
        let config: Config = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.storage.config_dir, PathBuf::from("/srv/pools"));
        // untouched fields keep their defaults
        assert_eq!(config.storage.state_dir, PathBuf::from("/run/limiquantix/storage"));
        assert_eq!(config.secrets.config_dir, PathBuf::from("/etc/limiquantix/secrets"));
        assert_eq!(config.logging.format, LogFormat::Json);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let err = Config::load(dir.path().join("absent.yaml")).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("poolctl.yaml");
        std::fs::write(&path, "secrets:\n  config_dir: /srv/secrets\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.secrets.config_dir, PathBuf::from("/srv/secrets"));
    }

    #[test]
    fn test_cli_overrides() {
        let args = Args::parse_from([
            "limiquantix-poolctl",
            "--log-level",
            "trace",
            "--json-logs",
            "--storage-config-dir",
            "/srv/pools",
            "--networks-config-dir",
            "/srv/networks",
            "pools",
            "--active",
        ]);
        let config = Config::default().with_cli_overrides(&args);

        assert_eq!(config.logging.level, "trace");
        assert_eq!(config.logging.format, LogFormat::Json);
        assert_eq!(config.storage.config_dir, PathBuf::from("/srv/pools"));
        assert_eq!(config.storage.autostart_dir, PathBuf::from("/srv/pools/autostart"));
        assert_eq!(
            config.networks.autostart_dir,
            PathBuf::from("/srv/networks/autostart")
        );
        assert_eq!(config.secrets.config_dir, PathBuf::from("/etc/limiquantix/secrets"));
    }
}
