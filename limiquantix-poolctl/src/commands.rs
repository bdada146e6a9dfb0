//! Subcommand implementations.
//!
//! Each command loads what it needs from the configured directories into
//! fresh registries, builds plain rows, and prints them.

use std::fs;

use anyhow::{bail, Context, Result};
use limiquantix_poolobj::storage::LockedStoragePool;
use limiquantix_poolobj::{
    ListNetworksFlags, ListSecretsFlags, ListStoragePoolsFlags, NetworkForwardMode, NetworkList,
    SecretList, StoragePoolList, StoragePoolType, StorageVolDef,
};
use tracing::{debug, info, warn};

use crate::cli::Command;
use crate::config::Config;

/// Run one subcommand against the configured directories.
pub fn run(command: &Command, config: &Config) -> Result<()> {
    match command {
        Command::Pools { active, inactive } => {
            let pools = load_pools(config)?;
            let mut flags = ListStoragePoolsFlags::empty();
            if *active {
                flags |= ListStoragePoolsFlags::ACTIVE;
            }
            if *inactive {
                flags |= ListStoragePoolsFlags::INACTIVE;
            }
            print_pools(&pool_rows(&pools, flags));
        }
        Command::Volumes { pool } => {
            let pools = load_pools(config)?;
            print_volumes(&volume_rows(&pools, pool)?);
        }
        Command::Networks { active, inactive } => {
            let networks = load_networks(config)?;
            let mut flags = ListNetworksFlags::empty();
            if *active {
                flags |= ListNetworksFlags::ACTIVE;
            }
            if *inactive {
                flags |= ListNetworksFlags::INACTIVE;
            }
            print_networks(&network_rows(&networks, flags));
        }
        Command::Secrets => {
            let secrets = load_secrets(config)?;
            print_secrets(&secret_rows(&secrets));
        }
        Command::Check => {
            let pools = load_pools(config)?;
            let networks = load_networks(config)?;
            let secrets = load_secrets(config)?;
            let problems = check(&pools, &networks);
            for problem in &problems {
                println!("{}", problem);
            }
            println!(
                "{} pool(s), {} network(s), {} secret(s), {} problem(s)",
                pools.len(),
                networks.len(),
                secrets.len(),
                problems.len()
            );
            if !problems.is_empty() {
                bail!("{} problem(s) found", problems.len());
            }
        }
    }
    Ok(())
}

/// Load pool configs and then the state of running pools.
pub fn load_pools(config: &Config) -> Result<StoragePoolList> {
    let pools = StoragePoolList::new();
    pools
        .load_all_configs(&config.storage.config_dir, &config.storage.autostart_dir)
        .with_context(|| {
            format!(
                "Failed to load pool configs from {}",
                config.storage.config_dir.display()
            )
        })?;
    pools
        .load_all_state(&config.storage.state_dir)
        .with_context(|| {
            format!(
                "Failed to load pool state from {}",
                config.storage.state_dir.display()
            )
        })?;
    Ok(pools)
}

/// Load network configs and status, then drop transient networks that are
/// no longer running.
pub fn load_networks(config: &Config) -> Result<NetworkList> {
    let networks = NetworkList::new();
    networks
        .load_all_configs(&config.networks.config_dir, &config.networks.autostart_dir)
        .with_context(|| {
            format!(
                "Failed to load network configs from {}",
                config.networks.config_dir.display()
            )
        })?;
    networks
        .load_all_state(&config.networks.state_dir)
        .with_context(|| {
            format!(
                "Failed to load network state from {}",
                config.networks.state_dir.display()
            )
        })?;

    let pruned = networks.prune(ListNetworksFlags::INACTIVE | ListNetworksFlags::TRANSIENT);
    if pruned > 0 {
        debug!(pruned, "Dropped stale transient networks");
    }
    Ok(networks)
}

pub fn load_secrets(config: &Config) -> Result<SecretList> {
    let secrets = SecretList::new();
    secrets
        .load_all_configs(&config.secrets.config_dir)
        .with_context(|| {
            format!(
                "Failed to load secrets from {}",
                config.secrets.config_dir.display()
            )
        })?;
    Ok(secrets)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolRow {
    pub name: String,
    pub pool_type: StoragePoolType,
    pub active: bool,
    pub autostart: bool,
    pub persistent: bool,
    pub target: String,
}

pub fn pool_rows(pools: &StoragePoolList, flags: ListStoragePoolsFlags) -> Vec<PoolRow> {
    let mut rows: Vec<_> = pools
        .export(&(), None, flags)
        .into_iter()
        .filter_map(|handle| {
            let pool = pools.find_by_uuid(&handle.uuid)?;
            Some(PoolRow {
                name: pool.def().name.clone(),
                pool_type: pool.def().pool_type,
                active: pool.is_active(),
                autostart: pool.is_autostart(),
                persistent: pool.is_persistent(),
                target: pool.def().target.path.clone(),
            })
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

fn print_pools(rows: &[PoolRow]) {
    println!(
        "{:<20} {:<10} {:<9} {:<10} {:<11} {}",
        "Name", "Type", "State", "Autostart", "Persistent", "Target"
    );
    for row in rows {
        println!(
            "{:<20} {:<10} {:<9} {:<10} {:<11} {}",
            row.name,
            row.pool_type.to_string(),
            if row.active { "active" } else { "inactive" },
            yes_no(row.autostart),
            yes_no(row.persistent),
            row.target
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRow {
    pub name: String,
    pub path: String,
    pub capacity: u64,
}

/// Scan the target directory of a file-backed pool into its volume table.
fn refresh_volumes(pool: &LockedStoragePool) -> Result<usize> {
    let pool_type = pool.def().pool_type;
    if !matches!(
        pool_type,
        StoragePoolType::Dir | StoragePoolType::Fs | StoragePoolType::Netfs
    ) {
        bail!("Volume listing is not supported for {} pools", pool_type);
    }

    let target = pool.def().target.path.clone();
    let cleared = pool.clear_volumes();
    debug!(pool = %pool.name(), cleared, target = %target, "Refreshing volumes");

    let entries =
        fs::read_dir(&target).with_context(|| format!("Failed to read pool target {}", target))?;
    let mut added = 0;
    for entry in entries {
        let entry = entry.with_context(|| format!("Failed to read pool target {}", target))?;
        let metadata = match entry.metadata() {
            Ok(metadata) if metadata.is_file() => metadata,
            Ok(_) => continue,
            Err(e) => {
                warn!(path = %entry.path().display(), error = %e, "Skipping unreadable volume");
                continue;
            }
        };

        let path = entry.path().to_string_lossy().into_owned();
        let mut def = StorageVolDef::new(entry.file_name().to_string_lossy(), &path, &path);
        def.capacity = metadata.len();
        def.allocation = metadata.len();
        pool.add_volume(def)?;
        added += 1;
    }

    info!(pool = %pool.name(), volumes = added, "Pool refreshed");
    Ok(added)
}

pub fn volume_rows(pools: &StoragePoolList, pool_name: &str) -> Result<Vec<VolumeRow>> {
    let Some(pool) = pools.find_by_name(pool_name) else {
        bail!("Storage pool not found: {}", pool_name);
    };
    refresh_volumes(&pool)?;

    let names = pool.list_volumes(&(), None, usize::MAX)?;
    let mut rows: Vec<_> = names
        .iter()
        .filter_map(|name| {
            let vol = pool.find_volume_by_name(name)?;
            Some(VolumeRow {
                name: vol.def().name.clone(),
                path: vol.def().target_path.clone(),
                capacity: vol.def().capacity,
            })
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(rows)
}

fn print_volumes(rows: &[VolumeRow]) {
    println!("{:<30} {:>14} {}", "Name", "Capacity", "Path");
    for row in rows {
        println!("{:<30} {:>14} {}", row.name, row.capacity, row.path);
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkRow {
    pub name: String,
    pub bridge: String,
    pub forward: NetworkForwardMode,
    pub active: bool,
    pub autostart: bool,
    pub persistent: bool,
}

pub fn network_rows(networks: &NetworkList, flags: ListNetworksFlags) -> Vec<NetworkRow> {
    let mut rows: Vec<_> = networks
        .export(&(), None, flags)
        .into_iter()
        .filter_map(|handle| {
            let network = networks.find_by_uuid(&handle.uuid)?;
            Some(NetworkRow {
                name: network.def().name.clone(),
                bridge: network.def().bridge.clone().unwrap_or_default(),
                forward: network.def().forward,
                active: network.is_active(),
                autostart: network.is_autostart(),
                persistent: network.is_persistent(),
            })
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));
    rows
}

fn print_networks(rows: &[NetworkRow]) {
    println!(
        "{:<20} {:<16} {:<12} {:<9} {:<10} {}",
        "Name", "Bridge", "Forward", "State", "Autostart", "Persistent"
    );
    for row in rows {
        println!(
            "{:<20} {:<16} {:<12} {:<9} {:<10} {}",
            row.name,
            row.bridge,
            format!("{:?}", row.forward).to_lowercase(),
            if row.active { "active" } else { "inactive" },
            yes_no(row.autostart),
            yes_no(row.persistent)
        );
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SecretRow {
    pub uuid: String,
    pub usage: String,
    pub ephemeral: bool,
    pub private: bool,
    pub has_value: bool,
}

pub fn secret_rows(secrets: &SecretList) -> Vec<SecretRow> {
    let mut rows: Vec<_> = secrets
        .export(&(), None, ListSecretsFlags::empty())
        .into_iter()
        .filter_map(|handle| {
            let secret = secrets.find_by_uuid(&handle.uuid)?;
            let has_value = secret
                .secret_private()
                .is_ok_and(|private| private.value().is_some());
            Some(SecretRow {
                uuid: handle.uuid.to_string(),
                usage: handle.usage.key().unwrap_or_else(|| "none".to_string()),
                ephemeral: secret.def().ephemeral,
                private: secret.def().private,
                has_value,
            })
        })
        .collect();
    rows.sort_by(|a, b| a.usage.cmp(&b.usage));
    rows
}

fn print_secrets(rows: &[SecretRow]) {
    println!(
        "{:<36}  {:<40} {:<9} {:<7} {}",
        "UUID", "Usage", "Ephemeral", "Private", "Value"
    );
    for row in rows {
        println!(
            "{:<36}  {:<40} {:<9} {:<7} {}",
            row.uuid,
            row.usage,
            yes_no(row.ephemeral),
            yes_no(row.private),
            yes_no(row.has_value)
        );
    }
}

/// Every pool whose storage is already claimed by another pool, and every
/// network whose bridge another network also uses.
pub fn check(pools: &StoragePoolList, networks: &NetworkList) -> Vec<String> {
    let mut defs: Vec<_> = pools
        .export(&(), None, ListStoragePoolsFlags::empty())
        .into_iter()
        .filter_map(|handle| pools.find_by_uuid(&handle.uuid).map(|pool| pool.def().clone()))
        .collect();
    defs.sort_by(|a, b| a.name.cmp(&b.name));

    let mut problems: Vec<String> = defs
        .iter()
        .filter_map(|def| {
            pools
                .find_duplicate_source(def)
                .err()
                .map(|e| format!("pool '{}': {}", def.name, e))
        })
        .collect();

    // names and bridges first: bridge_in_use must not run under a network lock
    let mut bridges: Vec<(String, String)> = networks
        .export(&(), None, ListNetworksFlags::empty())
        .into_iter()
        .filter_map(|handle| {
            let network = networks.find_by_uuid(&handle.uuid)?;
            let bridge = network.def().bridge.clone()?;
            Some((handle.name, bridge))
        })
        .collect();
    bridges.sort();

    problems.extend(
        bridges
            .into_iter()
            .filter(|(name, bridge)| networks.bridge_in_use(bridge, Some(name.as_str())))
            .map(|(name, bridge)| {
                format!("network '{}': bridge '{}' is used by another network", name, bridge)
            }),
    );
    problems
}

#[cfg(test)]
mod tests {
    use super::*;
    use limiquantix_poolobj::{NetworkAddFlags, NetworkDef, SecretDef, SecretUsage, StoragePoolDef};
    use std::path::Path;
    use tempfile::TempDir;
    use uuid::Uuid;

    fn config_in(dir: &Path) -> Config {
        let mut config = Config::default();
        config.storage.config_dir = dir.join("storage");
        config.storage.autostart_dir = dir.join("storage/autostart");
        config.storage.state_dir = dir.join("run");
        config.secrets.config_dir = dir.join("secrets");
        config.networks.config_dir = dir.join("networks");
        config.networks.autostart_dir = dir.join("networks/autostart");
        config.networks.state_dir = dir.join("run-networks");
        config
    }

    fn nat(name: &str, bridge: &str) -> NetworkDef {
        NetworkDef::new(Uuid::new_v4(), name)
            .with_bridge(bridge)
            .with_forward(NetworkForwardMode::Nat)
    }

    fn define_pool(config: &Config, def: StoragePoolDef, autostart: bool) {
        let list = StoragePoolList::new();
        let mut pool = list.add(def).unwrap();
        pool.save_def(&config.storage.config_dir, &config.storage.autostart_dir)
            .unwrap();
        if autostart {
            pool.set_autostart_link(true).unwrap();
        }
    }

    #[test]
    fn test_pool_rows_and_filters() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let images = dir.path().join("images");
        fs::create_dir_all(&images).unwrap();

        define_pool(
            &config,
            StoragePoolDef::new(Uuid::new_v4(), "images", StoragePoolType::Dir)
                .with_target(images.to_string_lossy()),
            true,
        );
        let iso = StoragePoolDef::new(Uuid::new_v4(), "iso", StoragePoolType::Dir)
            .with_target("/srv/iso");
        define_pool(&config, iso.clone(), false);

        // iso is running
        let list = StoragePoolList::new();
        list.add(iso).unwrap().save_state(&config.storage.state_dir).unwrap();

        let pools = load_pools(&config).unwrap();
        let rows = pool_rows(&pools, ListStoragePoolsFlags::empty());
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "images");
        assert!(rows[0].autostart && rows[0].persistent && !rows[0].active);
        assert!(rows[1].active);

        let active = pool_rows(&pools, ListStoragePoolsFlags::ACTIVE);
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].name, "iso");
    }

    #[test]
    fn test_volume_rows_scan_target() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        let images = dir.path().join("images");
        fs::create_dir_all(images.join("subdir")).unwrap();
        fs::write(images.join("disk0.qcow2"), vec![0u8; 1024]).unwrap();
        fs::write(images.join("seed.iso"), b"iso").unwrap();

        define_pool(
            &config,
            StoragePoolDef::new(Uuid::new_v4(), "images", StoragePoolType::Dir)
                .with_target(images.to_string_lossy()),
            false,
        );

        let pools = load_pools(&config).unwrap();
        let rows = volume_rows(&pools, "images").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].name, "disk0.qcow2");
        assert_eq!(rows[0].capacity, 1024);

        assert!(volume_rows(&pools, "missing").is_err());
    }

    #[test]
    fn test_volume_rows_reject_unsupported_type() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        define_pool(
            &config,
            StoragePoolDef::new(Uuid::new_v4(), "ceph", StoragePoolType::Rbd),
            false,
        );

        let pools = load_pools(&config).unwrap();
        let err = volume_rows(&pools, "ceph").unwrap_err();
        assert!(err.to_string().contains("not supported for rbd pools"));
    }

    #[test]
    fn test_check_reports_source_conflicts() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        for name in ["a", "b"] {
            define_pool(
                &config,
                StoragePoolDef::new(Uuid::new_v4(), name, StoragePoolType::Dir)
                    .with_target("/var/lib/images"),
                false,
            );
        }
        define_pool(
            &config,
            StoragePoolDef::new(Uuid::new_v4(), "c", StoragePoolType::Dir).with_target("/srv/c"),
            false,
        );

        let pools = load_pools(&config).unwrap();
        let networks = load_networks(&config).unwrap();
        let problems = check(&pools, &networks);
        assert_eq!(problems.len(), 2);
        assert!(problems[0].starts_with("pool 'a'"));
        assert!(problems[0].contains("Storage source conflict with pool: 'b'"));
    }

    #[test]
    fn test_check_reports_shared_bridges() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());

        let list = NetworkList::new();
        for def in [nat("default", "virbr0"), nat("lab", "virbr0"), nat("dmz", "virbr1")] {
            list.add(def, NetworkAddFlags::empty())
                .unwrap()
                .save_config(&config.networks.config_dir)
                .unwrap();
        }

        let pools = load_pools(&config).unwrap();
        let networks = load_networks(&config).unwrap();
        let problems = check(&pools, &networks);
        assert_eq!(
            problems,
            vec![
                "network 'default': bridge 'virbr0' is used by another network".to_string(),
                "network 'lab': bridge 'virbr0' is used by another network".to_string(),
            ]
        );
    }

    #[test]
    fn test_network_rows_after_load() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());

        let default_def = nat("default", "virbr0");
        let list = NetworkList::new();
        let mut default = list.add(default_def.clone(), NetworkAddFlags::empty()).unwrap();
        default.save_config(&config.networks.config_dir).unwrap();
        default
            .set_autostart_link(&config.networks.config_dir, &config.networks.autostart_dir, true)
            .unwrap();
        drop(default);
        list.add(nat("isolated", "virbr1"), NetworkAddFlags::empty())
            .unwrap()
            .save_config(&config.networks.config_dir)
            .unwrap();

        // default and a transient network are running
        let running = NetworkList::new();
        for def in [default_def, nat("scratch", "virbr2")] {
            running
                .add(def, NetworkAddFlags::LIVE)
                .unwrap()
                .save_status(&config.networks.state_dir)
                .unwrap();
        }

        let networks = load_networks(&config).unwrap();
        let rows = network_rows(&networks, ListNetworksFlags::empty());
        let names: Vec<_> = rows.iter().map(|row| row.name.as_str()).collect();
        assert_eq!(names, vec!["default", "isolated", "scratch"]);

        assert!(rows[0].active && rows[0].autostart && rows[0].persistent);
        assert_eq!(rows[0].bridge, "virbr0");
        assert_eq!(rows[0].forward, NetworkForwardMode::Nat);
        assert!(!rows[1].active && rows[1].persistent);
        assert!(rows[2].active && !rows[2].persistent);

        let inactive = network_rows(&networks, ListNetworksFlags::INACTIVE);
        assert_eq!(inactive.len(), 1);
        assert_eq!(inactive[0].name, "isolated");
    }

    #[test]
    fn test_secret_rows() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());

        let list = SecretList::new();
        let mut with_value = list
            .add(
                SecretDef::new(
                    Uuid::new_v4(),
                    SecretUsage::Ceph {
                        name: "client.admin".to_string(),
                    },
                ),
                &config.secrets.config_dir,
                None,
            )
            .unwrap();
        with_value.save_config().unwrap();
        with_value.set_value(b"key").unwrap();
        drop(with_value);

        let bare = list
            .add(
                SecretDef::new(Uuid::new_v4(), SecretUsage::None),
                &config.secrets.config_dir,
                None,
            )
            .unwrap();
        bare.save_config().unwrap();
        drop(bare);

        let secrets = load_secrets(&config).unwrap();
        let rows = secret_rows(&secrets);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].usage, "ceph:client.admin");
        assert!(rows[0].has_value);
        assert_eq!(rows[1].usage, "none");
        assert!(!rows[1].has_value);
    }

    #[test]
    fn test_missing_directories_load_empty() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path());
        assert!(!config.storage.config_dir.is_dir());
        assert!(load_pools(&config).unwrap().is_empty());
        assert!(load_secrets(&config).unwrap().is_empty());
        assert!(load_networks(&config).unwrap().is_empty());
    }
}
