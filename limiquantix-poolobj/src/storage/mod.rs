//! Storage pool registry.
//!
//! Pools are kept in a dual-keyed [`PoolObjTable`]. Each pool carries a
//! [`StoragePoolPrivate`] sidecar with its config paths, async job count and
//! a nested name-only table of volumes (see [`volume`]).
//!
//! ```text
//! ┌──────────────────────── StoragePoolList ────────────────────────┐
//! │  PoolObjTable<StoragePoolDef, StoragePoolPrivate> (uuid + name) │
//! └──────────────────────────────┬──────────────────────────────────┘
//!                                │ per pool
//!                                ▼
//!                    StoragePoolPrivate
//!                      config_file / autostart_link
//!                      volumes: PoolObjTable<StorageVolDef> (name)
//! ```

mod types;
pub mod volume;

pub use types::*;
pub use volume::{LockedStorageVol, VolumeAclFilterFn};

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{PoolObjError, Result};
use crate::object::{LockedPoolObj, PoolObj};
use crate::persist;
use crate::table::{AclFilterFn, AssignDefFn, MatchFilterFn, PoolObjTable};
use crate::types::{flag_group_allows, PoolObjEntry, PoolObjTableType, VOLUME_HASH_START};

/// A storage pool object.
pub type StoragePoolObj = PoolObj<StoragePoolDef, StoragePoolPrivate>;

/// A locked, referenced storage pool.
pub type LockedStoragePool = LockedPoolObj<StoragePoolDef, StoragePoolPrivate>;

/// Per-pool driver state.
#[derive(Debug)]
pub struct StoragePoolPrivate {
    config_file: Option<PathBuf>,
    autostart_link: Option<PathBuf>,
    async_jobs: u32,
    volumes: PoolObjTable<StorageVolDef>,
}

impl StoragePoolPrivate {
    pub fn new() -> Self {
        Self {
            config_file: None,
            autostart_link: None,
            async_jobs: 0,
            volumes: PoolObjTable::new(PoolObjTableType::Volume, VOLUME_HASH_START, true),
        }
    }

    /// Persistent config path; `None` for transient pools.
    pub fn config_file(&self) -> Option<&Path> {
        self.config_file.as_deref()
    }

    pub fn autostart_link(&self) -> Option<&Path> {
        self.autostart_link.as_deref()
    }

    /// Number of in-flight volume build/wipe jobs.
    pub fn async_jobs(&self) -> u32 {
        self.async_jobs
    }

    pub fn incr_async_jobs(&mut self) {
        self.async_jobs += 1;
    }

    pub fn decr_async_jobs(&mut self) {
        self.async_jobs = self.async_jobs.saturating_sub(1);
    }

    pub fn volumes(&self) -> &PoolObjTable<StorageVolDef> {
        &self.volumes
    }
}

impl Default for StoragePoolPrivate {
    fn default() -> Self {
        Self::new()
    }
}

/// New definitions replace the current one of an inactive pool and are
/// staged for an active one.
fn assign_pool_def(
    obj: &mut StoragePoolObj,
    def: StoragePoolDef,
    _old_def: Option<&mut Option<StoragePoolDef>>,
    _flags: u32,
) -> Result<()> {
    if obj.is_being_removed() {
        return Err(PoolObjError::OperationInvalid(format!(
            "storage pool '{}' is being removed",
            obj.name()
        )));
    }
    if obj.is_active() {
        obj.set_new_def(Some(def));
    } else {
        obj.set_def(def);
    }
    Ok(())
}

fn pool_matches(obj: &StoragePoolObj, flags: u32) -> bool {
    let flags = ListStoragePoolsFlags::from_bits_truncate(flags);
    let persistent = obj
        .private_data()
        .is_some_and(|p| p.config_file.is_some());

    if !flag_group_allows(
        flags,
        ListStoragePoolsFlags::ACTIVE,
        ListStoragePoolsFlags::INACTIVE,
        obj.is_active(),
    ) {
        return false;
    }
    if !flag_group_allows(
        flags,
        ListStoragePoolsFlags::PERSISTENT,
        ListStoragePoolsFlags::TRANSIENT,
        persistent,
    ) {
        return false;
    }
    if !flag_group_allows(
        flags,
        ListStoragePoolsFlags::AUTOSTART,
        ListStoragePoolsFlags::NO_AUTOSTART,
        obj.is_autostart(),
    ) {
        return false;
    }

    let types = flags & ListStoragePoolsFlags::FILTERS_POOL_TYPE;
    types.is_empty() || types.contains(obj.def().pool_type.list_flag())
}

fn single_host_matches(pool: &StoragePoolSource, def: &StoragePoolSource) -> bool {
    if pool.hosts.len() != 1 && def.hosts.len() != 1 {
        return false;
    }
    let (Some(pool_host), Some(def_host)) = (pool.hosts.first(), def.hosts.first()) else {
        return false;
    };
    if def_host.port.is_some() && pool_host.port != def_host.port {
        return false;
    }
    pool_host.name == def_host.name
}

fn shares_device(pool: &StoragePoolSource, def: &StoragePoolSource) -> bool {
    pool.devices.iter().any(|dev| def.devices.contains(dev))
}

fn adapter_host_number(adapter: &SourceAdapter) -> Option<u32> {
    match adapter {
        SourceAdapter::ScsiHost { name, .. } => name.as_deref().and_then(scsi_host_number),
        SourceAdapter::FcHost { .. } => None,
    }
}

/// A vHBA conflicts with a scsi_host pool when its declared parent is that
/// very host.
fn fc_parent_is_host(fc: &SourceAdapter, scsi_hostnum: u32) -> bool {
    match fc {
        SourceAdapter::FcHost {
            parent: Some(parent),
            ..
        } => scsi_host_number(parent) == Some(scsi_hostnum),
        _ => false,
    }
}

fn adapters_conflict(pool: &SourceAdapter, def: &SourceAdapter) -> bool {
    match (pool, def) {
        (
            SourceAdapter::FcHost { wwnn, wwpn, .. },
            SourceAdapter::FcHost {
                wwnn: def_wwnn,
                wwpn: def_wwpn,
                ..
            },
        ) => wwnn == def_wwnn && wwpn == def_wwpn,
        (
            SourceAdapter::ScsiHost {
                parent_addr: Some(addr),
                unique_id,
                ..
            },
            SourceAdapter::ScsiHost {
                parent_addr: Some(def_addr),
                unique_id: def_unique_id,
                ..
            },
        ) if addr == def_addr && unique_id == def_unique_id => true,
        (SourceAdapter::ScsiHost { .. }, SourceAdapter::ScsiHost { .. }) => {
            match (adapter_host_number(pool), adapter_host_number(def)) {
                (Some(a), Some(b)) => a == b,
                _ => false,
            }
        }
        (SourceAdapter::FcHost { .. }, SourceAdapter::ScsiHost { .. }) => {
            adapter_host_number(def).is_some_and(|num| fc_parent_is_host(pool, num))
        }
        (SourceAdapter::ScsiHost { .. }, SourceAdapter::FcHost { .. }) => {
            adapter_host_number(pool).is_some_and(|num| fc_parent_is_host(def, num))
        }
    }
}

/// Whether `existing` already uses the storage `def` wants.
fn source_conflicts(existing: &StoragePoolDef, def: &StoragePoolDef) -> bool {
    if existing.pool_type != def.pool_type || existing.name == def.name {
        return false;
    }

    let (src, new) = (&existing.source, &def.source);
    match def.pool_type {
        StoragePoolType::Dir => existing.target.path == def.target.path,
        StoragePoolType::Gluster => {
            src.name == new.name && src.dir == new.dir && single_host_matches(src, new)
        }
        StoragePoolType::Netfs => src.dir == new.dir && single_host_matches(src, new),
        StoragePoolType::Scsi => match (&src.adapter, &new.adapter) {
            (Some(a), Some(b)) => adapters_conflict(a, b),
            _ => false,
        },
        // The iSCSI host name is deliberately not compared.
        StoragePoolType::Iscsi => shares_device(src, new) && src.initiator_iqn == new.initiator_iqn,
        StoragePoolType::Fs
        | StoragePoolType::Logical
        | StoragePoolType::Disk
        | StoragePoolType::Zfs => shares_device(src, new),
        StoragePoolType::Sheepdog => single_host_matches(src, new),
        // Only one mpath pool per host.
        StoragePoolType::Mpath => true,
        StoragePoolType::Vstorage => src.name == new.name,
        StoragePoolType::Rbd => false,
    }
}

/// The host's storage pools.
#[derive(Debug)]
pub struct StoragePoolList {
    pools: PoolObjTable<StoragePoolDef, StoragePoolPrivate>,
}

impl StoragePoolList {
    pub fn new() -> Self {
        Self {
            pools: PoolObjTable::with_default_size(PoolObjTableType::BlockStorage, false),
        }
    }

    /// The underlying table, for generic traversal.
    pub fn table(&self) -> &PoolObjTable<StoragePoolDef, StoragePoolPrivate> {
        &self.pools
    }

    pub fn len(&self) -> usize {
        self.pools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pools.is_empty()
    }

    /// Define a pool or redefine an existing one.
    ///
    /// An active pool keeps running its current definition; the new one is
    /// staged until the pool stops.
    #[instrument(skip(self, def), fields(pool = %def.name, uuid = %def.uuid))]
    pub fn add(&self, def: StoragePoolDef) -> Result<LockedStoragePool> {
        let uuid = def.uuid;
        let entry = PoolObjEntry::new(def.name.clone(), def).with_uuid(uuid);
        let assign: &AssignDefFn<StoragePoolDef, StoragePoolPrivate> = &assign_pool_def;

        let mut obj = self.pools.add(entry, Some(assign), None, 0)?;
        if obj.private_data().is_none() {
            obj.set_private_data(StoragePoolPrivate::new());
        }
        Ok(obj)
    }

    /// Check `def` against existing pools.
    ///
    /// Returns `Ok(true)` when it redefines an existing pool, `Ok(false)`
    /// when it is new, and an error when its identity clashes with another
    /// pool or, with `check_active`, the pool is running.
    pub fn is_duplicate(&self, def: &StoragePoolDef, check_active: bool) -> Result<bool> {
        if let Some(obj) = self.pools.find_by_uuid_ref(&def.uuid) {
            if obj.def().name != def.name {
                return Err(PoolObjError::OperationFailed(format!(
                    "pool '{}' is already defined with uuid {}",
                    obj.def().name,
                    obj.def().uuid
                )));
            }
            if check_active && obj.is_active() {
                return Err(PoolObjError::OperationInvalid(format!(
                    "pool is already active as '{}'",
                    obj.def().name
                )));
            }
            return Ok(true);
        }

        if let Some(obj) = self.pools.find_by_name(&def.name) {
            return Err(PoolObjError::OperationFailed(format!(
                "pool '{}' already exists with uuid {}",
                obj.def().name,
                obj.def().uuid
            )));
        }

        Ok(false)
    }

    /// Fail if another pool of the same type already uses the storage that
    /// `def` describes.
    pub fn find_duplicate_source(&self, def: &StoragePoolDef) -> Result<()> {
        match self
            .pools
            .search_ref(&|obj| source_conflicts(obj.def(), def))
        {
            Some(obj) => Err(PoolObjError::OperationFailed(format!(
                "Storage source conflict with pool: '{}'",
                obj.def().name
            ))),
            None => Ok(()),
        }
    }

    pub fn find_by_uuid(&self, uuid: &Uuid) -> Option<LockedStoragePool> {
        self.pools.find_by_uuid(uuid)
    }

    pub fn find_by_name(&self, name: &str) -> Option<LockedStoragePool> {
        self.pools.find_by_name(name)
    }

    pub fn remove(&self, obj: LockedStoragePool) {
        self.pools.remove(obj);
    }

    /// Count active (or inactive) pools visible through `acl`.
    pub fn num_of_pools<C: ?Sized>(
        &self,
        conn: &C,
        want_active: bool,
        acl: Option<&AclFilterFn<C, StoragePoolDef>>,
    ) -> usize {
        let mut count = 0;
        let listed = self.pools.list(conn, acl, |obj| {
            if obj.is_active() == want_active {
                count += 1;
            }
            Ok(())
        });
        listed.map(|_| count).unwrap_or(0)
    }

    /// Names of active (or inactive) pools visible through `acl`, at most
    /// `max` of them.
    pub fn get_names<C: ?Sized>(
        &self,
        conn: &C,
        want_active: bool,
        acl: Option<&AclFilterFn<C, StoragePoolDef>>,
        max: usize,
    ) -> Result<Vec<String>> {
        let mut names = Vec::new();
        self.pools.list(conn, acl, |obj| {
            if names.len() < max && obj.is_active() == want_active {
                names.push(obj.def().name.clone());
            }
            Ok(())
        })?;
        Ok(names)
    }

    /// Handles for every pool visible through `acl` and passing `flags`.
    pub fn export<C: ?Sized>(
        &self,
        conn: &C,
        acl: Option<&AclFilterFn<C, StoragePoolDef>>,
        flags: ListStoragePoolsFlags,
    ) -> Vec<PoolHandle> {
        let matchf: &MatchFilterFn<StoragePoolDef, StoragePoolPrivate> = &pool_matches;
        self.pools
            .collect(conn, acl, Some(matchf), flags.bits())
            .iter()
            .map(|shared| {
                let obj = shared.lock();
                PoolHandle {
                    name: obj.def().name.clone(),
                    uuid: obj.def().uuid,
                }
            })
            .collect()
    }

    /// Load every `<name>.json` pool config under `config_dir`.
    ///
    /// Files that fail to parse, or whose name does not match the pool they
    /// define, are logged and skipped. Returns the number of pools loaded.
    #[instrument(skip(self))]
    pub fn load_all_configs(&self, config_dir: &Path, autostart_dir: &Path) -> Result<usize> {
        let mut loaded = 0;

        for config_file in persist::list_files(config_dir, persist::JSON_EXT)? {
            let def: StoragePoolDef = match persist::read_json(&config_file) {
                Ok(def) => def,
                Err(e) => {
                    warn!(file = %config_file.display(), error = %e, "Skipping unreadable pool config");
                    continue;
                }
            };

            if persist::file_stem(&config_file) != Some(def.name.as_str()) {
                warn!(
                    file = %config_file.display(),
                    pool = %def.name,
                    "Storage pool config filename does not match pool name"
                );
                continue;
            }

            let mut obj = match self.add(def) {
                Ok(obj) => obj,
                Err(e) => {
                    warn!(file = %config_file.display(), error = %e, "Failed to load pool config");
                    continue;
                }
            };

            let autostart_link = config_file
                .file_name()
                .map(|file_name| autostart_dir.join(file_name));
            let autostart = autostart_link
                .as_deref()
                .is_some_and(|link| persist::link_points_to(link, &config_file));

            if let Some(private) = obj.private_data_mut() {
                private.config_file = Some(config_file);
                private.autostart_link = autostart_link;
            }
            obj.set_persistent(true);
            obj.set_autostart(autostart);

            debug!(pool = %obj.name(), autostart, "Loaded pool config");
            loaded += 1;
        }

        info!(count = loaded, "Storage pool configs loaded");
        Ok(loaded)
    }

    /// Load pool state files from `state_dir`, marking each pool active.
    #[instrument(skip(self))]
    pub fn load_all_state(&self, state_dir: &Path) -> Result<usize> {
        let mut loaded = 0;

        for state_file in persist::list_files(state_dir, persist::JSON_EXT)? {
            let def: StoragePoolDef = match persist::read_json(&state_file) {
                Ok(def) => def,
                Err(e) => {
                    warn!(file = %state_file.display(), error = %e, "Skipping unreadable pool state");
                    continue;
                }
            };

            if persist::file_stem(&state_file) != Some(def.name.as_str()) {
                warn!(
                    file = %state_file.display(),
                    pool = %def.name,
                    "Storage pool state file does not match pool name"
                );
                continue;
            }

            match self.add(def) {
                Ok(mut obj) => {
                    obj.set_active(true);
                    loaded += 1;
                }
                Err(e) => warn!(file = %state_file.display(), error = %e, "Failed to load pool state"),
            }
        }

        info!(count = loaded, "Storage pool state loaded");
        Ok(loaded)
    }
}

impl Default for StoragePoolList {
    fn default() -> Self {
        Self::new()
    }
}

fn missing_private(name: &str) -> PoolObjError {
    PoolObjError::Internal(format!("storage pool '{}' has no private data", name))
}

impl PoolObj<StoragePoolDef, StoragePoolPrivate> {
    /// The pool's sidecar; attached by [`StoragePoolList::add`].
    pub fn pool_private(&self) -> Result<&StoragePoolPrivate> {
        self.private_data().ok_or_else(|| missing_private(self.name()))
    }

    fn pool_private_mut(&mut self) -> Result<&mut StoragePoolPrivate> {
        let name = self.name().to_string();
        self.private_data_mut().ok_or_else(|| missing_private(&name))
    }

    /// Write the pool config (the staged definition if there is one) to
    /// `<config_dir>/<name>.json`, making the pool persistent.
    #[instrument(skip(self), fields(pool = %self.name()))]
    pub fn save_def(&mut self, config_dir: &Path, autostart_dir: &Path) -> Result<()> {
        let name = self.name().to_string();
        let private = self.pool_private_mut()?;
        let config_file = match &private.config_file {
            Some(path) => path.clone(),
            None => {
                let path = persist::build_path(config_dir, &name, persist::JSON_EXT);
                private.config_file = Some(path.clone());
                private.autostart_link =
                    Some(persist::build_path(autostart_dir, &name, persist::JSON_EXT));
                path
            }
        };

        let def = self.new_def().unwrap_or(self.def());
        persist::write_json(&config_file, def, persist::PUBLIC_MODE)?;
        self.set_persistent(true);

        info!(file = %config_file.display(), "Saved storage pool config");
        Ok(())
    }

    /// Delete the pool config and its autostart link, making the pool
    /// transient.
    #[instrument(skip(self), fields(pool = %self.name()))]
    pub fn delete_def(&mut self) -> Result<()> {
        let name = self.name().to_string();
        let private = self.pool_private_mut()?;
        let config_file = private
            .config_file
            .take()
            .ok_or_else(|| PoolObjError::Internal(format!("no config file for {}", name)))?;

        if let Err(e) = fs::remove_file(&config_file) {
            private.config_file = Some(config_file.clone());
            return Err(PoolObjError::io(&config_file, e));
        }
        if let Some(link) = private.autostart_link.take() {
            persist::remove_file(&link)?;
        }

        self.set_persistent(false);
        self.set_autostart(false);
        info!(file = %config_file.display(), "Deleted storage pool config");
        Ok(())
    }

    /// Create or remove the autostart symlink pointing at the config file.
    #[instrument(skip(self), fields(pool = %self.name()))]
    pub fn set_autostart_link(&mut self, autostart: bool) -> Result<()> {
        let name = self.name().to_string();
        let private = self.pool_private()?;
        let (Some(config_file), Some(link)) = (
            private.config_file.clone(),
            private.autostart_link.clone(),
        ) else {
            return Err(PoolObjError::OperationInvalid(format!(
                "cannot set autostart for transient storage pool '{}'",
                name
            )));
        };

        if autostart {
            if !persist::link_points_to(&link, &config_file) {
                if let Some(dir) = link.parent() {
                    fs::create_dir_all(dir).map_err(|e| PoolObjError::io(dir, e))?;
                }
                persist::remove_file(&link)?;
                persist::symlink(&config_file, &link).map_err(|e| PoolObjError::io(&link, e))?;
            }
        } else {
            persist::remove_file(&link)?;
        }

        self.set_autostart(autostart);
        debug!(autostart, link = %link.display(), "Updated autostart link");
        Ok(())
    }

    /// Mark the pool for removal so redefinitions are refused until it is
    /// gone. Fails while asynchronous jobs still use the pool.
    pub fn begin_removal(&mut self) -> Result<()> {
        let jobs = self.pool_private()?.async_jobs();
        if jobs > 0 {
            return Err(PoolObjError::OperationInvalid(format!(
                "storage pool '{}' has {} asynchronous jobs running",
                self.name(),
                jobs
            )));
        }
        self.set_being_removed(true);
        debug!(pool = %self.name(), "Pool marked for removal");
        Ok(())
    }

    /// Record the running pool in `<state_dir>/<name>.json`.
    pub fn save_state(&self, state_dir: &Path) -> Result<()> {
        let path = persist::build_path(state_dir, self.name(), persist::JSON_EXT);
        persist::write_json(&path, self.def(), persist::PUBLIC_MODE)
    }

    pub fn delete_state(&self, state_dir: &Path) -> Result<()> {
        persist::remove_file(&persist::build_path(state_dir, self.name(), persist::JSON_EXT))
    }
}
