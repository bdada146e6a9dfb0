//! Virtual network registry.
//!
//! Networks are dual-keyed by UUID and name. A running network keeps two
//! definitions: `def` is the live one, and the pending definition holds the
//! persistent config that takes over again when the network stops.
//!
//! ```text
//!              inactive                     active
//!   def      = persistent config        live config
//!   new_def  = (none)                   persistent config, if persistent
//! ```
//!
//! Configs live in `<config_dir>/<name>.json`, autostart links in
//! `<autostart_dir>/<name>.json`, and running networks are recorded as
//! status files in `<state_dir>/<name>.json`.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::error::{PoolObjError, Result};
use crate::object::{LockedPoolObj, PoolObj};
use crate::persist;
use crate::table::{AclFilterFn, AssignDefFn, MatchFilterFn, PoolObjTable};
use crate::types::{flag_group_allows, PoolObjEntry, PoolObjTableType};

/// QoS class IDs are 16 bit minor numbers.
pub const CLASS_ID_BITMAP_SIZE: u32 = 1 << 16;

/// Class IDs taken by the root qdisc and default classes.
const RESERVED_CLASS_IDS: [u32; 3] = [0, 1, 2];

/// A network object.
pub type NetworkObj = PoolObj<NetworkDef, NetworkPrivate>;

/// A locked, referenced network.
pub type LockedNetwork = LockedPoolObj<NetworkDef, NetworkPrivate>;

/// How traffic leaves a virtual network.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NetworkForwardMode {
    /// Isolated
    #[default]
    None,
    Nat,
    Route,
    Open,
    /// Existing host bridge
    Bridge,
    Private,
    Vepa,
    Passthrough,
    Hostdev,
}

impl NetworkForwardMode {
    /// Modes where the network owns its bridge device (and so its MAC).
    pub fn manages_bridge(&self) -> bool {
        matches!(
            self,
            NetworkForwardMode::None
                | NetworkForwardMode::Nat
                | NetworkForwardMode::Route
                | NetworkForwardMode::Open
        )
    }
}

/// Network definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkDef {
    pub uuid: Uuid,
    pub name: String,
    /// Bridge device name
    #[serde(default)]
    pub bridge: Option<String>,
    #[serde(default)]
    pub forward: NetworkForwardMode,
    /// Bridge MAC address
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub mtu: Option<u32>,
}

impl NetworkDef {
    pub fn new(uuid: Uuid, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
            bridge: None,
            forward: NetworkForwardMode::None,
            mac: None,
            domain: None,
            mtu: None,
        }
    }

    pub fn with_bridge(mut self, bridge: impl Into<String>) -> Self {
        self.bridge = Some(bridge.into());
        self
    }

    pub fn with_forward(mut self, forward: NetworkForwardMode) -> Self {
        self.forward = forward;
        self
    }

    /// Give a self-managed bridge a stable MAC, or drop a MAC that a
    /// host-bridge network has no use for. Returns true if the MAC was
    /// generated and the config should be saved again.
    pub fn normalize_bridge_mac(&mut self) -> bool {
        if !self.forward.manages_bridge() {
            self.mac = None;
            return false;
        }
        if self.mac.is_some() {
            return false;
        }
        let bytes = Uuid::new_v4().into_bytes();
        self.mac = Some(format!(
            "52:54:00:{:02x}:{:02x}:{:02x}",
            bytes[0], bytes[1], bytes[2]
        ));
        true
    }
}

/// Reasons a network is tainted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum NetworkTaint {
    /// A hook script changed the network definition
    HookScript,
}

impl fmt::Display for NetworkTaint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetworkTaint::HookScript => write!(f, "hook-script"),
        }
    }
}

/// Per-network driver state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetworkPrivate {
    dnsmasq_pid: Option<u32>,
    radvd_pid: Option<u32>,
    class_ids: BTreeSet<u32>,
    floor_sum: u64,
    taints: BTreeSet<NetworkTaint>,
}

impl NetworkPrivate {
    pub fn new() -> Self {
        Self {
            dnsmasq_pid: None,
            radvd_pid: None,
            class_ids: RESERVED_CLASS_IDS.into_iter().collect(),
            floor_sum: 0,
            taints: BTreeSet::new(),
        }
    }

    pub fn dnsmasq_pid(&self) -> Option<u32> {
        self.dnsmasq_pid
    }

    pub fn set_dnsmasq_pid(&mut self, pid: Option<u32>) {
        self.dnsmasq_pid = pid;
    }

    pub fn radvd_pid(&self) -> Option<u32> {
        self.radvd_pid
    }

    pub fn set_radvd_pid(&mut self, pid: Option<u32>) {
        self.radvd_pid = pid;
    }

    /// Class IDs in use, reserved ones included.
    pub fn class_ids(&self) -> &BTreeSet<u32> {
        &self.class_ids
    }

    /// Take the lowest free class ID.
    pub fn reserve_class_id(&mut self) -> Option<u32> {
        let id = (0..CLASS_ID_BITMAP_SIZE).find(|id| !self.class_ids.contains(id))?;
        self.class_ids.insert(id);
        Some(id)
    }

    /// Give a class ID back. Reserved IDs stay taken.
    pub fn release_class_id(&mut self, id: u32) -> bool {
        !RESERVED_CLASS_IDS.contains(&id) && self.class_ids.remove(&id)
    }

    /// Sum of the `floor` bandwidth of every attached interface.
    pub fn floor_sum(&self) -> u64 {
        self.floor_sum
    }

    pub fn set_floor_sum(&mut self, floor_sum: u64) {
        self.floor_sum = floor_sum;
    }

    pub fn taints(&self) -> impl Iterator<Item = NetworkTaint> + '_ {
        self.taints.iter().copied()
    }

    /// Record `taint`. Returns false if it was already recorded.
    pub fn taint(&mut self, taint: NetworkTaint) -> bool {
        self.taints.insert(taint)
    }
}

impl Default for NetworkPrivate {
    fn default() -> Self {
        Self::new()
    }
}

/// Status file contents: the live definition plus runtime bookkeeping.
#[derive(Debug, Serialize, Deserialize)]
struct NetworkStatus {
    #[serde(default)]
    class_ids: Vec<u32>,
    #[serde(default)]
    floor_sum: u64,
    #[serde(default)]
    taints: Vec<NetworkTaint>,
    network: NetworkDef,
}

/// State files written before status tracking hold a bare definition.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum StateFile {
    Status(NetworkStatus),
    Bare(NetworkDef),
}

bitflags! {
    /// How [`NetworkList::add`] treats the incoming definition.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NetworkAddFlags: u32 {
        /// The definition is the running config, not a persistent one
        const LIVE = 1 << 0;
        /// Refuse to redefine a running network
        const CHECK_LIVE = 1 << 1;
    }
}

bitflags! {
    /// Filters for [`NetworkList::export`] and [`NetworkList::prune`].
    ///
    /// Within each group (state, persistence, autostart) a network passes
    /// if it matches any set bit. An empty group does not filter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ListNetworksFlags: u32 {
        const INACTIVE = 1 << 0;
        const ACTIVE = 1 << 1;
        const PERSISTENT = 1 << 2;
        const TRANSIENT = 1 << 3;
        const AUTOSTART = 1 << 4;
        const NO_AUTOSTART = 1 << 5;
    }
}

bitflags! {
    /// Which definitions [`NetworkObj::update`] changes. Empty means the
    /// live one for a running network and the config otherwise.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct NetworkUpdateFlags: u32 {
        const AFFECT_LIVE = 1 << 0;
        const AFFECT_CONFIG = 1 << 1;
    }
}

/// Public handle to a network, as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NetworkHandle {
    pub name: String,
    pub uuid: Uuid,
}

/// Place `def` as the live or the persistent definition, depending on the
/// flags and on whether the network is running.
fn assign_network_def(
    obj: &mut NetworkObj,
    def: NetworkDef,
    _old_def: Option<&mut Option<NetworkDef>>,
    flags: u32,
) -> Result<()> {
    let flags = NetworkAddFlags::from_bits_truncate(flags);

    if flags.contains(NetworkAddFlags::CHECK_LIVE) && obj.is_active() {
        return Err(PoolObjError::OperationInvalid(format!(
            "network is already active as '{}'",
            obj.def().name
        )));
    }

    if flags.contains(NetworkAddFlags::LIVE) {
        // keep the persistent config around for when the network stops
        let previous = obj.replace_def(def);
        if obj.is_persistent() && obj.new_def().is_none() {
            obj.set_new_def(Some(previous));
        }
        return Ok(());
    }

    if obj.is_active() || !obj.is_persistent() {
        // A transient, inactive network with a def is in the middle of
        // starting: its def is the upcoming live config.
        obj.set_new_def(Some(def));
    } else {
        obj.set_new_def(None);
        obj.set_def(def);
    }
    obj.set_persistent(true);
    Ok(())
}

fn network_matches(obj: &NetworkObj, flags: u32) -> bool {
    let flags = ListNetworksFlags::from_bits_truncate(flags);

    flag_group_allows(
        flags,
        ListNetworksFlags::ACTIVE,
        ListNetworksFlags::INACTIVE,
        obj.is_active(),
    ) && flag_group_allows(
        flags,
        ListNetworksFlags::PERSISTENT,
        ListNetworksFlags::TRANSIENT,
        obj.is_persistent(),
    ) && flag_group_allows(
        flags,
        ListNetworksFlags::AUTOSTART,
        ListNetworksFlags::NO_AUTOSTART,
        obj.is_autostart(),
    )
}

fn uses_bridge(obj: &NetworkObj, bridge: &str, skip_name: Option<&str>) -> bool {
    let defs = || std::iter::once(obj.def()).chain(obj.new_def());
    if skip_name.is_some_and(|skip| defs().any(|def| def.name == skip)) {
        return false;
    }
    defs().any(|def| def.bridge.as_deref() == Some(bridge))
}

/// The host's virtual networks.
#[derive(Debug)]
pub struct NetworkList {
    networks: PoolObjTable<NetworkDef, NetworkPrivate>,
}

impl NetworkList {
    pub fn new() -> Self {
        Self {
            networks: PoolObjTable::with_default_size(PoolObjTableType::Network, false),
        }
    }

    /// The underlying table, for generic traversal.
    pub fn table(&self) -> &PoolObjTable<NetworkDef, NetworkPrivate> {
        &self.networks
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    /// Define a network or update one of its definitions.
    ///
    /// Without [`NetworkAddFlags::LIVE`] the definition is a persistent
    /// config and the network becomes persistent. A new network added with
    /// `LIVE` is transient.
    #[instrument(skip(self, def), fields(network = %def.name, uuid = %def.uuid))]
    pub fn add(&self, def: NetworkDef, flags: NetworkAddFlags) -> Result<LockedNetwork> {
        let uuid = def.uuid;
        let entry = PoolObjEntry::new(def.name.clone(), def).with_uuid(uuid);
        let assign: &AssignDefFn<NetworkDef, NetworkPrivate> = &assign_network_def;

        let mut obj = self.networks.add(entry, Some(assign), None, flags.bits())?;
        if !flags.contains(NetworkAddFlags::LIVE) {
            obj.set_persistent(true);
        }
        if obj.private_data().is_none() {
            obj.set_private_data(NetworkPrivate::new());
        }
        Ok(obj)
    }

    pub fn find_by_uuid(&self, uuid: &Uuid) -> Option<LockedNetwork> {
        self.networks.find_by_uuid(uuid)
    }

    pub fn find_by_name(&self, name: &str) -> Option<LockedNetwork> {
        self.networks.find_by_name(name)
    }

    pub fn remove(&self, obj: LockedNetwork) {
        self.networks.remove(obj);
    }

    /// Remove `obj` unless it is running. Returns true if it was removed.
    pub fn remove_inactive(&self, obj: LockedNetwork) -> bool {
        if obj.is_active() {
            return false;
        }
        self.networks.remove(obj);
        true
    }

    /// Whether a network other than `skip_name` already uses `bridge` in
    /// its live or persistent definition.
    ///
    /// The caller must not hold any network of this list.
    pub fn bridge_in_use(&self, bridge: &str, skip_name: Option<&str>) -> bool {
        self.networks
            .search_ref(&|obj| uses_bridge(obj, bridge, skip_name))
            .is_some()
    }

    /// Count active (or inactive) networks visible through `acl`.
    pub fn num_of_networks<C: ?Sized>(
        &self,
        conn: &C,
        want_active: bool,
        acl: Option<&AclFilterFn<C, NetworkDef>>,
    ) -> usize {
        let mut count = 0;
        let listed = self.networks.list(conn, acl, |obj| {
            if obj.is_active() == want_active {
                count += 1;
            }
            Ok(())
        });
        listed.map(|_| count).unwrap_or(0)
    }

    /// Names of active (or inactive) networks visible through `acl`, at
    /// most `max` of them.
    pub fn get_names<C: ?Sized>(
        &self,
        conn: &C,
        want_active: bool,
        acl: Option<&AclFilterFn<C, NetworkDef>>,
        max: usize,
    ) -> Result<Vec<String>> {
        let mut names = Vec::new();
        self.networks.list(conn, acl, |obj| {
            if names.len() < max && obj.is_active() == want_active {
                names.push(obj.def().name.clone());
            }
            Ok(())
        })?;
        Ok(names)
    }

    /// Handles for every network visible through `acl` and passing `flags`.
    pub fn export<C: ?Sized>(
        &self,
        conn: &C,
        acl: Option<&AclFilterFn<C, NetworkDef>>,
        flags: ListNetworksFlags,
    ) -> Vec<NetworkHandle> {
        let matchf: &MatchFilterFn<NetworkDef, NetworkPrivate> = &network_matches;
        self.networks
            .collect(conn, acl, Some(matchf), flags.bits())
            .iter()
            .map(|shared| {
                let obj = shared.lock();
                NetworkHandle {
                    name: obj.def().name.clone(),
                    uuid: obj.def().uuid,
                }
            })
            .collect()
    }

    /// Drop every network passing `flags`, e.g. `INACTIVE | TRANSIENT`
    /// leftovers after loading state. Returns how many were dropped.
    #[instrument(skip(self))]
    pub fn prune(&self, flags: ListNetworksFlags) -> usize {
        let matchf: &MatchFilterFn<NetworkDef, NetworkPrivate> = &network_matches;
        let pruned = self.networks.prune(matchf, flags.bits());
        debug!(pruned, "Pruned networks");
        pruned
    }

    /// Load every `<name>.json` network config under `config_dir`.
    ///
    /// Bad files are logged and skipped. Returns the number loaded.
    #[instrument(skip(self))]
    pub fn load_all_configs(&self, config_dir: &Path, autostart_dir: &Path) -> Result<usize> {
        let mut loaded = 0;

        for config_file in persist::list_files(config_dir, persist::JSON_EXT)? {
            match self.load_config(config_dir, autostart_dir, &config_file) {
                Ok(()) => loaded += 1,
                Err(e) => {
                    warn!(file = %config_file.display(), error = %e, "Skipping network config")
                }
            }
        }

        info!(count = loaded, "Network configs loaded");
        Ok(loaded)
    }

    fn load_config(&self, config_dir: &Path, autostart_dir: &Path, config_file: &Path) -> Result<()> {
        let mut def: NetworkDef = persist::read_json(config_file)?;
        check_file_name(config_file, &def)?;

        let autostart_link = persist::build_path(autostart_dir, &def.name, persist::JSON_EXT);
        let autostart = persist::link_points_to(&autostart_link, config_file);

        if def.normalize_bridge_mac() {
            if let Err(e) = save_def(config_dir, &def) {
                warn!(network = %def.name, error = %e, "Failed to save generated bridge MAC");
            }
        }

        let mut obj = self.add(def, NetworkAddFlags::empty())?;
        obj.set_autostart(autostart);
        debug!(network = %obj.name(), autostart, "Loaded network config");
        Ok(())
    }

    /// Load network status files from `state_dir`, marking each network
    /// active. Returns the number loaded.
    #[instrument(skip(self))]
    pub fn load_all_state(&self, state_dir: &Path) -> Result<usize> {
        let mut loaded = 0;

        for state_file in persist::list_files(state_dir, persist::JSON_EXT)? {
            match self.load_state(&state_file) {
                Ok(()) => loaded += 1,
                Err(e) => {
                    warn!(file = %state_file.display(), error = %e, "Skipping network state")
                }
            }
        }

        info!(count = loaded, "Network state loaded");
        Ok(loaded)
    }

    fn load_state(&self, state_file: &Path) -> Result<()> {
        let status = match persist::read_json::<StateFile>(state_file)? {
            StateFile::Status(status) => status,
            StateFile::Bare(network) => NetworkStatus {
                class_ids: Vec::new(),
                floor_sum: 0,
                taints: Vec::new(),
                network,
            },
        };
        check_file_name(state_file, &status.network)?;

        if let Some(id) = status.class_ids.iter().find(|&&id| id >= CLASS_ID_BITMAP_SIZE) {
            return Err(PoolObjError::InvalidArgument(format!(
                "class id {} out of range in '{}'",
                id,
                state_file.display()
            )));
        }

        let mut obj = self.add(status.network, NetworkAddFlags::LIVE)?;
        let private = obj.network_private_mut()?;
        if !status.class_ids.is_empty() {
            private.class_ids = status.class_ids.into_iter().collect();
        }
        if status.floor_sum > 0 {
            private.floor_sum = status.floor_sum;
        }
        private.taints = status.taints.into_iter().collect();
        obj.set_active(true);

        debug!(network = %obj.name(), "Loaded network state");
        Ok(())
    }
}

impl Default for NetworkList {
    fn default() -> Self {
        Self::new()
    }
}

fn check_file_name(path: &Path, def: &NetworkDef) -> Result<()> {
    if persist::file_stem(path) == Some(def.name.as_str()) {
        return Ok(());
    }
    Err(PoolObjError::InvalidArgument(format!(
        "network file name '{}' does not match network name '{}'",
        path.display(),
        def.name
    )))
}

fn save_def(config_dir: &Path, def: &NetworkDef) -> Result<()> {
    let path = persist::build_path(config_dir, &def.name, persist::JSON_EXT);
    persist::write_json(&path, def, persist::PUBLIC_MODE)
}

fn missing_private(name: &str) -> PoolObjError {
    PoolObjError::Internal(format!("network '{}' has no private data", name))
}

impl PoolObj<NetworkDef, NetworkPrivate> {
    /// The network's sidecar; attached by [`NetworkList::add`].
    pub fn network_private(&self) -> Result<&NetworkPrivate> {
        self.private_data().ok_or_else(|| missing_private(self.name()))
    }

    pub fn network_private_mut(&mut self) -> Result<&mut NetworkPrivate> {
        let name = self.name().to_string();
        self.private_data_mut().ok_or_else(|| missing_private(&name))
    }

    /// Make `def` the persistent config (`live == false`) or the running
    /// config (`live == true`) of this network.
    pub fn assign_def(&mut self, def: NetworkDef, live: bool) -> Result<()> {
        let flags = if live {
            NetworkAddFlags::LIVE
        } else {
            NetworkAddFlags::empty()
        };
        assign_network_def(self, def, None, flags.bits())
    }

    /// Drop the persistent config. The network disappears once it stops.
    pub fn make_transient(&mut self) {
        if self.take_new_def().is_some() {
            debug!(network = %self.name(), "Dropped persistent definition");
        }
        self.set_persistent(false);
    }

    /// Split off a copy of the config so live-only changes do not outlive
    /// the running network.
    ///
    /// With `live` this also applies to a network that is about to start.
    pub fn set_def_transient(&mut self, live: bool) {
        if !self.is_active() && !live {
            return;
        }
        if !self.is_persistent() || self.new_def().is_some() {
            return;
        }
        let config = self.def().clone();
        self.set_new_def(Some(config));
    }

    /// Undo [`set_def_transient`](Self::set_def_transient): the config
    /// becomes the current definition again.
    pub fn unset_def_transient(&mut self) {
        if self.apply_new_def() {
            debug!(network = %self.name(), "Restored persistent definition");
        }
    }

    /// The persistent config, or the running one of a transient network.
    pub fn persistent_def(&self) -> &NetworkDef {
        self.new_def().unwrap_or(self.def())
    }

    /// Replace the persistent config, leaving a running network's live
    /// definition alone.
    pub fn replace_persistent_def(&mut self, def: NetworkDef) {
        if self.is_active() {
            self.set_new_def(Some(def));
        } else {
            self.set_def(def);
        }
    }

    /// Apply `edit` to the live and/or persistent definition.
    ///
    /// Edits run on copies, and nothing changes unless all of them succeed.
    /// An edit may not change the network's name or UUID.
    #[instrument(skip(self, edit), fields(network = %self.name()))]
    pub fn update(
        &mut self,
        flags: NetworkUpdateFlags,
        edit: impl Fn(&mut NetworkDef) -> Result<()>,
    ) -> Result<()> {
        let flags = if flags.is_empty() {
            if self.is_active() {
                NetworkUpdateFlags::AFFECT_LIVE
            } else {
                NetworkUpdateFlags::AFFECT_CONFIG
            }
        } else {
            flags
        };

        if flags.contains(NetworkUpdateFlags::AFFECT_LIVE) && !self.is_active() {
            return Err(PoolObjError::OperationInvalid(
                "network is not running".to_string(),
            ));
        }
        if flags.contains(NetworkUpdateFlags::AFFECT_CONFIG) {
            if !self.is_persistent() {
                return Err(PoolObjError::OperationInvalid(
                    "cannot change persistent config of a transient network".to_string(),
                ));
            }
            if self.is_active() {
                self.set_def_transient(false);
            }
        }

        let edited = |base: &NetworkDef| -> Result<NetworkDef> {
            let mut copy = base.clone();
            edit(&mut copy)?;
            if copy.name != base.name || copy.uuid != base.uuid {
                return Err(PoolObjError::InvalidArgument(format!(
                    "update may not change the identity of network '{}'",
                    base.name
                )));
            }
            Ok(copy)
        };

        let live = if flags.contains(NetworkUpdateFlags::AFFECT_LIVE) {
            Some(edited(self.def())?)
        } else {
            None
        };
        let config = if flags.contains(NetworkUpdateFlags::AFFECT_CONFIG) {
            Some(edited(self.persistent_def())?)
        } else {
            None
        };

        if let Some(config) = config {
            self.replace_persistent_def(config);
        }
        if let Some(live) = live {
            self.set_def(live);
        }
        self.set_updated(true);
        Ok(())
    }

    /// Write the persistent config to `<config_dir>/<name>.json`.
    pub fn save_config(&self, config_dir: &Path) -> Result<()> {
        save_def(config_dir, self.persistent_def())?;
        info!(network = %self.name(), "Saved network config");
        Ok(())
    }

    /// Delete the config and autostart link. A missing link is not an
    /// error; a config that cannot be removed is.
    #[instrument(skip(self), fields(network = %self.name()))]
    pub fn delete_config(&mut self, config_dir: &Path, autostart_dir: &Path) -> Result<()> {
        let config_file = persist::build_path(config_dir, self.name(), persist::JSON_EXT);
        let autostart_link = persist::build_path(autostart_dir, self.name(), persist::JSON_EXT);

        if let Err(e) = persist::remove_file(&autostart_link) {
            warn!(link = %autostart_link.display(), error = %e, "Failed to remove autostart link");
        }
        self.set_autostart(false);

        std::fs::remove_file(&config_file).map_err(|e| PoolObjError::io(&config_file, e))?;
        info!(file = %config_file.display(), "Deleted network config");
        Ok(())
    }

    /// Create or remove the autostart link to the network's config.
    #[instrument(skip(self), fields(network = %self.name()))]
    pub fn set_autostart_link(
        &mut self,
        config_dir: &Path,
        autostart_dir: &Path,
        autostart: bool,
    ) -> Result<()> {
        if !self.is_persistent() {
            return Err(PoolObjError::OperationInvalid(format!(
                "cannot set autostart for transient network '{}'",
                self.name()
            )));
        }

        let config_file = persist::build_path(config_dir, self.name(), persist::JSON_EXT);
        let link = persist::build_path(autostart_dir, self.name(), persist::JSON_EXT);

        if autostart {
            if !persist::link_points_to(&link, &config_file) {
                std::fs::create_dir_all(autostart_dir)
                    .map_err(|e| PoolObjError::io(autostart_dir, e))?;
                persist::remove_file(&link)?;
                persist::symlink(&config_file, &link).map_err(|e| PoolObjError::io(&link, e))?;
            }
        } else {
            persist::remove_file(&link)?;
        }

        self.set_autostart(autostart);
        Ok(())
    }

    /// Record the running network and its bookkeeping in
    /// `<state_dir>/<name>.json`.
    pub fn save_status(&self, state_dir: &Path) -> Result<()> {
        let private = self.network_private()?;
        let status = NetworkStatus {
            class_ids: private.class_ids.iter().copied().collect(),
            floor_sum: private.floor_sum,
            taints: private.taints().collect(),
            network: self.def().clone(),
        };
        let path = persist::build_path(state_dir, self.name(), persist::JSON_EXT);
        persist::write_json(&path, &status, persist::PUBLIC_MODE)
    }

    pub fn delete_status(&self, state_dir: &Path) -> Result<()> {
        persist::remove_file(&persist::build_path(state_dir, self.name(), persist::JSON_EXT))
    }
}
