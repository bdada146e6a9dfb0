//! Shared type definitions for the pool-object registry.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Default initial table sizes per subsystem.
pub const NODEDEVICE_HASH_START: usize = 50;
pub const INTERFACE_HASH_START: usize = 10;
pub const NWFILTER_HASH_START: usize = 20;
pub const VOLUME_HASH_START: usize = 10;
pub const BLOCK_STORAGE_HASH_START: usize = 20;
pub const SECRET_HASH_START: usize = 20;
pub const NETWORK_HASH_START: usize = 10;
pub const SNAPSHOT_HASH_START: usize = 10;
pub const DOMAIN_HASH_START: usize = 50;

/// Which subsystem owns a table. Only used for logging and error text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolObjTableType {
    NodeDevice,
    Interface,
    NwFilter,
    Volume,
    BlockStorage,
    Secret,
    Network,
    Snapshot,
    Domain,
}

impl PoolObjTableType {
    /// Suggested initial size for a table of this type.
    pub fn default_hash_start(&self) -> usize {
        match self {
            PoolObjTableType::NodeDevice => NODEDEVICE_HASH_START,
            PoolObjTableType::Interface => INTERFACE_HASH_START,
            PoolObjTableType::NwFilter => NWFILTER_HASH_START,
            PoolObjTableType::Volume => VOLUME_HASH_START,
            PoolObjTableType::BlockStorage => BLOCK_STORAGE_HASH_START,
            PoolObjTableType::Secret => SECRET_HASH_START,
            PoolObjTableType::Network => NETWORK_HASH_START,
            PoolObjTableType::Snapshot => SNAPSHOT_HASH_START,
            PoolObjTableType::Domain => DOMAIN_HASH_START,
        }
    }
}

impl std::fmt::Display for PoolObjTableType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PoolObjTableType::NodeDevice => write!(f, "nodedev"),
            PoolObjTableType::Interface => write!(f, "interface"),
            PoolObjTableType::NwFilter => write!(f, "nwfilter"),
            PoolObjTableType::Volume => write!(f, "volume"),
            PoolObjTableType::BlockStorage => write!(f, "block storage"),
            PoolObjTableType::Secret => write!(f, "secret"),
            PoolObjTableType::Network => write!(f, "network"),
            PoolObjTableType::Snapshot => write!(f, "domain snapshot"),
            PoolObjTableType::Domain => write!(f, "domain"),
        }
    }
}

/// Lookup identity of one table entry.
///
/// Copied out of the subsystem definition when the object is created so the
/// table can index it without knowing the definition type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolDef {
    uuid: Option<Uuid>,
    name: String,
}

impl PoolDef {
    pub fn new(uuid: Option<Uuid>, name: impl Into<String>) -> Self {
        Self {
            uuid,
            name: name.into(),
        }
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// UUID rendered for messages, `"(none)"` for name-only objects.
    pub(crate) fn uuid_display(&self) -> String {
        self.uuid
            .map(|u| u.to_string())
            .unwrap_or_else(|| "(none)".to_string())
    }
}

/// Input to [`PoolObjTable::add`](crate::PoolObjTable::add).
#[derive(Debug)]
pub struct PoolObjEntry<D> {
    pub uuid: Option<Uuid>,
    pub name: String,
    pub def: D,
    pub new_def: Option<D>,
}

impl<D> PoolObjEntry<D> {
    /// Entry keyed by name only.
    pub fn new(name: impl Into<String>, def: D) -> Self {
        Self {
            uuid: None,
            name: name.into(),
            def,
            new_def: None,
        }
    }

    /// Also key the entry by UUID.
    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }

    /// Stage a pending definition alongside the current one.
    pub fn with_new_def(mut self, new_def: D) -> Self {
        self.new_def = Some(new_def);
        self
    }
}

/// Whether one yes/no group of listing flags lets an object through.
///
/// A group with neither bit set does not filter; otherwise the object
/// passes if it matches any set bit.
pub(crate) fn flag_group_allows<F: bitflags::Flags + Copy>(
    flags: F,
    yes: F,
    no: F,
    value: bool,
) -> bool {
    if !flags.intersects(yes) && !flags.intersects(no) {
        return true;
    }
    (flags.contains(yes) && value) || (flags.contains(no) && !value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_type_display() {
        assert_eq!(PoolObjTableType::BlockStorage.to_string(), "block storage");
        assert_eq!(PoolObjTableType::Snapshot.to_string(), "domain snapshot");
        assert_eq!(PoolObjTableType::NodeDevice.default_hash_start(), 50);
    }

    #[test]
    fn test_entry_builder() {
        let uuid = Uuid::new_v4();
        let entry = PoolObjEntry::new("pool-a", 1u32)
            .with_uuid(uuid)
            .with_new_def(2);
        assert_eq!(entry.uuid, Some(uuid));
        assert_eq!(entry.name, "pool-a");
        assert_eq!(entry.new_def, Some(2));
    }
}
