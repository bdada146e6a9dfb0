//! Storage type definitions.

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Type of storage pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StoragePoolType {
    /// Local directory (file-based)
    Dir,
    /// Pre-formatted block device mounted as a filesystem
    Fs,
    /// Network filesystem (NFS, CIFS, glusterfs mount)
    Netfs,
    /// LVM volume group
    Logical,
    /// Partitioned disk
    Disk,
    /// iSCSI target
    Iscsi,
    /// SCSI host adapter (scsi_host or vHBA)
    Scsi,
    /// Multipath devices
    Mpath,
    /// Ceph RBD
    Rbd,
    /// Sheepdog cluster
    Sheepdog,
    /// Gluster volume via libgfapi
    Gluster,
    /// ZFS pool
    Zfs,
    /// Virtuozzo storage
    Vstorage,
}

impl StoragePoolType {
    /// Listing flag selecting pools of this type.
    pub fn list_flag(&self) -> ListStoragePoolsFlags {
        match self {
            StoragePoolType::Dir => ListStoragePoolsFlags::DIR,
            StoragePoolType::Fs => ListStoragePoolsFlags::FS,
            StoragePoolType::Netfs => ListStoragePoolsFlags::NETFS,
            StoragePoolType::Logical => ListStoragePoolsFlags::LOGICAL,
            StoragePoolType::Disk => ListStoragePoolsFlags::DISK,
            StoragePoolType::Iscsi => ListStoragePoolsFlags::ISCSI,
            StoragePoolType::Scsi => ListStoragePoolsFlags::SCSI,
            StoragePoolType::Mpath => ListStoragePoolsFlags::MPATH,
            StoragePoolType::Rbd => ListStoragePoolsFlags::RBD,
            StoragePoolType::Sheepdog => ListStoragePoolsFlags::SHEEPDOG,
            StoragePoolType::Gluster => ListStoragePoolsFlags::GLUSTER,
            StoragePoolType::Zfs => ListStoragePoolsFlags::ZFS,
            StoragePoolType::Vstorage => ListStoragePoolsFlags::VSTORAGE,
        }
    }
}

impl std::fmt::Display for StoragePoolType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            StoragePoolType::Dir => "dir",
            StoragePoolType::Fs => "fs",
            StoragePoolType::Netfs => "netfs",
            StoragePoolType::Logical => "logical",
            StoragePoolType::Disk => "disk",
            StoragePoolType::Iscsi => "iscsi",
            StoragePoolType::Scsi => "scsi",
            StoragePoolType::Mpath => "mpath",
            StoragePoolType::Rbd => "rbd",
            StoragePoolType::Sheepdog => "sheepdog",
            StoragePoolType::Gluster => "gluster",
            StoragePoolType::Zfs => "zfs",
            StoragePoolType::Vstorage => "vstorage",
        };
        write!(f, "{}", name)
    }
}

/// Remote host serving a pool source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolSourceHost {
    /// Host name or address
    pub name: String,
    /// Port, if not the protocol default
    #[serde(default)]
    pub port: Option<u16>,
}

/// PCI address of a SCSI host's parent controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PciAddress {
    pub domain: u32,
    pub bus: u32,
    pub slot: u32,
    pub function: u32,
}

/// Adapter backing a `scsi` pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SourceAdapter {
    /// Physical SCSI host, by name (`scsi_hostN`/`hostN`) or by parent
    /// controller address plus unique id.
    ScsiHost {
        #[serde(default)]
        name: Option<String>,
        #[serde(default)]
        parent_addr: Option<PciAddress>,
        #[serde(default)]
        unique_id: u32,
    },
    /// Fibre Channel vHBA identified by its world wide names.
    FcHost {
        wwnn: String,
        wwpn: String,
        #[serde(default)]
        parent: Option<String>,
    },
}

/// Where a pool's storage comes from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoragePoolSource {
    /// Remote hosts (netfs, iscsi, gluster, sheepdog, rbd)
    pub hosts: Vec<PoolSourceHost>,
    /// Device paths (fs, logical, disk, iscsi, zfs)
    pub devices: Vec<String>,
    /// Remote directory (netfs, gluster)
    pub dir: Option<String>,
    /// Source name (logical VG, gluster volume, rbd pool, vstorage cluster)
    pub name: Option<String>,
    /// SCSI adapter (scsi)
    pub adapter: Option<SourceAdapter>,
    /// iSCSI initiator IQN
    pub initiator_iqn: Option<String>,
}

/// Where a pool is exposed on the host.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePoolTarget {
    /// Target path (directory or device directory)
    pub path: String,
}

/// Storage pool definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoragePoolDef {
    /// Unique identifier
    pub uuid: Uuid,
    /// Unique name
    pub name: String,
    /// Pool type
    #[serde(rename = "type")]
    pub pool_type: StoragePoolType,
    /// Source of the storage
    #[serde(default)]
    pub source: StoragePoolSource,
    /// Host-side target
    #[serde(default)]
    pub target: StoragePoolTarget,
    /// Total capacity in bytes
    #[serde(default)]
    pub capacity: u64,
    /// Allocated bytes
    #[serde(default)]
    pub allocation: u64,
    /// Available bytes
    #[serde(default)]
    pub available: u64,
}

impl StoragePoolDef {
    /// Create a definition with an empty source and target.
    pub fn new(uuid: Uuid, name: impl Into<String>, pool_type: StoragePoolType) -> Self {
        Self {
            uuid,
            name: name.into(),
            pool_type,
            source: StoragePoolSource::default(),
            target: StoragePoolTarget::default(),
            capacity: 0,
            allocation: 0,
            available: 0,
        }
    }

    /// Set the target path.
    pub fn with_target(mut self, path: impl Into<String>) -> Self {
        self.target.path = path.into();
        self
    }

    /// Replace the source.
    pub fn with_source(mut self, source: StoragePoolSource) -> Self {
        self.source = source;
        self
    }
}

/// Storage volume definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageVolDef {
    /// Name, unique within the pool
    pub name: String,
    /// Globally unique key
    pub key: String,
    /// Path on the host
    pub target_path: String,
    /// Capacity in bytes
    #[serde(default)]
    pub capacity: u64,
    /// Allocated bytes
    #[serde(default)]
    pub allocation: u64,
}

impl StorageVolDef {
    pub fn new(
        name: impl Into<String>,
        key: impl Into<String>,
        target_path: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            key: key.into(),
            target_path: target_path.into(),
            capacity: 0,
            allocation: 0,
        }
    }
}

/// Public handle to a pool, as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolHandle {
    pub name: String,
    pub uuid: Uuid,
}

bitflags! {
    /// Filters for [`StoragePoolList::export`](super::StoragePoolList::export).
    ///
    /// Within each group (state, persistence, autostart, type) a pool
    /// passes if it matches any set bit. An empty group does not filter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ListStoragePoolsFlags: u32 {
        const INACTIVE = 1 << 0;
        const ACTIVE = 1 << 1;
        const PERSISTENT = 1 << 2;
        const TRANSIENT = 1 << 3;
        const AUTOSTART = 1 << 4;
        const NO_AUTOSTART = 1 << 5;
        const DIR = 1 << 6;
        const FS = 1 << 7;
        const NETFS = 1 << 8;
        const LOGICAL = 1 << 9;
        const DISK = 1 << 10;
        const ISCSI = 1 << 11;
        const SCSI = 1 << 12;
        const MPATH = 1 << 13;
        const RBD = 1 << 14;
        const SHEEPDOG = 1 << 15;
        const GLUSTER = 1 << 16;
        const ZFS = 1 << 17;
        const VSTORAGE = 1 << 18;

        const FILTERS_ACTIVE = Self::ACTIVE.bits() | Self::INACTIVE.bits();
        const FILTERS_PERSISTENT = Self::PERSISTENT.bits() | Self::TRANSIENT.bits();
        const FILTERS_AUTOSTART = Self::AUTOSTART.bits() | Self::NO_AUTOSTART.bits();
        const FILTERS_POOL_TYPE = Self::DIR.bits()
            | Self::FS.bits()
            | Self::NETFS.bits()
            | Self::LOGICAL.bits()
            | Self::DISK.bits()
            | Self::ISCSI.bits()
            | Self::SCSI.bits()
            | Self::MPATH.bits()
            | Self::RBD.bits()
            | Self::SHEEPDOG.bits()
            | Self::GLUSTER.bits()
            | Self::ZFS.bits()
            | Self::VSTORAGE.bits();
    }
}

/// Parse the host number out of a `scsi_hostN` or `hostN` adapter name.
pub fn scsi_host_number(name: &str) -> Option<u32> {
    let name = name.strip_prefix("scsi_").unwrap_or(name);
    name.strip_prefix("host")?.parse().ok()
}
