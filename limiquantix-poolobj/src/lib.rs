//! # limiquantix PoolObj
//!
//! Generic, thread-safe registry of named objects shared by the host
//! subsystems (storage pools and their volumes, virtual networks, node
//! devices, secrets, interfaces).
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │  StoragePoolList  NetworkList     NodeDeviceList             │
//! │  SecretList       InterfaceList                              │
//! └─────────────────────────────┬────────────────────────────────┘
//!                               │
//!                               ▼
//!               ┌───────────────────────────────┐
//!               │      PoolObjTable<D, P>       │
//!               │  by_uuid ─┐        ┌─ by_name │
//!               └───────────┼────────┼──────────┘
//!                           ▼        ▼
//!                  Arc<Mutex<PoolObj<D, P>>>
//! ```
//!
//! Lookups hand out a [`LockedPoolObj`]: the object stays referenced and
//! locked until the guard is dropped. Locks are always taken table first,
//! then object; never call back into a table while holding one of its
//! objects locked.
//!
//! ## Usage
//!
//! ```rust
//! use limiquantix_poolobj::{PoolObjEntry, PoolObjTable, PoolObjTableType};
//! use uuid::Uuid;
//!
//! let table: PoolObjTable<String> =
//!     PoolObjTable::with_default_size(PoolObjTableType::Network, false);
//! let uuid = Uuid::new_v4();
//!
//! let obj = table
//!     .add(PoolObjEntry::new("default", "virbr0".to_string()).with_uuid(uuid), None, None, 0)
//!     .unwrap();
//! drop(obj);
//!
//! assert_eq!(table.find_by_uuid(&uuid).unwrap().def(), "virbr0");
//! ```

pub mod error;
pub mod interface;
pub mod network;
pub mod nodedev;
pub mod object;
pub mod persist;
pub mod secret;
pub mod storage;
pub mod table;
pub mod types;

pub use error::{PoolObjError, Result};
pub use object::{LockedPoolObj, ObjState, PoolObj, SharedPoolObj};
pub use table::{AclFilterFn, AssignDefFn, MatchFilterFn, PoolObjTable};
pub use types::*;

pub use interface::{InterfaceDef, InterfaceList, InterfaceType, LockedInterface};
pub use network::{
    ListNetworksFlags, LockedNetwork, NetworkAddFlags, NetworkDef, NetworkForwardMode,
    NetworkHandle, NetworkList, NetworkTaint, NetworkUpdateFlags,
};
pub use nodedev::{
    ListNodeDevicesFlags, LockedNodeDevice, NodeDevCap, NodeDevCapType, NodeDeviceDef,
    NodeDeviceHandle, NodeDeviceList, ScsiHostCap,
};
pub use secret::{
    ListSecretsFlags, LockedSecret, SecretDef, SecretHandle, SecretList, SecretUsage,
};
pub use storage::{
    ListStoragePoolsFlags, LockedStoragePool, LockedStorageVol, PoolHandle, StoragePoolDef,
    StoragePoolList, StoragePoolType, StorageVolDef,
};
