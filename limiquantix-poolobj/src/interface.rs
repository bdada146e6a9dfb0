//! Host network interface registry.
//!
//! Interfaces are keyed by name only. The whole list can be cloned to back
//! a change transaction and swapped back on rollback.

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::error::Result;
use crate::object::LockedPoolObj;
use crate::table::PoolObjTable;
use crate::types::{PoolObjEntry, PoolObjTableType};

/// A locked, referenced interface.
pub type LockedInterface = LockedPoolObj<InterfaceDef>;

/// Kind of host interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InterfaceType {
    Ethernet,
    Bridge,
    Bond,
    Vlan,
}

/// Interface definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterfaceDef {
    pub name: String,
    #[serde(rename = "type")]
    pub iface_type: InterfaceType,
    /// MAC address as configured, any case
    #[serde(default)]
    pub mac: Option<String>,
    #[serde(default)]
    pub mtu: Option<u32>,
}

impl InterfaceDef {
    pub fn new(name: impl Into<String>, iface_type: InterfaceType) -> Self {
        Self {
            name: name.into(),
            iface_type,
            mac: None,
            mtu: None,
        }
    }

    pub fn with_mac(mut self, mac: impl Into<String>) -> Self {
        self.mac = Some(mac.into());
        self
    }
}

/// The host's interfaces.
#[derive(Debug)]
pub struct InterfaceList {
    ifaces: PoolObjTable<InterfaceDef>,
}

impl InterfaceList {
    pub fn new() -> Self {
        Self {
            ifaces: PoolObjTable::with_default_size(PoolObjTableType::Interface, true),
        }
    }

    pub fn len(&self) -> usize {
        self.ifaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ifaces.is_empty()
    }

    /// Add an interface or replace the definition of the one with the same
    /// name.
    #[instrument(skip(self, def), fields(iface = %def.name))]
    pub fn assign_def(&self, def: InterfaceDef) -> Result<LockedInterface> {
        self.ifaces
            .add(PoolObjEntry::new(def.name.clone(), def), None, None, 0)
    }

    pub fn remove(&self, obj: LockedInterface) {
        self.ifaces.remove(obj);
    }

    pub fn find_by_name(&self, name: &str) -> Option<LockedInterface> {
        self.ifaces.find_by_name(name)
    }

    /// Names of at most `max` interfaces whose MAC matches `mac`, ignoring
    /// case.
    pub fn find_by_mac_string(&self, mac: &str, max: usize) -> Result<Vec<String>> {
        let mut names = Vec::new();
        self.ifaces.list(&(), None, |obj| {
            let matches = obj
                .def()
                .mac
                .as_deref()
                .is_some_and(|m| m.eq_ignore_ascii_case(mac));
            if matches && names.len() < max {
                names.push(obj.def().name.clone());
            }
            Ok(())
        })?;
        Ok(names)
    }

    /// Count active (or inactive) interfaces.
    pub fn num_of_interfaces(&self, want_active: bool) -> usize {
        let mut count = 0;
        self.ifaces.iterate(|obj| {
            if obj.is_active() == want_active {
                count += 1;
            }
        });
        count
    }

    /// Names of at most `max` active (or inactive) interfaces.
    pub fn get_names(&self, want_active: bool, max: usize) -> Vec<String> {
        let mut names = Vec::new();
        self.ifaces.iterate(|obj| {
            if names.len() < max && obj.is_active() == want_active {
                names.push(obj.def().name.clone());
            }
        });
        names
    }

    /// Deep copy of every definition into a fresh list. Activity is not
    /// copied.
    pub fn clone_list(&self) -> Result<InterfaceList> {
        let ifaces = self.ifaces.clone_table(|obj| Ok(obj.def().clone()))?;
        Ok(InterfaceList { ifaces })
    }
}

impl Default for InterfaceList {
    fn default() -> Self {
        Self::new()
    }
}
