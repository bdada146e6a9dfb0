//! Host device registry.
//!
//! Node devices are keyed by name only. Most lookups are capability
//! searches, in particular for Fibre Channel HBAs able to host vHBAs.

use std::fmt;
use std::str::FromStr;

use bitflags::bitflags;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::error::{PoolObjError, Result};
use crate::object::{LockedPoolObj, PoolObj};
use crate::table::{AclFilterFn, MatchFilterFn, PoolObjTable};
use crate::types::{PoolObjEntry, PoolObjTableType};

/// A locked, referenced node device.
pub type LockedNodeDevice = LockedPoolObj<NodeDeviceDef>;

/// Capability names a device can be queried by.
///
/// `FcHost`, `Vports` and `MdevTypes` are never stored directly; they are
/// derived from `ScsiHost` and `Pci` capability flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NodeDevCapType {
    System,
    PciDev,
    UsbDev,
    UsbInterface,
    Net,
    ScsiHost,
    ScsiTarget,
    Scsi,
    Storage,
    FcHost,
    Vports,
    ScsiGeneric,
    Drm,
    MdevTypes,
    Mdev,
    CcwDev,
}

impl NodeDevCapType {
    pub const ALL: [NodeDevCapType; 16] = [
        NodeDevCapType::System,
        NodeDevCapType::PciDev,
        NodeDevCapType::UsbDev,
        NodeDevCapType::UsbInterface,
        NodeDevCapType::Net,
        NodeDevCapType::ScsiHost,
        NodeDevCapType::ScsiTarget,
        NodeDevCapType::Scsi,
        NodeDevCapType::Storage,
        NodeDevCapType::FcHost,
        NodeDevCapType::Vports,
        NodeDevCapType::ScsiGeneric,
        NodeDevCapType::Drm,
        NodeDevCapType::MdevTypes,
        NodeDevCapType::Mdev,
        NodeDevCapType::CcwDev,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            NodeDevCapType::System => "system",
            NodeDevCapType::PciDev => "pci",
            NodeDevCapType::UsbDev => "usb_device",
            NodeDevCapType::UsbInterface => "usb",
            NodeDevCapType::Net => "net",
            NodeDevCapType::ScsiHost => "scsi_host",
            NodeDevCapType::ScsiTarget => "scsi_target",
            NodeDevCapType::Scsi => "scsi",
            NodeDevCapType::Storage => "storage",
            NodeDevCapType::FcHost => "fc_host",
            NodeDevCapType::Vports => "vports",
            NodeDevCapType::ScsiGeneric => "scsi_generic",
            NodeDevCapType::Drm => "drm",
            NodeDevCapType::MdevTypes => "mdev_types",
            NodeDevCapType::Mdev => "mdev",
            NodeDevCapType::CcwDev => "ccw",
        }
    }

    /// Listing flag selecting devices with this capability.
    pub fn list_flag(&self) -> ListNodeDevicesFlags {
        match self {
            NodeDevCapType::System => ListNodeDevicesFlags::CAP_SYSTEM,
            NodeDevCapType::PciDev => ListNodeDevicesFlags::CAP_PCI_DEV,
            NodeDevCapType::UsbDev => ListNodeDevicesFlags::CAP_USB_DEV,
            NodeDevCapType::UsbInterface => ListNodeDevicesFlags::CAP_USB_INTERFACE,
            NodeDevCapType::Net => ListNodeDevicesFlags::CAP_NET,
            NodeDevCapType::ScsiHost => ListNodeDevicesFlags::CAP_SCSI_HOST,
            NodeDevCapType::ScsiTarget => ListNodeDevicesFlags::CAP_SCSI_TARGET,
            NodeDevCapType::Scsi => ListNodeDevicesFlags::CAP_SCSI,
            NodeDevCapType::Storage => ListNodeDevicesFlags::CAP_STORAGE,
            NodeDevCapType::FcHost => ListNodeDevicesFlags::CAP_FC_HOST,
            NodeDevCapType::Vports => ListNodeDevicesFlags::CAP_VPORTS,
            NodeDevCapType::ScsiGeneric => ListNodeDevicesFlags::CAP_SCSI_GENERIC,
            NodeDevCapType::Drm => ListNodeDevicesFlags::CAP_DRM,
            NodeDevCapType::MdevTypes => ListNodeDevicesFlags::CAP_MDEV_TYPES,
            NodeDevCapType::Mdev => ListNodeDevicesFlags::CAP_MDEV,
            NodeDevCapType::CcwDev => ListNodeDevicesFlags::CAP_CCW_DEV,
        }
    }
}

impl fmt::Display for NodeDevCapType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for NodeDevCapType {
    type Err = PoolObjError;

    fn from_str(s: &str) -> Result<Self> {
        NodeDevCapType::ALL
            .iter()
            .copied()
            .find(|cap| cap.as_str() == s)
            .ok_or_else(|| {
                PoolObjError::InvalidArgument(format!("unknown node device capability '{}'", s))
            })
    }
}

/// SCSI host adapter details.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScsiHostCap {
    /// Host number (`scsi_hostN`)
    pub host: u32,
    pub wwnn: Option<String>,
    pub wwpn: Option<String>,
    pub fabric_wwn: Option<String>,
    /// Adapter is a Fibre Channel HBA
    pub fc_host: bool,
    /// Adapter can create vHBAs
    pub vport_ops: bool,
}

/// One capability of a node device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NodeDevCap {
    System,
    Pci {
        /// Device supports mediated device types
        #[serde(default)]
        mdev: bool,
    },
    UsbDevice,
    Usb,
    Net {
        ifname: String,
    },
    ScsiHost(ScsiHostCap),
    ScsiTarget,
    Scsi,
    Storage,
    ScsiGeneric,
    Drm,
    Mdev,
    Ccw,
}

impl NodeDevCap {
    /// The stored capability type.
    pub fn cap_type(&self) -> NodeDevCapType {
        match self {
            NodeDevCap::System => NodeDevCapType::System,
            NodeDevCap::Pci { .. } => NodeDevCapType::PciDev,
            NodeDevCap::UsbDevice => NodeDevCapType::UsbDev,
            NodeDevCap::Usb => NodeDevCapType::UsbInterface,
            NodeDevCap::Net { .. } => NodeDevCapType::Net,
            NodeDevCap::ScsiHost(_) => NodeDevCapType::ScsiHost,
            NodeDevCap::ScsiTarget => NodeDevCapType::ScsiTarget,
            NodeDevCap::Scsi => NodeDevCapType::Scsi,
            NodeDevCap::Storage => NodeDevCapType::Storage,
            NodeDevCap::ScsiGeneric => NodeDevCapType::ScsiGeneric,
            NodeDevCap::Drm => NodeDevCapType::Drm,
            NodeDevCap::Mdev => NodeDevCapType::Mdev,
            NodeDevCap::Ccw => NodeDevCapType::CcwDev,
        }
    }

    /// Whether this capability answers to `cap`, directly or derived.
    pub fn provides(&self, cap: NodeDevCapType) -> bool {
        if self.cap_type() == cap {
            return true;
        }
        match self {
            NodeDevCap::Pci { mdev } => cap == NodeDevCapType::MdevTypes && *mdev,
            NodeDevCap::ScsiHost(scsi) => {
                (cap == NodeDevCapType::FcHost && scsi.fc_host)
                    || (cap == NodeDevCapType::Vports && scsi.vport_ops)
            }
            _ => false,
        }
    }
}

/// Node device definition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDeviceDef {
    /// Unique device name
    pub name: String,
    /// Parent device name
    #[serde(default)]
    pub parent: Option<String>,
    /// Parent HBA world wide node name (vHBA creation)
    #[serde(default)]
    pub parent_wwnn: Option<String>,
    /// Parent HBA world wide port name (vHBA creation)
    #[serde(default)]
    pub parent_wwpn: Option<String>,
    /// Parent fabric world wide name (vHBA creation)
    #[serde(default)]
    pub parent_fabric_wwn: Option<String>,
    /// sysfs path of the device
    #[serde(default)]
    pub sysfs_path: Option<String>,
    /// Capabilities
    #[serde(default)]
    pub caps: Vec<NodeDevCap>,
}

impl NodeDeviceDef {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            parent_wwnn: None,
            parent_wwpn: None,
            parent_fabric_wwn: None,
            sysfs_path: None,
            caps: Vec::new(),
        }
    }

    pub fn with_cap(mut self, cap: NodeDevCap) -> Self {
        self.caps.push(cap);
        self
    }

    pub fn with_parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    /// Whether any capability answers to `cap`.
    pub fn has_cap(&self, cap: NodeDevCapType) -> bool {
        self.caps.iter().any(|c| c.provides(cap))
    }

    /// The SCSI host capability of a Fibre Channel HBA.
    pub fn fc_host_cap(&self) -> Option<&ScsiHostCap> {
        self.scsi_host_caps().find(|scsi| scsi.fc_host)
    }

    /// The SCSI host capability of an adapter able to create vHBAs.
    pub fn vport_cap(&self) -> Option<&ScsiHostCap> {
        self.scsi_host_caps().find(|scsi| scsi.vport_ops)
    }

    fn scsi_host_caps(&self) -> impl Iterator<Item = &ScsiHostCap> {
        self.caps.iter().filter_map(|cap| match cap {
            NodeDevCap::ScsiHost(scsi) => Some(scsi),
            _ => None,
        })
    }

    /// FC HBA with vport support whose own names are `wwnn`/`wwpn`.
    fn is_vport_hba_with_wwns(&self, wwnn: &str, wwpn: &str) -> bool {
        self.fc_host_cap().is_some_and(|fc| {
            fc.wwnn.as_deref() == Some(wwnn) && fc.wwpn.as_deref() == Some(wwpn)
        }) && self.vport_cap().is_some()
    }

    fn is_vport_hba_on_fabric(&self, fabric_wwn: &str) -> bool {
        self.fc_host_cap()
            .is_some_and(|fc| fc.fabric_wwn.as_deref() == Some(fabric_wwn))
            && self.vport_cap().is_some()
    }

    /// Host number to create a vHBA under, if this device can host one.
    fn vport_parent_host(&self) -> Result<u32> {
        self.vport_cap().map(|scsi| scsi.host).ok_or_else(|| {
            PoolObjError::OperationFailed(format!(
                "Parent device {} is not capable of vport operations",
                self.name
            ))
        })
    }
}

bitflags! {
    /// Capability filters for [`NodeDeviceList::export`]. A device passes
    /// if it has any of the selected capabilities; no bits means no filter.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ListNodeDevicesFlags: u32 {
        const CAP_SYSTEM = 1 << 0;
        const CAP_PCI_DEV = 1 << 1;
        const CAP_USB_DEV = 1 << 2;
        const CAP_USB_INTERFACE = 1 << 3;
        const CAP_NET = 1 << 4;
        const CAP_SCSI_HOST = 1 << 5;
        const CAP_SCSI_TARGET = 1 << 6;
        const CAP_SCSI = 1 << 7;
        const CAP_STORAGE = 1 << 8;
        const CAP_FC_HOST = 1 << 9;
        const CAP_VPORTS = 1 << 10;
        const CAP_SCSI_GENERIC = 1 << 11;
        const CAP_DRM = 1 << 12;
        const CAP_MDEV_TYPES = 1 << 13;
        const CAP_MDEV = 1 << 14;
        const CAP_CCW_DEV = 1 << 15;
    }
}

fn device_matches(obj: &PoolObj<NodeDeviceDef>, flags: u32) -> bool {
    let flags = ListNodeDevicesFlags::from_bits_truncate(flags);
    if flags.is_empty() {
        return true;
    }
    NodeDevCapType::ALL
        .iter()
        .any(|cap| flags.contains(cap.list_flag()) && obj.def().has_cap(*cap))
}

/// Public handle to a node device, as returned by listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeDeviceHandle {
    pub name: String,
    pub parent: Option<String>,
}

/// The host's node devices.
#[derive(Debug)]
pub struct NodeDeviceList {
    devs: PoolObjTable<NodeDeviceDef>,
}

impl NodeDeviceList {
    pub fn new() -> Self {
        Self {
            devs: PoolObjTable::with_default_size(PoolObjTableType::NodeDevice, true),
        }
    }

    pub fn len(&self) -> usize {
        self.devs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.devs.is_empty()
    }

    /// Add a device or replace the definition of the one with the same name.
    #[instrument(skip(self, def), fields(device = %def.name))]
    pub fn assign_def(&self, def: NodeDeviceDef) -> Result<LockedNodeDevice> {
        self.devs
            .add(PoolObjEntry::new(def.name.clone(), def), None, None, 0)
    }

    pub fn remove(&self, obj: LockedNodeDevice) {
        self.devs.remove(obj);
    }

    pub fn find_by_name(&self, name: &str) -> Option<LockedNodeDevice> {
        self.devs.find_by_name(name)
    }

    pub fn find_by_sysfs_path(&self, sysfs_path: &str) -> Option<LockedNodeDevice> {
        self.devs
            .search_ref(&|obj| obj.def().sysfs_path.as_deref() == Some(sysfs_path))
    }

    /// Find a vport capable FC HBA by its own world wide names.
    pub fn find_by_wwns(&self, wwnn: &str, wwpn: &str) -> Option<LockedNodeDevice> {
        self.devs
            .search_ref(&|obj| obj.def().is_vport_hba_with_wwns(wwnn, wwpn))
    }

    /// Find a vport capable FC HBA attached to `fabric_wwn`.
    pub fn find_by_fabric_wwn(&self, fabric_wwn: &str) -> Option<LockedNodeDevice> {
        self.devs
            .search_ref(&|obj| obj.def().is_vport_hba_on_fabric(fabric_wwn))
    }

    pub fn find_by_cap(&self, cap: NodeDevCapType) -> Option<LockedNodeDevice> {
        self.devs.search_ref(&|obj| obj.def().has_cap(cap))
    }

    /// Find an FC SCSI host (physical or vHBA) by world wide names.
    pub fn find_scsi_host_by_wwns(&self, wwnn: &str, wwpn: &str) -> Option<LockedNodeDevice> {
        self.devs.search_ref(&|obj| {
            obj.def().scsi_host_caps().any(|scsi| {
                scsi.fc_host
                    && scsi.wwnn.as_deref() == Some(wwnn)
                    && scsi.wwpn.as_deref() == Some(wwpn)
            })
        })
    }

    /// Resolve the SCSI host number a new vHBA described by `def` should be
    /// created under.
    ///
    /// Tried in order: explicit parent name, parent WWNN/WWPN, parent
    /// fabric WWN, and, when `create` is set, any vport capable adapter.
    #[instrument(skip(self, def), fields(device = %def.name))]
    pub fn get_parent_host(&self, def: &NodeDeviceDef, create: bool) -> Result<u32> {
        let not_found = || {
            PoolObjError::OperationFailed(format!(
                "Could not find parent device for '{}'",
                def.name
            ))
        };

        let parent = if let Some(parent) = &def.parent {
            self.find_by_name(parent).ok_or_else(not_found)?
        } else if let (Some(wwnn), Some(wwpn)) = (&def.parent_wwnn, &def.parent_wwpn) {
            self.find_by_wwns(wwnn, wwpn).ok_or_else(not_found)?
        } else if let Some(fabric_wwn) = &def.parent_fabric_wwn {
            self.find_by_fabric_wwn(fabric_wwn).ok_or_else(not_found)?
        } else if create {
            self.find_by_cap(NodeDevCapType::Vports).ok_or_else(|| {
                PoolObjError::OperationFailed("Could not find any vport capable device".to_string())
            })?
        } else {
            return Err(not_found());
        };

        let host = parent.def().vport_parent_host()?;
        debug!(parent = %parent.name(), host, "Resolved vHBA parent host");
        Ok(host)
    }

    /// Count devices visible through `acl`, optionally only those with `cap`.
    pub fn num_of_devices<C: ?Sized>(
        &self,
        conn: &C,
        cap: Option<NodeDevCapType>,
        acl: Option<&AclFilterFn<C, NodeDeviceDef>>,
    ) -> usize {
        let mut count = 0;
        let listed = self.devs.list(conn, acl, |obj| {
            if cap.map_or(true, |cap| obj.def().has_cap(cap)) {
                count += 1;
            }
            Ok(())
        });
        listed.map(|_| count).unwrap_or(0)
    }

    /// Names of at most `max` devices visible through `acl`, optionally only
    /// those with `cap`.
    pub fn get_names<C: ?Sized>(
        &self,
        conn: &C,
        cap: Option<NodeDevCapType>,
        acl: Option<&AclFilterFn<C, NodeDeviceDef>>,
        max: usize,
    ) -> Result<Vec<String>> {
        let mut names = Vec::new();
        self.devs.list(conn, acl, |obj| {
            if names.len() < max && cap.map_or(true, |cap| obj.def().has_cap(cap)) {
                names.push(obj.def().name.clone());
            }
            Ok(())
        })?;
        Ok(names)
    }

    /// Handles for every device visible through `acl` and passing `flags`.
    pub fn export<C: ?Sized>(
        &self,
        conn: &C,
        acl: Option<&AclFilterFn<C, NodeDeviceDef>>,
        flags: ListNodeDevicesFlags,
    ) -> Vec<NodeDeviceHandle> {
        let matchf: &MatchFilterFn<NodeDeviceDef, ()> = &device_matches;
        self.devs
            .collect(conn, acl, Some(matchf), flags.bits())
            .iter()
            .map(|shared| {
                let obj = shared.lock();
                NodeDeviceHandle {
                    name: obj.def().name.clone(),
                    parent: obj.def().parent.clone(),
                }
            })
            .collect()
    }
}

impl Default for NodeDeviceList {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hba(name: &str, host: u32, wwnn: &str, wwpn: &str, fabric: &str, vport_ops: bool) -> NodeDeviceDef {
        NodeDeviceDef::new(name)
            .with_parent("pci_0000_04_00_0")
            .with_cap(NodeDevCap::ScsiHost(ScsiHostCap {
                host,
                wwnn: Some(wwnn.to_string()),
                wwpn: Some(wwpn.to_string()),
                fabric_wwn: Some(fabric.to_string()),
                fc_host: true,
                vport_ops,
            }))
    }

    fn populated() -> NodeDeviceList {
        let list = NodeDeviceList::new();
        list.assign_def(NodeDeviceDef::new("computer").with_cap(NodeDevCap::System))
            .unwrap();
        let mut gpu = NodeDeviceDef::new("pci_0000_01_00_0")
            .with_parent("computer")
            .with_cap(NodeDevCap::Pci { mdev: true });
        gpu.sysfs_path = Some("/sys/devices/pci0000:00/0000:01:00.0".to_string());
        list.assign_def(gpu).unwrap();
        list.assign_def(
            NodeDeviceDef::new("net_eth0").with_cap(NodeDevCap::Net {
                ifname: "eth0".to_string(),
            }),
        )
        .unwrap();
        list.assign_def(hba("scsi_host5", 5, "20000000c9831b4b", "10000000c9831b4b", "2002000573de9a81", true))
            .unwrap();
        list.assign_def(hba("scsi_host6", 6, "20000000c9831b4c", "10000000c9831b4c", "2002000573de9a82", false))
            .unwrap();
        list
    }

    #[test]
    fn test_cap_names_roundtrip() {
        for cap in NodeDevCapType::ALL {
            assert_eq!(cap.as_str().parse::<NodeDevCapType>().unwrap(), cap);
        }
        assert!("bogus".parse::<NodeDevCapType>().is_err());
    }

    #[test]
    fn test_derived_caps() {
        let list = populated();
        let gpu = list.find_by_name("pci_0000_01_00_0").unwrap();
        assert!(gpu.def().has_cap(NodeDevCapType::PciDev));
        assert!(gpu.def().has_cap(NodeDevCapType::MdevTypes));
        assert!(!gpu.def().has_cap(NodeDevCapType::Mdev));
        drop(gpu);

        let hba = list.find_by_name("scsi_host6").unwrap();
        assert!(hba.def().has_cap(NodeDevCapType::FcHost));
        assert!(!hba.def().has_cap(NodeDevCapType::Vports));
    }

    #[test]
    fn test_find_by_properties() {
        let list = populated();
        assert_eq!(
            list.find_by_sysfs_path("/sys/devices/pci0000:00/0000:01:00.0")
                .unwrap()
                .name(),
            "pci_0000_01_00_0"
        );
        assert_eq!(
            list.find_by_wwns("20000000c9831b4b", "10000000c9831b4b")
                .unwrap()
                .name(),
            "scsi_host5"
        );
        // no vport support
        assert!(list.find_by_wwns("20000000c9831b4c", "10000000c9831b4c").is_none());
        assert_eq!(
            list.find_scsi_host_by_wwns("20000000c9831b4c", "10000000c9831b4c")
                .unwrap()
                .name(),
            "scsi_host6"
        );
        assert_eq!(
            list.find_by_fabric_wwn("2002000573de9a81").unwrap().name(),
            "scsi_host5"
        );
        assert_eq!(
            list.find_by_cap(NodeDevCapType::Net).unwrap().name(),
            "net_eth0"
        );
    }

    #[test]
    fn test_get_parent_host() {
        let list = populated();

        let by_name = NodeDeviceDef::new("vhba").with_parent("scsi_host5");
        assert_eq!(list.get_parent_host(&by_name, false).unwrap(), 5);

        let mut by_wwns = NodeDeviceDef::new("vhba");
        by_wwns.parent_wwnn = Some("20000000c9831b4b".to_string());
        by_wwns.parent_wwpn = Some("10000000c9831b4b".to_string());
        assert_eq!(list.get_parent_host(&by_wwns, false).unwrap(), 5);

        let mut by_fabric = NodeDeviceDef::new("vhba");
        by_fabric.parent_fabric_wwn = Some("2002000573de9a81".to_string());
        assert_eq!(list.get_parent_host(&by_fabric, false).unwrap(), 5);

        let anywhere = NodeDeviceDef::new("vhba");
        assert_eq!(list.get_parent_host(&anywhere, true).unwrap(), 5);
        assert!(list.get_parent_host(&anywhere, false).is_err());

        let incapable = NodeDeviceDef::new("vhba").with_parent("scsi_host6");
        let err = list.get_parent_host(&incapable, false).unwrap_err();
        assert!(err.to_string().contains("not capable of vport operations"));

        let missing = NodeDeviceDef::new("vhba").with_parent("scsi_host99");
        assert!(matches!(
            list.get_parent_host(&missing, false),
            Err(PoolObjError::OperationFailed(_))
        ));
    }

    #[test]
    fn test_count_names_export() {
        let list = populated();
        assert_eq!(list.num_of_devices(&(), None, None), 5);
        assert_eq!(list.num_of_devices(&(), Some(NodeDevCapType::FcHost), None), 2);

        let no_net: &AclFilterFn<(), NodeDeviceDef> = &|_, def| !def.name.starts_with("net_");
        assert_eq!(list.num_of_devices(&(), None, Some(no_net)), 4);

        let mut names = list
            .get_names(&(), Some(NodeDevCapType::ScsiHost), None, 10)
            .unwrap();
        names.sort();
        assert_eq!(names, vec!["scsi_host5", "scsi_host6"]);

        let vports = list.export(&(), None, ListNodeDevicesFlags::CAP_VPORTS);
        assert_eq!(vports.len(), 1);
        assert_eq!(vports[0].parent.as_deref(), Some("pci_0000_04_00_0"));

        let mixed = list.export(
            &(),
            Some(no_net),
            ListNodeDevicesFlags::CAP_NET | ListNodeDevicesFlags::CAP_MDEV_TYPES,
        );
        assert_eq!(mixed.len(), 1);
        assert_eq!(list.export(&(), None, ListNodeDevicesFlags::empty()).len(), 5);
    }

    #[test]
    fn test_assign_replaces_and_remove() {
        let list = populated();
        list.assign_def(NodeDeviceDef::new("net_eth0").with_cap(NodeDevCap::Net {
            ifname: "eth1".to_string(),
        }))
        .unwrap();
        assert_eq!(list.len(), 5);

        let dev = list.find_by_name("net_eth0").unwrap();
        assert_eq!(
            dev.def().caps,
            vec![NodeDevCap::Net {
                ifname: "eth1".to_string()
            }]
        );
        list.remove(dev);
        assert!(list.find_by_name("net_eth0").is_none());
        assert_eq!(list.len(), 4);
    }

    #[test]
    fn test_def_json() {
        let def: NodeDeviceDef = serde_json::from_str(
            r#"{ "name": "scsi_host2", "caps": [{ "type": "scsi_host", "host": 2, "vport_ops": true }] }"#,
        )
        .unwrap();
        assert_eq!(def.vport_cap().map(|c| c.host), Some(2));
    }
}
