//! Volumes of a storage pool.
//!
//! Each pool owns a name-only volume table inside its private data. All of
//! these helpers are called on a locked pool, which is what serializes
//! volume changes within that pool.

use tracing::debug;

use super::{StoragePoolDef, StoragePoolObj, StorageVolDef};
use crate::error::Result;
use crate::object::LockedPoolObj;
use crate::types::PoolObjEntry;

/// A locked, referenced storage volume.
pub type LockedStorageVol = LockedPoolObj<StorageVolDef>;

/// Per-connection visibility check on a volume of a given pool.
pub type VolumeAclFilterFn<C> = dyn Fn(&C, &StoragePoolDef, &StorageVolDef) -> bool;

impl StoragePoolObj {
    /// Add a volume, or replace the definition of the one with the same
    /// name.
    pub fn add_volume(&self, def: StorageVolDef) -> Result<LockedStorageVol> {
        let volumes = self.pool_private()?.volumes();
        let vol = volumes.add(PoolObjEntry::new(def.name.clone(), def), None, None, 0)?;
        debug!(pool = %self.name(), volume = %vol.name(), "Added volume");
        Ok(vol)
    }

    /// Remove a locked volume from this pool.
    pub fn remove_volume(&self, vol: LockedStorageVol) -> Result<()> {
        self.pool_private()?.volumes().remove(vol);
        Ok(())
    }

    /// Forget every volume, e.g. before a pool refresh. Returns how many
    /// there were. Volume handles the caller still holds stay valid.
    pub fn clear_volumes(&self) -> usize {
        self.private_data()
            .map_or(0, |private| private.volumes().clear_all())
    }

    /// Count the volumes visible through `acl`.
    pub fn num_of_volumes<C: ?Sized>(&self, conn: &C, acl: Option<&VolumeAclFilterFn<C>>) -> usize {
        let Some(private) = self.private_data() else {
            return 0;
        };
        let pooldef = self.def();
        let mut count = 0;
        let listed = private.volumes().list(conn, None, |vol| {
            if acl.map_or(true, |acl| acl(conn, pooldef, vol.def())) {
                count += 1;
            }
            Ok(())
        });
        listed.map(|_| count).unwrap_or(0)
    }

    /// Names of at most `max` volumes visible through `acl`.
    pub fn list_volumes<C: ?Sized>(
        &self,
        conn: &C,
        acl: Option<&VolumeAclFilterFn<C>>,
        max: usize,
    ) -> Result<Vec<String>> {
        let volumes = self.pool_private()?.volumes();
        let pooldef = self.def();
        let mut names = Vec::new();
        volumes.list(conn, None, |vol| {
            if names.len() < max && acl.map_or(true, |acl| acl(conn, pooldef, vol.def())) {
                names.push(vol.def().name.clone());
            }
            Ok(())
        })?;
        Ok(names)
    }

    pub fn find_volume_by_name(&self, name: &str) -> Option<LockedStorageVol> {
        self.private_data()?.volumes().find_by_name(name)
    }

    pub fn find_volume_by_key(&self, key: &str) -> Option<LockedStorageVol> {
        self.private_data()?
            .volumes()
            .search_ref(&|vol| vol.def().key == key)
    }

    pub fn find_volume_by_path(&self, path: &str) -> Option<LockedStorageVol> {
        self.private_data()?
            .volumes()
            .search_ref(&|vol| vol.def().target_path == path)
    }
}
