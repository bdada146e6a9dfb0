//! The generic pool-object registry.
//!
//! ```text
//! ┌──────────────────── PoolObjTable (table Mutex) ────────────────────┐
//! │  by_uuid: HashMap<Uuid,   Arc<Mutex<PoolObj>>>  (dual-keyed only)  │
//! │  by_name: HashMap<String, Arc<Mutex<PoolObj>>>                     │
//! └────────────────────────────────────────────────────────────────────┘
//!                 │ Arc clone per index, one per caller handle
//!                 ▼
//!          PoolObj (object Mutex)
//! ```
//!
//! Lock order is always table, then object. The only place an object lock
//! is dropped and retaken around the table lock is [`PoolObjTable::remove`].
//!
//! Objects that are being removed stay reachable through outstanding
//! handles but every lookup treats them as absent.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;
use tracing::{debug, instrument};
use uuid::Uuid;

use crate::error::{PoolObjError, Result};
use crate::object::{LockedPoolObj, PoolObj, SharedPoolObj};
use crate::types::{PoolDef, PoolObjEntry, PoolObjTableType};

/// Subsystem policy applied when `add` finds an existing object.
///
/// Receives the locked existing object, the incoming definition, the
/// caller's slot for the displaced definition (if any) and the caller's
/// flags. Ownership of the incoming definition always passes to the
/// callback, so it is dropped on failure.
pub type AssignDefFn<D, P> =
    dyn Fn(&mut PoolObj<D, P>, D, Option<&mut Option<D>>, u32) -> Result<()>;

/// Per-connection visibility check on a definition.
pub type AclFilterFn<C, D> = dyn Fn(&C, &D) -> bool;

/// Subsystem filter on an object and caller flags.
pub type MatchFilterFn<D, P> = dyn Fn(&PoolObj<D, P>, u32) -> bool;

/// Both indexes. `by_name` holds every object in either table kind, so
/// traversals walk it alone.
struct TableObjs<D, P> {
    by_uuid: HashMap<Uuid, SharedPoolObj<D, P>>,
    by_name: HashMap<String, SharedPoolObj<D, P>>,
}

impl<D, P> TableObjs<D, P> {
    /// Drop index slots for `pooldef` that still point at `target`.
    ///
    /// Slots already reused by a newer object under the same key are left
    /// alone.
    fn unindex(&mut self, pooldef: &PoolDef, target: &SharedPoolObj<D, P>) {
        if let Some(uuid) = pooldef.uuid() {
            if self
                .by_uuid
                .get(&uuid)
                .is_some_and(|slot| Arc::ptr_eq(slot, target))
            {
                self.by_uuid.remove(&uuid);
            }
        }
        if self
            .by_name
            .get(pooldef.name())
            .is_some_and(|slot| Arc::ptr_eq(slot, target))
        {
            self.by_name.remove(pooldef.name());
        }
    }
}

/// Concurrent registry of [`PoolObj`]s keyed by UUID and name, or by name
/// only.
pub struct PoolObjTable<D, P = ()> {
    table_type: PoolObjTableType,
    hash_start: usize,
    name_only: bool,
    objs: Mutex<TableObjs<D, P>>,
}

impl<D, P> PoolObjTable<D, P> {
    /// Create an empty table.
    ///
    /// `name_only` tables keep a single name index (node devices,
    /// interfaces, volumes); the others require a UUID on every entry.
    pub fn new(table_type: PoolObjTableType, hash_start: usize, name_only: bool) -> Self {
        debug!(
            table = %table_type,
            hash_start,
            name_only,
            "Creating pool object table"
        );
        let uuid_capacity = if name_only { 0 } else { hash_start };
        Self {
            table_type,
            hash_start,
            name_only,
            objs: Mutex::new(TableObjs {
                by_uuid: HashMap::with_capacity(uuid_capacity),
                by_name: HashMap::with_capacity(hash_start),
            }),
        }
    }

    /// Create an empty table sized with the subsystem default.
    pub fn with_default_size(table_type: PoolObjTableType, name_only: bool) -> Self {
        Self::new(table_type, table_type.default_hash_start(), name_only)
    }

    pub fn table_type(&self) -> PoolObjTableType {
        self.table_type
    }

    pub fn hash_start(&self) -> usize {
        self.hash_start
    }

    pub fn name_only(&self) -> bool {
        self.name_only
    }

    /// Number of objects in the primary index.
    pub fn len(&self) -> usize {
        let objs = self.objs.lock();
        objs.by_name.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // ------------------------------------------------------------------
    // Add / remove
    // ------------------------------------------------------------------

    /// Insert a new object or redefine an existing one.
    ///
    /// The existing object is found by UUID, or by name for name-only
    /// tables. On a hit, the name must match when a UUID was supplied;
    /// `assign` then decides how the new definition is applied, or the
    /// current definition is simply replaced (the previous one landing in
    /// `old_def` if the caller asked for it). On a miss, no other object
    /// may already own the name.
    ///
    /// Returns the object locked and referenced.
    #[instrument(
        skip(self, entry, assign, old_def),
        fields(table = %self.table_type, name = %entry.name, uuid = ?entry.uuid)
    )]
    pub fn add(
        &self,
        entry: PoolObjEntry<D>,
        assign: Option<&AssignDefFn<D, P>>,
        old_def: Option<&mut Option<D>>,
        flags: u32,
    ) -> Result<LockedPoolObj<D, P>> {
        let PoolObjEntry {
            uuid,
            name,
            def,
            new_def,
        } = entry;

        let uuid = if self.name_only {
            None
        } else {
            Some(uuid.ok_or_else(|| {
                PoolObjError::InvalidArgument(format!(
                    "{} '{}' requires a uuid",
                    self.table_type, name
                ))
            })?)
        };

        let mut objs = self.objs.lock();

        let found = match uuid {
            Some(uuid) => objs.by_uuid.get(&uuid).cloned(),
            None => objs.by_name.get(&name).cloned(),
        };

        if let Some(shared) = found {
            let mut existing = LockedPoolObj::acquire(&shared);
            drop(shared);

            if existing.is_removing() {
                debug!("Dropping stale index entry of object being removed");
                let stale = existing.shared();
                objs.unindex(existing.pooldef(), &stale);
            } else {
                if let Some(uuid) = uuid {
                    if existing.name() != name {
                        return Err(PoolObjError::OperationFailed(format!(
                            "{} '{}' is already defined with uuid {}",
                            self.table_type,
                            existing.name(),
                            uuid
                        )));
                    }
                }

                match assign {
                    Some(assign) => assign(&mut *existing, def, old_def, flags)?,
                    None => {
                        let previous = existing.replace_def(def);
                        if let Some(slot) = old_def {
                            *slot = Some(previous);
                        }
                    }
                }

                debug!("Redefined existing object");
                return Ok(existing);
            }
        }

        if let Some(shared) = objs.by_name.get(&name).cloned() {
            let existing = LockedPoolObj::acquire(&shared);
            drop(shared);

            if existing.is_removing() {
                let stale = existing.shared();
                objs.unindex(existing.pooldef(), &stale);
            } else {
                return Err(PoolObjError::OperationFailed(format!(
                    "{} '{}' already exists with uuid {}",
                    self.table_type,
                    name,
                    existing.pooldef().uuid_display()
                )));
            }
        }

        let obj: SharedPoolObj<D, P> = Arc::new(Mutex::new(PoolObj::new(
            PoolDef::new(uuid, name.clone()),
            def,
            new_def,
        )));
        let locked = LockedPoolObj::acquire(&obj);

        if let Some(uuid) = uuid {
            objs.by_uuid.insert(uuid, Arc::clone(&obj));
        }
        objs.by_name.insert(name, obj);

        debug!("Added new object");
        Ok(locked)
    }

    /// Unindex a locked object and release the caller's handle.
    ///
    /// The object is marked as being removed first, so anyone who finds it
    /// while this call waits for the table lock treats it as absent. Index
    /// slots that meanwhile were taken over by a new object with the same
    /// identity are left untouched.
    #[instrument(skip(self, obj), fields(table = %self.table_type, name = %obj.name()))]
    pub fn remove(&self, mut obj: LockedPoolObj<D, P>) {
        obj.mark_removing();
        let pooldef = obj.pooldef().clone();
        let target = obj.shared();
        drop(obj);

        let mut objs = self.objs.lock();
        let relocked = LockedPoolObj::acquire(&target);
        objs.unindex(&pooldef, &target);
        drop(relocked);
        drop(target);
        drop(objs);

        debug!("Removed object");
    }

    /// Drop every object from the table, returning how many there were.
    ///
    /// Only the table's references are released, so this never waits on an
    /// object lock and may be called while holding objects of this table.
    /// Objects nobody holds are also marked as removing. Held ones stay
    /// `Present`, but no lookup can reach them anymore.
    #[instrument(skip(self), fields(table = %self.table_type))]
    pub fn clear_all(&self) -> usize {
        let mut objs = self.objs.lock();
        objs.by_uuid.clear();
        let drained: Vec<_> = objs.by_name.drain().map(|(_, obj)| obj).collect();
        drop(objs);

        let mut held = 0;
        for obj in &drained {
            match obj.try_lock() {
                Some(mut obj) => obj.mark_removing(),
                None => held += 1,
            }
        }

        debug!(count = drained.len(), held, "Cleared table");
        drained.len()
    }

    // ------------------------------------------------------------------
    // Lookup
    // ------------------------------------------------------------------

    /// Find by UUID, keeping the table locked until the object is locked.
    ///
    /// Always `None` on name-only tables.
    pub fn find_by_uuid(&self, uuid: &Uuid) -> Option<LockedPoolObj<D, P>> {
        if self.name_only {
            return None;
        }
        let objs = self.objs.lock();
        let locked = objs.by_uuid.get(uuid).map(LockedPoolObj::acquire);
        drop(objs);
        locked.and_then(LockedPoolObj::unless_removing)
    }

    /// Find by UUID, releasing the table before waiting on the object lock.
    ///
    /// Preferable when the object may be held for a long time by others.
    pub fn find_by_uuid_ref(&self, uuid: &Uuid) -> Option<LockedPoolObj<D, P>> {
        if self.name_only {
            return None;
        }
        let shared = self.objs.lock().by_uuid.get(uuid).cloned()?;
        LockedPoolObj::acquire(&shared).unless_removing()
    }

    /// Find by name. The table is released before the object is locked.
    pub fn find_by_name(&self, name: &str) -> Option<LockedPoolObj<D, P>> {
        let shared = self.objs.lock().by_name.get(name).cloned()?;
        LockedPoolObj::acquire(&shared).unless_removing()
    }

    fn search_shared(
        &self,
        objs: &TableObjs<D, P>,
        pred: &dyn Fn(&PoolObj<D, P>) -> bool,
    ) -> Option<SharedPoolObj<D, P>> {
        objs.by_name
            .values()
            .find(|shared| {
                let obj = shared.lock();
                !obj.is_removing() && pred(&*obj)
            })
            .cloned()
    }

    /// Return the first object for which `pred` holds.
    ///
    /// Each candidate is locked while `pred` runs, and the table stays
    /// locked until the match is locked again for the caller. The caller
    /// must not hold any object lock of this table.
    pub fn search(&self, pred: &dyn Fn(&PoolObj<D, P>) -> bool) -> Option<LockedPoolObj<D, P>> {
        let objs = self.objs.lock();
        let locked = self
            .search_shared(&objs, pred)
            .map(|shared| LockedPoolObj::acquire(&shared));
        drop(objs);
        locked.and_then(LockedPoolObj::unless_removing)
    }

    /// Like [`search`](Self::search) but releases the table before locking
    /// the match.
    pub fn search_ref(
        &self,
        pred: &dyn Fn(&PoolObj<D, P>) -> bool,
    ) -> Option<LockedPoolObj<D, P>> {
        let shared = {
            let objs = self.objs.lock();
            self.search_shared(&objs, pred)?
        };
        LockedPoolObj::acquire(&shared).unless_removing()
    }

    // ------------------------------------------------------------------
    // Traversal
    // ------------------------------------------------------------------

    /// Call `cb` on every live object, each locked in turn, under one table
    /// lock.
    pub fn iterate(&self, mut cb: impl FnMut(&mut PoolObj<D, P>)) {
        let objs = self.objs.lock();
        for shared in objs.by_name.values() {
            let mut obj = shared.lock();
            if !obj.is_removing() {
                cb(&mut *obj);
            }
        }
    }

    /// Snapshot the table and return referenced handles to every live object
    /// passing `acl` and `matchf`.
    ///
    /// Filtering happens after the table lock is released. The returned
    /// handles are unlocked; lock them with [`LockedPoolObj::acquire`].
    pub fn collect<C: ?Sized>(
        &self,
        conn: &C,
        acl: Option<&AclFilterFn<C, D>>,
        matchf: Option<&MatchFilterFn<D, P>>,
        flags: u32,
    ) -> Vec<SharedPoolObj<D, P>> {
        let snapshot: Vec<_> = {
            let objs = self.objs.lock();
            objs.by_name.values().cloned().collect()
        };

        snapshot
            .into_iter()
            .filter(|shared| {
                let obj = shared.lock();
                !obj.is_removing()
                    && acl.map_or(true, |acl| acl(conn, obj.def()))
                    && matchf.map_or(true, |matchf| matchf(&*obj, flags))
            })
            .collect()
    }

    /// Call `cb` on every live object visible through `acl`, in one locked
    /// pass. The first callback error aborts the traversal and is returned.
    ///
    /// Returns the number of objects passed to `cb`.
    pub fn list<C: ?Sized>(
        &self,
        conn: &C,
        acl: Option<&AclFilterFn<C, D>>,
        mut cb: impl FnMut(&PoolObj<D, P>) -> Result<()>,
    ) -> Result<usize> {
        let objs = self.objs.lock();
        let mut visited = 0;
        for shared in objs.by_name.values() {
            let obj = shared.lock();
            if obj.is_removing() || !acl.map_or(true, |acl| acl(conn, obj.def())) {
                continue;
            }
            cb(&*obj)?;
            visited += 1;
        }
        Ok(visited)
    }

    // ------------------------------------------------------------------
    // Bulk
    // ------------------------------------------------------------------

    /// Build an independent table holding a copy of every live object.
    ///
    /// `cb` produces the copied definition. Flags, pending definitions and
    /// private data are not carried over. Fails as a whole if any entry
    /// fails.
    #[instrument(skip(self, cb), fields(table = %self.table_type))]
    pub fn clone_table(
        &self,
        cb: impl Fn(&PoolObj<D, P>) -> Result<D>,
    ) -> Result<PoolObjTable<D, P>> {
        let dst = PoolObjTable::new(self.table_type, self.hash_start, self.name_only);

        let objs = self.objs.lock();
        for shared in objs.by_name.values() {
            let src = shared.lock();
            if src.is_removing() {
                continue;
            }
            let def = cb(&*src).map_err(|e| {
                PoolObjError::CloneFailed(format!("{} '{}': {}", self.table_type, src.name(), e))
            })?;

            let mut entry = PoolObjEntry::new(src.name(), def);
            if let Some(uuid) = src.uuid() {
                entry = entry.with_uuid(uuid);
            }
            dst.add(entry, None, None, 0)?;
        }
        drop(objs);

        debug!(count = dst.len(), "Cloned table");
        Ok(dst)
    }

    /// Remove every object matching `matchf` in one locked pass, returning
    /// how many were removed.
    ///
    /// Pruned objects are marked as removing, so outstanding handles see
    /// them as gone.
    #[instrument(skip(self, matchf), fields(table = %self.table_type))]
    pub fn prune(&self, matchf: &MatchFilterFn<D, P>, flags: u32) -> usize {
        let mut objs = self.objs.lock();

        let doomed: Vec<(PoolDef, SharedPoolObj<D, P>)> = objs
            .by_name
            .values()
            .filter_map(|shared| {
                let mut obj = shared.lock();
                if obj.is_removing() || !matchf(&*obj, flags) {
                    return None;
                }
                obj.mark_removing();
                Some((obj.pooldef().clone(), Arc::clone(shared)))
            })
            .collect();

        for (pooldef, target) in &doomed {
            objs.unindex(pooldef, target);
        }
        drop(objs);

        debug!(count = doomed.len(), "Pruned objects");
        doomed.len()
    }
}

impl<D, P> fmt::Debug for PoolObjTable<D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolObjTable")
            .field("table_type", &self.table_type)
            .field("hash_start", &self.hash_start)
            .field("name_only", &self.name_only)
            .field("len", &self.len())
            .finish()
    }
}
