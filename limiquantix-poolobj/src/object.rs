//! A single registry entry and its lock guard.
//!
//! Every [`PoolObj`] lives behind its own `Arc<Mutex<_>>`. The `Arc` strong
//! count is the object's reference count: one per table index holding it plus
//! one per live caller handle. The object is dropped (definitions, pending
//! definition and private data with it) when the last reference goes away.
//!
//! Lookups hand out a [`LockedPoolObj`], which owns one reference *and* the
//! object lock. Dropping it unlocks and then releases the reference, which is
//! the whole "EndAPI" contract.

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::Arc;

use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};
use tracing::debug;
use uuid::Uuid;

use crate::types::PoolDef;

/// Reference-counted, independently lockable pool object.
pub type SharedPoolObj<D, P = ()> = Arc<Mutex<PoolObj<D, P>>>;

/// Table-managed lifecycle state.
///
/// Only the owning table moves an object to `Removing`, and never back.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObjState {
    /// Indexed and visible to lookups
    Present,
    /// Unindexed (or about to be); lookups treat it as absent
    Removing,
}

/// One managed entity: identity, current and pending definition, state flags
/// and typed subsystem sidecar data.
///
/// All accessors assume the caller holds the object lock, which is the only
/// way to reach a `PoolObj` at all.
pub struct PoolObj<D, P = ()> {
    pooldef: PoolDef,

    active: bool,
    being_removed: bool,
    autostart: bool,
    persistent: bool,
    updated: bool,

    state: ObjState,

    def: D,
    new_def: Option<D>,

    private_data: Option<P>,
}

impl<D, P> PoolObj<D, P> {
    /// Create an unindexed object. All flags start cleared.
    pub fn new(pooldef: PoolDef, def: D, new_def: Option<D>) -> Self {
        debug!(
            name = %pooldef.name(),
            uuid = %pooldef.uuid_display(),
            has_new_def = new_def.is_some(),
            "Creating pool object"
        );
        Self {
            pooldef,
            active: false,
            being_removed: false,
            autostart: false,
            persistent: false,
            updated: false,
            state: ObjState::Present,
            def,
            new_def,
            private_data: None,
        }
    }

    pub fn pooldef(&self) -> &PoolDef {
        &self.pooldef
    }

    pub fn name(&self) -> &str {
        self.pooldef.name()
    }

    pub fn uuid(&self) -> Option<Uuid> {
        self.pooldef.uuid()
    }

    pub fn state(&self) -> ObjState {
        self.state
    }

    /// True once the table has started removing this object.
    pub fn is_removing(&self) -> bool {
        self.state == ObjState::Removing
    }

    pub(crate) fn mark_removing(&mut self) {
        self.state = ObjState::Removing;
    }

    // ------------------------------------------------------------------
    // Definitions
    // ------------------------------------------------------------------

    pub fn def(&self) -> &D {
        &self.def
    }

    pub fn def_mut(&mut self) -> &mut D {
        &mut self.def
    }

    /// Replace the current definition, dropping the previous one.
    pub fn set_def(&mut self, def: D) {
        self.def = def;
    }

    /// Replace the current definition and hand the previous one back.
    pub fn replace_def(&mut self, def: D) -> D {
        std::mem::replace(&mut self.def, def)
    }

    pub fn new_def(&self) -> Option<&D> {
        self.new_def.as_ref()
    }

    /// Replace the pending definition, dropping the previous one.
    pub fn set_new_def(&mut self, new_def: Option<D>) {
        self.new_def = new_def;
    }

    pub fn take_new_def(&mut self) -> Option<D> {
        self.new_def.take()
    }

    /// Promote the pending definition to current, if there is one.
    ///
    /// Used when an active object stops and its staged redefinition takes
    /// effect. Returns true if a pending definition was applied.
    pub fn apply_new_def(&mut self) -> bool {
        match self.new_def.take() {
            Some(next) => {
                self.def = next;
                true
            }
            None => false,
        }
    }

    // ------------------------------------------------------------------
    // Private data
    // ------------------------------------------------------------------

    /// Attach subsystem sidecar data, returning whatever was attached before.
    pub fn set_private_data(&mut self, data: P) -> Option<P> {
        self.private_data.replace(data)
    }

    pub fn private_data(&self) -> Option<&P> {
        self.private_data.as_ref()
    }

    pub fn private_data_mut(&mut self) -> Option<&mut P> {
        self.private_data.as_mut()
    }

    pub fn take_private_data(&mut self) -> Option<P> {
        self.private_data.take()
    }

    // ------------------------------------------------------------------
    // Flags
    // ------------------------------------------------------------------

    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set_autostart(&mut self, autostart: bool) {
        self.autostart = autostart;
    }

    pub fn is_autostart(&self) -> bool {
        self.autostart
    }

    pub fn set_being_removed(&mut self, being_removed: bool) {
        self.being_removed = being_removed;
    }

    pub fn is_being_removed(&self) -> bool {
        self.being_removed
    }

    pub fn set_persistent(&mut self, persistent: bool) {
        self.persistent = persistent;
    }

    pub fn is_persistent(&self) -> bool {
        self.persistent
    }

    pub fn set_updated(&mut self, updated: bool) {
        self.updated = updated;
    }

    pub fn is_updated(&self) -> bool {
        self.updated
    }
}

impl<D, P> fmt::Debug for PoolObj<D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PoolObj")
            .field("name", &self.pooldef.name())
            .field("uuid", &self.pooldef.uuid())
            .field("state", &self.state)
            .field("active", &self.active)
            .field("autostart", &self.autostart)
            .field("persistent", &self.persistent)
            .field("has_new_def", &self.new_def.is_some())
            .field("has_private_data", &self.private_data.is_some())
            .finish()
    }
}

impl<D, P> Drop for PoolObj<D, P> {
    fn drop(&mut self) {
        debug!(
            name = %self.pooldef.name(),
            uuid = %self.pooldef.uuid_display(),
            "Disposing pool object"
        );
    }
}

/// A pool object that is both referenced and locked by the holder.
///
/// Dropping the guard unlocks the object and then releases the reference.
pub struct LockedPoolObj<D, P = ()> {
    guard: ArcMutexGuard<RawMutex, PoolObj<D, P>>,
}

impl<D, P> LockedPoolObj<D, P> {
    /// Take a reference on `obj` and lock it, blocking until available.
    ///
    /// Does not check the removal state: use this for handles obtained from
    /// [`PoolObjTable::collect`](crate::PoolObjTable::collect) or kept across
    /// calls, and check [`PoolObj::is_removing`] where it matters.
    pub fn acquire(obj: &SharedPoolObj<D, P>) -> Self {
        Self {
            guard: obj.lock_arc(),
        }
    }

    /// Hand out an additional reference to the underlying object.
    pub fn shared(&self) -> SharedPoolObj<D, P> {
        Arc::clone(ArcMutexGuard::mutex(&self.guard))
    }

    /// Explicit spelling of drop: unlock, then unref.
    pub fn end_api(self) {}

    /// Keep the guard only if the object has not started being removed.
    pub(crate) fn unless_removing(self) -> Option<Self> {
        if self.guard.is_removing() {
            None
        } else {
            Some(self)
        }
    }
}

impl<D, P> Deref for LockedPoolObj<D, P> {
    type Target = PoolObj<D, P>;

    fn deref(&self) -> &Self::Target {
        &self.guard
    }
}

impl<D, P> DerefMut for LockedPoolObj<D, P> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.guard
    }
}

impl<D, P> fmt::Debug for LockedPoolObj<D, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("LockedPoolObj").field(&*self.guard).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn shared(name: &str, def: u32) -> SharedPoolObj<u32, String> {
        Arc::new(Mutex::new(PoolObj::new(PoolDef::new(None, name), def, None)))
    }

    #[test]
    fn test_new_object_flags_cleared() {
        let obj: PoolObj<u32> = PoolObj::new(PoolDef::new(None, "vol1"), 7, None);
        assert!(!obj.is_active());
        assert!(!obj.is_autostart());
        assert!(!obj.is_being_removed());
        assert!(!obj.is_persistent());
        assert!(!obj.is_updated());
        assert!(!obj.is_removing());
        assert_eq!(*obj.def(), 7);
        assert!(obj.new_def().is_none());
    }

    #[test]
    fn test_def_replacement() {
        let mut obj: PoolObj<u32> = PoolObj::new(PoolDef::new(None, "vol1"), 1, Some(2));
        assert_eq!(obj.replace_def(3), 1);
        assert!(obj.apply_new_def());
        assert_eq!(*obj.def(), 2);
        assert!(!obj.apply_new_def());
        obj.set_new_def(Some(9));
        assert_eq!(obj.take_new_def(), Some(9));
    }

    #[test]
    fn test_private_data_returns_previous() {
        let mut obj: PoolObj<u32, String> = PoolObj::new(PoolDef::new(None, "p"), 0, None);
        assert_eq!(obj.set_private_data("first".to_string()), None);
        assert_eq!(
            obj.set_private_data("second".to_string()).as_deref(),
            Some("first")
        );
        assert_eq!(obj.private_data().map(String::as_str), Some("second"));
    }

    #[test]
    fn test_locked_guard_end_api_releases_ref_and_lock() {
        let obj = shared("pool", 1);
        assert_eq!(Arc::strong_count(&obj), 1);

        let mut locked = LockedPoolObj::acquire(&obj);
        assert_eq!(Arc::strong_count(&obj), 2);
        assert!(obj.try_lock().is_none());
        locked.set_active(true);

        let extra = locked.shared();
        assert_eq!(Arc::strong_count(&obj), 3);
        drop(extra);

        locked.end_api();
        assert_eq!(Arc::strong_count(&obj), 1);
        assert!(obj.lock().is_active());
    }

    #[test]
    fn test_unless_removing() {
        let obj = shared("pool", 1);
        let mut locked = LockedPoolObj::acquire(&obj);
        locked.mark_removing();
        assert!(locked.unless_removing().is_none());
        // guard dropped: lock released
        assert!(obj.try_lock().is_some());
    }
}
