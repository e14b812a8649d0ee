//! Per-object locks

use crate::context::ContextId;
use crate::object::ManagedObject;
use crate::registry::ObjectCell;
use parking_lot::{Condvar, Mutex};
use std::sync::Arc;
use tracing::trace;
use vsim_types::{DataObject, ObjectRef};

#[derive(Debug, Default)]
struct LockState {
    owner: Option<ContextId>,
    depth: usize,
}

/// Re-entrant (per context identity) mutual exclusion for one object
#[derive(Debug, Default)]
pub(crate) struct ObjectLock {
    state: Mutex<LockState>,
    released: Condvar,
}

impl ObjectLock {
    pub(crate) fn acquire(&self, owner: ContextId) {
        let mut state = self.state.lock();
        loop {
            match state.owner {
                None => {
                    state.owner = Some(owner);
                    state.depth = 1;
                    return;
                }
                Some(current) if current == owner => {
                    state.depth += 1;
                    return;
                }
                Some(_) => self.released.wait(&mut state),
            }
        }
    }

    pub(crate) fn try_acquire(&self, owner: ContextId) -> bool {
        let mut state = self.state.lock();
        match state.owner {
            None => {
                state.owner = Some(owner);
                state.depth = 1;
                true
            }
            Some(current) if current == owner => {
                state.depth += 1;
                true
            }
            Some(_) => false,
        }
    }

    pub(crate) fn release(&self, owner: ContextId) {
        let mut state = self.state.lock();
        if state.owner != Some(owner) {
            return;
        }
        state.depth -= 1;
        if state.depth == 0 {
            state.owner = None;
            self.released.notify_one();
        }
    }

    pub(crate) fn owner(&self) -> Option<ContextId> {
        self.state.lock().owner
    }
}

/// Proof that a context holds an object's lock.
///
/// The lock is released when the guard is dropped. Guards are `Send`, so a
/// held lock can be moved onto a worker thread and released there.
pub struct LockGuard {
    pub(crate) cell: Arc<ObjectCell>,
    owner: ContextId,
}

impl LockGuard {
    pub(crate) fn new(cell: Arc<ObjectCell>, owner: ContextId) -> Self {
        trace!(obj = %cell.reference, %owner, "lock acquired");
        Self { cell, owner }
    }

    pub fn reference(&self) -> &ObjectRef {
        &self.cell.reference
    }

    pub fn owner(&self) -> ContextId {
        self.owner
    }

    pub fn view(&self) -> DataObject {
        self.cell.state.read().view()
    }

    pub fn read<R>(&self, f: impl FnOnce(&dyn ManagedObject) -> R) -> R {
        let state = self.cell.state.read();
        f(&**state)
    }

    /// Read the object as its concrete type; `None` on a type mismatch
    pub fn read_as<T: ManagedObject, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let state = self.cell.state.read();
        state.as_any().downcast_ref::<T>().map(f)
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        self.cell.lock.release(self.owner);
        trace!(obj = %self.cell.reference, owner = %self.owner, "lock released");
    }
}

impl std::fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("obj", &self.cell.reference)
            .field("owner", &self.owner)
            .finish()
    }
}
