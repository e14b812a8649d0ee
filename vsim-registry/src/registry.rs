//! The object registry

use crate::context::{Context, ContextId};
use crate::listener::{ListenerId, ListenerSet, RegistryEvent, RegistryListener};
use crate::lock::{LockGuard, ObjectLock};
use crate::object::ManagedObject;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, trace};
use vsim_types::{DataObject, Fault, ObjectRef, PropertyChange, Result, Value};

/// Storage slot for one registered object
pub(crate) struct ObjectCell {
    pub(crate) reference: ObjectRef,
    pub(crate) lock: ObjectLock,
    pub(crate) state: RwLock<Box<dyn ManagedObject>>,
}

impl ObjectCell {
    fn new(reference: ObjectRef, obj: Box<dyn ManagedObject>) -> Arc<Self> {
        Arc::new(Self {
            reference,
            lock: ObjectLock::default(),
            state: RwLock::new(obj),
        })
    }
}

/// Read access to a registered object without taking its lock.
///
/// Reads see the latest committed field state. Use
/// [`Registry::with_lock`] when the read must not interleave with a
/// writer's critical section.
#[derive(Clone)]
pub struct ObjectHandle {
    cell: Arc<ObjectCell>,
}

impl ObjectHandle {
    pub fn reference(&self) -> &ObjectRef {
        &self.cell.reference
    }

    pub fn kind(&self) -> &'static str {
        self.cell.state.read().kind()
    }

    pub fn is_a(&self, kind: &str) -> bool {
        self.cell.state.read().is_a(kind)
    }

    pub fn view(&self) -> DataObject {
        self.cell.state.read().view()
    }

    pub fn read<R>(&self, f: impl FnOnce(&dyn ManagedObject) -> R) -> R {
        let state = self.cell.state.read();
        f(&**state)
    }

    pub fn read_as<T: ManagedObject, R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        let state = self.cell.state.read();
        state.as_any().downcast_ref::<T>().map(f)
    }
}

impl std::fmt::Debug for ObjectHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ObjectHandle").field(&self.cell.reference).finish()
    }
}

/// Holds every simulated object.
///
/// Membership (insert, remove, iteration) is guarded by one coarse lock.
/// Field state of each object is guarded by that object's own lock, which
/// is owned by a [`Context`]. All mutation goes through [`Registry::update`]
/// or [`Registry::atomic_update`] so that listeners observe every change.
///
/// Multi-object critical sections must lock parent before child. The
/// helpers here ([`put_entity`](Registry::put_entity),
/// [`remove_entity`](Registry::remove_entity)) never hold two object locks
/// at once.
pub struct Registry {
    objects: RwLock<HashMap<ObjectRef, Arc<ObjectCell>>>,
    counter: AtomicU64,
    listeners: ListenerSet,
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}

impl Registry {
    pub fn new() -> Self {
        Self {
            objects: RwLock::new(HashMap::new()),
            counter: AtomicU64::new(0),
            listeners: ListenerSet::default(),
        }
    }

    /// Allocate a fresh reference of the given kind, e.g. `vm-7`
    pub fn allocate_ref(&self, kind: &str, prefix: &str) -> ObjectRef {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        ObjectRef::new(kind, format!("{}-{}", prefix, n))
    }

    /// Register an object under a freshly allocated reference.
    ///
    /// Allocated identifiers share a namespace with well-known references
    /// registered through [`put_with_ref`](Registry::put_with_ref); a taken
    /// identifier is skipped.
    pub fn put<T: ManagedObject>(&self, obj: T) -> ObjectRef {
        let kind = obj.kind();
        let prefix = obj.id_prefix();
        let mut obj: Box<dyn ManagedObject> = Box::new(obj);
        loop {
            let reference = self.allocate_ref(kind, &prefix);
            match self.insert(&reference, obj) {
                Ok(()) => return reference,
                Err(rejected) => {
                    trace!(obj = %reference, "reference taken, allocating another");
                    obj = rejected;
                }
            }
        }
    }

    /// Register an object that needs to know its own reference.
    ///
    /// `build` runs again with a new reference if the allocated one is taken.
    pub fn put_with<T, F>(&self, kind: &str, prefix: &str, mut build: F) -> ObjectRef
    where
        T: ManagedObject,
        F: FnMut(&ObjectRef) -> T,
    {
        loop {
            let reference = self.allocate_ref(kind, prefix);
            if self.insert(&reference, Box::new(build(&reference))).is_ok() {
                return reference;
            }
            trace!(obj = %reference, "reference taken, allocating another");
        }
    }

    /// Register an object under a well-known reference
    pub fn put_with_ref<T: ManagedObject>(&self, reference: ObjectRef, obj: T) -> Result<ObjectRef> {
        if reference.is_empty() {
            return Err(Fault::invalid_argument("reference"));
        }
        match self.insert(&reference, Box::new(obj)) {
            Ok(()) => Ok(reference),
            Err(_) => Err(Fault::AlreadyExists {
                name: reference.to_string(),
            }),
        }
    }

    /// Insert unless the reference is taken, handing the object back if so
    fn insert(
        &self,
        reference: &ObjectRef,
        obj: Box<dyn ManagedObject>,
    ) -> std::result::Result<(), Box<dyn ManagedObject>> {
        {
            let mut objects = self.objects.write();
            if objects.contains_key(reference) {
                return Err(obj);
            }
            objects.insert(reference.clone(), ObjectCell::new(reference.clone(), obj));
        }
        debug!(obj = %reference, "registered object");
        self.listeners.dispatch(&RegistryEvent::Put {
            obj: reference.clone(),
        });
        Ok(())
    }

    /// Register `obj` as a child of `parent`.
    ///
    /// The child's `parent` property is set and the child is appended to
    /// the parent's `childEntity` list, both through the update path so
    /// listeners see the parent change. If the parent disappears before it
    /// lists the child, the child is unregistered again and the fault is
    /// returned.
    pub fn put_entity<T: ManagedObject>(
        &self,
        ctx: &Context,
        parent: &ObjectRef,
        obj: T,
    ) -> Result<ObjectRef> {
        if !self.contains(parent) {
            return Err(Fault::ManagedObjectNotFound {
                obj: parent.clone(),
            });
        }
        let reference = self.put(obj);
        let linked = self
            .atomic_update(
                ctx,
                &reference,
                vec![PropertyChange::assign("parent", parent.clone())],
            )
            .and_then(|()| {
                self.atomic_update(
                    ctx,
                    parent,
                    vec![PropertyChange::add("childEntity", reference.clone())],
                )
            });
        if let Err(fault) = linked {
            debug!(obj = %reference, %parent, %fault, "could not link child, unregistering it");
            self.remove(&reference);
            return Err(fault);
        }
        Ok(reference)
    }

    /// Detach an entity from its parent, then remove it
    pub fn remove_entity(&self, ctx: &Context, reference: &ObjectRef) -> Result<()> {
        let handle = self.get(reference).ok_or_else(|| Fault::ManagedObjectNotFound {
            obj: reference.clone(),
        })?;
        let parent = handle.view().get("parent").and_then(Value::as_ref).cloned();

        if let Some(parent) = parent {
            if self.contains(&parent) {
                self.atomic_update(
                    ctx,
                    &parent,
                    vec![PropertyChange::remove("childEntity", reference.clone())],
                )?;
            }
        }

        self.remove(reference);
        Ok(())
    }

    /// Look up an object; absence is an ordinary outcome
    pub fn get(&self, reference: &ObjectRef) -> Option<ObjectHandle> {
        self.cell(reference).map(|cell| ObjectHandle { cell })
    }

    pub fn contains(&self, reference: &ObjectRef) -> bool {
        self.objects.read().contains_key(reference)
    }

    /// Remove an object; returns false when it was not registered
    pub fn remove(&self, reference: &ObjectRef) -> bool {
        let removed = self.objects.write().remove(reference).is_some();
        if removed {
            debug!(obj = %reference, "removed object");
            self.listeners.dispatch(&RegistryEvent::Remove {
                obj: reference.clone(),
            });
        }
        removed
    }

    /// Live references of a kind, including objects that are-a `kind`
    pub fn references(&self, kind: &str) -> Vec<ObjectRef> {
        let cells: Vec<Arc<ObjectCell>> = self.objects.read().values().cloned().collect();
        let mut refs: Vec<ObjectRef> = cells
            .into_iter()
            .filter(|cell| cell.state.read().is_a(kind))
            .map(|cell| cell.reference.clone())
            .collect();
        refs.sort();
        refs
    }

    pub fn len(&self) -> usize {
        self.objects.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.read().is_empty()
    }

    fn cell(&self, reference: &ObjectRef) -> Option<Arc<ObjectCell>> {
        self.objects.read().get(reference).cloned()
    }

    /// Take an object's lock on behalf of `ctx`, blocking while another
    /// context holds it
    pub fn acquire_lock(&self, ctx: &Context, reference: &ObjectRef) -> Result<LockGuard> {
        let cell = self.cell(reference).ok_or_else(|| Fault::ManagedObjectNotFound {
            obj: reference.clone(),
        })?;
        cell.lock.acquire(ctx.id());
        Ok(LockGuard::new(cell, ctx.id()))
    }

    /// Non-blocking [`acquire_lock`](Registry::acquire_lock); `Ok(None)` when
    /// another context holds the lock
    pub fn try_acquire_lock(
        &self,
        ctx: &Context,
        reference: &ObjectRef,
    ) -> Result<Option<LockGuard>> {
        let cell = self.cell(reference).ok_or_else(|| Fault::ManagedObjectNotFound {
            obj: reference.clone(),
        })?;
        if cell.lock.try_acquire(ctx.id()) {
            Ok(Some(LockGuard::new(cell, ctx.id())))
        } else {
            Ok(None)
        }
    }

    /// Context currently holding an object's lock
    pub fn lock_owner(&self, reference: &ObjectRef) -> Option<ContextId> {
        self.cell(reference).and_then(|cell| cell.lock.owner())
    }

    /// Run `f` while holding an object's lock
    pub fn with_lock<R>(
        &self,
        ctx: &Context,
        reference: &ObjectRef,
        f: impl FnOnce(&LockGuard) -> R,
    ) -> Result<R> {
        let guard = self.acquire_lock(ctx, reference)?;
        Ok(f(&guard))
    }

    /// Apply changes to an object whose lock the caller already holds.
    ///
    /// Changes are applied in order to a copy of the object, which replaces
    /// the stored state only once every change is accepted. A rejected
    /// change leaves the object untouched and nothing is dispatched.
    /// Listeners are notified after the changes are committed.
    pub fn update(&self, guard: &LockGuard, changes: Vec<PropertyChange>) -> Result<()> {
        if changes.is_empty() {
            return Ok(());
        }
        {
            let mut state = guard.cell.state.write();
            let mut staged = state.clone_object();
            for change in &changes {
                staged.apply_change(change)?;
            }
            *state = staged;
        }
        trace!(obj = %guard.reference(), changes = changes.len(), "updated object");
        self.listeners.dispatch(&RegistryEvent::Update {
            obj: guard.reference().clone(),
            changes,
        });
        Ok(())
    }

    /// Lock, update and unlock in one step
    pub fn atomic_update(
        &self,
        ctx: &Context,
        reference: &ObjectRef,
        changes: Vec<PropertyChange>,
    ) -> Result<()> {
        let guard = self.acquire_lock(ctx, reference)?;
        self.update(&guard, changes)
    }

    /// Subscribe to committed changes
    pub fn add_handler(&self, listener: Arc<dyn RegistryListener>) -> ListenerId {
        self.listeners.add(listener)
    }

    pub fn remove_handler(&self, id: ListenerId) -> bool {
        self.listeners.remove(id)
    }

    pub fn handler_count(&self) -> usize {
        self.listeners.len()
    }
}
