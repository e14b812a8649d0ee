//! Change notification fan-out
//!
//! Listeners are told about every committed registry mutation. Dispatch
//! always happens after the change is applied and never while the
//! membership lock is held, so a listener may call back into the registry.

use parking_lot::{Mutex, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use vsim_types::{ObjectRef, PropertyChange};

/// A committed registry mutation
#[derive(Debug, Clone, PartialEq)]
pub enum RegistryEvent {
    /// An object was registered
    Put { obj: ObjectRef },
    /// Properties of a registered object changed
    Update {
        obj: ObjectRef,
        changes: Vec<PropertyChange>,
    },
    /// An object was removed
    Remove { obj: ObjectRef },
}

impl RegistryEvent {
    pub fn obj(&self) -> &ObjectRef {
        match self {
            RegistryEvent::Put { obj } => obj,
            RegistryEvent::Update { obj, .. } => obj,
            RegistryEvent::Remove { obj } => obj,
        }
    }
}

/// Receiver of registry change events
pub trait RegistryListener: Send + Sync {
    fn put_object(&self, _obj: &ObjectRef) {}

    fn update_object(&self, _obj: &ObjectRef, _changes: &[PropertyChange]) {}

    fn remove_object(&self, _obj: &ObjectRef) {}

    fn handle_event(&self, event: &RegistryEvent) {
        match event {
            RegistryEvent::Put { obj } => self.put_object(obj),
            RegistryEvent::Update { obj, changes } => self.update_object(obj, changes),
            RegistryEvent::Remove { obj } => self.remove_object(obj),
        }
    }
}

/// A listener that records every event it sees
#[derive(Debug, Default)]
pub struct CollectingListener {
    events: Mutex<Vec<RegistryEvent>>,
}

impl CollectingListener {
    pub fn new() -> Self {
        Self::default()
    }

    /// Take the recorded events, leaving the listener empty
    pub fn take(&self) -> Vec<RegistryEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.lock().is_empty()
    }
}

impl RegistryListener for CollectingListener {
    fn handle_event(&self, event: &RegistryEvent) {
        self.events.lock().push(event.clone());
    }
}

/// Handle returned by [`Registry::add_handler`](crate::Registry::add_handler)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(pub u64);

static LISTENER_COUNTER: AtomicU64 = AtomicU64::new(1);

impl ListenerId {
    fn next() -> Self {
        Self(LISTENER_COUNTER.fetch_add(1, Ordering::SeqCst))
    }
}

/// Registered listeners
#[derive(Default)]
pub(crate) struct ListenerSet {
    listeners: RwLock<Vec<(ListenerId, Arc<dyn RegistryListener>)>>,
}

impl ListenerSet {
    pub(crate) fn add(&self, listener: Arc<dyn RegistryListener>) -> ListenerId {
        let id = ListenerId::next();
        self.listeners.write().push((id, listener));
        id
    }

    pub(crate) fn remove(&self, id: ListenerId) -> bool {
        let mut listeners = self.listeners.write();
        let before = listeners.len();
        listeners.retain(|(lid, _)| *lid != id);
        listeners.len() != before
    }

    pub(crate) fn len(&self) -> usize {
        self.listeners.read().len()
    }

    /// Deliver an event to a snapshot of the current listeners
    pub(crate) fn dispatch(&self, event: &RegistryEvent) {
        let snapshot: Vec<Arc<dyn RegistryListener>> = self
            .listeners
            .read()
            .iter()
            .map(|(_, l)| Arc::clone(l))
            .collect();

        for listener in snapshot {
            listener.handle_event(event);
        }
    }
}
