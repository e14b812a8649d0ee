//! vsim-registry: storage for every simulated object
//!
//! The registry maps references to objects and provides the locking and
//! change notification primitives the task engine and the property
//! collector are built on:
//!
//! - **Context**: the identity a lock is held under. Cloning a context
//!   shares the identity, which lets a caller hand a held lock to a worker.
//! - **ManagedObject**: the capabilities a registered object exposes
//!   (kind, is-a relations, canonical view, change application).
//! - **Registry**: membership, per-object locks, updates, listeners.
//! - **RegistryListener**: receives committed changes, after the fact.
//!
//! # Example
//!
//! ```ignore
//! use vsim_registry::{Context, Registry};
//!
//! let registry = Registry::new();
//! let ctx = Context::new();
//! let folder = registry.put(my_folder);
//!
//! registry.with_lock(&ctx, &folder, |guard| {
//!     registry.update(guard, vec![PropertyChange::assign("name", "vm")])
//! })??;
//! ```

mod context;
mod listener;
mod lock;
mod object;
mod registry;

pub use context::{Context, ContextId};
pub use listener::{CollectingListener, ListenerId, RegistryEvent, RegistryListener};
pub use lock::LockGuard;
pub use object::{CloneObject, ManagedObject};
pub use registry::{ObjectHandle, Registry};
