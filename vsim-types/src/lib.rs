//! Shared types for vsim
//!
//! This crate provides the data model shared by the registry, the task
//! engine and the property collector: object references, the dynamic
//! property value model, property changes and paths, and the fault taxonomy.

mod change;
mod fault;
mod path;
mod reference;
mod value;

pub use change::{ChangeOp, PropertyChange};
pub use fault::{Fault, LocalizedFault, Result};
pub use path::{PathKey, PropertyPath};
pub use reference::ObjectRef;
pub use value::{ArrayOf, DataObject, Value};

/// Element kind used for arrays of object references.
pub const REFERENCE_KIND: &str = "ManagedObjectReference";
