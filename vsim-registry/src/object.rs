//! The contract a registrable entity fulfils

use std::any::Any;
use vsim_types::{DataObject, PropertyChange, Result};

/// An entity that can live in the [`Registry`](crate::Registry).
///
/// The registry and the property collector never look at concrete entity
/// types. They rely on three capabilities instead:
///
/// - a declared kind plus the abstract kinds it is-a (`ManagedEntity`,
///   `ExtensibleManagedObject`, ...), used for kind matching;
/// - [`view`](ManagedObject::view), the canonical base view used for
///   property path resolution. Wrapper types whose stored fields differ
///   from what clients see resolve to their external shape here;
/// - [`apply_change`](ManagedObject::apply_change), the only way field state
///   is mutated. The registry calls it while the object's lock is held.
///
/// Entities must be `Clone` (see [`CloneObject`]).
pub trait ManagedObject: Any + Send + Sync + CloneObject {
    /// Declared kind name, e.g. `VirtualMachine`
    fn kind(&self) -> &'static str;

    /// Abstract kinds this object is-a
    fn base_kinds(&self) -> &'static [&'static str] {
        &[]
    }

    fn is_a(&self, kind: &str) -> bool {
        self.kind() == kind || self.base_kinds().contains(&kind)
    }

    /// Prefix for allocated identifiers (`vm` gives `vm-42`)
    fn id_prefix(&self) -> String {
        self.kind().to_lowercase()
    }

    /// Snapshot of the externally visible fields
    fn view(&self) -> DataObject;

    /// Apply one property change to the stored state
    fn apply_change(&mut self, change: &PropertyChange) -> Result<()>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Boxed copies of an entity. Implemented for every `Clone` entity; the
/// registry stages a batch of changes on a copy so a rejected change leaves
/// the stored state untouched.
pub trait CloneObject {
    fn clone_object(&self) -> Box<dyn ManagedObject>;
}

impl<T: ManagedObject + Clone> CloneObject for T {
    fn clone_object(&self) -> Box<dyn ManagedObject> {
        Box::new(self.clone())
    }
}
