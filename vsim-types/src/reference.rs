//! Object references

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identity of a registered object.
///
/// A reference pairs the object's declared kind (e.g. `Folder`) with an
/// identifier that is unique within a registry (e.g. `group-d1`). References
/// are never reused for a different object while the registry is alive.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Declared kind of the referenced object
    pub kind: String,
    /// Identifier, unique per registry
    pub value: String,
}

impl ObjectRef {
    /// Create a reference from its parts
    pub fn new(kind: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            value: value.into(),
        }
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    /// A reference with no identifier is a placeholder, not a live object
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.kind, self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display() {
        let r = ObjectRef::new("Folder", "group-d1");
        assert_eq!(r.to_string(), "Folder:group-d1");
        assert!(!r.is_empty());
        assert!(ObjectRef::new("Task", "").is_empty());
    }

    #[test]
    fn test_ordering_is_by_kind_then_value() {
        let a = ObjectRef::new("Folder", "b");
        let b = ObjectRef::new("VirtualMachine", "a");
        assert!(a < b);
    }
}
