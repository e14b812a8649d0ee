//! Folders: containers of other entities

use std::any::Any;
use vsim_registry::ManagedObject;
use vsim_types::{ChangeOp, DataObject, Fault, ObjectRef, PropertyChange, Result, Value};

/// A container of other entities
#[derive(Debug, Clone, Default)]
pub struct Folder {
    pub name: String,
    pub parent: Option<ObjectRef>,
    pub children: Vec<ObjectRef>,
    /// Kinds this folder may hold
    pub child_type: Vec<String>,
}

impl Folder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            child_type: vec![
                "Folder".to_string(),
                "VirtualMachine".to_string(),
            ],
            ..Default::default()
        }
    }
}

impl ManagedObject for Folder {
    fn kind(&self) -> &'static str {
        "Folder"
    }

    fn base_kinds(&self) -> &'static [&'static str] {
        &["ManagedEntity", "ExtensibleManagedObject"]
    }

    fn id_prefix(&self) -> String {
        "group".to_string()
    }

    fn view(&self) -> DataObject {
        DataObject::new("Folder")
            .with("name", self.name.as_str())
            .with_opt("parent", self.parent.clone().map(Value::Ref))
            .with("childEntity", Value::refs(self.children.clone()))
            .with("childType", Value::strings(self.child_type.clone()))
    }

    fn apply_change(&mut self, change: &PropertyChange) -> Result<()> {
        let val = change.val.as_ref();
        match (change.name.as_str(), change.op) {
            ("name", ChangeOp::Assign) => {
                self.name = val
                    .and_then(Value::as_str)
                    .ok_or_else(|| Fault::invalid_argument("name"))?
                    .to_string();
            }
            ("parent", ChangeOp::Assign) => {
                self.parent = val.and_then(Value::as_ref).cloned();
            }
            ("childEntity", ChangeOp::Assign) => {
                self.children = val.map(Value::references).unwrap_or_default();
            }
            ("childEntity", ChangeOp::Add) => {
                for child in val.map(Value::references).unwrap_or_default() {
                    if !self.children.contains(&child) {
                        self.children.push(child);
                    }
                }
            }
            ("childEntity", ChangeOp::Remove | ChangeOp::IndirectRemove) => {
                let gone = val.map(Value::references).unwrap_or_default();
                self.children.retain(|c| !gone.contains(c));
            }
            _ => return Err(Fault::invalid_property(change.name.clone())),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_child_entity_add_and_remove() {
        let mut folder = Folder::new("vm");
        let a = ObjectRef::new("VirtualMachine", "vm-1");
        let b = ObjectRef::new("VirtualMachine", "vm-2");

        folder.apply_change(&PropertyChange::add("childEntity", a.clone())).unwrap();
        folder.apply_change(&PropertyChange::add("childEntity", b.clone())).unwrap();
        folder.apply_change(&PropertyChange::add("childEntity", a.clone())).unwrap();
        assert_eq!(folder.children, vec![a.clone(), b.clone()]);

        folder.apply_change(&PropertyChange::remove("childEntity", a)).unwrap();
        assert_eq!(folder.view().get("childEntity"), Some(&Value::refs(vec![b])));
    }

    #[test]
    fn test_unknown_property_is_rejected() {
        let mut folder = Folder::new("vm");
        let err = folder
            .apply_change(&PropertyChange::assign("overallStatus", "green"))
            .unwrap_err();
        assert_eq!(err, Fault::invalid_property("overallStatus"));
    }
}
