//! Query results

use serde::{Deserialize, Serialize};
use vsim_types::{LocalizedFault, ObjectRef, Value};

/// A property that was found and holds a value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DynamicProperty {
    pub name: String,
    pub val: Value,
}

/// A requested property that could not be resolved
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MissingProperty {
    pub path: String,
    pub fault: LocalizedFault,
}

/// Everything reported for one object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectContent {
    pub obj: ObjectRef,
    pub prop_set: Vec<DynamicProperty>,
    pub missing_set: Vec<MissingProperty>,
}

impl ObjectContent {
    pub fn new(obj: ObjectRef) -> Self {
        Self {
            obj,
            prop_set: Vec::new(),
            missing_set: Vec::new(),
        }
    }

    /// Value of a reported property
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.prop_set.iter().find(|p| p.name == name).map(|p| &p.val)
    }

    pub fn missing(&self, path: &str) -> Option<&MissingProperty> {
        self.missing_set.iter().find(|m| m.path == path)
    }
}

/// One page of a query result
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RetrieveResult {
    pub objects: Vec<ObjectContent>,
    /// Set when more objects are waiting behind a continuation token
    pub token: Option<String>,
}

/// Paging options for a one-shot query
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RetrieveOptions {
    /// Page size; `None` or zero returns everything at once
    pub max_objects: Option<usize>,
}

impl RetrieveOptions {
    pub fn max_objects(max: usize) -> Self {
        Self {
            max_objects: Some(max),
        }
    }

    pub(crate) fn page_size(&self) -> Option<usize> {
        self.max_objects.filter(|max| *max > 0)
    }
}
