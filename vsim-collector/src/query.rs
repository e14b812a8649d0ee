//! Query specifications
//!
//! A [`PropertyFilterSpec`] says which objects to visit ([`ObjectSpec`]s,
//! each a root plus an optional traversal graph) and which properties to
//! report for which kinds ([`PropertySpec`]s).

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use vsim_types::{Fault, ObjectRef, Result};

/// Properties to report for objects of one kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertySpec {
    /// Kind the spec applies to; objects that are-a `kind` match too
    pub kind: String,
    /// Report every non-empty top-level property
    #[serde(default)]
    pub all: bool,
    #[serde(default)]
    pub path_set: Vec<String>,
}

impl PropertySpec {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            all: false,
            path_set: Vec::new(),
        }
    }

    pub fn all(kind: impl Into<String>) -> Self {
        Self {
            all: true,
            ..Self::new(kind)
        }
    }

    pub fn path<S: Into<String>>(mut self, path: S) -> Self {
        self.path_set.push(path.into());
        self
    }
}

/// A named rule that follows a reference-valued property
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TraversalSpec {
    /// Name other selection specs may refer to; may be empty
    #[serde(default)]
    pub name: String,
    /// Kind of object this rule applies to
    pub kind: String,
    /// Property holding a reference or a list of references
    pub path: String,
    /// Follow the references without reporting them
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub select_set: Vec<SelectionSpec>,
}

impl TraversalSpec {
    pub fn new(name: impl Into<String>, kind: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: kind.into(),
            path: path.into(),
            skip: false,
            select_set: Vec::new(),
        }
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn select(mut self, spec: impl Into<SelectionSpec>) -> Self {
        self.select_set.push(spec.into());
        self
    }

    /// Identity used to detect revisits during a walk
    pub(crate) fn walk_key(&self) -> String {
        if self.name.is_empty() {
            format!("{}:{}", self.kind, self.path)
        } else {
            self.name.clone()
        }
    }
}

/// Either an inline traversal rule or a reference to a named one
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum SelectionSpec {
    Named(String),
    Traversal(TraversalSpec),
}

impl SelectionSpec {
    pub fn named(name: impl Into<String>) -> Self {
        SelectionSpec::Named(name.into())
    }
}

impl From<TraversalSpec> for SelectionSpec {
    fn from(spec: TraversalSpec) -> Self {
        SelectionSpec::Traversal(spec)
    }
}

/// A root object and how to walk outwards from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectSpec {
    pub obj: ObjectRef,
    /// Leave the root out of the results; only honoured with a select set
    #[serde(default)]
    pub skip: bool,
    #[serde(default)]
    pub select_set: Vec<SelectionSpec>,
}

impl ObjectSpec {
    pub fn new(obj: ObjectRef) -> Self {
        Self {
            obj,
            skip: false,
            select_set: Vec::new(),
        }
    }

    pub fn skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn select(mut self, spec: impl Into<SelectionSpec>) -> Self {
        self.select_set.push(spec.into());
        self
    }
}

/// One query
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct PropertyFilterSpec {
    pub prop_set: Vec<PropertySpec>,
    pub object_set: Vec<ObjectSpec>,
    /// Skip missing roots instead of failing the whole request
    #[serde(default)]
    pub report_missing_objects_in_results: bool,
}

impl PropertyFilterSpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn prop(mut self, spec: PropertySpec) -> Self {
        self.prop_set.push(spec);
        self
    }

    pub fn object(mut self, spec: ObjectSpec) -> Self {
        self.object_set.push(spec);
        self
    }

    pub fn report_missing(mut self, report: bool) -> Self {
        self.report_missing_objects_in_results = report;
        self
    }

    /// Index every named traversal spec, however deeply it is nested, and
    /// check that every by-name reference resolves.
    pub(crate) fn traversal_table(&self) -> Result<HashMap<String, TraversalSpec>> {
        let mut table = HashMap::new();
        let mut names = Vec::new();
        for object in &self.object_set {
            index_selection(&object.select_set, &mut table, &mut names);
        }
        match names.into_iter().find(|name| !table.contains_key(name)) {
            Some(name) => Err(Fault::invalid_argument(format!(
                "undefined TraversalSpec name {}",
                name
            ))),
            None => Ok(table),
        }
    }
}

fn index_selection(
    specs: &[SelectionSpec],
    table: &mut HashMap<String, TraversalSpec>,
    names: &mut Vec<String>,
) {
    for spec in specs {
        match spec {
            SelectionSpec::Named(name) => names.push(name.clone()),
            SelectionSpec::Traversal(ts) => {
                if !ts.name.is_empty() && table.contains_key(&ts.name) {
                    continue;
                }
                if !ts.name.is_empty() {
                    table.insert(ts.name.clone(), ts.clone());
                }
                index_selection(&ts.select_set, table, names);
            }
        }
    }
}
