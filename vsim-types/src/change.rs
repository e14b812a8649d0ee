//! Property change records

use crate::value::Value;
use serde::{Deserialize, Serialize};

/// How a change applies to its property
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ChangeOp {
    /// Append to a collection property
    Add,
    /// Remove from a collection property
    Remove,
    /// Replace the property value
    Assign,
    /// Removal caused by something else (e.g. a referenced object vanished)
    IndirectRemove,
}

/// A single named property change.
///
/// Changes are what entities apply through the registry's update path and
/// what subscribers see in `Modify` updates. A `None` value means the
/// property became empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyChange {
    pub name: String,
    pub op: ChangeOp,
    pub val: Option<Value>,
}

impl PropertyChange {
    pub fn assign(name: impl Into<String>, val: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            op: ChangeOp::Assign,
            val: Some(val.into()),
        }
    }

    /// Assign an optional value; `None` clears the property
    pub fn assign_opt(name: impl Into<String>, val: Option<Value>) -> Self {
        Self {
            name: name.into(),
            op: ChangeOp::Assign,
            val,
        }
    }

    pub fn add(name: impl Into<String>, val: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            op: ChangeOp::Add,
            val: Some(val.into()),
        }
    }

    pub fn remove(name: impl Into<String>, val: impl Into<Value>) -> Self {
        Self {
            name: name.into(),
            op: ChangeOp::Remove,
            val: Some(val.into()),
        }
    }
}
