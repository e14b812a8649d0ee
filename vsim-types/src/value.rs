//! Dynamic property values
//!
//! Registered objects describe themselves as a [`DataObject`]: an ordered
//! list of named fields whose values are [`Value`]s. This is the only shape
//! the property collector ever looks at, which lets it query arbitrary object
//! kinds without knowing their concrete Rust types.
//!
//! A field is either present (`Some(value)`) or empty (`None`). Collections
//! are always wrapped in an [`ArrayOf`] envelope carrying the element kind,
//! and an empty collection is still a present value.

use crate::fault::LocalizedFault;
use crate::reference::ObjectRef;
use crate::REFERENCE_KIND;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single property value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum Value {
    Bool(bool),
    Int(i32),
    Long(i64),
    Double(f64),
    String(String),
    DateTime(DateTime<Utc>),
    Ref(ObjectRef),
    Array(ArrayOf),
    Object(DataObject),
    Fault(LocalizedFault),
}

impl Value {
    /// Wrap a list of references in a typed array envelope
    pub fn refs(items: impl IntoIterator<Item = ObjectRef>) -> Self {
        Value::Array(ArrayOf::new(
            REFERENCE_KIND,
            items.into_iter().map(Value::Ref).collect(),
        ))
    }

    /// Wrap a list of strings in a typed array envelope
    pub fn strings<S: Into<String>>(items: impl IntoIterator<Item = S>) -> Self {
        Value::Array(ArrayOf::new(
            "String",
            items.into_iter().map(|s| Value::String(s.into())).collect(),
        ))
    }

    /// Wrap arbitrary items in a typed array envelope
    pub fn array(kind: impl Into<String>, items: Vec<Value>) -> Self {
        Value::Array(ArrayOf::new(kind, items))
    }

    /// Name of this value's kind as reported to clients
    pub fn kind_name(&self) -> String {
        match self {
            Value::Bool(_) => "boolean".to_string(),
            Value::Int(_) => "int".to_string(),
            Value::Long(_) => "long".to_string(),
            Value::Double(_) => "double".to_string(),
            Value::String(_) => "string".to_string(),
            Value::DateTime(_) => "dateTime".to_string(),
            Value::Ref(_) => REFERENCE_KIND.to_string(),
            Value::Array(array) => array.envelope_kind(),
            Value::Object(object) => object.kind.clone(),
            Value::Fault(_) => "LocalizedMethodFault".to_string(),
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Integer view of `Int` and `Long` values
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(i) => Some(i64::from(*i)),
            Value::Long(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_datetime(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::DateTime(t) => Some(*t),
            _ => None,
        }
    }

    pub fn as_ref(&self) -> Option<&ObjectRef> {
        match self {
            Value::Ref(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&ArrayOf> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&DataObject> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_fault(&self) -> Option<&LocalizedFault> {
        match self {
            Value::Fault(f) => Some(f),
            _ => None,
        }
    }

    /// References held by this value: a single reference, or every reference
    /// inside an array. Anything else yields nothing.
    pub fn references(&self) -> Vec<ObjectRef> {
        match self {
            Value::Ref(r) => vec![r.clone()],
            Value::Array(a) => a.items.iter().filter_map(|v| v.as_ref().cloned()).collect(),
            _ => Vec::new(),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::Int(v)
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Long(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Double(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::String(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::String(v)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(v: DateTime<Utc>) -> Self {
        Value::DateTime(v)
    }
}

impl From<ObjectRef> for Value {
    fn from(v: ObjectRef) -> Self {
        Value::Ref(v)
    }
}

impl From<DataObject> for Value {
    fn from(v: DataObject) -> Self {
        Value::Object(v)
    }
}

impl From<LocalizedFault> for Value {
    fn from(v: LocalizedFault) -> Self {
        Value::Fault(v)
    }
}

/// Typed array envelope (`ArrayOfString`, `ArrayOfManagedObjectReference`, ...)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArrayOf {
    /// Declared element kind
    pub kind: String,
    pub items: Vec<Value>,
}

impl ArrayOf {
    pub fn new(kind: impl Into<String>, items: Vec<Value>) -> Self {
        Self {
            kind: kind.into(),
            items,
        }
    }

    /// Envelope name, e.g. `ArrayOfManagedObjectReference`
    pub fn envelope_kind(&self) -> String {
        format!("ArrayOf{}", self.kind)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Structured value: a kind name plus ordered, named fields.
///
/// This is both the canonical view of a registered object and the value of
/// any nested structure inside it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataObject {
    pub kind: String,
    fields: Vec<(String, Option<Value>)>,
}

impl DataObject {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            fields: Vec::new(),
        }
    }

    /// Builder form of [`DataObject::set`] for a present value
    pub fn with(mut self, name: &str, value: impl Into<Value>) -> Self {
        self.set(name, Some(value.into()));
        self
    }

    /// Builder form of [`DataObject::set`]; `None` declares an empty field
    pub fn with_opt(mut self, name: &str, value: Option<Value>) -> Self {
        self.set(name, value);
        self
    }

    /// Declare or overwrite a field, keeping declaration order
    pub fn set(&mut self, name: &str, value: Option<Value>) {
        match self.fields.iter_mut().find(|(n, _)| n == name) {
            Some((_, slot)) => *slot = value,
            None => self.fields.push((name.to_string(), value)),
        }
    }

    /// Look up a field.
    ///
    /// The outer `Option` tells whether the field exists at all; the inner
    /// one whether it holds a value.
    pub fn field(&self, name: &str) -> Option<Option<&Value>> {
        self.fields
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_ref())
    }

    /// Present value of a field, if any
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.field(name).flatten()
    }

    pub fn has_field(&self, name: &str) -> bool {
        self.fields.iter().any(|(n, _)| n == name)
    }

    /// All declared fields in order, empty ones included
    pub fn fields(&self) -> impl Iterator<Item = (&str, Option<&Value>)> {
        self.fields.iter().map(|(n, v)| (n.as_str(), v.as_ref()))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}
