//! Property path resolution against an object's view

use vsim_types::{DataObject, PathKey, PropertyPath, Value};

/// Outcome of resolving one property path
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Resolved {
    /// The property holds a value
    Present(Value),
    /// The property exists but holds nothing
    Empty,
    /// No such property
    Missing,
    /// The path cannot be applied to the object's shape
    Invalid,
}

impl Resolved {
    pub(crate) fn into_value(self) -> Option<Value> {
        match self {
            Resolved::Present(v) => Some(v),
            _ => None,
        }
    }
}

/// Resolve a textual property name; malformed names are `Invalid`
pub(crate) fn resolve_name(view: &DataObject, name: &str) -> Resolved {
    match PropertyPath::parse(name) {
        Some(path) => resolve(view, &path),
        None => Resolved::Invalid,
    }
}

pub(crate) fn resolve(view: &DataObject, path: &PropertyPath) -> Resolved {
    let value = match resolve_dotted(view, &path.path) {
        Resolved::Present(v) => v,
        other => return other,
    };

    let Some(key) = &path.key else {
        return Resolved::Present(value);
    };

    let Some(array) = value.as_array() else {
        return Resolved::Invalid;
    };

    for item in &array.items {
        let Some(element) = item.as_object() else {
            return Resolved::Invalid;
        };
        let matched = match (key, element.get("key")) {
            (PathKey::Str(want), Some(Value::String(have))) => want == have,
            (PathKey::Int(want), Some(have)) => match have.as_i64() {
                Some(have) => *want == have,
                None => return Resolved::Invalid,
            },
            _ => return Resolved::Invalid,
        };
        if !matched {
            continue;
        }
        return match &path.item {
            Some(item) => resolve_dotted(element, item),
            None => Resolved::Present(item.clone()),
        };
    }

    Resolved::Empty
}

fn resolve_dotted(view: &DataObject, dotted: &str) -> Resolved {
    let segments: Vec<&str> = dotted.split('.').collect();
    let mut current = view;

    for (i, segment) in segments.iter().enumerate() {
        let value = match current.field(segment) {
            None => return Resolved::Missing,
            Some(None) => return Resolved::Empty,
            Some(Some(value)) => value,
        };

        if is_empty(value) {
            return Resolved::Empty;
        }

        if i == segments.len() - 1 {
            return Resolved::Present(value.clone());
        }

        current = match value {
            Value::Object(object) => object,
            // A field of an array element cannot be addressed without a key
            Value::Array(_) => return Resolved::Invalid,
            _ => return Resolved::Missing,
        };
    }

    Resolved::Missing
}

/// Empty strings count as unset
pub(crate) fn is_empty(value: &Value) -> bool {
    matches!(value, Value::String(s) if s.is_empty())
}
