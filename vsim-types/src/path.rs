//! Property path syntax
//!
//! Property names are dotted paths into an object's view, e.g.
//! `runtime.powerState`. A path may select one element of an array of
//! structures by its `key` field and optionally continue into it:
//!
//! ```text
//! config.hardware.device[4000]            element whose key is 4000
//! config.extraConfig["guestinfo.a"].value value field of the keyed element
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;

/// Key selecting one element of an array of structures
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PathKey {
    Str(String),
    Int(i64),
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PathKey::Str(s) => write!(f, "\"{}\"", s),
            PathKey::Int(i) => write!(f, "{}", i),
        }
    }
}

/// A parsed property path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PropertyPath {
    /// Dotted path to the field (to the array, when keyed)
    pub path: String,
    /// Element selector for keyed access
    pub key: Option<PathKey>,
    /// Dotted sub-path into the selected element
    pub item: Option<String>,
}

impl PropertyPath {
    /// Parse a property name; `None` when the syntax is invalid
    pub fn parse(name: &str) -> Option<Self> {
        let Some(open) = name.find('[') else {
            if !valid_dotted(name) || name.contains(']') {
                return None;
            }
            return Some(Self {
                path: name.to_string(),
                key: None,
                item: None,
            });
        };

        let path = &name[..open];
        if !valid_dotted(path) {
            return None;
        }

        let rest = &name[open + 1..];
        let (raw_key, tail) = if let Some(quoted) = rest.strip_prefix('"') {
            let end = quoted.find('"')?;
            let tail = quoted[end + 1..].strip_prefix(']')?;
            (PathKey::Str(quoted[..end].to_string()), tail)
        } else {
            let close = rest.find(']')?;
            let key = rest[..close].trim().parse::<i64>().ok()?;
            (PathKey::Int(key), &rest[close + 1..])
        };

        let item = if tail.is_empty() {
            None
        } else {
            let item = tail.strip_prefix('.')?;
            if !valid_dotted(item) || item.contains('[') || item.contains(']') {
                return None;
            }
            Some(item.to_string())
        };

        Some(Self {
            path: path.to_string(),
            key: Some(raw_key),
            item,
        })
    }

    /// Path segments of the field part
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.path.split('.')
    }

    pub fn is_keyed(&self) -> bool {
        self.key.is_some()
    }

    /// The same path with the item sub-path dropped (`field["k"].x` -> `field["k"]`)
    pub fn without_item(&self) -> PropertyPath {
        PropertyPath {
            path: self.path.clone(),
            key: self.key.clone(),
            item: None,
        }
    }
}

impl fmt::Display for PropertyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.path)?;
        if let Some(key) = &self.key {
            write!(f, "[{}]", key)?;
        }
        if let Some(item) = &self.item {
            write!(f, ".{}", item)?;
        }
        Ok(())
    }
}

fn valid_dotted(s: &str) -> bool {
    !s.is_empty() && s.split('.').all(|seg| !seg.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_path() {
        let p = PropertyPath::parse("runtime.powerState").unwrap();
        assert_eq!(p.segments().collect::<Vec<_>>(), vec!["runtime", "powerState"]);
        assert!(!p.is_keyed());
        assert_eq!(p.to_string(), "runtime.powerState");
    }

    #[test]
    fn test_keyed_paths() {
        let p = PropertyPath::parse("config.hardware.device[4000]").unwrap();
        assert_eq!(p.path, "config.hardware.device");
        assert_eq!(p.key, Some(PathKey::Int(4000)));
        assert_eq!(p.item, None);

        let p = PropertyPath::parse(r#"config.extraConfig["guestinfo.a"].value"#).unwrap();
        assert_eq!(p.key, Some(PathKey::Str("guestinfo.a".to_string())));
        assert_eq!(p.item.as_deref(), Some("value"));
        assert_eq!(p.without_item().to_string(), r#"config.extraConfig["guestinfo.a"]"#);
        assert_eq!(p.to_string(), r#"config.extraConfig["guestinfo.a"].value"#);
    }

    #[test]
    fn test_invalid_paths() {
        for bad in ["", "a..b", ".a", "a[", "a[x]", "a[1]b", "a[1].", "a]", "[1]"] {
            assert!(PropertyPath::parse(bad).is_none(), "{bad} should not parse");
        }
    }
}
