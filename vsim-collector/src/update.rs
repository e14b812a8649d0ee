//! Change subscription results

use crate::content::MissingProperty;
use serde::{Deserialize, Serialize};
use vsim_types::{ObjectRef, PropertyChange};

/// How an object's membership in a filter changed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum UpdateKind {
    /// The object newly matches the filter
    Enter,
    /// A matched object's requested properties changed
    Modify,
    /// The object no longer matches (or no longer exists)
    Leave,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectUpdate {
    pub obj: ObjectRef,
    pub kind: UpdateKind,
    pub change_set: Vec<PropertyChange>,
    /// Requested properties that could not be resolved (Enter only)
    #[serde(default)]
    pub missing_set: Vec<MissingProperty>,
}

impl ObjectUpdate {
    pub fn new(obj: ObjectRef, kind: UpdateKind, change_set: Vec<PropertyChange>) -> Self {
        Self {
            obj,
            kind,
            change_set,
            missing_set: Vec::new(),
        }
    }

    /// Change reported for `name`, if any
    pub fn change(&self, name: &str) -> Option<&PropertyChange> {
        self.change_set.iter().find(|c| c.name == name)
    }
}

/// Updates produced by one filter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilterUpdate {
    pub filter: ObjectRef,
    pub object_set: Vec<ObjectUpdate>,
}

/// One `wait_for_updates_ex` response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateSet {
    /// Token to pass to the next call
    pub version: String,
    pub filter_set: Vec<PropertyFilterUpdate>,
    /// More updates are pending and will be returned by the next call
    #[serde(default)]
    pub truncated: bool,
}

impl UpdateSet {
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
            filter_set: Vec::new(),
            truncated: false,
        }
    }

    /// Number of object updates across all filters
    pub fn object_count(&self) -> usize {
        self.filter_set.iter().map(|f| f.object_set.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.object_count() == 0
    }

    /// Updates reported for `filter`
    pub fn for_filter(&self, filter: &ObjectRef) -> Option<&PropertyFilterUpdate> {
        self.filter_set.iter().find(|f| &f.filter == filter)
    }

    /// Every object update, in delivery order
    pub fn updates(&self) -> impl Iterator<Item = &ObjectUpdate> {
        self.filter_set.iter().flat_map(|f| f.object_set.iter())
    }
}

/// Options for `wait_for_updates_ex`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct WaitOptions {
    /// `Some(0)` asks for a single pass; `None` waits until something
    /// changes; a positive value bounds the wait in seconds
    pub max_wait_seconds: Option<u32>,
    /// Lowers the collector's per-response object update cap
    pub max_object_updates: Option<usize>,
}

impl WaitOptions {
    /// Check once and return immediately
    pub fn single_pass() -> Self {
        Self {
            max_wait_seconds: Some(0),
            ..Self::default()
        }
    }

    pub fn max_wait_seconds(mut self, seconds: u32) -> Self {
        self.max_wait_seconds = Some(seconds);
        self
    }

    pub fn max_object_updates(mut self, max: usize) -> Self {
        self.max_object_updates = Some(max);
        self
    }

    pub(crate) fn is_single_pass(&self) -> bool {
        self.max_wait_seconds == Some(0)
    }
}

/// Cap `set` at `max` object updates.
///
/// Returns the remainder (same version, all filters past the cut point) when
/// anything had to be held back; the returned head is marked truncated.
pub(crate) fn truncate(set: &mut UpdateSet, max: usize) -> Option<UpdateSet> {
    if set.object_count() <= max {
        return None;
    }

    let mut budget = max;
    let mut cut = set.filter_set.len();
    let mut rest: Vec<PropertyFilterUpdate> = Vec::new();

    for (i, filter) in set.filter_set.iter_mut().enumerate() {
        if filter.object_set.len() <= budget {
            budget -= filter.object_set.len();
            continue;
        }
        let tail = filter.object_set.split_off(budget);
        rest.push(PropertyFilterUpdate {
            filter: filter.filter.clone(),
            object_set: tail,
        });
        cut = i + 1;
        break;
    }

    rest.extend(set.filter_set.drain(cut..));
    set.filter_set.retain(|f| !f.object_set.is_empty());
    set.truncated = true;

    Some(UpdateSet {
        version: set.version.clone(),
        filter_set: rest,
        truncated: false,
    })
}
