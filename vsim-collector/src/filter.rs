//! Per-filter change tracking
//!
//! A filter remembers which objects it has announced (with an Enter) and
//! which objects its traversal graph passed through. Incremental passes
//! consult both: updates to untouched graph nodes only need per-object
//! change matching, while anything that can alter reachability triggers a
//! fresh walk whose result is diffed against the announced set.

use crate::content::ObjectContent;
use crate::query::{PropertyFilterSpec, PropertySpec};
use crate::resolve::{resolve_name, Resolved};
use crate::retrieve::{collect, collect_object};
use crate::select::{select, snapshot, Snapshot};
use crate::update::{ObjectUpdate, UpdateKind};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::slice;
use tracing::{debug, trace};
use vsim_registry::{Context, Registry, RegistryEvent};
use vsim_types::{ObjectRef, PropertyChange, Result};

/// A registered filter, as reported by `PropertyCollector::filters`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PropertyFilter {
    pub reference: ObjectRef,
    pub spec: PropertyFilterSpec,
    pub partial_updates: bool,
}

/// Registry events accumulated between two polls
#[derive(Debug, Default)]
pub(crate) struct ChangeBatch {
    puts: HashSet<ObjectRef>,
    removes: HashSet<ObjectRef>,
    updates: Vec<(ObjectRef, Vec<PropertyChange>)>,
}

impl ChangeBatch {
    pub(crate) fn from_events(events: Vec<RegistryEvent>) -> Self {
        let mut batch = ChangeBatch::default();
        let mut index: HashMap<ObjectRef, usize> = HashMap::new();

        for event in events {
            match event {
                RegistryEvent::Put { obj } => {
                    batch.puts.insert(obj);
                }
                RegistryEvent::Remove { obj } => {
                    batch.removes.insert(obj);
                }
                RegistryEvent::Update { obj, changes } => match index.get(&obj) {
                    Some(&i) => batch.updates[i].1.extend(changes),
                    None => {
                        index.insert(obj.clone(), batch.updates.len());
                        batch.updates.push((obj, changes));
                    }
                },
            }
        }

        batch
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.puts.is_empty() && self.removes.is_empty() && self.updates.is_empty()
    }

    pub(crate) fn len(&self) -> usize {
        self.puts.len() + self.removes.len() + self.updates.len()
    }
}

pub(crate) struct FilterState {
    pub(crate) reference: ObjectRef,
    pub(crate) spec: PropertyFilterSpec,
    pub(crate) partial_updates: bool,
    roots: HashSet<ObjectRef>,
    delivered: HashSet<ObjectRef>,
    traversed: HashSet<ObjectRef>,
    synced: bool,
}

impl FilterState {
    pub(crate) fn new(reference: ObjectRef, spec: PropertyFilterSpec, partial_updates: bool) -> Self {
        let roots = spec.object_set.iter().map(|o| o.obj.clone()).collect();
        Self {
            reference,
            spec,
            partial_updates,
            roots,
            delivered: HashSet::new(),
            traversed: HashSet::new(),
            synced: false,
        }
    }

    pub(crate) fn info(&self) -> PropertyFilter {
        PropertyFilter {
            reference: self.reference.clone(),
            spec: self.spec.clone(),
            partial_updates: self.partial_updates,
        }
    }

    pub(crate) fn is_synced(&self) -> bool {
        self.synced
    }

    /// Forget everything announced so far
    pub(crate) fn reset(&mut self) {
        self.delivered.clear();
        self.traversed.clear();
        self.synced = false;
    }

    /// Run the full query and announce whatever has not been announced yet
    pub(crate) fn sync(&mut self, registry: &Registry, ctx: &Context) -> Result<Vec<ObjectUpdate>> {
        let collected = collect(registry, ctx, slice::from_ref(&self.spec), true)?;

        let mut updates = Vec::new();
        let mut matched = HashSet::with_capacity(collected.objects.len());
        for content in collected.objects {
            matched.insert(content.obj.clone());
            if self.delivered.contains(&content.obj) {
                continue;
            }
            updates.push(enter(content));
        }

        let mut gone: Vec<ObjectRef> = self
            .delivered
            .iter()
            .filter(|r| !matched.contains(*r))
            .cloned()
            .collect();
        gone.sort();
        updates.extend(
            gone.into_iter()
                .map(|obj| ObjectUpdate::new(obj, UpdateKind::Leave, Vec::new())),
        );

        self.delivered = matched;
        self.traversed = collected.traversed;
        self.synced = true;

        debug!(filter = %self.reference, updates = updates.len(), "synced filter");
        Ok(updates)
    }

    /// Can `batch` change which objects this filter reaches?
    fn reshapes(&self, batch: &ChangeBatch) -> bool {
        batch
            .puts
            .iter()
            .any(|r| self.roots.contains(r) || !self.traversed.is_empty())
            || batch.removes.iter().any(|r| {
                self.roots.contains(r) || self.delivered.contains(r) || self.traversed.contains(r)
            })
            || batch
                .updates
                .iter()
                .any(|(r, _)| self.traversed.contains(r))
    }

    fn wants(&self, registry: &Registry, obj: &ObjectRef) -> bool {
        registry
            .get(obj)
            .map(|h| self.spec.prop_set.iter().any(|p| h.is_a(&p.kind)))
            .unwrap_or(false)
    }

    /// Turn a batch of registry events into this filter's updates.
    ///
    /// Output is ordered Enter, then Modify, then Leave. A Modify or Leave
    /// is only produced for an object this filter has already announced.
    pub(crate) fn apply(
        &mut self,
        registry: &Registry,
        ctx: &Context,
        batch: &ChangeBatch,
    ) -> Result<Vec<ObjectUpdate>> {
        let mut enters = Vec::new();
        let mut leaves = Vec::new();
        let mut entered = HashSet::new();

        if self.reshapes(batch) {
            let selection = select(registry, ctx, &self.spec, true)?;
            let reached: Vec<ObjectRef> = selection
                .candidates
                .into_iter()
                .filter(|r| self.wants(registry, r))
                .collect();
            let reached_set: HashSet<ObjectRef> = reached.iter().cloned().collect();

            for obj in reached {
                if self.delivered.contains(&obj) {
                    continue;
                }
                let Some(snap) = snapshot(registry, ctx, &obj) else {
                    trace!(%obj, "object vanished before it could enter");
                    continue;
                };
                if let Some(content) = collect_object(&snap, &self.spec.prop_set) {
                    enters.push(enter(content));
                    self.delivered.insert(obj.clone());
                    entered.insert(obj);
                }
            }

            let mut gone: Vec<ObjectRef> = self
                .delivered
                .iter()
                .filter(|r| !reached_set.contains(*r))
                .cloned()
                .collect();
            gone.sort();
            for obj in gone {
                self.delivered.remove(&obj);
                leaves.push(ObjectUpdate::new(obj, UpdateKind::Leave, Vec::new()));
            }

            self.traversed = selection.traversed;
        }

        let mut modifies = Vec::new();
        for (obj, changes) in &batch.updates {
            if !self.delivered.contains(obj) || entered.contains(obj) {
                continue;
            }
            let Some(snap) = snapshot(registry, ctx, obj) else {
                continue;
            };
            let reported = match_changes(&snap, &self.spec.prop_set, changes);
            if !reported.is_empty() {
                modifies.push(ObjectUpdate::new(obj.clone(), UpdateKind::Modify, reported));
            }
        }

        let mut updates = enters;
        updates.extend(modifies);
        updates.extend(leaves);
        if !updates.is_empty() {
            trace!(filter = %self.reference, updates = updates.len(), "filter produced updates");
        }
        Ok(updates)
    }
}

fn enter(content: ObjectContent) -> ObjectUpdate {
    let changes = content
        .prop_set
        .into_iter()
        .map(|p| PropertyChange::assign(p.name, p.val))
        .collect();
    let mut update = ObjectUpdate::new(content.obj, UpdateKind::Enter, changes);
    update.missing_set = content.missing_set;
    update
}

/// Is one property path nested inside (or equal to) the other?
fn related(requested: &str, changed: &str) -> bool {
    fn under(path: &str, parent: &str) -> bool {
        path.strip_prefix(parent)
            .map(|rest| rest.starts_with('.') || rest.starts_with('['))
            .unwrap_or(false)
    }
    requested == changed || under(requested, changed) || under(changed, requested)
}

fn top_level(name: &str) -> &str {
    let end = name.find(|c| c == '.' || c == '[').unwrap_or(name.len());
    &name[..end]
}

/// Report the requested properties that `changes` touched, each once,
/// with its current value.
///
/// A requested path is reported when it was changed itself, when a
/// property nested under it changed (the parent is reported whole), or
/// when one of its ancestors was replaced (the nested value is reported).
pub(crate) fn match_changes(
    snap: &Snapshot,
    props: &[PropertySpec],
    changes: &[PropertyChange],
) -> Vec<PropertyChange> {
    let applicable: Vec<&PropertySpec> = props.iter().filter(|p| snap.is_a(&p.kind)).collect();
    let all = applicable.iter().any(|p| p.all);

    let mut names: Vec<&str> = Vec::new();
    for change in changes {
        if all {
            let name = top_level(&change.name);
            if name != "self" && !names.contains(&name) {
                names.push(name);
            }
            continue;
        }
        for spec in &applicable {
            for path in &spec.path_set {
                if related(path, &change.name) && !names.contains(&path.as_str()) {
                    names.push(path.as_str());
                }
            }
        }
    }

    names
        .into_iter()
        .filter_map(|name| match resolve_name(&snap.view, name) {
            Resolved::Present(val) => Some(PropertyChange::assign(name, val)),
            Resolved::Empty => Some(PropertyChange::assign_opt(name, None)),
            Resolved::Missing | Resolved::Invalid => None,
        })
        .collect()
}
