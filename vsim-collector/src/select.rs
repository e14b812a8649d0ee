//! Walking the selection graph

use crate::query::{PropertyFilterSpec, SelectionSpec, TraversalSpec};
use crate::resolve::resolve_name;
use std::collections::{HashMap, HashSet};
use tracing::trace;
use vsim_registry::{Context, Registry};
use vsim_types::{DataObject, Fault, ObjectRef, Result};

/// A value copy of one object, taken under its lock
pub(crate) struct Snapshot {
    pub(crate) obj: ObjectRef,
    pub(crate) view: DataObject,
    kind: &'static str,
    bases: &'static [&'static str],
}

impl Snapshot {
    pub(crate) fn is_a(&self, kind: &str) -> bool {
        self.kind == kind || self.obj.kind() == kind || self.bases.contains(&kind)
    }
}

/// Take a snapshot; `None` when the object is gone
pub(crate) fn snapshot(registry: &Registry, ctx: &Context, obj: &ObjectRef) -> Option<Snapshot> {
    registry
        .with_lock(ctx, obj, |guard| {
            guard.read(|o| Snapshot {
                obj: obj.clone(),
                view: o.view(),
                kind: o.kind(),
                bases: o.base_kinds(),
            })
        })
        .ok()
}

/// References reached by one query
#[derive(Debug, Default)]
pub(crate) struct Selection {
    /// Objects to report on, in visit order, without duplicates
    pub(crate) candidates: Vec<ObjectRef>,
    /// Objects at least one traversal rule was applied to
    pub(crate) traversed: HashSet<ObjectRef>,
}

/// Resolve the roots of `spec` and walk its traversal graph.
///
/// With `tolerate_missing` a vanished root is skipped; otherwise it fails
/// the call with ManagedObjectNotFound. Objects that vanish further along
/// the walk are always skipped.
pub(crate) fn select(
    registry: &Registry,
    ctx: &Context,
    spec: &PropertyFilterSpec,
    tolerate_missing: bool,
) -> Result<Selection> {
    let table = spec.traversal_table()?;
    let mut walk = Walk {
        registry,
        ctx,
        table: &table,
        visited: HashSet::new(),
        seen: HashSet::new(),
        selection: Selection::default(),
    };

    for object in &spec.object_set {
        let Some(root) = snapshot(registry, ctx, &object.obj) else {
            if tolerate_missing {
                trace!(obj = %object.obj, "skipping missing root");
                continue;
            }
            return Err(Fault::ManagedObjectNotFound {
                obj: object.obj.clone(),
            });
        };

        if object.select_set.is_empty() || !object.skip {
            walk.push(&root.obj);
        }
        walk.walk(&root, &object.select_set)?;
    }

    Ok(walk.selection)
}

struct Walk<'a> {
    registry: &'a Registry,
    ctx: &'a Context,
    table: &'a HashMap<String, TraversalSpec>,
    visited: HashSet<(ObjectRef, String)>,
    seen: HashSet<ObjectRef>,
    selection: Selection,
}

impl<'a> Walk<'a> {
    fn push(&mut self, obj: &ObjectRef) {
        if self.seen.insert(obj.clone()) {
            self.selection.candidates.push(obj.clone());
        }
    }

    fn walk(&mut self, from: &Snapshot, select_set: &[SelectionSpec]) -> Result<()> {
        let table = self.table;
        for selection in select_set {
            let ts = match selection {
                SelectionSpec::Traversal(ts) => ts,
                SelectionSpec::Named(name) => table.get(name).ok_or_else(|| {
                    Fault::invalid_argument(format!("undefined TraversalSpec name {}", name))
                })?,
            };

            if !ts.kind.is_empty() && !from.is_a(&ts.kind) {
                continue;
            }
            self.selection.traversed.insert(from.obj.clone());
            if !self.visited.insert((from.obj.clone(), ts.walk_key())) {
                continue;
            }

            let refs = resolve_name(&from.view, &ts.path)
                .into_value()
                .map(|v| v.references())
                .unwrap_or_default();

            for next in refs {
                if !ts.skip {
                    self.push(&next);
                }
                if ts.select_set.is_empty() {
                    continue;
                }
                match snapshot(self.registry, self.ctx, &next) {
                    Some(snap) => self.walk(&snap, &ts.select_set)?,
                    None => trace!(obj = %next, "traversal target vanished"),
                }
            }
        }

        Ok(())
    }
}
