//! One-shot retrieval and result paging

use crate::content::{DynamicProperty, MissingProperty, ObjectContent, RetrieveResult};
use crate::query::{PropertyFilterSpec, PropertySpec};
use crate::resolve::{is_empty, resolve_name, Resolved};
use crate::select::{select, snapshot, Selection, Snapshot};
use dashmap::DashMap;
use std::collections::HashSet;
use tracing::{debug, trace};
use uuid::Uuid;
use vsim_registry::{Context, Registry};
use vsim_types::{Fault, LocalizedFault, ObjectRef, Result};

/// Report the properties `props` ask for; `None` when no spec applies to
/// the object's kind
pub(crate) fn collect_object(snap: &Snapshot, props: &[PropertySpec]) -> Option<ObjectContent> {
    let mut content = ObjectContent::new(snap.obj.clone());
    let mut seen: HashSet<String> = HashSet::new();
    let mut matched = false;

    for spec in props {
        if !snap.is_a(&spec.kind) {
            continue;
        }
        matched = true;

        if spec.all {
            for (name, val) in snap.view.fields() {
                let Some(val) = val else { continue };
                if name == "self" || is_empty(val) || !seen.insert(name.to_string()) {
                    continue;
                }
                content.prop_set.push(DynamicProperty {
                    name: name.to_string(),
                    val: val.clone(),
                });
            }
            continue;
        }

        for name in &spec.path_set {
            if !seen.insert(name.clone()) {
                continue;
            }
            match resolve_name(&snap.view, name) {
                Resolved::Present(val) => content.prop_set.push(DynamicProperty {
                    name: name.clone(),
                    val,
                }),
                Resolved::Empty => {}
                Resolved::Missing | Resolved::Invalid => {
                    content.missing_set.push(MissingProperty {
                        path: name.clone(),
                        fault: LocalizedFault::from(Fault::invalid_property(name.clone())),
                    })
                }
            }
        }
    }

    matched.then_some(content)
}

/// Objects reached by a set of queries, with their requested properties
pub(crate) struct Collected {
    pub(crate) objects: Vec<ObjectContent>,
    pub(crate) traversed: HashSet<ObjectRef>,
}

/// Run `specs` against the registry.
///
/// Every property spec of every query applies to every reached object.
/// `tolerate_missing` skips missing roots regardless of what the
/// individual queries ask for.
pub(crate) fn collect(
    registry: &Registry,
    ctx: &Context,
    specs: &[PropertyFilterSpec],
    tolerate_missing: bool,
) -> Result<Collected> {
    let mut candidates = Vec::new();
    let mut seen = HashSet::new();
    let mut traversed = HashSet::new();

    for spec in specs {
        let Selection {
            candidates: reached,
            traversed: walked,
        } = select(
            registry,
            ctx,
            spec,
            tolerate_missing || spec.report_missing_objects_in_results,
        )?;
        for obj in reached {
            if seen.insert(obj.clone()) {
                candidates.push(obj);
            }
        }
        traversed.extend(walked);
    }

    let props: Vec<PropertySpec> = specs.iter().flat_map(|s| s.prop_set.clone()).collect();
    let mut objects = Vec::with_capacity(candidates.len());
    for obj in &candidates {
        match snapshot(registry, ctx, obj) {
            Some(snap) => objects.extend(collect_object(&snap, &props)),
            None => trace!(%obj, "object no longer exists"),
        }
    }

    Ok(Collected { objects, traversed })
}

struct StoredPage {
    max_objects: usize,
    objects: Vec<ObjectContent>,
}

/// Remainders of paged results, keyed by continuation token
#[derive(Default)]
pub(crate) struct PageBook {
    pages: DashMap<String, StoredPage>,
}

impl PageBook {
    /// Split `objects` into an immediate page and a stored remainder
    pub(crate) fn page(&self, mut objects: Vec<ObjectContent>, max: Option<usize>) -> RetrieveResult {
        match max {
            Some(max) if objects.len() > max => {
                let rest = objects.split_off(max);
                let token = Uuid::new_v4().to_string();
                debug!(%token, stored = rest.len(), "storing result remainder");
                self.pages.insert(
                    token.clone(),
                    StoredPage {
                        max_objects: max,
                        objects: rest,
                    },
                );
                RetrieveResult {
                    objects,
                    token: Some(token),
                }
            }
            _ => RetrieveResult {
                objects,
                token: None,
            },
        }
    }

    /// Hand out (and forget) the remainder stored under `token`
    pub(crate) fn resume(&self, token: &str) -> Result<RetrieveResult> {
        if token.is_empty() {
            return Err(Fault::invalid_property("token"));
        }
        let (_, page) = self
            .pages
            .remove(token)
            .ok_or_else(|| Fault::invalid_property("token"))?;
        Ok(self.page(page.objects, Some(page.max_objects)))
    }

    pub(crate) fn len(&self) -> usize {
        self.pages.len()
    }
}
