//! The property collector
//!
//! A collector answers one-shot queries and owns a set of filters whose
//! changes are delivered through `wait_for_updates_ex`. Registry changes
//! are buffered by a listener and drained on a short timer, so a burst of
//! mutations lands in one response.

use crate::config::CollectorConfig;
use crate::content::{ObjectContent, RetrieveOptions, RetrieveResult};
use crate::filter::{ChangeBatch, FilterState, PropertyFilter};
use crate::query::{ObjectSpec, PropertyFilterSpec, PropertySpec};
use crate::retrieve::{collect, PageBook};
use crate::select::select;
use crate::update::{truncate, PropertyFilterUpdate, UpdateSet, WaitOptions};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio::sync::oneshot;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info};
use vsim_registry::{CollectingListener, Context, ListenerId, Registry};
use vsim_types::{Fault, ObjectRef, Result, Value};

/// Version token returned by the initial sync
pub const INITIAL_VERSION: &str = "-";

struct CollectorState {
    filters: Vec<FilterState>,
    pending: Option<UpdateSet>,
    listener: Option<ListenerId>,
}

struct CollectorInner {
    reference: ObjectRef,
    registry: Arc<Registry>,
    config: CollectorConfig,
    book: PageBook,
    inbox: Arc<CollectingListener>,
    state: Mutex<CollectorState>,
    cancel: Mutex<Option<oneshot::Sender<()>>>,
}

impl CollectorInner {
    /// Listen for registry changes only while some filter can use them
    fn sync_listener(&self, state: &mut CollectorState) {
        if state.filters.is_empty() {
            self.release_listener(state);
        } else if state.listener.is_none() {
            state.listener = Some(self.registry.add_handler(self.inbox.clone()));
            debug!(collector = %self.reference, "subscribed to registry changes");
        }
    }

    fn release_listener(&self, state: &mut CollectorState) {
        if let Some(id) = state.listener.take() {
            self.registry.remove_handler(id);
            self.inbox.take();
            debug!(collector = %self.reference, "unsubscribed from registry changes");
        }
    }

    fn take_pending(&self, max: usize) -> Option<UpdateSet> {
        let mut state = self.state.lock();
        let mut set = state.pending.take()?;
        state.pending = truncate(&mut set, max);
        Some(set)
    }

    fn initial_sync(&self, max: usize) -> Result<UpdateSet> {
        let ctx = Context::new();
        let mut state = self.state.lock();
        self.sync_listener(&mut state);
        // The full query below reflects everything buffered so far
        self.inbox.take();

        let mut set = UpdateSet::new(INITIAL_VERSION);
        for filter in state.filters.iter_mut() {
            filter.reset();
            let updates = filter.sync(&self.registry, &ctx)?;
            if !updates.is_empty() {
                set.filter_set.push(PropertyFilterUpdate {
                    filter: filter.reference.clone(),
                    object_set: updates,
                });
            }
        }

        state.pending = truncate(&mut set, max);
        Ok(set)
    }

    fn incremental_pass(&self, version: &str, max: usize) -> Result<Option<UpdateSet>> {
        let ctx = Context::new();
        let mut state = self.state.lock();
        self.sync_listener(&mut state);

        let batch = ChangeBatch::from_events(self.inbox.take());
        let unsynced = state.filters.iter().any(|f| !f.is_synced());
        if batch.is_empty() && !unsynced {
            return Ok(None);
        }

        debug!(
            changes = batch.len(),
            filters = state.filters.len(),
            "applying updates to filters"
        );

        let mut set = UpdateSet::new(version);
        for filter in state.filters.iter_mut() {
            let updates = if filter.is_synced() {
                filter.apply(&self.registry, &ctx, &batch)?
            } else {
                filter.sync(&self.registry, &ctx)?
            };
            if !updates.is_empty() {
                set.filter_set.push(PropertyFilterUpdate {
                    filter: filter.reference.clone(),
                    object_set: updates,
                });
            }
        }

        if set.is_empty() {
            return Ok(None);
        }
        state.pending = truncate(&mut set, max);
        Ok(Some(set))
    }
}

impl Drop for CollectorInner {
    fn drop(&mut self) {
        if let Some(id) = self.state.get_mut().listener.take() {
            self.registry.remove_handler(id);
        }
    }
}

/// Graph queries and change subscriptions over a registry
#[derive(Clone)]
pub struct PropertyCollector {
    inner: Arc<CollectorInner>,
}

impl PropertyCollector {
    pub fn new(registry: Arc<Registry>, config: CollectorConfig) -> Self {
        let reference = registry.allocate_ref("PropertyCollector", "propertyCollector");
        info!(collector = %reference, "created property collector");
        Self {
            inner: Arc::new(CollectorInner {
                reference,
                registry,
                config,
                book: PageBook::default(),
                inbox: Arc::new(CollectingListener::new()),
                state: Mutex::new(CollectorState {
                    filters: Vec::new(),
                    pending: None,
                    listener: None,
                }),
                cancel: Mutex::new(None),
            }),
        }
    }

    pub fn reference(&self) -> &ObjectRef {
        &self.inner.reference
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.inner.registry
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.inner.config
    }

    /// A fresh, independent collector over the same registry
    pub fn create_property_collector(&self) -> PropertyCollector {
        PropertyCollector::new(self.inner.registry.clone(), self.inner.config.clone())
    }

    /// Tear the collector down: abort any blocked wait, drop all filters
    /// and stop listening for registry changes.
    pub fn destroy_property_collector(self) {
        self.cancel_wait_for_updates();
        let mut state = self.inner.state.lock();
        state.filters.clear();
        state.pending = None;
        self.inner.release_listener(&mut state);
        info!(collector = %self.inner.reference, "destroyed property collector");
    }

    /// Register a filter. Its objects are announced by the next wait.
    pub fn create_filter(&self, spec: PropertyFilterSpec, partial_updates: bool) -> Result<ObjectRef> {
        // Reject unknown traversal names and missing roots up front
        select(
            &self.inner.registry,
            &Context::new(),
            &spec,
            spec.report_missing_objects_in_results,
        )?;

        let reference = self.inner.registry.allocate_ref("PropertyFilter", "filter");
        debug!(filter = %reference, "created filter");
        self.inner
            .state
            .lock()
            .filters
            .push(FilterState::new(reference.clone(), spec, partial_updates));
        Ok(reference)
    }

    pub fn destroy_filter(&self, filter: &ObjectRef) -> Result<()> {
        let mut state = self.inner.state.lock();
        let before = state.filters.len();
        state.filters.retain(|f| &f.reference != filter);
        if state.filters.len() == before {
            return Err(Fault::not_found(format!("filter {}", filter)));
        }
        if let Some(pending) = state.pending.as_mut() {
            pending.filter_set.retain(|f| &f.filter != filter);
        }
        if state.filters.is_empty() {
            self.inner.release_listener(&mut state);
        }
        debug!(%filter, "destroyed filter");
        Ok(())
    }

    pub fn filters(&self) -> Vec<PropertyFilter> {
        self.inner.state.lock().filters.iter().map(FilterState::info).collect()
    }

    /// Run `specs` once. Results beyond `options.max_objects` are kept
    /// behind a continuation token.
    pub fn retrieve_properties_ex(
        &self,
        specs: &[PropertyFilterSpec],
        options: RetrieveOptions,
    ) -> Result<RetrieveResult> {
        let collected = collect(&self.inner.registry, &Context::new(), specs, false)?;
        Ok(self.inner.book.page(collected.objects, options.page_size()))
    }

    /// Next page of an earlier result; each token can be used once
    pub fn continue_retrieve_properties_ex(&self, token: &str) -> Result<RetrieveResult> {
        self.inner.book.resume(token)
    }

    /// Run `specs` once and return everything
    pub fn retrieve_properties(&self, specs: &[PropertyFilterSpec]) -> Result<Vec<ObjectContent>> {
        Ok(collect(&self.inner.registry, &Context::new(), specs, false)?.objects)
    }

    /// Read a single property. `Ok(None)` means the property is unset.
    pub fn fetch(&self, obj: &ObjectRef, property: &str) -> Result<Option<Value>> {
        let spec = PropertyFilterSpec::new()
            .prop(PropertySpec::new(obj.kind()).path(property))
            .object(ObjectSpec::new(obj.clone()));

        let objects = self.retrieve_properties(std::slice::from_ref(&spec))?;
        let content = objects
            .into_iter()
            .next()
            .ok_or_else(|| Fault::ManagedObjectNotFound { obj: obj.clone() })?;

        if let Some(missing) = content.missing(property) {
            return Err(missing.fault.fault.clone());
        }
        Ok(content.get(property).cloned())
    }

    /// Wait for filter changes.
    ///
    /// Version `""` runs every filter's query and returns all matched
    /// objects as Enter updates with version [`INITIAL_VERSION`]. Any other
    /// version blocks until a filter has something to report, the wait is
    /// cancelled (RequestCanceled) or `max_wait_seconds` elapses
    /// (DeadlineExceeded). A single pass (`max_wait_seconds == 0`) returns
    /// `Ok(None)` when nothing changed.
    ///
    /// A response truncated at the update cap is continued by the next
    /// call before anything new is computed.
    pub async fn wait_for_updates_ex(
        &self,
        version: &str,
        options: WaitOptions,
    ) -> Result<Option<UpdateSet>> {
        let max = self.inner.config.max_updates(options.max_object_updates);
        let (tx, mut cancelled) = oneshot::channel();
        *self.inner.cancel.lock() = Some(tx);

        if let Some(set) = self.inner.take_pending(max) {
            debug!(updates = set.object_count(), truncated = set.truncated, "flushing pending updates");
            return Ok(Some(set));
        }

        if version.is_empty() {
            let inner = self.inner.clone();
            let set = tokio::task::spawn_blocking(move || inner.initial_sync(max))
                .await
                .map_err(|e| Fault::runtime(e.to_string()))??;
            return Ok(Some(set));
        }

        let deadline = match options.max_wait_seconds {
            Some(seconds) if seconds > 0 => {
                Some(Instant::now() + std::time::Duration::from_secs(u64::from(seconds)))
            }
            _ => None,
        };
        let expired = async move {
            match deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(expired);

        let mut ticker = tokio::time::interval(self.inner.config.poll_interval());
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut superseded = false;

        loop {
            tokio::select! {
                res = &mut cancelled, if !superseded => {
                    match res {
                        Ok(()) => {
                            debug!(collector = %self.inner.reference, "wait cancelled");
                            return Err(Fault::RequestCanceled);
                        }
                        // A newer wait took over the cancel handle
                        Err(_) => superseded = true,
                    }
                }
                _ = &mut expired => {
                    return Err(Fault::DeadlineExceeded);
                }
                _ = ticker.tick() => {
                    let inner = self.inner.clone();
                    let token = version.to_string();
                    let pass = tokio::task::spawn_blocking(move || inner.incremental_pass(&token, max))
                        .await
                        .map_err(|e| Fault::runtime(e.to_string()))??;
                    match pass {
                        Some(set) => return Ok(Some(set)),
                        None if options.is_single_pass() => return Ok(None),
                        None => {}
                    }
                }
            }
        }
    }

    /// `wait_for_updates_ex` without options: blocks until something changes
    pub async fn wait_for_updates(&self, version: &str) -> Result<Option<UpdateSet>> {
        self.wait_for_updates_ex(version, WaitOptions::default()).await
    }

    /// Abort the wait currently blocked on this collector, if any
    pub fn cancel_wait_for_updates(&self) {
        if let Some(tx) = self.inner.cancel.lock().take() {
            let _ = tx.send(());
        }
    }
}

impl std::fmt::Debug for PropertyCollector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PropertyCollector")
            .field("reference", &self.inner.reference)
            .finish()
    }
}
