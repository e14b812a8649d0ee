//! Operations on a running or finished task

use crate::info::{TaskInfo, TaskObject, TaskState};
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use vsim_registry::{Context, Registry};
use vsim_types::{Fault, LocalizedFault, ObjectRef, PropertyChange, Result, Value};

const POLL_INTERVAL: Duration = Duration::from_millis(10);

/// Message stored with a user cancellation
pub const CANCELLED_MESSAGE: &str = "The task was canceled by a user";

/// Reference to a registered task
#[derive(Clone)]
pub struct TaskHandle {
    registry: Arc<Registry>,
    reference: ObjectRef,
}

impl std::fmt::Debug for TaskHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TaskHandle").field(&self.reference).finish()
    }
}

impl TaskHandle {
    pub(crate) fn new(registry: Arc<Registry>, reference: ObjectRef) -> Self {
        Self {
            registry,
            reference,
        }
    }

    /// Handle for any task registered in `registry`
    pub fn from_ref(registry: Arc<Registry>, reference: &ObjectRef) -> Result<Self> {
        let handle = registry
            .get(reference)
            .ok_or_else(|| Fault::ManagedObjectNotFound {
                obj: reference.clone(),
            })?;
        if handle.read_as(|_: &TaskObject| ()).is_none() {
            return Err(Fault::invalid_argument("task"));
        }
        Ok(Self::new(registry, reference.clone()))
    }

    pub fn reference(&self) -> &ObjectRef {
        &self.reference
    }

    /// Snapshot of the task's current info
    pub fn info(&self) -> Result<TaskInfo> {
        self.registry
            .get(&self.reference)
            .and_then(|h| h.read_as(|t: &TaskObject| t.info.clone()))
            .ok_or_else(|| self.not_found())
    }

    pub fn state(&self) -> Result<TaskState> {
        self.info().map(|info| info.state)
    }

    /// Wait for the task to finish.
    ///
    /// Returns the task's result, or the fault it finished with.
    pub async fn wait(&self) -> Result<Option<Value>> {
        let ctx = Context::new();
        loop {
            if let Some(info) = self.poll(&ctx)? {
                return outcome(info);
            }
            tokio::time::sleep(POLL_INTERVAL).await;
        }
    }

    /// [`wait`](TaskHandle::wait) for synchronous callers
    pub fn wait_blocking(&self) -> Result<Option<Value>> {
        let ctx = Context::new();
        loop {
            if let Some(info) = self.poll(&ctx)? {
                return outcome(info);
            }
            std::thread::sleep(POLL_INTERVAL);
        }
    }

    /// Check for completion under `ctx`, which must never be the identity
    /// the worker commits with
    fn poll(&self, ctx: &Context) -> Result<Option<TaskInfo>> {
        self.registry.with_lock(ctx, &self.reference, |guard| {
            guard
                .read_as(|t: &TaskObject| t.info.clone())
                .filter(|info| info.state.is_terminal())
        })
    }

    /// Flip the task to `error` with a RequestCanceled fault.
    ///
    /// Cancellation is cooperative: a work body already running is not
    /// interrupted, but its result will not overwrite the cancellation.
    pub fn cancel(&self, ctx: &Context) -> Result<()> {
        self.mutate_live(
            ctx,
            vec![
                PropertyChange::assign("info.cancelled", true),
                PropertyChange::assign("info.completeTime", Utc::now()),
                PropertyChange::assign("info.state", TaskState::Error),
                PropertyChange::assign(
                    "info.error",
                    LocalizedFault::new(Fault::RequestCanceled, CANCELLED_MESSAGE),
                ),
            ],
        )
    }

    /// Set the state of an unfinished task, with its result or fault when
    /// the new state is terminal
    pub fn set_state(
        &self,
        ctx: &Context,
        state: TaskState,
        result: Option<Value>,
        fault: Option<LocalizedFault>,
    ) -> Result<()> {
        let mut changes = vec![PropertyChange::assign("info.state", state)];
        match state {
            TaskState::Running => {
                changes.push(PropertyChange::assign("info.startTime", Utc::now()));
            }
            TaskState::Success | TaskState::Error => {
                changes.push(PropertyChange::assign("info.completeTime", Utc::now()));
                if let Some(fault) = fault {
                    changes.push(PropertyChange::assign("info.error", fault));
                }
                if let Some(result) = result {
                    changes.push(PropertyChange::assign("info.result", result));
                }
            }
            TaskState::Queued => {}
        }
        self.mutate_live(ctx, changes)
    }

    pub fn update_progress(&self, ctx: &Context, percent: i32) -> Result<()> {
        if !(0..=100).contains(&percent) {
            return Err(Fault::invalid_argument("percentDone"));
        }
        self.mutate_live(ctx, vec![PropertyChange::assign("info.progress", percent)])
    }

    pub fn set_description(&self, ctx: &Context, description: &str) -> Result<()> {
        self.mutate_live(
            ctx,
            vec![PropertyChange::assign("info.description", description)],
        )
    }

    /// Apply changes to a task that has not finished yet
    fn mutate_live(&self, ctx: &Context, changes: Vec<PropertyChange>) -> Result<()> {
        let guard = self.registry.acquire_lock(ctx, &self.reference)?;
        let state = guard
            .read_as(|t: &TaskObject| t.info.state)
            .ok_or_else(|| Fault::invalid_argument("task"))?;
        if state.is_terminal() {
            return Err(Fault::InvalidState);
        }
        self.registry.update(&guard, changes)
    }

    fn not_found(&self) -> Fault {
        Fault::ManagedObjectNotFound {
            obj: self.reference.clone(),
        }
    }
}

fn outcome(info: TaskInfo) -> Result<Option<Value>> {
    match (info.state, info.error) {
        (TaskState::Error, Some(error)) => Err(error.fault),
        (TaskState::Error, None) => Err(Fault::runtime("task failed without a fault")),
        _ => Ok(info.result),
    }
}
