//! Task creation and execution

use crate::config::TaskConfig;
use crate::handle::TaskHandle;
use crate::info::{TaskInfo, TaskObject, TaskState};
use chrono::Utc;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use tracing::{debug, warn};
use vsim_registry::{Context, LockGuard, Registry};
use vsim_types::{LocalizedFault, ObjectRef, PropertyChange, Result, Value};

/// Outcome of a work body: an optional result value, or a fault
pub type TaskOutcome = Result<Option<Value>>;

type WorkFn = Box<dyn FnOnce(&TaskScope) -> TaskOutcome + Send + 'static>;

/// Creates tasks against one registry
pub struct TaskManager {
    registry: Arc<Registry>,
    config: Arc<TaskConfig>,
    recent: Arc<Mutex<VecDeque<ObjectRef>>>,
}

impl TaskManager {
    pub fn new(registry: Arc<Registry>, config: TaskConfig) -> Self {
        Self {
            registry,
            config: Arc::new(config),
            recent: Arc::new(Mutex::new(VecDeque::new())),
        }
    }

    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    pub fn config(&self) -> &TaskConfig {
        &self.config
    }

    /// Wrap `work` as a queued task acting on `entity`.
    ///
    /// Nothing runs and nothing is registered until [`Task::run`].
    pub fn create_task<F>(&self, entity: ObjectRef, name: &str, work: F) -> Task
    where
        F: FnOnce(&TaskScope) -> TaskOutcome + Send + 'static,
    {
        Task {
            registry: self.registry.clone(),
            config: self.config.clone(),
            recent: self.recent.clone(),
            info: TaskInfo::new(entity, name),
            work: Box::new(work),
        }
    }

    /// Most recently started tasks, oldest first
    pub fn recent_tasks(&self) -> Vec<ObjectRef> {
        self.recent.lock().iter().cloned().collect()
    }
}

/// A unit of work that has not started yet
pub struct Task {
    registry: Arc<Registry>,
    config: Arc<TaskConfig>,
    recent: Arc<Mutex<VecDeque<ObjectRef>>>,
    info: TaskInfo,
    work: WorkFn,
}

impl std::fmt::Debug for Task {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Task").field("info", &self.info).finish()
    }
}

impl Task {
    pub fn info(&self) -> &TaskInfo {
        &self.info
    }

    /// Register the task, move it to `running` and launch the work body on
    /// a blocking worker.
    ///
    /// Must be called from within a tokio runtime. Work body failures are
    /// never reported here; they end up in the task's `info.error`.
    pub fn run(self, ctx: &Context) -> TaskHandle {
        let Task {
            registry,
            config,
            recent,
            mut info,
            work,
        } = self;

        let entity = info.entity.clone();
        let reference = registry.put_with("Task", "task", |reference| {
            info.key = reference.value().to_string();
            info.task = reference.clone();
            TaskObject { info: info.clone() }
        });

        if let Err(fault) = registry.atomic_update(
            ctx,
            &reference,
            vec![
                PropertyChange::assign("info.startTime", Utc::now()),
                PropertyChange::assign("info.state", TaskState::Running),
            ],
        ) {
            warn!(task = %reference, %fault, "failed to start task");
        }

        remember(&recent, &reference, config.recent_limit);

        let name = registry
            .get(&reference)
            .and_then(|h| h.read_as(|t: &TaskObject| t.info.name.clone()))
            .unwrap_or_default();

        // The lock is taken under the caller's identity, so a caller that
        // already holds it re-enters rather than blocking.
        let handoff = if config.lock_handoff {
            registry.acquire_lock(ctx, &entity).ok()
        } else {
            None
        };

        debug!(task = %reference, %entity, %name, handoff = config.lock_handoff, "task queued");

        let scope_ctx = if config.lock_handoff {
            ctx.clone()
        } else {
            Context::new()
        };
        let worker = Worker {
            registry: registry.clone(),
            config,
            task: reference.clone(),
            entity,
            name,
            ctx: scope_ctx,
        };
        tokio::task::spawn_blocking(move || worker.execute(handoff, work));

        TaskHandle::new(registry, reference)
    }

    /// [`run`](Task::run), then block the current thread until the task
    /// reaches a terminal state
    pub fn run_blocking(self, ctx: &Context) -> TaskHandle {
        let handle = self.run(ctx);
        if let Err(fault) = handle.wait_blocking() {
            debug!(task = %handle.reference(), %fault, "blocking task finished with error");
        }
        handle
    }
}

fn remember(recent: &Mutex<VecDeque<ObjectRef>>, reference: &ObjectRef, limit: usize) {
    let mut recent = recent.lock();
    recent.push_back(reference.clone());
    while recent.len() > limit {
        recent.pop_front();
    }
}

struct Worker {
    registry: Arc<Registry>,
    config: Arc<TaskConfig>,
    task: ObjectRef,
    entity: ObjectRef,
    name: String,
    ctx: Context,
}

impl Worker {
    fn execute(self, handoff: Option<LockGuard>, work: WorkFn) {
        let delay = self.config.delay_for(&self.name);
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }

        let guard = match handoff {
            Some(guard) => Some(guard),
            None if !self.config.lock_handoff => {
                self.registry.acquire_lock(&self.ctx, &self.entity).ok()
            }
            None => None,
        };

        let scope = TaskScope {
            registry: self.registry.clone(),
            ctx: self.ctx.clone(),
            task: self.task.clone(),
            entity: self.entity.clone(),
        };
        let outcome = work(&scope);
        drop(guard);

        self.complete(outcome);
    }

    fn complete(&self, outcome: TaskOutcome) {
        let (state, result, error) = match outcome {
            Ok(result) => (TaskState::Success, result, None),
            Err(fault) => (TaskState::Error, None, Some(LocalizedFault::from(fault))),
        };

        let committed = self.registry.with_lock(&self.ctx, &self.task, |guard| -> Result<bool> {
            let current = guard
                .read_as(|t: &TaskObject| t.info.state)
                .unwrap_or(TaskState::Error);
            if current.is_terminal() {
                // Cancelled while the body ran; the cancellation stands
                return Ok(false);
            }
            self.registry.update(
                guard,
                vec![
                    PropertyChange::assign("info.completeTime", Utc::now()),
                    PropertyChange::assign("info.state", state),
                    PropertyChange::assign_opt("info.result", result),
                    PropertyChange::assign_opt("info.error", error.map(Value::Fault)),
                ],
            )?;
            Ok(true)
        });

        match committed {
            Ok(Ok(true)) => debug!(task = %self.task, %state, "task completed"),
            Ok(Ok(false)) => debug!(task = %self.task, "task already finished, result dropped"),
            Ok(Err(fault)) | Err(fault) => {
                warn!(task = %self.task, %fault, "failed to commit task completion")
            }
        }
    }
}

/// What a work body gets to see while it runs
pub struct TaskScope {
    registry: Arc<Registry>,
    ctx: Context,
    task: ObjectRef,
    entity: ObjectRef,
}

impl TaskScope {
    pub fn registry(&self) -> &Arc<Registry> {
        &self.registry
    }

    /// Context that owns the entity lock for the duration of the body
    pub fn context(&self) -> &Context {
        &self.ctx
    }

    pub fn task(&self) -> &ObjectRef {
        &self.task
    }

    pub fn entity(&self) -> &ObjectRef {
        &self.entity
    }

    pub fn update_progress(&self, percent: i32) -> Result<()> {
        TaskHandle::new(self.registry.clone(), self.task.clone())
            .update_progress(&self.ctx.isolated(), percent)
    }

    /// Whether the task was cancelled; bodies may poll this to stop early
    pub fn is_cancelled(&self) -> bool {
        self.registry
            .get(&self.task)
            .and_then(|h| h.read_as(|t: &TaskObject| t.info.cancelled))
            .unwrap_or(false)
    }
}
