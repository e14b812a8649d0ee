//! Task state and its registered representation

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use vsim_registry::ManagedObject;
use vsim_types::{DataObject, Fault, LocalizedFault, ObjectRef, PropertyChange, Result, Value};

/// Lifecycle state of a task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TaskState {
    Queued,
    Running,
    Success,
    Error,
}

impl TaskState {
    pub fn is_terminal(self) -> bool {
        matches!(self, TaskState::Success | TaskState::Error)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Queued => "queued",
            TaskState::Running => "running",
            TaskState::Success => "success",
            TaskState::Error => "error",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TaskState {
    type Err = Fault;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "queued" => Ok(TaskState::Queued),
            "running" => Ok(TaskState::Running),
            "success" => Ok(TaskState::Success),
            "error" => Ok(TaskState::Error),
            _ => Err(Fault::invalid_argument("state")),
        }
    }
}

impl From<TaskState> for Value {
    fn from(state: TaskState) -> Self {
        Value::String(state.as_str().to_string())
    }
}

/// Everything known about one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TaskInfo {
    /// The task's reference value, empty until the task runs
    pub key: String,
    pub task: ObjectRef,
    pub name: String,
    pub description_id: String,
    pub description: Option<String>,
    pub entity: ObjectRef,
    pub entity_name: String,
    pub state: TaskState,
    pub cancelled: bool,
    pub progress: Option<i32>,
    pub result: Option<Value>,
    pub error: Option<LocalizedFault>,
    pub queue_time: DateTime<Utc>,
    pub start_time: Option<DateTime<Utc>>,
    pub complete_time: Option<DateTime<Utc>>,
}

impl TaskInfo {
    /// Fresh queued info for a task called `name` acting on `entity`.
    ///
    /// A name ending in `Task` is normalised to `<Id>_Task`, and the
    /// description id becomes `<EntityKind>.<Id>`.
    pub fn new(entity: ObjectRef, name: &str) -> Self {
        let id = name
            .strip_suffix("Task")
            .map(|id| id.strip_suffix('_').unwrap_or(id));

        let (name, id) = match id {
            Some(id) => (format!("{}_Task", id), id.to_string()),
            None => (name.to_string(), name.to_string()),
        };

        Self {
            key: String::new(),
            task: ObjectRef::new("Task", ""),
            name: upper_first(&name),
            description_id: format!("{}.{}", entity.kind(), id),
            description: None,
            entity_name: entity.value().to_string(),
            entity,
            state: TaskState::Queued,
            cancelled: false,
            progress: None,
            result: None,
            error: None,
            queue_time: Utc::now(),
            start_time: None,
            complete_time: None,
        }
    }

    pub fn to_data_object(&self) -> DataObject {
        DataObject::new("TaskInfo")
            .with("key", self.key.as_str())
            .with("task", self.task.clone())
            .with("name", self.name.as_str())
            .with("descriptionId", self.description_id.as_str())
            .with_opt("description", self.description.clone().map(Value::String))
            .with("entity", self.entity.clone())
            .with("entityName", self.entity_name.as_str())
            .with("state", self.state)
            .with("cancelled", self.cancelled)
            .with_opt("progress", self.progress.map(Value::Int))
            .with_opt("result", self.result.clone())
            .with_opt("error", self.error.clone().map(Value::Fault))
            .with("queueTime", self.queue_time)
            .with_opt("startTime", self.start_time.map(Value::DateTime))
            .with_opt("completeTime", self.complete_time.map(Value::DateTime))
    }

    fn apply(&mut self, field: &str, val: Option<&Value>) -> Result<()> {
        let invalid = || Fault::invalid_property(format!("info.{}", field));
        match field {
            "state" => {
                self.state = val.and_then(Value::as_str).ok_or_else(invalid)?.parse()?;
            }
            "cancelled" => self.cancelled = val.and_then(Value::as_bool).unwrap_or(false),
            "progress" => {
                self.progress = match val {
                    Some(v) => Some(v.as_i64().ok_or_else(invalid)? as i32),
                    None => None,
                }
            }
            "description" => self.description = val.and_then(Value::as_str).map(str::to_string),
            "result" => self.result = val.cloned(),
            "error" => {
                self.error = match val {
                    Some(v) => Some(v.as_fault().ok_or_else(invalid)?.clone()),
                    None => None,
                }
            }
            "startTime" => self.start_time = val.and_then(Value::as_datetime),
            "completeTime" => self.complete_time = val.and_then(Value::as_datetime),
            _ => return Err(invalid()),
        }
        Ok(())
    }
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// The registered form of a task
#[derive(Debug, Clone)]
pub struct TaskObject {
    pub info: TaskInfo,
}

impl ManagedObject for TaskObject {
    fn kind(&self) -> &'static str {
        "Task"
    }

    fn base_kinds(&self) -> &'static [&'static str] {
        &["ExtensibleManagedObject"]
    }

    fn id_prefix(&self) -> String {
        "task".to_string()
    }

    fn view(&self) -> DataObject {
        DataObject::new("Task").with("info", self.info.to_data_object())
    }

    fn apply_change(&mut self, change: &PropertyChange) -> Result<()> {
        match change.name.strip_prefix("info.") {
            Some(field) => self.info.apply(field, change.val.as_ref()),
            None => Err(Fault::invalid_property(change.name.clone())),
        }
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vm() -> ObjectRef {
        ObjectRef::new("VirtualMachine", "vm-1")
    }

    #[test]
    fn test_task_name_normalisation() {
        let info = TaskInfo::new(vm(), "PowerOnVMTask");
        assert_eq!(info.name, "PowerOnVM_Task");
        assert_eq!(info.description_id, "VirtualMachine.PowerOnVM");

        let info = TaskInfo::new(vm(), "PowerOnVM_Task");
        assert_eq!(info.name, "PowerOnVM_Task");
        assert_eq!(info.description_id, "VirtualMachine.PowerOnVM");

        let info = TaskInfo::new(vm(), "reconfigure");
        assert_eq!(info.name, "Reconfigure");
        assert_eq!(info.description_id, "VirtualMachine.reconfigure");
        assert_eq!(info.entity_name, "vm-1");
        assert_eq!(info.state, TaskState::Queued);
    }

    #[test]
    fn test_apply_changes() {
        let mut task = TaskObject {
            info: TaskInfo::new(vm(), "DestroyTask"),
        };

        task.apply_change(&PropertyChange::assign("info.state", TaskState::Running))
            .unwrap();
        task.apply_change(&PropertyChange::assign("info.progress", 40))
            .unwrap();
        assert_eq!(task.info.state, TaskState::Running);
        assert_eq!(task.info.progress, Some(40));

        let err = task
            .apply_change(&PropertyChange::assign("info.state", "paused"))
            .unwrap_err();
        assert!(matches!(err, Fault::InvalidArgument { .. }));

        let err = task
            .apply_change(&PropertyChange::assign("name", "x"))
            .unwrap_err();
        assert!(matches!(err, Fault::InvalidProperty { .. }));
    }

    #[test]
    fn test_view_shape() {
        let task = TaskObject {
            info: TaskInfo::new(vm(), "DestroyTask"),
        };
        let view = task.view();
        let info = view.get("info").and_then(Value::as_object).unwrap();

        assert_eq!(info.get("state"), Some(&Value::from("queued")));
        assert_eq!(info.field("startTime"), Some(None));
        assert_eq!(info.get("entity"), Some(&Value::Ref(vm())));
    }
}
