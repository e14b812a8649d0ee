//! CLI command implementations.

pub mod inventory;
pub mod show_config;
pub mod watch;

pub use inventory::show_inventory;
pub use show_config::show_config;
pub use watch::watch_updates;

use crate::config::SimConfig;
use anyhow::Result;
use std::sync::Arc;
use vsim_collector::{
    ObjectSpec, PropertyCollector, PropertyFilterSpec, PropertySpec, SelectionSpec, TraversalSpec,
};
use vsim_inventory::Model;
use vsim_registry::Registry;
use vsim_tasks::TaskManager;
use vsim_types::{ObjectRef, Value};

/// The engines wired together over one populated registry
pub struct Simulator {
    pub tasks: TaskManager,
    pub collector: PropertyCollector,
    pub model: Model,
}

impl Simulator {
    pub fn start(config: &SimConfig) -> Result<Self> {
        let registry = Arc::new(Registry::new());
        let model = Model::build(&registry, &config.model)?;
        let tasks = TaskManager::new(registry.clone(), config.tasks.clone());
        let collector = PropertyCollector::new(registry.clone(), config.collector.clone());
        Ok(Self {
            tasks,
            collector,
            model,
        })
    }
}

/// Every entity below `root`, following folder children
pub fn inventory_spec(root: &ObjectRef, props: Vec<PropertySpec>) -> PropertyFilterSpec {
    let folders = TraversalSpec::new("folderTraversal", "Folder", "childEntity")
        .select(SelectionSpec::named("folderTraversal"));
    props.into_iter().fold(
        PropertyFilterSpec::new().object(ObjectSpec::new(root.clone()).skip(true).select(folders)),
        PropertyFilterSpec::prop,
    )
}

/// Short human-readable rendering of a property value
pub fn render(val: &Value) -> String {
    match val {
        Value::Bool(b) => b.to_string(),
        Value::Int(i) => i.to_string(),
        Value::Long(l) => l.to_string(),
        Value::Double(d) => d.to_string(),
        Value::String(s) => s.clone(),
        Value::DateTime(t) => t.to_rfc3339(),
        Value::Ref(r) => r.value.clone(),
        Value::Array(a) => {
            let items: Vec<String> = a.items.iter().map(render).collect();
            format!("[{}]", items.join(", "))
        }
        Value::Object(o) => {
            let fields: Vec<String> = o
                .fields()
                .filter_map(|(name, val)| val.map(|v| format!("{}: {}", name, render(v))))
                .collect();
            format!("{{{}}}", fields.join(", "))
        }
        Value::Fault(f) => f.localized_message.clone(),
    }
}
