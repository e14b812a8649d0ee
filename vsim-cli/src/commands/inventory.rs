use super::{inventory_spec, render, Simulator};
use crate::config::SimConfig;
use anyhow::Result;
use serde::Serialize;
use vsim_collector::PropertySpec;

#[derive(Debug, Serialize)]
struct Entry {
    kind: String,
    id: String,
    name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    power_state: Option<String>,
}

/// List the simulated inventory
pub fn show_inventory(config: &SimConfig, json: bool) -> Result<()> {
    let sim = Simulator::start(config)?;
    let spec = inventory_spec(
        &sim.model.root,
        vec![
            PropertySpec::new("ManagedEntity").path("name"),
            PropertySpec::new("VirtualMachine").path("runtime.powerState"),
        ],
    );

    let entries: Vec<Entry> = sim
        .collector
        .retrieve_properties(&[spec])?
        .into_iter()
        .map(|content| Entry {
            kind: content.obj.kind.clone(),
            id: content.obj.value.clone(),
            name: content.get("name").map(render).unwrap_or_default(),
            power_state: content.get("runtime.powerState").map(render),
        })
        .collect();

    if json {
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    for entry in &entries {
        println!(
            "{:<16} {:<10} {:<16} {}",
            entry.kind,
            entry.id,
            entry.name,
            entry.power_state.as_deref().unwrap_or("-")
        );
    }
    println!("{} entities", entries.len());
    Ok(())
}
