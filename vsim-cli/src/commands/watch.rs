use super::{inventory_spec, render, Simulator};
use crate::config::SimConfig;
use anyhow::Result;
use tracing::{info, warn};
use vsim_collector::{PropertySpec, UpdateSet, WaitOptions};
use vsim_inventory::power_on_vm;
use vsim_registry::Context;

fn print_set(set: &UpdateSet, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string(set)?);
        return Ok(());
    }
    for update in set.updates() {
        let changes: Vec<String> = update
            .change_set
            .iter()
            .map(|c| match &c.val {
                Some(val) => format!("{}={}", c.name, render(val)),
                None => format!("{}=<unset>", c.name),
            })
            .collect();
        println!(
            "{} {:?} {} {}",
            set.version,
            update.kind,
            update.obj.value,
            changes.join(" ")
        );
    }
    if set.truncated {
        println!("{} (truncated)", set.version);
    }
    Ok(())
}

/// Subscribe to every machine, power on the first `power_on` of them and
/// print the resulting updates until the subscription goes quiet.
pub async fn watch_updates(config: &SimConfig, power_on: usize, json: bool) -> Result<()> {
    let sim = Simulator::start(config)?;
    let spec = inventory_spec(
        &sim.model.root,
        vec![PropertySpec::new("VirtualMachine")
            .path("name")
            .path("runtime.powerState")],
    );
    let filter = sim.collector.create_filter(spec, false)?;
    info!(%filter, "watching virtual machines");

    let mut version = String::new();
    if let Some(set) = sim
        .collector
        .wait_for_updates_ex(&version, WaitOptions::default())
        .await?
    {
        print_set(&set, json)?;
        version = set.version;
    }

    let ctx = Context::new();
    let handles: Vec<_> = sim
        .model
        .vms
        .iter()
        .take(power_on)
        .map(|vm| power_on_vm(&sim.tasks, vm).run(&ctx))
        .collect();
    for handle in handles {
        if let Err(fault) = handle.wait().await {
            warn!(task = %handle.reference(), %fault, "power on failed");
        }
    }

    while let Some(set) = sim
        .collector
        .wait_for_updates_ex(&version, WaitOptions::single_pass())
        .await?
    {
        print_set(&set, json)?;
        version = set.version;
    }
    Ok(())
}
