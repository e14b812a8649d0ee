//! Long-running operations on virtual machines
//!
//! Each operation returns a queued [`Task`]; nothing happens until the
//! caller runs it. Bodies mutate the machine through the task's context, so
//! under lock handoff they re-enter the lock the caller took at `run`.

use crate::vm::{PowerState, VirtualMachine};
use tracing::debug;
use vsim_tasks::{Task, TaskManager, TaskScope};
use vsim_types::{Fault, ObjectRef, PropertyChange, Result};

fn power_state(scope: &TaskScope) -> Result<PowerState> {
    scope
        .registry()
        .get(scope.entity())
        .and_then(|h| h.read_as(|vm: &VirtualMachine| vm.power_state))
        .ok_or_else(|| Fault::ManagedObjectNotFound {
            obj: scope.entity().clone(),
        })
}

fn transition(manager: &TaskManager, vm: &ObjectRef, name: &str, target: PowerState) -> Task {
    manager.create_task(vm.clone(), name, move |scope| {
        let current = power_state(scope)?;
        if current == target {
            return Err(Fault::InvalidState);
        }
        if target == PowerState::Suspended && current != PowerState::PoweredOn {
            return Err(Fault::InvalidState);
        }
        scope.registry().atomic_update(
            scope.context(),
            scope.entity(),
            vec![PropertyChange::assign("runtime.powerState", target)],
        )?;
        debug!(vm = %scope.entity(), from = %current, to = %target, "power state changed");
        Ok(None)
    })
}

pub fn power_on_vm(manager: &TaskManager, vm: &ObjectRef) -> Task {
    transition(manager, vm, "PowerOnVM_Task", PowerState::PoweredOn)
}

pub fn power_off_vm(manager: &TaskManager, vm: &ObjectRef) -> Task {
    transition(manager, vm, "PowerOffVM_Task", PowerState::PoweredOff)
}

pub fn suspend_vm(manager: &TaskManager, vm: &ObjectRef) -> Task {
    transition(manager, vm, "SuspendVM_Task", PowerState::Suspended)
}

/// Rename any entity that has a `name` property
pub fn rename(manager: &TaskManager, entity: &ObjectRef, new_name: &str) -> Task {
    let new_name = new_name.to_string();
    manager.create_task(entity.clone(), "Rename_Task", move |scope| {
        if new_name.is_empty() {
            return Err(Fault::invalid_argument("newName"));
        }
        scope.registry().atomic_update(
            scope.context(),
            scope.entity(),
            vec![PropertyChange::assign("name", new_name)],
        )?;
        Ok(None)
    })
}

/// Remove a powered-off machine from the inventory
pub fn destroy_vm(manager: &TaskManager, vm: &ObjectRef) -> Task {
    manager.create_task(vm.clone(), "Destroy_Task", move |scope| {
        if power_state(scope)? == PowerState::PoweredOn {
            return Err(Fault::InvalidState);
        }
        scope.registry().remove_entity(scope.context(), scope.entity())?;
        debug!(vm = %scope.entity(), "destroyed");
        Ok(None)
    })
}
