//! Inventory entities for the vsim simulator
//!
//! Just enough of a virtual infrastructure to drive the registry, the task
//! engine and the property collector: folders, virtual machines, a handful
//! of task-backed operations and a [`Model`] builder.

mod folder;
mod model;
mod power;
mod vm;

pub use folder::Folder;
pub use model::{root_folder_ref, Model, ModelConfig, ROOT_FOLDER};
pub use power::{destroy_vm, power_off_vm, power_on_vm, rename, suspend_vm};
pub use vm::{PowerState, VirtualDevice, VirtualMachine};
