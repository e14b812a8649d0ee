//! Populating a registry with a small inventory

use crate::folder::Folder;
use crate::vm::{PowerState, VirtualMachine};
use serde::{Deserialize, Serialize};
use tracing::info;
use vsim_registry::{Context, Registry};
use vsim_types::{ObjectRef, PropertyChange, Result};

/// Identifier of the well-known root folder
pub const ROOT_FOLDER: &str = "group-d1";

pub fn root_folder_ref() -> ObjectRef {
    ObjectRef::new("Folder", ROOT_FOLDER)
}

/// Shape of the generated inventory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Folders created under the root folder
    #[serde(default = "default_folders")]
    pub folders: usize,

    #[serde(default = "default_vms_per_folder")]
    pub vms_per_folder: usize,

    /// Start every machine powered on
    #[serde(default)]
    pub powered_on: bool,
}

fn default_folders() -> usize {
    1
}

fn default_vms_per_folder() -> usize {
    2
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            folders: default_folders(),
            vms_per_folder: default_vms_per_folder(),
            powered_on: false,
        }
    }
}

/// References of everything a [`Model`] created
#[derive(Debug, Clone, PartialEq)]
pub struct Model {
    pub root: ObjectRef,
    pub folders: Vec<ObjectRef>,
    pub vms: Vec<ObjectRef>,
}

impl Model {
    /// Create the root folder, `config.folders` child folders and
    /// `config.vms_per_folder` machines in each of them.
    pub fn build(registry: &Registry, config: &ModelConfig) -> Result<Model> {
        let ctx = Context::new();
        let root = registry.put_with_ref(root_folder_ref(), Folder::new("Datacenters"))?;

        let mut folders = Vec::with_capacity(config.folders);
        let mut vms = Vec::with_capacity(config.folders * config.vms_per_folder);

        for f in 0..config.folders {
            let folder = registry.put_entity(&ctx, &root, Folder::new(format!("F{}", f)))?;
            for v in 0..config.vms_per_folder {
                let mut vm = VirtualMachine::new(format!("DC0_F{}_VM{}", f, v));
                if config.powered_on {
                    vm.power_state = PowerState::PoweredOn;
                }
                vms.push(registry.put_entity(&ctx, &folder, vm)?);
            }
            folders.push(folder);
        }

        info!(
            folders = folders.len(),
            vms = vms.len(),
            "inventory model created"
        );
        Ok(Model { root, folders, vms })
    }

    /// Change a machine's annotation outside of any task
    pub fn annotate(registry: &Registry, vm: &ObjectRef, annotation: &str) -> Result<()> {
        registry.atomic_update(
            &Context::new(),
            vm,
            vec![PropertyChange::assign("config.annotation", annotation)],
        )
    }
}
