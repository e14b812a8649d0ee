//! Virtual machines and their devices

use serde::{Deserialize, Serialize};
use std::any::Any;
use std::fmt;
use std::str::FromStr;
use vsim_registry::ManagedObject;
use vsim_types::{ChangeOp, DataObject, Fault, ObjectRef, PropertyChange, Result, Value};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PowerState {
    PoweredOff,
    PoweredOn,
    Suspended,
}

impl PowerState {
    pub fn as_str(self) -> &'static str {
        match self {
            PowerState::PoweredOff => "poweredOff",
            PowerState::PoweredOn => "poweredOn",
            PowerState::Suspended => "suspended",
        }
    }
}

impl fmt::Display for PowerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PowerState {
    type Err = Fault;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "poweredOff" => Ok(PowerState::PoweredOff),
            "poweredOn" => Ok(PowerState::PoweredOn),
            "suspended" => Ok(PowerState::Suspended),
            _ => Err(Fault::invalid_argument("powerState")),
        }
    }
}

impl From<PowerState> for Value {
    fn from(state: PowerState) -> Self {
        Value::String(state.as_str().to_string())
    }
}

/// A virtual hardware device, addressed by `key` in property paths such as
/// `config.hardware.device[4000].label`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtualDevice {
    pub key: i32,
    pub label: String,
}

impl VirtualDevice {
    pub fn new(key: i32, label: impl Into<String>) -> Self {
        Self {
            key,
            label: label.into(),
        }
    }

    fn to_data_object(&self) -> DataObject {
        DataObject::new("VirtualDevice")
            .with("key", self.key)
            .with("label", self.label.as_str())
    }

    fn from_value(val: &Value) -> Option<Self> {
        let object = val.as_object()?;
        let key = object.get("key").and_then(Value::as_i64)?;
        let label = object.get("label").and_then(Value::as_str).unwrap_or_default();
        Some(Self::new(i32::try_from(key).ok()?, label))
    }
}

#[derive(Debug, Clone)]
pub struct VirtualMachine {
    pub name: String,
    pub parent: Option<ObjectRef>,
    pub power_state: PowerState,
    pub num_cpu: i32,
    pub memory_mb: i32,
    pub annotation: String,
    pub devices: Vec<VirtualDevice>,
}

impl VirtualMachine {
    /// A powered-off machine with one disk and one network adapter
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            power_state: PowerState::PoweredOff,
            num_cpu: 1,
            memory_mb: 32,
            annotation: String::new(),
            devices: vec![
                VirtualDevice::new(2000, "Hard disk 1"),
                VirtualDevice::new(4000, "Network adapter 1"),
            ],
        }
    }
}

fn int_value(change: &PropertyChange) -> Result<i32> {
    change
        .val
        .as_ref()
        .and_then(Value::as_i64)
        .and_then(|n| i32::try_from(n).ok())
        .ok_or_else(|| Fault::invalid_argument(change.name.clone()))
}

impl ManagedObject for VirtualMachine {
    fn kind(&self) -> &'static str {
        "VirtualMachine"
    }

    fn base_kinds(&self) -> &'static [&'static str] {
        &["ManagedEntity", "ExtensibleManagedObject"]
    }

    fn id_prefix(&self) -> String {
        "vm".to_string()
    }

    fn view(&self) -> DataObject {
        let devices = self
            .devices
            .iter()
            .map(|d| Value::Object(d.to_data_object()))
            .collect();
        let hardware = DataObject::new("VirtualHardware")
            .with("numCPU", self.num_cpu)
            .with("memoryMB", self.memory_mb)
            .with("device", Value::array("VirtualDevice", devices));

        DataObject::new("VirtualMachine")
            .with("name", self.name.as_str())
            .with_opt("parent", self.parent.clone().map(Value::Ref))
            .with(
                "runtime",
                DataObject::new("VirtualMachineRuntimeInfo").with("powerState", self.power_state),
            )
            .with(
                "config",
                DataObject::new("VirtualMachineConfigInfo")
                    .with("name", self.name.as_str())
                    .with("annotation", self.annotation.as_str())
                    .with("hardware", hardware),
            )
    }

    fn apply_change(&mut self, change: &PropertyChange) -> Result<()> {
        let val = change.val.as_ref();
        match (change.name.as_str(), change.op) {
            ("name", ChangeOp::Assign) => {
                self.name = val
                    .and_then(Value::as_str)
                    .ok_or_else(|| Fault::invalid_argument("name"))?
                    .to_string();
            }
            ("parent", ChangeOp::Assign) => {
                self.parent = val.and_then(Value::as_ref).cloned();
            }
            ("runtime.powerState", ChangeOp::Assign) => {
                self.power_state = val
                    .and_then(Value::as_str)
                    .ok_or_else(|| Fault::invalid_argument("powerState"))?
                    .parse()?;
            }
            ("config.annotation", ChangeOp::Assign) => {
                self.annotation = val.and_then(Value::as_str).unwrap_or_default().to_string();
            }
            ("config.hardware.numCPU", ChangeOp::Assign) => self.num_cpu = int_value(change)?,
            ("config.hardware.memoryMB", ChangeOp::Assign) => self.memory_mb = int_value(change)?,
            ("config.hardware.device", ChangeOp::Add) => {
                let device = val
                    .and_then(VirtualDevice::from_value)
                    .ok_or_else(|| Fault::invalid_argument("device"))?;
                if self.devices.iter().any(|d| d.key == device.key) {
                    return Err(Fault::AlreadyExists {
                        name: format!("device {}", device.key),
                    });
                }
                self.devices.push(device);
            }
            ("config.hardware.device", ChangeOp::Remove) => {
                let key = val
                    .and_then(|v| v.as_i64().or_else(|| VirtualDevice::from_value(v).map(|d| i64::from(d.key))))
                    .ok_or_else(|| Fault::invalid_argument("device"))?;
                self.devices.retain(|d| i64::from(d.key) != key);
            }
            _ => return Err(Fault::invalid_property(change.name.clone())),
        }
        Ok(())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
