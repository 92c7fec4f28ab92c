//! Data Transfer Objects for API requests and responses

use hvops::{Checkpoint, StopKind, VirtualMachine, VirtualMachineHost};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use hvops::CreationParameters as CreateVmRequest;

#[derive(Debug, Serialize, Deserialize)]
pub struct VmDto {
    pub id: Uuid,
    pub name: String,
    pub state: String,
    pub processor_count: u32,
    pub memory_startup_bytes: u64,
    pub memory_minimum_bytes: u64,
    pub memory_maximum_bytes: u64,
    pub generation: u32,
    pub parent_checkpoint_id: Option<Uuid>,
    pub parent_checkpoint_name: String,
    pub path: String,
    pub computer_name: String,
}

impl From<&VirtualMachine> for VmDto {
    fn from(vm: &VirtualMachine) -> Self {
        Self {
            id: vm.id(),
            name: vm.name().to_string(),
            state: vm.state().to_string(),
            processor_count: vm.processor_count(),
            memory_startup_bytes: vm.memory_startup(),
            memory_minimum_bytes: vm.memory_minimum(),
            memory_maximum_bytes: vm.memory_maximum(),
            generation: vm.generation(),
            parent_checkpoint_id: vm.parent_checkpoint_id(),
            parent_checkpoint_name: vm.parent_checkpoint_name().to_string(),
            path: vm.path().to_string(),
            computer_name: vm.computer_name().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CheckpointDto {
    pub id: Uuid,
    pub name: String,
    pub parent_checkpoint_id: Option<Uuid>,
    pub parent_checkpoint_name: String,
}

impl From<&Checkpoint> for CheckpointDto {
    fn from(cp: &Checkpoint) -> Self {
        Self {
            id: cp.id(),
            name: cp.name().to_string(),
            parent_checkpoint_id: cp.parent_checkpoint_id(),
            parent_checkpoint_name: cp.parent_checkpoint_name().to_string(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HostInfoDto {
    pub computer_name: String,
    pub logical_processor_count: u32,
    pub memory_capacity_bytes: u64,
    pub vm_path: String,
    pub vhd_path: String,
}

impl From<&VirtualMachineHost> for HostInfoDto {
    fn from(host: &VirtualMachineHost) -> Self {
        Self {
            computer_name: host.computer_name().to_string(),
            logical_processor_count: host.logical_processor_count(),
            memory_capacity_bytes: host.memory_capacity(),
            vm_path: host.virtual_machine_path().to_string(),
            vhd_path: host.virtual_hard_disk_path().to_string(),
        }
    }
}

/// Outcome of a state-changing operation.
///
/// `completed` is false when the operation ran but the machine did not
/// reach the expected state.
#[derive(Debug, Serialize, Deserialize)]
pub struct OperationDto {
    pub id: Uuid,
    pub operation: String,
    pub completed: bool,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StopQuery {
    #[serde(default)]
    pub kind: StopKind,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VhdPathQuery {
    pub path: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VhdSizeDto {
    pub path: String,
    pub size_bytes: u64,
}
