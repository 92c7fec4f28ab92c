use core::fmt;

use uuid::Uuid;

use super::state::VmState;
use crate::materialize::{convert, Field, Materialize, Mismatch};
use crate::record::Value;

/// Snapshot of a Hyper-V virtual machine as returned by `Get-VM`.
///
/// Built only through [`crate::materialize::materialize`]; a fresh view
/// requires running another query.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VirtualMachine {
    id: Uuid,
    name: String,
    state: VmState,
    processor_count: u32,
    memory_minimum: u64,
    memory_maximum: u64,
    memory_startup: u64,
    parent_checkpoint_id: Option<Uuid>,
    parent_checkpoint_name: String,
    generation: u32,
    path: String,
    computer_name: String,
}

impl VirtualMachine {
    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn state(&self) -> VmState {
        self.state
    }

    pub fn processor_count(&self) -> u32 {
        self.processor_count
    }

    /// Minimum dynamic memory in bytes.
    pub fn memory_minimum(&self) -> u64 {
        self.memory_minimum
    }

    /// Maximum dynamic memory in bytes.
    pub fn memory_maximum(&self) -> u64 {
        self.memory_maximum
    }

    /// Startup memory in bytes.
    pub fn memory_startup(&self) -> u64 {
        self.memory_startup
    }

    /// Checkpoint the running state derives from, if any.
    pub fn parent_checkpoint_id(&self) -> Option<Uuid> {
        self.parent_checkpoint_id
    }

    pub fn parent_checkpoint_name(&self) -> &str {
        &self.parent_checkpoint_name
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    /// Configuration directory on the host.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn computer_name(&self) -> &str {
        &self.computer_name
    }
}

impl fmt::Display for VirtualMachine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.id)
    }
}

/// `State` arrives either as a name or as the numeric enum value.
fn state(value: &Value) -> Result<VmState, Mismatch> {
    match value {
        Value::String(s) => Ok(VmState::parse(s)),
        Value::Int(_) | Value::UInt(_) => convert::i64(value).map(VmState::from_code),
        _ => Err(Mismatch {
            expected: "vm state",
            found: format!("{} {}", value.kind(), value),
        }),
    }
}

impl Materialize for VirtualMachine {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "Id",
            apply: |vm, v| {
                vm.id = convert::guid(v)?;
                Ok(())
            },
        },
        Field {
            name: "Name",
            apply: |vm, v| {
                vm.name = convert::string(v)?;
                Ok(())
            },
        },
        Field {
            name: "State",
            apply: |vm, v| {
                vm.state = state(v)?;
                Ok(())
            },
        },
        Field {
            name: "ProcessorCount",
            apply: |vm, v| {
                vm.processor_count = convert::u32(v)?;
                Ok(())
            },
        },
        Field {
            name: "MemoryMinimum",
            apply: |vm, v| {
                vm.memory_minimum = convert::u64(v)?;
                Ok(())
            },
        },
        Field {
            name: "MemoryMaximum",
            apply: |vm, v| {
                vm.memory_maximum = convert::u64(v)?;
                Ok(())
            },
        },
        Field {
            name: "MemoryStartup",
            apply: |vm, v| {
                vm.memory_startup = convert::u64(v)?;
                Ok(())
            },
        },
        Field {
            name: "ParentCheckpointId",
            apply: |vm, v| {
                vm.parent_checkpoint_id = convert::optional_guid(v)?;
                Ok(())
            },
        },
        Field {
            name: "ParentCheckpointName",
            apply: |vm, v| {
                vm.parent_checkpoint_name = convert::string(v)?;
                Ok(())
            },
        },
        Field {
            name: "Generation",
            apply: |vm, v| {
                vm.generation = convert::u32(v)?;
                Ok(())
            },
        },
        Field {
            name: "Path",
            apply: |vm, v| {
                vm.path = convert::string(v)?;
                Ok(())
            },
        },
        Field {
            name: "ComputerName",
            apply: |vm, v| {
                vm.computer_name = convert::string(v)?;
                Ok(())
            },
        },
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::materialize::materialize;
    use crate::record::RawRecord;

    #[test]
    fn test_missing_name_is_empty() {
        let id = Uuid::new_v4();
        let vm: VirtualMachine = materialize(&RawRecord::new().with("Id", id.to_string())).unwrap();
        assert_eq!(vm.id(), id);
        assert_eq!(vm.name(), "");
        assert_eq!(vm.state(), VmState::Unknown);
        assert_eq!(vm.memory_startup(), 0);
        assert_eq!(vm.parent_checkpoint_id(), None);
    }

    #[test]
    fn test_non_guid_id_fails() {
        let err = materialize::<VirtualMachine>(&RawRecord::new().with("Id", "vm-one")).unwrap_err();
        assert!(matches!(
            err,
            Error::Materialization {
                field: "Id",
                expected: "guid",
                ..
            }
        ));
    }

    #[test]
    fn test_full_record() {
        let id = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let record = RawRecord::new()
            .with("Id", id)
            .with("Name", "build-agent")
            .with("State", "Saved")
            .with("ProcessorCount", 4)
            .with("MemoryMinimum", 536_870_912_u64)
            .with("MemoryMaximum", 17_179_869_184_u64)
            .with("MemoryStartup", 4_294_967_296_u64)
            .with("ParentCheckpointId", parent.to_string())
            .with("ParentCheckpointName", "before update")
            .with("Generation", 2)
            .with("Path", "C:\\ProgramData\\Microsoft\\Windows\\Hyper-V")
            .with("ComputerName", "HOST01");

        let vm: VirtualMachine = materialize(&record).unwrap();
        assert_eq!(vm.id(), id);
        assert_eq!(vm.name(), "build-agent");
        assert_eq!(vm.state(), VmState::Saved);
        assert_eq!(vm.processor_count(), 4);
        assert_eq!(vm.memory_minimum(), 536_870_912);
        assert_eq!(vm.memory_maximum(), 17_179_869_184);
        assert_eq!(vm.memory_startup(), 4_294_967_296);
        assert_eq!(vm.parent_checkpoint_id(), Some(parent));
        assert_eq!(vm.parent_checkpoint_name(), "before update");
        assert_eq!(vm.generation(), 2);
        assert_eq!(vm.computer_name(), "HOST01");
        assert_eq!(vm.to_string(), format!("build-agent ({id})"));
    }

    #[test]
    fn test_numeric_state() {
        let vm: VirtualMachine = materialize(&RawRecord::new().with("State", 9)).unwrap();
        assert_eq!(vm.state(), VmState::Paused);
    }

    #[test]
    fn test_state_of_wrong_kind_fails() {
        let err = materialize::<VirtualMachine>(&RawRecord::new().with("State", true)).unwrap_err();
        assert!(matches!(err, Error::Materialization { field: "State", .. }));
    }
}
