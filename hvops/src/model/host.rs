use crate::materialize::{convert, Field, Materialize};

/// Host-wide Hyper-V settings (`Get-VMHost`). Re-fetched on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VirtualMachineHost {
    computer_name: String,
    virtual_machine_path: String,
    virtual_hard_disk_path: String,
    logical_processor_count: u32,
    memory_capacity: u64,
}

impl VirtualMachineHost {
    pub fn computer_name(&self) -> &str {
        &self.computer_name
    }

    /// Default folder for virtual machine configuration files.
    pub fn virtual_machine_path(&self) -> &str {
        &self.virtual_machine_path
    }

    /// Default folder for virtual hard disks.
    pub fn virtual_hard_disk_path(&self) -> &str {
        &self.virtual_hard_disk_path
    }

    pub fn logical_processor_count(&self) -> u32 {
        self.logical_processor_count
    }

    /// Physical memory of the host in bytes.
    pub fn memory_capacity(&self) -> u64 {
        self.memory_capacity
    }
}

impl Materialize for VirtualMachineHost {
    const FIELDS: &'static [Field<Self>] = &[
        Field {
            name: "ComputerName",
            apply: |h, v| {
                h.computer_name = convert::string(v)?;
                Ok(())
            },
        },
        Field {
            name: "VirtualMachinePath",
            apply: |h, v| {
                h.virtual_machine_path = convert::string(v)?;
                Ok(())
            },
        },
        Field {
            name: "VirtualHardDiskPath",
            apply: |h, v| {
                h.virtual_hard_disk_path = convert::string(v)?;
                Ok(())
            },
        },
        Field {
            name: "LogicalProcessorCount",
            apply: |h, v| {
                h.logical_processor_count = convert::u32(v)?;
                Ok(())
            },
        },
        Field {
            name: "MemoryCapacity",
            apply: |h, v| {
                h.memory_capacity = convert::u64(v)?;
                Ok(())
            },
        },
    ];
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::materialize::materialize;
    use crate::record::RawRecord;

    #[test]
    fn test_host_from_record() {
        let record = RawRecord::new()
            .with("ComputerName", "HOST01")
            .with("VirtualMachinePath", "D:\\VMs")
            .with("VirtualHardDiskPath", "D:\\VHDs")
            .with("LogicalProcessorCount", 16)
            .with("MemoryCapacity", "68719476736");
        let host: VirtualMachineHost = materialize(&record).unwrap();
        assert_eq!(host.computer_name(), "HOST01");
        assert_eq!(host.virtual_machine_path(), "D:\\VMs");
        assert_eq!(host.virtual_hard_disk_path(), "D:\\VHDs");
        assert_eq!(host.logical_processor_count(), 16);
        assert_eq!(host.memory_capacity(), 68_719_476_736);
    }
}
