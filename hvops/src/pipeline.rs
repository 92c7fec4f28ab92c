//! Command pipeline construction
//!
//! A [`Pipeline`] is an ordered list of named commands with named
//! parameters, representing one round trip to the shell. Building does
//! no I/O and no validation of command or parameter names.

use uuid::Uuid;

use crate::record::RawRecord;

/// Parameter value passed to a command.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    String(String),
    Int(i64),
    UInt(u64),
    Bool(bool),
    Guid(Uuid),
    /// Back-reference to an object returned by an earlier pipeline.
    Ref(RawRecord),
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<&String> for ParamValue {
    fn from(s: &String) -> Self {
        ParamValue::String(s.clone())
    }
}

impl From<i64> for ParamValue {
    fn from(i: i64) -> Self {
        ParamValue::Int(i)
    }
}

impl From<u64> for ParamValue {
    fn from(u: u64) -> Self {
        ParamValue::UInt(u)
    }
}

impl From<u32> for ParamValue {
    fn from(u: u32) -> Self {
        ParamValue::UInt(u64::from(u))
    }
}

impl From<bool> for ParamValue {
    fn from(b: bool) -> Self {
        ParamValue::Bool(b)
    }
}

impl From<Uuid> for ParamValue {
    fn from(g: Uuid) -> Self {
        ParamValue::Guid(g)
    }
}

impl From<RawRecord> for ParamValue {
    fn from(r: RawRecord) -> Self {
        ParamValue::Ref(r)
    }
}

/// How the commands of a pipeline relate to each other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PipeMode {
    /// Each command runs as its own statement.
    #[default]
    None,
    /// The output of each command is piped into the next.
    PipeOutput,
}

/// One named command and its ordered parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    name: String,
    parameters: Vec<(String, ParamValue)>,
}

impl Command {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parameters(&self) -> &[(String, ParamValue)] {
        &self.parameters
    }

    /// Value of the first parameter with the given name.
    pub fn parameter(&self, name: &str) -> Option<&ParamValue> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }
}

/// A frozen, immutable pipeline.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Pipeline {
    commands: Vec<Command>,
}

impl Pipeline {
    pub fn builder() -> PipelineBuilder {
        PipelineBuilder::new()
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Command names in order, e.g. `["Get-VM", "Start-VM"]`.
    pub fn command_names(&self) -> Vec<&str> {
        self.commands.iter().map(Command::name).collect()
    }
}

/// Accumulates commands and parameters until [`PipelineBuilder::build`].
#[derive(Debug, Default)]
pub struct PipelineBuilder {
    commands: Vec<Command>,
}

impl PipelineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a command.
    pub fn command(mut self, name: impl Into<String>) -> Self {
        self.commands.push(Command {
            name: name.into(),
            parameters: Vec::new(),
        });
        self
    }

    /// Append a parameter to the most recently added command.
    pub fn param(mut self, name: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        let name = name.into();
        match self.commands.last_mut() {
            Some(command) => command.parameters.push((name, value.into())),
            None => tracing::debug!(parameter = %name, "parameter added before any command, ignored"),
        }
        self
    }

    /// Append a parameter only when `value` is `Some`.
    pub fn param_opt<V: Into<ParamValue>>(self, name: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(value) => self.param(name, value),
            None => self,
        }
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            commands: self.commands,
        }
    }
}

/// Command, parameter and member names of the Hyper-V PowerShell module.
pub mod commands {
    pub const GET_VM: &str = "Get-VM";
    pub const START_VM: &str = "Start-VM";
    pub const STOP_VM: &str = "Stop-VM";
    pub const SUSPEND_VM: &str = "Suspend-VM";
    pub const RESUME_VM: &str = "Resume-VM";
    pub const RESTART_VM: &str = "Restart-VM";
    pub const REMOVE_VM: &str = "Remove-VM";
    pub const NEW_VM: &str = "New-VM";
    pub const SET_VM: &str = "Set-VM";
    pub const SET_VM_FIRMWARE: &str = "Set-VMFirmware";
    pub const GET_VM_HOST: &str = "Get-VMHost";
    pub const GET_VM_SNAPSHOT: &str = "Get-VMSnapshot";
    pub const CHECKPOINT_VM: &str = "Checkpoint-VM";
    pub const RESTORE_VM_SNAPSHOT: &str = "Restore-VMSnapshot";
    pub const REMOVE_VM_SNAPSHOT: &str = "Remove-VMSnapshot";
    pub const GET_VHD: &str = "Get-VHD";

    /// Parameter names.
    pub mod params {
        pub const ID: &str = "Id";
        pub const NAME: &str = "Name";
        pub const PATH: &str = "Path";
        pub const PASS_THRU: &str = "PassThru";
        pub const SAVE: &str = "Save";
        pub const TURN_OFF: &str = "TurnOff";
        pub const FORCE: &str = "Force";
        pub const CONFIRM: &str = "Confirm";
        pub const VM: &str = "VM";
        pub const GENERATION: &str = "Generation";
        pub const VHD_PATH: &str = "VHDPath";
        pub const SWITCH_NAME: &str = "SwitchName";
        pub const PROCESSOR_COUNT: &str = "ProcessorCount";
        pub const MEMORY_STARTUP_BYTES: &str = "MemoryStartupBytes";
        pub const ENHANCED_SESSION_TRANSPORT_TYPE: &str = "EnhancedSessionTransportType";
        pub const ENABLE_SECURE_BOOT: &str = "EnableSecureBoot";
    }

    /// Member names read from returned objects outside the field tables.
    pub mod members {
        pub const ID: &str = "Id";
        pub const IS_DELETED: &str = "IsDeleted";
        pub const SIZE: &str = "Size";
    }

    pub const DEFAULT_SWITCH_NAME: &str = "Default Switch";
}
