use core::fmt;

use serde::{Deserialize, Serialize};

/// Virtual machine state as reported by `Get-VM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum VmState {
    Other,
    Running,
    Off,
    Stopping,
    Saved,
    Paused,
    Starting,
    Reset,
    Saving,
    Pausing,
    Resuming,
    /// Anything the shell reports that is not listed above.
    #[default]
    Unknown,
}

/// Every state `Get-VM` reports, by name and by `VMState` code.
const STATES: &[(&str, i64, VmState)] = &[
    ("Other", 1, VmState::Other),
    ("Running", 2, VmState::Running),
    ("Off", 3, VmState::Off),
    ("Stopping", 4, VmState::Stopping),
    ("Saved", 6, VmState::Saved),
    ("Paused", 9, VmState::Paused),
    ("Starting", 10, VmState::Starting),
    ("Reset", 11, VmState::Reset),
    ("Saving", 32773, VmState::Saving),
    ("Pausing", 32776, VmState::Pausing),
    ("Resuming", 32777, VmState::Resuming),
    ("FastSaved", 32779, VmState::Saved),
    ("FastSaving", 32780, VmState::Saving),
    ("ForceShutdown", 32781, VmState::Other),
    ("ForceReboot", 32782, VmState::Other),
    ("Hibernated", 32783, VmState::Other),
    ("ComponentServicing", 32784, VmState::Other),
    ("RunningCritical", 32785, VmState::Other),
    ("OffCritical", 32786, VmState::Other),
    ("StoppingCritical", 32787, VmState::Other),
    ("SavedCritical", 32788, VmState::Other),
    ("PausedCritical", 32789, VmState::Other),
    ("StartingCritical", 32790, VmState::Other),
    ("ResetCritical", 32791, VmState::Other),
    ("SavingCritical", 32792, VmState::Other),
    ("PausingCritical", 32793, VmState::Other),
    ("ResumingCritical", 32794, VmState::Other),
    ("FastSavedCritical", 32795, VmState::Other),
    ("FastSavingCritical", 32796, VmState::Other),
];

impl VmState {
    /// Parse from the shell's state name (case-insensitive).
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        STATES
            .iter()
            .find(|(name, _, _)| name.eq_ignore_ascii_case(s))
            .map_or(VmState::Unknown, |&(_, _, state)| state)
    }

    /// Parse from the numeric `VMState` value emitted when enums are
    /// serialized as numbers.
    pub fn from_code(code: i64) -> Self {
        STATES
            .iter()
            .find(|(_, c, _)| *c == code)
            .map_or(VmState::Unknown, |&(_, _, state)| state)
    }

    pub fn is_running(&self) -> bool {
        matches!(self, VmState::Running)
    }

    pub fn is_off(&self) -> bool {
        matches!(self, VmState::Off)
    }

    /// Returns true if the VM is in a transitional state
    pub fn is_transitioning(&self) -> bool {
        matches!(
            self,
            VmState::Starting
                | VmState::Stopping
                | VmState::Saving
                | VmState::Pausing
                | VmState::Resuming
                | VmState::Reset
        )
    }
}

impl fmt::Display for VmState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            VmState::Other => "Other",
            VmState::Running => "Running",
            VmState::Off => "Off",
            VmState::Stopping => "Stopping",
            VmState::Saved => "Saved",
            VmState::Paused => "Paused",
            VmState::Starting => "Starting",
            VmState::Reset => "Reset",
            VmState::Saving => "Saving",
            VmState::Pausing => "Pausing",
            VmState::Resuming => "Resuming",
            VmState::Unknown => "Unknown",
        };
        write!(f, "{}", s)
    }
}

/// How `Stop-VM` brings a machine down.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StopKind {
    /// Graceful guest shutdown.
    #[default]
    Default,
    /// Save the machine state to disk.
    Save,
    /// Cut power immediately.
    #[serde(alias = "turn-off", alias = "turn_off")]
    TurnOff,
}

impl StopKind {
    /// State the machine must report once the stop has completed.
    pub fn target_state(&self) -> VmState {
        match self {
            StopKind::Default | StopKind::TurnOff => VmState::Off,
            StopKind::Save => VmState::Saved,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StopKind::Default => "default",
            StopKind::Save => "save",
            StopKind::TurnOff => "turnoff",
        }
    }
}

impl fmt::Display for StopKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
