mod checkpoint;
mod creation;
mod host;
mod machine;
mod state;

pub use checkpoint::Checkpoint;
pub use creation::{CreationParameters, EnhancedSessionTransport};
pub use host::VirtualMachineHost;
pub use machine::VirtualMachine;
pub use state::{StopKind, VmState};
