//! # hvops
//!
//! Concurrency-safe Hyper-V virtual machine and checkpoint operations.
//!
//! Operations are expressed as command pipelines (`Get-VM -Id ... | Start-VM
//! -PassThru`) run by a [`PipelineExecutor`], and the loosely typed objects
//! they return are materialized into [`VirtualMachine`], [`Checkpoint`] and
//! [`VirtualMachineHost`] snapshots.
//!
//! ## Guarantees
//!
//! - Every operation first ensures the management service (`vmms`) is
//!   running, starting or resuming it within a bounded wait.
//! - Operations on the same virtual machine never overlap and run in
//!   arrival order; operations on different machines run concurrently.
//! - Each public operation returns a definite result or exactly one
//!   [`Error`] kind.
//!
//! ## Example
//!
//! ```no_run
//! use hvops::{HyperVManager, ManagerConfig, StopKind};
//!
//! fn main() -> hvops::Result<()> {
//!     let manager = HyperVManager::from_config(&ManagerConfig::default());
//!
//!     for vm in manager.get_all_virtual_machines()? {
//!         println!("{}: {}", vm, vm.state());
//!         if vm.state().is_running() {
//!             manager.stop_virtual_machine(vm.id(), StopKind::Save)?;
//!         }
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Requirements
//!
//! - Windows with the Hyper-V PowerShell module installed
//! - Administrator privileges

pub mod config;
pub mod error;
pub mod executor;
pub mod manager;
pub mod materialize;
pub mod model;
pub mod pipeline;
pub mod powershell;
pub mod record;
pub mod serializer;
pub mod service;

pub use config::{ManagerConfig, ServiceSettings};
pub use error::{ConfigError, Error, ExecutorError, Result, ServiceError, E_UNEXPECTED};
pub use executor::{ExecutionResult, PipelineExecutor};
pub use manager::HyperVManager;
pub use model::{
    Checkpoint, CreationParameters, EnhancedSessionTransport, StopKind, VirtualMachine,
    VirtualMachineHost, VmState,
};
pub use pipeline::{Command, ParamValue, PipeMode, Pipeline, PipelineBuilder};
pub use powershell::PowerShellExecutor;
pub use record::{RawRecord, Value};
pub use serializer::{OperationGuard, OperationSerializer};
pub use service::{PowerShellServiceController, ServiceController, ServiceGate, ServiceStatus};
