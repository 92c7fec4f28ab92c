//! Hyper-V resource operation manager
//!
//! Every operation checks that the management service is running, then
//! (for anything touching a specific virtual machine) takes that machine's
//! slot in the [`OperationSerializer`] for the duration of its pipelines.
//! Slots are released on every exit path.
//!
//! Boolean results mean "the pipeline ran and the machine reached the
//! expected state". A pipeline that could not run, or that reported error
//! text, is an [`Error`] instead.

use std::sync::Arc;

use uuid::Uuid;

use crate::config::ManagerConfig;
use crate::error::{Error, Result, E_UNEXPECTED};
use crate::executor::{ExecutionResult, PipelineExecutor};
use crate::materialize::{convert, materialize, materialize_all};
use crate::model::{
    Checkpoint, CreationParameters, StopKind, VirtualMachine, VirtualMachineHost, VmState,
};
use crate::pipeline::commands::{self, members, params};
use crate::pipeline::{PipeMode, Pipeline};
use crate::powershell::PowerShellExecutor;
use crate::serializer::OperationSerializer;
use crate::service::{PowerShellServiceController, ServiceGate};

/// Entry point for all virtual machine and checkpoint operations.
///
/// `HyperVManager` is `Send + Sync`; share one instance (e.g. in an `Arc`)
/// between all threads so that per-machine serialization holds.
pub struct HyperVManager {
    executor: Arc<dyn PipelineExecutor>,
    gate: ServiceGate,
    operations: OperationSerializer,
}

impl std::fmt::Debug for HyperVManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HyperVManager")
            .field("gate", &self.gate)
            .field("operations", &self.operations)
            .finish_non_exhaustive()
    }
}

impl HyperVManager {
    pub fn new(executor: Arc<dyn PipelineExecutor>, gate: ServiceGate) -> Self {
        Self {
            executor,
            gate,
            operations: OperationSerializer::new(),
        }
    }

    /// Build a manager that drives the local host through PowerShell.
    pub fn from_config(config: &ManagerConfig) -> Self {
        let executor = Arc::new(PowerShellExecutor::new(&config.shell));
        let controller = Arc::new(
            PowerShellServiceController::new(&config.shell, &config.service.name)
                .with_poll_interval(config.service.poll_interval()),
        );
        let gate = ServiceGate::new(
            controller,
            config.service.name.clone(),
            config.service.transition_timeout(),
        );
        Self::new(executor, gate)
    }

    /// Per-machine serializer, exposed for inspection.
    pub fn operations(&self) -> &OperationSerializer {
        &self.operations
    }

    // =========================================================================
    // Queries
    // =========================================================================

    /// List every virtual machine on the host.
    ///
    /// Error text from the shell is logged, not raised: it may concern only
    /// some of the machines. Records that fail to materialize are skipped.
    pub fn get_all_virtual_machines(&self) -> Result<Vec<VirtualMachine>> {
        self.gate.ensure_running()?;

        let pipeline = Pipeline::builder().command(commands::GET_VM).build();
        let result = self.run("get all virtual machines", None, &pipeline, PipeMode::None)?;
        if result.has_error() {
            tracing::warn!(error = %result.error_message, "errors while listing virtual machines");
        }

        Ok(materialize_all(&result.records))
    }

    /// Fetch one virtual machine.
    pub fn get_virtual_machine(&self, vm_id: Uuid) -> Result<VirtualMachine> {
        const OPERATION: &str = "get virtual machine";
        self.gate.ensure_running()?;
        let _guard = self.operations.acquire(vm_id);

        let result = self.run_checked(OPERATION, Some(vm_id), &get_vm(vm_id), PipeMode::None)?;
        match result.first() {
            Some(record) => materialize(record),
            None => Err(Error::NotFound {
                resource_id: vm_id,
                code: E_UNEXPECTED,
            }),
        }
    }

    /// Checkpoints of one virtual machine, in the order the shell lists them.
    pub fn get_checkpoints(&self, vm_id: Uuid) -> Result<Vec<Checkpoint>> {
        self.gate.ensure_running()?;
        let _guard = self.operations.acquire(vm_id);

        let pipeline = Pipeline::builder()
            .command(commands::GET_VM)
            .param(params::ID, vm_id)
            .command(commands::GET_VM_SNAPSHOT)
            .build();
        let result = self.run("get checkpoints", Some(vm_id), &pipeline, PipeMode::PipeOutput)?;
        if result.has_error() {
            tracing::warn!(vm_id = %vm_id, error = %result.error_message, "errors while listing checkpoints");
        }

        Ok(materialize_all(&result.records))
    }

    /// Describe the local Hyper-V host.
    pub fn get_host(&self) -> Result<VirtualMachineHost> {
        const OPERATION: &str = "get host";
        self.gate.ensure_running()?;

        let pipeline = Pipeline::builder().command(commands::GET_VM_HOST).build();
        let result = self.run_checked(OPERATION, None, &pipeline, PipeMode::None)?;
        match result.first() {
            Some(record) => materialize(record),
            None => Err(Error::operation_failed(
                OPERATION,
                None,
                "no host object returned",
                E_UNEXPECTED,
            )),
        }
    }

    /// Size in bytes of the virtual disk at `path`; `0` if the disk could
    /// not be read.
    pub fn get_vhd_size(&self, path: &str) -> Result<u64> {
        self.gate.ensure_running()?;

        let pipeline = Pipeline::builder()
            .command(commands::GET_VHD)
            .param(params::PATH, path)
            .build();
        let result = self.run("get vhd size", None, &pipeline, PipeMode::PipeOutput)?;
        if result.has_error() {
            tracing::error!(path, error = %result.error_message, "unable to get disk size");
        }

        let Some(size) = result.first().and_then(|r| r.get(members::SIZE)) else {
            return Ok(0);
        };
        convert::u64(size).map_err(|m| Error::Materialization {
            field: members::SIZE,
            expected: m.expected,
            found: m.found,
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Start a machine. Succeeds when it reports `Running`.
    pub fn start_virtual_machine(&self, vm_id: Uuid) -> Result<bool> {
        let pipeline = Pipeline::builder()
            .command(commands::GET_VM)
            .param(params::ID, vm_id)
            .command(commands::START_VM)
            .param(params::PASS_THRU, true)
            .build();
        self.change_state("start virtual machine", vm_id, &pipeline, VmState::Running)
    }

    /// Stop a machine. Succeeds when it reports [`StopKind::target_state`].
    pub fn stop_virtual_machine(&self, vm_id: Uuid, kind: StopKind) -> Result<bool> {
        let mut builder = Pipeline::builder()
            .command(commands::GET_VM)
            .param(params::ID, vm_id)
            .command(commands::STOP_VM)
            .param(params::PASS_THRU, true);
        builder = match kind {
            StopKind::Default => builder,
            StopKind::Save => builder.param(params::SAVE, true),
            StopKind::TurnOff => builder.param(params::TURN_OFF, true),
        };
        self.change_state(
            "stop virtual machine",
            vm_id,
            &builder.build(),
            kind.target_state(),
        )
    }

    /// Pause a machine. Succeeds when it reports `Paused`.
    pub fn pause_virtual_machine(&self, vm_id: Uuid) -> Result<bool> {
        let pipeline = Pipeline::builder()
            .command(commands::GET_VM)
            .param(params::ID, vm_id)
            .command(commands::SUSPEND_VM)
            .param(params::PASS_THRU, true)
            .build();
        self.change_state("pause virtual machine", vm_id, &pipeline, VmState::Paused)
    }

    /// Resume a paused machine. Succeeds when it reports `Running`.
    pub fn resume_virtual_machine(&self, vm_id: Uuid) -> Result<bool> {
        let pipeline = Pipeline::builder()
            .command(commands::GET_VM)
            .param(params::ID, vm_id)
            .command(commands::RESUME_VM)
            .param(params::PASS_THRU, true)
            .build();
        self.change_state("resume virtual machine", vm_id, &pipeline, VmState::Running)
    }

    /// Force a restart. Succeeds when the machine reports `Running` again.
    pub fn restart_virtual_machine(&self, vm_id: Uuid) -> Result<bool> {
        let pipeline = Pipeline::builder()
            .command(commands::GET_VM)
            .param(params::ID, vm_id)
            .command(commands::RESTART_VM)
            .param(params::FORCE, true)
            .param(params::PASS_THRU, true)
            .build();
        self.change_state("restart virtual machine", vm_id, &pipeline, VmState::Running)
    }

    /// Delete a machine.
    ///
    /// `IsDeleted` on the returned object is not always updated by the time
    /// `Remove-VM` returns, so when it is not set the machine is looked up
    /// again and counts as deleted if nothing comes back.
    pub fn remove_virtual_machine(&self, vm_id: Uuid) -> Result<bool> {
        const OPERATION: &str = "remove virtual machine";
        self.gate.ensure_running()?;
        let _guard = self.operations.acquire(vm_id);

        let pipeline = Pipeline::builder()
            .command(commands::GET_VM)
            .param(params::ID, vm_id)
            .command(commands::REMOVE_VM)
            .param(params::FORCE, true)
            .param(params::PASS_THRU, true)
            .build();
        let result = self.run_checked(OPERATION, Some(vm_id), &pipeline, PipeMode::PipeOutput)?;

        let flagged = result
            .first()
            .and_then(|r| r.get(members::IS_DELETED))
            .is_some_and(|v| convert::bool(v).unwrap_or(false));
        if flagged {
            return Ok(true);
        }

        let requery = self.run(OPERATION, Some(vm_id), &get_vm(vm_id), PipeMode::None)?;
        tracing::info!(
            vm_id = %vm_id,
            message = %requery.error_message,
            "checked for removed virtual machine"
        );
        Ok(requery.records.is_empty())
    }

    /// Create a machine from an existing disk, then apply the remaining
    /// settings on a best-effort basis.
    pub fn create_virtual_machine(&self, parameters: &CreationParameters) -> Result<VirtualMachine> {
        const OPERATION: &str = "create virtual machine";
        self.gate.ensure_running()?;

        let pipeline = Pipeline::builder()
            .command(commands::NEW_VM)
            .param(params::NAME, &parameters.name)
            .param(params::GENERATION, parameters.generation)
            .param(params::VHD_PATH, &parameters.vhd_path)
            .param(params::SWITCH_NAME, &parameters.switch_name)
            .build();
        let result = self.run_checked(OPERATION, None, &pipeline, PipeMode::None)?;
        let Some(record) = result.records.into_iter().next() else {
            return Err(Error::operation_failed(
                OPERATION,
                None,
                "no virtual machine object returned",
                E_UNEXPECTED,
            ));
        };
        let vm: VirtualMachine = materialize(&record)?;
        tracing::info!(vm_id = %vm.id(), name = %vm.name(), "created virtual machine");

        let _guard = self.operations.acquire(vm.id());

        let startup = parameters.memory_startup_bytes;
        let set_memory = vm.memory_minimum() < startup && startup < vm.memory_maximum();
        let mut builder = Pipeline::builder()
            .command(commands::SET_VM)
            .param(params::VM, record.clone())
            .param(params::PROCESSOR_COUNT, parameters.processor_count)
            .param(
                params::ENHANCED_SESSION_TRANSPORT_TYPE,
                parameters.enhanced_session_transport.to_string(),
            )
            .param_opt(params::MEMORY_STARTUP_BYTES, set_memory.then_some(startup));
        if parameters.generation == 2 {
            builder = builder
                .command(commands::SET_VM_FIRMWARE)
                .param(params::VM, record)
                .param(
                    params::ENABLE_SECURE_BOOT,
                    if parameters.secure_boot { "On" } else { "Off" },
                );
        }

        match self.executor.execute(&builder.build(), PipeMode::None) {
            Ok(result) if result.has_error() => tracing::error!(
                vm_id = %vm.id(),
                processor_count = parameters.processor_count,
                memory_startup_bytes = startup,
                error = %result.error_message,
                "unable to apply virtual machine settings"
            ),
            Ok(_) => {}
            Err(e) => tracing::error!(
                vm_id = %vm.id(),
                error = %e,
                "unable to apply virtual machine settings"
            ),
        }

        Ok(vm)
    }

    // =========================================================================
    // Checkpoints
    // =========================================================================

    /// Take a checkpoint. Succeeds when the new checkpoint has an id.
    pub fn create_checkpoint(&self, vm_id: Uuid) -> Result<bool> {
        const OPERATION: &str = "create checkpoint";
        self.gate.ensure_running()?;
        let _guard = self.operations.acquire(vm_id);

        let pipeline = Pipeline::builder()
            .command(commands::GET_VM)
            .param(params::ID, vm_id)
            .command(commands::CHECKPOINT_VM)
            .param(params::PASS_THRU, true)
            .build();
        let result = self.run_checked(OPERATION, Some(vm_id), &pipeline, PipeMode::PipeOutput)?;

        let Some(record) = result.first() else {
            tracing::warn!(vm_id = %vm_id, "no checkpoint returned");
            return Ok(false);
        };
        let checkpoint: Checkpoint = materialize(record)?;
        tracing::info!(vm_id = %vm_id, checkpoint_id = %checkpoint.id(), "created checkpoint");
        Ok(!checkpoint.id().is_nil())
    }

    /// Restore a checkpoint. Succeeds when the machine's parent checkpoint
    /// is `checkpoint_id` afterwards.
    pub fn apply_checkpoint(&self, vm_id: Uuid, checkpoint_id: Uuid) -> Result<bool> {
        const OPERATION: &str = "apply checkpoint";
        self.gate.ensure_running()?;
        let _guard = self.operations.acquire(vm_id);

        let pipeline = Pipeline::builder()
            .command(commands::GET_VM_SNAPSHOT)
            .param(params::ID, checkpoint_id)
            .command(commands::RESTORE_VM_SNAPSHOT)
            .param(params::CONFIRM, false)
            .build();
        self.run_checked(OPERATION, Some(vm_id), &pipeline, PipeMode::PipeOutput)?;

        let result = self.run(OPERATION, Some(vm_id), &get_vm(vm_id), PipeMode::None)?;
        let Some(record) = result.first() else {
            tracing::error!(
                vm_id = %vm_id,
                error = %result.error_message,
                "unable to read virtual machine after applying checkpoint"
            );
            return Ok(false);
        };
        let vm: VirtualMachine = materialize(record)?;
        Ok(vm.parent_checkpoint_id() == Some(checkpoint_id))
    }

    /// Delete a checkpoint. Succeeds when it no longer shows up in the
    /// machine's checkpoint list.
    pub fn remove_checkpoint(&self, vm_id: Uuid, checkpoint_id: Uuid) -> Result<bool> {
        const OPERATION: &str = "remove checkpoint";
        self.gate.ensure_running()?;
        let _guard = self.operations.acquire(vm_id);

        let pipeline = Pipeline::builder()
            .command(commands::GET_VM_SNAPSHOT)
            .param(params::ID, checkpoint_id)
            .command(commands::REMOVE_VM_SNAPSHOT)
            .param(params::CONFIRM, false)
            .build();
        self.run_checked(OPERATION, Some(vm_id), &pipeline, PipeMode::PipeOutput)?;

        let listing = Pipeline::builder()
            .command(commands::GET_VM)
            .param(params::ID, vm_id)
            .command(commands::GET_VM_SNAPSHOT)
            .build();
        let result = self.run(OPERATION, Some(vm_id), &listing, PipeMode::PipeOutput)?;
        if result.has_error() {
            tracing::warn!(vm_id = %vm_id, error = %result.error_message, "errors while listing checkpoints");
        }

        let still_present = result
            .records
            .iter()
            .filter_map(|r| r.get(members::ID))
            .filter_map(|v| convert::guid(v).ok())
            .any(|id| id == checkpoint_id);
        Ok(!still_present)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Run a `Get-VM | <verb> -PassThru` pipeline under the machine's slot
    /// and compare the returned state with `target`.
    fn change_state(
        &self,
        operation: &'static str,
        vm_id: Uuid,
        pipeline: &Pipeline,
        target: VmState,
    ) -> Result<bool> {
        self.gate.ensure_running()?;
        let _guard = self.operations.acquire(vm_id);

        let result = self.run_checked(operation, Some(vm_id), pipeline, PipeMode::PipeOutput)?;
        let Some(record) = result.first() else {
            tracing::warn!(vm_id = %vm_id, operation, "no virtual machine returned");
            return Ok(false);
        };

        let vm: VirtualMachine = materialize(record)?;
        let reached = vm.state() == target;
        if reached {
            tracing::info!(vm_id = %vm_id, operation, state = %vm.state(), "operation completed");
        } else {
            tracing::warn!(
                vm_id = %vm_id,
                operation,
                state = %vm.state(),
                expected = %target,
                "virtual machine did not reach expected state"
            );
        }
        Ok(reached)
    }

    /// Execute a pipeline; only invocation failures are errors.
    fn run(
        &self,
        operation: &'static str,
        resource_id: Option<Uuid>,
        pipeline: &Pipeline,
        mode: PipeMode,
    ) -> Result<ExecutionResult> {
        tracing::debug!(operation, commands = ?pipeline.command_names(), "running pipeline");
        self.executor.execute(pipeline, mode).map_err(|e| {
            tracing::error!(operation, error = %e, "pipeline could not be executed");
            Error::operation_failed(operation, resource_id, e.to_string(), E_UNEXPECTED)
        })
    }

    /// Execute a pipeline; error text from the shell is an error too.
    fn run_checked(
        &self,
        operation: &'static str,
        resource_id: Option<Uuid>,
        pipeline: &Pipeline,
        mode: PipeMode,
    ) -> Result<ExecutionResult> {
        let result = self.run(operation, resource_id, pipeline, mode)?;
        if result.has_error() {
            return Err(Error::operation_failed(
                operation,
                resource_id,
                result.error_message,
                result.error_code,
            ));
        }
        Ok(result)
    }
}

fn get_vm(vm_id: Uuid) -> Pipeline {
    Pipeline::builder()
        .command(commands::GET_VM)
        .param(params::ID, vm_id)
        .build()
}
