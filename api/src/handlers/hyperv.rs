//! Hyper-V API handlers
//!
//! Manager calls block on the shell, so each one runs on the blocking pool.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use hvops::HyperVManager;
use uuid::Uuid;

use crate::dto::*;
use crate::response::{api_error, manager_error, ApiError, ApiResponse, ApiResult};
use crate::SharedState;

/// Run `f` against the manager on the blocking pool.
async fn with_manager<T, F>(state: &SharedState, f: F) -> Result<T, ApiError>
where
    F: FnOnce(&HyperVManager) -> hvops::Result<T> + Send + 'static,
    T: Send + 'static,
{
    let manager = Arc::clone(&state.manager);
    tokio::task::spawn_blocking(move || f(&manager))
        .await
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))?
        .map_err(manager_error)
}

fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw)
        .map_err(|_| api_error(StatusCode::BAD_REQUEST, &format!("Invalid id '{}'", raw)))
}

fn operation(id: Uuid, operation: &str, completed: bool) -> Json<ApiResponse<OperationDto>> {
    Json(ApiResponse::success(OperationDto {
        id,
        operation: operation.to_string(),
        completed,
    }))
}

// =============================================================================
// Host
// =============================================================================

pub async fn hyperv_host_info(State(state): State<SharedState>) -> ApiResult<HostInfoDto> {
    let host = with_manager(&state, |m| m.get_host()).await?;
    Ok(Json(ApiResponse::success(HostInfoDto::from(&host))))
}

pub async fn hyperv_vhd_size(
    State(state): State<SharedState>,
    Query(query): Query<VhdPathQuery>,
) -> ApiResult<VhdSizeDto> {
    let path = query.path.clone();
    let size_bytes = with_manager(&state, move |m| m.get_vhd_size(&path)).await?;
    Ok(Json(ApiResponse::success(VhdSizeDto {
        path: query.path,
        size_bytes,
    })))
}

// =============================================================================
// Virtual machines
// =============================================================================

pub async fn hyperv_list_vms(State(state): State<SharedState>) -> ApiResult<Vec<VmDto>> {
    let vms = with_manager(&state, |m| m.get_all_virtual_machines()).await?;
    Ok(Json(ApiResponse::success(
        vms.iter().map(VmDto::from).collect(),
    )))
}

pub async fn hyperv_get_vm(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<VmDto> {
    let id = parse_id(&id)?;
    let vm = with_manager(&state, move |m| m.get_virtual_machine(id)).await?;
    Ok(Json(ApiResponse::success(VmDto::from(&vm))))
}

pub async fn hyperv_create_vm(
    State(state): State<SharedState>,
    Json(req): Json<CreateVmRequest>,
) -> ApiResult<VmDto> {
    let vm = with_manager(&state, move |m| m.create_virtual_machine(&req)).await?;
    Ok(Json(ApiResponse::success(VmDto::from(&vm))))
}

pub async fn hyperv_delete_vm(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<OperationDto> {
    let id = parse_id(&id)?;
    let removed = with_manager(&state, move |m| m.remove_virtual_machine(id)).await?;
    Ok(operation(id, "remove", removed))
}

pub async fn hyperv_start_vm(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<OperationDto> {
    let id = parse_id(&id)?;
    let started = with_manager(&state, move |m| m.start_virtual_machine(id)).await?;
    Ok(operation(id, "start", started))
}

pub async fn hyperv_stop_vm(
    State(state): State<SharedState>,
    Path(id): Path<String>,
    Query(query): Query<StopQuery>,
) -> ApiResult<OperationDto> {
    let id = parse_id(&id)?;
    let kind = query.kind;
    let stopped = with_manager(&state, move |m| m.stop_virtual_machine(id, kind)).await?;
    Ok(operation(id, &format!("stop ({})", kind), stopped))
}

pub async fn hyperv_pause_vm(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<OperationDto> {
    let id = parse_id(&id)?;
    let paused = with_manager(&state, move |m| m.pause_virtual_machine(id)).await?;
    Ok(operation(id, "pause", paused))
}

pub async fn hyperv_resume_vm(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<OperationDto> {
    let id = parse_id(&id)?;
    let resumed = with_manager(&state, move |m| m.resume_virtual_machine(id)).await?;
    Ok(operation(id, "resume", resumed))
}

pub async fn hyperv_restart_vm(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<OperationDto> {
    let id = parse_id(&id)?;
    let restarted = with_manager(&state, move |m| m.restart_virtual_machine(id)).await?;
    Ok(operation(id, "restart", restarted))
}

// =============================================================================
// Checkpoints
// =============================================================================

pub async fn hyperv_list_checkpoints(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<Vec<CheckpointDto>> {
    let id = parse_id(&id)?;
    let checkpoints = with_manager(&state, move |m| m.get_checkpoints(id)).await?;
    Ok(Json(ApiResponse::success(
        checkpoints.iter().map(CheckpointDto::from).collect(),
    )))
}

pub async fn hyperv_create_checkpoint(
    State(state): State<SharedState>,
    Path(id): Path<String>,
) -> ApiResult<OperationDto> {
    let id = parse_id(&id)?;
    let created = with_manager(&state, move |m| m.create_checkpoint(id)).await?;
    Ok(operation(id, "create checkpoint", created))
}

pub async fn hyperv_apply_checkpoint(
    State(state): State<SharedState>,
    Path((id, checkpoint)): Path<(String, String)>,
) -> ApiResult<OperationDto> {
    let id = parse_id(&id)?;
    let checkpoint = parse_id(&checkpoint)?;
    let applied = with_manager(&state, move |m| m.apply_checkpoint(id, checkpoint)).await?;
    Ok(operation(id, &format!("apply checkpoint {}", checkpoint), applied))
}

pub async fn hyperv_delete_checkpoint(
    State(state): State<SharedState>,
    Path((id, checkpoint)): Path<(String, String)>,
) -> ApiResult<OperationDto> {
    let id = parse_id(&id)?;
    let checkpoint = parse_id(&checkpoint)?;
    let removed = with_manager(&state, move |m| m.remove_checkpoint(id, checkpoint)).await?;
    Ok(operation(id, &format!("remove checkpoint {}", checkpoint), removed))
}
