//! Route definitions

use axum::{
    routing::{get, post},
    Router,
};

use crate::handlers::*;
use crate::SharedState;

pub fn hyperv_routes() -> Router<SharedState> {
    Router::new()
        // Host
        .route("/host", get(hyperv_host_info))
        .route("/vhd/size", get(hyperv_vhd_size))
        // VMs
        .route("/vms", get(hyperv_list_vms).post(hyperv_create_vm))
        .route("/vms/{id}", get(hyperv_get_vm).delete(hyperv_delete_vm))
        .route("/vms/{id}/start", post(hyperv_start_vm))
        .route("/vms/{id}/stop", post(hyperv_stop_vm))
        .route("/vms/{id}/pause", post(hyperv_pause_vm))
        .route("/vms/{id}/resume", post(hyperv_resume_vm))
        .route("/vms/{id}/restart", post(hyperv_restart_vm))
        // Checkpoints
        .route(
            "/vms/{id}/checkpoints",
            get(hyperv_list_checkpoints).post(hyperv_create_checkpoint),
        )
        .route(
            "/vms/{id}/checkpoints/{checkpoint}",
            axum::routing::delete(hyperv_delete_checkpoint),
        )
        .route(
            "/vms/{id}/checkpoints/{checkpoint}/apply",
            post(hyperv_apply_checkpoint),
        )
}
