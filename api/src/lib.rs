//! REST agent for Hyper-V virtual machine and checkpoint operations
//!
//! Provides REST endpoints for:
//! - Host: descriptor, virtual disk size
//! - Virtual machines: list, get, create, remove, start, stop, pause, resume, restart
//! - Checkpoints: list, create, apply, remove
//!
//! Every endpoint goes through a single shared [`HyperVManager`], so
//! concurrent requests for the same VM are serialized.

pub mod config;
pub mod dto;
pub mod handlers;
pub mod response;
pub mod routes;

use std::sync::Arc;

use axum::{routing::get, Json, Router};
use hvops::HyperVManager;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

pub use config::Config;
pub use dto::*;
pub use response::{ApiResponse, ApiResult};

// =============================================================================
// Tracing Initialization
// =============================================================================

/// Initialize tracing/logging with the given filter level
pub fn init_tracing(filter: &str) {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Shared State
// =============================================================================

pub struct AppState {
    pub manager: Arc<HyperVManager>,
}

impl AppState {
    pub fn new(manager: HyperVManager) -> Self {
        Self {
            manager: Arc::new(manager),
        }
    }
}

pub type SharedState = Arc<AppState>;

// =============================================================================
// Router
// =============================================================================

pub fn create_router(state: SharedState) -> Router {
    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", routes::hyperv_routes())
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// =============================================================================
// Root Endpoints
// =============================================================================

async fn root() -> &'static str {
    "Hyper-V Operations API - Use /api/v1/vms or /api/v1/host"
}

async fn health() -> Json<ApiResponse<&'static str>> {
    Json(ApiResponse::success("ok"))
}

// =============================================================================
// Tests
// =============================================================================
