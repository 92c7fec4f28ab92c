//! API response types and utilities

use axum::{http::StatusCode, Json};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: Option<T>,
    pub error: Option<String>,
}

impl<T: Serialize> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }
}

impl ApiResponse<()> {
    pub fn error(message: &str) -> Self {
        ApiResponse {
            success: false,
            data: None,
            error: Some(message.to_string()),
        }
    }
}

pub type ApiError = (StatusCode, Json<ApiResponse<()>>);

pub type ApiResult<T> = Result<Json<ApiResponse<T>>, ApiError>;

pub fn api_error(status: StatusCode, message: &str) -> ApiError {
    (status, Json(ApiResponse::error(message)))
}

/// HTTP status for each manager error kind.
pub fn status_for(error: &hvops::Error) -> StatusCode {
    match error {
        hvops::Error::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
        hvops::Error::NotFound { .. } => StatusCode::NOT_FOUND,
        hvops::Error::OperationFailed { .. } => StatusCode::BAD_GATEWAY,
        hvops::Error::Materialization { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

pub fn manager_error(error: hvops::Error) -> ApiError {
    let status = status_for(&error);
    if status.is_server_error() {
        tracing::error!(%status, error = %error, "manager operation failed");
    }
    api_error(status, &error.to_string())
}
