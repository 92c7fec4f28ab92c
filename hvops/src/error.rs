//! Error types for Hyper-V operations

use std::time::Duration;

use thiserror::Error;
use uuid::Uuid;

use crate::service::ServiceStatus;

/// HRESULT reported when the shell gives no code of its own.
pub const E_UNEXPECTED: i32 = 0x8000_FFFF_u32 as i32;

/// Errors surfaced by every public manager operation.
#[derive(Error, Debug)]
pub enum Error {
    #[error("Virtual machine management service '{service}' is unavailable: {source}")]
    ServiceUnavailable {
        service: String,
        #[source]
        source: ServiceError,
    },

    #[error("Operation '{operation}' failed{} (code 0x{code:08X}): {message}", fmt_resource(.resource_id))]
    OperationFailed {
        operation: &'static str,
        resource_id: Option<Uuid>,
        message: String,
        code: i32,
    },

    #[error("Resource not found: {resource_id} (code 0x{code:08X})")]
    NotFound { resource_id: Uuid, code: i32 },

    #[error("Cannot convert member '{field}' to {expected}: found {found}")]
    Materialization {
        field: &'static str,
        expected: &'static str,
        found: String,
    },
}

fn fmt_resource(resource_id: &Option<Uuid>) -> String {
    resource_id
        .map(|id| format!(" for {id}"))
        .unwrap_or_default()
}

impl Error {
    /// Create an operation failed error, substituting `E_UNEXPECTED` for a zero code.
    pub fn operation_failed(
        operation: &'static str,
        resource_id: Option<Uuid>,
        message: impl Into<String>,
        code: i32,
    ) -> Self {
        Error::OperationFailed {
            operation,
            resource_id,
            message: message.into(),
            code: if code == 0 { E_UNEXPECTED } else { code },
        }
    }

    /// External error code carried by this error, if any.
    pub fn code(&self) -> Option<i32> {
        match self {
            Error::OperationFailed { code, .. } | Error::NotFound { code, .. } => Some(*code),
            Error::ServiceUnavailable { .. } | Error::Materialization { .. } => None,
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }

    pub fn is_service_unavailable(&self) -> bool {
        matches!(self, Error::ServiceUnavailable { .. })
    }
}

/// Failures of the service controller behind the readiness gate.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("timed out after {timeout:?} waiting for status {target}")]
    Timeout {
        target: ServiceStatus,
        timeout: Duration,
    },

    #[error("unrecognized service status '{0}'")]
    UnknownStatus(String),

    #[error("service control command failed: {0}")]
    Command(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Catastrophic pipeline invocation failures. Command-level errors are
/// reported through `ExecutionResult` instead.
#[derive(Error, Debug)]
pub enum ExecutorError {
    #[error("failed to launch shell '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("shell exited with status {status}: {stderr}")]
    Exit { status: i32, stderr: String },

    #[error("shell output could not be decoded: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file '{path}': {source}")]
    Parse {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

pub type Result<T> = std::result::Result<T, Error>;
