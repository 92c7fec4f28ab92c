//! Pipeline executor interface

use crate::error::ExecutorError;
use crate::pipeline::{PipeMode, Pipeline};
use crate::record::RawRecord;

/// Outcome of running one pipeline.
///
/// Command-level failures land in `error_message`/`error_code`; records
/// produced before or despite those failures are still returned, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    pub records: Vec<RawRecord>,
    pub error_message: String,
    pub error_code: i32,
}

impl ExecutionResult {
    pub fn from_records(records: Vec<RawRecord>) -> Self {
        Self {
            records,
            ..Default::default()
        }
    }

    pub fn from_error(message: impl Into<String>, code: i32) -> Self {
        Self {
            records: Vec::new(),
            error_message: message.into(),
            error_code: code,
        }
    }

    pub fn has_error(&self) -> bool {
        !self.error_message.is_empty()
    }

    pub fn first(&self) -> Option<&RawRecord> {
        self.records.first()
    }
}

/// Runs pipelines against the external shell.
pub trait PipelineExecutor: Send + Sync {
    /// Execute `pipeline`. Only catastrophic invocation failures return `Err`.
    fn execute(&self, pipeline: &Pipeline, mode: PipeMode)
        -> Result<ExecutionResult, ExecutorError>;
}
