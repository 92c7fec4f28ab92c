//! PowerShell-backed pipeline executor
//!
//! Each pipeline is rendered into a single script that collects the
//! output objects and the error stream, then hands both back as one JSON
//! document:
//!
//! ```text
//! { "Records": [ ... ], "Errors": [ { "Message": "...", "HResult": -2147024891 } ] }
//! ```

use std::process::{Command, Output};

use serde::Deserialize;

use crate::error::ExecutorError;
use crate::executor::{ExecutionResult, PipelineExecutor};
use crate::pipeline::commands::{members, params, GET_VM};
use crate::pipeline::{ParamValue, PipeMode, Pipeline};
use crate::record::{RawRecord, Value};

/// Default shell program.
pub const DEFAULT_PROGRAM: &str = "powershell";

/// Depth handed to `ConvertTo-Json`; VM objects reference each other so
/// deeper levels only add noise.
const JSON_DEPTH: u32 = 2;

/// Run a script with the given PowerShell program.
pub(crate) fn run_script(program: &str, script: &str) -> std::io::Result<Output> {
    Command::new(program)
        .args(["-NoProfile", "-NonInteractive", "-Command", script])
        .output()
}

/// Executes pipelines by spawning a PowerShell process per call.
#[derive(Debug, Clone)]
pub struct PowerShellExecutor {
    program: String,
}

impl Default for PowerShellExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRAM)
    }
}

impl PowerShellExecutor {
    /// `program` is `powershell` for Windows PowerShell or `pwsh` for PowerShell 7.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }
}

impl PipelineExecutor for PowerShellExecutor {
    fn execute(
        &self,
        pipeline: &Pipeline,
        mode: PipeMode,
    ) -> Result<ExecutionResult, ExecutorError> {
        let script = wrap_script(&render_pipeline(pipeline, mode));
        tracing::debug!(program = %self.program, commands = ?pipeline.command_names(), "executing pipeline");

        let output = run_script(&self.program, &script).map_err(|source| ExecutorError::Spawn {
            program: self.program.clone(),
            source,
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(ExecutorError::Exit {
                status: output.status.code().unwrap_or(-1),
                stderr: stderr.trim().to_string(),
            });
        }

        decode_output(&String::from_utf8_lossy(&output.stdout))
    }
}

/// Render the commands of `pipeline` as one PowerShell expression.
pub fn render_pipeline(pipeline: &Pipeline, mode: PipeMode) -> String {
    let separator = match mode {
        PipeMode::None => "; ",
        PipeMode::PipeOutput => " | ",
    };
    pipeline
        .commands()
        .iter()
        .map(|command| {
            let mut rendered = command.name().to_string();
            for (name, value) in command.parameters() {
                rendered.push(' ');
                rendered.push_str(&render_parameter(name, value));
            }
            rendered
        })
        .collect::<Vec<_>>()
        .join(separator)
}

fn render_parameter(name: &str, value: &ParamValue) -> String {
    match value {
        ParamValue::Bool(b) => format!("-{name}:${b}"),
        ParamValue::String(s) => format!("-{name} {}", quote(s)),
        ParamValue::Int(i) => format!("-{name} {i}"),
        ParamValue::UInt(u) => format!("-{name} {u}"),
        ParamValue::Guid(g) => format!("-{name} '{g}'"),
        ParamValue::Ref(record) => format!("-{name} {}", render_reference(record)),
    }
}

/// Objects cannot cross process boundaries, so a reference is looked up
/// again by its `Id`.
fn render_reference(record: &RawRecord) -> String {
    match record.get(members::ID) {
        Some(Value::String(id)) => format!("({GET_VM} -{} {})", params::ID, quote(id)),
        Some(Value::Guid(id)) => format!("({GET_VM} -{} '{id}')", params::ID),
        _ => "$null".to_string(),
    }
}

fn quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "''"))
}

/// Wrap a rendered pipeline so its output and errors come back as JSON.
pub fn wrap_script(body: &str) -> String {
    format!(
        r#"$ProgressPreference = 'SilentlyContinue'
$Error.Clear()
$records = @()
try {{ $records = @({body}) }} catch {{ }}
$all = @($Error)
[array]::Reverse($all)
$errors = @($all | ForEach-Object {{
    $ex = if ($_ -is [System.Management.Automation.ErrorRecord]) {{ $_.Exception }} else {{ $_ }}
    [pscustomobject]@{{ Message = $ex.Message; HResult = $ex.HResult }}
}})
ConvertTo-Json -InputObject ([pscustomobject]@{{ Records = $records; Errors = $errors }}) -Depth {JSON_DEPTH} -Compress"#
    )
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct Envelope {
    #[serde(default)]
    records: serde_json::Value,
    #[serde(default)]
    errors: serde_json::Value,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ShellError {
    #[serde(default)]
    message: String,
    #[serde(default)]
    h_result: i32,
}

/// Decode the JSON envelope printed by [`wrap_script`].
pub fn decode_output(stdout: &str) -> Result<ExecutionResult, ExecutorError> {
    let envelope: Envelope = serde_json::from_str(stdout.trim())?;

    let records = flatten(envelope.records)
        .into_iter()
        .filter_map(|item| match item {
            serde_json::Value::Object(map) => Some(RawRecord::from(map)),
            serde_json::Value::Null => None,
            other => {
                tracing::debug!(value = %other, "ignoring non-object pipeline output");
                None
            }
        })
        .collect();

    let errors = flatten(envelope.errors)
        .into_iter()
        .map(serde_json::from_value::<ShellError>)
        .collect::<Result<Vec<_>, _>>()?;

    let error_message = errors
        .iter()
        .map(|e| format!("{} (0x{:X})", e.message, e.h_result))
        .collect::<Vec<_>>()
        .join("\n");
    let error_code = errors.first().map(|e| e.h_result).unwrap_or(0);

    Ok(ExecutionResult {
        records,
        error_message,
        error_code,
    })
}

/// Undo the shapes `ConvertTo-Json` gives collections: a bare object for
/// a single element, or `{ "value": [...], "Count": n }` for arrays that
/// carry extended type data.
fn flatten(value: serde_json::Value) -> Vec<serde_json::Value> {
    match value {
        serde_json::Value::Null => Vec::new(),
        serde_json::Value::Array(items) => items,
        serde_json::Value::Object(mut map)
            if map.len() == 2 && map.contains_key("Count") && map.contains_key("value") =>
        {
            flatten(map.remove("value").unwrap_or_default())
        }
        other => vec![other],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::commands::{REMOVE_VM, SET_VM, SET_VM_FIRMWARE, STOP_VM};
    use uuid::Uuid;

    #[test]
    fn test_render_piped_pipeline() {
        let id = Uuid::nil();
        let pipeline = Pipeline::builder()
            .command(GET_VM)
            .param(params::ID, id)
            .command(STOP_VM)
            .param(params::PASS_THRU, true)
            .param(params::SAVE, true)
            .build();
        assert_eq!(
            render_pipeline(&pipeline, PipeMode::PipeOutput),
            "Get-VM -Id '00000000-0000-0000-0000-000000000000' | Stop-VM -PassThru:$true -Save:$true"
        );
    }

    #[test]
    fn test_render_statements_and_quoting() {
        let vm = RawRecord::new().with("Id", "1b4e28ba-2fa1-11d2-883f-0016d3cca427");
        let pipeline = Pipeline::builder()
            .command(SET_VM)
            .param(params::VM, vm.clone())
            .param(params::PROCESSOR_COUNT, 4_u32)
            .command(SET_VM_FIRMWARE)
            .param(params::VM, vm)
            .param(params::ENABLE_SECURE_BOOT, "On")
            .build();
        assert_eq!(
            render_pipeline(&pipeline, PipeMode::None),
            "Set-VM -VM (Get-VM -Id '1b4e28ba-2fa1-11d2-883f-0016d3cca427') -ProcessorCount 4; \
             Set-VMFirmware -VM (Get-VM -Id '1b4e28ba-2fa1-11d2-883f-0016d3cca427') -EnableSecureBoot 'On'"
        );

        let pipeline = Pipeline::builder()
            .command(REMOVE_VM)
            .param(params::NAME, "it's mine")
            .param(params::CONFIRM, false)
            .param(params::VM, RawRecord::new())
            .build();
        assert_eq!(
            render_pipeline(&pipeline, PipeMode::None),
            "Remove-VM -Name 'it''s mine' -Confirm:$false -VM $null"
        );
    }

    #[test]
    fn test_wrap_script_embeds_body() {
        let script = wrap_script("Get-VM");
        assert!(script.contains("$records = @(Get-VM)"));
        assert!(script.contains("-Depth 2 -Compress"));
    }

    #[test]
    fn test_decode_records_and_errors() {
        let stdout = r#"{"Records":[{"Id":"1b4e28ba-2fa1-11d2-883f-0016d3cca427","Name":"a","State":2},{"Name":"b"}],
            "Errors":[{"Message":"Access denied","HResult":-2147024891},{"Message":"Second","HResult":5}]}"#;
        let result = decode_output(stdout).unwrap();
        assert_eq!(result.records.len(), 2);
        assert_eq!(result.records[0].get("Name"), Some(&Value::from("a")));
        assert_eq!(result.records[1].get("Name"), Some(&Value::from("b")));
        assert_eq!(result.error_message, "Access denied (0x80070005)\nSecond (0x5)");
        assert_eq!(result.error_code, -2147024891);
        assert!(result.has_error());
    }

    #[test]
    fn test_decode_collapsed_shapes() {
        let single = decode_output(r#"{"Records":{"Name":"only"},"Errors":null}"#).unwrap();
        assert_eq!(single.records.len(), 1);
        assert!(!single.has_error());
        assert_eq!(single.error_code, 0);

        let wrapped =
            decode_output(r#"{"Records":{"value":[{"Name":"x"},{"Name":"y"}],"Count":2},"Errors":[]}"#)
                .unwrap();
        assert_eq!(wrapped.records.len(), 2);

        let empty = decode_output(r#"{"Records":[],"Errors":[]}"#).unwrap();
        assert_eq!(empty, ExecutionResult::default());
    }

    #[test]
    fn test_decode_skips_scalars() {
        let result = decode_output(r#"{"Records":["text",{"Name":"vm"},null],"Errors":[]}"#).unwrap();
        assert_eq!(result.records.len(), 1);
    }

    #[test]
    fn test_decode_garbage_is_error() {
        assert!(matches!(
            decode_output("WARNING: not json"),
            Err(ExecutorError::Decode(_))
        ));
    }
}
