// src/exec/outcome.rs

use std::process::ExitStatus;

use crate::config::ScriptSpec;

/// Result of running one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScriptOutcome {
    /// The step's command line, as configured.
    pub command: String,
    /// Whether the runner waited for the process to exit.
    pub waited: bool,
    pub success: bool,
    pub exit_code: Option<i32>,
    /// stdout then stderr, newline-joined. Empty for steps not waited on.
    pub output: String,
    /// Launch or wait error, if any.
    pub error: Option<String>,
}

impl ScriptOutcome {
    /// The process could not be started.
    pub fn launch_failed(spec: &ScriptSpec, error: impl ToString) -> Self {
        Self {
            command: spec.cmd.clone(),
            waited: spec.wait,
            success: false,
            exit_code: None,
            output: String::new(),
            error: Some(error.to_string()),
        }
    }

    /// A `wait = false` step that launched; its result is not awaited.
    pub fn launched(spec: &ScriptSpec) -> Self {
        Self {
            command: spec.cmd.clone(),
            waited: false,
            success: true,
            exit_code: None,
            output: String::new(),
            error: None,
        }
    }

    pub fn exited(spec: &ScriptSpec, status: ExitStatus, output: String) -> Self {
        let error = (!status.success())
            .then(|| format!("Failed while executing {}: {status}", spec.cmd));
        Self {
            command: spec.cmd.clone(),
            waited: true,
            success: status.success(),
            exit_code: status.code(),
            output,
            error,
        }
    }

    /// The step was waited on but did not exit normally (killed, or the wait
    /// itself failed).
    pub fn interrupted(spec: &ScriptSpec, error: impl ToString, output: String) -> Self {
        Self {
            command: spec.cmd.clone(),
            waited: true,
            success: false,
            exit_code: None,
            output,
            error: Some(error.to_string()),
        }
    }

    /// Output followed by the error detail, for logs and notifications.
    pub fn log_text(&self) -> String {
        join_non_empty([self.output.as_str(), self.error.as_deref().unwrap_or_default()])
    }
}

/// Merge captured streams: stdout first, then stderr, separated by a
/// newline. Trailing newlines of each part are dropped and empty parts
/// skipped.
pub fn merge_output(stdout: &str, stderr: &str) -> String {
    join_non_empty([stdout, stderr])
}

pub(crate) fn join_non_empty<'a>(parts: impl IntoIterator<Item = &'a str>) -> String {
    parts
        .into_iter()
        .map(|p| p.trim_end_matches(['\n', '\r']))
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
