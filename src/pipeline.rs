// src/pipeline.rs

//! Pipeline executor: runs a project's steps in declared order and stops at
//! the first failure.
//!
//! The executor holds no locks; single-flight execution is the
//! coordinator's job.

use std::path::Path;

use tracing::{info, warn};

use crate::config::ProjectConfig;
use crate::exec::outcome::join_non_empty;
use crate::exec::{ScriptOutcome, StepRunner};

/// Aggregate result of one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineResult {
    /// Outcomes of the steps actually attempted, in order.
    pub outcomes: Vec<ScriptOutcome>,
    /// True only if every attempted step succeeded and nothing was skipped.
    pub success: bool,
    /// True if a failure stopped the run before the last step.
    pub aborted: bool,
    /// Each attempted step's output (and error detail), in order.
    pub log: String,
}

impl PipelineResult {
    pub fn attempted(&self) -> usize {
        self.outcomes.len()
    }

    /// The step that stopped the pipeline, if any.
    pub fn failed_step(&self) -> Option<&ScriptOutcome> {
        self.outcomes.iter().find(|o| !o.success)
    }
}

/// Run every step of `project` in `workdir` through `runner`.
pub async fn execute<R>(runner: &R, project: &ProjectConfig, workdir: &Path) -> PipelineResult
where
    R: StepRunner + ?Sized,
{
    let total = project.scripts.len();
    let mut outcomes = Vec::with_capacity(total);
    let mut aborted = false;

    for (idx, spec) in project.scripts.iter().enumerate() {
        let outcome = runner.run(spec, workdir).await;
        let failed = !outcome.success;
        outcomes.push(outcome);

        if failed {
            aborted = idx + 1 < total;
            warn!(
                project = %project.path,
                step = idx + 1,
                total,
                cmd = %spec.cmd,
                "step failed; stopping pipeline"
            );
            break;
        }
    }

    let success = outcomes.iter().all(|o| o.success);
    let texts: Vec<String> = outcomes.iter().map(ScriptOutcome::log_text).collect();
    let log = join_non_empty(texts.iter().map(String::as_str));

    info!(
        project = %project.path,
        attempted = outcomes.len(),
        total,
        success,
        "pipeline finished"
    );

    PipelineResult {
        outcomes,
        success,
        aborted,
        log,
    }
}
