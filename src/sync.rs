// src/sync.rs

//! Source-control update run in a project's working copy before its
//! pipeline (`git pull` by default).

use std::path::Path;

use tracing::{info, warn};

use crate::errors::{HookdeployError, Result};
use crate::exec::{CommandLine, merge_output};

/// The configured sync command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncCommand {
    raw: String,
    line: CommandLine,
}

impl SyncCommand {
    pub fn parse(raw: &str) -> Result<Self> {
        Ok(Self {
            raw: raw.trim().to_string(),
            line: CommandLine::parse_program(raw)?,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Run the command in `workdir` and wait for it.
    ///
    /// Returns the captured output on success. A launch failure or non-zero
    /// exit becomes [`HookdeployError::SyncFailed`] carrying the raw output.
    pub async fn run(&self, workdir: &Path) -> Result<String> {
        info!(cmd = %self.raw, workdir = %workdir.display(), "syncing working copy");

        let output = self
            .line
            .to_command(workdir)
            .output()
            .await
            .map_err(|e| HookdeployError::SyncFailed {
                command: self.raw.clone(),
                detail: e.to_string(),
            })?;

        let text = merge_output(
            &String::from_utf8_lossy(&output.stdout),
            &String::from_utf8_lossy(&output.stderr),
        );

        if !output.status.success() {
            warn!(
                cmd = %self.raw,
                exit_code = output.status.code().unwrap_or(-1),
                "sync command failed"
            );
            let detail = if text.is_empty() {
                output.status.to_string()
            } else {
                format!("{}\n{}", output.status, text)
            };
            return Err(HookdeployError::SyncFailed {
                command: self.raw.clone(),
                detail,
            });
        }

        info!(cmd = %self.raw, "sync finished");
        Ok(text)
    }
}
