// src/exec/command.rs

use std::path::{Path, PathBuf};
use std::process::Stdio;

use tokio::process::Command;

use crate::errors::{HookdeployError, Result};

/// A tokenised command line: program plus verbatim arguments.
///
/// Tokens are split on whitespace; there is no shell quoting.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandLine {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl CommandLine {
    /// Parse a pipeline step.
    ///
    /// - one token: an executable relative to `workdir` (`build.sh` runs
    ///   `<workdir>/build.sh`; absolute paths are kept as-is);
    /// - more tokens: the first is the program (looked up on `PATH` unless it
    ///   contains a separator), the rest are its arguments.
    pub fn parse_script(line: &str, workdir: &Path) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let first = tokens.next().ok_or(HookdeployError::EmptyCommand)?;
        let args: Vec<String> = tokens.map(str::to_string).collect();

        let program = if args.is_empty() {
            workdir.join(first)
        } else {
            PathBuf::from(first)
        };

        Ok(Self { program, args })
    }

    /// Parse a plain command (program looked up on `PATH`), used for the
    /// sync step.
    pub fn parse_program(line: &str) -> Result<Self> {
        let mut tokens = line.split_whitespace();
        let first = tokens.next().ok_or(HookdeployError::EmptyCommand)?;

        Ok(Self {
            program: PathBuf::from(first),
            args: tokens.map(str::to_string).collect(),
        })
    }

    /// Build a command running in `workdir` with both output streams piped.
    pub fn to_command(&self, workdir: &Path) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .current_dir(workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}
