// src/config/model.rs

use std::net::SocketAddr;
use std::path::PathBuf;

use serde::Deserialize;

use crate::errors::{HookdeployError, Result};

/// Configuration as read from a TOML file, before validation.
///
/// ```toml
/// [server]
/// bind = "0.0.0.0:8080"
/// hooks_path = "/hooks"
///
/// [notify]
/// url = "https://hooks.slack.com/services/..."
/// channel = "#deploys"
///
/// [deploy]
/// root = "/srv/go"
/// sync_command = "git pull"
///
/// [[project]]
/// path = "src/github.com/acme/api"
///
/// [[project.script]]
/// cmd = "build.sh"
///
/// [[project.script]]
/// cmd = "bin/api --port 9000"
/// wait = false
/// ```
///
/// Every section except `[[project]]` is optional.
#[derive(Debug, Clone, Deserialize)]
pub struct RawConfigFile {
    #[serde(default)]
    pub server: ServerSection,

    #[serde(default)]
    pub notify: NotifySection,

    #[serde(default)]
    pub deploy: DeploySection,

    #[serde(default, rename = "project")]
    pub projects: Vec<ProjectConfig>,
}

/// Validated configuration. Only constructible through
/// `ConfigFile::try_from(RawConfigFile)`.
#[derive(Debug, Clone)]
pub struct ConfigFile {
    pub server: ServerSection,
    pub notify: NotifySection,
    pub deploy: DeploySection,
    pub projects: Vec<ProjectConfig>,
}

impl ConfigFile {
    pub(crate) fn new_unchecked(raw: RawConfigFile) -> Self {
        Self {
            server: raw.server,
            notify: raw.notify,
            deploy: raw.deploy,
            projects: raw.projects,
        }
    }

    /// Parsed `[server].bind`. Validation guarantees this succeeds.
    pub fn bind_addr(&self) -> Option<SocketAddr> {
        self.server.bind.parse().ok()
    }

    /// Find the single project whose path contains `repository`.
    pub fn resolve(&self, repository: &str) -> Result<&ProjectConfig> {
        let mut matches = self.projects.iter().filter(|p| p.matches(repository));
        let first = matches
            .next()
            .ok_or_else(|| HookdeployError::UnknownRepository(repository.to_string()))?;

        let rest: Vec<&ProjectConfig> = matches.collect();
        if rest.is_empty() {
            return Ok(first);
        }

        Err(HookdeployError::AmbiguousRepository {
            repo: repository.to_string(),
            matches: std::iter::once(first)
                .chain(rest)
                .map(|p| p.path.clone())
                .collect(),
        })
    }

    /// Working directory of a project: `[deploy].root` joined with the
    /// project path (absolute project paths are used unchanged).
    pub fn workdir_for(&self, project: &ProjectConfig) -> PathBuf {
        self.deploy.root_dir().join(&project.path)
    }
}

/// `[server]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerSection {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Prefix the webhook routes are mounted under.
    #[serde(default = "default_hooks_path")]
    pub hooks_path: String,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_hooks_path() -> String {
    "/hooks".to_string()
}

impl Default for ServerSection {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            hooks_path: default_hooks_path(),
        }
    }
}

/// `[notify]` section. Without a `url`, messages are only logged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NotifySection {
    #[serde(default)]
    pub url: Option<String>,

    #[serde(default)]
    pub channel: String,
}

/// `[deploy]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct DeploySection {
    /// Base directory project paths are resolved against.
    ///
    /// Falls back to `$GOPATH`, then to the current directory.
    #[serde(default)]
    pub root: Option<PathBuf>,

    /// Source-control update command run in the project directory before
    /// its scripts.
    #[serde(default = "default_sync_command")]
    pub sync_command: String,
}

fn default_sync_command() -> String {
    "git pull".to_string()
}

impl Default for DeploySection {
    fn default() -> Self {
        Self {
            root: None,
            sync_command: default_sync_command(),
        }
    }
}

impl DeploySection {
    pub fn root_dir(&self) -> PathBuf {
        match &self.root {
            Some(root) => root.clone(),
            None => std::env::var_os("GOPATH")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(".")),
        }
    }
}

/// `[[project]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Path of the working copy, relative to `[deploy].root`.
    ///
    /// Incoming repository names are matched against it by substring
    /// containment (`"src/github.com/acme/api"` matches `"acme/api"`).
    pub path: String,

    #[serde(default, rename = "script")]
    pub scripts: Vec<ScriptSpec>,
}

impl ProjectConfig {
    pub fn matches(&self, repository: &str) -> bool {
        !repository.is_empty() && self.path.contains(repository)
    }
}

/// `[[project.script]]` entry: one pipeline step.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ScriptSpec {
    /// Command line. A single token is an executable relative to the
    /// project directory; otherwise the first token is the program and
    /// the rest are its arguments.
    pub cmd: String,

    /// `true`: run to completion before the next step.
    /// `false`: launch and move on (long-lived services).
    #[serde(default = "default_wait")]
    pub wait: bool,
}

fn default_wait() -> bool {
    true
}

impl ScriptSpec {
    pub fn new(cmd: impl Into<String>, wait: bool) -> Self {
        Self {
            cmd: cmd.into(),
            wait,
        }
    }
}
