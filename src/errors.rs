// src/errors.rs

//! Crate-wide error type and result alias.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum HookdeployError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Repo is not listed in config: {0}")]
    UnknownRepository(String),

    #[error("Repo '{repo}' matches more than one configured project: {matches:?}")]
    AmbiguousRepository { repo: String, matches: Vec<String> },

    #[error("Can't change current dir to repo's dir: {0:?} does not exist")]
    MissingWorkdir(PathBuf),

    #[error("empty command line")]
    EmptyCommand,

    #[error("Can't execute script {command}: {source}")]
    Launch {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("sync command '{command}' failed: {detail}")]
    SyncFailed { command: String, detail: String },

    #[error("Can't kill pid {pid}: {source}")]
    Kill {
        pid: u32,
        #[source]
        source: std::io::Error,
    },

    #[error("supervisor for pid {0} is gone (process already exited)")]
    SupervisorGone(u32),

    #[error("notification delivery failed: {0}")]
    Notify(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, HookdeployError>;
