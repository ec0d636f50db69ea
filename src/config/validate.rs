// src/config/validate.rs

use std::collections::HashSet;
use std::net::SocketAddr;

use crate::config::model::{ConfigFile, RawConfigFile};
use crate::errors::{HookdeployError, Result};

impl TryFrom<RawConfigFile> for ConfigFile {
    type Error = crate::errors::HookdeployError;

    fn try_from(raw: RawConfigFile) -> std::result::Result<Self, Self::Error> {
        validate_raw_config(&raw)?;
        Ok(ConfigFile::new_unchecked(raw))
    }
}

fn validate_raw_config(cfg: &RawConfigFile) -> Result<()> {
    ensure_has_projects(cfg)?;
    validate_server(cfg)?;
    validate_deploy(cfg)?;
    validate_projects(cfg)?;
    Ok(())
}

fn config_error(msg: impl Into<String>) -> HookdeployError {
    HookdeployError::ConfigError(msg.into())
}

fn ensure_has_projects(cfg: &RawConfigFile) -> Result<()> {
    if cfg.projects.is_empty() {
        return Err(config_error(
            "config must contain at least one [[project]] section",
        ));
    }
    Ok(())
}

fn validate_server(cfg: &RawConfigFile) -> Result<()> {
    if cfg.server.bind.parse::<SocketAddr>().is_err() {
        return Err(config_error(format!(
            "[server].bind must be a socket address like \"0.0.0.0:8080\" (got {:?})",
            cfg.server.bind
        )));
    }

    if !cfg.server.hooks_path.starts_with('/') {
        return Err(config_error(format!(
            "[server].hooks_path must start with '/' (got {:?})",
            cfg.server.hooks_path
        )));
    }

    Ok(())
}

fn validate_deploy(cfg: &RawConfigFile) -> Result<()> {
    if cfg.deploy.sync_command.trim().is_empty() {
        return Err(config_error("[deploy].sync_command must not be empty"));
    }
    Ok(())
}

fn validate_projects(cfg: &RawConfigFile) -> Result<()> {
    let mut seen = HashSet::new();

    for project in cfg.projects.iter() {
        if project.path.trim().is_empty() {
            return Err(config_error("[[project]] path must not be empty"));
        }

        if !seen.insert(project.path.as_str()) {
            return Err(config_error(format!(
                "project '{}' is listed more than once",
                project.path
            )));
        }

        for (idx, script) in project.scripts.iter().enumerate() {
            if script.cmd.trim().is_empty() {
                return Err(config_error(format!(
                    "project '{}' script #{} has an empty `cmd`",
                    project.path,
                    idx + 1
                )));
            }
        }
    }

    Ok(())
}
