// src/config/mod.rs

//! TOML configuration: model, loading and validation.

pub mod loader;
pub mod model;
mod validate;

pub use loader::{load_and_validate, load_from_path, parse_str};
pub use model::{
    ConfigFile, DeploySection, NotifySection, ProjectConfig, RawConfigFile, ScriptSpec,
    ServerSection,
};
