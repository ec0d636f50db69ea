#![allow(dead_code)]

use std::path::Path;

use hookdeploy::config::{
    ConfigFile, DeploySection, NotifySection, ProjectConfig, RawConfigFile, ScriptSpec,
    ServerSection,
};

/// Builder for `ConfigFile` to simplify test setup.
pub struct ConfigFileBuilder {
    config: RawConfigFile,
}

impl ConfigFileBuilder {
    pub fn new() -> Self {
        Self {
            config: RawConfigFile {
                server: ServerSection::default(),
                notify: NotifySection::default(),
                deploy: DeploySection::default(),
                projects: Vec::new(),
            },
        }
    }

    pub fn with_project(mut self, project: ProjectConfig) -> Self {
        self.config.projects.push(project);
        self
    }

    pub fn root(mut self, root: impl AsRef<Path>) -> Self {
        self.config.deploy.root = Some(root.as_ref().to_path_buf());
        self
    }

    pub fn sync_command(mut self, cmd: &str) -> Self {
        self.config.deploy.sync_command = cmd.to_string();
        self
    }

    pub fn channel(mut self, channel: &str) -> Self {
        self.config.notify.channel = channel.to_string();
        self
    }

    pub fn hooks_path(mut self, path: &str) -> Self {
        self.config.server.hooks_path = path.to_string();
        self
    }

    pub fn raw(self) -> RawConfigFile {
        self.config
    }

    pub fn build(self) -> ConfigFile {
        ConfigFile::try_from(self.config).expect("Failed to build valid config from builder")
    }
}

impl Default for ConfigFileBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// Builder for `ProjectConfig`.
pub struct ProjectBuilder {
    project: ProjectConfig,
}

impl ProjectBuilder {
    pub fn new(path: &str) -> Self {
        Self {
            project: ProjectConfig {
                path: path.to_string(),
                scripts: Vec::new(),
            },
        }
    }

    /// Append a step that is waited on.
    pub fn script(mut self, cmd: &str) -> Self {
        self.project.scripts.push(ScriptSpec::new(cmd, true));
        self
    }

    /// Append a step that is launched and not waited on.
    pub fn background(mut self, cmd: &str) -> Self {
        self.project.scripts.push(ScriptSpec::new(cmd, false));
        self
    }

    pub fn build(self) -> ProjectConfig {
        self.project
    }
}
