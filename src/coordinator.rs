// src/coordinator.rs

//! Deployment coordinator.
//!
//! Single entry point per inbound event. Holds a process-wide execution lock
//! across resolve → sync → execute → notify, so at most one deployment runs
//! at a time; concurrent requests wait on the lock (tokio's mutex grants it
//! in FIFO order).
//!
//! `redeploy` resolves the event to one project. `restart` first clears the
//! process registry, then resolves to every configured project and runs the
//! sync → execute → notify sequence for each in declared order.
//!
//! Every path ends in `Idle` and releases the lock through the guard's scope.
//! Every outcome produces at least one notification.

use std::fmt;
use std::sync::{Arc, Mutex as StdMutex, PoisonError};

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::config::{ConfigFile, ProjectConfig};
use crate::errors::{HookdeployError, Result};
use crate::event::PushEvent;
use crate::exec::{ProcessRunner, StepRunner};
use crate::notify::{Message, MessageBuilder, Notifier};
use crate::pipeline::{self, PipelineResult};
use crate::registry::ProcessRegistry;
use crate::sync::SyncCommand;

/// Everything the engine needs, built once at startup and shared by
/// reference.
pub struct EngineContext {
    pub config: ConfigFile,
    pub registry: Arc<ProcessRegistry>,
    pub runner: Arc<dyn StepRunner>,
    pub notifier: Arc<dyn Notifier>,
    pub sync: SyncCommand,
}

impl EngineContext {
    /// Production wiring: a fresh registry and a process runner tracking
    /// into it.
    pub fn new(config: ConfigFile, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let registry = Arc::new(ProcessRegistry::new());
        let runner: Arc<dyn StepRunner> = Arc::new(ProcessRunner::new(Arc::clone(&registry)));
        Self::with_parts(config, registry, runner, notifier)
    }

    pub fn with_parts(
        config: ConfigFile,
        registry: Arc<ProcessRegistry>,
        runner: Arc<dyn StepRunner>,
        notifier: Arc<dyn Notifier>,
    ) -> Result<Self> {
        let sync = SyncCommand::parse(&config.deploy.sync_command)?;
        Ok(Self {
            config,
            registry,
            runner,
            notifier,
            sync,
        })
    }
}

impl fmt::Debug for EngineContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EngineContext")
            .field("projects", &self.config.projects.len())
            .field("registry", &self.registry)
            .field("sync", &self.sync)
            .finish_non_exhaustive()
    }
}

/// Where the coordinator currently is.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployState {
    Idle,
    Resolving,
    Syncing,
    Executing,
    Notifying,
}

/// What happened to one project during a deployment.
#[derive(Debug, Clone)]
pub struct ProjectReport {
    pub project: String,
    /// Set when the deployment stopped before the pipeline (missing
    /// directory, sync failure).
    pub error: Option<String>,
    /// Present when the pipeline ran.
    pub pipeline: Option<PipelineResult>,
}

impl ProjectReport {
    pub fn success(&self) -> bool {
        self.error.is_none() && self.pipeline.as_ref().is_some_and(|p| p.success)
    }
}

/// Result of one coordinator invocation. Not persisted.
#[derive(Debug, Clone)]
pub struct DeployReport {
    pub repository: String,
    /// Resolution failure, if the event matched no single project.
    pub error: Option<String>,
    pub projects: Vec<ProjectReport>,
}

impl DeployReport {
    pub fn success(&self) -> bool {
        self.error.is_none() && self.projects.iter().all(ProjectReport::success)
    }
}

pub struct Coordinator {
    ctx: Arc<EngineContext>,
    exec_lock: Mutex<()>,
    state: StdMutex<DeployState>,
}

impl fmt::Debug for Coordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Coordinator")
            .field("ctx", &self.ctx)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}

impl Coordinator {
    pub fn new(ctx: Arc<EngineContext>) -> Self {
        Self {
            ctx,
            exec_lock: Mutex::new(()),
            state: StdMutex::new(DeployState::Idle),
        }
    }

    pub fn context(&self) -> &Arc<EngineContext> {
        &self.ctx
    }

    pub fn state(&self) -> DeployState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn set_state(&self, next: DeployState) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        debug!(from = ?*state, to = ?next, "coordinator state");
        *state = next;
    }

    /// Redeploy the single project matching the event's repository.
    pub async fn redeploy(&self, event: &PushEvent) -> DeployReport {
        let _guard = self.exec_lock.lock().await;
        let report = self.redeploy_locked(event).await;
        self.set_state(DeployState::Idle);
        report
    }

    /// Stop every tracked process, then redeploy every configured project
    /// in declared order.
    pub async fn restart(&self, event: &PushEvent) -> DeployReport {
        let _guard = self.exec_lock.lock().await;
        info!(repo = %event.repository_name(), "restarting all projects");

        let cleared = self.ctx.registry.clear_all().await;
        info!(killed = cleared.killed, "stopped previously running processes");
        if let Some(err) = &cleared.last_error {
            warn!(error = %err, "some processes could not be stopped");
        }

        self.set_state(DeployState::Resolving);
        let targets: Vec<&ProjectConfig> = self.ctx.config.projects.iter().collect();
        debug!(projects = targets.len(), "restart targets every configured project");

        let messages = self.message_builder(event);
        let mut projects = Vec::with_capacity(targets.len());
        for project in targets {
            projects.push(self.deploy_project(project, &messages).await);
        }

        self.set_state(DeployState::Idle);
        DeployReport {
            repository: event.repository_name().to_string(),
            error: None,
            projects,
        }
    }

    async fn redeploy_locked(&self, event: &PushEvent) -> DeployReport {
        let repository = event.repository_name().to_string();
        let messages = self.message_builder(event);

        self.set_state(DeployState::Resolving);
        let project = match self.ctx.config.resolve(&repository) {
            Ok(project) => project,
            Err(err) => {
                warn!(repo = %repository, error = %err, "can't resolve project");
                self.set_state(DeployState::Notifying);
                self.send(&messages.failure(err.to_string())).await;
                return DeployReport {
                    repository,
                    error: Some(err.to_string()),
                    projects: Vec::new(),
                };
            }
        };

        info!(repo = %repository, project = %project.path, "redeploying project");
        let report = self.deploy_project(project, &messages).await;

        DeployReport {
            repository,
            error: None,
            projects: vec![report],
        }
    }

    /// Sync, run the pipeline and report for one project. Caller holds the
    /// execution lock.
    async fn deploy_project(
        &self,
        project: &ProjectConfig,
        messages: &MessageBuilder,
    ) -> ProjectReport {
        self.send(&messages.starting(&project.path)).await;

        let workdir = self.ctx.config.workdir_for(project);
        if !workdir.is_dir() {
            let err = HookdeployError::MissingWorkdir(workdir);
            return self.abort_project(project, messages, err).await;
        }

        self.set_state(DeployState::Syncing);
        if let Err(err) = self.ctx.sync.run(&workdir).await {
            return self.abort_project(project, messages, err).await;
        }

        self.set_state(DeployState::Executing);
        let result = pipeline::execute(self.ctx.runner.as_ref(), project, &workdir).await;

        self.set_state(DeployState::Notifying);
        if result.attempted() > 0 {
            self.send(&messages.pipeline(&project.path, &result, project.scripts.len()))
                .await;
        }
        self.send(&messages.finished(&project.path, result.success)).await;

        ProjectReport {
            project: project.path.clone(),
            error: None,
            pipeline: Some(result),
        }
    }

    async fn abort_project(
        &self,
        project: &ProjectConfig,
        messages: &MessageBuilder,
        err: HookdeployError,
    ) -> ProjectReport {
        warn!(project = %project.path, error = %err, "deployment aborted");
        self.set_state(DeployState::Notifying);
        self.send(&messages.failure(err.to_string())).await;
        ProjectReport {
            project: project.path.clone(),
            error: Some(err.to_string()),
            pipeline: None,
        }
    }

    fn message_builder(&self, event: &PushEvent) -> MessageBuilder {
        MessageBuilder::new(self.ctx.config.notify.channel.clone(), event)
    }

    /// Deliver a message; delivery problems are logged, never propagated.
    async fn send(&self, message: &Message) {
        if let Err(err) = self.ctx.notifier.notify(message).await {
            warn!(error = %err, "notification failed");
        }
    }
}
