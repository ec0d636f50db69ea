// tests/coordinator_flow.rs
#![cfg(unix)]

use std::error::Error;
use std::path::Path;
use std::sync::{Arc, Mutex, OnceLock, Weak};
use std::time::Duration;

use tempfile::tempdir;

use hookdeploy::config::{ConfigFile, ScriptSpec};
use hookdeploy::coordinator::{Coordinator, DeployState, EngineContext};
use hookdeploy::event::PushEvent;
use hookdeploy::exec::{ScriptOutcome, StepFuture, StepRunner};
use hookdeploy::notify::Color;
use hookdeploy::registry::ProcessRegistry;
use hookdeploy_test_utils::builders::{ConfigFileBuilder, ProjectBuilder};
use hookdeploy_test_utils::fakes::{RecordingNotifier, ScriptedRunner};
use hookdeploy_test_utils::scripts::project_dir;
use hookdeploy_test_utils::{init_tracing, with_timeout};

type TestResult = Result<(), Box<dyn Error>>;

struct Harness {
    coordinator: Arc<Coordinator>,
    notifier: RecordingNotifier,
    registry: Arc<ProcessRegistry>,
}

fn harness(config: ConfigFile, runner: Arc<dyn StepRunner>) -> Result<Harness, Box<dyn Error>> {
    let notifier = RecordingNotifier::new();
    let registry = Arc::new(ProcessRegistry::new());
    let ctx = EngineContext::with_parts(
        config,
        Arc::clone(&registry),
        runner,
        Arc::new(notifier.clone()),
    )?;
    Ok(Harness {
        coordinator: Arc::new(Coordinator::new(Arc::new(ctx))),
        notifier,
        registry,
    })
}

fn config(root: &Path) -> ConfigFileBuilder {
    ConfigFileBuilder::new()
        .root(root)
        .sync_command("true")
        .channel("#deploys")
}

#[tokio::test]
async fn unknown_repository_sends_one_failure_and_runs_nothing() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    let runner = ScriptedRunner::new();
    let h = harness(
        config(root.path())
            .with_project(ProjectBuilder::new("src/acme/api").script("build").build())
            .build(),
        Arc::new(runner.clone()),
    )?;

    let report = with_timeout(
        h.coordinator
            .redeploy(&PushEvent::for_repository("acme/unknown")),
    )
    .await;

    assert!(!report.success());
    assert!(report.projects.is_empty());
    assert!(
        report
            .error
            .as_deref()
            .is_some_and(|e| e.contains("Repo is not listed in config"))
    );

    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 1);
    assert!(messages[0].is_failure());
    assert_eq!(messages[0].channel, "#deploys");
    assert!(runner.events().is_empty());
    assert!(h.registry.is_empty());
    assert_eq!(h.coordinator.state(), DeployState::Idle);

    Ok(())
}

#[tokio::test]
async fn successful_redeploy_reports_start_pipeline_and_finish() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    project_dir(root.path(), "src/acme/api")?;
    let runner = ScriptedRunner::new();
    let h = harness(
        config(root.path())
            .with_project(
                ProjectBuilder::new("src/acme/api")
                    .script("build")
                    .script("install")
                    .build(),
            )
            .build(),
        Arc::new(runner.clone()),
    )?;

    let report = with_timeout(h.coordinator.redeploy(&PushEvent::for_repository("acme/api"))).await;

    assert!(report.success(), "report: {report:?}");
    assert_eq!(report.projects.len(), 1);
    assert_eq!(runner.started(), vec!["build", "install"]);

    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 3, "messages: {messages:#?}");
    assert_eq!(messages[0].text, "Redeploying src/acme/api...");

    let pipeline = &messages[1];
    assert_eq!(pipeline.text, "Pipeline for src/acme/api succeeded");
    assert_eq!(pipeline.attachments.len(), 3, "headline plus one per step");
    assert_eq!(pipeline.attachments[0].color, Color::Good);
    assert_eq!(pipeline.attachments[0].text, "ran build\nran install");
    assert_eq!(pipeline.attachments[1].title, "#1 build");
    assert_eq!(pipeline.attachments[2].title, "#2 install");

    assert_eq!(messages[2].text, "Redeploy of src/acme/api finished");
    assert!(h.notifier.failures().is_empty());
    assert_eq!(h.coordinator.state(), DeployState::Idle);

    Ok(())
}

#[tokio::test]
async fn failing_step_stops_the_rest_and_is_reported() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    project_dir(root.path(), "src/acme/api")?;
    let runner = ScriptedRunner::new().failing("build");
    let h = harness(
        config(root.path())
            .with_project(
                ProjectBuilder::new("src/acme/api")
                    .script("build")
                    .script("install")
                    .build(),
            )
            .build(),
        Arc::new(runner.clone()),
    )?;

    let report = with_timeout(h.coordinator.redeploy(&PushEvent::for_repository("acme/api"))).await;

    assert!(!report.success());
    let pipeline = report.projects[0].pipeline.as_ref().ok_or("pipeline ran")?;
    assert!(pipeline.aborted);
    assert_eq!(runner.started(), vec!["build"]);

    let messages = h.notifier.messages();
    assert_eq!(messages.len(), 3);
    assert_eq!(messages[1].text, "Pipeline for src/acme/api failed");
    assert!(messages[1].is_failure());
    assert_eq!(messages[2].text, "Redeploy of src/acme/api finished with errors");

    Ok(())
}

#[tokio::test]
async fn sync_failure_skips_the_pipeline() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    project_dir(root.path(), "src/acme/api")?;
    let runner = ScriptedRunner::new();
    let h = harness(
        config(root.path())
            .sync_command("false")
            .with_project(ProjectBuilder::new("src/acme/api").script("build").build())
            .build(),
        Arc::new(runner.clone()),
    )?;

    let report = with_timeout(h.coordinator.redeploy(&PushEvent::for_repository("acme/api"))).await;

    assert!(!report.success());
    let project = &report.projects[0];
    assert!(project.pipeline.is_none());
    assert!(
        project
            .error
            .as_deref()
            .is_some_and(|e| e.contains("sync command 'false' failed"))
    );
    assert!(runner.events().is_empty());

    let failures = h.notifier.failures();
    assert_eq!(failures.len(), 1);
    assert!(failures[0].attachments[0].text.contains("sync command"));
    assert_eq!(h.coordinator.state(), DeployState::Idle);

    Ok(())
}

#[tokio::test]
async fn missing_project_directory_is_reported() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    let runner = ScriptedRunner::new();
    let h = harness(
        config(root.path())
            .with_project(ProjectBuilder::new("src/acme/api").script("build").build())
            .build(),
        Arc::new(runner.clone()),
    )?;

    let report = with_timeout(h.coordinator.redeploy(&PushEvent::for_repository("acme/api"))).await;

    assert!(!report.success());
    assert!(
        report.projects[0]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("does not exist"))
    );
    assert!(runner.events().is_empty());
    assert_eq!(h.notifier.failures().len(), 1);

    Ok(())
}

#[tokio::test]
async fn empty_pipeline_sends_no_pipeline_message() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    project_dir(root.path(), "src/acme/docs")?;
    let h = harness(
        config(root.path())
            .with_project(ProjectBuilder::new("src/acme/docs").build())
            .build(),
        Arc::new(ScriptedRunner::new()),
    )?;

    let report = with_timeout(h.coordinator.redeploy(&PushEvent::for_repository("acme/docs"))).await;

    assert!(report.success());
    let texts: Vec<String> = h.notifier.messages().into_iter().map(|m| m.text).collect();
    assert_eq!(
        texts,
        vec!["Redeploying src/acme/docs...", "Redeploy of src/acme/docs finished"]
    );

    Ok(())
}

#[tokio::test]
async fn concurrent_events_never_interleave() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    project_dir(root.path(), "src/acme/api")?;
    project_dir(root.path(), "src/acme/web")?;
    let runner = ScriptedRunner::new().step_delay(Duration::from_millis(30));
    let h = harness(
        config(root.path())
            .with_project(
                ProjectBuilder::new("src/acme/api")
                    .script("api-1")
                    .script("api-2")
                    .build(),
            )
            .with_project(
                ProjectBuilder::new("src/acme/web")
                    .script("web-1")
                    .script("web-2")
                    .build(),
            )
            .build(),
        Arc::new(runner.clone()),
    )?;

    let api = PushEvent::for_repository("acme/api");
    let web = PushEvent::for_repository("acme/web");
    let (a, b) = with_timeout(async {
        tokio::join!(h.coordinator.redeploy(&api), h.coordinator.redeploy(&web))
    })
    .await;
    assert!(a.success() && b.success());

    let events = runner.events();
    assert_eq!(events.len(), 8);

    // Each pipeline's events form one contiguous block.
    fn prefix(event: &str) -> Option<&str> {
        event.split(':').nth(1).and_then(|cmd| cmd.split('-').next())
    }
    let first = prefix(&events[0]);
    assert!(events[..4].iter().all(|e| prefix(e) == first), "events: {events:?}");
    assert!(events[4..].iter().all(|e| prefix(e) != first), "events: {events:?}");

    Ok(())
}

#[tokio::test]
async fn restart_redeploys_every_project_in_order() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    project_dir(root.path(), "src/acme/api")?;
    project_dir(root.path(), "src/acme/web")?;
    let runner = ScriptedRunner::new();
    let h = harness(
        config(root.path())
            .with_project(ProjectBuilder::new("src/acme/api").script("api").build())
            .with_project(ProjectBuilder::new("src/acme/web").script("web").build())
            .build(),
        Arc::new(runner.clone()),
    )?;

    let report = with_timeout(h.coordinator.restart(&PushEvent::for_repository("ops"))).await;

    assert!(report.success());
    assert_eq!(report.projects.len(), 2);
    assert_eq!(runner.started(), vec!["api", "web"]);
    assert_eq!(h.notifier.messages().len(), 6);

    Ok(())
}

#[tokio::test]
async fn real_processes_end_to_end_and_restart_clears_them() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    let dir = project_dir(root.path(), "src/acme/api")?;

    let config = config(root.path())
        .with_project(
            ProjectBuilder::new("src/acme/api")
                .script("touch built")
                .background("sleep 30")
                .build(),
        )
        .build();
    let ctx = EngineContext::new(config, Arc::new(RecordingNotifier::new()))?;
    let registry = Arc::clone(&ctx.registry);
    let coordinator = Coordinator::new(Arc::new(ctx));

    let report = with_timeout(coordinator.redeploy(&PushEvent::for_repository("acme/api"))).await;
    assert!(report.success(), "report: {report:?}");
    assert!(dir.join("built").exists());
    assert_eq!(registry.len(), 1);
    let before = registry.pids();

    // Restart kills the old server before starting a new one.
    let report = with_timeout(coordinator.restart(&PushEvent::for_repository("acme/api"))).await;
    assert!(report.success());
    assert_eq!(registry.len(), 1);
    assert_ne!(registry.pids(), before);

    registry.clear_all().await;
    Ok(())
}

/// Records the coordinator's state each time a step starts.
#[derive(Default)]
struct StateRecorder {
    coordinator: OnceLock<Weak<Coordinator>>,
    seen: Mutex<Vec<(String, DeployState)>>,
}

impl StepRunner for StateRecorder {
    fn run<'a>(&'a self, spec: &'a ScriptSpec, _workdir: &'a Path) -> StepFuture<'a> {
        Box::pin(async move {
            if let Some(coordinator) = self.coordinator.get().and_then(Weak::upgrade) {
                self.seen
                    .lock()
                    .unwrap()
                    .push((spec.cmd.clone(), coordinator.state()));
            }
            ScriptOutcome::launched(spec)
        })
    }
}

#[tokio::test]
async fn restart_walks_each_project_through_the_deploy_states() -> TestResult {
    init_tracing();
    let root = tempdir()?;
    project_dir(root.path(), "src/acme/api")?;
    project_dir(root.path(), "src/acme/web")?;
    let recorder = Arc::new(StateRecorder::default());
    let h = harness(
        config(root.path())
            .with_project(ProjectBuilder::new("src/acme/api").script("api").build())
            .with_project(ProjectBuilder::new("src/acme/gone").script("gone").build())
            .with_project(ProjectBuilder::new("src/acme/web").script("web").build())
            .build(),
        recorder.clone(),
    )?;
    let _ = recorder.coordinator.set(Arc::downgrade(&h.coordinator));

    let report = with_timeout(h.coordinator.restart(&PushEvent::for_repository("ops"))).await;

    let projects: Vec<&str> = report.projects.iter().map(|p| p.project.as_str()).collect();
    assert_eq!(projects, vec!["src/acme/api", "src/acme/gone", "src/acme/web"]);
    assert!(report.projects[0].success());
    assert!(
        report.projects[1]
            .error
            .as_deref()
            .is_some_and(|e| e.contains("does not exist"))
    );
    assert!(report.projects[2].success());

    let seen = recorder.seen.lock().unwrap().clone();
    assert_eq!(
        seen,
        vec![
            ("api".to_string(), DeployState::Executing),
            ("web".to_string(), DeployState::Executing),
        ]
    );
    assert_eq!(h.coordinator.state(), DeployState::Idle);

    Ok(())
}
