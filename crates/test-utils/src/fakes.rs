use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use hookdeploy::config::ScriptSpec;
use hookdeploy::exec::{ScriptOutcome, StepFuture, StepRunner};
use hookdeploy::notify::{Message, Notifier, NotifyFuture};

/// A notifier that records every message it is asked to deliver.
#[derive(Debug, Clone, Default)]
pub struct RecordingNotifier {
    messages: Arc<Mutex<Vec<Message>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.messages.lock().unwrap().clone()
    }

    pub fn failures(&self) -> Vec<Message> {
        self.messages()
            .into_iter()
            .filter(Message::is_failure)
            .collect()
    }
}

impl Notifier for RecordingNotifier {
    fn notify<'a>(&'a self, message: &'a Message) -> NotifyFuture<'a> {
        let messages = Arc::clone(&self.messages);
        Box::pin(async move {
            messages.lock().unwrap().push(message.clone());
            Ok(())
        })
    }
}

/// A fake step runner that:
/// - records `start:<cmd>` / `end:<cmd>` events in order
/// - sleeps for `step_delay` between them
/// - fails the commands listed in `failing`, succeeds everything else.
#[derive(Debug, Clone, Default)]
pub struct ScriptedRunner {
    events: Arc<Mutex<Vec<String>>>,
    failing: HashSet<String>,
    step_delay: Duration,
}

impl ScriptedRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing(mut self, cmd: &str) -> Self {
        self.failing.insert(cmd.to_string());
        self
    }

    pub fn step_delay(mut self, delay: Duration) -> Self {
        self.step_delay = delay;
        self
    }

    pub fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    /// Commands in the order they were started.
    pub fn started(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| e.strip_prefix("start:").map(str::to_string))
            .collect()
    }
}

impl StepRunner for ScriptedRunner {
    fn run<'a>(&'a self, spec: &'a ScriptSpec, _workdir: &'a Path) -> StepFuture<'a> {
        Box::pin(async move {
            self.events.lock().unwrap().push(format!("start:{}", spec.cmd));
            if !self.step_delay.is_zero() {
                tokio::time::sleep(self.step_delay).await;
            }
            self.events.lock().unwrap().push(format!("end:{}", spec.cmd));

            if self.failing.contains(&spec.cmd) {
                ScriptOutcome::launch_failed(spec, format!("{} failed", spec.cmd))
            } else if spec.wait {
                ScriptOutcome {
                    command: spec.cmd.clone(),
                    waited: true,
                    success: true,
                    exit_code: Some(0),
                    output: format!("ran {}", spec.cmd),
                    error: None,
                }
            } else {
                ScriptOutcome::launched(spec)
            }
        })
    }
}
