// src/notify/message.rs

//! Chat message model (Slack incoming-webhook shape) and the builders the
//! coordinator uses for each deployment state.

use serde::Serialize;

use crate::event::PushEvent;
use crate::exec::ScriptOutcome;
use crate::pipeline::PipelineResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub channel: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub attachments: Vec<Attachment>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Color {
    Good,
    Danger,
}

impl Color {
    pub fn from_success(success: bool) -> Self {
        if success { Color::Good } else { Color::Danger }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Attachment {
    pub fallback: String,
    pub color: Color,
    pub title: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title_link: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Field {
    pub title: String,
    pub value: String,
    pub short: bool,
}

impl Message {
    /// Any attachment marked as a failure.
    pub fn is_failure(&self) -> bool {
        self.attachments.iter().any(|a| a.color == Color::Danger)
    }
}

/// Builds messages about one push event.
#[derive(Debug, Clone)]
pub struct MessageBuilder {
    channel: String,
    title: String,
    title_link: String,
    commit_message: String,
}

impl MessageBuilder {
    pub fn new(channel: impl Into<String>, event: &PushEvent) -> Self {
        let repo = match event.repository_name() {
            "" => "unknown repository",
            name => name,
        };
        Self {
            channel: channel.into(),
            title: format!("{} pushed to {}", event.pusher(), repo),
            title_link: event.link().to_string(),
            commit_message: event.commit_message().to_string(),
        }
    }

    fn commit_fields(&self) -> Vec<Field> {
        if self.commit_message.is_empty() {
            return Vec::new();
        }
        vec![Field {
            title: "Message".to_string(),
            value: self.commit_message.clone(),
            short: true,
        }]
    }

    fn headline(&self, success: bool, text: String) -> Attachment {
        Attachment {
            fallback: if success { "Build succeeded" } else { "Build failed" }.to_string(),
            color: Color::from_success(success),
            title: self.title.clone(),
            title_link: self.title_link.clone(),
            text,
            fields: self.commit_fields(),
        }
    }

    /// A deployment could not proceed (unknown repo, missing directory,
    /// sync failure).
    pub fn failure(&self, detail: impl Into<String>) -> Message {
        Message {
            channel: self.channel.clone(),
            text: String::new(),
            attachments: vec![self.headline(false, detail.into())],
        }
    }

    pub fn starting(&self, project: &str) -> Message {
        Message {
            channel: self.channel.clone(),
            text: format!("Redeploying {project}..."),
            attachments: Vec::new(),
        }
    }

    /// Summary of a pipeline run: a headline with the aggregated log,
    /// followed by one attachment per attempted step.
    pub fn pipeline(&self, project: &str, result: &PipelineResult, total: usize) -> Message {
        let mut attachments = Vec::with_capacity(result.attempted() + 1);

        let mut headline = self.headline(result.success, result.log.clone());
        headline.fields.push(Field {
            title: "Steps".to_string(),
            value: format!("{}/{}", result.attempted(), total),
            short: true,
        });
        attachments.push(headline);

        attachments.extend(
            result
                .outcomes
                .iter()
                .enumerate()
                .map(|(idx, outcome)| step_attachment(idx + 1, outcome)),
        );

        let verdict = if result.success { "succeeded" } else { "failed" };
        Message {
            channel: self.channel.clone(),
            text: format!("Pipeline for {project} {verdict}"),
            attachments,
        }
    }

    pub fn finished(&self, project: &str, success: bool) -> Message {
        let verdict = if success { "finished" } else { "finished with errors" };
        Message {
            channel: self.channel.clone(),
            text: format!("Redeploy of {project} {verdict}"),
            attachments: Vec::new(),
        }
    }
}

fn step_attachment(step: usize, outcome: &ScriptOutcome) -> Attachment {
    let status = match (outcome.success, outcome.waited) {
        (true, true) => "ok".to_string(),
        (true, false) => "launched".to_string(),
        (false, _) => match outcome.exit_code {
            Some(code) => format!("exit code {code}"),
            None => "failed".to_string(),
        },
    };

    Attachment {
        fallback: format!("{}: {status}", outcome.command),
        color: Color::from_success(outcome.success),
        title: format!("#{step} {}", outcome.command),
        title_link: String::new(),
        text: outcome.log_text(),
        fields: vec![Field {
            title: "Status".to_string(),
            value: status,
            short: true,
        }],
    }
}
