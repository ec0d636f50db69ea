// src/notify/slack.rs

use reqwest::Client;
use tracing::debug;

use crate::errors::{HookdeployError, Result};
use crate::notify::message::Message;
use crate::notify::{NotifyFuture, Notifier};

/// Posts messages to a Slack-compatible incoming webhook as a form-encoded
/// `payload=<json>` body.
#[derive(Debug, Clone)]
pub struct SlackNotifier {
    url: String,
    client: Client,
}

impl SlackNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_client(url, Client::new())
    }

    pub fn with_client(url: impl Into<String>, client: Client) -> Self {
        Self {
            url: url.into(),
            client,
        }
    }

    async fn post(&self, message: &Message) -> Result<()> {
        let payload = serde_json::to_string(message)?;

        let response = self
            .client
            .post(&self.url)
            .form(&[("payload", payload.as_str())])
            .send()
            .await
            .map_err(|e| HookdeployError::Notify(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(HookdeployError::Notify(format!(
                "webhook returned {status}: {body}"
            )));
        }

        debug!(status = %status, "notification delivered");
        Ok(())
    }
}

impl Notifier for SlackNotifier {
    fn notify<'a>(&'a self, message: &'a Message) -> NotifyFuture<'a> {
        Box::pin(self.post(message))
    }
}
