// src/event.rs

//! Inbound push-event payload (the subset of a GitHub push webhook we use).

use serde::Deserialize;

use crate::errors::Result;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PushEvent {
    #[serde(default)]
    pub repository: Repository,

    #[serde(default)]
    pub head_commit: Option<HeadCommit>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Repository {
    /// `owner/name`; matched against configured project paths.
    #[serde(default)]
    pub full_name: String,

    #[serde(default)]
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct HeadCommit {
    #[serde(default)]
    pub timestamp: String,

    #[serde(default)]
    pub url: String,

    #[serde(default)]
    pub message: String,

    #[serde(default)]
    pub author: Option<Person>,

    #[serde(default)]
    pub committer: Option<Person>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Person {
    #[serde(default)]
    pub name: String,
}

impl PushEvent {
    /// Build an event for `repository` with no head commit.
    pub fn for_repository(repository: impl Into<String>) -> Self {
        Self {
            repository: Repository {
                full_name: repository.into(),
                url: String::new(),
            },
            head_commit: None,
        }
    }

    /// Parse a webhook body.
    ///
    /// Accepts a raw JSON document or a form-encoded body carrying the JSON
    /// in a `payload` field.
    pub fn from_body(body: &[u8]) -> Result<Self> {
        let looks_like_json = body
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            .is_some_and(|b| *b == b'{');
        if looks_like_json {
            return Ok(serde_json::from_slice(body)?);
        }

        let form_payload = url::form_urlencoded::parse(body)
            .find(|(key, _)| key == "payload")
            .map(|(_, value)| value.into_owned());

        match form_payload {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(serde_json::from_slice(body)?),
        }
    }

    pub fn repository_name(&self) -> &str {
        &self.repository.full_name
    }

    /// Who pushed: head-commit author, falling back to the committer.
    pub fn pusher(&self) -> &str {
        let Some(commit) = &self.head_commit else {
            return "someone";
        };

        commit
            .author
            .as_ref()
            .or(commit.committer.as_ref())
            .map(|p| p.name.as_str())
            .filter(|name| !name.is_empty())
            .unwrap_or("someone")
    }

    pub fn commit_message(&self) -> &str {
        self.head_commit
            .as_ref()
            .map(|c| c.message.as_str())
            .unwrap_or_default()
    }

    /// Head-commit URL, falling back to the repository URL.
    pub fn link(&self) -> &str {
        match &self.head_commit {
            Some(commit) if !commit.url.is_empty() => &commit.url,
            _ => &self.repository.url,
        }
    }
}
