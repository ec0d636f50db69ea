// src/notify/mod.rs

//! Chat notifications.
//!
//! The coordinator talks to a [`Notifier`]; [`SlackNotifier`] delivers to an
//! incoming webhook and [`LogNotifier`] just logs (used when no webhook URL
//! is configured).

pub mod message;
pub mod slack;

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tracing::{info, warn};

use crate::config::NotifySection;
use crate::errors::Result;

pub use message::{Attachment, Color, Field, Message, MessageBuilder};
pub use slack::SlackNotifier;

/// Boxed future returned by [`Notifier::notify`].
pub type NotifyFuture<'a> = Pin<Box<dyn Future<Output = Result<()>> + Send + 'a>>;

/// Delivery of chat messages.
pub trait Notifier: Send + Sync {
    fn notify<'a>(&'a self, message: &'a Message) -> NotifyFuture<'a>;
}

/// Writes messages to the log instead of a chat service.
#[derive(Debug, Clone, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify<'a>(&'a self, message: &'a Message) -> NotifyFuture<'a> {
        Box::pin(async move {
            for attachment in &message.attachments {
                if attachment.color == Color::Danger {
                    warn!(channel = %message.channel, title = %attachment.title, "{}", attachment.text);
                } else {
                    info!(channel = %message.channel, title = %attachment.title, "{}", attachment.text);
                }
            }
            if !message.text.is_empty() {
                info!(channel = %message.channel, "{}", message.text);
            }
            Ok(())
        })
    }
}

/// Pick the notifier for the `[notify]` section.
pub fn from_config(section: &NotifySection) -> Arc<dyn Notifier> {
    match &section.url {
        Some(url) if !url.trim().is_empty() => Arc::new(SlackNotifier::new(url.clone())),
        _ => {
            info!("no [notify].url configured; notifications go to the log");
            Arc::new(LogNotifier)
        }
    }
}
