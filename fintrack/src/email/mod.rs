//! Outgoing email: template rendering, delivery transports and the
//! background delivery queue.
//!
//! Auth workflows never talk to a transport directly. They render a
//! template and hand the message to an [`EmailQueue`], whose worker task
//! owns the [`EmailSender`] and retries failed deliveries.

pub mod queue;
pub mod smtp;
pub mod templates;

pub use queue::{EmailQueue, EmailWorker, RetryPolicy};
pub use smtp::{SmtpConfig, SmtpSender};
pub use templates::TemplateRenderer;

use async_trait::async_trait;
use log::{error, info};
use thiserror::Error;

/// Email errors
#[derive(Debug, Error)]
pub enum EmailError {
    /// Template missing or malformed
    #[error("Template error: {0}")]
    Template(String),

    /// Sender or recipient address rejected
    #[error("Invalid address: {0}")]
    Address(String),

    /// Message could not be assembled
    #[error("Message build error: {0}")]
    Build(String),

    /// Transport refused or failed the delivery
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Email result type
pub type EmailResult<T> = Result<T, EmailError>;

/// A rendered message waiting for delivery
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailMessage {
    pub to: String,
    pub subject: String,
    pub html: String,
}

impl EmailMessage {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, html: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            html: html.into(),
        }
    }
}

/// Delivery transport
#[async_trait]
pub trait EmailSender: Send + Sync {
    /// Deliver one HTML message
    async fn send(&self, to: &str, subject: &str, html: &str) -> EmailResult<()>;
}

/// Sender that only logs messages, for development without an SMTP relay
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSender;

#[async_trait]
impl EmailSender for LogSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> EmailResult<()> {
        info!("Email to {} ({}): {} bytes of HTML", to, subject, html.len());
        Ok(())
    }
}

/// Renders templates and hands the result to the delivery queue
#[derive(Clone)]
pub struct Mailer {
    templates: TemplateRenderer,
    queue: EmailQueue,
}

impl Mailer {
    pub fn new(templates: TemplateRenderer, queue: EmailQueue) -> Self {
        Self { templates, queue }
    }

    /// Render `template` and queue it for `to`. Rendering failures are logged
    /// and the message is dropped.
    pub fn send_template(&self, to: &str, subject: &str, template: &str, vars: &[(&str, &str)]) {
        match self.templates.render(template, vars) {
            Ok(html) => self.queue.enqueue(EmailMessage::new(to, subject, html)),
            Err(e) => error!("Email '{}' to {} not sent: {}", subject, to, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_log_sender_accepts_everything() {
        LogSender
            .send("ann@example.com", "Hello", "<p>hi</p>")
            .await
            .unwrap();
    }

    #[test]
    fn test_error_display() {
        let err = EmailError::Transport("connection refused".to_string());
        assert_eq!(err.to_string(), "Transport error: connection refused");
    }
}
