//! SMTP delivery through lettre.

use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{Mailbox, header::ContentType},
    transport::smtp::authentication::Credentials,
};

use super::{EmailError, EmailResult, EmailSender};

/// SMTP relay settings
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: Option<String>,
    pub password: Option<String>,
    /// Sender mailbox, e.g. `FinTrack <no-reply@fintrack.app>`
    pub from: String,
    /// Upgrade the connection with STARTTLS
    pub starttls: bool,
}

/// Sender delivering through an SMTP relay
#[derive(Clone)]
pub struct SmtpSender {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpSender {
    /// Build a sender; no connection is opened until the first delivery
    ///
    /// # Errors
    ///
    /// * `EmailError::Address` - `from` is not a valid mailbox
    /// * `EmailError::Transport` - TLS parameters could not be set up
    pub fn new(config: &SmtpConfig) -> EmailResult<Self> {
        let from: Mailbox = config
            .from
            .parse()
            .map_err(|e| EmailError::Address(format!("{}: {e}", config.from)))?;

        let mut builder = if config.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
                .map_err(|e| EmailError::Transport(e.to_string()))?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&config.host)
        };
        builder = builder.port(config.port);

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            transport: builder.build(),
            from,
        })
    }
}

#[async_trait]
impl EmailSender for SmtpSender {
    async fn send(&self, to: &str, subject: &str, html: &str) -> EmailResult<()> {
        let to: Mailbox = to
            .parse()
            .map_err(|e| EmailError::Address(format!("{to}: {e}")))?;

        let message = Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html.to_string())
            .map_err(|e| EmailError::Build(e.to_string()))?;

        self.transport
            .send(message)
            .await
            .map_err(|e| EmailError::Transport(e.to_string()))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(from: &str) -> SmtpConfig {
        SmtpConfig {
            host: "localhost".to_string(),
            port: 1025,
            username: None,
            password: None,
            from: from.to_string(),
            starttls: false,
        }
    }

    #[test]
    fn test_new_accepts_named_mailbox() {
        assert!(SmtpSender::new(&config("FinTrack <no-reply@fintrack.app>")).is_ok());
    }

    #[test]
    fn test_new_rejects_bad_sender() {
        assert!(matches!(
            SmtpSender::new(&config("not an address")),
            Err(EmailError::Address(_))
        ));
    }

    #[tokio::test]
    async fn test_send_rejects_bad_recipient() {
        let sender = SmtpSender::new(&config("no-reply@fintrack.app")).unwrap();
        let result = sender.send("nope", "subject", "<p></p>").await;
        assert!(matches!(result, Err(EmailError::Address(_))));
    }
}
