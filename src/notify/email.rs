// src/notify/email.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use super::{ChannelOutcome, NotificationChannel, NotificationMessage, SkipCause};
use crate::core::config_manager::NotificationConfig;
use crate::types::UserProfile;

#[derive(Clone)]
struct SmtpCredentials {
    user: String,
    pass: String,
}

/// SMTP over implicit TLS, authenticated as the sender.
pub struct EmailChannel {
    credentials: Option<SmtpCredentials>,
    host: String,
    port: u16,
}

impl EmailChannel {
    pub fn from_config(config: &NotificationConfig) -> Self {
        let credentials = match (&config.smtp_user, &config.smtp_pass) {
            (Some(user), Some(pass)) => Some(SmtpCredentials {
                user: user.clone(),
                pass: pass.clone(),
            }),
            _ => None,
        };

        Self {
            credentials,
            host: config.smtp_host.clone(),
            port: config.smtp_port,
        }
    }

    fn build_message(from: &str, to: &str, message: &NotificationMessage) -> Result<Message> {
        Message::builder()
            .from(from.parse::<Mailbox>().context("Invalid sender address")?)
            .to(to.parse::<Mailbox>().context("Invalid recipient address")?)
            .subject(message.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(message.body.clone())
            .context("Failed to build email")
    }

    async fn deliver(
        &self,
        credentials: &SmtpCredentials,
        to: &str,
        message: &NotificationMessage,
    ) -> Result<()> {
        let email = Self::build_message(&credentials.user, to, message)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
            .context("Failed to configure SMTP relay")?
            .port(self.port)
            .credentials(Credentials::new(
                credentials.user.clone(),
                credentials.pass.clone(),
            ))
            .build();

        mailer.send(email).await.context("SMTP send failed")?;
        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for EmailChannel {
    fn name(&self) -> &'static str {
        "email"
    }

    async fn send(&self, user: &UserProfile, message: &NotificationMessage) -> ChannelOutcome {
        let Some(credentials) = &self.credentials else {
            return ChannelOutcome::Skipped(SkipCause::MissingCredentials);
        };

        match self.deliver(credentials, &user.email, message).await {
            Ok(()) => ChannelOutcome::Sent,
            Err(e) => ChannelOutcome::Failed(format!("{e:#}")),
        }
    }
}
