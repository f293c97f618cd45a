// src/notify/mod.rs
//! Best-effort delivery of the per-user run summary.
//!
//! Every channel is attempted independently and the dispatcher never fails;
//! the returned [`DispatchReport`] exists so callers and tests can see why a
//! channel was skipped.

pub mod email;
pub mod telegram;

pub use email::EmailChannel;
pub use telegram::TelegramChannel;

use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::core::config_manager::NotificationConfig;
use crate::types::UserProfile;

pub const REPORT_SUBJECT: &str = "DevApply Report";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NotificationMessage {
    pub subject: String,
    pub body: String,
}

impl NotificationMessage {
    pub fn run_summary(new_jobs: usize) -> Self {
        Self {
            subject: REPORT_SUBJECT.to_string(),
            body: format!("New saved jobs today: {}", new_jobs),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SkipCause {
    MissingCredentials,
    MissingChatId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ChannelOutcome {
    Sent,
    Skipped(SkipCause),
    Failed(String),
}

#[async_trait]
pub trait NotificationChannel: Send + Sync {
    fn name(&self) -> &'static str;

    async fn send(&self, user: &UserProfile, message: &NotificationMessage) -> ChannelOutcome;
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DispatchReport {
    pub outcomes: Vec<(&'static str, ChannelOutcome)>,
}

impl DispatchReport {
    pub fn outcome(&self, channel: &str) -> Option<&ChannelOutcome> {
        self.outcomes
            .iter()
            .find(|(name, _)| *name == channel)
            .map(|(_, outcome)| outcome)
    }
}

#[derive(Clone)]
pub struct NotificationDispatcher {
    channels: Vec<Arc<dyn NotificationChannel>>,
}

impl NotificationDispatcher {
    pub fn new(channels: Vec<Arc<dyn NotificationChannel>>) -> Self {
        Self { channels }
    }

    /// Email first, then Telegram
    pub fn from_config(config: &NotificationConfig, client: Client) -> Self {
        Self::new(vec![
            Arc::new(EmailChannel::from_config(config)),
            Arc::new(TelegramChannel::from_config(config, client)),
        ])
    }

    pub async fn notify(&self, user: &UserProfile, new_jobs: usize) -> DispatchReport {
        let message = NotificationMessage::run_summary(new_jobs);
        let mut report = DispatchReport::default();

        for channel in &self.channels {
            let outcome = channel.send(user, &message).await;
            match &outcome {
                ChannelOutcome::Sent => {
                    info!(user_id = user.id, channel = channel.name(), new_jobs, "Notification sent")
                }
                ChannelOutcome::Skipped(cause) => {
                    debug!(user_id = user.id, channel = channel.name(), ?cause, "Notification skipped")
                }
                ChannelOutcome::Failed(error) => {
                    warn!(user_id = user.id, channel = channel.name(), %error, "Notification failed")
                }
            }
            report.outcomes.push((channel.name(), outcome));
        }

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserPreference;
    use std::sync::Mutex;

    struct Recording {
        name: &'static str,
        outcome: ChannelOutcome,
        seen: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl NotificationChannel for Recording {
        fn name(&self) -> &'static str {
            self.name
        }

        async fn send(&self, _user: &UserProfile, message: &NotificationMessage) -> ChannelOutcome {
            self.seen.lock().unwrap().push(message.body.clone());
            self.outcome.clone()
        }
    }

    fn user() -> UserProfile {
        UserProfile {
            id: 1,
            name: "Dev".into(),
            email: "dev@example.com".into(),
            telegram_chat_id: None,
            preference: UserPreference::default(),
        }
    }

    #[test]
    fn summary_message_format() {
        let message = NotificationMessage::run_summary(5);
        assert_eq!(message.subject, "DevApply Report");
        assert_eq!(message.body, "New saved jobs today: 5");
    }

    #[tokio::test]
    async fn failing_channel_does_not_block_the_next() {
        let failing = Arc::new(Recording {
            name: "email",
            outcome: ChannelOutcome::Failed("smtp down".into()),
            seen: Mutex::new(Vec::new()),
        });
        let working = Arc::new(Recording {
            name: "telegram",
            outcome: ChannelOutcome::Sent,
            seen: Mutex::new(Vec::new()),
        });
        let dispatcher = NotificationDispatcher::new(vec![
            failing.clone() as Arc<dyn NotificationChannel>,
            working.clone() as Arc<dyn NotificationChannel>,
        ]);

        let report = dispatcher.notify(&user(), 3).await;

        assert_eq!(
            report.outcome("email"),
            Some(&ChannelOutcome::Failed("smtp down".into()))
        );
        assert_eq!(report.outcome("telegram"), Some(&ChannelOutcome::Sent));
        assert_eq!(*working.seen.lock().unwrap(), vec!["New saved jobs today: 3"]);
    }

    #[tokio::test]
    async fn unconfigured_dispatcher_skips_both_channels() {
        let config = NotificationConfig {
            smtp_user: None,
            smtp_pass: None,
            smtp_host: "smtp.gmail.com".into(),
            smtp_port: 465,
            telegram_bot_token: None,
            telegram_api_base: "https://api.telegram.org".into(),
        };
        let dispatcher = NotificationDispatcher::from_config(&config, Client::new());

        let report = dispatcher.notify(&user(), 0).await;

        assert_eq!(
            report.outcome("email"),
            Some(&ChannelOutcome::Skipped(SkipCause::MissingCredentials))
        );
        assert_eq!(
            report.outcome("telegram"),
            Some(&ChannelOutcome::Skipped(SkipCause::MissingCredentials))
        );
    }

    #[tokio::test]
    async fn telegram_is_sent_when_email_is_not_configured() {
        use serde_json::json;
        use wiremock::matchers::{body_json, method, path};
        use wiremock::{Mock, MockServer, ResponseTemplate};

        let telegram = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .and(body_json(json!({
                "chat_id": "4242",
                "text": "New saved jobs today: 2",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&telegram)
            .await;

        let config = NotificationConfig {
            smtp_user: None,
            smtp_pass: None,
            smtp_host: "smtp.gmail.com".into(),
            smtp_port: 465,
            telegram_bot_token: Some("test-token".into()),
            telegram_api_base: telegram.uri(),
        };
        let dispatcher = NotificationDispatcher::from_config(&config, Client::new());
        let subscriber = UserProfile {
            telegram_chat_id: Some("4242".into()),
            ..user()
        };

        let report = dispatcher.notify(&subscriber, 2).await;

        assert_eq!(
            report.outcome("email"),
            Some(&ChannelOutcome::Skipped(SkipCause::MissingCredentials))
        );
        assert_eq!(report.outcome("telegram"), Some(&ChannelOutcome::Sent));
    }
}
