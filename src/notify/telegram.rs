// src/notify/telegram.rs
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;

use super::{ChannelOutcome, NotificationChannel, NotificationMessage, SkipCause};
use crate::core::config_manager::NotificationConfig;
use crate::types::UserProfile;
use crate::utils::normalize_base_url;

/// Bot API `sendMessage` to the user's chat.
pub struct TelegramChannel {
    client: Client,
    api_base: String,
    bot_token: Option<String>,
}

impl TelegramChannel {
    pub fn from_config(config: &NotificationConfig, client: Client) -> Self {
        Self {
            client,
            api_base: normalize_base_url(&config.telegram_api_base),
            bot_token: config.telegram_bot_token.clone(),
        }
    }

    async fn post(&self, token: &str, chat_id: &str, text: &str) -> Result<()> {
        let url = format!("{}/bot{}/sendMessage", self.api_base, token);
        let payload = serde_json::json!({
            "chat_id": chat_id,
            "text": text,
        });

        let response = self
            .client
            .post(&url)
            .json(&payload)
            .send()
            .await
            .context("Failed to call Telegram API")?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            anyhow::bail!("Telegram API returned {}: {}", status, error_text);
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationChannel for TelegramChannel {
    fn name(&self) -> &'static str {
        "telegram"
    }

    async fn send(&self, user: &UserProfile, message: &NotificationMessage) -> ChannelOutcome {
        let Some(token) = &self.bot_token else {
            return ChannelOutcome::Skipped(SkipCause::MissingCredentials);
        };
        let Some(chat_id) = &user.telegram_chat_id else {
            return ChannelOutcome::Skipped(SkipCause::MissingChatId);
        };

        match self.post(token, chat_id, &message.body).await {
            Ok(()) => ChannelOutcome::Sent,
            Err(e) => ChannelOutcome::Failed(format!("{e:#}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UserPreference;
    use serde_json::json;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config(token: Option<&str>, api_base: &str) -> NotificationConfig {
        NotificationConfig {
            smtp_user: None,
            smtp_pass: None,
            smtp_host: "smtp.gmail.com".into(),
            smtp_port: 465,
            telegram_bot_token: token.map(str::to_string),
            telegram_api_base: api_base.into(),
        }
    }

    fn user(chat_id: Option<&str>) -> UserProfile {
        UserProfile {
            id: 3,
            name: "Arjun".into(),
            email: "arjun@example.com".into(),
            telegram_chat_id: chat_id.map(str::to_string),
            preference: UserPreference::default(),
        }
    }

    #[tokio::test]
    async fn posts_summary_to_chat() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bottest-token/sendMessage"))
            .and(body_json(json!({
                "chat_id": "424242",
                "text": "New saved jobs today: 5",
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .expect(1)
            .mount(&server)
            .await;

        let channel =
            TelegramChannel::from_config(&config(Some("test-token"), &server.uri()), Client::new());
        let outcome = channel
            .send(&user(Some("424242")), &NotificationMessage::run_summary(5))
            .await;

        assert_eq!(outcome, ChannelOutcome::Sent);
    }

    #[tokio::test]
    async fn skip_reasons_are_distinguished() {
        let message = NotificationMessage::run_summary(0);

        let no_token = TelegramChannel::from_config(&config(None, "http://unused"), Client::new());
        assert_eq!(
            no_token.send(&user(Some("1")), &message).await,
            ChannelOutcome::Skipped(SkipCause::MissingCredentials)
        );

        let no_chat =
            TelegramChannel::from_config(&config(Some("t"), "http://unused"), Client::new());
        assert_eq!(
            no_chat.send(&user(None), &message).await,
            ChannelOutcome::Skipped(SkipCause::MissingChatId)
        );
    }

    #[tokio::test]
    async fn api_error_is_reported_not_raised() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(403).set_body_string("bot was blocked by the user"))
            .mount(&server)
            .await;

        let channel =
            TelegramChannel::from_config(&config(Some("test-token"), &server.uri()), Client::new());
        let outcome = channel
            .send(&user(Some("9")), &NotificationMessage::run_summary(1))
            .await;

        match outcome {
            ChannelOutcome::Failed(reason) => assert!(reason.contains("403")),
            other => panic!("expected failure, got {other:?}"),
        }
    }
}
