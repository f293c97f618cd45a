// src/core/config_manager.rs
//! Process configuration: optional `config.yaml` sections overlaid by environment variables

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::orchestrator::FailurePolicy;

pub const DEFAULT_SCHEDULE: &str = "0 0 8 * * *";
pub const DEFAULT_PORT: u16 = 8000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";
pub const DEFAULT_SMTP_HOST: &str = "smtp.gmail.com";
pub const DEFAULT_SMTP_PORT: u16 = 465;
pub const DEFAULT_TELEGRAM_API: &str = "https://api.telegram.org";

#[derive(Debug, Clone)]
pub struct ConfigManager {
    pub environment: EnvironmentConfig,
    pub scraping: ScrapingConfig,
    pub schedule: ScheduleConfig,
    pub notifications: NotificationConfig,
}

#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    pub name: String,
    pub database_path: PathBuf,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct ScrapingConfig {
    pub request_timeout_secs: u64,
    pub user_agent: String,
    pub failure_policy: FailurePolicy,
}

#[derive(Debug, Clone)]
pub struct ScheduleConfig {
    pub cron: String,
    pub autostart: bool,
}

/// Notification credentials. Missing values disable a channel, they are not errors.
#[derive(Clone)]
pub struct NotificationConfig {
    pub smtp_user: Option<String>,
    pub smtp_pass: Option<String>,
    pub smtp_host: String,
    pub smtp_port: u16,
    pub telegram_bot_token: Option<String>,
    pub telegram_api_base: String,
}

impl std::fmt::Debug for NotificationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationConfig")
            .field("smtp_user", &self.smtp_user)
            .field("smtp_pass", &self.smtp_pass.as_ref().map(|_| "***"))
            .field("smtp_host", &self.smtp_host)
            .field("smtp_port", &self.smtp_port)
            .field(
                "telegram_bot_token",
                &self.telegram_bot_token.as_ref().map(|_| "***"),
            )
            .field("telegram_api_base", &self.telegram_api_base)
            .finish()
    }
}

/// One environment section of `config.yaml`. Secrets are intentionally absent.
#[derive(Debug, Default, Deserialize)]
struct FileSection {
    database_path: Option<PathBuf>,
    port: Option<u16>,
    schedule: Option<String>,
    autostart_scheduler: Option<bool>,
    failure_policy: Option<FailurePolicy>,
    request_timeout_secs: Option<u64>,
    user_agent: Option<String>,
    smtp_host: Option<String>,
    smtp_port: Option<u16>,
    telegram_api_base: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ConfigFile {
    #[serde(default)]
    local: FileSection,
    #[serde(default)]
    production: FileSection,
}

impl ConfigManager {
    /// Load `config.yaml` if present, then environment overrides.
    ///
    /// `.env` is read by the binaries before this runs.
    pub fn load() -> Result<Self> {
        let environment = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "local".to_string());
        info!("Loading configuration for environment: {}", environment);

        let config_path = PathBuf::from("config.yaml");
        let yaml = if config_path.exists() {
            Some(std::fs::read_to_string(&config_path).context("Failed to read config.yaml")?)
        } else {
            None
        };

        let base_dir = if environment == "production" {
            PathBuf::from("/app")
        } else {
            std::env::current_dir().context("Failed to get current directory")?
        };

        Self::from_sources(&environment, yaml.as_deref(), &base_dir, |key| {
            std::env::var(key).ok()
        })
    }

    /// Build configuration from explicit sources
    pub fn from_sources<F>(
        environment: &str,
        yaml: Option<&str>,
        base_dir: &Path,
        lookup: F,
    ) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file: ConfigFile = match yaml {
            Some(content) => serde_yaml::from_str(content).context("Failed to parse config.yaml")?,
            None => ConfigFile::default(),
        };

        let section = match environment {
            "production" => file.production,
            _ => file.local,
        };

        let lookup = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        let database_path = lookup("DEVAPPLY_DATABASE_PATH")
            .map(PathBuf::from)
            .or(section.database_path)
            .unwrap_or_else(|| PathBuf::from("devapply.db"));

        let port = match lookup("ROCKET_PORT") {
            Some(raw) => raw
                .parse::<u16>()
                .map_err(|_| anyhow::anyhow!("ROCKET_PORT must be a valid port number"))?,
            None => section.port.unwrap_or(DEFAULT_PORT),
        };

        let failure_policy = match lookup("DEVAPPLY_FAILURE_POLICY") {
            Some(raw) => raw.parse::<FailurePolicy>()?,
            None => section.failure_policy.unwrap_or_default(),
        };

        let request_timeout_secs = match lookup("DEVAPPLY_REQUEST_TIMEOUT_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .context("DEVAPPLY_REQUEST_TIMEOUT_SECS must be a number of seconds")?,
            None => section
                .request_timeout_secs
                .unwrap_or(DEFAULT_REQUEST_TIMEOUT_SECS),
        };

        let smtp_port = match lookup("SMTP_PORT") {
            Some(raw) => raw.parse::<u16>().context("SMTP_PORT must be a valid port")?,
            None => section.smtp_port.unwrap_or(DEFAULT_SMTP_PORT),
        };

        Ok(Self {
            environment: EnvironmentConfig {
                name: environment.to_string(),
                database_path: resolve_path(base_dir, database_path),
                port,
            },
            scraping: ScrapingConfig {
                request_timeout_secs,
                user_agent: section
                    .user_agent
                    .unwrap_or_else(|| DEFAULT_USER_AGENT.to_string()),
                failure_policy,
            },
            schedule: ScheduleConfig {
                cron: lookup("DEVAPPLY_SCHEDULE")
                    .or(section.schedule)
                    .unwrap_or_else(|| DEFAULT_SCHEDULE.to_string()),
                autostart: section.autostart_scheduler.unwrap_or(true),
            },
            notifications: NotificationConfig {
                smtp_user: lookup("SMTP_USER"),
                smtp_pass: lookup("SMTP_PASS"),
                smtp_host: lookup("SMTP_HOST")
                    .or(section.smtp_host)
                    .unwrap_or_else(|| DEFAULT_SMTP_HOST.to_string()),
                smtp_port,
                telegram_bot_token: lookup("TELEGRAM_BOT_TOKEN"),
                telegram_api_base: lookup("TELEGRAM_API_BASE")
                    .or(section.telegram_api_base)
                    .unwrap_or_else(|| DEFAULT_TELEGRAM_API.to_string()),
            },
        })
    }

    /// Ensure the database directory exists
    pub async fn ensure_directories(&self) -> Result<()> {
        if let Some(db_parent) = self.environment.database_path.parent() {
            tokio::fs::create_dir_all(db_parent).await.with_context(|| {
                format!("Failed to create database directory: {}", db_parent.display())
            })?;
        }
        Ok(())
    }
}

fn resolve_path(base_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        base_dir.join(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let vars = env(&[]);
        let config =
            ConfigManager::from_sources("local", None, Path::new("/srv"), |k| vars.get(k).cloned())
                .unwrap();

        assert_eq!(config.environment.database_path, PathBuf::from("/srv/devapply.db"));
        assert_eq!(config.environment.port, DEFAULT_PORT);
        assert_eq!(config.schedule.cron, DEFAULT_SCHEDULE);
        assert!(config.schedule.autostart);
        assert_eq!(config.scraping.failure_policy, FailurePolicy::IsolatePlatform);
        assert_eq!(config.scraping.request_timeout_secs, 10);
        assert!(config.notifications.smtp_user.is_none());
        assert!(config.notifications.telegram_bot_token.is_none());
        assert_eq!(config.notifications.smtp_port, 465);
    }

    #[test]
    fn yaml_section_is_selected_by_environment() {
        let yaml = r#"
local:
  database_path: data/local.db
  schedule: "0 30 7 * * *"
production:
  database_path: /var/lib/devapply/prod.db
  failure_policy: abort_user
  autostart_scheduler: false
"#;
        let vars = env(&[]);
        let lookup = |k: &str| vars.get(k).cloned();

        let local = ConfigManager::from_sources("local", Some(yaml), Path::new("/srv"), lookup)
            .unwrap();
        assert_eq!(local.environment.database_path, PathBuf::from("/srv/data/local.db"));
        assert_eq!(local.schedule.cron, "0 30 7 * * *");

        let prod =
            ConfigManager::from_sources("production", Some(yaml), Path::new("/app"), lookup)
                .unwrap();
        assert_eq!(
            prod.environment.database_path,
            PathBuf::from("/var/lib/devapply/prod.db")
        );
        assert_eq!(prod.scraping.failure_policy, FailurePolicy::AbortUser);
        assert!(!prod.schedule.autostart);
    }

    #[test]
    fn env_overrides_file_and_blank_secrets_are_absent() {
        let yaml = "local:\n  port: 9000\n";
        let vars = env(&[
            ("ROCKET_PORT", "8123"),
            ("SMTP_USER", "bot@example.com"),
            ("SMTP_PASS", "  "),
            ("TELEGRAM_BOT_TOKEN", "123:abc"),
            ("DEVAPPLY_FAILURE_POLICY", "abort-user"),
        ]);
        let config = ConfigManager::from_sources("local", Some(yaml), Path::new("/srv"), |k| {
            vars.get(k).cloned()
        })
        .unwrap();

        assert_eq!(config.environment.port, 8123);
        assert_eq!(config.notifications.smtp_user.as_deref(), Some("bot@example.com"));
        assert!(config.notifications.smtp_pass.is_none());
        assert_eq!(config.notifications.telegram_bot_token.as_deref(), Some("123:abc"));
        assert_eq!(config.scraping.failure_policy, FailurePolicy::AbortUser);
    }

    #[test]
    fn invalid_port_is_rejected() {
        let vars = env(&[("ROCKET_PORT", "eighty")]);
        let result =
            ConfigManager::from_sources("local", None, Path::new("/srv"), |k| vars.get(k).cloned());
        assert!(result.is_err());
    }

    #[test]
    fn debug_output_masks_secrets() {
        let vars = env(&[("SMTP_PASS", "hunter2"), ("TELEGRAM_BOT_TOKEN", "123:abc")]);
        let config =
            ConfigManager::from_sources("local", None, Path::new("/srv"), |k| vars.get(k).cloned())
                .unwrap();
        let debug = format!("{:?}", config.notifications);
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("123:abc"));
    }
}
