// src/admin_cli.rs
//! `devapply-admin`: maintains the user directory and exposes the read
//! queries (saved jobs, stats) plus a manual run.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Deserialize;
use std::io::Read;
use std::path::PathBuf;
use tracing::{error, info, warn};

use crate::core::{ConfigManager, Database};
use crate::database::{ApplicationRepository, UserRepository};
use crate::orchestrator::RunOrchestrator;
use crate::types::{UserPreference, DEFAULT_DAILY_LIMIT, DEFAULT_KEYWORDS, DEFAULT_LOCATION};

#[derive(Parser)]
#[command(name = "devapply-admin")]
#[command(about = "Manage DevApply users and trigger runs")]
pub struct AdminCli {
    #[command(subcommand)]
    pub command: AdminCommand,

    /// Overrides DEVAPPLY_DATABASE_PATH and config.yaml
    #[arg(long)]
    pub database_path: Option<PathBuf>,
}

#[derive(Subcommand)]
pub enum AdminCommand {
    /// Create the database and tables
    Init,
    /// Register a user with search preferences
    AddUser {
        name: String,
        email: String,
        #[arg(long)]
        chat_id: Option<String>,
        #[arg(long, default_value = DEFAULT_KEYWORDS)]
        keywords: String,
        #[arg(long, default_value = DEFAULT_LOCATION)]
        location: String,
        #[arg(long, default_value_t = DEFAULT_DAILY_LIMIT)]
        daily_limit: u32,
    },
    /// Replace a user's search preferences
    SetPreference {
        user_id: i64,
        keywords: String,
        location: String,
        #[arg(long, default_value_t = DEFAULT_DAILY_LIMIT)]
        daily_limit: u32,
    },
    /// Set the Telegram chat id (omit to clear it)
    SetChatId { user_id: i64, chat_id: Option<String> },
    /// Import users from a CSV file (name,email,telegram_chat_id,keywords,location,daily_limit)
    Import { csv_file: PathBuf },
    /// List registered users
    List,
    /// Show the jobs saved for a user, newest first
    Jobs {
        user_id: i64,
        #[arg(long, default_value_t = 50)]
        limit: u32,
    },
    /// Show totals for a user
    Stats { user_id: i64 },
    /// Run the pipeline for every user now
    RunNow,
}

#[derive(Debug, Deserialize)]
struct ImportRow {
    name: String,
    email: String,
    telegram_chat_id: Option<String>,
    keywords: Option<String>,
    location: Option<String>,
    daily_limit: Option<u32>,
}

impl ImportRow {
    fn preference(&self) -> UserPreference {
        let defaults = UserPreference::default();
        UserPreference {
            keywords: self.keywords.clone().unwrap_or(defaults.keywords),
            location: self.location.clone().unwrap_or(defaults.location),
            daily_limit: self
                .daily_limit
                .filter(|limit| *limit > 0)
                .unwrap_or(defaults.daily_limit),
        }
    }
}

#[derive(Debug, Default)]
pub struct ImportReport {
    pub imported: usize,
    pub skipped: Vec<String>,
}

/// Create one user per CSV record. Bad or duplicate records are reported, not fatal.
pub async fn import_users<R: Read>(db: &Database, input: R) -> Result<ImportReport> {
    let repo = UserRepository::new(db.pool());
    let mut reader = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_reader(input);
    let mut report = ImportReport::default();

    for (index, result) in reader.deserialize::<ImportRow>().enumerate() {
        let line = index + 2;
        let row = match result {
            Ok(row) => row,
            Err(e) => {
                report.skipped.push(format!("line {}: {}", line, e));
                continue;
            }
        };

        if row.name.is_empty() || row.email.is_empty() {
            report
                .skipped
                .push(format!("line {}: name and email are required", line));
            continue;
        }

        match repo
            .create(
                &row.name,
                &row.email,
                row.telegram_chat_id.as_deref(),
                &row.preference(),
            )
            .await
        {
            Ok(_) => report.imported += 1,
            Err(e) => {
                let reason = if format!("{:#}", e).contains("UNIQUE constraint failed") {
                    "already exists".to_string()
                } else {
                    format!("{:#}", e)
                };
                report
                    .skipped
                    .push(format!("line {}: {} ({})", line, row.email, reason));
            }
        }
    }

    Ok(report)
}

pub async fn handle_admin_command(cli: AdminCli) -> Result<()> {
    let config = ConfigManager::load()?;
    let database_path = cli
        .database_path
        .clone()
        .unwrap_or_else(|| config.environment.database_path.clone());
    let db = Database::new(&database_path).await?;

    let users = UserRepository::new(db.pool());
    let applications = ApplicationRepository::new(db.pool());

    match cli.command {
        AdminCommand::Init => {
            println!("Database ready at {}", database_path.display());
        }

        AdminCommand::AddUser {
            name,
            email,
            chat_id,
            keywords,
            location,
            daily_limit,
        } => {
            let preference = UserPreference {
                keywords,
                location,
                daily_limit: daily_limit.max(1),
            };
            let user = users
                .create(&name, &email, chat_id.as_deref(), &preference)
                .await?;
            println!(
                "Created user {} <{}> (id {}) searching '{}' in {}",
                user.name, user.email, user.id, user.preference.keywords, user.preference.location
            );
        }

        AdminCommand::SetPreference {
            user_id,
            keywords,
            location,
            daily_limit,
        } => {
            if users.find(user_id).await?.is_none() {
                anyhow::bail!("User {} not found", user_id);
            }
            let preference = UserPreference {
                keywords,
                location,
                daily_limit: daily_limit.max(1),
            };
            users.set_preference(user_id, &preference).await?;
            println!("Updated preferences for user {}", user_id);
        }

        AdminCommand::SetChatId { user_id, chat_id } => {
            if users.set_chat_id(user_id, chat_id.as_deref()).await? {
                println!("Updated Telegram chat id for user {}", user_id);
            } else {
                anyhow::bail!("User {} not found", user_id);
            }
        }

        AdminCommand::Import { csv_file } => {
            let file = std::fs::File::open(&csv_file)
                .with_context(|| format!("CSV file not found: {}", csv_file.display()))?;
            let report = import_users(&db, file).await?;

            for reason in &report.skipped {
                warn!("Skipped {}", reason);
            }
            println!(
                "Import completed: {} imported, {} skipped",
                report.imported,
                report.skipped.len()
            );
        }

        AdminCommand::List => {
            let profiles = users.list_profiles().await?;
            if profiles.is_empty() {
                println!("No users registered.");
            } else {
                println!(
                    "{:<5} {:<20} {:<30} {:<12} {:<20} {:<15} {:<5}",
                    "ID", "Name", "Email", "Chat", "Keywords", "Location", "Limit"
                );
                println!("{}", "-".repeat(112));
                for user in profiles {
                    println!(
                        "{:<5} {:<20} {:<30} {:<12} {:<20} {:<15} {:<5}",
                        user.id,
                        user.name,
                        user.email,
                        user.telegram_chat_id.as_deref().unwrap_or("-"),
                        user.preference.keywords,
                        user.preference.location,
                        user.preference.daily_limit
                    );
                }
            }
        }

        AdminCommand::Jobs { user_id, limit } => {
            let jobs = applications.list_for_user(user_id, limit).await?;
            if jobs.is_empty() {
                println!("No saved jobs for user {}.", user_id);
            } else {
                for job in jobs {
                    println!(
                        "{} [{}] {:<9} {} @ {}\n    {}",
                        job.applied_on, job.status, job.platform, job.title, job.company, job.link
                    );
                }
            }
        }

        AdminCommand::Stats { user_id } => {
            let user = users
                .find(user_id)
                .await?
                .with_context(|| format!("User {} not found", user_id))?;
            let stats = applications.stats(&user).await?;
            println!("{}", serde_json::to_string_pretty(&stats)?);
        }

        AdminCommand::RunNow => {
            let orchestrator = RunOrchestrator::from_config(&config, db.clone())?;
            match orchestrator.run_all().await {
                Ok(summary) => {
                    info!(new_jobs = summary.total_new_jobs(), "Manual run finished");
                    println!("{}", serde_json::to_string_pretty(&summary)?);
                }
                Err(e) => {
                    error!("Manual run failed: {}", e);
                    return Err(e.into());
                }
            }
        }
    }

    Ok(())
}
