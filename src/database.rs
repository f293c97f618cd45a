// src/database.rs
use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::info;

use crate::types::{
    ApplicationStatus, JobListing, UserJobView, UserPreference, UserProfile, UserStats,
};

#[derive(Debug, sqlx::FromRow)]
struct ProfileRow {
    id: i64,
    name: String,
    email: String,
    telegram_chat_id: Option<String>,
    keywords: Option<String>,
    location: Option<String>,
    daily_limit: Option<i64>,
}

impl From<ProfileRow> for UserProfile {
    fn from(row: ProfileRow) -> Self {
        // No preference row: fall back to the pipeline defaults.
        let preference = match (row.keywords, row.location, row.daily_limit) {
            (Some(keywords), Some(location), Some(limit)) => {
                UserPreference::from_stored(keywords, location, limit)
            }
            _ => UserPreference::default(),
        };

        UserProfile {
            id: row.id,
            name: row.name,
            email: row.email,
            telegram_chat_id: row.telegram_chat_id.filter(|id| !id.trim().is_empty()),
            preference,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct JobRow {
    pub id: i64,
    pub platform: String,
    pub title: String,
    pub company: String,
    pub link: String,
    pub created_at: DateTime<Utc>,
}

impl TryFrom<JobRow> for JobListing {
    type Error = anyhow::Error;

    fn try_from(row: JobRow) -> Result<Self> {
        Ok(JobListing {
            id: row.id,
            platform: row.platform.parse()?,
            title: row.title,
            company: row.company,
            link: row.link,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct UserJobRow {
    job_id: i64,
    platform: String,
    title: String,
    company: String,
    link: String,
    status: String,
    applied_on: NaiveDate,
}

const PROFILE_SELECT: &str = r#"
    SELECT u.id, u.name, u.email, u.telegram_chat_id,
           p.keywords, p.location, p.daily_limit
    FROM users u
    LEFT JOIN preferences p ON p.user_id = u.id
"#;

/// Read/write access to registered users and their preferences.
pub struct UserRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> UserRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Create a user with a preference row in one transaction
    pub async fn create(
        &self,
        name: &str,
        email: &str,
        telegram_chat_id: Option<&str>,
        preference: &UserPreference,
    ) -> Result<UserProfile> {
        let mut tx = self.pool.begin().await?;

        let user_id = sqlx::query(
            "INSERT INTO users (name, email, telegram_chat_id, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(name)
        .bind(email)
        .bind(telegram_chat_id)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await
        .with_context(|| format!("Failed to create user {}", email))?
        .last_insert_rowid();

        sqlx::query(
            "INSERT INTO preferences (user_id, keywords, location, daily_limit) VALUES (?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&preference.keywords)
        .bind(&preference.location)
        .bind(i64::from(preference.daily_limit))
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;

        info!(user_id, email, "Created user");
        Ok(UserProfile {
            id: user_id,
            name: name.to_string(),
            email: email.to_string(),
            telegram_chat_id: telegram_chat_id.map(str::to_string),
            preference: preference.clone(),
        })
    }

    /// Insert or replace the user's preference row
    pub async fn set_preference(&self, user_id: i64, preference: &UserPreference) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO preferences (user_id, keywords, location, daily_limit)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(user_id) DO UPDATE SET
                keywords = excluded.keywords,
                location = excluded.location,
                daily_limit = excluded.daily_limit
            "#,
        )
        .bind(user_id)
        .bind(&preference.keywords)
        .bind(&preference.location)
        .bind(i64::from(preference.daily_limit))
        .execute(self.pool)
        .await
        .with_context(|| format!("Failed to set preference for user {}", user_id))?;
        Ok(())
    }

    pub async fn set_chat_id(&self, user_id: i64, chat_id: Option<&str>) -> Result<bool> {
        let result = sqlx::query("UPDATE users SET telegram_chat_id = ? WHERE id = ?")
            .bind(chat_id)
            .bind(user_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn find(&self, user_id: i64) -> Result<Option<UserProfile>> {
        let row = sqlx::query_as::<_, ProfileRow>(&format!("{} WHERE u.id = ?", PROFILE_SELECT))
            .bind(user_id)
            .fetch_optional(self.pool)
            .await?;
        Ok(row.map(UserProfile::from))
    }

    /// Every registered user, in registration order
    pub async fn list_profiles(&self) -> Result<Vec<UserProfile>> {
        let rows = sqlx::query_as::<_, ProfileRow>(&format!("{} ORDER BY u.id ASC", PROFILE_SELECT))
            .fetch_all(self.pool)
            .await
            .context("Failed to list users")?;
        Ok(rows.into_iter().map(UserProfile::from).collect())
    }
}

pub struct JobRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> JobRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find_by_link(&self, link: &str) -> Result<Option<JobListing>> {
        let row = sqlx::query_as::<_, JobRow>(
            "SELECT id, platform, title, company, link, created_at FROM jobs WHERE link = ?",
        )
        .bind(link)
        .fetch_optional(self.pool)
        .await?;
        row.map(JobListing::try_from).transpose()
    }

    pub async fn count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM jobs")
            .fetch_one(self.pool)
            .await?;
        Ok(count)
    }
}

/// Collaborator-facing queries over application records.
pub struct ApplicationRepository<'a> {
    pool: &'a SqlitePool,
}

impl<'a> ApplicationRepository<'a> {
    pub fn new(pool: &'a SqlitePool) -> Self {
        Self { pool }
    }

    /// Most recently saved jobs first
    pub async fn list_for_user(&self, user_id: i64, limit: u32) -> Result<Vec<UserJobView>> {
        let rows = sqlx::query_as::<_, UserJobRow>(
            r#"
            SELECT j.id AS job_id, j.platform, j.title, j.company, j.link,
                   a.status, a.applied_on
            FROM applications a
            JOIN jobs j ON j.id = a.job_id
            WHERE a.user_id = ?
            ORDER BY a.applied_on DESC, a.id DESC
            LIMIT ?
            "#,
        )
        .bind(user_id)
        .bind(i64::from(limit))
        .fetch_all(self.pool)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(UserJobView {
                    job_id: row.job_id,
                    platform: row.platform.parse()?,
                    title: row.title,
                    company: row.company,
                    link: row.link,
                    status: row.status.parse()?,
                    applied_on: row.applied_on,
                })
            })
            .collect()
    }

    pub async fn count_for_user(&self, user_id: i64) -> Result<i64> {
        let (count,): (i64,) =
            sqlx::query_as("SELECT COUNT(*) FROM applications WHERE user_id = ?")
                .bind(user_id)
                .fetch_one(self.pool)
                .await?;
        Ok(count)
    }

    /// Status changes come from the external workflow, never from the pipeline
    pub async fn set_status(
        &self,
        user_id: i64,
        job_id: i64,
        status: ApplicationStatus,
    ) -> Result<bool> {
        let result = sqlx::query("UPDATE applications SET status = ? WHERE user_id = ? AND job_id = ?")
            .bind(status.as_str())
            .bind(user_id)
            .bind(job_id)
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    pub async fn stats(&self, user: &UserProfile) -> Result<UserStats> {
        let (total_jobs, saved_jobs): (i64, i64) = sqlx::query_as(
            r#"
            SELECT COUNT(*),
                   COALESCE(SUM(CASE WHEN status = 'Saved' THEN 1 ELSE 0 END), 0)
            FROM applications
            WHERE user_id = ?
            "#,
        )
        .bind(user.id)
        .fetch_one(self.pool)
        .await?;

        Ok(UserStats {
            total_jobs,
            saved_jobs,
            keywords: user.preference.keywords.clone(),
            location: user.preference.location.clone(),
            daily_limit: user.preference.daily_limit,
        })
    }
}
