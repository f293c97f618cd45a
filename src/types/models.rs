// src/types/models.rs
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const DEFAULT_KEYWORDS: &str = "DevOps";
pub const DEFAULT_LOCATION: &str = "Bangalore";
pub const DEFAULT_DAILY_LIMIT: u32 = 10;

/// Job boards we know how to scrape.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Platform {
    LinkedIn,
    Naukri,
    Indeed,
    Foundit,
}

impl Platform {
    /// Adapter order used when combining results for a user.
    pub const ALL: [Platform; 4] = [
        Platform::LinkedIn,
        Platform::Naukri,
        Platform::Indeed,
        Platform::Foundit,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            Platform::LinkedIn => "LinkedIn",
            Platform::Naukri => "Naukri",
            Platform::Indeed => "Indeed",
            Platform::Foundit => "Foundit",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.label())
    }
}

impl FromStr for Platform {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Platform::ALL
            .into_iter()
            .find(|p| p.label().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| anyhow::anyhow!("Unknown platform: {}", s))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserPreference {
    pub keywords: String,
    pub location: String,
    pub daily_limit: u32,
}

impl Default for UserPreference {
    fn default() -> Self {
        Self {
            keywords: DEFAULT_KEYWORDS.to_string(),
            location: DEFAULT_LOCATION.to_string(),
            daily_limit: DEFAULT_DAILY_LIMIT,
        }
    }
}

impl UserPreference {
    /// Build from stored columns, replacing a non-positive limit with the default
    pub fn from_stored(keywords: String, location: String, daily_limit: i64) -> Self {
        let daily_limit = u32::try_from(daily_limit)
            .ok()
            .filter(|limit| *limit > 0)
            .unwrap_or(DEFAULT_DAILY_LIMIT);

        Self {
            keywords,
            location,
            daily_limit,
        }
    }
}

/// A registered user as seen by the pipeline.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub telegram_chat_id: Option<String>,
    pub preference: UserPreference,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobListing {
    pub id: i64,
    pub platform: Platform,
    pub title: String,
    pub company: String,
    pub link: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ApplicationStatus {
    Saved,
    Applied,
    Interviewing,
    Rejected,
    Offer,
}

impl ApplicationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApplicationStatus::Saved => "Saved",
            ApplicationStatus::Applied => "Applied",
            ApplicationStatus::Interviewing => "Interviewing",
            ApplicationStatus::Rejected => "Rejected",
            ApplicationStatus::Offer => "Offer",
        }
    }
}

impl fmt::Display for ApplicationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ApplicationStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Saved" => Ok(ApplicationStatus::Saved),
            "Applied" => Ok(ApplicationStatus::Applied),
            "Interviewing" => Ok(ApplicationStatus::Interviewing),
            "Rejected" => Ok(ApplicationStatus::Rejected),
            "Offer" => Ok(ApplicationStatus::Offer),
            other => anyhow::bail!("Unknown application status: {}", other),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationRecord {
    pub id: i64,
    pub user_id: i64,
    pub job_id: i64,
    pub status: ApplicationStatus,
    pub applied_on: NaiveDate,
}

/// Saved job joined with the user's application row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserJobView {
    pub job_id: i64,
    pub platform: Platform,
    pub title: String,
    pub company: String,
    pub link: String,
    pub status: ApplicationStatus,
    pub applied_on: NaiveDate,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserStats {
    pub total_jobs: i64,
    pub saved_jobs: i64,
    pub keywords: String,
    pub location: String,
    pub daily_limit: u32,
}

/// Result of one pipeline invocation for one user. Not persisted.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunOutcome {
    pub user_id: i64,
    pub fetched: usize,
    pub failed_platforms: Vec<Platform>,
    pub new_jobs: usize,
}
