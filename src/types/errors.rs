// src/types/errors.rs
use thiserror::Error;

use super::models::Platform;

/// Network-level failure of one adapter. Propagates to the per-user pipeline.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("HTTP error from {platform}: {source}")]
    Http {
        platform: Platform,
        #[source]
        source: reqwest::Error,
    },

    #[error("unexpected HTTP status {status} from {platform} ({url})")]
    Status {
        platform: Platform,
        status: u16,
        url: String,
    },
}

impl FetchError {
    pub fn platform(&self) -> Platform {
        match self {
            FetchError::Http { platform, .. } | FetchError::Status { platform, .. } => *platform,
        }
    }
}

/// Why a single candidate on a results page was dropped.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("candidate has no title element")]
    MissingTitle,
    #[error("candidate has no company element")]
    MissingCompany,
    #[error("candidate has no link")]
    MissingLink,
    #[error("candidate link '{0}' cannot be resolved to an absolute URL")]
    InvalidLink(String),
}

/// Failure of the whole pipeline for one user.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Fetch(#[from] FetchError),

    #[error("all {0} job sources failed")]
    AllSourcesFailed(usize),

    #[error("persistence failed: {0:#}")]
    Persistence(anyhow::Error),
}

/// Failure of a whole run over all users.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("a run is already in progress")]
    AlreadyRunning,

    #[error("failed to load users: {0:#}")]
    UserDirectory(anyhow::Error),

    #[error("failed to claim the run lease: {0:#}")]
    Lease(anyhow::Error),
}

/// Failure to register or drive the daily schedule.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid schedule '{cron}': {reason}")]
    InvalidSchedule { cron: String, reason: String },

    #[error("scheduler engine error: {0}")]
    Engine(String),
}
