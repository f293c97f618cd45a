// src/dedup.rs
//! Deduplicate scraped listings and record what each user has been shown.
//!
//! A job is keyed by its link: the first scrape of a link creates the row and
//! later scrapes never touch its title or company. An application record
//! exists at most once per (user, job), which the schema also enforces.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate, Utc};
use serde::Serialize;
use sqlx::SqliteConnection;
use tracing::{debug, info};

use crate::core::Database;
use crate::database::JobRow;
use crate::sources::RawListing;
use crate::types::{ApplicationStatus, JobListing};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AbsorbReport {
    /// Application records created for the user in this call
    pub new_jobs: usize,
    /// Job rows created because their link had never been seen
    pub new_listings: usize,
    pub already_saved: usize,
}

/// Persist `listings` for `user_id`, returning how many were new to the user.
///
/// Candidates are processed in order, each in its own transaction. An error
/// stops the call but leaves earlier candidates committed.
pub async fn absorb(db: &Database, user_id: i64, listings: &[RawListing]) -> Result<AbsorbReport> {
    absorb_on(db, user_id, listings, Local::now().date_naive()).await
}

pub async fn absorb_on(
    db: &Database,
    user_id: i64,
    listings: &[RawListing],
    today: NaiveDate,
) -> Result<AbsorbReport> {
    let mut report = AbsorbReport::default();

    for listing in listings {
        let mut tx = db.begin().await?;

        let (job, created) = find_or_create_job(&mut *tx, listing)
            .await
            .with_context(|| format!("Failed to store job {}", listing.link))?;
        let saved = save_application(&mut *tx, user_id, job.id, today)
            .await
            .with_context(|| format!("Failed to save job {} for user {}", job.id, user_id))?;

        tx.commit().await?;

        if created {
            report.new_listings += 1;
        }
        if saved {
            report.new_jobs += 1;
        } else {
            report.already_saved += 1;
            debug!(user_id, job_id = job.id, "Job already saved for user");
        }
    }

    info!(
        user_id,
        candidates = listings.len(),
        new_jobs = report.new_jobs,
        new_listings = report.new_listings,
        "Absorbed listings"
    );
    Ok(report)
}

/// Resolve the stored job for a link, inserting it on first sight.
async fn find_or_create_job(
    conn: &mut SqliteConnection,
    listing: &RawListing,
) -> Result<(JobListing, bool)> {
    if let Some(existing) = find_job(conn, &listing.link).await? {
        return Ok((existing, false));
    }

    let inserted = sqlx::query(
        r#"
        INSERT INTO jobs (platform, title, company, link, created_at)
        VALUES (?, ?, ?, ?, ?)
        ON CONFLICT(link) DO NOTHING
        "#,
    )
    .bind(listing.platform.label())
    .bind(&listing.title)
    .bind(&listing.company)
    .bind(&listing.link)
    .bind(Utc::now())
    .execute(&mut *conn)
    .await?
    .rows_affected()
        == 1;

    let job = find_job(conn, &listing.link)
        .await?
        .ok_or_else(|| anyhow::anyhow!("Job row for {} vanished after insert", listing.link))?;
    Ok((job, inserted))
}

async fn find_job(conn: &mut SqliteConnection, link: &str) -> Result<Option<JobListing>> {
    let row = sqlx::query_as::<_, JobRow>(
        "SELECT id, platform, title, company, link, created_at FROM jobs WHERE link = ?",
    )
    .bind(link)
    .fetch_optional(&mut *conn)
    .await?;
    row.map(JobListing::try_from).transpose()
}

/// Returns true when a new record was created.
async fn save_application(
    conn: &mut SqliteConnection,
    user_id: i64,
    job_id: i64,
    today: NaiveDate,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO applications (user_id, job_id, status, applied_on)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id, job_id) DO NOTHING
        "#,
    )
    .bind(user_id)
    .bind(job_id)
    .bind(ApplicationStatus::Saved.as_str())
    .bind(today)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}
