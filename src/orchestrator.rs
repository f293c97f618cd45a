// src/orchestrator.rs
//! One run = every registered user, in registration order, through
//! fetch -> combine -> absorb -> notify. A user's failure is recorded in the
//! summary and never stops the remaining users.

use chrono::{DateTime, Duration, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::core::{build_http_client, ConfigManager, Database};
use crate::database::UserRepository;
use crate::dedup::absorb;
use crate::notify::NotificationDispatcher;
use crate::sources::{default_sources, JobSource, RawListing};
use crate::types::{PipelineError, Platform, RunError, RunOutcome, UserProfile};

/// Database lease shared by every process that runs the pipeline
const RUN_LEASE: &str = "pipeline_run";
const RUN_LEASE_STALE_HOURS: i64 = 6;

/// What a single platform's fetch failure does to the user's pipeline.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Skip the failing platform; the user fails only when every platform failed
    #[default]
    IsolatePlatform,
    /// Any fetch failure aborts the user before anything is stored
    AbortUser,
}

impl FromStr for FailurePolicy {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "isolate_platform" => Ok(FailurePolicy::IsolatePlatform),
            "abort_user" => Ok(FailurePolicy::AbortUser),
            other => anyhow::bail!(
                "Unknown failure policy '{}'. Use isolate_platform or abort_user",
                other
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserRunReport {
    pub user_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<RunOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl UserRunReport {
    pub fn succeeded(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub users: Vec<UserRunReport>,
}

impl RunSummary {
    pub fn total_new_jobs(&self) -> usize {
        self.users
            .iter()
            .filter_map(|report| report.outcome.as_ref())
            .map(|outcome| outcome.new_jobs)
            .sum()
    }

    pub fn failed_users(&self) -> usize {
        self.users.iter().filter(|report| !report.succeeded()).count()
    }
}

pub struct RunOrchestrator {
    db: Database,
    sources: Vec<Arc<dyn JobSource>>,
    dispatcher: NotificationDispatcher,
    failure_policy: FailurePolicy,
    run_lock: Mutex<()>,
}

impl RunOrchestrator {
    pub fn new(
        db: Database,
        sources: Vec<Arc<dyn JobSource>>,
        dispatcher: NotificationDispatcher,
        failure_policy: FailurePolicy,
    ) -> Self {
        Self {
            db,
            sources,
            dispatcher,
            failure_policy,
            run_lock: Mutex::new(()),
        }
    }

    /// Production wiring: the four board adapters and both notification channels
    pub fn from_config(config: &ConfigManager, db: Database) -> anyhow::Result<Self> {
        let client = build_http_client(
            config.scraping.request_timeout_secs,
            &config.scraping.user_agent,
        )?;

        Ok(Self::new(
            db,
            default_sources(&client),
            NotificationDispatcher::from_config(&config.notifications, client),
            config.scraping.failure_policy,
        ))
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn failure_policy(&self) -> FailurePolicy {
        self.failure_policy
    }

    pub fn is_running(&self) -> bool {
        self.run_lock.try_lock().is_err()
    }

    /// Process every registered user once.
    ///
    /// Returns `AlreadyRunning` instead of waiting when another run holds the
    /// guard, in this process or in any other process sharing the database.
    pub async fn run_all(&self) -> Result<RunSummary, RunError> {
        let _guard = self
            .run_lock
            .try_lock()
            .map_err(|_| RunError::AlreadyRunning)?;

        let holder = Uuid::new_v4().to_string();
        let claimed = self
            .db
            .try_acquire_lease(RUN_LEASE, &holder, Duration::hours(RUN_LEASE_STALE_HOURS))
            .await
            .map_err(RunError::Lease)?;
        if !claimed {
            return Err(RunError::AlreadyRunning);
        }

        let result = self.run_users().await;

        if let Err(e) = self.db.release_lease(RUN_LEASE, &holder).await {
            error!(error = %e, "Failed to release run lease");
        }
        result
    }

    async fn run_users(&self) -> Result<RunSummary, RunError> {
        let started_at = Utc::now();
        let users = UserRepository::new(self.db.pool())
            .list_profiles()
            .await
            .map_err(RunError::UserDirectory)?;

        info!(users = users.len(), "Starting run");

        let mut reports = Vec::with_capacity(users.len());
        for user in &users {
            match self.run_one(user).await {
                Ok(outcome) => reports.push(UserRunReport {
                    user_id: user.id,
                    outcome: Some(outcome),
                    error: None,
                }),
                Err(e) => {
                    error!(user_id = user.id, error = %e, "Pipeline failed for user");
                    reports.push(UserRunReport {
                        user_id: user.id,
                        outcome: None,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        let summary = RunSummary {
            started_at,
            finished_at: Utc::now(),
            users: reports,
        };
        info!(
            users = summary.users.len(),
            failed = summary.failed_users(),
            new_jobs = summary.total_new_jobs(),
            "Run finished"
        );
        Ok(summary)
    }

    /// Fetch, combine, absorb and notify for one user.
    pub async fn run_one(&self, user: &UserProfile) -> Result<RunOutcome, PipelineError> {
        let pref = &user.preference;
        let results = join_all(
            self.sources
                .iter()
                .map(|source| source.fetch(&pref.keywords, &pref.location, pref.daily_limit)),
        )
        .await;

        let mut combined: Vec<RawListing> = Vec::new();
        let mut failed_platforms: Vec<Platform> = Vec::new();
        let mut first_failure = None;

        for result in results {
            match result {
                Ok(listings) => combined.extend(listings),
                Err(e) => {
                    warn!(user_id = user.id, platform = %e.platform(), error = %e, "Job source failed");
                    failed_platforms.push(e.platform());
                    first_failure.get_or_insert(e);
                }
            }
        }

        if let Some(failure) = first_failure {
            match self.failure_policy {
                FailurePolicy::AbortUser => return Err(failure.into()),
                FailurePolicy::IsolatePlatform if failed_platforms.len() == self.sources.len() => {
                    return Err(PipelineError::AllSourcesFailed(failed_platforms.len()));
                }
                FailurePolicy::IsolatePlatform => {}
            }
        }

        let report = absorb(&self.db, user.id, &combined)
            .await
            .map_err(PipelineError::Persistence)?;

        self.dispatcher.notify(user, report.new_jobs).await;

        Ok(RunOutcome {
            user_id: user.id,
            fetched: combined.len(),
            failed_platforms,
            new_jobs: report.new_jobs,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{ApplicationRepository, JobRepository};
    use crate::notify::{ChannelOutcome, NotificationChannel, NotificationMessage};
    use crate::types::{ApplicationStatus, FetchError, UserPreference};
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    /// Serves fixed listings, or a 503 when asked for `fail_for` keywords.
    struct StaticSource {
        platform: Platform,
        listings: Vec<RawListing>,
        fail_for: Option<&'static str>,
    }

    #[async_trait]
    impl JobSource for StaticSource {
        fn platform(&self) -> Platform {
            self.platform
        }

        async fn fetch(
            &self,
            keywords: &str,
            _location: &str,
            limit: u32,
        ) -> Result<Vec<RawListing>, FetchError> {
            if self.fail_for == Some(keywords) {
                return Err(FetchError::Status {
                    platform: self.platform,
                    status: 503,
                    url: format!("https://{}.example/search", self.platform),
                });
            }
            Ok(self.listings.iter().take(limit as usize).cloned().collect())
        }
    }

    /// One listing, after a delay long enough for runs to overlap.
    struct SlowSource;

    #[async_trait]
    impl JobSource for SlowSource {
        fn platform(&self) -> Platform {
            Platform::LinkedIn
        }

        async fn fetch(
            &self,
            _keywords: &str,
            _location: &str,
            _limit: u32,
        ) -> Result<Vec<RawListing>, FetchError> {
            tokio::time::sleep(std::time::Duration::from_millis(300)).await;
            Ok(vec![raw(Platform::LinkedIn, 1)])
        }
    }

    #[derive(Default)]
    struct Recorder {
        counts: StdMutex<Vec<(i64, String)>>,
    }

    #[async_trait]
    impl NotificationChannel for Recorder {
        fn name(&self) -> &'static str {
            "recorder"
        }

        async fn send(&self, user: &UserProfile, message: &NotificationMessage) -> ChannelOutcome {
            self.counts
                .lock()
                .unwrap()
                .push((user.id, message.body.clone()));
            ChannelOutcome::Sent
        }
    }

    fn raw(platform: Platform, n: u32) -> RawListing {
        RawListing {
            platform,
            title: format!("{} role {}", platform, n),
            company: "Acme".into(),
            link: format!("https://jobs.example/{}/{}", platform.label().to_lowercase(), n),
        }
    }

    fn source(platform: Platform, listings: Vec<RawListing>) -> Arc<dyn JobSource> {
        Arc::new(StaticSource {
            platform,
            listings,
            fail_for: None,
        })
    }

    /// 3 + 2 + 0 + 1 listings; Foundit repeats LinkedIn's first link.
    fn scenario_sources(fail_naukri_for: Option<&'static str>) -> Vec<Arc<dyn JobSource>> {
        let mut foundit_dup = raw(Platform::Foundit, 1);
        foundit_dup.link = raw(Platform::LinkedIn, 1).link;

        vec![
            source(
                Platform::LinkedIn,
                vec![
                    raw(Platform::LinkedIn, 1),
                    raw(Platform::LinkedIn, 2),
                    raw(Platform::LinkedIn, 3),
                ],
            ),
            Arc::new(StaticSource {
                platform: Platform::Naukri,
                listings: vec![raw(Platform::Naukri, 1), raw(Platform::Naukri, 2)],
                fail_for: fail_naukri_for,
            }) as Arc<dyn JobSource>,
            source(Platform::Indeed, vec![]),
            source(Platform::Foundit, vec![foundit_dup]),
        ]
    }

    async fn add_user(db: &Database, email: &str, keywords: &str) -> UserProfile {
        let pref = UserPreference {
            keywords: keywords.into(),
            ..UserPreference::default()
        };
        UserRepository::new(db.pool())
            .create("User", email, None, &pref)
            .await
            .unwrap()
    }

    fn orchestrator(
        db: &Database,
        sources: Vec<Arc<dyn JobSource>>,
        recorder: Arc<Recorder>,
        policy: FailurePolicy,
    ) -> RunOrchestrator {
        RunOrchestrator::new(
            db.clone(),
            sources,
            NotificationDispatcher::new(vec![recorder as Arc<dyn NotificationChannel>]),
            policy,
        )
    }

    #[test]
    fn failure_policy_parsing() {
        assert_eq!(FailurePolicy::default(), FailurePolicy::IsolatePlatform);
        assert_eq!("abort-user".parse::<FailurePolicy>().unwrap(), FailurePolicy::AbortUser);
        assert_eq!(
            "Isolate_Platform".parse::<FailurePolicy>().unwrap(),
            FailurePolicy::IsolatePlatform
        );
        assert!("retry".parse::<FailurePolicy>().is_err());
    }

    #[tokio::test]
    async fn daily_scenario_then_rerun() {
        let db = Database::in_memory().await.unwrap();
        let user = add_user(&db, "devops@example.com", "DevOps").await;
        let recorder = Arc::new(Recorder::default());
        let orch = orchestrator(
            &db,
            scenario_sources(None),
            recorder.clone(),
            FailurePolicy::default(),
        );

        let summary = orch.run_all().await.unwrap();
        let outcome = summary.users[0].outcome.clone().unwrap();
        assert_eq!(outcome.fetched, 6);
        assert_eq!(outcome.new_jobs, 5);
        assert_eq!(JobRepository::new(db.pool()).count().await.unwrap(), 5);

        let jobs = ApplicationRepository::new(db.pool())
            .list_for_user(user.id, 50)
            .await
            .unwrap();
        assert_eq!(jobs.len(), 5);
        assert!(jobs.iter().all(|j| j.status == ApplicationStatus::Saved));

        let rerun = orch.run_all().await.unwrap();
        assert_eq!(rerun.total_new_jobs(), 0);

        let sent = recorder.counts.lock().unwrap().clone();
        assert_eq!(
            sent,
            vec![
                (user.id, "New saved jobs today: 5".to_string()),
                (user.id, "New saved jobs today: 0".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn abort_user_policy_stores_nothing_for_failing_user() {
        let db = Database::in_memory().await.unwrap();
        let broken = add_user(&db, "broken@example.com", "Broken").await;
        let healthy = add_user(&db, "healthy@example.com", "DevOps").await;
        let recorder = Arc::new(Recorder::default());
        let orch = orchestrator(
            &db,
            scenario_sources(Some("Broken")),
            recorder.clone(),
            FailurePolicy::AbortUser,
        );

        let summary = orch.run_all().await.unwrap();

        assert_eq!(summary.failed_users(), 1);
        assert!(summary.users[0].error.as_deref().unwrap().contains("503"));
        let apps = ApplicationRepository::new(db.pool());
        assert_eq!(apps.count_for_user(broken.id).await.unwrap(), 0);
        assert_eq!(apps.count_for_user(healthy.id).await.unwrap(), 5);
        // Only the healthy user is notified.
        assert_eq!(recorder.counts.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn isolate_policy_keeps_other_platforms() {
        let db = Database::in_memory().await.unwrap();
        let broken = add_user(&db, "broken@example.com", "Broken").await;
        let healthy = add_user(&db, "healthy@example.com", "DevOps").await;
        let orch = orchestrator(
            &db,
            scenario_sources(Some("Broken")),
            Arc::new(Recorder::default()),
            FailurePolicy::IsolatePlatform,
        );

        let summary = orch.run_all().await.unwrap();

        assert_eq!(summary.failed_users(), 0);
        let outcome = summary.users[0].outcome.clone().unwrap();
        assert_eq!(outcome.failed_platforms, vec![Platform::Naukri]);
        assert_eq!(outcome.new_jobs, 3);

        let apps = ApplicationRepository::new(db.pool());
        assert_eq!(apps.count_for_user(broken.id).await.unwrap(), 3);
        assert_eq!(apps.count_for_user(healthy.id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn user_fails_when_every_platform_fails() {
        let db = Database::in_memory().await.unwrap();
        let user = add_user(&db, "down@example.com", "Down").await;
        let sources: Vec<Arc<dyn JobSource>> = Platform::ALL
            .iter()
            .map(|&platform| {
                Arc::new(StaticSource {
                    platform,
                    listings: vec![raw(platform, 1)],
                    fail_for: Some("Down"),
                }) as Arc<dyn JobSource>
            })
            .collect();
        let orch = orchestrator(
            &db,
            sources,
            Arc::new(Recorder::default()),
            FailurePolicy::IsolatePlatform,
        );

        let err = orch.run_one(&user).await.unwrap_err();
        assert!(matches!(err, PipelineError::AllSourcesFailed(4)));
    }

    #[tokio::test]
    async fn concurrent_run_is_rejected() {
        let db = Database::in_memory().await.unwrap();
        let orch = orchestrator(
            &db,
            vec![],
            Arc::new(Recorder::default()),
            FailurePolicy::default(),
        );

        let held = orch.run_lock.lock().await;
        assert!(orch.is_running());
        assert!(matches!(orch.run_all().await, Err(RunError::AlreadyRunning)));
        drop(held);

        let summary = orch.run_all().await.unwrap();
        assert!(summary.users.is_empty());
    }

    #[tokio::test]
    async fn lease_held_elsewhere_rejects_run() {
        let db = Database::in_memory().await.unwrap();
        let orch = orchestrator(
            &db,
            vec![],
            Arc::new(Recorder::default()),
            FailurePolicy::default(),
        );

        assert!(db
            .try_acquire_lease(RUN_LEASE, "admin-cli", Duration::hours(RUN_LEASE_STALE_HOURS))
            .await
            .unwrap());
        assert!(matches!(orch.run_all().await, Err(RunError::AlreadyRunning)));

        db.release_lease(RUN_LEASE, "admin-cli").await.unwrap();
        assert!(orch.run_all().await.is_ok());
    }

    #[tokio::test]
    async fn runs_are_serialized_across_orchestrators_sharing_a_file() {
        let dir = std::env::temp_dir().join(format!("devapply-run-{}", Uuid::new_v4()));
        let path = dir.join("devapply.db");

        // Same wiring as the server and devapply-admin: separate pools on one file.
        let server_db = Database::new(&path).await.unwrap();
        let cli_db = Database::new(&path).await.unwrap();
        add_user(&server_db, "slow@example.com", "DevOps").await;

        let server = orchestrator(
            &server_db,
            vec![Arc::new(SlowSource) as Arc<dyn JobSource>],
            Arc::new(Recorder::default()),
            FailurePolicy::default(),
        );
        let cli = orchestrator(
            &cli_db,
            vec![Arc::new(SlowSource) as Arc<dyn JobSource>],
            Arc::new(Recorder::default()),
            FailurePolicy::default(),
        );

        let (first, second) = tokio::join!(server.run_all(), cli.run_all());
        let results = [first, second];
        let rejected = results
            .iter()
            .filter(|r| matches!(r, Err(RunError::AlreadyRunning)))
            .count();
        assert_eq!(rejected, 1);
        let finished = results.iter().find_map(|r| r.as_ref().ok()).unwrap();
        assert_eq!(finished.total_new_jobs(), 1);

        // The lease is released once the winning run finishes.
        let rerun = cli.run_all().await.unwrap();
        assert_eq!(rerun.users.len(), 1);
        assert_eq!(rerun.total_new_jobs(), 0);

        server_db.pool().close().await;
        cli_db.pool().close().await;
        let _ = std::fs::remove_dir_all(&dir);
    }
}
