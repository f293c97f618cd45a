// src/scheduler.rs
//! Process-wide daily trigger for [`RunOrchestrator::run_all`].
//!
//! Lifecycle is `Uninitialized -> Running <-> Stopped`. At most one cron job is
//! registered at any time; stopping shuts the engine down and starting again
//! builds a fresh one.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::Mutex;
use tokio_cron_scheduler::{Job, JobScheduler};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::orchestrator::{RunOrchestrator, RunSummary};
use crate::types::{RunError, SchedulerError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SchedulerState {
    Uninitialized,
    Running,
    Stopped,
}

#[derive(Debug, Clone, Serialize)]
pub struct SchedulerStatus {
    pub state: SchedulerState,
    pub cron: String,
    pub job_id: Option<Uuid>,
    pub next_run: Option<DateTime<Utc>>,
    pub run_in_progress: bool,
}

struct Engine {
    scheduler: JobScheduler,
    job_id: Uuid,
}

struct Inner {
    state: SchedulerState,
    engine: Option<Engine>,
}

pub struct SchedulerService {
    orchestrator: Arc<RunOrchestrator>,
    cron: String,
    inner: Mutex<Inner>,
}

impl SchedulerService {
    pub fn new(orchestrator: Arc<RunOrchestrator>, cron: impl Into<String>) -> Self {
        Self {
            orchestrator,
            cron: cron.into(),
            inner: Mutex::new(Inner {
                state: SchedulerState::Uninitialized,
                engine: None,
            }),
        }
    }

    pub fn orchestrator(&self) -> &Arc<RunOrchestrator> {
        &self.orchestrator
    }

    /// Register the daily job and start ticking. Starting a running scheduler is a no-op.
    pub async fn start(&self) -> Result<SchedulerStatus, SchedulerError> {
        let mut inner = self.inner.lock().await;

        if inner.state != SchedulerState::Running {
            let engine = self.build_engine().await?;
            info!(cron = %self.cron, job_id = %engine.job_id, "Scheduler started");
            inner.engine = Some(engine);
            inner.state = SchedulerState::Running;
        }

        Ok(self.snapshot(&mut inner).await)
    }

    /// Remove the daily job. Stopping an idle scheduler is a no-op.
    pub async fn stop(&self) -> Result<SchedulerStatus, SchedulerError> {
        let mut inner = self.inner.lock().await;

        if let Some(mut engine) = inner.engine.take() {
            engine
                .scheduler
                .shutdown()
                .await
                .map_err(|e| SchedulerError::Engine(e.to_string()))?;
            inner.state = SchedulerState::Stopped;
            info!(job_id = %engine.job_id, "Scheduler stopped");
        }

        Ok(self.snapshot(&mut inner).await)
    }

    pub async fn status(&self) -> SchedulerStatus {
        let mut inner = self.inner.lock().await;
        self.snapshot(&mut inner).await
    }

    /// Same code path as the scheduled trigger, but errors reach the caller.
    pub async fn run_now(&self) -> Result<RunSummary, RunError> {
        info!("Manual run requested");
        self.orchestrator.run_all().await
    }

    async fn build_engine(&self) -> Result<Engine, SchedulerError> {
        let engine_error = |e: tokio_cron_scheduler::JobSchedulerError| {
            SchedulerError::Engine(e.to_string())
        };

        let orchestrator = Arc::clone(&self.orchestrator);
        let job = Job::new_async(self.cron.as_str(), move |_uuid, _lock| {
            let orchestrator = Arc::clone(&orchestrator);
            Box::pin(async move {
                info!("Scheduled run starting");
                match orchestrator.run_all().await {
                    Ok(summary) => info!(
                        users = summary.users.len(),
                        failed = summary.failed_users(),
                        new_jobs = summary.total_new_jobs(),
                        "Scheduled run complete"
                    ),
                    Err(RunError::AlreadyRunning) => {
                        warn!("Scheduled run skipped: a run is already in progress")
                    }
                    Err(e) => error!(error = %e, "Scheduled run failed"),
                }
            })
        })
        .map_err(|e| SchedulerError::InvalidSchedule {
            cron: self.cron.clone(),
            reason: e.to_string(),
        })?;

        let scheduler = JobScheduler::new().await.map_err(engine_error)?;
        let job_id = scheduler.add(job).await.map_err(engine_error)?;
        scheduler.start().await.map_err(engine_error)?;

        Ok(Engine { scheduler, job_id })
    }

    async fn snapshot(&self, inner: &mut Inner) -> SchedulerStatus {
        let (job_id, next_run) = match inner.engine.as_mut() {
            Some(engine) => {
                let next_run = engine
                    .scheduler
                    .next_tick_for_job(engine.job_id)
                    .await
                    .unwrap_or_else(|e| {
                        warn!(error = %e, "Could not compute next run time");
                        None
                    });
                (Some(engine.job_id), next_run)
            }
            None => (None, None),
        };

        SchedulerStatus {
            state: inner.state,
            cron: self.cron.clone(),
            job_id,
            next_run,
            run_in_progress: self.orchestrator.is_running(),
        }
    }
}
