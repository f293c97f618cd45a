// src/web/handlers/scheduler_handlers.rs
use rocket::http::Status;
use rocket::serde::json::Json;
use rocket::State;
use std::sync::Arc;
use tracing::{error, info, warn};

use crate::orchestrator::RunSummary;
use crate::scheduler::{SchedulerService, SchedulerStatus};
use crate::types::{RunError, SchedulerError};
use crate::web::types::*;

pub type ApiError = (Status, Json<StandardErrorResponse>);

pub async fn scheduler_status_handler(
    scheduler: &State<Arc<SchedulerService>>,
) -> Json<DataResponse<SchedulerStatus>> {
    let status = scheduler.status().await;
    Json(DataResponse::success("Scheduler status", status))
}

pub async fn start_scheduler_handler(
    scheduler: &State<Arc<SchedulerService>>,
) -> Result<Json<DataResponse<SchedulerStatus>>, ApiError> {
    match scheduler.start().await {
        Ok(status) => {
            info!(cron = %status.cron, "Scheduler start requested");
            Ok(Json(DataResponse::success("Scheduler running", status)))
        }
        Err(e) => Err(scheduler_error_response(e)),
    }
}

pub async fn stop_scheduler_handler(
    scheduler: &State<Arc<SchedulerService>>,
) -> Result<Json<DataResponse<SchedulerStatus>>, ApiError> {
    match scheduler.stop().await {
        Ok(status) => {
            info!("Scheduler stop requested");
            Ok(Json(DataResponse::success("Scheduler stopped", status)))
        }
        Err(e) => Err(scheduler_error_response(e)),
    }
}

pub async fn run_now_handler(
    scheduler: &State<Arc<SchedulerService>>,
) -> Result<Json<DataResponse<RunSummary>>, ApiError> {
    match scheduler.run_now().await {
        Ok(summary) => {
            let message = format!(
                "Processed {} users, {} new jobs saved",
                summary.users.len(),
                summary.total_new_jobs()
            );
            Ok(Json(DataResponse::success(message, summary)))
        }
        Err(e) => Err(run_error_response(e)),
    }
}

pub fn run_error_response(error: RunError) -> ApiError {
    match error {
        RunError::AlreadyRunning => {
            warn!("Manual run rejected: a run is already in progress");
            (
                Status::Conflict,
                Json(StandardErrorResponse::new(
                    error.to_string(),
                    "RUN_IN_PROGRESS",
                    &["Wait for the current run to finish", "Check /api/scheduler/status"],
                )),
            )
        }
        RunError::UserDirectory(_) | RunError::Lease(_) => {
            error!("Manual run failed: {}", error);
            (
                Status::InternalServerError,
                Json(StandardErrorResponse::new(
                    error.to_string(),
                    "RUN_FAILED",
                    &["Check database connectivity"],
                )),
            )
        }
    }
}

fn scheduler_error_response(error: SchedulerError) -> ApiError {
    error!("Scheduler control failed: {}", error);
    let code = match error {
        SchedulerError::InvalidSchedule { .. } => "INVALID_SCHEDULE",
        SchedulerError::Engine(_) => "SCHEDULER_ERROR",
    };
    (
        Status::InternalServerError,
        Json(StandardErrorResponse::new(
            error.to_string(),
            code,
            &["Check DEVAPPLY_SCHEDULE"],
        )),
    )
}
