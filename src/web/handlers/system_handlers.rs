// src/web/handlers/system_handlers.rs
use rocket::serde::json::Json;
use rocket::State;
use std::sync::Arc;
use tracing::{error, info};

use crate::scheduler::SchedulerService;
use crate::web::types::*;

pub async fn health_handler(
    scheduler: &State<Arc<SchedulerService>>,
) -> Json<DataResponse<HealthData>> {
    let database = match scheduler.orchestrator().database().health_check().await {
        Ok(()) => "ok",
        Err(e) => {
            error!("Health check failed: {:#}", e);
            "unavailable"
        }
    };
    let state = scheduler.status().await.state;

    info!(database, ?state, "Health check");
    Json(DataResponse::success(
        "OK",
        HealthData {
            status: if database == "ok" { "ok" } else { "degraded" },
            database,
            scheduler: state,
            version: env!("CARGO_PKG_VERSION"),
        },
    ))
}
