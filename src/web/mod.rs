// src/web/mod.rs
//! Operator control surface: health plus scheduler start/stop/status/run-now.

pub mod handlers;
pub mod types;

pub use handlers::*;
pub use types::*;

use anyhow::Result;
use rocket::fairing::{Fairing, Info, Kind};
use rocket::http::{Header, Status};
use rocket::serde::json::Json;
use rocket::{catchers, get, options, post, routes, Build, Request, Response, Rocket, State};
use std::sync::Arc;
use tracing::info;

use crate::orchestrator::RunSummary;
use crate::scheduler::{SchedulerService, SchedulerStatus};

pub struct Cors;

#[rocket::async_trait]
impl Fairing for Cors {
    fn info(&self) -> Info {
        Info {
            name: "Add CORS headers to responses",
            kind: Kind::Response,
        }
    }

    async fn on_response<'r>(&self, _request: &'r Request<'_>, response: &mut Response<'r>) {
        response.set_header(Header::new("Access-Control-Allow-Origin", "*"));
        response.set_header(Header::new(
            "Access-Control-Allow-Methods",
            "POST, GET, OPTIONS",
        ));
        response.set_header(Header::new("Access-Control-Allow-Headers", "*"));
    }
}

#[get("/health")]
pub async fn health(scheduler: &State<Arc<SchedulerService>>) -> Json<DataResponse<HealthData>> {
    handlers::health_handler(scheduler).await
}

#[get("/scheduler/status")]
pub async fn scheduler_status(
    scheduler: &State<Arc<SchedulerService>>,
) -> Json<DataResponse<SchedulerStatus>> {
    handlers::scheduler_status_handler(scheduler).await
}

#[post("/scheduler/start")]
pub async fn start_scheduler(
    scheduler: &State<Arc<SchedulerService>>,
) -> Result<Json<DataResponse<SchedulerStatus>>, ApiError> {
    handlers::start_scheduler_handler(scheduler).await
}

#[post("/scheduler/stop")]
pub async fn stop_scheduler(
    scheduler: &State<Arc<SchedulerService>>,
) -> Result<Json<DataResponse<SchedulerStatus>>, ApiError> {
    handlers::stop_scheduler_handler(scheduler).await
}

#[post("/scheduler/run-now")]
pub async fn run_now(
    scheduler: &State<Arc<SchedulerService>>,
) -> Result<Json<DataResponse<RunSummary>>, ApiError> {
    handlers::run_now_handler(scheduler).await
}

#[options("/<_..>")]
pub async fn options() -> Status {
    Status::Ok
}

#[rocket::catch(404)]
pub fn not_found() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Resource not found",
        "NOT_FOUND",
        &["Available endpoints live under /api/health and /api/scheduler"],
    ))
}

#[rocket::catch(500)]
pub fn internal_error() -> Json<StandardErrorResponse> {
    Json(StandardErrorResponse::new(
        "Internal server error",
        "INTERNAL_ERROR",
        &["Try again in a few moments", "Check the server logs"],
    ))
}

/// Assemble the rocket instance without launching it.
pub fn build_rocket(scheduler: Arc<SchedulerService>, port: u16) -> Rocket<Build> {
    let figment = rocket::Config::figment()
        .merge(("address", "0.0.0.0"))
        .merge(("port", port));

    rocket::custom(figment)
        .attach(Cors)
        .manage(scheduler)
        .register("/api", catchers![not_found, internal_error])
        .mount(
            "/api",
            routes![
                health,
                scheduler_status,
                start_scheduler,
                stop_scheduler,
                run_now,
                options,
            ],
        )
}

pub async fn start_web_server(scheduler: Arc<SchedulerService>, port: u16) -> Result<()> {
    info!("Starting DevApply control server on http://0.0.0.0:{}", port);

    build_rocket(scheduler, port)
        .launch()
        .await
        .map_err(|e| anyhow::anyhow!("Rocket failed: {}", e))?;

    Ok(())
}
