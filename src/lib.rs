// src/lib.rs
//! DevApply: daily job-board scraping, per-user deduplication and
//! best-effort notification, driven by a cron scheduler.

pub mod admin_cli;
pub mod core;
pub mod database;
pub mod dedup;
pub mod notify;
pub mod orchestrator;
pub mod scheduler;
pub mod sources;
pub mod types;
pub mod utils;
pub mod web;

pub use orchestrator::{FailurePolicy, RunOrchestrator, RunSummary};
pub use scheduler::SchedulerService;
pub use web::start_web_server;
