// src/types/mod.rs
pub mod errors;
pub mod models;

pub use errors::{FetchError, PipelineError, RunError, SchedulerError, SkipReason};
pub use models::*;
