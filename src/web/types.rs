// src/web/types.rs
use rocket::serde::Serialize;

use crate::scheduler::SchedulerState;

#[derive(Serialize)]
#[serde(crate = "rocket::serde", rename_all = "lowercase")]
pub enum ResponseType {
    Data,
    Error,
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct DataResponse<T> {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub message: String,
    pub data: T,
}

impl<T> DataResponse<T> {
    pub fn success(message: impl Into<String>, data: T) -> Self {
        Self {
            response_type: ResponseType::Data,
            success: true,
            message: message.into(),
            data,
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct StandardErrorResponse {
    #[serde(rename = "type")]
    pub response_type: ResponseType,
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub suggestions: Vec<String>,
}

impl StandardErrorResponse {
    pub fn new(error: impl Into<String>, error_code: &str, suggestions: &[&str]) -> Self {
        Self {
            response_type: ResponseType::Error,
            success: false,
            error: error.into(),
            error_code: error_code.to_string(),
            suggestions: suggestions.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[derive(Serialize)]
#[serde(crate = "rocket::serde")]
pub struct HealthData {
    pub status: &'static str,
    pub database: &'static str,
    pub scheduler: SchedulerState,
    pub version: &'static str,
}
