// src/core/mod.rs
//! Shared services: configuration, storage, outbound HTTP

pub mod config_manager;
pub mod database;
pub mod http;

pub use config_manager::ConfigManager;
pub use database::Database;
pub use http::build_http_client;
