// src/core/http.rs
use anyhow::{Context, Result};
use reqwest::Client;
use std::time::Duration;

/// Shared client for all outbound scraping and notification calls
pub fn build_http_client(timeout_secs: u64, user_agent: &str) -> Result<Client> {
    Client::builder()
        .user_agent(user_agent)
        .timeout(Duration::from_secs(timeout_secs))
        .build()
        .context("Failed to create HTTP client")
}
