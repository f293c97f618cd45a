// src/bin/admin.rs
use anyhow::Result;
use clap::Parser;
use devapply::admin_cli::{handle_admin_command, AdminCli};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("devapply=warn")))
        .init();

    handle_admin_command(AdminCli::parse()).await
}
