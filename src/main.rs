use time::UtcOffset;

mod app;
mod auth;
mod chat;
mod config;
mod db;
mod error;
#[cfg(test)]
mod memory;
mod state;
mod water;

use crate::{config::AppConfig, state::AppState};

fn main() -> anyhow::Result<()> {
    // Must run before the runtime spawns worker threads; afterwards the
    // local offset can no longer be read soundly.
    let local_offset = UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC);

    tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?
        .block_on(run(local_offset))
}

async fn run(local_offset: UtcOffset) -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let env_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "aquatrack=debug,axum=info,tower_http=info".to_string());
    let json_logs = std::env::var("LOG_FORMAT")
        .map(|v| v == "json")
        .unwrap_or(false);

    if json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    let config = AppConfig::from_env()?.with_local_offset(local_offset);
    tracing::info!(offset = %local_offset, models = config.gemini.models.len(), "configuration loaded");

    let state = AppState::init(config).await?;
    app::serve(app::build_app(state)).await
}
