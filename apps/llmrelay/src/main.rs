mod cli;
mod group_store;
mod proxy;
mod state;

use std::sync::Arc;

use axum::routing::{any, get};
use axum::Router;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use cli::Cli;
use group_store::FileGroupStore;
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let groups = Arc::new(FileGroupStore::new(cli.groups_file.clone()));
    let state = AppState::new(groups);

    let app = Router::new()
        .route("/healthz", get(health))
        .route("/proxy/{*rest}", any(proxy::proxy))
        .with_state(state);

    let addr = format!("{}:{}", cli.host, cli.port);
    tracing::info!(%addr, "starting llmrelay");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health() -> &'static str {
    "ok"
}
