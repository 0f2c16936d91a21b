use std::sync::Arc;

use git_sync_commit::config::Config;
use git_sync_commit::http::{AppState, build_router};
use git_sync_commit::orchestrator::AppContext;
use git_sync_commit::store_adapter::StoreAdapter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_env("RUST_LOG").unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = Config::from_env()?;

    let ctx = Arc::new(AppContext {
        repos: StoreAdapter::new(config.repos_store),
        file_transfer: StoreAdapter::new(config.file_transfer_store),
    });
    let state = AppState {
        ctx,
        shared_secret: Arc::from(config.internal_shared_secret.as_str()),
    };

    let router = build_router(state);

    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;
    tracing::info!(addr = %config.bind_addr, "git-sync-commit listening");
    axum::serve(listener, router).await?;
    Ok(())
}
