use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use tracing::info;

mod cache;
mod config;
mod dashboard;
mod live_scores;
mod models;

use cache::FreshnessCache;
use config::Config;
use dashboard::AppState;
use live_scores::ProviderRegistry;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialise tracing / logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::parse();
    config.validate()?;

    let state = AppState {
        providers: ProviderRegistry::from_config(&config)?,
        cache: FreshnessCache::new(config.cache_ttl()),
    };
    info!(
        "Configured {} sport provider(s), cache TTL {:?}",
        state.providers.len(),
        state.cache.ttl()
    );
    if !config.placeholders {
        info!("Placeholder data disabled; total outages return empty results");
    }

    let app = dashboard::router(state, config.static_dir.as_deref());
    if let Some(dir) = &config.static_dir {
        info!("Serving tracker client from {}", dir.display());
    }

    let addr: SocketAddr = config.listen_addr.parse()?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("binding {}", addr))?;
    info!("Tracker listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}
