use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use websoc::aggregate::{Aggregator, SubQueryFetcher};
use websoc::client::WebsocClient;
use websoc::config::Config;
use websoc::server::{create_router, AppState};

const DEFAULT_CONFIG_PATH: &str = "websoc.json";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config_path = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("WEBSOC_CONFIG").ok())
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

    let config = Config::load_or_default(&config_path)
        .map_err(|e| anyhow::anyhow!("{e}"))
        .with_context(|| format!("failed to load {}", config_path.display()))?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("websoc=info"));
    if config.server.log_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer())
            .init();
    }

    let client = WebsocClient::with_config(&config.client).context("failed to build WebSoc client")?;
    info!(
        upstream = %client.endpoint(),
        max_attempts = config.aggregator.max_attempts,
        terminal_policy = ?config.aggregator.terminal_policy,
        "Configured WebSoc aggregator"
    );

    let fetcher: Arc<dyn SubQueryFetcher> = Arc::new(client);
    let state = Arc::new(AppState {
        aggregator: Aggregator::with_config(fetcher, config.aggregator.clone()),
        request_deadline: Duration::from_secs(config.server.request_deadline_secs),
    });

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;
    info!("Listening on http://{address}");

    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutting down");
        })
        .await?;

    Ok(())
}
