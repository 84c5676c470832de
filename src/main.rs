use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod accounting;
mod cache;
mod clock;
mod config;
mod location;
mod mcp;
mod prompts;
mod provider;
mod routes;
mod service;
mod transport;
mod units;

use clock::SystemClock;
use config::{Config, Transport};
use mcp::WeatherMcp;
use routes::{create_router, AppState};
use service::WeatherService;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    let config = Config::from_env()?;

    // stdout carries protocol traffic in stdio mode, so logs go to stderr
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "weather_query_server={},tower_http=info",
                    config.log_level.to_lowercase()
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!("Starting {}", config.server_name);
    tracing::info!(
        "Cache TTL {}s, daily call limit {}",
        config.cache_ttl_secs,
        config.max_daily_calls
    );

    let mode = config.transport;
    let port = config.port;
    let service = Arc::new(WeatherService::from_config(config, Arc::new(SystemClock))?);

    match mode {
        Transport::Stdio => {
            tracing::info!("Serving MCP on stdin/stdout");
            transport::serve_stdio(WeatherMcp::new(service), tokio::io::stdin(), tokio::io::stdout())
                .await?;
        }
        Transport::Http => {
            let app = create_router(AppState { service })
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive());

            let address = format!("0.0.0.0:{}", port);
            let listener = tokio::net::TcpListener::bind(&address).await?;
            tracing::info!("Server starting on http://{}/mcp", address);

            axum::serve(listener, app).await?;
        }
    }

    Ok(())
}
