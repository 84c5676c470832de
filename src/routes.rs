use axum::{extract::State, response::Json, routing::get, Router};
use rmcp::transport::streamable_http_server::{
    session::local::LocalSessionManager, StreamableHttpService,
};
use serde::Serialize;
use std::sync::Arc;

use crate::{cache::CacheStats, mcp::WeatherMcp, service::WeatherService};

// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<WeatherService>,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub version: String,
    pub calls_today: u64,
    pub calls_remaining: i64,
    pub cache: CacheStats,
}

// Route handlers
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let usage = state.service.usage();
    Json(HealthResponse {
        status: "healthy".to_string(),
        timestamp: chrono::Utc::now(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        calls_today: usage.count,
        calls_remaining: usage.remaining,
        cache: state.service.cache_stats(),
    })
}

// Create the router
pub fn create_router(state: AppState) -> Router {
    let service = state.service.clone();
    let mcp = StreamableHttpService::new(
        move || Ok(WeatherMcp::new(service.clone())),
        LocalSessionManager::default().into(),
        Default::default(),
    );

    Router::new()
        .route("/health", get(health))
        .nest_service("/mcp", mcp)
        .with_state(state)
}
