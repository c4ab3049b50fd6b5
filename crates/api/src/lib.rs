pub mod models;
pub mod routes;

use crate::routes::{health::health_check, query::query};
use agent_providers::{AgentProvider, HttpAgentConfig, HttpAgentProvider};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use config::{ApiConfig, QueryConfig};
use services::{InteractionLogger, JsonlInteractionLogger, QueryService};
use std::{sync::Arc, time::Duration};
use tower_http::cors::CorsLayer;

/// Request bodies above this size are rejected
const MAX_BODY_BYTES: usize = 1024 * 1024;

#[derive(Clone)]
pub struct AppState {
    pub query_service: Arc<QueryService>,
    pub query_config: QueryConfig,
}

/// Wire the query service from configuration
pub fn init_query_service(config: &ApiConfig) -> anyhow::Result<Arc<QueryService>> {
    let provider = HttpAgentProvider::new(HttpAgentConfig::new(
        config.agent.base_url.clone(),
        config.agent.api_key.clone(),
        Some(config.agent.timeout_secs),
    ))?;
    let provider: Arc<dyn AgentProvider> = Arc::new(provider);

    let interaction_logger: Arc<dyn InteractionLogger> =
        Arc::new(JsonlInteractionLogger::new(config.interaction_log.path.clone()));

    tracing::info!(
        agent_url = %config.agent.base_url,
        interaction_log = %config.interaction_log.path.display(),
        "Query service initialized"
    );

    Ok(Arc::new(
        QueryService::new(provider, interaction_logger)
            .with_idle_timeout(config.agent.idle_timeout_secs.map(Duration::from_secs)),
    ))
}

pub fn build_app(state: AppState) -> Router {
    let api_routes = Router::new()
        .route("/query", post(query))
        .with_state(state);

    Router::new()
        .nest("/api", api_routes)
        .route("/health", get(health_check))
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(CorsLayer::permissive())
}
