#![allow(dead_code)]

mod auth;
mod azure;
mod config;
mod cost;
mod errors;
mod handlers;
mod models;

use std::sync::Arc;

use axum::{
    http::HeaderValue,
    routing::{get, post},
    Router,
};
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::handlers::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cloudspend=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    // Load configuration
    let config = AppConfig::load()?;
    tracing::info!(
        endpoint = %config.azure.resource_manager_endpoint,
        "Configuration loaded"
    );

    // Shared HTTP client for all Azure calls
    let http = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(60))
        .build()?;

    let state = AppState {
        http,
        config: Arc::new(config.clone()),
    };

    // CORS configuration
    let origins: Vec<HeaderValue> = config
        .cors
        .allowed_origins
        .iter()
        .filter_map(|o| o.parse().ok())
        .collect();
    let cors = if origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods(Any)
            .allow_headers(Any)
    };

    let app = Router::new()
        .route("/health", get(handlers::health::health_check))
        .route(
            "/api/v1/cost/subscriptions",
            get(handlers::subscriptions::list_subscriptions),
        )
        .route(
            "/api/v1/cost/subscriptions/batch-costs",
            post(handlers::costs::get_batch_subscription_costs),
        )
        .route(
            "/api/v1/cost/subscriptions/:subscription_id/costs",
            get(handlers::costs::get_subscription_costs),
        )
        .route(
            "/api/v1/cost/subscriptions/:subscription_id/resourcegroups/:resource_group_name/costs",
            get(handlers::costs::get_resource_group_costs),
        )
        .route(
            "/api/v1/cost/subscriptions/:subscription_id/costs/generate-report",
            post(handlers::reports::generate_report),
        )
        .route(
            "/api/v1/cost/subscriptions/:subscription_id/available-tags",
            get(handlers::tags::get_available_tags),
        )
        .route(
            "/api/v1/cost/download-report/:file_name",
            get(handlers::reports::download_report),
        )
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("cloudspend API listening on {addr}");
    axum::serve(listener, app).await?;

    Ok(())
}
