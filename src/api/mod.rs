//! Administrative REST API
//!
//! Exposes subscription management plus read-only views of the pipeline
//! (queue counters, live events). The API never touches the job queue
//! directly; every mutation goes through the subscription controller.

use crate::{Config, Result, Wis2Downloader};
use axum::{Router, http::HeaderValue, routing::get};
use std::sync::Arc;
use tokio::net::TcpListener;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

pub mod error_response;
pub mod openapi;
pub mod routes;
pub mod state;

pub use openapi::ApiDoc;
pub use state::AppState;

/// Create the API router with all route definitions
///
/// # Routes
///
/// ## Subscriptions
/// - `GET /wis2/subscriptions/list` - Current topic → directory mapping
/// - `GET /wis2/subscriptions/add?topic=...&directory=...` - Subscribe to a topic
/// - `GET /wis2/subscriptions/delete?topic=...` - Unsubscribe from a topic
///
/// ## Queue
/// - `GET /queue/stats` - Job queue counters
///
/// ## System
/// - `GET /health` - Health check
/// - `GET /openapi.json` - OpenAPI specification
/// - `GET /swagger-ui` - Interactive documentation (if enabled)
/// - `GET /events` - Server-sent events stream
pub fn create_router(downloader: Arc<Wis2Downloader>, config: Arc<Config>) -> Router {
    let state = AppState::new(downloader, config.clone());

    let router = Router::new()
        // Subscriptions
        .route("/wis2/subscriptions/list", get(routes::list_subscriptions))
        .route("/wis2/subscriptions/add", get(routes::add_subscription))
        .route("/wis2/subscriptions/delete", get(routes::delete_subscription))
        // Queue
        .route("/queue/stats", get(routes::queue_stats))
        // System
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    // SwaggerUi serves its own copy of the spec; keep it off /openapi.json
    let router = if config.server.api.swagger_ui {
        router.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
    } else {
        router
    };

    let router = router.with_state(state).layer(TraceLayer::new_for_http());

    if config.server.api.cors_enabled {
        let cors = build_cors_layer(&config.server.api.cors_origins);
        router.layer(cors)
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` (or an empty list) allows any origin.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    let allow_any = origins.iter().any(|o| o == "*");

    if allow_any || origins.is_empty() {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let allowed: Vec<HeaderValue> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(AllowOrigin::list(allowed))
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

/// Start the API server on the configured bind address.
///
/// Runs until the pipeline begins shutting down, then stops accepting
/// connections and lets open requests finish.
///
/// # Errors
///
/// Returns an error if the address cannot be bound or the server fails.
pub async fn start_api_server(downloader: Arc<Wis2Downloader>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.server.api.bind_address;
    tracing::info!(address = %bind_address, "Starting API server");

    let cancel = downloader.cancel.clone();
    let app = create_router(downloader, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(async move { cancel.cancelled().await })
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
