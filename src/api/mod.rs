//! REST API server module
//!
//! Provides an OpenAPI 3.1 compliant REST API for submitting validation jobs,
//! following their progress and reading their verdicts.

use crate::{Config, Result, ValidationPipeline};
use axum::{
    Router,
    http::HeaderValue,
    routing::{get, post},
};
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

/// Versioned prefix every route is served under
pub const API_PREFIX: &str = "/api/v1";

/// Create the API router
///
/// Routes live under [`API_PREFIX`]; Swagger UI (if enabled) is at `/swagger-ui`.
///
/// | Method | Path | Purpose |
/// |--------|------|---------|
/// | POST | `/jobs` | Submit an ingested address list |
/// | GET | `/jobs` | List jobs, optionally `?status=` |
/// | GET | `/jobs/:id` | One job |
/// | GET | `/jobs/:id/verdicts` | Verdicts recorded so far |
/// | GET | `/jobs/:id/unprocessed` | Addresses without a verdict |
/// | GET | `/jobs/:id/report` | Job with per-reason counts |
/// | POST | `/jobs/:id/abort` | Administrative abort |
/// | GET | `/health` | Liveness and store reachability |
/// | GET | `/openapi.json` | OpenAPI document |
/// | GET | `/events` | Server-sent lifecycle events |
pub fn create_router(pipeline: Arc<ValidationPipeline>, config: Arc<Config>) -> Router {
    let api = &config.server.api;

    let jobs = Router::new()
        .route("/", post(routes::submit_job).get(routes::list_jobs))
        .route("/:id", get(routes::get_job))
        .route("/:id/verdicts", get(routes::list_verdicts))
        .route("/:id/unprocessed", get(routes::unprocessed_addresses))
        .route("/:id/report", get(routes::job_report))
        .route("/:id/abort", post(routes::abort_job));

    let versioned = Router::new()
        .nest("/jobs", jobs)
        .route("/health", get(routes::health_check))
        .route("/openapi.json", get(routes::openapi_spec))
        .route("/events", get(routes::event_stream));

    let mut router = Router::new().nest(API_PREFIX, versioned);
    if api.swagger_ui {
        let doc_url = format!("{API_PREFIX}/openapi.json");
        router = router.merge(SwaggerUi::new("/swagger-ui").url(doc_url, ApiDoc::openapi()));
    }

    let router = router
        .with_state(AppState::new(pipeline, config.clone()))
        .layer(TraceLayer::new_for_http());

    if api.cors_enabled {
        router.layer(build_cors_layer(&api.cors_origins))
    } else {
        router
    }
}

/// Build a CORS layer based on configured origins
///
/// `"*"` or an empty list allows any origin.
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
/// Runs until the server stops, either due to an error or because the task
/// is aborted.
///
/// # Example
///
/// ```no_run
/// use mailsieve::{Config, ValidationPipeline};
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = Arc::new(Config::default());
/// let pipeline = Arc::new(ValidationPipeline::new((*config).clone()).await?);
///
/// // Start API server (blocks until shutdown)
/// mailsieve::api::start_api_server(pipeline, config).await?;
/// # Ok(())
/// # }
/// ```
pub async fn start_api_server(pipeline: Arc<ValidationPipeline>, config: Arc<Config>) -> Result<()> {
    let bind_address = config.server.api.bind_address;

    tracing::info!(address = %bind_address, "Starting API server");

    let app = create_router(pipeline, config);

    let listener = TcpListener::bind(bind_address)
        .await
        .map_err(crate::error::Error::Io)?;

    tracing::info!(address = %bind_address, "API server listening");

    axum::serve(listener, app)
        .await
        .map_err(|e| crate::error::Error::ApiServerError(e.to_string()))?;

    tracing::info!("API server stopped");
    Ok(())
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;
