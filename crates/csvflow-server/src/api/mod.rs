pub mod response;

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower_http::compression::CompressionLayer;

use crate::config::Config;
use crate::features;
use crate::ingest::framework::{JobStore, ProgressReporter, UploadDispatcher};
use crate::middleware;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn JobStore>,
    pub dispatcher: UploadDispatcher,
    pub reporter: ProgressReporter,
}

impl AppState {
    /// Wire the dispatcher and reporter around one job store
    pub fn new(store: Arc<dyn JobStore>, config: &Config) -> Self {
        let dispatcher =
            UploadDispatcher::new(store.clone(), config.pipeline.clone(), config.upload.clone());
        let reporter = ProgressReporter::new(store.clone(), config.pipeline.flush_interval);

        Self {
            store,
            dispatcher,
            reporter,
        }
    }
}

/// Create the application router with all routes and middleware
pub fn create_router(state: AppState, config: &Config) -> Router {
    let feature_state = features::FeatureState {
        dispatcher: state.dispatcher.clone(),
        reporter: state.reporter.clone(),
    };

    let health_routes = Router::new()
        .route("/health", get(health_check))
        .with_state(state);

    Router::new()
        .route("/", get(root))
        .merge(health_routes.clone())
        .nest("/api/v1", features::router(feature_state).merge(health_routes))
        // Apply layers from innermost to outermost
        .layer(CompressionLayer::new())
        .layer(middleware::tracing_layer())
        .layer(middleware::cors_layer(&config.cors))
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "csvflow",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

/// Health check handler
async fn health_check(State(state): State<AppState>) -> Response {
    match state.store.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "status": "healthy",
                "job_store": "connected",
                "pipelines_in_flight": state.dispatcher.in_flight(),
            })),
        )
            .into_response(),
        Err(e) => {
            tracing::error!("Job store health check failed: {:?}", e);
            crate::error::AppError::Unavailable("Job store is unreachable".to_string())
                .into_response()
        },
    }
}
