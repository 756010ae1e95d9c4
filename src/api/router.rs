//! Router assembly for the status API.

use std::sync::Arc;

use axum::{Router, routing::get};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use super::handlers::{
    ApiDoc, get_delivery_handler, health_check_handler, liveness_handler, readiness_handler,
};
use crate::app::AppState;

/// Build the status router with tracing and Swagger UI
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check_handler))
        .route("/health/live", get(liveness_handler))
        .route("/health/ready", get(readiness_handler))
        .route("/deliveries/{address}/{hash}", get(get_delivery_handler))
        .with_state(state)
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .layer(TraceLayer::new_for_http())
}
