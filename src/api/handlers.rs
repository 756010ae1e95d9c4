//! HTTP request handlers with OpenAPI documentation.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::error;
use utoipa::OpenApi;

use crate::app::AppState;
use crate::domain::{
    AppError, ChainError, CycleReport, DedupKey, DeliveryError, ErrorDetail, ErrorResponse,
    HealthResponse, HealthStatus, NotificationRecord, StoreError, WatcherHealth,
};

/// OpenAPI documentation structure
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Order Webhook Watcher Status API",
        description = "Read-only view of watcher health and recorded webhook deliveries",
        license(
            name = "MIT"
        )
    ),
    paths(
        health_check_handler,
        liveness_handler,
        readiness_handler,
        get_delivery_handler,
    ),
    components(
        schemas(
            HealthResponse,
            HealthStatus,
            WatcherHealth,
            CycleReport,
            NotificationRecord,
            ErrorResponse,
            ErrorDetail,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "deliveries", description = "Recorded webhook deliveries")
    )
)]
pub struct ApiDoc;

/// Detailed health check
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Health status of every watcher", body = HealthResponse)
    )
)]
pub async fn health_check_handler(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(health_of(&state))
}

/// Kubernetes liveness probe
#[utoipa::path(
    get,
    path = "/health/live",
    tag = "health",
    responses(
        (status = 200, description = "Process is alive")
    )
)]
pub async fn liveness_handler() -> StatusCode {
    StatusCode::OK
}

/// Kubernetes readiness probe
#[utoipa::path(
    get,
    path = "/health/ready",
    tag = "health",
    responses(
        (status = 200, description = "At least one watcher is fetching"),
        (status = 503, description = "Every watcher is failing to fetch")
    )
)]
pub async fn readiness_handler(State(state): State<Arc<AppState>>) -> StatusCode {
    match health_of(&state).status {
        HealthStatus::Healthy | HealthStatus::Degraded => StatusCode::OK,
        HealthStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    }
}

/// Look up the record written after a successful delivery
#[utoipa::path(
    get,
    path = "/deliveries/{address}/{hash}",
    tag = "deliveries",
    params(
        ("address" = String, Path, description = "Watched address"),
        ("hash" = String, Path, description = "Transaction hash as reported by the chain")
    ),
    responses(
        (status = 200, description = "Delivery record found", body = NotificationRecord),
        (status = 404, description = "Unknown address or no delivery recorded", body = ErrorResponse),
        (status = 500, description = "Dedup store could not be read", body = ErrorResponse)
    )
)]
pub async fn get_delivery_handler(
    State(state): State<Arc<AppState>>,
    Path((address, hash)): Path<(String, String)>,
) -> Result<Json<NotificationRecord>, ApiError> {
    let store = state
        .store_for(&address)
        .ok_or_else(|| ApiError::NotFound(format!("Address {address} is not watched")))?;

    store
        .get(&DedupKey::from_hash(&hash))
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("No delivery recorded for {hash}")))
}

fn health_of(state: &AppState) -> HealthResponse {
    HealthResponse::new(state.watchers.iter().map(|w| w.snapshot()).collect())
}

/// Errors surfaced by the status API
#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    App(AppError),
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError::App(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        match self {
            ApiError::NotFound(message) => error_body(StatusCode::NOT_FOUND, "not_found", message),
            ApiError::App(err) => err.into_response(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, error_type) = match &self {
            AppError::Chain(chain_err) => match chain_err {
                ChainError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                _ => (StatusCode::BAD_GATEWAY, "chain_error"),
            },
            AppError::Delivery(delivery_err) => match delivery_err {
                DeliveryError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "timeout"),
                _ => (StatusCode::BAD_GATEWAY, "delivery_error"),
            },
            AppError::Store(store_err) => match store_err {
                StoreError::Corrupt { .. } => (StatusCode::INTERNAL_SERVER_ERROR, "corrupt_record"),
                _ => (StatusCode::INTERNAL_SERVER_ERROR, "store_error"),
            },
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "configuration_error"),
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_error"),
            AppError::Serialization(_) => {
                (StatusCode::INTERNAL_SERVER_ERROR, "serialization_error")
            }
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal_error"),
        };

        let message = self.to_string();
        if status.is_server_error() {
            error!(error_type = %error_type, message = %message, "Server error");
        }

        error_body(status, error_type, message)
    }
}

fn error_body(status: StatusCode, error_type: &str, message: String) -> axum::response::Response {
    let body = Json(ErrorResponse {
        error: ErrorDetail {
            r#type: error_type.to_string(),
            message,
        },
    });
    (status, body).into_response()
}
