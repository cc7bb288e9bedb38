use crate::call_handler;
use crate::call_service_client::CallServiceClient;
use crate::config::Config;
use crate::errors::AppError;
use crate::lead_platform_client::LeadPlatformClient;
use crate::status_handler;
use axum::{
    http::StatusCode,
    routing::{any, get},
    Json, Router,
};
use serde_json::json;
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, limit::RequestBodyLimitLayer, trace::TraceLayer};

/// Route of the call-initiation endpoint.
pub const CALL_PATH: &str = "/api/calls";
/// Route of the status-callback endpoint, also the default callback target.
pub const STATUS_CALLBACK_PATH: &str = "/api/calls/status";

/// Shared application state injected into handlers.
///
/// Immutable after startup; each request works on its own copies.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Config,
    /// Client for the call service's call-placement endpoint.
    pub call_service: CallServiceClient,
    /// Client for the lead platform's update endpoints.
    pub lead_platform: LeadPlatformClient,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self, AppError> {
        let call_service = CallServiceClient::new(config.call_service_url.clone())?;
        let lead_platform = LeadPlatformClient::new(&config)?;

        Ok(Self {
            config,
            call_service,
            lead_platform,
        })
    }
}

/// `?debug=1` / `?dry=1` style toggles.
pub fn is_flag_set(value: Option<&str>) -> bool {
    value == Some("1")
}

/// Health check endpoint.
///
/// # Returns
///
/// * `(StatusCode, Json<serde_json::Value>)` - HTTP 200 OK with health status JSON.
pub async fn health() -> (StatusCode, Json<serde_json::Value>) {
    (
        StatusCode::OK,
        Json(json!({
            "status": "healthy",
            "service": "lead-call-bridge",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
}

/// Request size limit for call initiation: 1MB is plenty for lead payloads.
pub const CALL_BODY_LIMIT: usize = 1024 * 1024;

/// Builds the application router with tracing, CORS and a body size limit.
///
/// The limit only guards call initiation. The status callback must answer
/// 200 whatever arrives, so it reads the body itself and reports oversized
/// input in its JSON reply.
///
/// Rate limiting is added by the binary, since it needs peer addresses.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            CALL_PATH,
            any(call_handler::initiate_call).layer(RequestBodyLimitLayer::new(CALL_BODY_LIMIT)),
        )
        .route(STATUS_CALLBACK_PATH, any(status_handler::status_callback))
        .with_state(state)
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
}
