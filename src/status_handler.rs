use crate::errors::AppError;
use crate::handlers::{is_flag_set, AppState};
use crate::lead_platform_client::{key_attempts, UpdateOutcome};
use crate::status_models::{
    compose_status, LeadIdentifiers, StatusCallback, StatusQuery, StatusResponse,
};
use axum::{
    body::Bytes,
    extract::{rejection::BytesRejection, RawQuery, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;
use tracing::Instrument;
use uuid::Uuid;

/// Call service status-callback handler.
///
/// Records the call outcome on the originating lead. Always answers 200 so the
/// call service never re-delivers; failures only show up in the logs.
///
/// Update order:
/// 1. Targeted update by lead id, trying each configured key variant.
/// 2. Generic submission keyed by lead UID.
/// 3. Nothing to update with: logged no-op.
pub async fn status_callback(
    State(state): State<Arc<AppState>>,
    RawQuery(raw_query): RawQuery,
    body: Result<Bytes, BytesRejection>,
) -> (StatusCode, Json<StatusResponse>) {
    let query = StatusQuery::from_query(raw_query.as_deref());
    let request_id = Uuid::new_v4();
    let span = tracing::info_span!("status_callback", %request_id);

    let response = match body {
        Ok(body) => {
            process_status_callback(&state, query, &body)
                .instrument(span)
                .await
        }
        Err(rejection) => span.in_scope(|| {
            tracing::error!("Failed to read status callback body: {}", rejection);
            StatusResponse {
                ok: false,
                error: Some(rejection.body_text()),
                ..Default::default()
            }
        }),
    };

    (StatusCode::OK, Json(response))
}

/// Parse the callback body; an empty body is an empty callback.
pub fn parse_callback(body: &[u8]) -> Result<StatusCallback, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(StatusCallback::default());
    }
    serde_json::from_slice(body)
        .map_err(|e| AppError::BadRequest(format!("Invalid status callback body: {}", e)))
}

async fn process_status_callback(
    state: &AppState,
    query: StatusQuery,
    body: &[u8],
) -> StatusResponse {
    let debug = is_flag_set(query.debug.as_deref()) || state.config.debug;

    let callback = match parse_callback(body) {
        Ok(callback) => callback,
        Err(e) => {
            tracing::error!("Failed to process status callback: {}", e);
            return StatusResponse {
                ok: false,
                error: Some(e.to_string()),
                ..Default::default()
            };
        }
    };

    if debug {
        tracing::info!(
            "INBOUND status callback: {}",
            serde_json::to_string(&callback).unwrap_or_default()
        );
    }

    let ids = LeadIdentifiers::resolve(&query, &callback);
    let status_value = compose_status(&callback);
    tracing::info!(
        "Status callback for lead_id={:?}, lead_uid={:?}: {}",
        ids.lead_id,
        ids.lead_uid,
        status_value
    );

    if let Some(ref lead_id) = ids.lead_id {
        if let Some(used) = try_targeted_update(state, lead_id, &status_value, debug).await {
            return StatusResponse {
                ok: true,
                via: Some("update-api"),
                used: Some(used),
                ..Default::default()
            };
        }
    }

    if let Some(ref lead_uid) = ids.lead_uid {
        return match state
            .lead_platform
            .submit_by_uid(lead_uid, ids.lead_id.as_deref(), &status_value, debug)
            .await
        {
            Ok(reply) => {
                if reply.is_success() {
                    tracing::info!("✓ Fallback submission accepted for lead_uid={}", lead_uid);
                } else {
                    tracing::warn!(
                        "Fallback submission for lead_uid={} answered {}: {}",
                        lead_uid,
                        reply.status,
                        reply.text
                    );
                }
                StatusResponse {
                    ok: true,
                    via: Some("fallback-uid"),
                    ..Default::default()
                }
            }
            Err(e) => {
                tracing::error!("Fallback submission for lead_uid={} failed: {}", lead_uid, e);
                StatusResponse {
                    ok: false,
                    via: Some("fallback-uid"),
                    error: Some(e.to_string()),
                    ..Default::default()
                }
            }
        };
    }

    tracing::info!("No lead update performed: no usable lead id/key and no lead uid");
    StatusResponse {
        ok: false,
        reason: Some("no-valid-update-path"),
        ..Default::default()
    }
}

/// Tries each key variant against the targeted update endpoint.
///
/// Returns the key parameter that worked, or `None` to fall through.
async fn try_targeted_update(
    state: &AppState,
    lead_id: &str,
    status_value: &str,
    debug: bool,
) -> Option<&'static str> {
    let attempts = key_attempts(&state.config);
    if attempts.is_empty() {
        tracing::debug!("No lead platform API key configured, skipping targeted update");
        return None;
    }

    for attempt in &attempts {
        match state
            .lead_platform
            .update_lead(lead_id, attempt, status_value, debug)
            .await
        {
            Ok(UpdateOutcome::Updated) => {
                tracing::info!("✓ Lead {} updated ({})", lead_id, attempt.label());
                return Some(attempt.param.as_str());
            }
            Ok(UpdateOutcome::InvalidKey) => {
                tracing::warn!("Lead platform rejected key {}", attempt.label());
            }
            Ok(UpdateOutcome::Rejected { status, body }) => {
                tracing::warn!(
                    "Targeted update of lead {} failed with {}: {}",
                    lead_id,
                    status,
                    body
                );
                return None;
            }
            Err(e) => {
                tracing::error!("Targeted update of lead {} errored: {}", lead_id, e);
                return None;
            }
        }
    }

    tracing::warn!(
        "All {} key variant(s) rejected for lead {}",
        attempts.len(),
        lead_id
    );
    None
}
