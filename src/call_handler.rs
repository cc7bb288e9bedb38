use crate::call_models::{DryRunResponse, InboundCallRequest, OutboundCallPayload, PayloadShape};
use crate::call_service_client::{CallServiceReply, RelayBody};
use crate::config::Config;
use crate::errors::{AppError, ResultExt};
use crate::handlers::{is_flag_set, AppState, STATUS_CALLBACK_PATH};
use crate::phone::{is_plausible, normalize_phone};
use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{
        header::{CONTENT_TYPE, HOST},
        HeaderMap, Method, StatusCode,
    },
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::Instrument;
use url::Url;
use uuid::Uuid;

/// Query toggles for the call-initiation endpoint.
#[derive(Debug, Default, Deserialize)]
pub struct CallQuery {
    /// `1` logs inbound and outbound payloads.
    pub debug: Option<String>,
    /// `1` skips the outbound call and returns the payload instead.
    pub dry: Option<String>,
}

/// Call-initiation handler.
///
/// Receives a lead platform webhook, normalizes it and asks the call service
/// to place the call. The call service's status and body are relayed back.
///
/// Flow:
/// 1. Reject anything but `POST`.
/// 2. Parse a JSON or form body.
/// 3. Normalize the phone and resolve the callback URL (with lead identifiers).
/// 4. Build the auxiliary data carrying the identifiers.
/// 5. Place the call: flat shape first, wrapped once on a schema mismatch.
pub async fn initiate_call(
    State(state): State<Arc<AppState>>,
    method: Method,
    Query(query): Query<CallQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Response, AppError> {
    if method != Method::POST {
        return Err(AppError::MethodNotAllowed);
    }

    let request_id = Uuid::new_v4();
    process_call_request(&state, query, &headers, &body)
        .instrument(tracing::info_span!("call_initiation", %request_id))
        .await
}

async fn process_call_request(
    state: &AppState,
    query: CallQuery,
    headers: &HeaderMap,
    body: &[u8],
) -> Result<Response, AppError> {
    let debug = is_flag_set(query.debug.as_deref()) || state.config.debug;
    let dry = is_flag_set(query.dry.as_deref());

    let raw = parse_body(headers, body)?;
    if debug {
        let inbound_json = Value::Object(raw.clone());
        tracing::info!("INBOUND call request: {}", inbound_json);
    }

    let inbound = InboundCallRequest::from_body(&raw);
    let host = headers.get(HOST).and_then(|v| v.to_str().ok());
    let payload = build_payload(inbound, &state.config, host)?;

    let flat = payload.to_body(PayloadShape::Flat);
    if debug {
        tracing::info!(
            "OUTBOUND call payload → {}: {}",
            state.call_service.endpoint(),
            flat
        );
    }

    if dry {
        tracing::info!("Dry run: skipping call placement");
        return Ok((
            StatusCode::OK,
            Json(DryRunResponse {
                ok: true,
                mode: "dry-run",
                shape: PayloadShape::Flat,
                outbound: flat,
            }),
        )
            .into_response());
    }

    let negotiated = state
        .call_service
        .place_call_negotiated(&payload)
        .await
        .context("Call placement failed")?;

    tracing::info!(
        "Call service answered {} after {} attempt(s) using {:?} payload",
        negotiated.reply.status,
        negotiated.attempts,
        negotiated.shape
    );
    if debug {
        tracing::info!("Call service response body: {:?}", negotiated.reply.body);
    }

    Ok(relay(negotiated.reply))
}

/// Parses the inbound body as form data or JSON, depending on the content type.
///
/// An empty body is an empty request, validation reports what is missing.
pub fn parse_body(headers: &HeaderMap, body: &[u8]) -> Result<Map<String, Value>, AppError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }

    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();

    if content_type.contains("application/x-www-form-urlencoded") {
        return Ok(url::form_urlencoded::parse(body)
            .map(|(k, v)| (k.into_owned(), Value::String(v.into_owned())))
            .collect());
    }

    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::BadRequest(
            "Request body must be a JSON object".to_string(),
        )),
        Err(e) => Err(AppError::BadRequest(format!("Invalid JSON body: {}", e))),
    }
}

/// Validates the inbound request and turns it into the call service payload.
pub fn build_payload(
    inbound: InboundCallRequest,
    config: &Config,
    host: Option<&str>,
) -> Result<OutboundCallPayload, AppError> {
    let phone = normalize_phone(inbound.phone.as_deref())
        .filter(|p| p.as_str().starts_with('+'))
        .ok_or_else(|| AppError::Validation {
            field: "customerPhoneNumber",
            message: "customerPhoneNumber is missing or invalid (E.164 with +)".to_string(),
        })?;

    if !is_plausible(&phone) {
        tracing::warn!("Phone {} does not look like a valid number, forwarding anyway", phone);
    }

    let status_callback_url = resolve_callback_url(
        inbound.status_callback_url.as_deref(),
        config,
        host,
        inbound.lead_id.as_deref(),
        inbound.lead_uid.as_deref(),
    )?;
    let status_callback_method = inbound.callback_method();

    let additional_data = inbound
        .additional_data
        .into_outbound(inbound.lead_id.as_deref(), inbound.lead_uid.as_deref());

    Ok(OutboundCallPayload {
        phone,
        status_callback_url,
        status_callback_method,
        additional_data,
    })
}

/// Resolves the status-callback URL and stamps the lead identifiers on it.
///
/// Precedence: caller-supplied URL, configured override, then this service's
/// own callback route on the request host.
pub fn resolve_callback_url(
    supplied: Option<&str>,
    config: &Config,
    host: Option<&str>,
    lead_id: Option<&str>,
    lead_uid: Option<&str>,
) -> Result<String, AppError> {
    let invalid = || AppError::Validation {
        field: "statusCallbackUrl",
        message: "statusCallbackUrl must be an absolute http(s) URL".to_string(),
    };

    let base = match supplied.or(config.status_callback_url.as_deref()) {
        Some(url) => url.to_string(),
        None => {
            let host = host.filter(|h| !h.is_empty()).ok_or_else(invalid)?;
            format!("https://{}{}", host, STATUS_CALLBACK_PATH)
        }
    };

    let mut url = Url::parse(&base).map_err(|_| invalid())?;
    if !matches!(url.scheme(), "http" | "https") || !url.has_host() {
        return Err(invalid());
    }

    set_query_params(&mut url, &[("leadId", lead_id), ("leadUid", lead_uid)]);
    Ok(url.into())
}

/// Sets (not appends) the given query parameters, leaving the rest intact.
fn set_query_params(url: &mut Url, params: &[(&str, Option<&str>)]) {
    let updates: Vec<(&str, &str)> = params
        .iter()
        .filter_map(|(key, value)| value.map(|v| (*key, v)))
        .collect();
    if updates.is_empty() {
        return;
    }

    let retained: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !updates.iter().any(|(name, _)| *name == &**key))
        .map(|(key, value)| (key.into_owned(), value.into_owned()))
        .collect();

    url.query_pairs_mut()
        .clear()
        .extend_pairs(retained.iter())
        .extend_pairs(updates.iter());
}

fn relay(reply: CallServiceReply) -> Response {
    let status = StatusCode::from_u16(reply.status).unwrap_or(StatusCode::BAD_GATEWAY);
    match reply.body {
        RelayBody::Json(value) => (status, Json(value)).into_response(),
        RelayBody::Text(text) => (status, text).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::call_models::AdditionalData;
    use serde_json::json;

    fn config() -> Config {
        Config {
            port: 3000,
            call_service_url: "https://calls.example.com/api/v2/calls/enriched".to_string(),
            status_callback_url: None,
            lead_platform_instance: "acme".to_string(),
            lead_platform_domain: "databowl.com".to_string(),
            lead_platform_base_url: None,
            api_key: None,
            secondary_api_key: None,
            campaign_id: "5314".to_string(),
            subcampaign_id: "34".to_string(),
            status_field: "f_status".to_string(),
            invalid_key_marker: "invalid_key".to_string(),
            fallback_include_lead_id: true,
            debug: false,
        }
    }

    #[test]
    fn test_callback_url_gets_lead_params() {
        let url = resolve_callback_url(Some("https://x/cb"), &config(), None, Some("42"), None)
            .unwrap();
        assert_eq!(url, "https://x/cb?leadId=42");

        let url = resolve_callback_url(
            Some("https://x/cb?src=db&leadId=1"),
            &config(),
            None,
            Some("42"),
            Some("u-1"),
        )
        .unwrap();
        assert_eq!(url, "https://x/cb?src=db&leadId=42&leadUid=u-1");
    }

    #[test]
    fn test_callback_url_without_identifiers_is_untouched() {
        let url =
            resolve_callback_url(Some("https://x/cb?a=1"), &config(), None, None, None).unwrap();
        assert_eq!(url, "https://x/cb?a=1");
    }

    #[test]
    fn test_callback_url_fallbacks() {
        let url = resolve_callback_url(None, &config(), Some("bridge.example.com"), None, None)
            .unwrap();
        assert_eq!(url, "https://bridge.example.com/api/calls/status");

        let configured = Config {
            status_callback_url: Some("https://hooks.example.com/status".to_string()),
            ..config()
        };
        let url = resolve_callback_url(None, &configured, Some("ignored"), Some("7"), None)
            .unwrap();
        assert_eq!(url, "https://hooks.example.com/status?leadId=7");
    }

    #[test]
    fn test_callback_url_rejects_relative_and_other_schemes() {
        for bad in ["/api/calls/status", "cb", "ftp://x/cb", "https//x"] {
            let err = resolve_callback_url(Some(bad), &config(), None, None, None).unwrap_err();
            assert!(matches!(
                err,
                AppError::Validation {
                    field: "statusCallbackUrl",
                    ..
                }
            ));
        }

        // No supplied URL, no override, no Host header
        assert!(resolve_callback_url(None, &config(), None, None, None).is_err());
    }

    #[test]
    fn test_parse_body_tolerates_empty() {
        let headers = HeaderMap::new();
        assert!(parse_body(&headers, b"").unwrap().is_empty());
        assert!(parse_body(&headers, b"  \n").unwrap().is_empty());
    }

    #[test]
    fn test_parse_body_form_and_json() {
        let mut headers = HeaderMap::new();
        headers.insert(
            CONTENT_TYPE,
            "application/x-www-form-urlencoded; charset=UTF-8".parse().unwrap(),
        );
        let map = parse_body(&headers, b"phone1=06+1234+5678&leadId=42").unwrap();
        assert_eq!(map["phone1"], json!("06 1234 5678"));
        assert_eq!(map["leadId"], json!("42"));

        let json_headers = HeaderMap::new();
        let map = parse_body(&json_headers, br#"{"leadId": 42}"#).unwrap();
        assert_eq!(map["leadId"], json!(42));

        assert!(parse_body(&json_headers, b"[1,2]").is_err());
        assert!(parse_body(&json_headers, b"{not json").is_err());
    }

    #[test]
    fn test_build_payload_example() {
        let inbound = InboundCallRequest {
            phone: Some("0612345678".to_string()),
            status_callback_url: Some("https://x/cb".to_string()),
            lead_id: Some("42".to_string()),
            ..Default::default()
        };
        let payload = build_payload(inbound, &config(), None).unwrap();

        assert_eq!(payload.phone.as_str(), "+31612345678");
        assert_eq!(payload.status_callback_url, "https://x/cb?leadId=42");
        assert_eq!(payload.status_callback_method, "POST");
        assert_eq!(
            payload.additional_data.map(Value::Object),
            Some(json!({"leadId": "42"}))
        );
    }

    #[test]
    fn test_build_payload_phone_checked_first() {
        let inbound = InboundCallRequest {
            phone: None,
            status_callback_url: Some("relative/cb".to_string()),
            additional_data: AdditionalData::Raw("x".to_string()),
            ..Default::default()
        };
        let err = build_payload(inbound, &config(), None).unwrap_err();
        assert!(matches!(
            err,
            AppError::Validation {
                field: "customerPhoneNumber",
                ..
            }
        ));
    }
}
