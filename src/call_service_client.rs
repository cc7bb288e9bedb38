use crate::call_models::{OutboundCallPayload, PayloadShape};
use crate::errors::AppError;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use std::time::Duration;

/// Field the call service names when it wants the wrapped shape.
const CALL_DETAILS_FIELD: &str = "calldetails";

/// Upstream body, kept as JSON when it parses.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayBody {
    Json(Value),
    Text(String),
}

impl RelayBody {
    pub fn from_text(text: String) -> Self {
        match serde_json::from_str(&text) {
            Ok(value) => RelayBody::Json(value),
            Err(_) => RelayBody::Text(text),
        }
    }

    fn mentions_call_details(&self) -> bool {
        match self {
            RelayBody::Json(value) => value_mentions(value, CALL_DETAILS_FIELD),
            RelayBody::Text(text) => text.to_lowercase().contains(CALL_DETAILS_FIELD),
        }
    }
}

/// Whether any key or string inside `value` contains `needle` (lowercase).
fn value_mentions(value: &Value, needle: &str) -> bool {
    match value {
        Value::String(s) => s.to_lowercase().contains(needle),
        Value::Array(items) => items.iter().any(|item| value_mentions(item, needle)),
        Value::Object(map) => map
            .iter()
            .any(|(key, item)| key.to_lowercase().contains(needle) || value_mentions(item, needle)),
        _ => false,
    }
}

/// Status and body of one call-placement attempt.
#[derive(Debug, Clone)]
pub struct CallServiceReply {
    pub status: u16,
    pub body: RelayBody,
}

/// Classification of a reply, derived once and used for the retry decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlacementOutcome {
    Success,
    /// Client error complaining about the missing `callDetails` object.
    SchemaMismatch,
    OtherError,
}

impl PlacementOutcome {
    pub fn classify(reply: &CallServiceReply) -> Self {
        if (200..300).contains(&reply.status) {
            PlacementOutcome::Success
        } else if (400..500).contains(&reply.status) && reply.body.mentions_call_details() {
            PlacementOutcome::SchemaMismatch
        } else {
            PlacementOutcome::OtherError
        }
    }
}

/// Final reply plus how we got there.
#[derive(Debug, Clone)]
pub struct NegotiatedReply {
    pub reply: CallServiceReply,
    pub shape: PayloadShape,
    pub attempts: u8,
}

/// Client for the call service's call-placement endpoint.
#[derive(Clone)]
pub struct CallServiceClient {
    client: reqwest::Client,
    endpoint: String,
}

impl CallServiceClient {
    /// Creates a new `CallServiceClient`.
    ///
    /// # Arguments
    ///
    /// * `endpoint` - Full URL of the call-placement endpoint.
    pub fn new(endpoint: String) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create call service client: {}", e))
            })?;

        Ok(Self { client, endpoint })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Sends one call-placement request and captures the raw reply.
    pub async fn place_call(&self, body: &Value) -> Result<CallServiceReply, AppError> {
        let response = self
            .client
            .post(&self.endpoint)
            .header(CONTENT_TYPE, "application/json")
            .header(ACCEPT, "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Call service request failed: {}", e)))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to read call service response: {}", e))
        })?;

        Ok(CallServiceReply {
            status,
            body: RelayBody::from_text(text),
        })
    }

    /// Places the call with the flat shape, retrying once wrapped on a schema mismatch.
    ///
    /// # Returns
    ///
    /// * `Result<NegotiatedReply, AppError>` - The last reply received; at most two attempts.
    pub async fn place_call_negotiated(
        &self,
        payload: &OutboundCallPayload,
    ) -> Result<NegotiatedReply, AppError> {
        let first = self.place_call(&payload.to_body(PayloadShape::Flat)).await?;

        match PlacementOutcome::classify(&first) {
            PlacementOutcome::SchemaMismatch => {
                tracing::info!(
                    "Call service rejected flat payload ({}), retrying with callDetails",
                    first.status
                );
                let second = self
                    .place_call(&payload.to_body(PayloadShape::Wrapped))
                    .await?;
                if PlacementOutcome::classify(&second) == PlacementOutcome::SchemaMismatch {
                    tracing::warn!("Call service rejected both payload shapes");
                }
                Ok(NegotiatedReply {
                    reply: second,
                    shape: PayloadShape::Wrapped,
                    attempts: 2,
                })
            }
            _ => Ok(NegotiatedReply {
                reply: first,
                shape: PayloadShape::Flat,
                attempts: 1,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn reply(status: u16, body: RelayBody) -> CallServiceReply {
        CallServiceReply { status, body }
    }

    #[test]
    fn test_client_creation() {
        let client = CallServiceClient::new("https://example.com/calls".to_string());
        assert!(client.is_ok());
    }

    #[test]
    fn test_relay_body_parsing() {
        assert_eq!(
            RelayBody::from_text(r#"{"id":"c1"}"#.to_string()),
            RelayBody::Json(json!({"id": "c1"}))
        );
        assert_eq!(
            RelayBody::from_text("Bad Gateway".to_string()),
            RelayBody::Text("Bad Gateway".to_string())
        );
    }

    #[test]
    fn test_classify_schema_mismatch() {
        let r = reply(
            400,
            RelayBody::Json(json!({"errors": {"callDetails": "required"}})),
        );
        assert_eq!(PlacementOutcome::classify(&r), PlacementOutcome::SchemaMismatch);

        let r = reply(
            422,
            RelayBody::Json(json!({"errors": [{"message": "The CallDetails field is required."}]})),
        );
        assert_eq!(PlacementOutcome::classify(&r), PlacementOutcome::SchemaMismatch);

        let r = reply(400, RelayBody::Text("callDetails is required".to_string()));
        assert_eq!(PlacementOutcome::classify(&r), PlacementOutcome::SchemaMismatch);
    }

    #[test]
    fn test_classify_other_outcomes() {
        let r = reply(201, RelayBody::Json(json!({"callDetails": {"id": 1}})));
        assert_eq!(PlacementOutcome::classify(&r), PlacementOutcome::Success);

        let r = reply(
            400,
            RelayBody::Json(json!({"errors": {"customerPhoneNumber": "invalid"}})),
        );
        assert_eq!(PlacementOutcome::classify(&r), PlacementOutcome::OtherError);

        // Server errors never trigger the reshaped retry
        let r = reply(500, RelayBody::Text("callDetails exploded".to_string()));
        assert_eq!(PlacementOutcome::classify(&r), PlacementOutcome::OtherError);
    }
}
