use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::call_models::{scalar_to_string, AdditionalData};

/// Keys the call service may echo the lead identifier under.
pub const LEAD_ID_KEYS: &[&str] = &["leadId", "leadID", "lead_id"];
/// Keys the call service may echo the lead UID under.
pub const LEAD_UID_KEYS: &[&str] = &["leadUid", "leadUID", "lead_uid"];

pub const STATUS_SEPARATOR: &str = " | ";

/// Asynchronous status callback from the call service.
///
/// Every field is optional; scalars are kept as raw JSON so numeric and string
/// forms are both accepted.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCallback {
    #[serde(default)]
    pub timestamp: Option<Value>,
    #[serde(default)]
    pub status: Option<Value>,
    #[serde(default)]
    pub call_id: Option<Value>,
    #[serde(default)]
    pub additional_data: Option<Value>,
    #[serde(default)]
    pub lead_id: Option<Value>,
    #[serde(default)]
    pub lead_uid: Option<Value>,
}

/// Identifier carriers on the callback URL.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusQuery {
    pub lead_id: Option<String>,
    pub lead_uid: Option<String>,
    pub debug: Option<String>,
}

impl StatusQuery {
    /// Parse a raw query string. Repeated keys keep their first non-blank
    /// value; unknown keys are ignored.
    pub fn from_query(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        let Some(raw) = raw else {
            return query;
        };

        for (key, value) in url::form_urlencoded::parse(raw.as_bytes()) {
            let slot = match key.as_ref() {
                "leadId" => &mut query.lead_id,
                "leadUid" => &mut query.lead_uid,
                "debug" => &mut query.debug,
                _ => continue,
            };
            if slot.is_none() && !value.trim().is_empty() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Lead identifiers recovered from a status callback.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadIdentifiers {
    pub lead_id: Option<String>,
    pub lead_uid: Option<String>,
}

impl LeadIdentifiers {
    /// Query parameter, then auxiliary data, then top-level body field.
    pub fn resolve(query: &StatusQuery, callback: &StatusCallback) -> Self {
        let additional = AdditionalData::from_value(callback.additional_data.as_ref());

        let lead_id = non_blank(query.lead_id.as_deref())
            .or_else(|| additional.lookup(LEAD_ID_KEYS))
            .or_else(|| callback.lead_id.as_ref().and_then(scalar_to_string));
        let lead_uid = non_blank(query.lead_uid.as_deref())
            .or_else(|| additional.lookup(LEAD_UID_KEYS))
            .or_else(|| callback.lead_uid.as_ref().and_then(scalar_to_string));

        Self { lead_id, lead_uid }
    }
}

/// Compose the free-text status stored on the lead.
///
/// `"<status> | callId=<id> | <timestamp>"`, omitting absent parts.
pub fn compose_status(callback: &StatusCallback) -> String {
    let status = callback
        .status
        .as_ref()
        .and_then(scalar_to_string)
        .unwrap_or_else(|| "unknown".to_string());

    let mut parts = vec![status];
    if let Some(call_id) = callback.call_id.as_ref().and_then(scalar_to_string) {
        parts.push(format!("callId={}", call_id));
    }
    if let Some(timestamp) = callback.timestamp.as_ref().and_then(scalar_to_string) {
        parts.push(timestamp);
    }
    parts.join(STATUS_SEPARATOR)
}

/// Ordered `application/x-www-form-urlencoded` body for the lead platform.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeadUpdateForm {
    fields: Vec<(String, String)>,
}

impl LeadUpdateForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn field(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn encode(&self) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields.iter())
            .finish()
    }

    /// Encoded body with key material masked, for logs.
    pub fn redacted(&self, secret_keys: &[&str]) -> String {
        url::form_urlencoded::Serializer::new(String::new())
            .extend_pairs(self.fields.iter().map(|(k, v)| {
                if secret_keys.contains(&k.as_str()) {
                    (k.as_str(), "[REDACTED]")
                } else {
                    (k.as_str(), v.as_str())
                }
            }))
            .finish()
    }
}

/// Response to the call service. Always sent with HTTP 200.
#[derive(Debug, Default, Serialize)]
pub struct StatusResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub via: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub used: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}
