use serde::Serialize;
use serde_json::{json, Map, Value};

use crate::phone::NormalizedPhone;

/// Accepted inbound names for the customer phone, in precedence order.
pub const PHONE_ALIASES: &[&str] = &["customerPhoneNumber", "phone1"];
pub const CALLBACK_URL_ALIASES: &[&str] = &["statusCallbackUrl"];
pub const CALLBACK_METHOD_ALIASES: &[&str] = &["statusCallbackMethod"];
pub const LEAD_ID_ALIASES: &[&str] = &["leadId"];
pub const LEAD_UID_ALIASES: &[&str] = &["leadUid"];
pub const ADDITIONAL_DATA_ALIASES: &[&str] = &["additionalData"];

/// Coerce a scalar JSON value to a non-blank string.
///
/// Strings are trimmed; numbers use their decimal form. Anything else is absent.
pub fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => {
            let trimmed = s.trim();
            (!trimmed.is_empty()).then(|| trimmed.to_string())
        }
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// First non-blank scalar among `aliases`.
pub fn resolve_field(body: &Map<String, Value>, aliases: &[&str]) -> Option<String> {
    aliases
        .iter()
        .filter_map(|alias| body.get(*alias))
        .find_map(scalar_to_string)
}

/// Free-form data echoed back by the call service in its status callback.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum AdditionalData {
    #[default]
    None,
    Object(Map<String, Value>),
    Raw(String),
}

impl AdditionalData {
    /// Interpret whatever the caller put in the auxiliary-data slot.
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => AdditionalData::None,
            Some(Value::Object(map)) => AdditionalData::Object(map.clone()),
            Some(Value::String(s)) => {
                if s.trim().is_empty() {
                    return AdditionalData::None;
                }
                match serde_json::from_str::<Value>(s) {
                    Ok(Value::Object(map)) => AdditionalData::Object(map),
                    _ => AdditionalData::Raw(s.clone()),
                }
            }
            Some(other) => AdditionalData::Raw(other.to_string()),
        }
    }

    /// Lookup a field by the first matching key; only meaningful for objects.
    pub fn lookup(&self, keys: &[&str]) -> Option<String> {
        match self {
            AdditionalData::Object(map) => resolve_field(map, keys),
            _ => None,
        }
    }

    /// Build the outbound object, injecting the correlation identifiers as strings.
    pub fn into_outbound(
        self,
        lead_id: Option<&str>,
        lead_uid: Option<&str>,
    ) -> Option<Map<String, Value>> {
        let mut map = match self {
            AdditionalData::Object(map) => map,
            AdditionalData::Raw(raw) => {
                let mut map = Map::new();
                map.insert("raw".to_string(), Value::String(raw));
                map
            }
            AdditionalData::None if lead_id.is_some() || lead_uid.is_some() => Map::new(),
            AdditionalData::None => return None,
        };

        // The call service rejects numeric identifiers here, always send strings
        if let Some(id) = lead_id {
            map.insert("leadId".to_string(), Value::String(id.to_string()));
        }
        if let Some(uid) = lead_uid {
            map.insert("leadUid".to_string(), Value::String(uid.to_string()));
        }

        Some(map)
    }
}

/// Call request received from the lead platform, after alias resolution.
#[derive(Debug, Clone, Default)]
pub struct InboundCallRequest {
    pub phone: Option<String>,
    pub status_callback_url: Option<String>,
    pub status_callback_method: Option<String>,
    pub lead_id: Option<String>,
    pub lead_uid: Option<String>,
    pub additional_data: AdditionalData,
}

impl InboundCallRequest {
    pub fn from_body(body: &Map<String, Value>) -> Self {
        Self {
            phone: resolve_field(body, PHONE_ALIASES),
            status_callback_url: resolve_field(body, CALLBACK_URL_ALIASES),
            status_callback_method: resolve_field(body, CALLBACK_METHOD_ALIASES),
            lead_id: resolve_field(body, LEAD_ID_ALIASES),
            lead_uid: resolve_field(body, LEAD_UID_ALIASES),
            additional_data: AdditionalData::from_value(
                ADDITIONAL_DATA_ALIASES
                    .iter()
                    .find_map(|alias| body.get(*alias)),
            ),
        }
    }

    /// Callback method to hand to the call service, `POST` unless overridden.
    pub fn callback_method(&self) -> String {
        self.status_callback_method
            .as_deref()
            .unwrap_or("POST")
            .to_uppercase()
    }
}

/// Which JSON layout the call service receives the phone number in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadShape {
    /// `customerPhoneNumber` at the top level.
    Flat,
    /// `customerPhoneNumber` nested under `callDetails`.
    Wrapped,
}

/// Everything the call service needs to place a call, independent of shape.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundCallPayload {
    pub phone: NormalizedPhone,
    pub status_callback_url: String,
    pub status_callback_method: String,
    pub additional_data: Option<Map<String, Value>>,
}

impl OutboundCallPayload {
    /// Render the JSON body for the requested shape.
    pub fn to_body(&self, shape: PayloadShape) -> Value {
        let mut body = Map::new();
        match shape {
            PayloadShape::Flat => {
                body.insert("customerPhoneNumber".to_string(), json!(self.phone));
            }
            PayloadShape::Wrapped => {
                body.insert(
                    "callDetails".to_string(),
                    json!({ "customerPhoneNumber": self.phone }),
                );
            }
        }
        body.insert(
            "statusCallbackUrl".to_string(),
            json!(self.status_callback_url),
        );
        body.insert(
            "statusCallbackMethod".to_string(),
            json!(self.status_callback_method),
        );
        if let Some(ref data) = self.additional_data {
            body.insert("additionalData".to_string(), Value::Object(data.clone()));
        }
        Value::Object(body)
    }
}

/// Body returned for `?dry=1` requests.
#[derive(Debug, Serialize)]
pub struct DryRunResponse {
    pub ok: bool,
    pub mode: &'static str,
    pub shape: PayloadShape,
    pub outbound: Value,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phone::normalize_phone;

    fn body(value: Value) -> Map<String, Value> {
        match value {
            Value::Object(map) => map,
            _ => panic!("Expected object"),
        }
    }

    #[test]
    fn test_phone_alias_precedence() {
        let req = InboundCallRequest::from_body(&body(json!({
            "customerPhoneNumber": "0612345678",
            "phone1": "0687654321"
        })));
        assert_eq!(req.phone.as_deref(), Some("0612345678"));

        let req = InboundCallRequest::from_body(&body(json!({
            "customerPhoneNumber": "  ",
            "phone1": "0687654321"
        })));
        assert_eq!(req.phone.as_deref(), Some("0687654321"));
    }

    #[test]
    fn test_numeric_lead_id_coerced_to_string() {
        let req = InboundCallRequest::from_body(&body(json!({ "leadId": 42 })));
        assert_eq!(req.lead_id.as_deref(), Some("42"));
    }

    #[test]
    fn test_callback_method_defaults_to_post() {
        let req = InboundCallRequest::default();
        assert_eq!(req.callback_method(), "POST");

        let req = InboundCallRequest::from_body(&body(json!({ "statusCallbackMethod": "get" })));
        assert_eq!(req.callback_method(), "GET");
    }

    #[test]
    fn test_additional_data_variants() {
        assert_eq!(AdditionalData::from_value(None), AdditionalData::None);
        assert_eq!(
            AdditionalData::from_value(Some(&json!(""))),
            AdditionalData::None
        );
        assert_eq!(
            AdditionalData::from_value(Some(&json!({"a": 1}))),
            AdditionalData::Object(body(json!({"a": 1})))
        );
        assert_eq!(
            AdditionalData::from_value(Some(&json!("{\"a\":1}"))),
            AdditionalData::Object(body(json!({"a": 1})))
        );
        assert_eq!(
            AdditionalData::from_value(Some(&json!("[1,2]"))),
            AdditionalData::Raw("[1,2]".to_string())
        );
        assert_eq!(
            AdditionalData::from_value(Some(&json!("campaign spring"))),
            AdditionalData::Raw("campaign spring".to_string())
        );
    }

    #[test]
    fn test_outbound_injects_string_identifiers() {
        let data = AdditionalData::Object(body(json!({"leadId": 42, "source": "web"})));
        let out = data.into_outbound(Some("42"), None).unwrap();
        assert_eq!(out["leadId"], json!("42"));
        assert_eq!(out["source"], json!("web"));
        assert!(!out.contains_key("leadUid"));
    }

    #[test]
    fn test_outbound_wraps_raw_and_creates_object_for_ids() {
        let out = AdditionalData::Raw("hello".to_string())
            .into_outbound(None, Some("abc"))
            .unwrap();
        assert_eq!(Value::Object(out), json!({"raw": "hello", "leadUid": "abc"}));

        let out = AdditionalData::None.into_outbound(Some("7"), None).unwrap();
        assert_eq!(Value::Object(out), json!({"leadId": "7"}));

        assert!(AdditionalData::None.into_outbound(None, None).is_none());
    }

    #[test]
    fn test_payload_shapes() {
        let payload = OutboundCallPayload {
            phone: normalize_phone(Some("0612345678")).unwrap(),
            status_callback_url: "https://x/cb?leadId=42".to_string(),
            status_callback_method: "POST".to_string(),
            additional_data: None,
        };

        assert_eq!(
            payload.to_body(PayloadShape::Flat),
            json!({
                "customerPhoneNumber": "+31612345678",
                "statusCallbackUrl": "https://x/cb?leadId=42",
                "statusCallbackMethod": "POST"
            })
        );
        assert_eq!(
            payload.to_body(PayloadShape::Wrapped),
            json!({
                "callDetails": {"customerPhoneNumber": "+31612345678"},
                "statusCallbackUrl": "https://x/cb?leadId=42",
                "statusCallbackMethod": "POST"
            })
        );
    }
}
