use crate::config::Config;
use crate::errors::AppError;
use crate::status_models::LeadUpdateForm;
use reqwest::header::{CONTENT_LENGTH, CONTENT_TYPE, HOST};
use sha2::{Digest, Sha256};
use std::time::Duration;

/// Query-parameter names the targeted update endpoint may expect the key under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyParam {
    Key,
    ApiKey,
}

impl KeyParam {
    pub fn as_str(&self) -> &'static str {
        match self {
            KeyParam::Key => "key",
            KeyParam::ApiKey => "api_key",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyVariant {
    Primary,
    Secondary,
}

/// One key/parameter combination for the targeted update.
#[derive(Clone, PartialEq, Eq)]
pub struct KeyAttempt {
    pub param: KeyParam,
    pub variant: KeyVariant,
    value: String,
}

impl std::fmt::Debug for KeyAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyAttempt")
            .field("param", &self.param)
            .field("variant", &self.variant)
            .field("key", &key_fingerprint(&self.value))
            .finish()
    }
}

impl KeyAttempt {
    pub fn label(&self) -> String {
        format!(
            "{}={:?} ({})",
            self.param.as_str(),
            self.variant,
            key_fingerprint(&self.value)
        )
    }
}

/// Short, non-reversible identifier for a key, safe to log.
pub fn key_fingerprint(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    hex::encode(&digest[..4])
}

/// Key attempts in order: `key`, `api_key` for the primary key, then the secondary.
pub fn key_attempts(config: &Config) -> Vec<KeyAttempt> {
    [
        (KeyVariant::Primary, config.api_key.as_deref()),
        (KeyVariant::Secondary, config.secondary_api_key.as_deref()),
    ]
    .into_iter()
    .filter_map(|(variant, key)| {
        key.map(str::trim)
            .filter(|k| !k.is_empty())
            .map(|k| (variant, k))
    })
    .flat_map(|(variant, key)| {
        [KeyParam::Key, KeyParam::ApiKey]
            .into_iter()
            .map(move |param| KeyAttempt {
                param,
                variant,
                value: key.to_string(),
            })
    })
    .collect()
}

/// Raw reply from a form submission.
#[derive(Debug, Clone)]
pub struct FormReply {
    pub status: u16,
    pub text: String,
}

impl FormReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Result of one targeted update attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateOutcome {
    Updated,
    /// The platform rejected the key; another variant may work.
    InvalidKey,
    /// Any other failure; stop trying keys.
    Rejected { status: u16, body: String },
}

impl UpdateOutcome {
    pub fn classify(reply: &FormReply, invalid_key_marker: &str) -> Self {
        if reply.is_success() {
            UpdateOutcome::Updated
        } else if !invalid_key_marker.is_empty()
            && reply
                .text
                .to_lowercase()
                .contains(&invalid_key_marker.to_lowercase())
        {
            UpdateOutcome::InvalidKey
        } else {
            UpdateOutcome::Rejected {
                status: reply.status,
                body: reply.text.clone(),
            }
        }
    }
}

/// Client for the lead platform's update and submission endpoints.
#[derive(Clone)]
pub struct LeadPlatformClient {
    client: reqwest::Client,
    base_url: String,
    host: String,
    status_field: String,
    invalid_key_marker: String,
    campaign_id: String,
    subcampaign_id: String,
    include_lead_id_in_fallback: bool,
}

impl LeadPlatformClient {
    pub fn new(config: &Config) -> Result<Self, AppError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| {
                AppError::ExternalApiError(format!("Failed to create lead platform client: {}", e))
            })?;

        Ok(Self {
            client,
            base_url: config.lead_platform_base(),
            host: config.lead_platform_host(),
            status_field: config.status_field.clone(),
            invalid_key_marker: config.invalid_key_marker.clone(),
            campaign_id: config.campaign_id.clone(),
            subcampaign_id: config.subcampaign_id.clone(),
            include_lead_id_in_fallback: config.fallback_include_lead_id,
        })
    }

    /// Posts a form with explicit `Content-Length` and `Host` headers.
    async fn post_form(
        &self,
        url: &str,
        form: &LeadUpdateForm,
        log_label: Option<&str>,
    ) -> Result<FormReply, AppError> {
        let body = form.encode();

        if let Some(label) = log_label {
            tracing::info!(
                "{} → {} {}",
                label,
                url,
                form.redacted(&[KeyParam::Key.as_str(), KeyParam::ApiKey.as_str()])
            );
        }

        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, "application/x-www-form-urlencoded")
            .header(CONTENT_LENGTH, body.len().to_string())
            .header(HOST, &self.host)
            .body(body)
            .send()
            .await
            .map_err(|e| AppError::ExternalApiError(format!("Lead platform request failed: {}", e)))?;

        let status = response.status().as_u16();
        let text = response.text().await.map_err(|e| {
            AppError::ExternalApiError(format!("Failed to read lead platform response: {}", e))
        })?;

        if let Some(label) = log_label {
            tracing::info!("{} resp: {} {}", label, status, text);
        }

        Ok(FormReply { status, text })
    }

    /// Targeted update of one lead's status field.
    ///
    /// # Arguments
    ///
    /// * `lead_id` - Lead platform identifier, used in the path.
    /// * `attempt` - Which key and parameter name to authenticate with.
    /// * `status_value` - Composed status text.
    /// * `debug` - Log the request and reply.
    pub async fn update_lead(
        &self,
        lead_id: &str,
        attempt: &KeyAttempt,
        status_value: &str,
        debug: bool,
    ) -> Result<UpdateOutcome, AppError> {
        let encoded_id: String = url::form_urlencoded::byte_serialize(lead_id.as_bytes()).collect();
        let url = format!("{}/api/v1/lead-data/update/{}", self.base_url, encoded_id);

        let form = LeadUpdateForm::new()
            .field(attempt.param.as_str(), attempt.value.as_str())
            .field("reprocess", "false")
            .field("validate", "false")
            .field(self.status_field.as_str(), status_value);

        let label = format!("UPDATE API ({})", attempt.label());
        let reply = self
            .post_form(&url, &form, debug.then_some(label.as_str()))
            .await?;

        Ok(UpdateOutcome::classify(&reply, &self.invalid_key_marker))
    }

    /// Generic lead submission keyed by UID.
    ///
    /// The lead identifier is sent as `lead_id`, never as `id`: `uid` together
    /// with `id` makes the platform create a duplicate lead.
    pub async fn submit_by_uid(
        &self,
        lead_uid: &str,
        lead_id: Option<&str>,
        status_value: &str,
        debug: bool,
    ) -> Result<FormReply, AppError> {
        let url = format!("{}/api/v1/lead", self.base_url);

        let mut form = LeadUpdateForm::new()
            .field("cid", self.campaign_id.as_str())
            .field("sid", self.subcampaign_id.as_str())
            .field("uid", lead_uid);
        if let Some(id) = lead_id.filter(|_| self.include_lead_id_in_fallback) {
            form = form.field("lead_id", id);
        }
        form = form.field(self.status_field.as_str(), status_value);

        self.post_form(&url, &form, debug.then_some("FALLBACK"))
            .await
    }
}
