use serde::Deserialize;

/// Call placement endpoint used when `CALL_SERVICE_URL` is not set.
pub const DEFAULT_CALL_SERVICE_URL: &str = "https://api.mcincloud.com/api/v2/calls/enriched";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub port: u16,
    /// Call service endpoint that places a call.
    pub call_service_url: String,
    /// Base status-callback URL handed to the call service when the caller supplies none.
    pub status_callback_url: Option<String>,
    pub lead_platform_instance: String,
    pub lead_platform_domain: String,
    /// Overrides `https://{instance}.{domain}` (staging, tests).
    pub lead_platform_base_url: Option<String>,
    pub api_key: Option<String>,
    pub secondary_api_key: Option<String>,
    pub campaign_id: String,
    pub subcampaign_id: String,
    /// Lead-data field that receives the composed call status.
    pub status_field: String,
    /// Substring (case-insensitive) that marks a rejected API key in update replies.
    pub invalid_key_marker: String,
    pub fallback_include_lead_id: bool,
    pub debug: bool,
}

/// First non-blank value among the given environment variables.
fn env_any(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .map(|value| value.trim().to_string())
        .find(|value| !value.is_empty())
}

fn env_flag(name: &str, default: bool) -> anyhow::Result<bool> {
    parse_flag(name, env_any(&[name]).as_deref(), default)
}

fn parse_flag(name: &str, value: Option<&str>, default: bool) -> anyhow::Result<bool> {
    match value {
        None => Ok(default),
        Some(value) => match value.to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => anyhow::bail!("{} must be a boolean flag (1/0, true/false)", name),
        },
    }
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "3000".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("PORT must be a valid number between 1-65535"))?,
            call_service_url: env_any(&["CALL_SERVICE_URL"])
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("CALL_SERVICE_URL must start with http:// or https://");
                    }
                    Ok(url)
                })
                .transpose()?
                .unwrap_or_else(|| DEFAULT_CALL_SERVICE_URL.to_string()),
            status_callback_url: env_any(&["STATUS_CALLBACK_URL", "MCINCLOUD_STATUS_CALLBACK_URL"]),
            lead_platform_instance: env_any(&["LEAD_PLATFORM_INSTANCE", "DATABOWL_INSTANCE"])
                .unwrap_or_else(|| "crsadvertising".to_string()),
            lead_platform_domain: env_any(&["LEAD_PLATFORM_DOMAIN"])
                .unwrap_or_else(|| "databowl.com".to_string()),
            lead_platform_base_url: env_any(&["LEAD_PLATFORM_BASE_URL"])
                .map(|url| {
                    if !url.starts_with("http://") && !url.starts_with("https://") {
                        anyhow::bail!("LEAD_PLATFORM_BASE_URL must start with http:// or https://");
                    }
                    Ok(url.trim_end_matches('/').to_string())
                })
                .transpose()?,
            api_key: env_any(&["LEAD_PLATFORM_API_KEY", "DATABOWL_API_KEY"]),
            secondary_api_key: env_any(&["LEAD_PLATFORM_PUBLIC_KEY", "DATABOWL_PUBLIC_KEY"]),
            campaign_id: env_any(&["LEAD_PLATFORM_CID", "DATABOWL_CID"])
                .unwrap_or_else(|| "5314".to_string()),
            subcampaign_id: env_any(&["LEAD_PLATFORM_SID", "DATABOWL_SID"])
                .unwrap_or_else(|| "34".to_string()),
            status_field: env_any(&["LEAD_STATUS_FIELD"])
                .unwrap_or_else(|| "f_2608_Ai_Agent_Status".to_string()),
            invalid_key_marker: env_any(&["INVALID_KEY_MARKER"])
                .unwrap_or_else(|| "invalid_key".to_string()),
            fallback_include_lead_id: env_flag("FALLBACK_INCLUDE_LEAD_ID", true)?,
            debug: env_flag("DEBUG", false)?,
        };

        // Log effective configuration (without key material)
        tracing::info!("Configuration loaded successfully");
        tracing::debug!("Call service URL: {}", config.call_service_url);
        if let Some(ref cb) = config.status_callback_url {
            tracing::info!("Status callback URL override configured: {}", cb);
        }
        tracing::debug!("Lead platform host: {}", config.lead_platform_host());
        if config.api_key.is_none() && config.secondary_api_key.is_none() {
            tracing::warn!("No lead platform API key configured; targeted lead updates are disabled");
        }
        tracing::debug!("Server Port: {}", config.port);

        Ok(config)
    }

    /// Hostname of the lead platform instance, sent as the explicit `Host` header.
    pub fn lead_platform_host(&self) -> String {
        format!("{}.{}", self.lead_platform_instance, self.lead_platform_domain)
    }

    pub fn lead_platform_base(&self) -> String {
        self.lead_platform_base_url
            .clone()
            .unwrap_or_else(|| format!("https://{}", self.lead_platform_host()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Config {
        Config {
            port: 3000,
            call_service_url: DEFAULT_CALL_SERVICE_URL.to_string(),
            status_callback_url: None,
            lead_platform_instance: "acme".to_string(),
            lead_platform_domain: "databowl.com".to_string(),
            lead_platform_base_url: None,
            api_key: None,
            secondary_api_key: None,
            campaign_id: "5314".to_string(),
            subcampaign_id: "34".to_string(),
            status_field: "f_2608_Ai_Agent_Status".to_string(),
            invalid_key_marker: "invalid_key".to_string(),
            fallback_include_lead_id: true,
            debug: false,
        }
    }

    #[test]
    fn test_flag_values() {
        assert!(parse_flag("DEBUG", Some("1"), false).unwrap());
        assert!(parse_flag("DEBUG", Some("TRUE"), false).unwrap());
        assert!(parse_flag("DEBUG", Some("on"), false).unwrap());
        assert!(!parse_flag("FALLBACK_INCLUDE_LEAD_ID", Some("0"), true).unwrap());
        assert!(!parse_flag("FALLBACK_INCLUDE_LEAD_ID", Some("off"), true).unwrap());
        assert!(parse_flag("FALLBACK_INCLUDE_LEAD_ID", None, true).unwrap());
        assert!(!parse_flag("DEBUG", None, false).unwrap());

        let err = parse_flag("DEBUG", Some("maybe"), false).unwrap_err();
        assert!(err.to_string().contains("DEBUG"));
    }

    #[test]
    fn test_env_flag_reads_environment() {
        std::env::set_var("LEAD_CALL_BRIDGE_TEST_FLAG", " yes ");
        assert!(env_flag("LEAD_CALL_BRIDGE_TEST_FLAG", false).unwrap());
        std::env::set_var("LEAD_CALL_BRIDGE_TEST_FLAG", "   ");
        assert!(env_flag("LEAD_CALL_BRIDGE_TEST_FLAG", true).unwrap());
        std::env::remove_var("LEAD_CALL_BRIDGE_TEST_FLAG");
        assert!(!env_flag("LEAD_CALL_BRIDGE_TEST_FLAG", false).unwrap());
    }

    #[test]
    fn test_lead_platform_base_defaults_to_instance_host() {
        let config = sample();
        assert_eq!(config.lead_platform_host(), "acme.databowl.com");
        assert_eq!(config.lead_platform_base(), "https://acme.databowl.com");
    }

    #[test]
    fn test_lead_platform_base_override_keeps_host() {
        let config = Config {
            lead_platform_base_url: Some("http://127.0.0.1:9999".to_string()),
            ..sample()
        };
        assert_eq!(config.lead_platform_base(), "http://127.0.0.1:9999");
        assert_eq!(config.lead_platform_host(), "acme.databowl.com");
    }
}
