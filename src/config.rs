//! Environment-provided settings
//!
//! Every value has a default except the API key. `.env` is loaded by the
//! binaries before `AdvisorConfig::from_env` runs.

use crate::error::AdvisorError;
use crate::rate_limit::RateLimitConfig;
use crate::Result;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_ALLOWED_DOMAIN: &str = "generativelanguage.googleapis.com";
pub const DEFAULT_PORT: u16 = 3000;

/// Key names tried, in order, for the service credential
const API_KEY_VARS: [&str; 3] = ["GEMINI_API_KEY", "API_KEY", "VITE_GEMINI_API_KEY"];

#[derive(Debug, Clone)]
pub struct AdvisorConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub model: String,
    pub allowed_domains: Vec<String>,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub rate_limit: RateLimitConfig,
    pub port: u16,
}

impl Default for AdvisorConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            allowed_domains: vec![DEFAULT_ALLOWED_DOMAIN.to_string()],
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(60),
            rate_limit: RateLimitConfig::default(),
            port: DEFAULT_PORT,
        }
    }
}

impl AdvisorConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from any variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut config = AdvisorConfig {
            api_key: API_KEY_VARS.iter().find_map(|name| get(*name)),
            ..AdvisorConfig::default()
        };

        if let Some(url) = get("ADVISOR_BASE_URL") {
            config.base_url = url.trim_end_matches('/').to_string();
        }
        if let Some(model) = get("ADVISOR_MODEL") {
            config.model = model;
        }
        if let Some(domains) = get("ADVISOR_ALLOWED_DOMAINS") {
            config.allowed_domains = domains
                .split(',')
                .map(|d| d.trim().to_lowercase())
                .filter(|d| !d.is_empty())
                .collect();
        }
        if let Some(secs) = parse_var::<u64>(&get, "ADVISOR_REQUEST_TIMEOUT_SECS")? {
            config.request_timeout = Duration::from_secs(secs);
        }
        if let Some(threshold) = parse_var::<u32>(&get, "ADVISOR_FAILURE_THRESHOLD")? {
            config.rate_limit.failure_threshold = threshold;
        }
        if let Some(secs) = parse_var::<u64>(&get, "ADVISOR_COOLDOWN_SECS")? {
            config.rate_limit.cooldown = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var::<u64>(&get, "ADVISOR_WINDOW_SECS")? {
            config.rate_limit.window = Duration::from_secs(secs);
        }
        if let Some(max) = parse_var::<usize>(&get, "ADVISOR_MAX_REQUESTS_PER_WINDOW")? {
            config.rate_limit.max_requests_per_window = max;
        }
        if let Some(port) = parse_var::<u16>(&get, "PORT")? {
            config.port = port;
        } else if let Some(port) = parse_var::<u16>(&get, "API_PORT")? {
            config.port = port;
        }

        config.validate()?;
        Ok(config)
    }

    /// Structural checks; the credential is checked when the client is built.
    pub fn validate(&self) -> Result<()> {
        if self.allowed_domains.is_empty() {
            return Err(AdvisorError::Configuration(
                "ADVISOR_ALLOWED_DOMAINS is empty".to_string(),
            ));
        }
        if self.rate_limit.failure_threshold == 0 {
            return Err(AdvisorError::Configuration(
                "ADVISOR_FAILURE_THRESHOLD must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.max_requests_per_window == 0 {
            return Err(AdvisorError::Configuration(
                "ADVISOR_MAX_REQUESTS_PER_WINDOW must be at least 1".to_string(),
            ));
        }
        if self.rate_limit.window.is_zero() || self.request_timeout.is_zero() {
            return Err(AdvisorError::Configuration(
                "window and request timeout must be non-zero".to_string(),
            ));
        }
        Ok(())
    }

    /// Full `generateContent` endpoint for the configured model
    pub fn endpoint_url(&self) -> String {
        format!("{}/{}:generateContent", self.base_url, self.model)
    }

    pub fn rate_limit_config(&self) -> RateLimitConfig {
        self.rate_limit.clone()
    }
}

fn parse_var<T: FromStr>(
    get: &impl Fn(&str) -> Option<String>,
    name: &str,
) -> Result<Option<T>> {
    match get(name) {
        None => Ok(None),
        Some(raw) => raw.parse::<T>().map(Some).map_err(|_| {
            AdvisorError::Configuration(format!("{} has an invalid value: {:?}", name, raw))
        }),
    }
}
