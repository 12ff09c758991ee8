//! Gemini API client for advisory requests
//!
//! Speaks the `generateContent` REST contract with structured output.
//! Uses a long-lived reqwest::Client for connection pooling.

use crate::advisory::{AdvisoryRequest, AdvisoryService};
use crate::config::AdvisorConfig;
use crate::error::AdvisorError;
use crate::Result;
use async_trait::async_trait;
use reqwest::header::RETRY_AFTER;
use reqwest::{Client, StatusCode, Url};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const API_KEY_HEADER: &str = "x-goog-api-key";

/// Reusable Gemini client (connection-pooled)
pub struct GeminiClient {
    client: Client,
    api_key: String,
    url: Url,
    endpoint_key: String,
}

impl std::fmt::Debug for GeminiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiClient")
            .field("url", &self.url.as_str())
            .field("endpoint_key", &self.endpoint_key)
            .finish_non_exhaustive()
    }
}

impl GeminiClient {
    /// Refuses to build without a credential or for a host outside the allow-list.
    pub fn new(config: &AdvisorConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AdvisorError::Configuration("GEMINI_API_KEY not configured".to_string())
            })?;

        let url = check_endpoint(&config.endpoint_url(), &config.allowed_domains)?;

        let client = Client::builder()
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(8)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AdvisorError::Configuration(format!("HTTP client: {}", e)))?;

        info!(host = url.host_str().unwrap_or_default(), model = %config.model, "Gemini client ready");

        Ok(Self {
            client,
            api_key,
            url,
            endpoint_key: format!("gemini:{}", config.model),
        })
    }
}

#[async_trait]
impl AdvisoryService for GeminiClient {
    fn endpoint_key(&self) -> &str {
        &self.endpoint_key
    }

    async fn generate(&self, request: &AdvisoryRequest) -> Result<String> {
        let body = GeminiRequest::from_advisory(request);

        debug!(url = %self.url, "Calling Gemini API");

        let response = self
            .client
            .post(self.url.clone())
            .header(API_KEY_HEADER, &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                error!("Gemini API request failed: {}", e);
                classify_transport(&e)
            })?;

        let status = response.status();
        if !status.is_success() {
            let retry_after = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after);
            let error_text = response.text().await.unwrap_or_default();
            error!(status = status.as_u16(), "Gemini API error response: {}", error_text);
            return Err(classify_status(status, retry_after, error_text));
        }

        let text = response
            .text()
            .await
            .map_err(|e| AdvisorError::TransientService(format!("reading body: {}", e)))?;

        let answer = extract_answer(&text)?;
        info!(chars = answer.len(), "Gemini response received");
        Ok(answer)
    }
}

/// Parse and vet the endpoint against the allowed hosts.
pub fn check_endpoint(raw: &str, allowed_domains: &[String]) -> Result<Url> {
    let url = Url::parse(raw)
        .map_err(|e| AdvisorError::Configuration(format!("invalid endpoint {:?}: {}", raw, e)))?;

    if url.scheme() != "https" {
        return Err(AdvisorError::Configuration(format!(
            "endpoint must use https, got {}",
            url.scheme()
        )));
    }

    let host = url.host_str().unwrap_or_default().to_lowercase();
    let allowed = allowed_domains.iter().any(|domain| {
        let domain = domain.to_lowercase();
        host == domain || host.ends_with(&format!(".{}", domain))
    });
    if !allowed {
        warn!(host = %host, "Endpoint host not in allow-list");
        return Err(AdvisorError::Configuration(format!(
            "host '{}' is not in the allowed domains",
            host
        )));
    }

    Ok(url)
}

fn classify_transport(e: &reqwest::Error) -> AdvisorError {
    if e.is_builder() {
        AdvisorError::ClientService {
            status: None,
            message: e.to_string(),
        }
    } else {
        AdvisorError::TransientService(e.to_string())
    }
}

/// Map a non-success status onto the failure model.
pub fn classify_status(status: StatusCode, retry_after: Option<f64>, body: String) -> AdvisorError {
    if status == StatusCode::TOO_MANY_REQUESTS {
        AdvisorError::RateLimited {
            reason: "provider rate limit".to_string(),
            retry_after_seconds: retry_after,
        }
    } else if status.is_server_error() || status == StatusCode::REQUEST_TIMEOUT {
        AdvisorError::TransientService(format!("{}: {}", status, body))
    } else {
        AdvisorError::ClientService {
            status: Some(status.as_u16()),
            message: body,
        }
    }
}

/// `Retry-After` in delta-seconds form; HTTP dates are ignored.
fn parse_retry_after(value: &str) -> Option<f64> {
    value
        .trim()
        .parse::<f64>()
        .ok()
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
}

/// Pull the text of the first candidate out of the response envelope.
pub fn extract_answer(body: &str) -> Result<String> {
    let response: GeminiResponse = serde_json::from_str(body).map_err(|e| {
        AdvisorError::MalformedResponse(format!("Gemini envelope: {}", e))
    })?;

    let candidate = response
        .candidates
        .first()
        .ok_or_else(|| AdvisorError::MalformedResponse("No response from Gemini API".to_string()))?;

    if let Some(reason) = candidate.finish_reason.as_deref() {
        if reason != "STOP" {
            warn!(finish_reason = reason, "Gemini finished early");
        }
    }

    let answer: String = candidate
        .content
        .as_ref()
        .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
        .unwrap_or_default();

    if answer.trim().is_empty() {
        return Err(AdvisorError::MalformedResponse(
            "Empty response from Gemini".to_string(),
        ));
    }
    Ok(answer)
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest<'a> {
    contents: Vec<Content>,
    generation_config: GenerationConfig<'a>,
}

impl<'a> GeminiRequest<'a> {
    fn from_advisory(request: &'a AdvisoryRequest) -> Self {
        Self {
            contents: vec![Content {
                role: Some("user".to_string()),
                parts: vec![Part {
                    text: request.prompt.clone(),
                }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                response_schema: &request.response_schema,
                temperature: request.temperature,
            },
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig<'a> {
    response_mime_type: &'static str,
    response_schema: &'a Value,
    temperature: f32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
    content: Option<Content>,
    finish_reason: Option<String>,
}
