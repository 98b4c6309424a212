//! Google Gemini provider.
//!
//! Key auth via `x-goog-api-key` against
//! `POST {base}/v1beta/models/{model}:generateContent`; completion text is
//! read from `candidates[0].content.parts[0].text`.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::provider::{AiError, CompletionProvider, ProviderResult, status_failure};

/// Default base URL for the Gemini API.
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Default model.
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// Google provider configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GoogleConfig {
    /// API key sent in the `x-goog-api-key` header.
    pub api_key: String,
    /// Model ID.
    pub model: String,
    /// Base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

/// Google completion provider.
pub struct GoogleProvider {
    config: GoogleConfig,
    client: reqwest::Client,
}

impl GoogleProvider {
    /// Create a new Google provider.
    #[must_use]
    pub fn new(config: GoogleConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a new Google provider with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: GoogleConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Build HTTP headers for the request.
    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert(
            "x-goog-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| AiError::RequestFailed {
                message: format!("invalid API key header: {e}"),
            })?,
        );
        Ok(headers)
    }

    /// Build the request body.
    fn build_request(prompt: &str) -> Value {
        json!({
            "contents": [
                { "parts": [ { "text": prompt } ] }
            ],
        })
    }

    /// Extract the completion text, defaulting to empty when absent.
    fn extract_text(response: &Value) -> String {
        response
            .pointer("/candidates/0/content/parts/0/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl CompletionProvider for GoogleProvider {
    fn name(&self) -> &'static str {
        "google"
    }

    #[instrument(skip_all, fields(provider = "google", model = %self.config.model))]
    async fn complete(&self, prompt: &str) -> ProviderResult<String> {
        let base_url = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let url = format!(
            "{base_url}/v1beta/models/{}:generateContent",
            self.config.model
        );
        let headers = self.build_headers()?;
        let body = Self::build_request(prompt);

        debug!(prompt_len = prompt.len(), "sending Gemini completion request");

        let response = self
            .client
            .post(&url)
            .headers(headers)
            .json(&body)
            .send()
            .await
            .map_err(|e| AiError::RequestFailed {
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(status_failure("google", status.as_u16(), &body_text));
        }

        let parsed: Value = response.json().await.map_err(|e| AiError::RequestFailed {
            message: e.to_string(),
        })?;
        Ok(Self::extract_text(&parsed))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
