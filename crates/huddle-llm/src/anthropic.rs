//! Anthropic messages provider.
//!
//! Key auth via `x-api-key` against `POST {base}/v1/messages`; completion
//! text is read from `content[0].text`. The messages API requires an
//! explicit `max_tokens`, so the config carries one with a default.

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderValue};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, instrument};

use crate::provider::{AiError, CompletionProvider, ProviderResult, status_failure};

/// Default base URL for the Anthropic API.
pub const DEFAULT_BASE_URL: &str = "https://api.anthropic.com";

/// Default model.
pub const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";

/// API version header value required by the messages endpoint.
pub const API_VERSION: &str = "2023-06-01";

/// Default completion token cap.
pub const DEFAULT_MAX_TOKENS: u32 = 1024;

/// Anthropic provider configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnthropicConfig {
    /// API key sent in the `x-api-key` header.
    pub api_key: String,
    /// Model ID.
    pub model: String,
    /// Base URL override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    /// Completion token cap override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
}

/// Anthropic completion provider.
pub struct AnthropicProvider {
    config: AnthropicConfig,
    client: reqwest::Client,
}

impl AnthropicProvider {
    /// Create a new Anthropic provider.
    #[must_use]
    pub fn new(config: AnthropicConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Create a new Anthropic provider with a shared HTTP client.
    #[must_use]
    pub fn with_client(config: AnthropicConfig, client: reqwest::Client) -> Self {
        Self { config, client }
    }

    /// Build HTTP headers for the request.
    fn build_headers(&self) -> ProviderResult<HeaderMap> {
        let mut headers = HeaderMap::new();
        let _ = headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        let _ = headers.insert("anthropic-version", HeaderValue::from_static(API_VERSION));
        let _ = headers.insert(
            "x-api-key",
            HeaderValue::from_str(&self.config.api_key).map_err(|e| AiError::RequestFailed {
                message: format!("invalid API key header: {e}"),
            })?,
        );
        Ok(headers)
    }

    /// Build the request body.
    fn build_request(&self, prompt: &str) -> Value {
        json!({
            "model": self.config.model,
            "max_tokens": self.config.max_tokens.unwrap_or(DEFAULT_MAX_TOKENS),
            "messages": [
                { "role": "user", "content": prompt }
            ],
        })
    }

    /// Extract the completion text, defaulting to empty when absent.
    fn extract_text(response: &Value) -> String {
        response
            .pointer("/content/0/text")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }
}

#[async_trait]
impl CompletionProvider for AnthropicProvider {
    fn name(&self) -> &'static str {
        "anthropic"
    }

    #[instrument(skip_all, fields(provider = "anthropic", model = %self.config.model))]
    async fn complete(&self, prompt: &str) -> ProviderResult<String> {
        let base_url = self.config.base_url.as_deref().unwrap_or(DEFAULT_BASE_URL);
        let url = format!("{base_url}/v1/messages");
        let headers = self.build_headers()?;
        let body = self.build_request(prompt);

        debug!(
            prompt_len = prompt.len(),
            "sending Anthropic completion request"
        );

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
            return Err(status_failure("anthropic", status.as_u16(), &body_text));
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

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(base_url: Option<String>) -> AnthropicConfig {
        AnthropicConfig {
            api_key: "ak-test".into(),
            model: DEFAULT_MODEL.into(),
            base_url,
            max_tokens: None,
        }
    }

    // ── Headers ─────────────────────────────────────────────────────────

    #[test]
    fn headers_has_api_key_and_version() {
        let provider = AnthropicProvider::new(test_config(None));
        let headers = provider.build_headers().unwrap();
        assert_eq!(headers["x-api-key"], "ak-test");
        assert_eq!(headers["anthropic-version"], API_VERSION);
    }

    // ── Request building ────────────────────────────────────────────────

    #[test]
    fn build_request_defaults_max_tokens() {
        let provider = AnthropicProvider::new(test_config(None));
        let body = provider.build_request("hi");
        assert_eq!(body["max_tokens"], DEFAULT_MAX_TOKENS);
        assert_eq!(body["messages"][0]["content"], "hi");
    }

    #[test]
    fn build_request_honors_max_tokens_override() {
        let mut config = test_config(None);
        config.max_tokens = Some(64);
        let provider = AnthropicProvider::new(config);
        assert_eq!(provider.build_request("hi")["max_tokens"], 64);
    }

    // ── Text extraction ─────────────────────────────────────────────────

    #[test]
    fn extract_text_reads_first_content_block() {
        let response = json!({
            "content": [{"type": "text", "text": "done"}]
        });
        assert_eq!(AnthropicProvider::extract_text(&response), "done");
    }

    #[test]
    fn extract_text_missing_path_is_empty() {
        assert_eq!(AnthropicProvider::extract_text(&json!({"content": []})), "");
    }

    // ── HTTP behavior ───────────────────────────────────────────────────

    #[tokio::test]
    async fn complete_posts_once_and_returns_text() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .and(header("x-api-key", "ak-test"))
            .and(header("anthropic-version", API_VERSION))
            .and(body_partial_json(json!({
                "messages": [{"role": "user", "content": "hi"}]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "content": [{"type": "text", "text": "hello"}]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new(test_config(Some(server.uri())));
        let text = provider.complete("hi").await.unwrap();
        assert_eq!(text, "hello");
    }

    #[tokio::test]
    async fn complete_surfaces_upstream_error_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(ResponseTemplate::new(429).set_body_json(json!({
                "error": {"type": "rate_limit_error", "message": "Rate limited"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new(test_config(Some(server.uri())));
        let err = provider.complete("hi").await.unwrap_err();
        assert!(err.to_string().contains("429"));
        assert!(err.to_string().contains("Rate limited"));
    }

    #[tokio::test]
    async fn complete_missing_text_defaults_to_empty() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/messages"))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"content": [{"type": "text"}]})),
            )
            .mount(&server)
            .await;

        let provider = AnthropicProvider::new(test_config(Some(server.uri())));
        assert_eq!(provider.complete("hi").await.unwrap(), "");
    }
}
