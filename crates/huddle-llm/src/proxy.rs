//! Completion proxy.
//!
//! Holds the set of configured providers and routes a completion request to
//! one of them by hint string. A hint naming a provider outside the known
//! set fails with [`AiError::UnknownProvider`]; a known provider with no
//! configuration fails with [`AiError::Unconfigured`]. Each successful
//! dispatch makes exactly one outbound call.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use metrics::{counter, histogram};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument, warn};

use crate::anthropic::{AnthropicConfig, AnthropicProvider};
use crate::google::{GoogleConfig, GoogleProvider};
use crate::openai::{OpenAIConfig, OpenAIProvider};
use crate::provider::{AiError, CompletionProvider, ProviderResult};

/// Provider names the proxy recognizes.
pub const SUPPORTED_PROVIDERS: &[&str] = &["openai", "anthropic", "google"];

/// Configuration for the proxy: one optional entry per supported provider.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiProxyConfig {
    /// `OpenAI` provider configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<OpenAIConfig>,
    /// Anthropic provider configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic: Option<AnthropicConfig>,
    /// Google provider configuration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google: Option<GoogleConfig>,
}

/// Routes completion requests to configured providers by name.
pub struct AiProxy {
    providers: HashMap<String, Arc<dyn CompletionProvider>>,
}

impl AiProxy {
    /// Build a proxy from configuration. Providers share one HTTP client.
    #[must_use]
    pub fn new(config: AiProxyConfig) -> Self {
        let client = reqwest::Client::new();
        let mut providers: HashMap<String, Arc<dyn CompletionProvider>> = HashMap::new();

        if let Some(openai) = config.openai {
            let _ = providers.insert(
                "openai".to_string(),
                Arc::new(OpenAIProvider::with_client(openai, client.clone())),
            );
        }
        if let Some(anthropic) = config.anthropic {
            let _ = providers.insert(
                "anthropic".to_string(),
                Arc::new(AnthropicProvider::with_client(anthropic, client.clone())),
            );
        }
        if let Some(google) = config.google {
            let _ = providers.insert(
                "google".to_string(),
                Arc::new(GoogleProvider::with_client(google, client)),
            );
        }

        Self { providers }
    }

    /// Build an empty proxy with no providers configured.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            providers: HashMap::new(),
        }
    }

    /// Register a provider under an explicit name. Test seam.
    #[must_use]
    pub fn with_provider(mut self, name: &str, provider: Arc<dyn CompletionProvider>) -> Self {
        let _ = self.providers.insert(name.to_string(), provider);
        self
    }

    /// Whether a provider name has configuration.
    #[must_use]
    pub fn is_configured(&self, provider: &str) -> bool {
        self.providers.contains_key(provider)
    }

    /// Names of configured providers, sorted.
    #[must_use]
    pub fn configured(&self) -> Vec<String> {
        let mut names: Vec<String> = self.providers.keys().cloned().collect();
        names.sort();
        names
    }

    /// Route a completion to the provider named by `hint`.
    ///
    /// # Errors
    ///
    /// Returns [`AiError::UnknownProvider`] when the hint is not a supported
    /// provider name, [`AiError::Unconfigured`] when the provider has no
    /// configuration, and [`AiError::RequestFailed`] when the upstream call
    /// fails. Failures are not retried.
    #[instrument(skip_all, fields(provider = %hint))]
    pub async fn complete(&self, hint: &str, prompt: &str) -> ProviderResult<String> {
        if !SUPPORTED_PROVIDERS.contains(&hint) {
            warn!("completion request for unknown provider");
            counter!("ai_errors_total", "reason" => "unknown_provider").increment(1);
            return Err(AiError::UnknownProvider {
                provider: hint.to_string(),
            });
        }

        let Some(provider) = self.providers.get(hint) else {
            warn!("completion request for unconfigured provider");
            counter!("ai_errors_total", "reason" => "unconfigured").increment(1);
            return Err(AiError::Unconfigured {
                provider: hint.to_string(),
            });
        };

        counter!("ai_requests_total", "provider" => hint.to_string()).increment(1);
        let started = Instant::now();
        let result = provider.complete(prompt).await;
        histogram!("ai_request_duration_seconds", "provider" => hint.to_string())
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(text) => debug!(chars = text.len(), "completion succeeded"),
            Err(e) => {
                warn!(error = %e, "completion failed");
                counter!("ai_errors_total", "reason" => "request_failed").increment(1);
            }
        }
        result
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
