//! Completion provider trait and shared error type.

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

/// Result alias for provider operations.
pub type ProviderResult<T> = Result<T, AiError>;

/// Errors from provider selection or the outbound completion call.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AiError {
    /// Hint matched none of the supported providers.
    #[error("unknown provider: {provider}")]
    UnknownProvider {
        /// The unrecognized hint.
        provider: String,
    },

    /// Provider is supported but has no credential configured.
    #[error("provider {provider} is not configured")]
    Unconfigured {
        /// Provider name.
        provider: String,
    },

    /// The single outbound call failed (transport or non-success status).
    #[error("completion request failed: {message}")]
    RequestFailed {
        /// Upstream failure detail, including the provider's own error
        /// message when one could be extracted from the response body.
        message: String,
    },
}

/// One external text-completion backend.
///
/// Implementations build a provider-specific request for `prompt`, issue
/// exactly one HTTP call, and extract the completion text from the
/// response (empty string when the expected field is absent).
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Canonical lowercase provider name (matches the request hint).
    fn name(&self) -> &'static str;

    /// Request a completion for `prompt`.
    async fn complete(&self, prompt: &str) -> ProviderResult<String>;
}

/// Extract the upstream error message from a provider error body.
///
/// All three supported providers nest it at `error.message`.
pub(crate) fn api_error_message(body: &str) -> Option<String> {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| v.get("error")?.get("message")?.as_str().map(String::from))
}

/// Format a non-success HTTP status into a [`AiError::RequestFailed`] message.
pub(crate) fn status_failure(provider: &str, status: u16, body: &str) -> AiError {
    let message = api_error_message(body)
        .map_or_else(
            || format!("{provider} returned status {status}"),
            |m| format!("{provider} returned status {status}: {m}"),
        );
    AiError::RequestFailed { message }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
