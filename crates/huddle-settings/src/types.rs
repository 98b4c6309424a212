//! Settings type definitions.
//!
//! All types use `#[serde(rename_all = "camelCase")]` to match the JSON wire
//! format. Each type implements [`Default`] with production default values.
//! Types marked with `#[serde(default)]` allow partial JSON — missing fields
//! get their default value during deserialization.

use serde::{Deserialize, Serialize};

/// Root settings type for the Huddle server.
///
/// Loaded from `~/.huddle/settings.json` with defaults applied for missing
/// fields, then `HUDDLE_*` environment overrides on top.
///
/// # JSON Format
///
/// All field names are camelCase. Provider entries are omitted when unset.
/// Example:
///
/// ```json
/// {
///   "server": { "port": 9090 },
///   "providers": { "openai": { "apiKey": "sk-...", "model": "gpt-4o-mini" } }
/// }
/// ```
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct HuddleSettings {
    /// Settings schema version.
    pub version: String,
    /// Application name.
    pub name: String,
    /// Server network settings.
    pub server: ServerSettings,
    /// Credential verification settings.
    pub auth: AuthSettings,
    /// AI provider credentials and model selection.
    pub providers: ProviderSettings,
    /// Logging configuration.
    pub logging: LoggingSettings,
}

impl Default for HuddleSettings {
    fn default() -> Self {
        Self {
            version: "0.1.0".to_string(),
            name: "huddle".to_string(),
            server: ServerSettings::default(),
            auth: AuthSettings::default(),
            providers: ProviderSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl HuddleSettings {
    /// Correct invalid values in place.
    ///
    /// Called automatically during loading. Out-of-range values are reset
    /// with a warning rather than rejected, so users get corrected behavior
    /// instead of a confusing startup error.
    pub fn validate(&mut self) {
        if self.server.auth_deadline_ms == 0 {
            let default = ServerSettings::default().auth_deadline_ms;
            tracing::warn!(
                "server.authDeadlineMs must be positive, resetting to {default}"
            );
            self.server.auth_deadline_ms = default;
        }
    }
}

/// Server network settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerSettings {
    /// Bind host.
    pub host: String,
    /// Bind port (WebSocket and HTTP share one listener).
    pub port: u16,
    /// How long an accepted connection may stay unauthenticated, in ms.
    pub auth_deadline_ms: u64,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            auth_deadline_ms: 10_000,
        }
    }
}

/// Credential verification settings.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AuthSettings {
    /// HS256 signing secret. Required at startup; the binary refuses to
    /// serve without it.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
}

/// AI provider credentials, keyed by provider name.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderSettings {
    /// OpenAI chat-completions credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub openai: Option<ProviderEntry>,
    /// Anthropic messages credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub anthropic: Option<ProviderEntry>,
    /// Google generative-language credentials.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub google: Option<ProviderEntry>,
}

/// One provider's credentials and model selection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderEntry {
    /// API key.
    pub api_key: String,
    /// Model override (provider default used when unset).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Base URL override (used by tests and self-hosted gateways).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

impl ProviderEntry {
    /// Create an entry from a bare API key.
    #[must_use]
    pub fn from_api_key(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: None,
            base_url: None,
        }
    }
}

/// Logging configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LoggingSettings {
    /// Default tracing filter when `RUST_LOG` is unset.
    pub level: String,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
