//! Error taxonomy shared across the Huddle crates.
//!
//! Every variant carries a stable SCREAMING_SNAKE wire code via
//! [`HubError::code`]. Clients switch on the code; the display string is
//! human-readable detail and may change between releases.

use thiserror::Error;

/// Errors surfaced to clients as single-recipient error envelopes.
///
/// None of these close the connection; the gateway closes only on
/// authentication failure and on authentication-deadline expiry.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum HubError {
    /// No credential was supplied with the authenticate request.
    #[error("authentication token missing")]
    CredentialMissing,

    /// Credential failed signature or expiry verification.
    #[error("credential rejected: {reason}")]
    CredentialInvalid {
        /// Verification failure detail.
        reason: String,
    },

    /// Credential verified but lacks a required identity claim.
    #[error("credential missing required claim: {claim}")]
    CredentialIncomplete {
        /// Name of the absent or empty claim.
        claim: String,
    },

    /// Frame was not a parseable JSON envelope.
    #[error("malformed envelope: {reason}")]
    MalformedEnvelope {
        /// Parse failure detail.
        reason: String,
    },

    /// A non-authenticate envelope arrived before authentication.
    #[error("authentication required")]
    AuthRequired,

    /// The operation requires an active session.
    #[error("no active session; join a project first")]
    NotInSession,

    /// Tool arguments were missing or had the wrong type.
    #[error("{message}")]
    InvalidParams {
        /// What was wrong with the arguments.
        message: String,
    },

    /// Tool name outside the supported set.
    #[error("unknown tool: {name}")]
    UnknownTool {
        /// The unrecognized tool name.
        name: String,
    },

    /// Envelope type outside the supported set.
    #[error("unsupported envelope type: {envelope_type}")]
    UnknownEnvelopeType {
        /// The unrecognized envelope type.
        envelope_type: String,
    },

    /// The selected AI provider has no credential configured.
    #[error("provider {provider} is not configured")]
    ProviderUnconfigured {
        /// Provider name.
        provider: String,
    },

    /// The AI provider hint matched no supported provider.
    #[error("unknown provider: {provider}")]
    UnknownProvider {
        /// The unrecognized provider hint.
        provider: String,
    },

    /// The outbound AI request failed.
    #[error("completion request failed: {message}")]
    AiRequestFailed {
        /// Upstream failure detail.
        message: String,
    },
}

impl HubError {
    /// Stable wire code for this error.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::CredentialMissing => "CREDENTIAL_MISSING",
            Self::CredentialInvalid { .. } => "CREDENTIAL_INVALID",
            Self::CredentialIncomplete { .. } => "CREDENTIAL_INCOMPLETE",
            Self::MalformedEnvelope { .. } => "MALFORMED_ENVELOPE",
            Self::AuthRequired => "AUTH_REQUIRED",
            Self::NotInSession => "NOT_IN_SESSION",
            Self::InvalidParams { .. } => "INVALID_PARAMS",
            Self::UnknownTool { .. } => "UNKNOWN_TOOL",
            Self::UnknownEnvelopeType { .. } => "UNKNOWN_ENVELOPE_TYPE",
            Self::ProviderUnconfigured { .. } => "PROVIDER_UNCONFIGURED",
            Self::UnknownProvider { .. } => "UNKNOWN_PROVIDER",
            Self::AiRequestFailed { .. } => "AI_REQUEST_FAILED",
        }
    }

    /// Whether this error came from credential verification.
    ///
    /// Authentication errors are the one class that closes the connection
    /// (after an `auth_failure` reply).
    #[must_use]
    pub fn is_auth_failure(&self) -> bool {
        matches!(
            self,
            Self::CredentialMissing
                | Self::CredentialInvalid { .. }
                | Self::CredentialIncomplete { .. }
        )
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn codes_are_screaming_snake_case() {
        let errors = [
            HubError::CredentialMissing,
            HubError::CredentialInvalid {
                reason: "r".into(),
            },
            HubError::CredentialIncomplete { claim: "sub".into() },
            HubError::MalformedEnvelope { reason: "r".into() },
            HubError::AuthRequired,
            HubError::NotInSession,
            HubError::InvalidParams {
                message: "m".into(),
            },
            HubError::UnknownTool { name: "n".into() },
            HubError::UnknownEnvelopeType {
                envelope_type: "t".into(),
            },
            HubError::ProviderUnconfigured {
                provider: "openai".into(),
            },
            HubError::UnknownProvider {
                provider: "p".into(),
            },
            HubError::AiRequestFailed {
                message: "m".into(),
            },
        ];
        for err in &errors {
            assert!(
                err.code()
                    .chars()
                    .all(|c| c.is_ascii_uppercase() || c == '_'),
                "code '{}' must be SCREAMING_SNAKE",
                err.code()
            );
        }
    }

    #[test]
    fn codes_are_distinct() {
        let codes = [
            HubError::CredentialMissing.code(),
            HubError::CredentialInvalid { reason: "r".into() }.code(),
            HubError::CredentialIncomplete { claim: "c".into() }.code(),
            HubError::MalformedEnvelope { reason: "r".into() }.code(),
            HubError::AuthRequired.code(),
            HubError::NotInSession.code(),
            HubError::InvalidParams { message: "m".into() }.code(),
            HubError::UnknownTool { name: "n".into() }.code(),
            HubError::UnknownEnvelopeType {
                envelope_type: "t".into(),
            }
            .code(),
            HubError::ProviderUnconfigured {
                provider: "p".into(),
            }
            .code(),
            HubError::UnknownProvider {
                provider: "p".into(),
            }
            .code(),
            HubError::AiRequestFailed {
                message: "m".into(),
            }
            .code(),
        ];
        let mut deduped = codes.to_vec();
        deduped.sort_unstable();
        deduped.dedup();
        assert_eq!(deduped.len(), codes.len());
    }

    #[test]
    fn invalid_params_displays_message_verbatim() {
        let err = HubError::InvalidParams {
            message: "projectId must be a non-empty string".into(),
        };
        assert_eq!(err.to_string(), "projectId must be a non-empty string");
    }

    #[test]
    fn credential_incomplete_names_claim() {
        let err = HubError::CredentialIncomplete {
            claim: "name".into(),
        };
        assert!(err.to_string().contains("name"));
        assert_eq!(err.code(), "CREDENTIAL_INCOMPLETE");
    }

    #[test]
    fn auth_failure_classification() {
        assert!(HubError::CredentialMissing.is_auth_failure());
        assert!(
            HubError::CredentialInvalid {
                reason: "expired".into()
            }
            .is_auth_failure()
        );
        assert!(
            HubError::CredentialIncomplete { claim: "sub".into() }.is_auth_failure()
        );
        assert!(!HubError::AuthRequired.is_auth_failure());
        assert!(!HubError::NotInSession.is_auth_failure());
    }

    #[test]
    fn unknown_tool_display() {
        let err = HubError::UnknownTool {
            name: "fs:delete".into(),
        };
        assert_matches!(err, HubError::UnknownTool { .. });
        assert_eq!(err.to_string(), "unknown tool: fs:delete");
    }
}
