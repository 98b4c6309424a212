//! Credential verification.
//!
//! Editor credentials are HS256-signed JWTs carrying the user id in `sub`
//! and the display name in `name`. Verification is a pure function of the
//! token and the process-wide secret; expiry is enforced by `jsonwebtoken`'s
//! standard validation.

use huddle_core::errors::HubError;
use huddle_core::identity::Identity;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

/// Claims carried by an editor credential.
///
/// Identity claims default to empty so their absence surfaces as
/// `CredentialIncomplete` rather than a generic decode failure.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// Stable user id.
    #[serde(default)]
    pub sub: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Expiry, Unix seconds.
    pub exp: i64,
}

/// Verifies editor credentials against the process-wide secret.
pub struct Authenticator {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator").finish_non_exhaustive()
    }
}

impl Authenticator {
    /// Create an authenticator from the shared signing secret.
    #[must_use]
    pub fn new(secret: &str) -> Self {
        Self {
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation: Validation::new(Algorithm::HS256),
        }
    }

    /// Verify a token and extract the identity it asserts.
    ///
    /// # Errors
    ///
    /// [`HubError::CredentialMissing`] when the token is absent or blank,
    /// [`HubError::CredentialInvalid`] when signature or expiry verification
    /// fails, [`HubError::CredentialIncomplete`] when a verified token lacks
    /// `sub` or `name`.
    pub fn authenticate(&self, token: &str) -> Result<Identity, HubError> {
        if token.trim().is_empty() {
            return Err(HubError::CredentialMissing);
        }

        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            HubError::CredentialInvalid {
                reason: e.to_string(),
            }
        })?;

        let claims = data.claims;
        if claims.sub.trim().is_empty() {
            return Err(HubError::CredentialIncomplete {
                claim: "sub".to_string(),
            });
        }
        if claims.name.trim().is_empty() {
            return Err(HubError::CredentialIncomplete {
                claim: "name".to_string(),
            });
        }

        Ok(Identity::new(claims.sub, claims.name))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use serde_json::json;

    const SECRET: &str = "unit-test-secret";

    fn sign(claims: &serde_json::Value, secret: &str) -> String {
        encode(
            &Header::default(),
            claims,
            &EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn future_exp() -> i64 {
        chrono::Utc::now().timestamp() + 3600
    }

    #[test]
    fn valid_token_yields_identity() {
        let token = sign(&json!({"sub": "u1", "name": "Ada", "exp": future_exp()}), SECRET);
        let identity = Authenticator::new(SECRET).authenticate(&token).unwrap();
        assert_eq!(identity.user_id.as_str(), "u1");
        assert_eq!(identity.display_name, "Ada");
    }

    #[test]
    fn empty_token_is_missing() {
        let err = Authenticator::new(SECRET).authenticate("").unwrap_err();
        assert_matches!(err, HubError::CredentialMissing);
    }

    #[test]
    fn whitespace_token_is_missing() {
        let err = Authenticator::new(SECRET).authenticate("   ").unwrap_err();
        assert_matches!(err, HubError::CredentialMissing);
    }

    #[test]
    fn garbage_token_is_invalid() {
        let err = Authenticator::new(SECRET)
            .authenticate("not.a.jwt")
            .unwrap_err();
        assert_matches!(err, HubError::CredentialInvalid { .. });
    }

    #[test]
    fn wrong_secret_is_invalid() {
        let token = sign(&json!({"sub": "u1", "name": "Ada", "exp": future_exp()}), SECRET);
        let err = Authenticator::new("other-secret")
            .authenticate(&token)
            .unwrap_err();
        assert_matches!(err, HubError::CredentialInvalid { .. });
    }

    #[test]
    fn expired_token_is_invalid() {
        // Past the default validation leeway (60s).
        let exp = chrono::Utc::now().timestamp() - 3600;
        let token = sign(&json!({"sub": "u1", "name": "Ada", "exp": exp}), SECRET);
        let err = Authenticator::new(SECRET).authenticate(&token).unwrap_err();
        assert_matches!(err, HubError::CredentialInvalid { .. });
    }

    #[test]
    fn missing_sub_is_incomplete() {
        let token = sign(&json!({"name": "Ada", "exp": future_exp()}), SECRET);
        let err = Authenticator::new(SECRET).authenticate(&token).unwrap_err();
        assert_matches!(err, HubError::CredentialIncomplete { claim } if claim == "sub");
    }

    #[test]
    fn empty_name_is_incomplete() {
        let token = sign(&json!({"sub": "u1", "name": "", "exp": future_exp()}), SECRET);
        let err = Authenticator::new(SECRET).authenticate(&token).unwrap_err();
        assert_matches!(err, HubError::CredentialIncomplete { claim } if claim == "name");
    }

    #[test]
    fn incomplete_errors_are_auth_failures() {
        let token = sign(&json!({"sub": "", "name": "Ada", "exp": future_exp()}), SECRET);
        let err = Authenticator::new(SECRET).authenticate(&token).unwrap_err();
        assert!(err.is_auth_failure());
    }
}
