//! Verified client identity.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Identity extracted from a verified credential.
///
/// Embedded in the connection once authentication succeeds; never stored
/// independently of a live connection.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    /// Stable user ID (`sub` claim).
    pub user_id: UserId,
    /// Human-readable display name (`name` claim).
    pub display_name: String,
}

impl Identity {
    /// Create a new identity.
    #[must_use]
    pub fn new(user_id: impl Into<UserId>, display_name: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: display_name.into(),
        }
    }
}
