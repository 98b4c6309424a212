//! Branded ID newtypes.
//!
//! Each ID is a thin wrapper over `String` so the compiler rejects mixing a
//! [`SessionId`] where a [`UserId`] is expected. All IDs serialize as plain
//! JSON strings (`#[serde(transparent)]`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Declares a branded string ID with the shared trait surface.
macro_rules! branded_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Wrap a raw string value.
            #[must_use]
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            /// Borrow the raw string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }

            /// Consume the ID, returning the raw string.
            #[must_use]
            pub fn into_inner(self) -> String {
                self.0
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

branded_id! {
    /// Opaque per-socket connection ID (`conn_<uuidv7>`).
    ConnectionId
}

branded_id! {
    /// Session (project) ID chosen by the first joiner.
    SessionId
}

branded_id! {
    /// Stable user ID extracted from a verified credential.
    UserId
}

impl ConnectionId {
    /// Generate a fresh connection ID.
    ///
    /// UUID v7 keeps IDs time-ordered, which makes log correlation across
    /// a connection's lifetime trivial.
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("conn_{}", Uuid::now_v7()))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
