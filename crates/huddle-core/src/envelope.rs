//! Wire envelopes exchanged over a client connection.
//!
//! Every frame is one JSON envelope: a `type` string, an opaque `payload`,
//! and an optional `requestId` correlation token that requests may carry and
//! responses echo back.
//!
//! ## Envelope types
//!
//! | Direction | Type | Payload |
//! |-----------|------|---------|
//! | inbound | `authenticate` | `{token}` |
//! | inbound | `mcp_tool_call` | `{toolName, arguments}` |
//! | inbound | `chat_message` | `{message}` |
//! | outbound | `auth_success` | `{userId, userName, connectionId}` |
//! | outbound | `auth_failure` | `{error}` |
//! | outbound | `mcp_tool_response` | `{success, ...}` or `{error, isError}` |
//! | outbound | `error` | `{code, message}` |
//! | outbound | `user_joined` / `user_left` | `{userId, userName}` |
//! | outbound | `edit_applied` | `{fileId, changeData, sourceUserId, sourceUserName}` |
//! | outbound | `cursor_moved` | `{fileId, position, sourceUserId, sourceUserName}` |
//! | outbound | `new_chat_message` | `{userId, userName, message}` |
//!
//! Payload contents of `changeData` and `position` are never interpreted by
//! the hub; they are forwarded verbatim to session peers.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::errors::HubError;
use crate::identity::Identity;
use crate::ids::{ConnectionId, SessionId};

// ─────────────────────────────────────────────────────────────────────────────
// Envelope type strings
// ─────────────────────────────────────────────────────────────────────────────

/// Inbound: credential presentation.
pub const AUTHENTICATE: &str = "authenticate";
/// Inbound: named tool invocation.
pub const MCP_TOOL_CALL: &str = "mcp_tool_call";
/// Inbound: chat message to the active session.
pub const CHAT_MESSAGE: &str = "chat_message";

/// Outbound: authentication accepted.
pub const AUTH_SUCCESS: &str = "auth_success";
/// Outbound: authentication rejected (connection closes afterwards).
pub const AUTH_FAILURE: &str = "auth_failure";
/// Outbound: tool invocation result.
pub const MCP_TOOL_RESPONSE: &str = "mcp_tool_response";
/// Outbound: request-level error.
pub const ERROR: &str = "error";
/// Outbound broadcast: a user joined the session.
pub const USER_JOINED: &str = "user_joined";
/// Outbound broadcast: a user left the session.
pub const USER_LEFT: &str = "user_left";
/// Outbound broadcast: an edit delta from a session peer.
pub const EDIT_APPLIED: &str = "edit_applied";
/// Outbound broadcast: a cursor position from a session peer.
pub const CURSOR_MOVED: &str = "cursor_moved";
/// Outbound broadcast: a chat message (sender included).
pub const NEW_CHAT_MESSAGE: &str = "new_chat_message";

// ─────────────────────────────────────────────────────────────────────────────
// Envelope
// ─────────────────────────────────────────────────────────────────────────────

/// One wire frame.
///
/// `payload` stays an opaque [`Value`]: the router interprets it per type,
/// and relayed payload fragments pass through untouched.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Envelope {
    /// Envelope type discriminator.
    #[serde(rename = "type")]
    pub envelope_type: String,
    /// Type-specific payload.
    #[serde(default)]
    pub payload: Value,
    /// Correlation token, echoed on responses when present on the request.
    #[serde(rename = "requestId", default, skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
}

impl Envelope {
    /// Create an envelope with no correlation token.
    #[must_use]
    pub fn new(envelope_type: impl Into<String>, payload: Value) -> Self {
        Self {
            envelope_type: envelope_type.into(),
            payload,
            request_id: None,
        }
    }

    /// Attach a correlation token.
    #[must_use]
    pub fn with_request_id(mut self, request_id: Option<String>) -> Self {
        self.request_id = request_id;
        self
    }

    /// Parse a text frame into an envelope.
    pub fn parse(raw: &str) -> Result<Self, HubError> {
        serde_json::from_str(raw).map_err(|e| HubError::MalformedEnvelope {
            reason: e.to_string(),
        })
    }

    // ── Outbound constructors ───────────────────────────────────────────

    /// `auth_success` reply to the authenticating connection.
    #[must_use]
    pub fn auth_success(
        identity: &Identity,
        connection_id: &ConnectionId,
        request_id: Option<String>,
    ) -> Self {
        Self::new(
            AUTH_SUCCESS,
            json!({
                "userId": identity.user_id,
                "userName": identity.display_name,
                "connectionId": connection_id,
            }),
        )
        .with_request_id(request_id)
    }

    /// `auth_failure` reply carrying the rejection reason.
    #[must_use]
    pub fn auth_failure(message: &str, request_id: Option<String>) -> Self {
        Self::new(AUTH_FAILURE, json!({ "error": message })).with_request_id(request_id)
    }

    /// Successful `mcp_tool_response`.
    ///
    /// `data` fields are merged into the payload alongside `success: true`.
    #[must_use]
    pub fn tool_success(data: Value, request_id: Option<String>) -> Self {
        let mut payload = match data {
            Value::Object(map) => map,
            Value::Null => serde_json::Map::new(),
            other => {
                let mut map = serde_json::Map::new();
                let _ = map.insert("result".to_string(), other);
                map
            }
        };
        let _ = payload.insert("success".to_string(), Value::Bool(true));
        Self::new(MCP_TOOL_RESPONSE, Value::Object(payload)).with_request_id(request_id)
    }

    /// Failed `mcp_tool_response`.
    #[must_use]
    pub fn tool_error(message: &str, request_id: Option<String>) -> Self {
        Self::new(
            MCP_TOOL_RESPONSE,
            json!({ "error": message, "isError": true }),
        )
        .with_request_id(request_id)
    }

    /// Request-level `error` reply.
    #[must_use]
    pub fn error(err: &HubError, request_id: Option<String>) -> Self {
        Self::new(
            ERROR,
            json!({ "code": err.code(), "message": err.to_string() }),
        )
        .with_request_id(request_id)
    }

    /// `user_joined` broadcast to session peers.
    #[must_use]
    pub fn user_joined(identity: &Identity) -> Self {
        Self::new(
            USER_JOINED,
            json!({
                "userId": identity.user_id,
                "userName": identity.display_name,
            }),
        )
    }

    /// `user_left` broadcast to remaining session peers.
    #[must_use]
    pub fn user_left(identity: &Identity) -> Self {
        Self::new(
            USER_LEFT,
            json!({
                "userId": identity.user_id,
                "userName": identity.display_name,
            }),
        )
    }

    /// `edit_applied` broadcast relaying an opaque edit delta.
    #[must_use]
    pub fn edit_applied(file_id: &str, change_data: Value, source: &Identity) -> Self {
        Self::new(
            EDIT_APPLIED,
            json!({
                "fileId": file_id,
                "changeData": change_data,
                "sourceUserId": source.user_id,
                "sourceUserName": source.display_name,
            }),
        )
    }

    /// `cursor_moved` broadcast relaying an opaque cursor position.
    #[must_use]
    pub fn cursor_moved(file_id: &str, position: Value, source: &Identity) -> Self {
        Self::new(
            CURSOR_MOVED,
            json!({
                "fileId": file_id,
                "position": position,
                "sourceUserId": source.user_id,
                "sourceUserName": source.display_name,
            }),
        )
    }

    /// `new_chat_message` broadcast (delivered to the sender as well).
    #[must_use]
    pub fn new_chat_message(sender: &Identity, message: &str) -> Self {
        Self::new(
            NEW_CHAT_MESSAGE,
            json!({
                "userId": sender.user_id,
                "userName": sender.display_name,
                "message": message,
            }),
        )
    }

    /// Payload for a successful `join` tool response.
    #[must_use]
    pub fn joined_payload(session_id: &SessionId) -> Value {
        json!({ "projectId": session_id })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
