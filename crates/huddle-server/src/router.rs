//! Inbound envelope dispatch for authenticated connections.
//!
//! Tool calls arrive as `mcp_tool_call` envelopes carrying a `toolName` and
//! an `arguments` object; chat arrives as its own `chat_message` envelope.
//! The tool set is closed:
//!
//! | Tool | Session required | Reply | Broadcast |
//! |------|------------------|-------|-----------|
//! | `join` | no | `mcp_tool_response` | `user_left` to old peers, `user_joined` to new |
//! | `edit:send` | yes | `mcp_tool_response` | `edit_applied`, sender excluded |
//! | `cursor:update` | yes | none on success | `cursor_moved`, sender excluded |
//! | `ai:request_<provider>` | yes | `mcp_tool_response` | none |
//! | `chat_message` envelope | yes | errors only | `new_chat_message`, sender included |
//!
//! For `edit:send` the peer broadcast goes out before the sender's reply.
//! Unknown tools and unknown envelope types get an error reply and leave
//! the connection open.

use std::sync::Arc;

use huddle_core::envelope::{CHAT_MESSAGE, Envelope, MCP_TOOL_CALL};
use huddle_core::errors::HubError;
use huddle_core::identity::Identity;
use huddle_core::ids::SessionId;
use huddle_llm::{AiError, AiProxy};
use metrics::counter;
use serde_json::Value;
use tracing::debug;

use crate::connection::ClientConnection;
use crate::hub::Hub;
use crate::metrics::{CHAT_MESSAGES_TOTAL, TOOL_CALLS_TOTAL};

/// Tool name prefix selecting an AI provider, e.g. `ai:request_openai`.
const AI_REQUEST_PREFIX: &str = "ai:request_";

/// Decoded `toolName` of an `mcp_tool_call` envelope.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ToolAction {
    /// Bind the connection to a session, leaving any previous one.
    Join,
    /// Relay an edit delta to session peers.
    EditSend,
    /// Relay a cursor position to session peers.
    CursorUpdate,
    /// Request an AI completion from the named provider.
    AiRequest(String),
    /// Anything outside the closed tool set.
    Unknown(String),
}

impl ToolAction {
    /// Decode a raw tool name. Total: unrecognized names map to
    /// [`ToolAction::Unknown`], never an error.
    #[must_use]
    pub fn decode(tool_name: &str) -> Self {
        match tool_name {
            "join" => Self::Join,
            "edit:send" => Self::EditSend,
            "cursor:update" => Self::CursorUpdate,
            other => match other.strip_prefix(AI_REQUEST_PREFIX) {
                Some(hint) if !hint.is_empty() => Self::AiRequest(hint.to_string()),
                _ => Self::Unknown(other.to_string()),
            },
        }
    }

    /// Bounded label value for the per-tool counter.
    fn metric_label(&self) -> &'static str {
        match self {
            Self::Join => "join",
            Self::EditSend => "edit:send",
            Self::CursorUpdate => "cursor:update",
            Self::AiRequest(_) => "ai:request",
            Self::Unknown(_) => "unknown",
        }
    }
}

/// Dispatches parsed envelopes from authenticated connections.
pub struct MessageRouter {
    hub: Arc<Hub>,
    ai: Arc<AiProxy>,
}

impl MessageRouter {
    /// Create a router over the shared hub and AI proxy.
    #[must_use]
    pub fn new(hub: Arc<Hub>, ai: Arc<AiProxy>) -> Self {
        Self { hub, ai }
    }

    /// Handle one envelope from an authenticated connection.
    ///
    /// Every failure is answered with a reply envelope on the sender's
    /// channel; nothing here closes the connection.
    pub async fn handle(&self, connection: &ClientConnection, envelope: Envelope) {
        match envelope.envelope_type.as_str() {
            MCP_TOOL_CALL => self.handle_tool_call(connection, envelope).await,
            CHAT_MESSAGE => self.handle_chat(connection, envelope).await,
            other => {
                debug!(connection_id = %connection.id, envelope_type = other, "unknown envelope type");
                let err = HubError::UnknownEnvelopeType {
                    envelope_type: other.to_string(),
                };
                let _ = connection.send_envelope(&Envelope::error(&err, envelope.request_id.clone()));
            }
        }
    }

    async fn handle_tool_call(&self, connection: &ClientConnection, envelope: Envelope) {
        let request_id = envelope.request_id.clone();
        let Some(tool_name) = envelope
            .payload
            .get("toolName")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
        else {
            let _ = connection.send_envelope(&Envelope::tool_error(
                "toolName must be a non-empty string",
                request_id,
            ));
            return;
        };
        let arguments = envelope
            .payload
            .get("arguments")
            .cloned()
            .unwrap_or(Value::Null);

        let action = ToolAction::decode(tool_name);
        counter!(TOOL_CALLS_TOTAL, "tool" => action.metric_label()).increment(1);
        debug!(connection_id = %connection.id, tool = tool_name, "tool call");

        match action {
            ToolAction::Join => self.handle_join(connection, &arguments, request_id).await,
            ToolAction::EditSend => self.handle_edit(connection, &arguments, request_id).await,
            ToolAction::CursorUpdate => self.handle_cursor(connection, &arguments, request_id).await,
            ToolAction::AiRequest(hint) => {
                self.handle_ai(connection, &hint, &arguments, request_id).await;
            }
            ToolAction::Unknown(name) => {
                let err = HubError::UnknownTool { name };
                let _ = connection.send_envelope(&Envelope::tool_error(&err.to_string(), request_id));
            }
        }
    }

    /// `join`: leave the old session, bind the new one, confirm, announce.
    async fn handle_join(
        &self,
        connection: &ClientConnection,
        arguments: &Value,
        request_id: Option<String>,
    ) {
        let project_id = match require_string(arguments, "projectId") {
            Ok(v) => v,
            Err(e) => {
                let _ = connection.send_envelope(&Envelope::tool_error(&e.to_string(), request_id));
                return;
            }
        };
        let session = SessionId::from(project_id);

        let outcome = match self.hub.join_session(&connection.id, session.clone()).await {
            Ok(o) => o,
            Err(e) => {
                let _ = connection.send_envelope(&Envelope::tool_error(&e.to_string(), request_id));
                return;
            }
        };

        if let Some(departure) = outcome.departed.filter(|d| d.session_remains) {
            let left = Envelope::user_left(&departure.identity);
            self.hub
                .broadcast(&departure.session, &left, Some(&connection.id))
                .await;
        }

        let _ = connection.send_envelope(&Envelope::tool_success(
            Envelope::joined_payload(&session),
            request_id,
        ));

        if outcome.newly_joined {
            let joined = Envelope::user_joined(&outcome.identity);
            self.hub.broadcast(&session, &joined, Some(&connection.id)).await;
        }
    }

    /// `edit:send`: relay an opaque delta to peers, then confirm.
    async fn handle_edit(
        &self,
        connection: &ClientConnection,
        arguments: &Value,
        request_id: Option<String>,
    ) {
        let (session, identity) = match require_session(connection) {
            Ok(v) => v,
            Err(e) => {
                let _ = connection.send_envelope(&Envelope::tool_error(&e.to_string(), request_id));
                return;
            }
        };
        let file_id = match require_string(arguments, "fileId") {
            Ok(v) => v,
            Err(e) => {
                let _ = connection.send_envelope(&Envelope::tool_error(&e.to_string(), request_id));
                return;
            }
        };
        let Some(change_data) = arguments.get("changeData").filter(|v| v.is_array()).cloned()
        else {
            let _ = connection
                .send_envelope(&Envelope::tool_error("changeData must be an array", request_id));
            return;
        };

        let event = Envelope::edit_applied(&file_id, change_data, &identity);
        self.hub.broadcast(&session, &event, Some(&connection.id)).await;
        let _ = connection.send_envelope(&Envelope::tool_success(Value::Null, request_id));
    }

    /// `cursor:update`: relay an opaque position to peers. No success reply.
    async fn handle_cursor(
        &self,
        connection: &ClientConnection,
        arguments: &Value,
        request_id: Option<String>,
    ) {
        let (session, identity) = match require_session(connection) {
            Ok(v) => v,
            Err(e) => {
                let _ = connection.send_envelope(&Envelope::tool_error(&e.to_string(), request_id));
                return;
            }
        };
        let file_id = match require_string(arguments, "fileId") {
            Ok(v) => v,
            Err(e) => {
                let _ = connection.send_envelope(&Envelope::tool_error(&e.to_string(), request_id));
                return;
            }
        };
        let Some(position) = arguments.get("position").filter(|v| v.is_object()).cloned() else {
            let _ = connection
                .send_envelope(&Envelope::tool_error("position must be an object", request_id));
            return;
        };

        let event = Envelope::cursor_moved(&file_id, position, &identity);
        self.hub.broadcast(&session, &event, Some(&connection.id)).await;
    }

    /// `ai:request_<provider>`: proxy one completion, reply to sender only.
    async fn handle_ai(
        &self,
        connection: &ClientConnection,
        hint: &str,
        arguments: &Value,
        request_id: Option<String>,
    ) {
        if let Err(e) = require_session(connection) {
            let _ = connection.send_envelope(&Envelope::tool_error(&e.to_string(), request_id));
            return;
        }
        let Some(prompt) = arguments.get("prompt").and_then(Value::as_str) else {
            let _ = connection
                .send_envelope(&Envelope::tool_error("prompt must be a string", request_id));
            return;
        };

        match self.ai.complete(hint, prompt).await {
            Ok(text) => {
                let _ = connection
                    .send_envelope(&Envelope::tool_success(Value::String(text), request_id));
            }
            Err(e) => {
                let err = map_ai_error(e);
                let _ = connection.send_envelope(&Envelope::tool_error(&err.to_string(), request_id));
            }
        }
    }

    /// `chat_message`: relay to every session member, the sender included.
    async fn handle_chat(&self, connection: &ClientConnection, envelope: Envelope) {
        let request_id = envelope.request_id.clone();
        let (session, identity) = match require_session(connection) {
            Ok(v) => v,
            Err(e) => {
                let _ = connection.send_envelope(&Envelope::error(&e, request_id));
                return;
            }
        };
        let message = envelope
            .payload
            .get("message")
            .and_then(Value::as_str)
            .map(str::trim)
            .unwrap_or_default();
        if message.is_empty() {
            let err = HubError::InvalidParams {
                message: "message must be a non-empty string".to_string(),
            };
            let _ = connection.send_envelope(&Envelope::error(&err, request_id));
            return;
        }

        counter!(CHAT_MESSAGES_TOTAL).increment(1);
        let chat = Envelope::new_chat_message(&identity, message);
        self.hub.broadcast(&session, &chat, None).await;
    }
}

/// Session-scoped operations need a bound session and a verified identity.
fn require_session(connection: &ClientConnection) -> Result<(SessionId, Identity), HubError> {
    let session = connection.session_id().ok_or(HubError::NotInSession)?;
    let identity = connection.identity().ok_or(HubError::AuthRequired)?;
    Ok((session, identity))
}

/// Extract a required non-empty string argument.
fn require_string(arguments: &Value, key: &str) -> Result<String, HubError> {
    arguments
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .ok_or_else(|| HubError::InvalidParams {
            message: format!("{key} must be a non-empty string"),
        })
}

fn map_ai_error(err: AiError) -> HubError {
    match err {
        AiError::UnknownProvider { provider } => HubError::UnknownProvider { provider },
        AiError::Unconfigured { provider } => HubError::ProviderUnconfigured { provider },
        AiError::RequestFailed { message } => HubError::AiRequestFailed { message },
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
