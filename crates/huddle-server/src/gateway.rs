//! WebSocket gateway: accept, authenticate, dispatch, close.
//!
//! Each accepted socket runs one task. Until the connection authenticates,
//! only `authenticate` envelopes are processed; anything else parseable gets
//! an `AUTH_REQUIRED` error reply and the socket stays open. A connection
//! that has not authenticated when the deadline expires is closed with
//! policy code 1008, as is one presenting a bad credential (after its
//! `auth_failure` reply has been written out). Malformed frames never count
//! as an authentication attempt.
//!
//! The task multiplexes three sources: the authentication deadline, the
//! connection's outbound queue, and inbound frames. On exit the outbound
//! queue is drained before any close frame goes out, so replies queued
//! ahead of the close (the `auth_failure` envelope in particular) reach the
//! client.

use std::sync::Arc;

use axum::extract::State;
use axum::extract::ws::{CloseFrame, Message, WebSocket, WebSocketUpgrade};
use axum::response::IntoResponse;
use futures::{SinkExt, StreamExt};
use huddle_core::envelope::{AUTHENTICATE, Envelope};
use huddle_core::errors::HubError;
use huddle_core::ids::ConnectionId;
use metrics::counter;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::connection::ClientConnection;
use crate::http::AppState;
use crate::metrics::{
    WS_AUTH_FAILURES_TOTAL, WS_AUTH_TIMEOUTS_TOTAL, WS_CONNECTIONS_TOTAL, WS_DISCONNECTIONS_TOTAL,
};

/// WebSocket close code for policy violations (bad or missing credential).
const POLICY_VIOLATION: u16 = 1008;

/// What the socket loop should do after a frame has been handled.
#[derive(Debug)]
enum Flow {
    Continue,
    Close(Option<CloseFrame>),
}

fn policy_violation(reason: &'static str) -> CloseFrame {
    CloseFrame {
        code: POLICY_VIOLATION,
        reason: reason.into(),
    }
}

/// WebSocket upgrade handler.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Run one connection from accept to close.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let id = ConnectionId::generate();
    counter!(WS_CONNECTIONS_TOTAL).increment(1);

    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel();
    let connection = Arc::new(ClientConnection::new(id, outbound_tx));
    state.hub.add_connection(Arc::clone(&connection)).await;
    info!(connection_id = %connection.id, "websocket connection established");

    let (mut ws_tx, mut ws_rx) = socket.split();
    let deadline = tokio::time::sleep(state.auth_deadline);
    tokio::pin!(deadline);
    let mut close_frame: Option<CloseFrame> = None;

    loop {
        tokio::select! {
            // Disabled once authenticated, so the expired timer is never
            // polled again.
            () = &mut deadline, if !connection.is_authenticated() => {
                warn!(connection_id = %connection.id, "authentication deadline expired");
                counter!(WS_AUTH_TIMEOUTS_TOTAL).increment(1);
                close_frame = Some(policy_violation("authentication timeout"));
                break;
            }
            frame = outbound_rx.recv() => {
                match frame {
                    Some(frame) => {
                        if ws_tx.send(Message::Text(frame.as_str().into())).await.is_err() {
                            break;
                        }
                    }
                    None => break,
                }
            }
            incoming = ws_rx.next() => {
                match incoming {
                    Some(Ok(message)) => {
                        match handle_message(&state, &connection, message).await {
                            Flow::Continue => {}
                            Flow::Close(frame) => {
                                close_frame = frame;
                                break;
                            }
                        }
                    }
                    Some(Err(e)) => {
                        debug!(connection_id = %connection.id, error = %e, "websocket read error");
                        break;
                    }
                    None => break,
                }
            }
        }
    }

    // Flush replies queued ahead of the close so the client sees them.
    while let Ok(frame) = outbound_rx.try_recv() {
        if ws_tx.send(Message::Text(frame.as_str().into())).await.is_err() {
            break;
        }
    }
    if let Some(frame) = close_frame {
        let _ = ws_tx.send(Message::Close(Some(frame))).await;
    }

    counter!(WS_DISCONNECTIONS_TOTAL).increment(1);
    info!(connection_id = %connection.id, "websocket connection closed");

    if let Some(departure) = state.hub.remove_connection(&connection.id).await {
        if departure.session_remains {
            let left = Envelope::user_left(&departure.identity);
            state.hub.broadcast(&departure.session, &left, None).await;
        }
    }
}

async fn handle_message(
    state: &AppState,
    connection: &Arc<ClientConnection>,
    message: Message,
) -> Flow {
    match message {
        Message::Text(text) => handle_text(state, connection, text.as_str()).await,
        Message::Binary(_) => {
            let err = HubError::MalformedEnvelope {
                reason: "binary frames are not supported".to_string(),
            };
            let _ = connection.send_envelope(&Envelope::error(&err, None));
            Flow::Continue
        }
        // axum answers pings at the protocol level.
        Message::Ping(_) | Message::Pong(_) => Flow::Continue,
        Message::Close(_) => Flow::Close(None),
    }
}

async fn handle_text(state: &AppState, connection: &Arc<ClientConnection>, raw: &str) -> Flow {
    let envelope = match Envelope::parse(raw) {
        Ok(envelope) => envelope,
        Err(e) => {
            debug!(connection_id = %connection.id, error = %e, "unparseable frame");
            let _ = connection.send_envelope(&Envelope::error(&e, None));
            return Flow::Continue;
        }
    };

    if !connection.is_authenticated() {
        if envelope.envelope_type == AUTHENTICATE {
            return handle_authenticate(state, connection, &envelope);
        }
        let _ = connection.send_envelope(&Envelope::error(
            &HubError::AuthRequired,
            envelope.request_id.clone(),
        ));
        return Flow::Continue;
    }

    state.router.handle(connection, envelope).await;
    Flow::Continue
}

fn handle_authenticate(
    state: &AppState,
    connection: &Arc<ClientConnection>,
    envelope: &Envelope,
) -> Flow {
    let token = envelope
        .payload
        .get("token")
        .and_then(Value::as_str)
        .unwrap_or_default();

    match state.authenticator.authenticate(token) {
        Ok(identity) => {
            info!(
                connection_id = %connection.id,
                user_id = %identity.user_id,
                "connection authenticated"
            );
            let reply =
                Envelope::auth_success(&identity, &connection.id, envelope.request_id.clone());
            connection.set_identity(identity);
            let _ = connection.send_envelope(&reply);
            Flow::Continue
        }
        Err(e) => {
            warn!(connection_id = %connection.id, error = %e, "authentication failed");
            counter!(WS_AUTH_FAILURES_TOTAL).increment(1);
            let _ = connection
                .send_envelope(&Envelope::auth_failure(&e.to_string(), envelope.request_id.clone()));
            Flow::Close(Some(policy_violation("authentication failed")))
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::Authenticator;
    use crate::hub::Hub;
    use crate::router::MessageRouter;
    use crate::telemetry::ChannelSink;
    use assert_matches::assert_matches;
    use huddle_llm::AiProxy;
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::time::Duration;

    const SECRET: &str = "gateway-test-secret";

    fn test_state() -> AppState {
        let (sink, _telemetry_rx) = ChannelSink::new();
        let hub = Arc::new(Hub::new(sink));
        AppState {
            hub: Arc::clone(&hub),
            authenticator: Arc::new(Authenticator::new(SECRET)),
            router: Arc::new(MessageRouter::new(hub, Arc::new(AiProxy::empty()))),
            auth_deadline: Duration::from_secs(10),
            metrics: PrometheusBuilder::new().build_recorder().handle(),
        }
    }

    async fn registered_connection(
        state: &AppState,
    ) -> (Arc<ClientConnection>, mpsc::UnboundedReceiver<Arc<String>>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connection = Arc::new(ClientConnection::new(ConnectionId::generate(), tx));
        state.hub.add_connection(Arc::clone(&connection)).await;
        (connection, rx)
    }

    fn signed_token(secret: &str, sub: &str, name: &str) -> String {
        #[derive(serde::Serialize)]
        struct Claims<'a> {
            sub: &'a str,
            name: &'a str,
            exp: i64,
        }
        let exp = chrono::Utc::now().timestamp() + 3600;
        jsonwebtoken::encode(
            &jsonwebtoken::Header::default(),
            &Claims { sub, name, exp },
            &jsonwebtoken::EncodingKey::from_secret(secret.as_bytes()),
        )
        .unwrap()
    }

    fn next_json(rx: &mut mpsc::UnboundedReceiver<Arc<String>>) -> Value {
        let frame = rx.try_recv().expect("expected a frame");
        serde_json::from_str(&frame).unwrap()
    }

    #[tokio::test]
    async fn pre_auth_tool_call_is_refused_but_connection_survives() {
        let state = test_state();
        let (connection, mut rx) = registered_connection(&state).await;

        let raw = r#"{"type": "mcp_tool_call", "payload": {"toolName": "join"}, "requestId": "r1"}"#;
        let flow = handle_text(&state, &connection, raw).await;

        assert_matches!(flow, Flow::Continue);
        let reply = next_json(&mut rx);
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["payload"]["code"], "AUTH_REQUIRED");
        assert_eq!(reply["requestId"], "r1");
        assert!(!connection.is_authenticated());
    }

    #[tokio::test]
    async fn malformed_frame_replies_and_stays_open() {
        let state = test_state();
        let (connection, mut rx) = registered_connection(&state).await;

        let flow = handle_text(&state, &connection, "{not json").await;

        assert_matches!(flow, Flow::Continue);
        let reply = next_json(&mut rx);
        assert_eq!(reply["type"], "error");
        assert_eq!(reply["payload"]["code"], "MALFORMED_ENVELOPE");
        assert!(!connection.is_authenticated());
    }

    #[tokio::test]
    async fn authenticate_with_valid_token_succeeds() {
        let state = test_state();
        let (connection, mut rx) = registered_connection(&state).await;
        let token = signed_token(SECRET, "u1", "Ada");

        let raw = format!(
            r#"{{"type": "authenticate", "payload": {{"token": "{token}"}}, "requestId": "r1"}}"#
        );
        let flow = handle_text(&state, &connection, &raw).await;

        assert_matches!(flow, Flow::Continue);
        assert!(connection.is_authenticated());
        let reply = next_json(&mut rx);
        assert_eq!(reply["type"], "auth_success");
        assert_eq!(reply["payload"]["userId"], "u1");
        assert_eq!(reply["payload"]["userName"], "Ada");
        assert_eq!(reply["payload"]["connectionId"], connection.id.as_str());
        assert_eq!(reply["requestId"], "r1");
    }

    #[tokio::test]
    async fn authenticate_with_bad_token_replies_then_closes() {
        let state = test_state();
        let (connection, mut rx) = registered_connection(&state).await;

        let raw = r#"{"type": "authenticate", "payload": {"token": "garbage"}}"#;
        let flow = handle_text(&state, &connection, raw).await;

        let frame = assert_matches!(flow, Flow::Close(Some(frame)) => frame);
        assert_eq!(frame.code, POLICY_VIOLATION);
        let reply = next_json(&mut rx);
        assert_eq!(reply["type"], "auth_failure");
        assert!(reply["payload"]["error"].as_str().unwrap().contains("rejected"));
        assert!(!connection.is_authenticated());
    }

    #[tokio::test]
    async fn authenticate_with_missing_token_replies_then_closes() {
        let state = test_state();
        let (connection, mut rx) = registered_connection(&state).await;

        let raw = r#"{"type": "authenticate", "payload": {}}"#;
        let flow = handle_text(&state, &connection, raw).await;

        assert_matches!(flow, Flow::Close(Some(_)));
        let reply = next_json(&mut rx);
        assert_eq!(reply["type"], "auth_failure");
        assert!(reply["payload"]["error"].as_str().unwrap().contains("missing"));
    }

    #[tokio::test]
    async fn binary_frames_are_malformed() {
        let state = test_state();
        let (connection, mut rx) = registered_connection(&state).await;

        let flow = handle_message(&state, &connection, Message::Binary(vec![1, 2, 3].into())).await;

        assert_matches!(flow, Flow::Continue);
        let reply = next_json(&mut rx);
        assert_eq!(reply["payload"]["code"], "MALFORMED_ENVELOPE");
    }

    #[tokio::test]
    async fn close_frame_ends_the_loop_without_policy_code() {
        let state = test_state();
        let (connection, _rx) = registered_connection(&state).await;

        let flow = handle_message(&state, &connection, Message::Close(None)).await;
        assert_matches!(flow, Flow::Close(None));
    }

    #[tokio::test]
    async fn authenticated_envelopes_reach_the_router() {
        let state = test_state();
        let (connection, mut rx) = registered_connection(&state).await;
        let token = signed_token(SECRET, "u1", "Ada");
        let raw = format!(r#"{{"type": "authenticate", "payload": {{"token": "{token}"}}}}"#);
        let _ = handle_text(&state, &connection, &raw).await;
        let _ = rx.try_recv().unwrap(); // auth_success

        let flow = handle_text(
            &state,
            &connection,
            r#"{"type": "mcp_tool_call", "payload": {"toolName": "join", "arguments": {"projectId": "p1"}}}"#,
        )
        .await;

        assert_matches!(flow, Flow::Continue);
        let reply = next_json(&mut rx);
        assert_eq!(reply["type"], "mcp_tool_response");
        assert_eq!(reply["payload"]["projectId"], "p1");
    }

    #[test]
    fn policy_violation_uses_1008() {
        let frame = policy_violation("authentication timeout");
        assert_eq!(frame.code, 1008);
        assert_eq!(frame.reason.as_str(), "authentication timeout");
    }
}
