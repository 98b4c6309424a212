//! Per-connection handle shared between the gateway task and the hub.

use std::sync::Arc;

use huddle_core::envelope::Envelope;
use huddle_core::identity::Identity;
use huddle_core::ids::{ConnectionId, SessionId, UserId};
use parking_lot::RwLock;
use tokio::sync::mpsc;
use tracing::warn;

/// Outbound frame queue. Frames are pre-serialized and shared across
/// recipients; the channel is unbounded because broadcast delivery applies
/// no flow control.
pub type OutboundSender = mpsc::UnboundedSender<Arc<String>>;

/// A connected client.
///
/// The gateway task owns the socket; everything else reaches the client
/// through the outbound channel held here. The identity cell is written once
/// on successful authentication; the session cell changes on join/switch.
/// Both are read during broadcast fan-out.
pub struct ClientConnection {
    /// Connection id, allocated at accept.
    pub id: ConnectionId,
    sender: OutboundSender,
    identity: RwLock<Option<Identity>>,
    session: RwLock<Option<SessionId>>,
}

impl ClientConnection {
    /// Create a connection handle around an outbound channel.
    #[must_use]
    pub fn new(id: ConnectionId, sender: OutboundSender) -> Self {
        Self {
            id,
            sender,
            identity: RwLock::new(None),
            session: RwLock::new(None),
        }
    }

    /// Queue a pre-serialized frame.
    ///
    /// Returns `false` when the receiving task is gone, which callers treat
    /// as "connection already closed" and skip without error.
    pub fn send(&self, frame: Arc<String>) -> bool {
        self.sender.send(frame).is_ok()
    }

    /// Serialize and queue one envelope for this connection only.
    pub fn send_envelope(&self, envelope: &Envelope) -> bool {
        match serde_json::to_string(envelope) {
            Ok(json) => self.send(Arc::new(json)),
            Err(e) => {
                warn!(conn_id = %self.id, error = %e, "failed to serialize envelope");
                false
            }
        }
    }

    /// Bind the verified identity. Called once, on successful authentication.
    pub fn set_identity(&self, identity: Identity) {
        *self.identity.write() = Some(identity);
    }

    /// The verified identity, when authenticated.
    #[must_use]
    pub fn identity(&self) -> Option<Identity> {
        self.identity.read().clone()
    }

    /// Whether authentication has completed on this connection.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.identity.read().is_some()
    }

    /// Bound user id, when authenticated.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        self.identity.read().as_ref().map(|i| i.user_id.clone())
    }

    /// Bind to a session, returning the previous binding.
    pub fn bind_session(&self, session: SessionId) -> Option<SessionId> {
        self.session.write().replace(session)
    }

    /// Clear the session binding, returning it.
    pub fn clear_session(&self) -> Option<SessionId> {
        self.session.write().take()
    }

    /// Currently bound session id.
    #[must_use]
    pub fn session_id(&self) -> Option<SessionId> {
        self.session.read().clone()
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
