//! Connection and session state behind a single lock, plus broadcast fan-out.
//!
//! The hub owns one [`RwLock`] over all connections and session membership.
//! Every mutation (register, deregister, join, switch) happens inside one
//! exclusive acquisition, so a session switch leaves no window where a
//! connection is half-moved. Fan-out serializes the envelope once, then
//! pushes clones of a single `Arc` onto per-connection outbound channels
//! under the read guard; the pushes are synchronous, so the guard is never
//! held across an await. Callers broadcast after the mutation that triggered
//! the event has released the write guard.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use huddle_core::envelope::Envelope;
use huddle_core::errors::HubError;
use huddle_core::identity::Identity;
use huddle_core::ids::{ConnectionId, SessionId};
use metrics::{counter, gauge};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::connection::ClientConnection;
use crate::metrics::{
    BROADCASTS_TOTAL, BROADCAST_RECIPIENTS_TOTAL, SESSIONS_ACTIVE, SESSION_JOINS_TOTAL,
    WS_BROADCAST_DROPS_TOTAL, WS_CONNECTIONS_ACTIVE,
};
use crate::sessions::SessionRegistry;
use crate::telemetry::{TelemetryEvent, TelemetrySink};

/// Everything the hub guards: connections by id plus session membership.
#[derive(Default)]
struct HubState {
    connections: HashMap<ConnectionId, Arc<ClientConnection>>,
    sessions: SessionRegistry,
}

/// A session the connection's user left as a side effect of a join or a
/// disconnect. The caller broadcasts `user_left` to it when it survived.
#[derive(Clone, Debug)]
pub struct Departure {
    /// Session the user was removed from.
    pub session: SessionId,
    /// Who left.
    pub identity: Identity,
    /// Whether the session still has members. When `false` the session row
    /// was deleted and there is nobody left to notify.
    pub session_remains: bool,
}

/// Result of a join: who joined, who (if anyone) departed an old session,
/// and whether the user's membership in the target session is new.
#[derive(Debug)]
pub struct JoinOutcome {
    /// Verified identity of the joining user.
    pub identity: Identity,
    /// Set when the connection was bound to a different session before.
    pub departed: Option<Departure>,
    /// `false` when the user was already a member through this or another
    /// connection, in which case peers were already told.
    pub newly_joined: bool,
}

/// Shared connection registry, session membership, and broadcast engine.
pub struct Hub {
    state: RwLock<HubState>,
    telemetry: Arc<dyn TelemetrySink>,
    active_connections: AtomicUsize,
}

impl std::fmt::Debug for Hub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hub")
            .field(
                "active_connections",
                &self.active_connections.load(Ordering::Relaxed),
            )
            .finish_non_exhaustive()
    }
}

impl Hub {
    /// Create a hub that reports broadcasts to the given telemetry sink.
    #[must_use]
    pub fn new(telemetry: Arc<dyn TelemetrySink>) -> Self {
        Self {
            state: RwLock::new(HubState::default()),
            telemetry,
            active_connections: AtomicUsize::new(0),
        }
    }

    /// Register a connection.
    pub async fn add_connection(&self, connection: Arc<ClientConnection>) {
        let mut state = self.state.write().await;
        let previous = state
            .connections
            .insert(connection.id.clone(), connection);
        drop(state);
        if previous.is_none() {
            let _ = self.active_connections.fetch_add(1, Ordering::Relaxed);
            gauge!(WS_CONNECTIONS_ACTIVE).increment(1.0);
        }
    }

    /// Deregister a connection and evict its user from any bound session.
    ///
    /// Membership is keyed by user id, so this removes the user as a whole
    /// even when other connections of the same user are still bound to the
    /// session. Returns the departure for the caller to announce.
    pub async fn remove_connection(&self, connection_id: &ConnectionId) -> Option<Departure> {
        let mut state = self.state.write().await;
        let connection = state.connections.remove(connection_id)?;
        let _ = self.active_connections.fetch_sub(1, Ordering::Relaxed);
        gauge!(WS_CONNECTIONS_ACTIVE).decrement(1.0);

        let session = connection.clear_session()?;
        let identity = connection.identity()?;
        let outcome = state.sessions.leave(&session, &identity.user_id);
        gauge!(SESSIONS_ACTIVE).set(state.sessions.session_count() as f64);
        drop(state);

        outcome.removed.then(|| Departure {
            session,
            identity,
            session_remains: outcome.session_remains,
        })
    }

    /// Bind a connection to a session, leaving any previous one.
    ///
    /// Leave-old, rebind, and join-new happen under one exclusive guard, so
    /// no concurrent join or broadcast observes the switch half-done.
    ///
    /// # Errors
    ///
    /// Returns [`HubError::AuthRequired`] when the connection is unknown or
    /// has no verified identity.
    pub async fn join_session(
        &self,
        connection_id: &ConnectionId,
        session: SessionId,
    ) -> Result<JoinOutcome, HubError> {
        let mut state = self.state.write().await;
        let connection = state
            .connections
            .get(connection_id)
            .cloned()
            .ok_or(HubError::AuthRequired)?;
        let identity = connection.identity().ok_or(HubError::AuthRequired)?;

        let previous = connection.bind_session(session.clone());
        let departed = match previous {
            Some(old) if old != session => {
                let outcome = state.sessions.leave(&old, &identity.user_id);
                outcome.removed.then(|| Departure {
                    session: old,
                    identity: identity.clone(),
                    session_remains: outcome.session_remains,
                })
            }
            _ => None,
        };

        let newly_joined = state.sessions.join(&session, &identity.user_id);
        if newly_joined {
            counter!(SESSION_JOINS_TOTAL).increment(1);
        }
        gauge!(SESSIONS_ACTIVE).set(state.sessions.session_count() as f64);
        drop(state);

        debug!(
            connection_id = %connection_id,
            user_id = %identity.user_id,
            session_id = %session,
            newly_joined,
            "connection joined session"
        );
        Ok(JoinOutcome {
            identity,
            departed,
            newly_joined,
        })
    }

    /// Fan an envelope out to every member connection of a session.
    ///
    /// The envelope is serialized once; each recipient gets a clone of the
    /// same `Arc`. A connection receives the frame when it is bound to the
    /// session, its user is currently a member, and it is not the excluded
    /// sender. Closed outbound channels are skipped. One telemetry event is
    /// recorded per broadcast, recipients or not.
    pub async fn broadcast(
        &self,
        session: &SessionId,
        envelope: &Envelope,
        exclude: Option<&ConnectionId>,
    ) {
        let frame = match serde_json::to_string(envelope) {
            Ok(json) => Arc::new(json),
            Err(e) => {
                warn!(event_type = %envelope.envelope_type, error = %e, "failed to serialize broadcast");
                return;
            }
        };

        let mut recipients: u64 = 0;
        {
            let state = self.state.read().await;
            for connection in state.connections.values() {
                if exclude.is_some_and(|id| *id == connection.id) {
                    continue;
                }
                if connection.session_id().as_ref() != Some(session) {
                    continue;
                }
                let Some(user_id) = connection.user_id() else {
                    continue;
                };
                if !state.sessions.is_member(session, &user_id) {
                    continue;
                }
                if connection.send(Arc::clone(&frame)) {
                    recipients += 1;
                } else {
                    counter!(WS_BROADCAST_DROPS_TOTAL).increment(1);
                    debug!(connection_id = %connection.id, session_id = %session, "skipped closed connection");
                }
            }
        }

        counter!(BROADCASTS_TOTAL, "event_type" => envelope.envelope_type.clone()).increment(1);
        counter!(BROADCAST_RECIPIENTS_TOTAL, "event_type" => envelope.envelope_type.clone())
            .increment(recipients);
        debug!(
            event_type = %envelope.envelope_type,
            session_id = %session,
            recipients,
            "broadcast event to session"
        );
        self.telemetry
            .record(TelemetryEvent::now(session.clone(), &envelope.envelope_type));
    }

    /// Look up a connection by id.
    pub async fn connection(&self, connection_id: &ConnectionId) -> Option<Arc<ClientConnection>> {
        self.state.read().await.connections.get(connection_id).cloned()
    }

    /// Number of registered connections.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Number of live sessions.
    pub async fn session_count(&self) -> usize {
        self.state.read().await.sessions.session_count()
    }

    /// Number of member users in a session; zero when it does not exist.
    pub async fn session_member_count(&self, session: &SessionId) -> usize {
        self.state.read().await.sessions.member_count(session)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
