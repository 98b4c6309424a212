//! Session membership bookkeeping.
//!
//! A session row exists exactly while its member set is non-empty: created
//! on first join, deleted the moment the last member leaves. Membership is
//! keyed by user id, so several connections from one user collapse into one
//! membership and a leave evicts the user as a whole.

use std::collections::{HashMap, HashSet};

use huddle_core::ids::{SessionId, UserId};

/// What a `leave` call did to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct LeaveOutcome {
    /// The user was a member and has been removed.
    pub removed: bool,
    /// The session still has members afterwards.
    pub session_remains: bool,
}

/// Session id → member user ids.
///
/// Plain data. The hub serializes all access behind its own lock, so this
/// type carries no synchronization of its own.
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: HashMap<SessionId, HashSet<UserId>>,
}

impl SessionRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user to a session, creating the session on first join.
    ///
    /// Idempotent; returns `true` when the user was not already a member.
    pub fn join(&mut self, session: &SessionId, user: &UserId) -> bool {
        self.sessions
            .entry(session.clone())
            .or_default()
            .insert(user.clone())
    }

    /// Remove a user from a session, deleting the session when it empties.
    pub fn leave(&mut self, session: &SessionId, user: &UserId) -> LeaveOutcome {
        let Some(members) = self.sessions.get_mut(session) else {
            return LeaveOutcome {
                removed: false,
                session_remains: false,
            };
        };
        let removed = members.remove(user);
        if members.is_empty() {
            let _ = self.sessions.remove(session);
            LeaveOutcome {
                removed,
                session_remains: false,
            }
        } else {
            LeaveOutcome {
                removed,
                session_remains: true,
            }
        }
    }

    /// Whether a user is currently a member of a session.
    #[must_use]
    pub fn is_member(&self, session: &SessionId, user: &UserId) -> bool {
        self.sessions
            .get(session)
            .is_some_and(|members| members.contains(user))
    }

    /// Number of members in a session; zero when the session does not exist.
    #[must_use]
    pub fn member_count(&self, session: &SessionId) -> usize {
        self.sessions.get(session).map_or(0, HashSet::len)
    }

    /// Number of live sessions.
    #[must_use]
    pub fn session_count(&self) -> usize {
        self.sessions.len()
    }

    /// Whether a session row currently exists.
    #[must_use]
    pub fn contains(&self, session: &SessionId) -> bool {
        self.sessions.contains_key(session)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
