//! Broadcast telemetry events.
//!
//! Every broadcast emits one [`TelemetryEvent`] describing the session, the
//! event type that was fanned out, and when it happened. Events flow through
//! a [`TelemetrySink`] so the hub never blocks on whoever consumes them; the
//! default [`ChannelSink`] pushes onto an unbounded channel drained by
//! [`run_logging_consumer`].

use std::sync::Arc;

use chrono::{SecondsFormat, Utc};
use huddle_core::ids::SessionId;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};

/// One record per broadcast, regardless of how many recipients it reached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelemetryEvent {
    /// Session the broadcast targeted.
    pub session_id: SessionId,
    /// Envelope type that was fanned out, e.g. `edit_applied`.
    pub event_type: String,
    /// UTC wall-clock time in RFC 3339 with millisecond precision.
    pub timestamp: String,
}

impl TelemetryEvent {
    /// Build an event stamped with the current time.
    #[must_use]
    pub fn now(session_id: SessionId, event_type: &str) -> Self {
        Self {
            session_id,
            event_type: event_type.to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        }
    }
}

/// Destination for telemetry events.
///
/// `record` must not block: the hub calls it while holding its state lock.
pub trait TelemetrySink: Send + Sync {
    /// Accept one event. Delivery is best effort.
    fn record(&self, event: TelemetryEvent);
}

/// Sink that forwards events onto an unbounded mpsc channel.
#[derive(Debug)]
pub struct ChannelSink {
    tx: UnboundedSender<TelemetryEvent>,
}

impl ChannelSink {
    /// Create a sink together with the receiving half of its channel.
    #[must_use]
    pub fn new() -> (Arc<Self>, UnboundedReceiver<TelemetryEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Arc::new(Self { tx }), rx)
    }
}

impl TelemetrySink for ChannelSink {
    fn record(&self, event: TelemetryEvent) {
        // Consumer gone means nobody wants telemetry anymore; drop silently.
        let _ = self.tx.send(event);
    }
}

/// Drain a telemetry channel into the structured log.
pub async fn run_logging_consumer(mut rx: UnboundedReceiver<TelemetryEvent>) {
    while let Some(event) = rx.recv().await {
        tracing::debug!(
            session_id = %event.session_id,
            event_type = %event.event_type,
            timestamp = %event.timestamp,
            "broadcast telemetry"
        );
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
