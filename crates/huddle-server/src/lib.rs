//! Collaboration hub server: WebSocket gateway, session registry, broadcast
//! fan-out, and the AI completion path.
//!
//! ## Submodules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | `auth` | Credential verification: HS256 JWT → verified identity |
//! | `connection` | Per-connection handle: outbound queue, identity and session cells |
//! | `gateway` | WebSocket upgrade, per-connection event loop, auth deadline |
//! | `hub` | Shared registries (connections + sessions) and broadcast fan-out |
//! | `router` | Tool-call decoding and dispatch for authenticated envelopes |
//! | `sessions` | Session membership bookkeeping |
//! | `telemetry` | Per-broadcast notification sink |
//! | `metrics` | Prometheus recorder and metric name constants |
//! | `http` | Route assembly: `/ws`, `/health`, `/status`, `/metrics` |
//!
//! ## Data flow
//!
//! `gateway` reads frames → `router` dispatches → `hub` fans out → peer
//! gateways write frames. AI requests leave through `huddle_llm` and the
//! reply returns to the requesting connection only.

#![deny(unsafe_code)]

pub mod auth;
pub mod connection;
pub mod gateway;
pub mod http;
pub mod hub;
pub mod metrics;
pub mod router;
pub mod sessions;
pub mod telemetry;
