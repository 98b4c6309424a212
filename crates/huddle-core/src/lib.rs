//! # huddle-core
//!
//! Foundation types, errors, branded IDs, and wire envelopes for the Huddle
//! collaboration server.
//!
//! This crate provides the shared vocabulary that all other Huddle crates
//! depend on:
//!
//! - **Branded IDs**: [`ids::ConnectionId`], [`ids::SessionId`], [`ids::UserId`] as newtypes
//! - **Identity**: [`identity::Identity`] extracted from a verified credential
//! - **Envelopes**: [`envelope::Envelope`] wire frames plus outbound constructors
//! - **Errors**: [`errors::HubError`] hierarchy via `thiserror`, stable wire codes
//!
//! ## Crate Position
//!
//! Foundation crate. Depended on by all other huddle crates.

#![deny(unsafe_code)]

pub mod envelope;
pub mod errors;
pub mod identity;
pub mod ids;
