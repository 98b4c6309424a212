//! # huddle-llm
//!
//! AI completion providers and the hint-based proxy in front of them.
//!
//! - **[`provider`]**: the [`provider::CompletionProvider`] trait and
//!   [`provider::AiError`] — one seam per external text-completion backend.
//! - **[`openai`] / [`anthropic`] / [`google`]**: provider implementations,
//!   each a config struct plus a `reqwest`-backed client issuing exactly one
//!   outbound call per completion (no retries).
//! - **[`proxy`]**: [`proxy::AiProxy`] — selects a provider by hint string
//!   and normalizes unknown/unconfigured hints into typed errors.
//!
//! Adding a provider touches one new module and the proxy constructor;
//! dispatch logic never changes.

#![deny(unsafe_code)]

pub mod anthropic;
pub mod google;
pub mod openai;
pub mod provider;
pub mod proxy;

pub use provider::{AiError, CompletionProvider, ProviderResult};
pub use proxy::{AiProxy, AiProxyConfig, SUPPORTED_PROVIDERS};
