//! # huddle
//!
//! Collaboration hub server binary — loads settings, wires the hub,
//! AI proxy, and telemetry consumer together, and serves HTTP + WebSocket
//! on one listener until SIGINT/SIGTERM.

#![deny(unsafe_code)]

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::Parser;
use huddle_llm::proxy::{AiProxy, AiProxyConfig};
use huddle_server::http::AppState;
use huddle_server::hub::Hub;
use huddle_server::telemetry::{ChannelSink, run_logging_consumer};
use huddle_settings::{ProviderEntry, ProviderSettings};
use tokio::net::TcpListener;
use tracing::info;

#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

/// Huddle collaboration hub server.
#[derive(Parser, Debug)]
#[command(name = "huddle", about = "Real-time collaboration hub server")]
struct Cli {
    /// Host to bind (overrides settings).
    #[arg(long)]
    host: Option<String>,

    /// Port to bind (overrides settings; 0 for auto-assign).
    #[arg(long)]
    port: Option<u16>,

    /// Path to the settings file (default `~/.huddle/settings.json`).
    #[arg(long)]
    settings: Option<PathBuf>,
}

fn init_tracing(default_level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_level.to_string())),
        )
        .init();
}

/// Map configured provider entries onto proxy provider configs.
///
/// Entries without a model override get the provider's default model.
fn proxy_config(providers: &ProviderSettings) -> AiProxyConfig {
    fn model(entry: &ProviderEntry, default: &str) -> String {
        entry.model.clone().unwrap_or_else(|| default.to_string())
    }

    AiProxyConfig {
        openai: providers.openai.as_ref().map(|e| huddle_llm::openai::OpenAIConfig {
            api_key: e.api_key.clone(),
            model: model(e, huddle_llm::openai::DEFAULT_MODEL),
            base_url: e.base_url.clone(),
        }),
        anthropic: providers
            .anthropic
            .as_ref()
            .map(|e| huddle_llm::anthropic::AnthropicConfig {
                api_key: e.api_key.clone(),
                model: model(e, huddle_llm::anthropic::DEFAULT_MODEL),
                base_url: e.base_url.clone(),
                max_tokens: None,
            }),
        google: providers.google.as_ref().map(|e| huddle_llm::google::GoogleConfig {
            api_key: e.api_key.clone(),
            model: model(e, huddle_llm::google::DEFAULT_MODEL),
            base_url: e.base_url.clone(),
        }),
    }
}

/// Resolve until either SIGINT or SIGTERM arrives.
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install SIGINT handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received SIGINT, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut settings = match &cli.settings {
        Some(path) => huddle_settings::load_settings_from_path(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => huddle_settings::load_settings().context("failed to load settings")?,
    };
    if let Some(host) = cli.host {
        settings.server.host = host;
    }
    if let Some(port) = cli.port {
        settings.server.port = port;
    }

    init_tracing(&settings.logging.level);

    let Some(secret) = settings.auth.secret.clone() else {
        bail!(
            "no authentication secret configured; set auth.secret in the \
             settings file or the HUDDLE_AUTH_SECRET environment variable"
        );
    };

    let metrics = huddle_server::metrics::install_recorder();

    let (sink, telemetry_rx) = ChannelSink::new();
    drop(tokio::spawn(run_logging_consumer(telemetry_rx)));

    let hub = Arc::new(Hub::new(sink));
    let ai = Arc::new(AiProxy::new(proxy_config(&settings.providers)));
    info!(providers = ?ai.configured(), "AI providers configured");

    let state = AppState::new(&settings, &secret, hub, ai, metrics);

    let addr = format!("{}:{}", settings.server.host, settings.server.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    let local = listener.local_addr().context("failed to read bound address")?;
    info!(addr = %local, "huddle server listening");

    huddle_server::http::serve(listener, state, shutdown_signal())
        .await
        .context("server error")?;

    info!("huddle server stopped");
    Ok(())
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
