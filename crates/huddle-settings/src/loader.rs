//! Settings loading: defaults, file deep-merge, environment overrides.

use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::{debug, warn};

use crate::errors::{Result, SettingsError};
use crate::types::{HuddleSettings, ProviderEntry};

/// Default settings file location: `~/.huddle/settings.json`.
#[must_use]
pub fn settings_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(".huddle").join("settings.json")
}

/// Load settings from the default path with env overrides applied.
///
/// A missing settings file is not an error; defaults plus env overrides are
/// returned instead.
pub fn load_settings() -> Result<HuddleSettings> {
    load_settings_from_path(&settings_path())
}

/// Load settings from a specific file path.
///
/// Layers: compiled defaults ← file (deep-merged) ← `HUDDLE_*` env vars.
pub fn load_settings_from_path(path: &Path) -> Result<HuddleSettings> {
    let defaults = serde_json::to_value(HuddleSettings::default())
        .map_err(|e| SettingsError::Parse {
            reason: e.to_string(),
        })?;

    let merged = if path.exists() {
        let raw = std::fs::read_to_string(path).map_err(|e| SettingsError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        let file: Value = serde_json::from_str(&raw).map_err(|e| SettingsError::Parse {
            reason: e.to_string(),
        })?;
        debug!(path = %path.display(), "settings file loaded");
        deep_merge(defaults, file)
    } else {
        debug!(path = %path.display(), "no settings file, using defaults");
        defaults
    };

    let mut settings: HuddleSettings =
        serde_json::from_value(merged).map_err(|e| SettingsError::Parse {
            reason: e.to_string(),
        })?;

    apply_env_overrides(&mut settings);
    settings.validate();
    Ok(settings)
}

/// Recursively merge `overlay` into `base`.
///
/// Objects merge key-by-key; any other overlay value replaces the base value
/// outright. Arrays are replaced, not concatenated.
#[must_use]
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            for (key, overlay_value) in overlay_map {
                let merged = match base_map.remove(&key) {
                    Some(base_value) => deep_merge(base_value, overlay_value),
                    None => overlay_value,
                };
                let _ = base_map.insert(key, merged);
            }
            Value::Object(base_map)
        }
        (_, overlay) => overlay,
    }
}

/// Apply `HUDDLE_*` environment variable overrides.
pub fn apply_env_overrides(settings: &mut HuddleSettings) {
    apply_env_from(settings, |key| std::env::var(key).ok());
}

/// Apply overrides from an arbitrary variable source.
///
/// Split out from [`apply_env_overrides`] so tests can inject variables
/// without mutating process environment.
fn apply_env_from(settings: &mut HuddleSettings, get: impl Fn(&str) -> Option<String>) {
    if let Some(secret) = get("HUDDLE_AUTH_SECRET") {
        settings.auth.secret = Some(secret);
    }
    if let Some(host) = get("HUDDLE_HOST") {
        settings.server.host = host;
    }
    if let Some(port) = get("HUDDLE_PORT") {
        match port.parse::<u16>() {
            Ok(p) => settings.server.port = p,
            Err(_) => warn!(value = %port, "ignoring non-numeric HUDDLE_PORT"),
        }
    }
    if let Some(deadline) = get("HUDDLE_AUTH_DEADLINE_MS") {
        match deadline.parse::<u64>() {
            Ok(ms) => settings.server.auth_deadline_ms = ms,
            Err(_) => warn!(value = %deadline, "ignoring non-numeric HUDDLE_AUTH_DEADLINE_MS"),
        }
    }

    override_provider_key(&mut settings.providers.openai, get("HUDDLE_OPENAI_API_KEY"));
    override_provider_key(
        &mut settings.providers.anthropic,
        get("HUDDLE_ANTHROPIC_API_KEY"),
    );
    override_provider_key(&mut settings.providers.google, get("HUDDLE_GOOGLE_API_KEY"));
}

/// Replace or create a provider entry's API key.
fn override_provider_key(entry: &mut Option<ProviderEntry>, key: Option<String>) {
    let Some(key) = key else { return };
    match entry {
        Some(existing) => existing.api_key = key,
        None => *entry = Some(ProviderEntry::from_api_key(key)),
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
