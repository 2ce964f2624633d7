//! Shared configuration for Courtly tools.
//!
//! TOML profiles, token resolution (env + keyring + plaintext), and
//! translation to `courtly_core::ServiceConfig`. The CLI depends on
//! this crate and layers its flag overrides on top.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use courtly_core::{OperatingWindow, Role, ServiceConfig, Session, TlsVerification};

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no profile named '{profile}' (available: {available})")]
    UnknownProfile { profile: String, available: String },

    #[error("no token configured for profile '{profile}'")]
    NoToken { profile: String },

    #[error("keyring access failed: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    /// Global defaults.
    #[serde(default)]
    pub defaults: Defaults,

    /// Named service profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    /// Profile used when `--profile` is not given.
    #[serde(default = "default_profile_name")]
    pub profile: String,

    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            output: default_output(),
            color: default_color(),
        }
    }
}

fn default_profile_name() -> String {
    "default".into()
}
fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}

/// A named service profile.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Profile {
    /// Service base URL (e.g., "https://courts.example.club").
    pub server_url: String,

    /// Identity reservations are created and cancelled as.
    pub user_ref: Option<String>,

    /// Access level the service granted this identity.
    #[serde(default = "default_role")]
    pub role: Role,

    /// First bookable hour, 0-23.
    pub open_hour: Option<u32>,

    /// Closing hour, 1-24; 24 means midnight.
    pub close_hour: Option<u32>,

    /// Verify the service's TLS certificate.
    pub verify_tls: Option<bool>,

    /// Override timeout, in seconds.
    pub timeout_secs: Option<u64>,

    /// Bearer token (plaintext -- prefer keyring or env var).
    pub token: Option<String>,
}

fn default_role() -> Role {
    Role::Client
}

impl Profile {
    /// A blank profile pointing at the given URL.
    pub fn for_server(server_url: impl Into<String>) -> Self {
        Self {
            server_url: server_url.into(),
            user_ref: None,
            role: default_role(),
            open_hour: None,
            close_hour: None,
            verify_tls: None,
            timeout_secs: None,
            token: None,
        }
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path.
///
/// `COURTLY_CONFIG` overrides; otherwise XDG / platform conventions.
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var("COURTLY_CONFIG") {
        if !path.is_empty() {
            return PathBuf::from(path);
        }
    }
    ProjectDirs::from("com", "courtly", "courtly").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("courtly");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical path + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load the full Config from an explicit file + environment.
///
/// Environment keys use a double-underscore separator so snake_case
/// field names survive: `COURTLY_DEFAULTS__OUTPUT=json`.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("COURTLY_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

/// Serialize config to TOML and write to an explicit path.
pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Profile selection ───────────────────────────────────────────────

/// Pick a profile: an explicit request wins over `defaults.profile`.
pub fn select_profile<'a>(
    config: &'a Config,
    requested: Option<&str>,
) -> Result<(&'a str, &'a Profile), ConfigError> {
    let name = requested.unwrap_or(&config.defaults.profile);
    config
        .profiles
        .get_key_value(name)
        .map(|(key, profile)| (key.as_str(), profile))
        .ok_or_else(|| {
            let mut names: Vec<_> = config.profiles.keys().cloned().collect();
            names.sort_unstable();
            ConfigError::UnknownProfile {
                profile: name.into(),
                available: if names.is_empty() {
                    "(none)".into()
                } else {
                    names.join(", ")
                },
            }
        })
}

// ── Token resolution ────────────────────────────────────────────────

/// Resolve a bearer token from the credential chain (no CLI flag step).
pub fn resolve_token(profile: &Profile, profile_name: &str) -> Result<SecretString, ConfigError> {
    // 1. Environment
    if let Ok(token) = std::env::var("COURTLY_TOKEN") {
        if !token.is_empty() {
            return Ok(SecretString::from(token));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new("courtly", profile_name) {
        if let Ok(token) = entry.get_password() {
            return Ok(SecretString::from(token));
        }
    }

    // 3. Plaintext in the file
    if let Some(ref token) = profile.token {
        warn!(
            profile = profile_name,
            "token stored in plaintext; prefer `courtly config set-token`"
        );
        return Ok(SecretString::from(token.clone()));
    }

    Err(ConfigError::NoToken {
        profile: profile_name.into(),
    })
}

/// Store a bearer token in the system keyring for a profile.
pub fn store_token(profile_name: &str, token: &str) -> Result<(), ConfigError> {
    let entry = keyring::Entry::new("courtly", profile_name)?;
    entry.set_password(token)?;
    Ok(())
}

// ── Bridging to core ────────────────────────────────────────────────

/// Build a `ServiceConfig` from a profile, with no CLI flag overrides.
///
/// The token is resolved through the credential chain; a service that
/// allows anonymous reads works with none configured.
pub fn profile_to_service_config(
    profile: &Profile,
    profile_name: &str,
) -> Result<ServiceConfig, ConfigError> {
    let url: url::Url = profile
        .server_url
        .parse()
        .map_err(|_| ConfigError::Validation {
            field: "server_url".into(),
            reason: format!("invalid URL: {}", profile.server_url),
        })?;

    let fallback = OperatingWindow::default();
    let window = OperatingWindow::new(
        profile.open_hour.unwrap_or(fallback.open_hour),
        profile.close_hour.unwrap_or(fallback.close_hour),
    )
    .validate()
    .map_err(|e| ConfigError::Validation {
        field: "open_hour/close_hour".into(),
        reason: e.to_string(),
    })?;

    let tls = if profile.verify_tls.unwrap_or(true) {
        TlsVerification::SystemDefaults
    } else {
        TlsVerification::DangerAcceptInvalid
    };

    let token = resolve_token(profile, profile_name).ok();

    Ok(ServiceConfig {
        base_url: url.to_string(),
        token,
        tls,
        timeout: Duration::from_secs(profile.timeout_secs.unwrap_or(30)),
        window,
        feed_enabled: true,
    })
}

/// The booking identity a profile carries, when it names one.
pub fn profile_session(profile: &Profile) -> Option<Session> {
    profile
        .user_ref
        .as_deref()
        .map(|user_ref| Session::new(user_ref, profile.role))
}

// ── Tests ───────────────────────────────────────────────────────────
