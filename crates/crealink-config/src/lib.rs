//! Shared configuration for crealink.
//!
//! TOML profiles, password resolution (env + plaintext), and translation
//! to `crealink_core::SessionConfig`. The CLI layers its global flags on
//! top of what this crate resolves.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crealink_core::{Endpoint, SessionConfig};
use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Port of the K1-family status socket.
pub const DEFAULT_PORT: u16 = 9999;

/// Environment variable consulted when a profile names no `password_env`
/// (or that variable is unset).
pub const PASSWORD_ENV: &str = "CREALINK_PASSWORD";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("profile '{name}' not found in config")]
    ProfileNotFound { name: String },

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named printer profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Seconds to wait for a connection.
    #[serde(default = "default_timeout")]
    pub timeout: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}

/// A named printer.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// Hostname or IP address of the printer.
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Plaintext password (prefer `password_env`). Often empty.
    pub password: Option<String>,

    /// Environment variable holding the password.
    pub password_env: Option<String>,

    /// Seconds without data before the connection counts as stale.
    pub stale_threshold_secs: Option<u64>,

    /// Seconds between background refresh cycles.
    pub update_interval_secs: Option<u64>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl Config {
    /// Pick the profile named `name`, or the default profile when `name`
    /// is `None`. A missing default is not an error (the caller may supply
    /// `--host`); a missing explicit profile is.
    pub fn profile(&self, name: Option<&str>) -> Result<Option<(String, &Profile)>, ConfigError> {
        if let Some(name) = name {
            return self
                .profiles
                .get(name)
                .map(|p| Some((name.to_owned(), p)))
                .ok_or_else(|| ConfigError::ProfileNotFound { name: name.into() });
        }

        let default = self.default_profile.as_deref().unwrap_or("default");
        Ok(self
            .profiles
            .get(default)
            .map(|p| (default.to_owned(), p)))
    }
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "crealink", "crealink").map_or_else(
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
    p.push("crealink");
    p
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load from an explicit file. A missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("CREALINK_").split("__"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if it can't be read.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve the printer password: the profile's `password_env` variable,
/// then `CREALINK_PASSWORD`, then the plaintext value, then empty.
pub fn resolve_password(profile: Option<&Profile>) -> SecretString {
    resolve_password_with(profile, |name| std::env::var(name).ok())
}

/// [`resolve_password`] with an injectable environment lookup.
pub fn resolve_password_with(
    profile: Option<&Profile>,
    lookup: impl Fn(&str) -> Option<String>,
) -> SecretString {
    // 1. Profile's password_env
    if let Some(env_name) = profile.and_then(|p| p.password_env.as_deref()) {
        if let Some(val) = lookup(env_name) {
            return SecretString::from(val);
        }
    }

    // 2. Global env var
    if let Some(val) = lookup(PASSWORD_ENV) {
        return SecretString::from(val);
    }

    // 3. Plaintext in config, else the empty password
    let plain = profile
        .and_then(|p| p.password.clone())
        .unwrap_or_default();
    SecretString::from(plain)
}

// ── SessionConfig translation ───────────────────────────────────────

/// Build a `SessionConfig` from a profile and an already resolved
/// password. Timing fields left unset keep the session defaults.
pub fn profile_to_session_config(
    profile: &Profile,
    password: SecretString,
) -> Result<SessionConfig, ConfigError> {
    let host = profile.host.trim();
    if host.is_empty() {
        return Err(ConfigError::Validation {
            field: "host".into(),
            reason: "must not be empty".into(),
        });
    }
    if profile.port == 0 {
        return Err(ConfigError::Validation {
            field: "port".into(),
            reason: "must be between 1 and 65535".into(),
        });
    }

    let mut config = SessionConfig::new(Endpoint::new(host, profile.port, password));
    config
        .endpoint
        .url()
        .map_err(|e| ConfigError::Validation {
            field: "host".into(),
            reason: e.to_string(),
        })?;

    if let Some(secs) = profile.stale_threshold_secs {
        config.stale_threshold = positive_secs("stale_threshold_secs", secs)?;
    }
    if let Some(secs) = profile.update_interval_secs {
        config.update_interval = positive_secs("update_interval_secs", secs)?;
    }
    Ok(config)
}

fn positive_secs(field: &str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Validation {
            field: field.into(),
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_secs(secs))
}
