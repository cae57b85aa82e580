//! CLI configuration: a thin wrapper around `crealink_config`.
//!
//! Adds `GlobalOpts`-aware resolution: `--host`, `--port`, `--password`
//! and `--timeout` override whatever the profile says.

use std::time::Duration;

use secrecy::SecretString;

use crealink_core::SessionConfig;

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub use crealink_config::{Config, Profile, config_path, load_config};

/// The profile selected by `--profile` or the config's default, if any.
pub fn active_profile<'a>(
    global: &GlobalOpts,
    config: &'a Config,
) -> Result<Option<(String, &'a Profile)>, CliError> {
    config
        .profile(global.profile.as_deref())
        .map_err(|e| match e {
            crealink_config::ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: available_profiles(config),
            },
            other => other.into(),
        })
}

pub fn available_profiles(config: &Config) -> String {
    let mut names: Vec<&str> = config.profiles.keys().map(String::as_str).collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort_unstable();
    names.join(", ")
}

/// Password: `--password`, then the shared resolution chain.
pub fn resolve_password(global: &GlobalOpts, profile: Option<&Profile>) -> SecretString {
    match global.password {
        Some(ref pw) => SecretString::from(pw.clone()),
        None => crealink_config::resolve_password(profile),
    }
}

/// Merge the profile (if any) with flag overrides into a session config.
pub fn resolve_session_config(global: &GlobalOpts, config: &Config) -> Result<SessionConfig, CliError> {
    let selected = active_profile(global, config)?;
    let base = selected.as_ref().map(|(_, p)| *p);

    if base.is_none() && global.host.is_none() {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    }

    let mut profile = base.cloned().unwrap_or_default();
    if let Some(ref host) = global.host {
        profile.host.clone_from(host);
    }
    if base.is_none() {
        profile.port = crealink_config::DEFAULT_PORT;
    }
    if let Some(port) = global.port {
        profile.port = port;
    }

    let password = resolve_password(global, base);
    let mut session = crealink_config::profile_to_session_config(&profile, password)?;
    apply_timeout(&mut session, global.timeout)?;

    tracing::debug!(
        profile = selected.as_ref().map_or("(flags)", |(name, _)| name.as_str()),
        host = %session.endpoint.host,
        port = session.endpoint.port,
        "resolved printer"
    );
    Ok(session)
}

/// `--timeout` bounds both the websocket handshake and a one-shot poll.
fn apply_timeout(session: &mut SessionConfig, secs: u64) -> Result<(), CliError> {
    if secs == 0 {
        return Err(CliError::Validation {
            field: "timeout".into(),
            reason: "must be greater than zero".into(),
        });
    }
    let timeout = Duration::from_secs(secs);
    session.transport.handshake_timeout = timeout;
    session.transport.connect_timeout = session.transport.connect_timeout.min(timeout);
    session.fallback_timeout = timeout;
    Ok(())
}
