//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use crealink_config::ConfigError;
use crealink_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
    pub const REJECTED: i32 = 9;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not reach printer at {target}")]
    #[diagnostic(
        code(crealink::connection_failed),
        help(
            "Check that the printer is powered on and on the same network.\n\
             K1-series printers listen on port 9999, Halot resin printers on 18188.\n\
             Cause: {reason}"
        )
    )]
    ConnectionFailed { target: String, reason: String },

    #[error("No status from printer: {reason}")]
    #[diagnostic(
        code(crealink::update_failed),
        help("The printer accepted no request or sent nothing usable. Try again, or run with -v.")
    )]
    UpdateFailed { reason: String },

    #[error("Timed out after {seconds}s waiting for the printer")]
    #[diagnostic(
        code(crealink::timeout),
        help("Increase the wait with --timeout, or check the printer's network link.")
    )]
    Timeout { seconds: u64 },

    // ── Commands ─────────────────────────────────────────────────────
    #[error("Printer did not accept '{action}'")]
    #[diagnostic(
        code(crealink::rejected),
        help("The connection dropped before the command could be written. Commands are never retried automatically.")
    )]
    Rejected { action: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(crealink::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(crealink::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No printer configured")]
    #[diagnostic(
        code(crealink::no_config),
        help(
            "Pass --host <ADDRESS>, set CREALINK_HOST, or add a profile to\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(crealink::config))]
    Config(ConfigError),

    // ── IO / Serialization ────────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Could not render output: {0}")]
    #[diagnostic(code(crealink::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } | Self::UpdateFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::Rejected { .. } => exit_code::REJECTED,
            Self::Validation { .. } | Self::ProfileNotFound { .. } | Self::NoConfig { .. } => {
                exit_code::USAGE
            }
            Self::Config(_) | Self::Io(_) | Self::Render(_) => exit_code::GENERAL,
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            other @ ConfigError::Figment(_) => CliError::Config(other),
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ConnectionFailed { url, reason } => CliError::ConnectionFailed {
                target: url,
                reason,
            },

            CoreError::Disconnected => CliError::ConnectionFailed {
                target: "(disconnected)".into(),
                reason: "printer connection was lost".into(),
            },

            CoreError::Timeout { timeout_secs } => CliError::Timeout {
                seconds: timeout_secs,
            },

            CoreError::UpdateFailed { reason } => CliError::UpdateFailed { reason },

            CoreError::Protocol { message } => CliError::UpdateFailed { reason: message },

            CoreError::ValidationFailed { message } => CliError::Validation {
                field: "input".into(),
                reason: message,
            },

            CoreError::Config { message } => CliError::Validation {
                field: "printer address".into(),
                reason: message,
            },

            CoreError::Internal(message) => CliError::Render(message),
        }
    }
}
