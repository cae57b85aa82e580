// ── Core error types ──
//
// Session-level errors. Consumers see what went wrong with the printer
// link, not which websocket call failed; the `From<crealink_api::Error>`
// impl does that translation.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Connection errors ────────────────────────────────────────────
    #[error("Cannot connect to printer at {url}: {reason}")]
    ConnectionFailed { url: String, reason: String },

    #[error("Printer connection timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    #[error("Printer disconnected")]
    Disconnected,

    // ── Data errors ──────────────────────────────────────────────────
    #[error("Printer sent an unreadable frame: {message}")]
    Protocol { message: String },

    /// No fresh data could be obtained this cycle. The last-known
    /// snapshot, if any, is still available.
    #[error("Update failed: {reason}")]
    UpdateFailed { reason: String },

    // ── Operation errors ─────────────────────────────────────────────
    #[error("Validation failed: {message}")]
    ValidationFailed { message: String },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether retrying later could plausibly succeed.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed { .. }
                | Self::Timeout { .. }
                | Self::Disconnected
                | Self::UpdateFailed { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<crealink_api::Error> for CoreError {
    fn from(err: crealink_api::Error) -> Self {
        match err {
            crealink_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            crealink_api::Error::InvalidEndpoint(message) => CoreError::Config { message },
            crealink_api::Error::WebSocketConnect(reason)
            | crealink_api::Error::WebSocket(reason) => CoreError::ConnectionFailed {
                url: String::new(),
                reason,
            },
            crealink_api::Error::ConnectTimeout { timeout_secs }
            | crealink_api::Error::Timeout { timeout_secs } => CoreError::Timeout { timeout_secs },
            crealink_api::Error::WebSocketClosed { code, reason } => CoreError::ConnectionFailed {
                url: String::new(),
                reason: format!("closed by printer (code {code}): {reason}"),
            },
            crealink_api::Error::Deserialization { message, body: _ } => {
                CoreError::Protocol { message }
            }
            crealink_api::Error::Encode(e) => CoreError::Internal(format!("encode error: {e}")),
        }
    }
}
