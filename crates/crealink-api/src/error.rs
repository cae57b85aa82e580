use thiserror::Error;

/// Top-level error type for the `crealink-api` crate.
///
/// Covers every failure mode of the device link: connecting, the
/// websocket itself, and frames the device sends that we cannot decode.
/// `crealink-core` maps these into session-level diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Addressing ──────────────────────────────────────────────────
    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// The URL has no host or port we can dial.
    #[error("Invalid endpoint: {0}")]
    InvalidEndpoint(String),

    // ── Connection ──────────────────────────────────────────────────
    /// TCP connect or websocket upgrade failed.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// TCP connect did not complete within the connect bound.
    #[error("Connect timed out after {timeout_secs}s")]
    ConnectTimeout { timeout_secs: u64 },

    /// An operation did not complete within its overall bound.
    #[error("Timed out after {timeout_secs}s")]
    Timeout { timeout_secs: u64 },

    /// Socket error after the handshake (reset, broken pipe, ...).
    #[error("WebSocket error: {0}")]
    WebSocket(String),

    /// WebSocket closed by the peer.
    #[error("WebSocket closed (code {code}): {reason}")]
    WebSocketClosed { code: u16, reason: String },

    // ── Data ────────────────────────────────────────────────────────
    /// A frame body was not the JSON object the protocol requires.
    #[error("Malformed frame: {message}")]
    Deserialization { message: String, body: String },

    /// Outbound frame could not be encoded.
    #[error("Failed to encode frame: {0}")]
    Encode(#[from] serde_json::Error),
}

impl Error {
    /// Returns `true` if this is a transport error worth reconnecting over.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::WebSocketConnect(_)
                | Self::ConnectTimeout { .. }
                | Self::Timeout { .. }
                | Self::WebSocket(_)
                | Self::WebSocketClosed { .. }
        )
    }

    /// Returns `true` if the device sent something we could not decode.
    pub fn is_protocol(&self) -> bool {
        matches!(self, Self::Deserialization { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transport_errors_are_transient() {
        assert!(Error::WebSocketConnect("refused".into()).is_transient());
        assert!(Error::ConnectTimeout { timeout_secs: 10 }.is_transient());
        assert!(
            Error::WebSocketClosed {
                code: 1000,
                reason: String::new()
            }
            .is_transient()
        );
    }

    #[test]
    fn malformed_frame_is_protocol_not_transient() {
        let err = Error::Deserialization {
            message: "expected object".into(),
            body: "[]".into(),
        };
        assert!(err.is_protocol());
        assert!(!err.is_transient());
    }
}
