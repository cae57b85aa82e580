// ── Runtime session configuration ──
//
// These types describe *how* to talk to one printer. They carry the
// credential and connection tuning but never touch disk; the CLI builds a
// `SessionConfig` from its profile and hands it in.

use std::fmt;
use std::time::Duration;

use crealink_api::TransportConfig;
use secrecy::SecretString;
use url::Url;

use crate::backoff::ReconnectConfig;
use crate::error::CoreError;

/// Where the printer lives and how to authenticate. Immutable once a
/// session starts.
#[derive(Clone)]
pub struct Endpoint {
    pub host: String,
    pub port: u16,
    /// May be empty; the firmware accepts the token of an empty password.
    pub password: SecretString,
}

impl Endpoint {
    pub fn new(host: impl Into<String>, port: u16, password: SecretString) -> Self {
        Self {
            host: host.into(),
            port,
            password,
        }
    }

    /// `ws://host:port/`
    pub fn url(&self) -> Result<Url, CoreError> {
        Ok(crealink_api::device_url(&self.host, self.port)?)
    }
}

impl fmt::Debug for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Endpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

/// Everything a [`PrinterSession`](crate::PrinterSession) needs.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub endpoint: Endpoint,
    pub reconnect: ReconnectConfig,
    pub transport: TransportConfig,
    /// A `Connected` channel with no data for longer than this is stale.
    pub stale_threshold: Duration,
    /// Overall bound on a one-shot fallback poll.
    pub fallback_timeout: Duration,
    /// Period of the background update driver.
    pub update_interval: Duration,
}

impl SessionConfig {
    /// Defaults for everything except the endpoint.
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            reconnect: ReconnectConfig::default(),
            transport: TransportConfig::default(),
            stale_threshold: Duration::from_secs(90),
            fallback_timeout: Duration::from_secs(10),
            update_interval: Duration::from_secs(30),
        }
    }
}
