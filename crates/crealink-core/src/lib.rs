//! Session layer between `crealink-api` and its consumers (the CLI).
//!
//! - **[`PrinterSession`]** — Facade for one printer. `start()` spawns the
//!   persistent channel and a periodic update driver; [`refresh()`](PrinterSession::refresh)
//!   returns the live snapshot or falls back to a one-shot poll.
//!
//! - **[`PersistentChannel`]** — Owns the websocket: connect, stream,
//!   heartbeat, staleness detection, exponential backoff with jitter.
//!
//! - **[`SnapshotStore`]** — Lock-free merged view of everything the
//!   printer has reported, with `watch`-based subscriptions and
//!   [`SnapshotObserver`] callbacks.
//!
//! - **[`CommandDispatcher`]** — Fire-and-forget instructions and realtime
//!   control messages, rejected outright while disconnected.

pub mod backoff;
pub mod channel;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod fallback;
pub mod model;
pub mod session;
pub mod snapshot;
pub mod state;

#[cfg(test)]
mod test_support;

// ── Primary re-exports ──────────────────────────────────────────────
pub use backoff::{ReconnectConfig, ReconnectPolicy};
pub use channel::PersistentChannel;
pub use config::{Endpoint, SessionConfig};
pub use dispatcher::CommandDispatcher;
pub use error::CoreError;
pub use fallback::FallbackPoller;
pub use model::{Axis, PrinterStatus, Temperature, TemperatureZone, home_instruction, infer_model};
pub use session::PrinterSession;
pub use snapshot::{
    FieldValue, ObserverId, Snapshot, SnapshotObserver, SnapshotStore, SnapshotStream,
};
pub use state::{ConnectionState, StateMachine};

pub use crealink_api::{ControlMessage, TransportConfig, generate_token};
