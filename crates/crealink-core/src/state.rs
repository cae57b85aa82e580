// ── Connection state machine ──
//
// The finite set of connection states and the legal moves between them.
// Pure state: no I/O. The persistent channel is the only caller of
// `transition`; everyone else observes through a `watch::Receiver`.

use serde::Serialize;
use strum::Display;
use tokio::sync::watch;

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, Serialize)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    /// Socket is open but no data has arrived within the staleness window.
    Stale,
    Reconnecting,
}

impl ConnectionState {
    /// Whether `self -> next` is a legal move.
    pub fn can_transition_to(self, next: Self) -> bool {
        use ConnectionState::{Connected, Connecting, Disconnected, Reconnecting, Stale};

        matches!(
            (self, next),
            (Disconnected | Reconnecting, Connecting)
                | (Connecting | Stale, Connected)
                | (Connecting | Connected | Stale | Reconnecting, Disconnected)
                | (Connected, Stale)
                | (Disconnected, Reconnecting)
        )
    }
}

/// Owner of the single `ConnectionState` for a session.
#[derive(Debug)]
pub struct StateMachine {
    tx: watch::Sender<ConnectionState>,
}

impl Default for StateMachine {
    fn default() -> Self {
        Self::new()
    }
}

impl StateMachine {
    /// Start in `Disconnected`.
    pub fn new() -> Self {
        let (tx, _) = watch::channel(ConnectionState::Disconnected);
        Self { tx }
    }

    pub fn current(&self) -> ConnectionState {
        *self.tx.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<ConnectionState> {
        self.tx.subscribe()
    }

    /// Move to `next`. Returns `true` if the state actually changed.
    ///
    /// Same-state requests are silent no-ops; illegal ones are refused and
    /// logged. Check-and-set is atomic with respect to other callers.
    pub fn transition(&self, next: ConnectionState) -> bool {
        self.tx.send_if_modified(|state| {
            let from = *state;
            if from == next {
                return false;
            }
            if !from.can_transition_to(next) {
                tracing::warn!(%from, to = %next, "refusing illegal connection state transition");
                return false;
            }
            tracing::info!(%from, to = %next, "connection state changed");
            *state = next;
            true
        })
    }

    /// Move to `next` only if currently in `from`.
    pub fn transition_from(&self, from: ConnectionState, next: ConnectionState) -> bool {
        self.transition_from_when(from, next, || true)
    }

    /// Like [`transition_from`](Self::transition_from), but `guard` is
    /// evaluated while the state is held, so a concurrent transition can
    /// not slip in between the check and the move.
    pub fn transition_from_when(
        &self,
        from: ConnectionState,
        next: ConnectionState,
        guard: impl FnOnce() -> bool,
    ) -> bool {
        self.tx.send_if_modified(|state| {
            if *state != from || !from.can_transition_to(next) || !guard() {
                return false;
            }
            tracing::info!(%from, to = %next, "connection state changed");
            *state = next;
            true
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use super::ConnectionState::{Connected, Connecting, Disconnected, Reconnecting, Stale};

    #[test]
    fn starts_disconnected() {
        assert_eq!(StateMachine::new().current(), Disconnected);
    }

    #[test]
    fn happy_path_connect() {
        let sm = StateMachine::new();
        assert!(sm.transition(Connecting));
        assert!(sm.transition(Connected));
        assert_eq!(sm.current(), Connected);
    }

    #[test]
    fn same_state_is_a_noop_without_notification() {
        let sm = StateMachine::new();
        let mut rx = sm.subscribe();
        sm.transition(Connecting);
        assert!(rx.has_changed().unwrap_or(false));
        rx.mark_unchanged();

        assert!(!sm.transition(Connecting));
        assert!(!rx.has_changed().unwrap_or(true));
    }

    #[test]
    fn illegal_transitions_are_refused() {
        let sm = StateMachine::new();
        assert!(!sm.transition(Connected));
        assert!(!sm.transition(Stale));
        assert_eq!(sm.current(), Disconnected);

        sm.transition(Connecting);
        assert!(!sm.transition(Reconnecting));
        assert!(!sm.transition(Stale));
        assert_eq!(sm.current(), Connecting);
    }

    #[test]
    fn backoff_cycle_is_legal() {
        let sm = StateMachine::new();
        for next in [
            Connecting,
            Disconnected,
            Reconnecting,
            Connecting,
            Connected,
            Stale,
            Connected,
            Disconnected,
            Reconnecting,
            Disconnected,
        ] {
            assert!(sm.transition(next), "expected legal move to {next}");
        }
    }

    #[test]
    fn transition_from_checks_current_state() {
        let sm = StateMachine::new();
        assert!(!sm.transition_from(Connected, Stale));
        sm.transition(Connecting);
        sm.transition(Connected);
        assert!(sm.transition_from(Connected, Stale));
        assert_eq!(sm.current(), Stale);
    }

    #[test]
    fn guarded_transition_rechecks_under_lock() {
        let sm = StateMachine::new();
        sm.transition(Connecting);
        sm.transition(Connected);
        assert!(!sm.transition_from_when(Connected, Stale, || false));
        assert_eq!(sm.current(), Connected);
        assert!(!sm.transition_from_when(Stale, Connected, || true));
        assert!(sm.transition_from_when(Connected, Stale, || true));
        assert_eq!(sm.current(), Stale);
    }

    #[test]
    fn display_is_lowercase() {
        assert_eq!(Reconnecting.to_string(), "reconnecting");
        assert_eq!(Stale.to_string(), "stale");
    }
}
