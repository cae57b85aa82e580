// ── Command dispatcher ──
//
// The externally facing "send this, authenticated, if the channel is up"
// operation. Fire-and-forget: no acknowledgement correlation, no retry,
// no queue. Anything issued while the channel is down is rejected.

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use crealink_api::protocol::{EMERGENCY_STOP, PRINT_PAUSE, PRINT_STOP};
use crealink_api::{Connector, ControlMessage, WsConnector};

use crate::channel::PersistentChannel;
use crate::model::{Axis, TemperatureZone, home_instruction};

pub struct CommandDispatcher<C: Connector = WsConnector> {
    channel: ArcSwapOption<PersistentChannel<C>>,
}

impl<C: Connector> Default for CommandDispatcher<C> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C: Connector> CommandDispatcher<C> {
    /// A dispatcher with no channel; every send returns `false`.
    pub fn new() -> Self {
        Self {
            channel: ArcSwapOption::empty(),
        }
    }

    pub fn attach(&self, channel: Arc<PersistentChannel<C>>) {
        self.channel.store(Some(channel));
    }

    pub fn detach(&self) {
        self.channel.store(None);
    }

    pub fn has_channel(&self) -> bool {
        self.channel.load().is_some()
    }

    /// Named instruction with a fresh token.
    pub async fn send_instruction(&self, name: &str) -> bool {
        let Some(channel) = self.channel.load_full() else {
            tracing::debug!(instruction = name, "no channel, dropping instruction");
            return false;
        };
        channel.send_command(name).await
    }

    /// Realtime control message, sent as-is.
    pub async fn send_structured(&self, message: ControlMessage) -> bool {
        let Some(channel) = self.channel.load_full() else {
            tracing::debug!(method = %message.method, "no channel, dropping control message");
            return false;
        };
        channel.send_raw(message).await
    }

    /// Set a heater target. Values outside the zone's range are rejected
    /// without touching the socket.
    pub async fn send_temperature(&self, zone: TemperatureZone, celsius: u16) -> bool {
        let limits = zone.limits();
        if !limits.contains(&celsius) {
            tracing::warn!(
                %zone,
                celsius,
                min = limits.start(),
                max = limits.end(),
                "temperature target out of range"
            );
            return false;
        }
        self.send_structured(zone.control_message(celsius)).await
    }

    pub async fn set_light(&self, on: bool) -> bool {
        self.send_structured(ControlMessage::light(on)).await
    }

    pub async fn set_fan(&self, on: bool) -> bool {
        self.send_structured(ControlMessage::fan(on)).await
    }

    /// Toggle pause/resume of the running job.
    pub async fn pause_print(&self) -> bool {
        self.send_instruction(PRINT_PAUSE).await
    }

    pub async fn stop_print(&self) -> bool {
        self.send_instruction(PRINT_STOP).await
    }

    /// Home one axis, or all of them with `None`. K1-series only.
    pub async fn home(&self, axis: Option<Axis>) -> bool {
        self.send_instruction(&home_instruction(axis)).await
    }

    /// `M112`. The printer halts immediately and must be restarted.
    pub async fn emergency_stop(&self) -> bool {
        tracing::warn!("sending emergency stop");
        self.send_instruction(EMERGENCY_STOP).await
    }
}
