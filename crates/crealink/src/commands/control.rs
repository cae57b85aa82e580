//! Print controls: `send`, `pause`, `stop-print`, `home`, `estop`, `temp`,
//! `light`, `fan`.
//!
//! Each one opens a session, waits for the channel to come up, writes a
//! single frame and shuts down again. A frame the channel refuses to
//! write is reported as rejected (exit code 9).

use std::time::Duration;

use serde_json::json;

use crealink_core::{Axis, ConnectionState, PrinterSession, SessionConfig, TemperatureZone};

use crate::cli::{GlobalOpts, HomeAxis, Zone};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Instruction(String),
    Pause,
    StopPrint,
    Home(Option<Axis>),
    EmergencyStop,
    Temperature(TemperatureZone, u16),
    Light(bool),
    Fan(bool),
}

impl Action {
    /// Temperature action, range-checked before anything connects.
    pub fn temperature(zone: Zone, celsius: u16) -> Result<Self, CliError> {
        let zone = match zone {
            Zone::Nozzle => TemperatureZone::Nozzle,
            Zone::Bed => TemperatureZone::Bed,
        };
        let limits = zone.limits();
        if !limits.contains(&celsius) {
            return Err(CliError::Validation {
                field: format!("{zone} temperature"),
                reason: format!(
                    "{celsius} °C is outside {}-{} °C",
                    limits.start(),
                    limits.end()
                ),
            });
        }
        Ok(Self::Temperature(zone, celsius))
    }

    pub fn home(axis: Option<HomeAxis>) -> Self {
        Self::Home(axis.map(|a| match a {
            HomeAxis::X => Axis::X,
            HomeAxis::Y => Axis::Y,
            HomeAxis::Z => Axis::Z,
        }))
    }

    fn describe(&self) -> String {
        match self {
            Self::Instruction(name) => name.clone(),
            Self::Pause => "pause".into(),
            Self::StopPrint => "stop print".into(),
            Self::Home(None) => "home all axes".into(),
            Self::Home(Some(axis)) => format!("home {axis} axis"),
            Self::EmergencyStop => "emergency stop".into(),
            Self::Temperature(zone, celsius) => format!("{zone} target {celsius} °C"),
            Self::Light(on) => format!("light {}", on_off(*on)),
            Self::Fan(on) => format!("fan {}", on_off(*on)),
        }
    }

    async fn send(&self, session: &PrinterSession) -> bool {
        match self {
            Self::Instruction(name) => session.send_instruction(name).await,
            Self::Pause => session.pause_print().await,
            Self::StopPrint => session.stop_print().await,
            Self::Home(axis) => session.home(*axis).await,
            Self::EmergencyStop => session.emergency_stop().await,
            Self::Temperature(zone, celsius) => session.send_temperature(*zone, *celsius).await,
            Self::Light(on) => session.set_light(*on).await,
            Self::Fan(on) => session.set_fan(*on).await,
        }
    }
}

fn on_off(on: bool) -> &'static str {
    if on { "on" } else { "off" }
}

pub async fn handle(
    action: Action,
    config: SessionConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    let session = PrinterSession::new(config)?;
    session.start().await;

    let result = async {
        wait_connected(&session, Duration::from_secs(global.timeout)).await?;
        if action.send(&session).await {
            Ok(())
        } else {
            Err(CliError::Rejected {
                action: action.describe(),
            })
        }
    }
    .await;

    session.stop().await;
    result?;

    let description = action.describe();
    let out = output::render_message(
        global.output,
        &json!({ "action": description, "sent": true }),
        format!("Sent: {description}"),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

async fn wait_connected(session: &PrinterSession, timeout: Duration) -> Result<(), CliError> {
    let mut states = session.subscribe_state();
    match tokio::time::timeout(timeout, states.wait_for(|s| *s == ConnectionState::Connected)).await {
        Ok(Ok(_)) => Ok(()),
        Ok(Err(_)) => Err(CliError::ConnectionFailed {
            target: session.config().endpoint.host.clone(),
            reason: "session closed while connecting".into(),
        }),
        Err(_) => Err(CliError::Timeout {
            seconds: timeout.as_secs(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn temperature_is_range_checked_per_zone() {
        assert_eq!(
            Action::temperature(Zone::Bed, 150).ok(),
            Some(Action::Temperature(TemperatureZone::Bed, 150))
        );
        assert!(matches!(
            Action::temperature(Zone::Bed, 151),
            Err(CliError::Validation { .. })
        ));
        assert!(Action::temperature(Zone::Nozzle, 300).is_ok());
        assert!(Action::temperature(Zone::Nozzle, 301).is_err());
    }

    #[test]
    fn descriptions() {
        assert_eq!(Action::Light(true).describe(), "light on");
        assert_eq!(
            Action::Temperature(TemperatureZone::Nozzle, 210).describe(),
            "nozzle target 210 °C"
        );
        assert_eq!(Action::Instruction("PRINT_PAUSE".into()).describe(), "PRINT_PAUSE");
        assert_eq!(Action::home(Some(HomeAxis::Z)).describe(), "home z axis");
        assert_eq!(Action::home(None), Action::Home(None));
        assert_eq!(Action::EmergencyStop.describe(), "emergency stop");
    }
}
