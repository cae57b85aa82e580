//! Command handlers, one module per command group.

pub mod config_cmd;
pub mod control;
pub mod status;
pub mod token;
pub mod watch;

use crealink_core::SessionConfig;

use crate::cli::{Command, GlobalOpts};
use crate::commands::control::Action;
use crate::error::CliError;

/// Route a printer-facing command to its handler.
pub async fn dispatch(
    cmd: Command,
    session: SessionConfig,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Status(args) => status::handle(&args, session, global).await,
        Command::Watch(args) => watch::handle(&args, session, global).await,
        Command::Send(args) => {
            control::handle(Action::Instruction(args.instruction), session, global).await
        }
        Command::Pause => control::handle(Action::Pause, session, global).await,
        Command::StopPrint => control::handle(Action::StopPrint, session, global).await,
        Command::Home(args) => control::handle(Action::home(args.axis), session, global).await,
        Command::Estop => control::handle(Action::EmergencyStop, session, global).await,
        Command::Temp(args) => {
            control::handle(Action::temperature(args.zone, args.celsius)?, session, global).await
        }
        Command::Light(args) => {
            control::handle(Action::Light(args.state.is_on()), session, global).await
        }
        Command::Fan(args) => {
            control::handle(Action::Fan(args.state.is_on()), session, global).await
        }
        // Token, Config and Completions are handled before dispatch
        Command::Token(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
