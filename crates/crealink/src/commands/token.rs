//! `crealink token`: print the per-message auth token for a password.

use secrecy::{ExposeSecret, SecretString};
use serde_json::json;

use crealink_core::generate_token;

use crate::cli::{GlobalOpts, TokenArgs};
use crate::config;
use crate::error::CliError;
use crate::output;

pub fn handle(args: &TokenArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let password = match args.password {
        Some(ref pw) => SecretString::from(pw.clone()),
        None => {
            let cfg = config::load_config()?;
            let profile = config::active_profile(global, &cfg)?;
            config::resolve_password(global, profile.as_ref().map(|(_, p)| *p))
        }
    };

    let token = generate_token(password.expose_secret());
    let out = output::render_message(global.output, &json!({ "token": token }), token.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
