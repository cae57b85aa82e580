//! `crealink config`: read-only views of the configuration.

use secrecy::ExposeSecret;
use serde::Serialize;
use tabled::Tabled;

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts, OutputFormat};
use crate::config::{self, Config};
use crate::error::CliError;
use crate::output::{self, FieldRow};

/// What `config show` prints. The password itself never appears.
#[derive(Debug, Serialize)]
struct ResolvedView {
    profile: String,
    host: String,
    port: u16,
    url: String,
    password: &'static str,
    stale_threshold_secs: u64,
    update_interval_secs: u64,
    timeout_secs: u64,
}

#[derive(Tabled, Serialize)]
struct ProfileRow {
    #[tabled(rename = "Profile")]
    name: String,
    #[tabled(rename = "Host")]
    host: String,
    #[tabled(rename = "Port")]
    port: u16,
    #[tabled(rename = "Default")]
    default: String,
}

pub fn handle(args: &ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        ConfigCommand::Path => {
            output::print_output(&config::config_path().display().to_string(), global.quiet);
            Ok(())
        }
        ConfigCommand::Profiles => {
            let cfg = config::load_config()?;
            let out = render_profiles(&cfg, global.output)?;
            output::print_output(&out, global.quiet);
            Ok(())
        }
        ConfigCommand::Show => {
            let cfg = config::load_config()?;
            let view = resolve_view(&cfg, global)?;
            let out = match global.output {
                // TOML reads most naturally for a config file
                OutputFormat::Table => {
                    toml::to_string_pretty(&view).map_err(|e| CliError::Render(e.to_string()))?
                }
                other => output::render_single(other, &view, view_rows)?,
            };
            output::print_output(out.trim_end(), global.quiet);
            Ok(())
        }
    }
}

fn resolve_view(cfg: &Config, global: &GlobalOpts) -> Result<ResolvedView, CliError> {
    let session = config::resolve_session_config(global, cfg)?;
    let profile = config::active_profile(global, cfg)?
        .map_or_else(|| "(flags)".to_owned(), |(name, _)| name);

    Ok(ResolvedView {
        profile,
        url: session.endpoint.url()?.to_string(),
        host: session.endpoint.host,
        port: session.endpoint.port,
        password: if session.endpoint.password.expose_secret().is_empty() {
            "(empty)"
        } else {
            "(set)"
        },
        stale_threshold_secs: session.stale_threshold.as_secs(),
        update_interval_secs: session.update_interval.as_secs(),
        timeout_secs: session.fallback_timeout.as_secs(),
    })
}

fn view_rows(view: &ResolvedView) -> Vec<FieldRow> {
    vec![
        FieldRow::new("profile", view.profile.as_str()),
        FieldRow::new("host", view.host.as_str()),
        FieldRow::new("port", view.port.to_string()),
        FieldRow::new("url", view.url.as_str()),
        FieldRow::new("password", view.password),
        FieldRow::new("stale_threshold_secs", view.stale_threshold_secs.to_string()),
        FieldRow::new("update_interval_secs", view.update_interval_secs.to_string()),
        FieldRow::new("timeout_secs", view.timeout_secs.to_string()),
    ]
}

fn render_profiles(cfg: &Config, format: OutputFormat) -> Result<String, CliError> {
    let default = cfg.default_profile.as_deref().unwrap_or("default");
    let mut rows: Vec<ProfileRow> = cfg
        .profiles
        .iter()
        .map(|(name, p)| ProfileRow {
            name: name.clone(),
            host: p.host.clone(),
            port: p.port,
            default: if name == default { "*".into() } else { String::new() },
        })
        .collect();
    rows.sort_by(|a, b| a.name.cmp(&b.name));

    match format {
        OutputFormat::Table => Ok(output::render_table(&rows)),
        OutputFormat::Plain => Ok(rows
            .iter()
            .map(|r| r.name.as_str())
            .collect::<Vec<_>>()
            .join("\n")),
        other => output::render_message(other, &rows, String::new()),
    }
}
