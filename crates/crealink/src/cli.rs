//! Clap derive structures for the `crealink` CLI.
//!
//! Defines the command tree, global flags, and shared value enums. Kept
//! free of workspace crates so `build.rs` can include it for man pages.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// crealink -- talk to Creality printers over their local websocket
#[derive(Debug, Parser)]
#[command(
    name = "crealink",
    version,
    about = "Monitor and control Creality printers on your network",
    long_about = "Connects to the status websocket that Creality K1 and Halot printers\n\
        expose on the local network, streams telemetry, and sends print\n\
        controls (pause, stop, temperatures, light, fan).",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Printer profile to use
    #[arg(long, short = 'p', env = "CREALINK_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Printer hostname or IP (overrides profile)
    #[arg(long, short = 'H', env = "CREALINK_HOST", global = true)]
    pub host: Option<String>,

    /// Websocket port (overrides profile; K1 uses 9999, Halot 18188)
    #[arg(long, env = "CREALINK_PORT", global = true)]
    pub port: Option<u16>,

    /// Printer password (overrides profile and CREALINK_PASSWORD)
    #[arg(long, global = true)]
    pub password: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CREALINK_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Seconds to wait for the printer to answer
    #[arg(long, env = "CREALINK_TIMEOUT", default_value = "10", global = true)]
    pub timeout: u64,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain `key=value` lines (scripting)
    Plain,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Fetch one status frame and print a summary
    #[command(alias = "st")]
    Status(StatusArgs),

    /// Stay connected and print state changes and field updates
    #[command(alias = "w")]
    Watch(WatchArgs),

    /// Send a raw instruction (e.g. GET_PRINT_STATUS)
    Send(SendArgs),

    /// Pause or resume the current print
    Pause,

    /// Stop the current print
    StopPrint,

    /// Home all axes, or a single one (K1 series)
    Home(HomeArgs),

    /// Emergency stop (M112); the printer must be restarted afterwards
    Estop,

    /// Set a heater target temperature
    Temp(TempArgs),

    /// Switch the chamber light
    Light(SwitchArgs),

    /// Switch the part-cooling fan
    Fan(SwitchArgs),

    /// Print the auth token for a password
    Token(TokenArgs),

    /// Inspect CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  MONITORING
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct StatusArgs {
    /// Also list every raw field the printer reported
    #[arg(long, short = 'a')]
    pub all: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Only print connection state changes
    #[arg(long)]
    pub states_only: bool,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONTROL
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Instruction name
    pub instruction: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Zone {
    /// Hotend, 0-300 °C
    Nozzle,
    /// Heated bed, 0-150 °C
    Bed,
}

#[derive(Debug, Args)]
pub struct TempArgs {
    /// Which heater
    pub zone: Zone,

    /// Target in °C (0 turns the heater off)
    pub celsius: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum HomeAxis {
    X,
    Y,
    Z,
}

#[derive(Debug, Args)]
pub struct HomeArgs {
    /// Single axis to home (default: all)
    pub axis: Option<HomeAxis>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Switch {
    On,
    Off,
}

impl Switch {
    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

#[derive(Debug, Args)]
pub struct SwitchArgs {
    pub state: Switch,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  UTILITIES
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct TokenArgs {
    /// Password to encode (default: the profile's resolved password)
    pub password: Option<String>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the resolved profile (password redacted)
    Show,

    /// Print the config file location
    Path,

    /// List configured profiles
    Profiles,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
