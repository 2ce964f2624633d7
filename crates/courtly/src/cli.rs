//! Clap derive structures for the `courtly` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// courtly -- book sports courts from the command line
#[derive(Debug, Parser)]
#[command(
    name = "courtly",
    version,
    about = "Browse court availability and manage reservations",
    long_about = "A CLI for Courtly reservation services.\n\n\
        Derives hourly availability boards from the facility's operating\n\
        hours and confirmed reservations, live-updating over the change feed.",
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
    /// Service profile to use
    #[arg(long, short = 'p', env = "COURTLY_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Service URL (overrides profile)
    #[arg(long, env = "COURTLY_SERVER", global = true)]
    pub server: Option<String>,

    /// Bearer token
    #[arg(long, env = "COURTLY_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "COURTLY_OUTPUT",
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

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', env = "COURTLY_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "COURTLY_TIMEOUT", default_value = "30", global = true)]
    pub timeout: u64,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one value per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
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
    /// Browse the court catalog
    #[command(alias = "court")]
    Courts(CourtsArgs),

    /// Derive and watch availability boards
    #[command(alias = "s")]
    Slots(SlotsArgs),

    /// List and cancel reservations
    #[command(alias = "res", alias = "r")]
    Reservations(ReservationsArgs),

    /// Book a slot
    Book(BookArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COURTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CourtsArgs {
    #[command(subcommand)]
    pub command: CourtsCommand,
}

#[derive(Debug, Subcommand)]
pub enum CourtsCommand {
    /// List courts
    #[command(alias = "ls")]
    List {
        /// Include inactive courts
        #[arg(long)]
        all: bool,
    },

    /// Get court details
    Get {
        /// Court ID or name
        court: String,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  SLOTS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct SlotsArgs {
    #[command(subcommand)]
    pub command: SlotsCommand,
}

#[derive(Debug, Subcommand)]
pub enum SlotsCommand {
    /// Derive the availability board once
    #[command(alias = "ls")]
    List(SlotsSelector),

    /// Watch the board live, re-rendering on every change (Ctrl-C to stop)
    Watch(SlotsSelector),
}

/// Which (court, date) board to derive.
#[derive(Debug, Args)]
pub struct SlotsSelector {
    /// Court ID or name
    #[arg(long, short = 'c')]
    pub court: String,

    /// Date (YYYY-MM-DD); defaults to today
    #[arg(long, short = 'd')]
    pub date: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  RESERVATIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ReservationsArgs {
    #[command(subcommand)]
    pub command: ReservationsCommand,
}

#[derive(Debug, Subcommand)]
pub enum ReservationsCommand {
    /// List reservations
    #[command(alias = "ls")]
    List {
        /// Filter by date (YYYY-MM-DD)
        #[arg(long, short = 'd')]
        date: Option<String>,

        /// Filter by court ID or name
        #[arg(long, short = 'c')]
        court: Option<String>,

        /// Filter by status
        #[arg(long, short = 's')]
        status: Option<StatusFilter>,

        /// Only the current profile's own reservations
        #[arg(long)]
        mine: bool,
    },

    /// Cancel a reservation
    Cancel {
        /// Reservation ID
        reservation: String,
    },
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum StatusFilter {
    Pending,
    Confirmed,
    Cancelled,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  BOOK
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct BookArgs {
    /// Court ID or name
    #[arg(long, short = 'c')]
    pub court: String,

    /// Date (YYYY-MM-DD); defaults to today
    #[arg(long, short = 'd')]
    pub date: Option<String>,

    /// Slot start time (HH, HH:MM, or HH:MM:SS)
    #[arg(long, short = 's')]
    pub start: String,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  CONFIG
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Create initial config file with guided setup
    Init,

    /// Display current configuration (secrets redacted)
    Show,

    /// Print the config file path
    Path,

    /// Store a bearer token in the system keyring
    SetToken {
        /// Profile name (defaults to the active profile)
        #[arg(long)]
        profile: Option<String>,
    },
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  COMPLETIONS
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
