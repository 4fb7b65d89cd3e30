//! Clap derive structures for the `corral` CLI.
//!
//! Defines the complete command tree, global flags, and shared types.

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// corral -- manage alert-to-incident correlation rules from the command line
#[derive(Debug, Parser)]
#[command(
    name = "corral",
    version,
    about = "Manage alert-correlation rules from the command line",
    long_about = "A CLI for the corral alert-correlation backend.\n\n\
        Lists, authors, and deletes correlation rules, and drives the\n\
        AI rule-generation flow end to end (dispatch, push-channel wait,\n\
        suggestion review, submission).",
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
    /// Backend profile to use
    #[arg(long, short = 'p', env = "CORRAL_PROFILE", global = true)]
    pub profile: Option<String>,

    /// API base URL (overrides profile)
    #[arg(long, short = 'u', env = "CORRAL_API_URL", global = true)]
    pub api_url: Option<String>,

    /// Bearer token
    #[arg(long, env = "CORRAL_TOKEN", global = true, hide_env = true)]
    pub token: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "CORRAL_OUTPUT",
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
    #[arg(long, short = 'k', env = "CORRAL_INSECURE", global = true)]
    pub insecure: bool,

    /// Request timeout in seconds
    #[arg(long, env = "CORRAL_TIMEOUT", default_value = "30", global = true)]
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
    /// Manage correlation rules
    #[command(alias = "r")]
    Rules(RulesArgs),

    /// Drive AI rule generation and review suggestions
    #[command(alias = "s")]
    Suggest(SuggestArgs),

    /// Manage configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Rules ────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct RulesArgs {
    #[command(subcommand)]
    pub command: RulesCommand,
}

#[derive(Debug, Subcommand)]
pub enum RulesCommand {
    /// List correlation rules
    #[command(alias = "ls")]
    List,

    /// Show one rule in detail (including its parsed query tree)
    Show {
        /// Rule id or exact name
        rule: String,
    },

    /// Create a correlation rule
    Create(CreateRuleArgs),

    /// Delete a rule
    #[command(alias = "rm")]
    Delete {
        /// Rule id or exact name
        rule: String,
    },
}

#[derive(Debug, Args)]
pub struct CreateRuleArgs {
    /// Rule name
    #[arg(long)]
    pub name: String,

    /// CEL matching condition, e.g. 'severity == "critical"'
    #[arg(long)]
    pub cel: String,

    /// Timeframe amount (in --unit units)
    #[arg(long, default_value = "5")]
    pub timeframe: f64,

    /// Timeframe unit: seconds, minutes, hours, or days
    #[arg(long, default_value = "minutes")]
    pub unit: String,

    /// Attribute path to group by (repeatable)
    #[arg(long = "group-by")]
    pub group_by: Vec<String>,

    /// Free-text description of the grouping
    #[arg(long)]
    pub description: Option<String>,

    /// Require operator approval before incidents open
    #[arg(long)]
    pub require_approve: bool,
}

// ── Suggest ──────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct SuggestArgs {
    #[command(subcommand)]
    pub command: SuggestCommand,
}

#[derive(Debug, Subcommand)]
pub enum SuggestCommand {
    /// Dispatch a generation run and wait for its result
    Run(SuggestRunArgs),

    /// Follow the shared suggestion channel and print batches as they
    /// arrive
    Watch(SuggestWatchArgs),
}

#[derive(Debug, Args)]
pub struct SuggestRunArgs {
    /// Seconds to wait for the pushed result before giving up
    #[arg(long, default_value = "180")]
    pub wait: u64,

    /// Add every suggestion without asking
    #[arg(long, conflicts_with = "add")]
    pub add_all: bool,

    /// Add the named suggestion (repeatable)
    #[arg(long)]
    pub add: Vec<String>,

    /// Pick suggestions to add interactively
    #[arg(long, conflicts_with_all = ["add", "add_all"])]
    pub pick: bool,
}

#[derive(Debug, Args)]
pub struct SuggestWatchArgs {
    /// Prompt the backend for a fresh batch before watching
    #[arg(long)]
    pub trigger: bool,

    /// Exit after this many batches (default: watch until interrupted)
    #[arg(long)]
    pub count: Option<u64>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the loaded configuration (tokens redacted)
    Show,

    /// Create or update a profile
    Init(ConfigInitArgs),

    /// Store a bearer token in the system keyring
    SetToken {
        /// Profile to store the token for
        #[arg(long, default_value = "default")]
        profile: String,
    },
}

#[derive(Debug, Args)]
pub struct ConfigInitArgs {
    /// Profile name
    #[arg(long, default_value = "default")]
    pub profile: String,

    /// API base URL
    #[arg(long)]
    pub api_url: String,

    /// Environment variable to read the bearer token from
    #[arg(long)]
    pub token_env: Option<String>,

    /// Push-gateway application key
    #[arg(long)]
    pub push_key: Option<String>,

    /// Push-gateway cluster region
    #[arg(long)]
    pub push_cluster: Option<String>,

    /// Push-gateway endpoint override (self-hosted deployments)
    #[arg(long)]
    pub push_endpoint: Option<String>,

    /// Make this the default profile
    #[arg(long)]
    pub default: bool,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
