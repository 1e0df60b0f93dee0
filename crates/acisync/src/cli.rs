//! Clap derive structures for the `acisync` CLI.
//!
//! Only depends on clap and clap_complete so build.rs can include it to
//! render man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// acisync -- mirror a Cisco ACI fabric into NetBox
#[derive(Debug, Parser)]
#[command(
    name = "acisync",
    version,
    about = "Mirror a Cisco ACI fabric into NetBox",
    long_about = "Reads fabric, tenant, contract and firmware state from a Cisco APIC and\n\
        reconciles it into NetBox (with the ACI plugin). Only changed fields are\n\
        written, so repeated runs against a synchronized NetBox make no writes.",
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
    /// Config file (TOML, YAML or JSON, by extension)
    #[arg(long, env = "ACISYNC_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// APIC host name or URL (overrides config)
    #[arg(long, global = true)]
    pub aci_host: Option<String>,

    /// APIC user name (overrides config)
    #[arg(long, global = true)]
    pub aci_username: Option<String>,

    /// APIC password (prefer ACI_PASSWORD or the keyring)
    #[arg(long, global = true)]
    pub aci_password: Option<String>,

    /// NetBox base URL (overrides config)
    #[arg(long, global = true)]
    pub netbox_url: Option<String>,

    /// NetBox API token (prefer NETBOX_TOKEN or the keyring)
    #[arg(long, global = true)]
    pub netbox_token: Option<String>,

    /// Output format for reports
    #[arg(
        long,
        short = 'o',
        env = "ACISYNC_OUTPUT",
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

    /// Also write logs to this file
    #[arg(long, global = true)]
    pub log_file: Option<PathBuf>,

    /// Suppress report output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// YAML
    Yaml,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

/// What to do when a bulk NetBox read fails.
#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum PreloadPolicy {
    /// Abort the kind
    AbortKind,
    /// Treat the scope as empty and attempt creates
    AssumeEmpty,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run one synchronization pass
    Sync(SyncArgs),

    /// List entity kinds in execution order
    Kinds,

    /// Manage the configuration file
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Only sync these kinds (comma separated; see `acisync kinds`)
    #[arg(long, value_delimiter = ',', num_args = 1.., conflicts_with = "skip")]
    pub only: Vec<String>,

    /// Sync everything except these kinds
    #[arg(long, value_delimiter = ',', num_args = 1..)]
    pub skip: Vec<String>,

    /// Compute the plan, write nothing
    #[arg(long, short = 'n')]
    pub dry_run: bool,

    /// Do not re-read written objects
    #[arg(long)]
    pub no_verify: bool,

    /// Keep going after per-entity failures
    #[arg(long, value_name = "BOOL")]
    pub continue_on_error: Option<bool>,

    /// Stop the run on any kind-level fatal error
    #[arg(long)]
    pub abort_run_on_fatal: bool,

    /// Policy when a bulk NetBox read fails
    #[arg(long, value_enum)]
    pub on_preload_failure: Option<PreloadPolicy>,

    /// Limit tenant-scoped kinds to one tenant
    #[arg(long)]
    pub tenant: Option<String>,
}

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Write a commented default config file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Display the effective configuration, secrets redacted
    Show,

    /// Print the config file path
    Path,
}

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
