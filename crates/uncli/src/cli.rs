//! Clap derive structures for the `uncli` CLI.
//!
//! Only clap and clap_complete may be used here: `build.rs` includes this
//! file directly to render man pages.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// uncli -- block, unblock and kick clients on a UniFi controller
#[derive(Debug, Parser)]
#[command(
    name = "uncli",
    version,
    about = "Block, unblock and kick UniFi network clients",
    long_about = "List the clients known to a UniFi OS controller and block, unblock or \
        kick them by name.\n\n\
        Terms are case-sensitive substrings matched against each client's name \
        and hostname. Without terms, list/block/unblock/kick apply to every client.\n\n\
        Block and unblock lists can also be kept in Consul KV and applied with \
        `uncli kv sync`.",
    propagate_version = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    /// Defaults to `list` with no terms
    #[command(subcommand)]
    pub command: Option<Command>,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Controller URL [default: http://unifi]
    #[arg(long, short = 'e', global = true)]
    pub endpoint: Option<String>,

    /// Controller username [default: ubnt]
    #[arg(long, short = 'u', global = true)]
    pub username: Option<String>,

    /// Controller site
    #[arg(long, short = 's', global = true)]
    pub site: Option<String>,

    /// Request timeout in seconds [default: 60]
    #[arg(long, global = true)]
    pub timeout: Option<u64>,

    /// Accept self-signed TLS certificates
    #[arg(long, short = 'k', global = true)]
    pub insecure: bool,

    /// Config file path
    #[arg(long, env = "UNIFI_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// How devices are printed
    #[arg(long, short = 'o', default_value = "plain", global = true)]
    pub output: OutputFormat,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Fixed-width columns: name, IP, MAC, last seen
    Plain,
    /// One JSON object per line
    Json,
}

// ── Commands ─────────────────────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List clients
    #[command(alias = "ls")]
    List(MatchArgs),

    /// Block clients
    Block(MatchArgs),

    /// Unblock clients
    Unblock(MatchArgs),

    /// Disconnect clients so they reassociate
    Kick(MatchArgs),

    /// Manage and apply the block/unblock lists in Consul KV
    Kv(KvArgs),

    /// Inspect the effective configuration
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

#[derive(Debug, Args)]
pub struct MatchArgs {
    /// Substrings of a client name or hostname; none selects every client
    pub terms: Vec<String>,
}

// ── KV ───────────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct KvArgs {
    /// Defaults to `list`
    #[command(subcommand)]
    pub command: Option<KvCommand>,
}

#[derive(Debug, Subcommand)]
pub enum KvCommand {
    /// Show both lists
    #[command(alias = "ls")]
    List,

    /// Replace the block list
    Block(TermsArgs),

    /// Replace the unblock list
    Unblock(TermsArgs),

    /// Block clients on the block list, then unblock clients on the unblock list
    Sync,

    /// Delete one list
    Clear(ClearArgs),
}

#[derive(Debug, Args)]
pub struct TermsArgs {
    /// New list contents; none stores an empty list
    pub terms: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ClearArgs {
    /// Which list to delete
    pub list: KvList,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
pub enum KvList {
    Block,
    Unblock,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the merged configuration with secrets masked
    Show,

    /// Print the config file path
    Path,
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
