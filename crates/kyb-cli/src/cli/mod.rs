use clap::Parser;

pub mod global;
pub mod root_commands;
pub mod subcommands;

pub use global::{GlobalFlags, OutputFormat};
pub use root_commands::Commands;

/// Top-level CLI parser for the `kyb` binary.
#[derive(Debug, Parser)]
#[command(name = "kyb", version, about = "KYB counterparty monitoring")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Output format: json, raw
    #[arg(short, long, global = true, default_value = "json")]
    pub format: OutputFormat,

    /// Tenant the command acts for
    #[arg(short, long, global = true, default_value = "default")]
    pub tenant: String,

    /// Max results to return
    #[arg(short, long, global = true)]
    pub limit: Option<u32>,

    /// Quiet mode (errors only)
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Verbose mode (debug logging)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Directory holding config.toml (defaults to .kyb)
    #[arg(long, global = true)]
    pub config_dir: Option<String>,
}

impl Cli {
    /// Extract global flags for command handlers.
    #[must_use]
    pub fn global_flags(&self) -> GlobalFlags {
        GlobalFlags {
            format: self.format,
            tenant: self.tenant.clone(),
            limit: self.limit,
            config_dir: self.config_dir.clone(),
        }
    }
}
