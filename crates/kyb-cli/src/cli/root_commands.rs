use clap::{Args, Subcommand};

use crate::cli::subcommands::{AlertCommands, OpsAlertCommands};

/// Top-level command tree.
#[derive(Clone, Debug, Subcommand)]
pub enum Commands {
    /// Register a counterparty and start monitoring it.
    Register(RegisterArgs),
    /// List the tenant's counterparties.
    List(ListArgs),
    /// Show one counterparty with its jobs.
    Show(IdArgs),
    /// Archive a counterparty and stop its jobs.
    Archive(IdArgs),
    /// Replace the VAT number and LEI of a counterparty.
    Correct(CorrectArgs),
    /// Change the display name of a counterparty.
    Rename(RenameArgs),
    /// Run the monitoring scheduler.
    Run(RunArgs),
    /// Recompute risk scores.
    Score(ScoreArgs),
    /// Tenant alerts.
    Alerts {
        #[command(subcommand)]
        action: AlertCommands,
    },
    /// Monitoring jobs and their state.
    Jobs(JobsArgs),
    /// Snapshot and diff history of one counterparty.
    History(HistoryArgs),
    /// Operational alerts about failing sources.
    OpsAlerts {
        #[command(subcommand)]
        action: OpsAlertCommands,
    },
}

#[derive(Clone, Debug, Args)]
pub struct RegisterArgs {
    /// Display name
    pub name: String,
    /// ISO 3166-1 alpha-2 country code
    #[arg(long)]
    pub country: String,
    #[arg(long)]
    pub vat: Option<String>,
    #[arg(long)]
    pub lei: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct ListArgs {
    /// Include archived counterparties
    #[arg(long)]
    pub archived: bool,
}

#[derive(Clone, Debug, Args)]
pub struct IdArgs {
    /// Counterparty ID
    pub id: String,
}

#[derive(Clone, Debug, Args)]
pub struct CorrectArgs {
    /// Counterparty ID
    pub id: String,
    /// New VAT number; omitted removes it
    #[arg(long)]
    pub vat: Option<String>,
    /// New LEI; omitted removes it
    #[arg(long)]
    pub lei: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct RenameArgs {
    /// Counterparty ID
    pub id: String,
    /// New display name
    pub name: String,
}

#[derive(Clone, Debug, Args)]
pub struct RunArgs {
    /// Run a single pass over due jobs and exit
    #[arg(long)]
    pub once: bool,
}

#[derive(Clone, Debug, Args)]
pub struct ScoreArgs {
    /// Counterparty ID; all active counterparties of the tenant when omitted
    pub id: Option<String>,
    /// Print the scoring inputs instead of persisting a new score
    #[arg(long)]
    pub explain: bool,
}

#[derive(Clone, Debug, Args)]
pub struct JobsArgs {
    /// Only jobs of this counterparty
    #[arg(long)]
    pub counterparty: Option<String>,
    /// Only jobs in this state (pending, running, backoff, degraded, disabled)
    #[arg(long)]
    pub state: Option<String>,
}

#[derive(Clone, Debug, Args)]
pub struct HistoryArgs {
    /// Counterparty ID
    pub id: String,
    /// Only this source (vies, gleif, sanctions_eu, ...)
    #[arg(long)]
    pub source: Option<String>,
    /// Include stored snapshots, not just diffs
    #[arg(long)]
    pub snapshots: bool,
}
