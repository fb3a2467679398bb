use clap::Subcommand;

/// Operational alert commands.
#[derive(Clone, Debug, Subcommand)]
pub enum OpsAlertCommands {
    /// List operational alerts, newest first.
    List {
        /// Include resolved alerts
        #[arg(long)]
        all: bool,
    },
    /// Resolve the operational alert of a job.
    Resolve {
        /// Job ID
        job: String,
    },
}
