use clap::Subcommand;

/// Tenant alert commands.
#[derive(Clone, Debug, Subcommand)]
pub enum AlertCommands {
    /// List alerts, most recently observed first.
    List {
        /// Only alerts of this counterparty
        #[arg(long)]
        counterparty: Option<String>,
        /// Include resolved alerts
        #[arg(long)]
        all: bool,
        /// Only unread alerts
        #[arg(long)]
        unread: bool,
    },
    /// Mark an alert read.
    Read { id: String },
    /// Resolve an alert manually.
    Resolve { id: String },
}
