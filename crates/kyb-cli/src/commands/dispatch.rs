use crate::bootstrap::AppContext;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::Commands;
use crate::commands;

/// Dispatch a parsed command to its handler module.
pub async fn dispatch(
    command: Commands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    match command {
        Commands::Register(args) => commands::counterparty::register(&args, ctx, flags).await,
        Commands::List(args) => commands::counterparty::list(&args, ctx, flags).await,
        Commands::Show(args) => commands::counterparty::show(&args, ctx, flags).await,
        Commands::Archive(args) => commands::counterparty::archive(&args, ctx, flags).await,
        Commands::Correct(args) => commands::counterparty::correct(&args, ctx, flags).await,
        Commands::Rename(args) => commands::counterparty::rename(&args, ctx, flags).await,
        Commands::Run(args) => commands::run::handle(&args, ctx, flags).await,
        Commands::Score(args) => commands::score::handle(&args, ctx, flags).await,
        Commands::Alerts { action } => commands::alert::handle(&action, ctx, flags).await,
        Commands::Jobs(args) => commands::job::handle(&args, ctx, flags).await,
        Commands::History(args) => commands::history::handle(&args, ctx, flags).await,
        Commands::OpsAlerts { action } => commands::ops_alert::handle(&action, ctx, flags).await,
    }
}
