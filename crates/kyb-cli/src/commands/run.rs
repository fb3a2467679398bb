use kyb_monitor::SystemClock;
use tokio::sync::watch;

use crate::bootstrap::AppContext;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::RunArgs;
use crate::output::output;

/// Handle `kyb run`: one pass with `--once`, otherwise loop until Ctrl-C.
pub async fn handle(args: &RunArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    if args.once {
        let report = ctx.scheduler.tick_with(&SystemClock).await;
        return output(&report, flags.format);
    }

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => tracing::info!("shutdown requested"),
            Err(error) => tracing::error!(%error, "failed to listen for Ctrl-C"),
        }
        let _ = shutdown_tx.send(true);
    });

    ctx.scheduler.run_until(shutdown_rx).await?;
    Ok(())
}
