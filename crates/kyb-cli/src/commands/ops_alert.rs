use chrono::Utc;
use serde::Serialize;

use crate::bootstrap::AppContext;
use crate::cli::GlobalFlags;
use crate::cli::subcommands::OpsAlertCommands;
use crate::output::output;

#[derive(Serialize)]
struct OpsAlertUpdate {
    job_id: String,
    resolved: bool,
}

/// Handle `kyb ops-alerts`. Operational alerts are not tenant-scoped.
pub async fn handle(
    action: &OpsAlertCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let service = ctx.monitor.service();
    match action {
        OpsAlertCommands::List { all } => {
            let alerts = service.list_operational_alerts(*all).await?;
            output(&alerts, flags.format)
        }
        OpsAlertCommands::Resolve { job } => {
            let resolved = service.resolve_operational_alert(job, Utc::now()).await?;
            output(
                &OpsAlertUpdate {
                    job_id: job.clone(),
                    resolved,
                },
                flags.format,
            )
        }
    }
}
