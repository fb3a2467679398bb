use anyhow::bail;
use chrono::Utc;
use kyb_core::entities::Alert;
use kyb_db::AlertFilter;
use serde::Serialize;

use crate::bootstrap::AppContext;
use crate::cli::GlobalFlags;
use crate::cli::subcommands::AlertCommands;
use crate::commands::shared::limit::effective_limit;
use crate::output::output;

#[derive(Serialize)]
struct AlertUpdate {
    id: String,
    changed: bool,
}

/// Handle `kyb alerts`.
pub async fn handle(
    action: &AlertCommands,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let service = ctx.monitor.service();
    match action {
        AlertCommands::List {
            counterparty,
            all,
            unread,
        } => {
            let filter = AlertFilter {
                counterparty_id: counterparty.clone(),
                include_resolved: *all,
                unread_only: *unread,
                limit: Some(effective_limit(None, flags.limit, 50)),
            };
            let alerts = service.list_alerts(&flags.tenant, &filter).await?;
            output(&alerts, flags.format)
        }
        AlertCommands::Read { id } => {
            alert_for_tenant(id, ctx, flags).await?;
            let changed = service.mark_alert_read(id).await?;
            output(&AlertUpdate { id: id.clone(), changed }, flags.format)
        }
        AlertCommands::Resolve { id } => {
            alert_for_tenant(id, ctx, flags).await?;
            let changed = service.resolve_alert(id, Utc::now()).await?;
            output(&AlertUpdate { id: id.clone(), changed }, flags.format)
        }
    }
}

async fn alert_for_tenant(
    id: &str,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Alert> {
    let alert = ctx.monitor.service().get_alert(id).await?;
    if alert.tenant_id != flags.tenant {
        bail!("alert '{id}' not found for tenant '{}'", flags.tenant);
    }
    Ok(alert)
}
