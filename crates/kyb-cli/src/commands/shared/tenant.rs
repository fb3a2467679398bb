use anyhow::bail;
use kyb_core::entities::Counterparty;

use crate::bootstrap::AppContext;
use crate::cli::GlobalFlags;

/// Load a counterparty, refusing IDs that belong to another tenant.
pub async fn counterparty_for_tenant(
    id: &str,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<Counterparty> {
    let counterparty = ctx.monitor.service().get_counterparty(id).await?;
    if counterparty.tenant_id != flags.tenant {
        bail!("counterparty '{id}' not found for tenant '{}'", flags.tenant);
    }
    Ok(counterparty)
}
