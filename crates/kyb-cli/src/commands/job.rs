use kyb_core::enums::JobState;

use crate::bootstrap::AppContext;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::JobsArgs;
use crate::commands::shared::limit::effective_limit;
use crate::commands::shared::parse::parse_enum;
use crate::commands::shared::tenant::counterparty_for_tenant;
use crate::output::output;

/// Handle `kyb jobs`.
///
/// Without `--counterparty` this lists jobs across all tenants; the job table
/// is shared by the scheduler.
pub async fn handle(args: &JobsArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let state = args
        .state
        .as_deref()
        .map(|raw| parse_enum::<JobState>(raw, "state"))
        .transpose()?;

    let service = ctx.monitor.service();
    let mut jobs = match args.counterparty.as_deref() {
        Some(id) => {
            counterparty_for_tenant(id, ctx, flags).await?;
            let mut jobs = service.list_jobs_for_counterparty(id).await?;
            if let Some(state) = state {
                jobs.retain(|job| job.state == state);
            }
            jobs
        }
        None => service.list_jobs(state).await?,
    };
    jobs.truncate(usize::try_from(effective_limit(None, flags.limit, 100))?);
    output(&jobs, flags.format)
}
