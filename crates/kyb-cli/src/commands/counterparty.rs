use chrono::Utc;
use kyb_core::entities::{Counterparty, MonitoringJob, NewCounterparty};
use serde::Serialize;

use crate::bootstrap::AppContext;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::{CorrectArgs, IdArgs, ListArgs, RegisterArgs, RenameArgs};
use crate::commands::shared::limit::effective_limit;
use crate::commands::shared::tenant::counterparty_for_tenant;
use crate::output::output;

#[derive(Serialize)]
struct CounterpartyView {
    #[serde(flatten)]
    counterparty: Counterparty,
    jobs: Vec<MonitoringJob>,
}

#[derive(Serialize)]
struct ArchiveResponse {
    id: String,
    archived: bool,
}

pub async fn register(
    args: &RegisterArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    let new = NewCounterparty {
        display_name: args.name.clone(),
        country_code: args.country.clone(),
        vat_number: args.vat.clone(),
        lei_code: args.lei.clone(),
    };
    let registration = ctx
        .monitor
        .register_counterparty(&flags.tenant, &new, Utc::now())
        .await?;
    output(&registration, flags.format)
}

pub async fn list(args: &ListArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let limit = effective_limit(None, flags.limit, 100);
    let mut counterparties = ctx
        .monitor
        .service()
        .list_counterparties(&flags.tenant, args.archived)
        .await?;
    counterparties.truncate(usize::try_from(limit)?);
    output(&counterparties, flags.format)
}

pub async fn show(args: &IdArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let counterparty = counterparty_for_tenant(&args.id, ctx, flags).await?;
    let jobs = ctx
        .monitor
        .service()
        .list_jobs_for_counterparty(&counterparty.id)
        .await?;
    output(&CounterpartyView { counterparty, jobs }, flags.format)
}

pub async fn archive(args: &IdArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    counterparty_for_tenant(&args.id, ctx, flags).await?;
    let archived = ctx.monitor.archive_counterparty(&args.id, Utc::now()).await?;
    output(
        &ArchiveResponse {
            id: args.id.clone(),
            archived,
        },
        flags.format,
    )
}

pub async fn correct(
    args: &CorrectArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    counterparty_for_tenant(&args.id, ctx, flags).await?;
    let registration = ctx
        .monitor
        .correct_identifiers(&args.id, args.vat.as_deref(), args.lei.as_deref(), Utc::now())
        .await?;
    output(&registration, flags.format)
}

pub async fn rename(
    args: &RenameArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    counterparty_for_tenant(&args.id, ctx, flags).await?;
    let counterparty = ctx
        .monitor
        .rename_counterparty(&args.id, &args.name, Utc::now())
        .await?;
    output(&counterparty, flags.format)
}
