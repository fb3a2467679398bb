use kyb_core::entities::{Diff, Snapshot};
use kyb_core::enums::Source;
use serde::Serialize;

use crate::bootstrap::AppContext;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::HistoryArgs;
use crate::commands::shared::limit::effective_limit;
use crate::commands::shared::parse::parse_enum;
use crate::commands::shared::tenant::counterparty_for_tenant;
use crate::output::output;

#[derive(Serialize)]
struct History {
    counterparty_id: String,
    diffs: Vec<Diff>,
    #[serde(skip_serializing_if = "Option::is_none")]
    snapshots: Option<Vec<Snapshot>>,
}

/// Handle `kyb history`.
pub async fn handle(
    args: &HistoryArgs,
    ctx: &AppContext,
    flags: &GlobalFlags,
) -> anyhow::Result<()> {
    counterparty_for_tenant(&args.id, ctx, flags).await?;
    let source = args
        .source
        .as_deref()
        .map(|raw| parse_enum::<Source>(raw, "source"))
        .transpose()?;
    let limit = effective_limit(None, flags.limit, 20);
    let service = ctx.monitor.service();

    let diffs = service.list_diffs(&args.id, source, limit).await?;
    let snapshots = if args.snapshots {
        let mut snapshots = Vec::new();
        for source in source.map_or_else(|| Source::ALL.to_vec(), |source| vec![source]) {
            snapshots.extend(service.snapshot_history(&args.id, source, limit).await?);
        }
        Some(snapshots)
    } else {
        None
    };

    output(
        &History {
            counterparty_id: args.id.clone(),
            diffs,
            snapshots,
        },
        flags.format,
    )
}
