use chrono::Utc;
use kyb_risk::RiskAssessment;
use serde::Serialize;

use crate::bootstrap::AppContext;
use crate::cli::GlobalFlags;
use crate::cli::root_commands::ScoreArgs;
use crate::commands::shared::tenant::counterparty_for_tenant;
use crate::output::output;

#[derive(Serialize)]
struct ScoreResponse {
    counterparty_id: String,
    #[serde(flatten)]
    assessment: RiskAssessment,
}

pub async fn handle(args: &ScoreArgs, ctx: &AppContext, flags: &GlobalFlags) -> anyhow::Result<()> {
    let now = Utc::now();
    let Some(id) = args.id.as_deref() else {
        let scores: Vec<ScoreResponse> = ctx
            .monitor
            .rescore_tenant(&flags.tenant, now)
            .await?
            .into_iter()
            .map(|(counterparty_id, assessment)| ScoreResponse {
                counterparty_id,
                assessment,
            })
            .collect();
        return output(&scores, flags.format);
    };

    counterparty_for_tenant(id, ctx, flags).await?;
    if args.explain {
        let inputs = ctx.monitor.risk_inputs(id, now).await?;
        return output(&inputs, flags.format);
    }
    let assessment = ctx.monitor.score(id, now).await?;
    output(
        &ScoreResponse {
            counterparty_id: id.to_string(),
            assessment,
        },
        flags.format,
    )
}
