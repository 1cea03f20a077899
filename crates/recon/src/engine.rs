use crate::config::Profile;
use crate::enrich::build_enrichment;
use crate::error::ReconError;
use crate::financial::{apply_dispute_analysis, apply_disputes, RebateRate};
use crate::join::{combine, primary_join, secondary_join};
use crate::layout::{self, ColumnGroups};
use crate::model::{ReconInput, ReconOutput, RunContext, RunMeta};
use crate::summary::compute_summary;

/// Run both join stages per profile. Returns the initial and final tables
/// plus the summary.
///
/// Table-level problems (bad profile, missing key columns) fail before any
/// table is built. Row-level problems are counted in the summary.
pub fn run(profile: &Profile, input: &ReconInput, ctx: &mut RunContext) -> Result<ReconOutput, ReconError> {
    profile.validate()?;
    RebateRate::from_percent(profile.financial.rebate_percent)?;

    log::info!(
        "run '{}': {} statement row(s), {} estimate row(s)",
        profile.name,
        input.statement.len(),
        input.estimate.len()
    );

    // Stage 1
    let stage1 = primary_join(&input.statement, &input.estimate, profile, ctx)?;

    let mut initial = stage1.table.clone();
    if apply_disputes(&mut initial, &profile.dispute).is_none() {
        log::debug!("initial table: dispute columns absent, '{}' not computed", profile.dispute.disputed);
    }
    let statement_columns = input.statement.columns().to_vec();
    let initial_groups = ColumnGroups {
        statement: &statement_columns,
        attached: &stage1.attached_columns,
        enrichment: &[],
    };
    let order = layout::initial_order(&initial, &initial_groups, profile);
    layout::apply(&mut initial, &order);

    // Stage 2
    let source = build_enrichment(input.query.as_ref(), input.scraper.as_ref(), profile, ctx)?;
    let stage2 = secondary_join(&stage1, &source.table, profile)?;
    let (mut final_table, statuses) = combine(&stage1, &stage2)?;

    let mut dispute_skipped = 0;
    match apply_disputes(&mut final_table, &profile.dispute) {
        Some(skipped) => {
            dispute_skipped += skipped;
            if let Some(skipped) = apply_dispute_analysis(&mut final_table, &profile.dispute) {
                dispute_skipped += skipped;
            }
        }
        None => ctx.warn(format!(
            "'{}' or '{}' missing from final table, disputes not computed",
            profile.dispute.statement_amount, profile.dispute.amount_to_pay
        )),
    }
    if dispute_skipped > 0 {
        ctx.warn(format!("{dispute_skipped} row(s) with unparseable dispute amounts"));
    }

    let final_groups = ColumnGroups {
        statement: &statement_columns,
        attached: &stage1.attached_columns,
        enrichment: &stage2.added_columns,
    };
    let order = layout::final_order(&final_table, &final_groups, profile);
    layout::apply(&mut final_table, &order);

    let summary = compute_summary(&statuses, &stage1, &stage2, &source, dispute_skipped, &ctx.warnings);
    log::info!(
        "run '{}' done: {} row(s), {} still unmatched",
        profile.name,
        summary.total_rows,
        summary.still_unmatched
    );

    Ok(ReconOutput {
        meta: RunMeta {
            profile: profile.name.clone(),
            duplicate_policy: profile.estimate.duplicates.to_string(),
            engine_version: env!("CARGO_PKG_VERSION").to_string(),
            run_at: ctx.run_at.to_rfc3339(),
            initial_output: ctx.initial_output_path().display().to_string(),
            final_output: ctx.final_output_path().display().to_string(),
        },
        summary,
        initial,
        final_table,
        statuses,
        enrichment: source.table,
    })
}
