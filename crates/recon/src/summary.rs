use std::collections::BTreeMap;

use crate::enrich::EnrichmentSource;
use crate::join::{PrimaryJoin, SecondaryJoin};
use crate::model::{DuplicateCounts, MatchStatus, RunSummary, Skipped};

/// Build the run summary from the final statuses and per-stage counters.
pub fn compute_summary(
    statuses: &[MatchStatus],
    stage1: &PrimaryJoin,
    stage2: &SecondaryJoin,
    source: &EnrichmentSource,
    dispute_skipped: usize,
    warnings: &[String],
) -> RunSummary {
    let mut status_counts: BTreeMap<String, usize> = BTreeMap::new();
    let (mut matched_primary, mut duplicate_flagged, mut matched_secondary, mut still_unmatched) =
        (0, 0, 0, 0);

    for status in statuses {
        *status_counts.entry(status.label().to_string()).or_insert(0) += 1;
        match status {
            MatchStatus::MatchedPrimary => matched_primary += 1,
            MatchStatus::DuplicateKeyInSecondary => duplicate_flagged += 1,
            MatchStatus::MatchedSecondary => matched_secondary += 1,
            MatchStatus::StillUnmatched => still_unmatched += 1,
            MatchStatus::Unjoined | MatchStatus::UnmatchedPrimary => {}
        }
    }

    RunSummary {
        total_rows: statuses.len(),
        matched_primary,
        unmatched_primary: stage1.unmatched,
        duplicate_flagged,
        matched_secondary,
        still_unmatched,
        unresolved_keys: stage1.unresolved,
        fallback_dates: source.fallback_dates,
        status_counts,
        duplicates: DuplicateCounts {
            statement: stage1.duplicate_statement_keys,
            estimate: stage1.duplicate_estimate_keys,
            enrichment: stage2.duplicate_enrichment_keys,
        },
        skipped: Skipped {
            financial_parse: source.financial_skipped,
            dispute_parse: dispute_skipped,
            date_parse: source.date_unparsed,
        },
        warnings: warnings.to_vec(),
    }
}
