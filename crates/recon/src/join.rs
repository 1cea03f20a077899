//! Two-stage left join: statement × estimate, then the leftovers × enrichment.

use std::collections::HashMap;

use recongrid_core::{Record, RecordSet};

use crate::config::{DuplicatePolicy, Profile};
use crate::error::ReconError;
use crate::key::{duplicate_keys, resolve_keys};
use crate::model::{MatchStatus, RunContext};

/// Move a row's status forward, rejecting any step the lifecycle forbids.
pub fn advance(row: usize, current: &mut MatchStatus, next: MatchStatus) -> Result<(), ReconError> {
    if !current.can_become(next) {
        return Err(ReconError::InvalidTransition {
            row,
            from: *current,
            to: next,
        });
    }
    *current = next;
    Ok(())
}

// ---------------------------------------------------------------------------
// Stage 1
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct PrimaryJoin {
    /// Every statement row, annotated.
    pub table: RecordSet,
    pub statuses: Vec<MatchStatus>,
    /// Resolved key per row (`""` when unresolved).
    pub keys: Vec<String>,
    /// Output names of the estimate columns that were attached.
    pub attached_columns: Vec<String>,
    pub matched: usize,
    pub unmatched: usize,
    pub duplicate_flagged: usize,
    pub unresolved: usize,
    pub duplicate_statement_keys: usize,
    pub duplicate_estimate_keys: usize,
}

/// Left join of statement rows onto the allow-listed estimate columns.
pub fn primary_join(
    statement: &RecordSet,
    estimate: &RecordSet,
    profile: &Profile,
    ctx: &mut RunContext,
) -> Result<PrimaryJoin, ReconError> {
    let keys_cfg = &profile.keys;
    let statement_keys = resolve_keys(statement, keys_cfg)?;
    let estimate_keys = resolve_keys(estimate, keys_cfg)?;

    let mut allowed: Vec<&String> = Vec::new();
    for col in &profile.estimate.columns {
        if estimate.has_column(col) {
            allowed.push(col);
        } else {
            ctx.warn(format!("estimate column '{col}' not found, skipped"));
        }
    }

    // (estimate column, output column)
    let targets: Vec<(&String, String)> = allowed
        .iter()
        .map(|col| {
            let collides = statement.has_column(col)
                && !keys_cfg.is_key_column(col)
                && !profile.estimate.overwrite.contains(*col);
            let out = if collides {
                format!("{col}{}", profile.estimate.suffix)
            } else {
                col.to_string()
            };
            (*col, out)
        })
        .collect();

    let mut lookup: HashMap<&str, Vec<usize>> = HashMap::new();
    for (i, k) in estimate_keys.iter().enumerate() {
        if !k.is_empty() {
            lookup.entry(k.as_str()).or_default().push(i);
        }
    }

    let duplicate_statement_keys = duplicate_keys(&statement_keys);
    let duplicate_estimate_keys = duplicate_keys(&estimate_keys);
    if duplicate_estimate_keys > 0 {
        ctx.warn(format!(
            "{duplicate_estimate_keys} duplicate key(s) in {} ({} policy)",
            estimate.name(),
            profile.estimate.duplicates
        ));
    }
    if profile.estimate.duplicates == DuplicatePolicy::Exclude {
        let before = lookup.len();
        lookup.retain(|_, rows| rows.len() == 1);
        log::info!("excluded {} duplicated estimate key(s) from lookup", before - lookup.len());
    }

    let common = &keys_cfg.common_column;
    let status_col = &profile.output.status_column;

    let mut columns = vec![common.clone()];
    columns.extend(statement.columns().iter().filter(|c| *c != common).cloned());
    let mut table = RecordSet::new(statement.name(), columns);
    for (_, out) in &targets {
        table.add_column(out.clone());
    }
    table.add_column(status_col.clone());

    let mut statuses = Vec::with_capacity(statement.len());
    let (mut matched, mut unmatched, mut duplicate_flagged, mut unresolved) = (0, 0, 0, 0);

    for (i, (row, key)) in statement.rows().iter().zip(&statement_keys).enumerate() {
        let mut record = row.clone();
        record.set(common.clone(), key.clone());

        let mut status = MatchStatus::Unjoined;
        let hit = if key.is_empty() {
            unresolved += 1;
            None
        } else {
            lookup.get(key.as_str())
        };

        match hit {
            Some(rows) => {
                let est = &estimate.rows()[rows[0]];
                attach(&mut record, est, &targets, profile);
                if rows.len() > 1 {
                    advance(i, &mut status, MatchStatus::DuplicateKeyInSecondary)?;
                    duplicate_flagged += 1;
                } else {
                    advance(i, &mut status, MatchStatus::MatchedPrimary)?;
                    matched += 1;
                }
            }
            None => {
                advance(i, &mut status, MatchStatus::UnmatchedPrimary)?;
                unmatched += 1;
            }
        }

        log::debug!("row {i}: key '{key}' -> {status}");
        record.set(status_col.clone(), status.label());
        table.push(record);
        statuses.push(status);
    }

    log::info!(
        "stage 1: {matched} matched, {unmatched} unmatched, {duplicate_flagged} duplicate-flagged, {unresolved} unresolved"
    );

    Ok(PrimaryJoin {
        table,
        statuses,
        keys: statement_keys,
        attached_columns: targets.into_iter().map(|(_, out)| out).collect(),
        matched,
        unmatched,
        duplicate_flagged,
        unresolved,
        duplicate_statement_keys,
        duplicate_estimate_keys,
    })
}

fn attach(record: &mut Record, est: &Record, targets: &[(&String, String)], profile: &Profile) {
    for (col, out) in targets {
        let value = est.get(col);
        if profile.keys.is_key_column(col) {
            // key columns only fill gaps
            if record.get(out).is_empty() {
                record.set(out.clone(), value.clone());
            }
        } else {
            record.set(out.clone(), value.clone());
        }
    }
}

// ---------------------------------------------------------------------------
// Stage 2
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct SecondaryJoin {
    /// The stage-1 `UnmatchedPrimary` rows, enriched where possible.
    pub table: RecordSet,
    pub statuses: Vec<MatchStatus>,
    /// Stage-1 row index of each row in `table`.
    pub source_rows: Vec<usize>,
    /// Enrichment columns the stage-1 table did not have.
    pub added_columns: Vec<String>,
    pub matched: usize,
    pub still_unmatched: usize,
    pub duplicate_enrichment_keys: usize,
}

/// Join stage-1 leftovers against a normalized enrichment set.
/// Matched rows take the enrichment value for every shared column.
pub fn secondary_join(
    stage1: &PrimaryJoin,
    enrichment: &RecordSet,
    profile: &Profile,
) -> Result<SecondaryJoin, ReconError> {
    let keys_cfg = &profile.keys;
    let status_col = &profile.output.status_column;

    let enrichment_keys = if enrichment.columns().is_empty() {
        Vec::new()
    } else {
        resolve_keys(enrichment, keys_cfg)?
    };

    let mut lookup: HashMap<&str, usize> = HashMap::new();
    for (i, k) in enrichment_keys.iter().enumerate() {
        if !k.is_empty() {
            lookup.entry(k.as_str()).or_insert(i);
        }
    }
    let duplicate_enrichment_keys = duplicate_keys(&enrichment_keys);

    let carried: Vec<&String> = enrichment
        .columns()
        .iter()
        .filter(|c| *c != &keys_cfg.common_column && *c != status_col)
        .collect();

    let mut table = RecordSet::new(stage1.table.name(), stage1.table.columns().to_vec());
    let mut added_columns = Vec::new();
    for col in &carried {
        if !table.has_column(col) {
            table.add_column((*col).clone());
            added_columns.push((*col).clone());
        }
    }

    let mut statuses = Vec::new();
    let mut source_rows = Vec::new();
    let (mut matched, mut still_unmatched) = (0, 0);

    for (i, row) in stage1.table.rows().iter().enumerate() {
        let mut status = stage1.statuses[i];
        if status != MatchStatus::UnmatchedPrimary {
            continue;
        }

        let mut record = row.clone();
        let key = &stage1.keys[i];
        let hit = if key.is_empty() { None } else { lookup.get(key.as_str()) };

        match hit {
            Some(&j) => {
                let src = &enrichment.rows()[j];
                for col in &carried {
                    let value = src.get(col);
                    if keys_cfg.is_key_column(col) && value.is_empty() {
                        continue;
                    }
                    record.set((*col).clone(), value.clone());
                }
                advance(i, &mut status, MatchStatus::MatchedSecondary)?;
                matched += 1;
            }
            None => {
                advance(i, &mut status, MatchStatus::StillUnmatched)?;
                still_unmatched += 1;
            }
        }

        record.set(status_col.clone(), status.label());
        table.push(record);
        statuses.push(status);
        source_rows.push(i);
    }

    log::info!("stage 2: {matched} matched from enrichment, {still_unmatched} still unmatched");

    Ok(SecondaryJoin {
        table,
        statuses,
        source_rows,
        added_columns,
        matched,
        still_unmatched,
        duplicate_enrichment_keys,
    })
}

/// Stage-1 rows that were not `UnmatchedPrimary`, plus every stage-2 row,
/// in the original statement order.
pub fn combine(
    stage1: &PrimaryJoin,
    stage2: &SecondaryJoin,
) -> Result<(RecordSet, Vec<MatchStatus>), ReconError> {
    let mut table = RecordSet::new(stage1.table.name(), stage2.table.columns().to_vec());
    let mut statuses = Vec::with_capacity(stage1.statuses.len());
    let mut second = stage2
        .source_rows
        .iter()
        .zip(stage2.table.rows())
        .zip(&stage2.statuses)
        .peekable();

    for (i, row) in stage1.table.rows().iter().enumerate() {
        if stage1.statuses[i] == MatchStatus::UnmatchedPrimary {
            match second.next_if(|((src, _), _)| **src == i) {
                Some(((_, enriched), status)) => {
                    table.push(enriched.clone());
                    statuses.push(*status);
                }
                None => break,
            }
        } else {
            table.push(row.clone());
            statuses.push(stage1.statuses[i]);
        }
    }

    if table.len() != stage1.table.len() || second.next().is_some() {
        return Err(ReconError::RowCountMismatch {
            expected: stage1.table.len(),
            actual: table.len(),
        });
    }

    Ok((table, statuses))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recongrid_core::CellValue;

    fn set(name: &str, cols: &[&str], rows: Vec<Vec<CellValue>>) -> RecordSet {
        let columns: Vec<String> = cols.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|vals| Record::from_pairs(columns.iter().cloned().zip(vals)))
            .collect();
        RecordSet::with_rows(name, columns, rows)
    }

    fn ctx() -> RunContext {
        RunContext::new(".", None)
    }

    #[test]
    fn stage1_scenario_one_match_one_miss() {
        let statement = set(
            "statement",
            &["PO", "Amount"],
            vec![
                vec!["A1".into(), 100.0.into()],
                vec!["A2".into(), 200.0.into()],
            ],
        );
        let estimate = set("estimate", &["PO", "Payable Amount"], vec![vec!["A1".into(), 90.0.into()]]);

        let out = primary_join(&statement, &estimate, &Profile::default(), &mut ctx()).unwrap();
        assert_eq!(out.matched, 1);
        assert_eq!(out.unmatched, 1);
        assert_eq!(out.statuses, vec![MatchStatus::MatchedPrimary, MatchStatus::UnmatchedPrimary]);
        assert_eq!(out.table.cell(0, "Payable Amount"), &CellValue::Number(90.0));
        assert!(out.table.cell(1, "Payable Amount").is_empty());
        assert_eq!(out.table.cell(0, "Match Status"), &CellValue::from("Matched with Estimates"));
        assert_eq!(out.table.cell(1, "CommonID"), &CellValue::from("A2"));
    }

    #[test]
    fn stage1_suffixes_colliding_columns() {
        let statement = set(
            "statement",
            &["PO", "Vendor Name"],
            vec![vec!["A1".into(), "Stmt Vendor".into()]],
        );
        let estimate = set(
            "estimate",
            &["PO", "Vendor Name"],
            vec![vec!["A1".into(), "Est Vendor".into()]],
        );
        let out = primary_join(&statement, &estimate, &Profile::default(), &mut ctx()).unwrap();
        assert_eq!(out.table.cell(0, "Vendor Name"), &CellValue::from("Stmt Vendor"));
        assert_eq!(out.table.cell(0, "Vendor Name_est"), &CellValue::from("Est Vendor"));
        assert!(out.attached_columns.contains(&"Vendor Name_est".to_string()));
    }

    #[test]
    fn stage1_overwrite_fields_replace() {
        let statement = set("statement", &["PO", "Vendor Name"], vec![vec!["A1".into(), "old".into()]]);
        let estimate = set("estimate", &["PO", "Vendor Name"], vec![vec!["A1".into(), "new".into()]]);
        let mut profile = Profile::default();
        profile.estimate.overwrite = vec!["Vendor Name".into()];
        let out = primary_join(&statement, &estimate, &profile, &mut ctx()).unwrap();
        assert_eq!(out.table.cell(0, "Vendor Name"), &CellValue::from("new"));
        assert!(!out.table.has_column("Vendor Name_est"));
    }

    #[test]
    fn stage1_fills_missing_roid_from_estimate() {
        let statement = set("statement", &["PO"], vec![vec!["A1".into()]]);
        let estimate = set("estimate", &["PO", "ROID"], vec![vec!["A1".into(), "R-9".into()]]);
        let out = primary_join(&statement, &estimate, &Profile::default(), &mut ctx()).unwrap();
        assert_eq!(out.table.cell(0, "ROID"), &CellValue::from("R-9"));
        assert!(!out.table.has_column("ROID_est"));
    }

    #[test]
    fn stage1_flags_duplicates_by_default() {
        let statement = set("statement", &["PO"], vec![vec!["D1".into()]]);
        let estimate = set(
            "estimate",
            &["PO", "Payable Amount"],
            vec![vec!["D1".into(), 1.0.into()], vec!["D1".into(), 2.0.into()]],
        );
        let out = primary_join(&statement, &estimate, &Profile::default(), &mut ctx()).unwrap();
        assert_eq!(out.statuses, vec![MatchStatus::DuplicateKeyInSecondary]);
        assert_eq!(out.table.cell(0, "Payable Amount"), &CellValue::Number(1.0));
        assert_eq!(out.duplicate_estimate_keys, 1);
        assert_eq!(out.duplicate_flagged, 1);
    }

    #[test]
    fn stage1_exclude_policy_sends_duplicates_to_stage2() {
        let statement = set("statement", &["PO"], vec![vec!["D1".into()]]);
        let estimate = set(
            "estimate",
            &["PO", "Payable Amount"],
            vec![vec!["D1".into(), 1.0.into()], vec!["D1".into(), 2.0.into()]],
        );
        let profile = Profile::builtin("strict-estimates").unwrap();
        let out = primary_join(&statement, &estimate, &profile, &mut ctx()).unwrap();
        assert_eq!(out.statuses, vec![MatchStatus::UnmatchedPrimary]);
        assert!(out.table.cell(0, "Payable Amount").is_empty());
    }

    #[test]
    fn stage1_counts_unresolved_keys() {
        let statement = set(
            "statement",
            &["PO", "ROID"],
            vec![vec![CellValue::Empty, CellValue::Empty], vec!["A1".into(), CellValue::Empty]],
        );
        let estimate = set("estimate", &["PO"], vec![vec!["A1".into()]]);
        let out = primary_join(&statement, &estimate, &Profile::default(), &mut ctx()).unwrap();
        assert_eq!(out.unresolved, 1);
        assert_eq!(out.statuses[0], MatchStatus::UnmatchedPrimary);
        assert!(out.table.cell(0, "CommonID").is_empty());
    }

    #[test]
    fn stage1_warns_on_missing_allow_list_columns() {
        let statement = set("statement", &["PO"], vec![vec!["A1".into()]]);
        let estimate = set("estimate", &["PO"], vec![vec!["A1".into()]]);
        let mut c = ctx();
        primary_join(&statement, &estimate, &Profile::default(), &mut c).unwrap();
        assert!(c.warnings.iter().any(|w| w.contains("'Vendor Name'")));
    }

    #[test]
    fn stage1_rejects_tables_without_keys() {
        let statement = set("statement", &["Invoice"], vec![vec!["X".into()]]);
        let estimate = set("estimate", &["PO"], vec![]);
        let err = primary_join(&statement, &estimate, &Profile::default(), &mut ctx()).unwrap_err();
        assert!(matches!(err, ReconError::MissingKeyColumns { .. }));
    }

    #[test]
    fn stage2_enriches_leftovers_and_combine_conserves_rows() {
        let statement = set(
            "statement",
            &["PO", "ROID"],
            vec![
                vec!["A1".into(), CellValue::Empty],
                vec![CellValue::Empty, "R2".into()],
                vec!["A3".into(), CellValue::Empty],
            ],
        );
        let estimate = set("estimate", &["PO", "Payable Amount"], vec![vec!["A1".into(), 90.0.into()]]);
        let enrichment = set(
            "enrichment",
            &["ROID", "Payable Amount", "Trans fee"],
            vec![vec!["R2".into(), 50.0.into(), 1.5.into()]],
        );
        let profile = Profile::default();

        let s1 = primary_join(&statement, &estimate, &profile, &mut ctx()).unwrap();
        let s2 = secondary_join(&s1, &enrichment, &profile).unwrap();
        assert_eq!(s2.table.len(), 2);
        assert_eq!(s2.statuses, vec![MatchStatus::MatchedSecondary, MatchStatus::StillUnmatched]);
        assert_eq!(s2.added_columns, vec!["Trans fee".to_string()]);

        let (table, statuses) = combine(&s1, &s2).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(
            statuses,
            vec![MatchStatus::MatchedPrimary, MatchStatus::MatchedSecondary, MatchStatus::StillUnmatched]
        );
        assert_eq!(table.cell(1, "Payable Amount"), &CellValue::Number(50.0));
        assert_eq!(table.cell(1, "Match Status"), &CellValue::from("Matched with Query result"));
        assert_eq!(table.cell(2, "Match Status"), &CellValue::from("Still Unmatched"));
    }

    #[test]
    fn stage2_with_empty_enrichment_leaves_all_still_unmatched() {
        let statement = set("statement", &["PO"], vec![vec!["A1".into()], vec!["A2".into()]]);
        let estimate = set("estimate", &["PO"], vec![]);
        let profile = Profile::default();
        let s1 = primary_join(&statement, &estimate, &profile, &mut ctx()).unwrap();
        let s2 = secondary_join(&s1, &RecordSet::default(), &profile).unwrap();
        assert_eq!(s2.still_unmatched, 2);
        assert_eq!(s2.matched, 0);
    }

    #[test]
    fn stage2_first_enrichment_row_wins() {
        let statement = set("statement", &["PO"], vec![vec!["A1".into()]]);
        let estimate = set("estimate", &["PO"], vec![]);
        let enrichment = set(
            "enrichment",
            &["PO", "Amount to pay"],
            vec![vec!["A1".into(), 10.0.into()], vec!["A1".into(), 20.0.into()]],
        );
        let profile = Profile::default();
        let s1 = primary_join(&statement, &estimate, &profile, &mut ctx()).unwrap();
        let s2 = secondary_join(&s1, &enrichment, &profile).unwrap();
        assert_eq!(s2.duplicate_enrichment_keys, 1);
        assert_eq!(s2.table.cell(0, "Amount to pay"), &CellValue::Number(10.0));
    }

    #[test]
    fn stage2_empty_values_skip_keys_but_replace_other_cells() {
        let statement = set(
            "statement",
            &["PO", "ROID", "Vendor Name"],
            vec![vec!["A1".into(), "R1".into(), "Acme".into()]],
        );
        let estimate = set("estimate", &["PO"], vec![]);
        let enrichment = set(
            "enrichment",
            &["PO", "ROID", "Vendor Name"],
            vec![vec!["A1".into(), CellValue::Empty, CellValue::Empty]],
        );
        let profile = Profile::default();
        let s1 = primary_join(&statement, &estimate, &profile, &mut ctx()).unwrap();
        let s2 = secondary_join(&s1, &enrichment, &profile).unwrap();
        assert_eq!(s2.statuses, vec![MatchStatus::MatchedSecondary]);
        assert_eq!(s2.table.cell(0, "ROID"), &CellValue::from("R1"));
        assert!(s2.table.cell(0, "Vendor Name").is_empty());
    }

    #[test]
    fn advance_rejects_backwards_moves() {
        let mut status = MatchStatus::MatchedPrimary;
        let err = advance(4, &mut status, MatchStatus::MatchedSecondary).unwrap_err();
        assert!(err.to_string().contains("row 4"));
        assert_eq!(status, MatchStatus::MatchedPrimary);
    }
}
