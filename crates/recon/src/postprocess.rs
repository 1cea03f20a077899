//! Passes that run on a finished table: the non-AI PO check and the
//! remittance merge.

use std::collections::{HashMap, HashSet};

use recongrid_core::{CellValue, RecordSet};

use crate::error::ReconError;

pub const NON_AI_COLUMN: &str = "Non AI check";
pub const NON_AI_MATCH: &str = "Matched with Non-AI";

pub const REMITTANCE_KEY: &str = "shop_order_id";
pub const REMITTANCE_COLUMNS: [&str; 6] = [
    "aid_amount",
    "paid_date",
    "disputed_amount",
    "disputed_date",
    "dispute_reason",
    "payment_details",
];
const REMITTANCE_SUFFIX: &str = "_remit";

fn require_column(set: &RecordSet, column: &str) -> Result<(), ReconError> {
    if set.has_column(column) {
        Ok(())
    } else {
        Err(ReconError::MissingColumn {
            table: set.name().to_string(),
            column: column.to_string(),
        })
    }
}

/// Mark rows whose PO appears in a non-AI reference list. Returns the
/// number of rows marked.
pub fn non_ai_check(table: &mut RecordSet, reference: &RecordSet, po_column: &str) -> Result<usize, ReconError> {
    require_column(table, po_column)?;
    require_column(reference, po_column)?;

    let known: HashSet<String> = reference
        .rows()
        .iter()
        .map(|r| r.text(po_column))
        .filter(|po| !po.is_empty())
        .collect();

    table.add_column(NON_AI_COLUMN);
    let mut marked = 0;
    for row in table.rows_mut() {
        let po = row.text(po_column);
        if !po.is_empty() && known.contains(&po) {
            row.set(NON_AI_COLUMN, NON_AI_MATCH);
            marked += 1;
        } else {
            row.set(NON_AI_COLUMN, CellValue::Empty);
        }
    }
    log::info!("non-AI check: {marked} of {} row(s) matched", table.len());
    Ok(marked)
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemittanceOutcome {
    pub matched: usize,
    pub duplicate_keys: usize,
}

/// Left-join a remittance export onto the table by PO (`shop_order_id` on
/// the remittance side). The first remittance row per PO wins.
pub fn merge_remittance(
    table: &RecordSet,
    remittance: &RecordSet,
    po_column: &str,
) -> Result<(RecordSet, RemittanceOutcome), ReconError> {
    require_column(table, po_column)?;
    let missing: Vec<String> = REMITTANCE_COLUMNS
        .iter()
        .chain(std::iter::once(&REMITTANCE_KEY))
        .filter(|c| !remittance.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(ReconError::MissingColumns {
            table: remittance.name().to_string(),
            columns: missing,
        });
    }

    let mut lookup: HashMap<String, usize> = HashMap::new();
    let mut outcome = RemittanceOutcome::default();
    for (i, row) in remittance.rows().iter().enumerate() {
        let po = row.text(REMITTANCE_KEY);
        if po.is_empty() {
            continue;
        }
        if lookup.contains_key(&po) {
            outcome.duplicate_keys += 1;
        } else {
            lookup.insert(po, i);
        }
    }

    // (remittance column, output column)
    let carried: Vec<(&String, String)> = remittance
        .columns()
        .iter()
        .filter(|c| c.as_str() != REMITTANCE_KEY && c.as_str() != po_column)
        .map(|c| {
            let out = if table.has_column(c) {
                format!("{c}{REMITTANCE_SUFFIX}")
            } else {
                c.clone()
            };
            (c, out)
        })
        .collect();

    let mut merged = table.clone();
    for (_, out) in &carried {
        merged.add_column(out.clone());
    }

    for row in merged.rows_mut() {
        let hit = lookup.get(&row.text(po_column)).map(|&i| &remittance.rows()[i]);
        if hit.is_some() {
            outcome.matched += 1;
        }
        for (col, out) in &carried {
            let value = hit.map(|r| r.get(col).clone()).unwrap_or_default();
            row.set(out.clone(), value);
        }
    }

    if outcome.duplicate_keys > 0 {
        log::warn!(
            "{}: {} duplicate {REMITTANCE_KEY} value(s), first row used",
            remittance.name(),
            outcome.duplicate_keys
        );
    }
    log::info!("remittance merge: {} of {} row(s) matched", outcome.matched, merged.len());
    Ok((merged, outcome))
}

#[cfg(test)]
mod tests {
    use super::*;
    use recongrid_core::Record;

    fn table(name: &str, cols: &[&str], rows: Vec<Vec<CellValue>>) -> RecordSet {
        let columns: Vec<String> = cols.iter().map(|c| c.to_string()).collect();
        let rows = rows
            .into_iter()
            .map(|vals| Record::from_pairs(columns.iter().cloned().zip(vals)))
            .collect();
        RecordSet::with_rows(name, columns, rows)
    }

    #[test]
    fn non_ai_marks_known_pos() {
        let mut final_table = table(
            "final",
            &["PO"],
            vec![vec![CellValue::Number(1001.0)], vec!["1002 ".into()], vec![CellValue::Empty]],
        );
        let reference = table("non_ai", &["PO"], vec![vec!["1001".into()], vec![CellValue::Empty]]);
        let marked = non_ai_check(&mut final_table, &reference, "PO").unwrap();
        assert_eq!(marked, 1);
        assert_eq!(final_table.cell(0, NON_AI_COLUMN), &CellValue::from(NON_AI_MATCH));
        assert!(final_table.cell(1, NON_AI_COLUMN).is_empty());
        assert!(final_table.cell(2, NON_AI_COLUMN).is_empty());
    }

    #[test]
    fn non_ai_requires_po_on_both_sides() {
        let mut final_table = table("final", &["PO"], vec![]);
        let reference = table("non_ai", &["Order"], vec![]);
        let err = non_ai_check(&mut final_table, &reference, "PO").unwrap_err();
        assert!(err.to_string().contains("table 'non_ai'"));
    }

    fn remittance() -> RecordSet {
        let cols = [
            "shop_order_id", "aid_amount", "paid_date", "disputed_amount",
            "disputed_date", "dispute_reason", "payment_details",
        ];
        table(
            "remittance",
            &cols,
            vec![
                ["1001", "90", "2025-05-01", "0", "", "", "ACH 1"].map(CellValue::from).to_vec(),
                ["1001", "91", "2025-05-02", "0", "", "", "ACH 2"].map(CellValue::from).to_vec(),
            ],
        )
    }

    #[test]
    fn remittance_merges_first_row_per_po() {
        let final_table = table(
            "final",
            &["PO", "payment_details"],
            vec![vec!["1001".into(), "stmt note".into()], vec!["2002".into(), CellValue::Empty]],
        );
        let (merged, outcome) = merge_remittance(&final_table, &remittance(), "PO").unwrap();
        assert_eq!(outcome.matched, 1);
        assert_eq!(outcome.duplicate_keys, 1);
        assert_eq!(merged.cell(0, "aid_amount"), &CellValue::from("90"));
        assert_eq!(merged.cell(0, "payment_details"), &CellValue::from("stmt note"));
        assert_eq!(merged.cell(0, "payment_details_remit"), &CellValue::from("ACH 1"));
        assert!(merged.cell(1, "aid_amount").is_empty());
        assert!(!merged.has_column("shop_order_id"));
    }

    #[test]
    fn remittance_lists_every_missing_column() {
        let final_table = table("final", &["PO"], vec![]);
        let remit = table("remittance", &["shop_order_id", "aid_amount"], vec![]);
        let err = merge_remittance(&final_table, &remit, "PO").unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("paid_date"));
        assert!(msg.contains("payment_details"));
        assert!(!msg.contains("aid_amount,"));
    }
}
