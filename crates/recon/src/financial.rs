//! Tax, rebate and dispute arithmetic. Money is integer cents throughout;
//! cells are written back in currency units.

use recongrid_core::money::{cell_cents, cents_to_f64, div_round, format_basis_points};
use recongrid_core::{CellValue, RecordSet};
use serde::Serialize;

use crate::config::{DisputeConfig, FinancialConfig, Profile};
use crate::dates::USED_FALLBACK_COLUMN;
use crate::enrich::apply_renames;
use crate::error::ReconError;

pub const TAX_COLUMN: &str = "Tax";
pub const REBATE_COLUMN: &str = "Rebate";
pub const REBATE_PERCENT_COLUMN: &str = "Rebate %";
pub const AMOUNT_TO_PAY_COLUMN: &str = "Amount to Pay";

/// Calculator output names → canonical names.
const CALCULATOR_RENAMES: [(&str, &str); 4] = [
    (TAX_COLUMN, "Tax Total"),
    (REBATE_COLUMN, "Rebate AI"),
    (REBATE_PERCENT_COLUMN, "Rebate%"),
    (AMOUNT_TO_PAY_COLUMN, "Amount to pay"),
];

/// Canonical columns added blank when a query export lacks them.
const BLANK_IF_ABSENT: [&str; 2] = ["AI trans Fee", "FMC Rebate"];

// ---------------------------------------------------------------------------
// Rate
// ---------------------------------------------------------------------------

/// Rebate rate held as percent × 10_000, so 2.5% is 25_000.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RebateRate {
    micro_percent: i64,
}

impl RebateRate {
    pub fn from_percent(percent: f64) -> Result<Self, ReconError> {
        if !percent.is_finite() || !(0.0..=100.0).contains(&percent) {
            return Err(ReconError::InvalidRebateRate(percent));
        }
        Ok(Self {
            micro_percent: (percent * 10_000.0).round() as i64,
        })
    }

    pub fn percent(&self) -> f64 {
        self.micro_percent as f64 / 10_000.0
    }
}

// ---------------------------------------------------------------------------
// Adjustment
// ---------------------------------------------------------------------------

/// Derived amounts for one row, all in cents. `rebate_percent_bp` is in
/// hundredths of a percent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FinancialAdjustment {
    pub subtotal_cents: i64,
    pub total_cents: i64,
    pub payable_cents: i64,
    pub tax_cents: i64,
    pub rebate_cents: i64,
    pub rebate_percent_bp: i64,
    pub amount_to_pay_cents: i64,
}

impl FinancialAdjustment {
    /// `None` when an intermediate amount leaves the `i64` cent range.
    ///
    /// `Rebate %` is `Rebate / SubTotal` taken before the rebate is rounded to
    /// cents, so it is always `-rate` (or zero for a zero subtotal).
    pub fn compute(
        subtotal_cents: i64,
        total_cents: i64,
        payable_cents: i64,
        rate: RebateRate,
    ) -> Option<Self> {
        let tax_cents = total_cents.checked_sub(subtotal_cents)?;
        let rebate_cents = div_round(
            subtotal_cents as i128 * rate.micro_percent as i128,
            1_000_000,
        )
        .checked_neg()?;
        let rebate_percent_bp = if subtotal_cents == 0 {
            0
        } else {
            -div_round(rate.micro_percent as i128, 100)
        };
        Some(Self {
            subtotal_cents,
            total_cents,
            payable_cents,
            tax_cents,
            rebate_cents,
            rebate_percent_bp,
            amount_to_pay_cents: payable_cents.checked_add(rebate_cents)?,
        })
    }

    /// `"-10.00%"`
    pub fn rebate_percent_display(&self) -> String {
        format_basis_points(self.rebate_percent_bp)
    }
}

// ---------------------------------------------------------------------------
// Calculator
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CalculatorOutput {
    /// Rows that parsed, with `Tax`, `Rebate`, `Rebate %` and `Amount to Pay`.
    pub table: RecordSet,
    pub adjustments: Vec<FinancialAdjustment>,
    /// Input positions of rows that failed to parse.
    pub dropped_rows: Vec<usize>,
    pub total_rebate_cents: i64,
    pub total_amount_to_pay_cents: i64,
}

/// Apply the tax and rebate calculation to every row of `input`.
///
/// Rows whose three source amounts do not all parse are dropped and listed
/// in `dropped_rows`; they are never treated as zero.
pub fn calculate(
    input: &RecordSet,
    cfg: &FinancialConfig,
    rate: RebateRate,
) -> Result<CalculatorOutput, ReconError> {
    let missing: Vec<String> = cfg
        .source_columns()
        .iter()
        .filter(|c| !input.has_column(c))
        .map(|c| c.to_string())
        .collect();
    match missing.len() {
        0 => {}
        1 => {
            return Err(ReconError::MissingColumn {
                table: input.name().to_string(),
                column: missing[0].clone(),
            })
        }
        _ => {
            return Err(ReconError::MissingColumns {
                table: input.name().to_string(),
                columns: missing,
            })
        }
    }

    let mut table = RecordSet::new(input.name(), input.columns().to_vec());
    for col in [TAX_COLUMN, REBATE_COLUMN, REBATE_PERCENT_COLUMN, AMOUNT_TO_PAY_COLUMN] {
        table.add_column(col);
    }

    let mut adjustments = Vec::new();
    let mut dropped_rows = Vec::new();

    for (i, row) in input.rows().iter().enumerate() {
        let parsed = (
            cell_cents(row.get(&cfg.subtotal)),
            cell_cents(row.get(&cfg.total)),
            cell_cents(row.get(&cfg.payable)),
        );
        let (Some(subtotal), Some(total), Some(payable)) = parsed else {
            log::debug!("row {i}: amounts do not parse, dropped from calculation");
            dropped_rows.push(i);
            continue;
        };

        let Some(adj) = FinancialAdjustment::compute(subtotal, total, payable, rate) else {
            log::debug!("row {i}: amounts out of range, dropped from calculation");
            dropped_rows.push(i);
            continue;
        };
        let mut record = row.clone();
        record.set(cfg.subtotal.clone(), cents_to_f64(subtotal));
        record.set(cfg.total.clone(), cents_to_f64(total));
        record.set(cfg.payable.clone(), cents_to_f64(payable));
        record.set(TAX_COLUMN, cents_to_f64(adj.tax_cents));
        record.set(REBATE_COLUMN, cents_to_f64(adj.rebate_cents));
        record.set(REBATE_PERCENT_COLUMN, adj.rebate_percent_display());
        record.set(AMOUNT_TO_PAY_COLUMN, cents_to_f64(adj.amount_to_pay_cents));
        table.push(record);
        adjustments.push(adj);
    }

    if !dropped_rows.is_empty() {
        log::warn!(
            "{}: {} row(s) dropped, amounts could not be parsed",
            input.name(),
            dropped_rows.len()
        );
    }

    Ok(CalculatorOutput {
        table,
        total_rebate_cents: adjustments.iter().fold(0, |acc: i64, a| acc.saturating_add(a.rebate_cents)),
        total_amount_to_pay_cents: adjustments
            .iter()
            .fold(0, |acc: i64, a| acc.saturating_add(a.amount_to_pay_cents)),
        adjustments,
        dropped_rows,
    })
}

/// Rename calculator output into the canonical vocabulary, add the blank
/// fee columns and project onto the canonical column list.
pub fn to_canonical(calculated: &RecordSet, profile: &Profile) -> RecordSet {
    let mut set = calculated.clone();
    for (from, to) in CALCULATOR_RENAMES {
        set.rename_column(from, to);
    }
    apply_renames(&mut set, &profile.enrichment.rename);
    for col in BLANK_IF_ABSENT {
        if !set.has_column(col) {
            set.add_column(col);
            for row in set.rows_mut() {
                row.set(col, CellValue::Empty);
            }
        }
    }

    let mut order = profile.estimate.columns.clone();
    order.push(USED_FALLBACK_COLUMN.to_string());
    set.select(&order)
}

// ---------------------------------------------------------------------------
// Disputes
// ---------------------------------------------------------------------------

/// `Disputed amount = Statement amount - Amount to pay`.
///
/// Returns `None` when either source column is missing, otherwise the number
/// of rows whose non-empty inputs did not parse or overflowed.
pub fn apply_disputes(table: &mut RecordSet, cfg: &DisputeConfig) -> Option<usize> {
    binary_column(table, &cfg.statement_amount, &cfg.amount_to_pay, &cfg.disputed, i64::checked_sub)
}

/// `Dispute analysis = Rebate AI + Disputed amount`.
pub fn apply_dispute_analysis(table: &mut RecordSet, cfg: &DisputeConfig) -> Option<usize> {
    binary_column(table, &cfg.rebate, &cfg.disputed, &cfg.analysis, i64::checked_add)
}

fn binary_column(
    table: &mut RecordSet,
    left: &str,
    right: &str,
    out: &str,
    op: impl Fn(i64, i64) -> Option<i64>,
) -> Option<usize> {
    if !table.has_column(left) || !table.has_column(right) {
        return None;
    }
    table.add_column(out);

    let mut skipped = 0;
    for row in table.rows_mut() {
        let (l, r) = (row.get(left), row.get(right));
        let value = match (cell_cents(l), cell_cents(r)) {
            (Some(a), Some(b)) => match op(a, b) {
                Some(cents) => CellValue::Number(cents_to_f64(cents)),
                None => {
                    skipped += 1;
                    CellValue::Empty
                }
            },
            _ => {
                if !l.is_empty() && !r.is_empty() {
                    skipped += 1;
                }
                CellValue::Empty
            }
        };
        row.set(out, value);
    }
    Some(skipped)
}
