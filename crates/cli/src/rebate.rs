//! `rgrid rebate`: standalone tax and rebate calculator.

use std::path::PathBuf;

use recongrid_core::money::cents_to_f64;
use recongrid_recon::financial::{calculate, RebateRate};
use recongrid_recon::model::CALCULATOR_SHEET;
use serde::Serialize;

use crate::{load_profile, load_table, save_table, CliError};

#[derive(Serialize)]
struct RebateReport {
    input: String,
    output: String,
    rebate_percent: f64,
    rows: usize,
    dropped_rows: Vec<usize>,
    total_rebate: f64,
    total_amount_to_pay: f64,
}

pub fn cmd_rebate(
    input: PathBuf,
    rebate: Option<f64>,
    profile: String,
    output: PathBuf,
    json: bool,
) -> Result<(), CliError> {
    let profile = load_profile(&profile)?;
    let rate = RebateRate::from_percent(rebate.unwrap_or(profile.financial.rebate_percent))?;
    let table = load_table(&input, "input")?;

    let calc = calculate(&table, &profile.financial, rate)?;
    save_table(&calc.table, &output, CALCULATOR_SHEET)?;

    let report = RebateReport {
        input: input.display().to_string(),
        output: output.display().to_string(),
        rebate_percent: rate.percent(),
        rows: calc.table.len(),
        dropped_rows: calc.dropped_rows.clone(),
        total_rebate: cents_to_f64(calc.total_rebate_cents),
        total_amount_to_pay: cents_to_f64(calc.total_amount_to_pay_cents),
    };

    if json {
        let json_str = serde_json::to_string_pretty(&report)
            .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;
        println!("{json_str}");
    }

    eprintln!("wrote {}", output.display());
    eprintln!(
        "rebate {}%: {} row(s), {} dropped, rebate {:.2}, amount to pay {:.2}",
        report.rebate_percent,
        report.rows,
        report.dropped_rows.len(),
        report.total_rebate,
        report.total_amount_to_pay,
    );
    Ok(())
}
