//! `rgrid non-ai` and `rgrid remit`: passes over an already written table.

use std::path::{Path, PathBuf};

use recongrid_recon::model::{NON_AI_SHEET, REMITTANCE_FILE_SUFFIX, REMITTANCE_SHEET};
use recongrid_recon::postprocess::{merge_remittance, non_ai_check, REMITTANCE_COLUMNS, REMITTANCE_KEY};
use recongrid_recon::ReconError;

use crate::{load_table, save_table, CliError};

pub fn cmd_non_ai(
    input: PathBuf,
    reference: PathBuf,
    po_column: String,
    output: PathBuf,
) -> Result<(), CliError> {
    let mut table = load_table(&input, "input")?;
    let reference = load_table(&reference, "reference")?;

    let marked = non_ai_check(&mut table, &reference, &po_column)?;
    save_table(&table, &output, NON_AI_SHEET)?;

    eprintln!("wrote {}", output.display());
    eprintln!("non-AI check: {marked} of {} row(s) matched", table.len());
    Ok(())
}

pub fn cmd_remit(
    input: PathBuf,
    remittance: PathBuf,
    po_column: String,
    output: Option<PathBuf>,
) -> Result<(), CliError> {
    let table = load_table(&input, "input")?;
    let remit = load_table(&remittance, "remittance")?;

    let (merged, outcome) = merge_remittance(&table, &remit, &po_column).map_err(|e| {
        let missing_remit = matches!(&e, ReconError::MissingColumns { .. });
        let err = CliError::from(e);
        if missing_remit {
            err.with_hint(format!(
                "remittance needs {} and {}",
                REMITTANCE_KEY,
                REMITTANCE_COLUMNS.join(", ")
            ))
        } else {
            err
        }
    })?;

    let output = output.unwrap_or_else(|| remittance_output_path(&input));
    save_table(&merged, &output, REMITTANCE_SHEET)?;

    eprintln!("wrote {}", output.display());
    eprintln!(
        "remittance: {} of {} row(s) matched, {} duplicate remittance key(s) ignored",
        outcome.matched,
        merged.len(),
        outcome.duplicate_keys
    );
    Ok(())
}

/// `dir/June_Final_Processed_x.xlsx` -> `dir/June_Final_Processed_x_With_Remittance.xlsx`
fn remittance_output_path(input: &Path) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "Remittance_Merged".to_string());
    input.with_file_name(format!("{stem}{REMITTANCE_FILE_SUFFIX}.xlsx"))
}
