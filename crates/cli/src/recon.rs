//! `rgrid recon`: profile-driven statement reconciliation.

use std::path::{Path, PathBuf};

use clap::{Args, Subcommand, ValueEnum};
use recongrid_recon::key::check_key_columns;
use recongrid_recon::model::{
    FINAL_SHEET, INITIAL_SHEET, REMITTANCE_FILE_SUFFIX, REMITTANCE_SHEET,
};
use recongrid_recon::postprocess::{merge_remittance, non_ai_check};
use recongrid_recon::{DuplicatePolicy, Profile, ReconInput, ReconOutput, RunContext};

use crate::exit_codes::EXIT_RECON_UNMATCHED;
use crate::{load_profile, load_table, save_table, CliError};

#[derive(Subcommand)]
pub enum ReconCommands {
    /// Join a statement against estimates, then enrich the rest from a query export
    #[command(after_help = "\
Writes Initial_Merged_Statement_Estimates.xlsx and
<statement stem>_Final_Processed_<YYYYmmdd_HHMM>.xlsx into --output-dir.

Exit code 63 means --strict was given and some rows are still unmatched.

Examples:
  rgrid recon run --statement june.xlsx --estimate estimates.xlsx --query query.xlsx
  rgrid recon run --statement june.csv --estimate est.csv --rebate 10 --json
  rgrid recon run --statement june.xlsx --estimate est.xlsx --profile west.toml --strict
  rgrid recon run --statement june.xlsx --estimate est.xlsx --remittance remit.xlsx")]
    Run(RunArgs),

    /// Validate a profile (and optionally input headers) without running
    #[command(after_help = "\
Examples:
  rgrid recon validate --profile west.toml
  rgrid recon validate --profile strict-estimates --statement june.xlsx --estimate est.xlsx")]
    Validate {
        /// Profile name or .toml path
        #[arg(long, default_value = "statement")]
        profile: String,

        /// Statement file to check for key columns
        #[arg(long)]
        statement: Option<PathBuf>,

        /// Estimate file to check for key columns
        #[arg(long)]
        estimate: Option<PathBuf>,
    },
}

#[derive(Args)]
pub struct RunArgs {
    /// Vendor statement (primary table)
    #[arg(long)]
    statement: PathBuf,

    /// Internal estimates
    #[arg(long)]
    estimate: PathBuf,

    /// Query export used to enrich rows the estimates miss
    #[arg(long)]
    query: Option<PathBuf>,

    /// Scraper output keyed by record id, overlaid on the query export
    #[arg(long)]
    scraper: Option<PathBuf>,

    /// Profile name (statement, strict-estimates) or .toml path
    #[arg(long, default_value = "statement", env = "RGRID_PROFILE")]
    profile: String,

    /// Rebate percentage (0-100), overrides the profile
    #[arg(long)]
    rebate: Option<f64>,

    /// Duplicate estimate key policy, overrides the profile
    #[arg(long)]
    duplicates: Option<DuplicatesArg>,

    /// Directory for output workbooks
    #[arg(long, short = 'o', default_value = ".")]
    output_dir: PathBuf,

    /// Non-AI reference file; adds a `Non AI check` column to the final table
    #[arg(long)]
    non_ai: Option<PathBuf>,

    /// Remittance export; also writes <final>_With_Remittance.xlsx
    #[arg(long)]
    remittance: Option<PathBuf>,

    /// Print the run report as JSON to stdout
    #[arg(long)]
    json: bool,

    /// Write the run report as JSON to this file
    #[arg(long)]
    summary: Option<PathBuf>,

    /// Exit 63 when rows remain Still Unmatched
    #[arg(long)]
    strict: bool,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum DuplicatesArg {
    /// Attach the first estimate row and tag the row as duplicated
    Flag,
    /// Leave duplicated keys for the enrichment stage
    Exclude,
}

impl From<DuplicatesArg> for DuplicatePolicy {
    fn from(arg: DuplicatesArg) -> Self {
        match arg {
            DuplicatesArg::Flag => DuplicatePolicy::Flag,
            DuplicatesArg::Exclude => DuplicatePolicy::Exclude,
        }
    }
}

pub fn cmd_recon(cmd: ReconCommands) -> Result<(), CliError> {
    match cmd {
        ReconCommands::Run(args) => cmd_recon_run(args),
        ReconCommands::Validate { profile, statement, estimate } => {
            cmd_recon_validate(&profile, statement.as_deref(), estimate.as_deref())
        }
    }
}

fn cmd_recon_run(args: RunArgs) -> Result<(), CliError> {
    let mut profile = load_profile(&args.profile)?;
    if let Some(rate) = args.rebate {
        profile.financial.rebate_percent = rate;
    }
    if let Some(policy) = args.duplicates {
        profile.estimate.duplicates = policy.into();
    }

    let input = ReconInput {
        statement: load_table(&args.statement, "statement")?,
        estimate: load_table(&args.estimate, "estimate")?,
        query: args.query.as_deref().map(|p| load_table(p, "query")).transpose()?,
        scraper: args.scraper.as_deref().map(|p| load_table(p, "scraper")).transpose()?,
    };
    let non_ai = args.non_ai.as_deref().map(|p| load_table(p, "non-AI reference")).transpose()?;
    let remittance = args.remittance.as_deref().map(|p| load_table(p, "remittance")).transpose()?;

    let mut ctx = RunContext::new(&args.output_dir, Some(args.statement.as_path()));
    let mut out = recongrid_recon::run(&profile, &input, &mut ctx)?;

    let po_column = profile.keys.primary.as_str();
    if let Some(reference) = &non_ai {
        let marked = non_ai_check(&mut out.final_table, reference, po_column)?;
        eprintln!("non-AI check: {marked} row(s) matched");
    }

    // Every table-level check runs before the first workbook is written.
    let remitted = remittance
        .as_ref()
        .map(|remit| merge_remittance(&out.final_table, remit, po_column))
        .transpose()?;

    save_table(&out.initial, &ctx.initial_output_path(), INITIAL_SHEET)?;
    let final_path = ctx.final_output_path();
    save_table(&out.final_table, &final_path, FINAL_SHEET)?;
    eprintln!("wrote {}", ctx.initial_output_path().display());
    eprintln!("wrote {}", final_path.display());

    if let Some((merged, outcome)) = &remitted {
        let path = ctx.derived_output_path(REMITTANCE_FILE_SUFFIX);
        save_table(merged, &path, REMITTANCE_SHEET)?;
        eprintln!(
            "wrote {} ({} row(s) matched, {} duplicate remittance key(s))",
            path.display(),
            outcome.matched,
            outcome.duplicate_keys
        );
    }

    write_report(&out, args.json, args.summary.as_deref())?;
    print_summary(&profile, &out);

    if args.strict && out.summary.still_unmatched > 0 {
        return Err(CliError::new(
            EXIT_RECON_UNMATCHED,
            format!("{} row(s) still unmatched", out.summary.still_unmatched),
        ));
    }
    Ok(())
}

fn write_report(out: &ReconOutput, json: bool, summary: Option<&Path>) -> Result<(), CliError> {
    if !json && summary.is_none() {
        return Ok(());
    }
    let json_str = serde_json::to_string_pretty(&out.report())
        .map_err(|e| CliError::io(format!("JSON serialization error: {e}")))?;

    if let Some(path) = summary {
        std::fs::write(path, &json_str)
            .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))?;
        eprintln!("wrote {}", path.display());
    }
    if json {
        println!("{json_str}");
    }
    Ok(())
}

/// Human summary to stderr.
fn print_summary(profile: &Profile, out: &ReconOutput) {
    let s = &out.summary;
    eprintln!(
        "recon '{}': {} row(s): {} matched with estimates, {} duplicated, {} matched with query, {} still unmatched",
        profile.name,
        s.total_rows,
        s.matched_primary,
        s.duplicate_flagged,
        s.matched_secondary,
        s.still_unmatched,
    );
    if s.unresolved_keys > 0 {
        eprintln!("unresolved keys: {} row(s) had neither {} nor {}", s.unresolved_keys, profile.keys.primary, profile.keys.fallback);
    }
    let skipped = &s.skipped;
    if skipped.financial_parse + skipped.dispute_parse + skipped.date_parse > 0 {
        eprintln!(
            "skipped: {} financial, {} dispute, {} date parse failure(s)",
            skipped.financial_parse, skipped.dispute_parse, skipped.date_parse
        );
    }
    for warning in &s.warnings {
        eprintln!("warning: {warning}");
    }
}

fn cmd_recon_validate(
    profile_arg: &str,
    statement: Option<&Path>,
    estimate: Option<&Path>,
) -> Result<(), CliError> {
    let profile = load_profile(profile_arg)?;
    profile.validate()?;

    for (path, role) in [(statement, "statement"), (estimate, "estimate")] {
        if let Some(path) = path {
            let table = load_table(path, role)?;
            check_key_columns(&table, &profile.keys)?;
            eprintln!("{role}: {} row(s), key columns present", table.len());
        }
    }

    eprintln!(
        "valid: profile '{}' (duplicates: {}, rebate {}%, {} estimate column(s))",
        profile.name,
        profile.estimate.duplicates,
        profile.financial.rebate_percent,
        profile.estimate.columns.len(),
    );
    Ok(())
}
