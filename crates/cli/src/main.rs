// RecoGrid CLI - statement vs estimate reconciliation, headless

mod exit_codes;
mod postprocess;
mod rebate;
mod recon;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use recongrid_core::RecordSet;
use recongrid_io::IoError;
use recongrid_recon::model::CALCULATOR_OUTPUT_FILE;
use recongrid_recon::ReconError;
use tracing_subscriber::EnvFilter;

use exit_codes::{io_exit_code, recon_exit_code, EXIT_RECON_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "rgrid")]
#[command(about = "Reconcile vendor statements against estimates and enrichment exports")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug). RGRID_LOG overrides.
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Two-stage statement reconciliation
    Recon {
        #[command(subcommand)]
        command: recon::ReconCommands,
    },

    /// Tax and rebate calculation on an enrichment export
    #[command(after_help = "\
Reads `SubTotal (exc. Tax)`, `Total (inc. Tax)` and `Payable Amount (inc. Tax)`
and appends Tax, Rebate, Rebate % and Amount to Pay. Rows whose amounts do not
parse are dropped and counted.

Examples:
  rgrid rebate query_export.xlsx --rebate 10
  rgrid rebate query_export.csv --rebate 7.5 --output out/updated_calculations.xlsx --json")]
    Rebate {
        /// Input table (.xlsx, .csv, ...)
        input: PathBuf,

        /// Rebate percentage (0-100), overrides the profile
        #[arg(long)]
        rebate: Option<f64>,

        /// Profile name or .toml path (column names)
        #[arg(long, default_value = "statement")]
        profile: String,

        /// Output file
        #[arg(long, short = 'o', default_value = CALCULATOR_OUTPUT_FILE)]
        output: PathBuf,

        /// Print totals as JSON to stdout
        #[arg(long)]
        json: bool,
    },

    /// Mark statement rows whose PO appears in a non-AI reference file
    #[command(name = "non-ai", after_help = "\
Examples:
  rgrid non-ai statement.xlsx --reference non_ai.xlsx
  rgrid non-ai final.xlsx --reference non_ai.csv --output checked.xlsx")]
    NonAi {
        /// Statement or final processed table
        input: PathBuf,

        /// Reference table with a PO column
        #[arg(long)]
        reference: PathBuf,

        /// PO column name
        #[arg(long, default_value = "PO")]
        po_column: String,

        /// Output file
        #[arg(long, short = 'o', default_value = "PO_Match_Result.xlsx")]
        output: PathBuf,
    },

    /// Left-join a remittance export onto a final processed table by PO
    #[command(after_help = "\
The remittance file needs shop_order_id, aid_amount, paid_date,
disputed_amount, disputed_date, dispute_reason and payment_details.

Examples:
  rgrid remit June_Final_Processed_20250601_0930.xlsx --remittance remit.xlsx")]
    Remit {
        /// Final processed table
        input: PathBuf,

        /// Remittance table
        #[arg(long)]
        remittance: PathBuf,

        /// PO column name
        #[arg(long, default_value = "PO")]
        po_column: String,

        /// Output file (default: <input stem>_With_Remittance.xlsx beside the input)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },
}

fn long_version() -> &'static str {
    if cfg!(debug_assertions) {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  recongrid-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   debug",
            "\ntarget:  ", env!("TARGET"),
        )
    } else {
        concat!(
            env!("CARGO_PKG_VERSION"),
            " (", env!("GIT_COMMIT_HASH"), ")",
            "\nengine:  recongrid-recon ", env!("CARGO_PKG_VERSION"),
            "\nbuild:   release",
            "\ntarget:  ", env!("TARGET"),
        )
    }
}

/// Install the stderr subscriber. `log` records from the library crates are
/// forwarded through tracing-log.
fn init_logging(verbose: u8) {
    let default = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter = EnvFilter::try_from_env("RGRID_LOG").unwrap_or_else(|_| EnvFilter::new(default));
    // A second init (tests) is harmless.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        None => {
            // No subcommand = show help
            eprintln!("Usage: rgrid <command> [options]");
            eprintln!("       rgrid --help for more information");
            Ok(())
        }
        Some(Commands::Recon { command }) => recon::cmd_recon(command),
        Some(Commands::Rebate { input, rebate, profile, output, json }) => {
            rebate::cmd_rebate(input, rebate, profile, output, json)
        }
        Some(Commands::NonAi { input, reference, po_column, output }) => {
            postprocess::cmd_non_ai(input, reference, po_column, output)
        }
        Some(Commands::Remit { input, remittance, po_column, output }) => {
            postprocess::cmd_remit(input, remittance, po_column, output)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn new(code: u8, msg: impl Into<String>) -> Self {
        Self { code, message: msg.into(), hint: None }
    }

    pub fn args(msg: impl Into<String>) -> Self {
        Self::new(EXIT_USAGE, msg)
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self::new(EXIT_RECON_IO, msg)
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        let code = recon_exit_code(&err);
        let hint = match &err {
            ReconError::MissingKeyColumns { .. } => {
                Some("check the header row, or set [keys] in a profile".to_string())
            }
            ReconError::UnknownProfile(_) => {
                Some("pass a built-in name or a path ending in .toml".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}

impl From<IoError> for CliError {
    fn from(err: IoError) -> Self {
        let code = io_exit_code(&err);
        let hint = match &err {
            IoError::UnsupportedFormat(_) => {
                Some("inputs: .xlsx .xlsm .xls .xlsb .ods .csv .tsv .txt; outputs: .xlsx .csv .tsv".to_string())
            }
            _ => None,
        };
        Self { code, message: err.to_string(), hint }
    }
}

// ============================================================================
// Shared helpers
// ============================================================================

/// Read one input table, failing with a usage error when the file is absent.
pub(crate) fn load_table(path: &Path, role: &str) -> Result<RecordSet, CliError> {
    if !path.exists() {
        return Err(CliError::args(format!("{role} file not found: {}", path.display())));
    }
    Ok(recongrid_io::read_table(path, None)?)
}

pub(crate) fn save_table(set: &RecordSet, path: &Path, sheet: &str) -> Result<(), CliError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir)
            .map_err(|e| CliError::io(format!("cannot create {}: {e}", dir.display())))?;
    }
    recongrid_io::write_table(set, path, sheet)?;
    tracing::info!(path = %path.display(), rows = set.len(), "wrote table");
    Ok(())
}

/// Resolve `--profile`: a path ending in `.toml` is loaded from disk,
/// anything else names a built-in profile.
pub(crate) fn load_profile(arg: &str) -> Result<recongrid_recon::Profile, CliError> {
    let path = Path::new(arg);
    let is_file = path
        .extension()
        .map(|e| e.eq_ignore_ascii_case("toml"))
        .unwrap_or(false);
    if !is_file {
        return Ok(recongrid_recon::Profile::builtin(arg)?);
    }
    let text = std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read profile {}: {e}", path.display())))?;
    Ok(recongrid_recon::Profile::from_toml(&text)?)
}
