//! CLI Exit Code Registry
//!
//! This is the single source of truth for all `rgrid` exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                              |
//! |---------|-----------|------------------------------------------|
//! | 0       | Universal | Success                                  |
//! | 1       | Universal | General error (unspecified)              |
//! | 2       | Universal | CLI usage error (bad args, unknown file) |
//! | 60-69   | recon     | Reconciliation run codes                 |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into `recon_exit_code` / `io_exit_code` or the command

use recongrid_io::IoError;
use recongrid_recon::ReconError;

// =============================================================================
// Universal (0-2)
// =============================================================================

/// Success - command completed without errors.
pub const EXIT_SUCCESS: u8 = 0;

/// General error - unspecified failure.
/// Avoid using this; prefer a specific error code.
pub const EXIT_ERROR: u8 = 1;

/// Usage error - bad arguments, unsupported file type.
pub const EXIT_USAGE: u8 = 2;

// =============================================================================
// Recon (60-69)
// =============================================================================

/// Profile could not be parsed or failed validation (includes rebate rate).
pub const EXIT_RECON_INVALID_PROFILE: u8 = 60;

/// A required key, numeric or remittance column is absent from an input.
pub const EXIT_RECON_MISSING_COLUMN: u8 = 61;

/// An input could not be read or an output could not be written.
pub const EXIT_RECON_IO: u8 = 62;

/// `--strict` was given and the run left rows Still Unmatched.
pub const EXIT_RECON_UNMATCHED: u8 = 63;

/// Map a recon engine error to its exit code.
pub fn recon_exit_code(err: &ReconError) -> u8 {
    match err {
        ReconError::ConfigParse(_)
        | ReconError::ConfigValidation(_)
        | ReconError::UnknownProfile(_)
        | ReconError::InvalidRebateRate(_) => EXIT_RECON_INVALID_PROFILE,
        ReconError::MissingKeyColumns { .. }
        | ReconError::MissingColumn { .. }
        | ReconError::MissingColumns { .. } => EXIT_RECON_MISSING_COLUMN,
        ReconError::Io(_) => EXIT_RECON_IO,
        ReconError::InvalidTransition { .. } | ReconError::RowCountMismatch { .. } => EXIT_ERROR,
    }
}

/// Map a table I/O error to its exit code.
pub fn io_exit_code(err: &IoError) -> u8 {
    match err {
        IoError::UnsupportedFormat(_) | IoError::SheetNotFound { .. } => EXIT_USAGE,
        IoError::Read { .. } | IoError::Write { .. } | IoError::Empty(_) => EXIT_RECON_IO,
    }
}
