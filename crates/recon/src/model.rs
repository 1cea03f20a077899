use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use recongrid_core::RecordSet;
use serde::Serialize;

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// Pre-loaded tables for one run.
pub struct ReconInput {
    pub statement: RecordSet,
    pub estimate: RecordSet,
    /// Query export used to enrich rows the estimate could not match.
    pub query: Option<RecordSet>,
    /// Scraper output keyed by record id.
    pub scraper: Option<RecordSet>,
}

// ---------------------------------------------------------------------------
// Match status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStatus {
    Unjoined,
    MatchedPrimary,
    UnmatchedPrimary,
    DuplicateKeyInSecondary,
    MatchedSecondary,
    StillUnmatched,
}

impl MatchStatus {
    pub const ALL: [MatchStatus; 6] = [
        Self::Unjoined,
        Self::MatchedPrimary,
        Self::UnmatchedPrimary,
        Self::DuplicateKeyInSecondary,
        Self::MatchedSecondary,
        Self::StillUnmatched,
    ];

    /// Text written into the `Match Status` column.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unjoined => "Unjoined",
            Self::MatchedPrimary => "Matched with Estimates",
            Self::UnmatchedPrimary => "Unmatched with Estimates (N/A)",
            Self::DuplicateKeyInSecondary => "Duplicating in Estimates",
            Self::MatchedSecondary => "Matched with Query result",
            Self::StillUnmatched => "Still Unmatched",
        }
    }

    /// Statuses only move forward: stage 1 from `Unjoined`, stage 2 from `UnmatchedPrimary`.
    pub fn can_become(self, next: MatchStatus) -> bool {
        matches!(
            (self, next),
            (
                Self::Unjoined,
                Self::MatchedPrimary | Self::UnmatchedPrimary | Self::DuplicateKeyInSecondary
            ) | (Self::UnmatchedPrimary, Self::MatchedSecondary | Self::StillUnmatched)
        )
    }
}

impl std::fmt::Display for MatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Unjoined => write!(f, "unjoined"),
            Self::MatchedPrimary => write!(f, "matched_primary"),
            Self::UnmatchedPrimary => write!(f, "unmatched_primary"),
            Self::DuplicateKeyInSecondary => write!(f, "duplicate_key_in_secondary"),
            Self::MatchedSecondary => write!(f, "matched_secondary"),
            Self::StillUnmatched => write!(f, "still_unmatched"),
        }
    }
}

// ---------------------------------------------------------------------------
// Run context
// ---------------------------------------------------------------------------

pub const INITIAL_OUTPUT_FILE: &str = "Initial_Merged_Statement_Estimates.xlsx";
pub const INITIAL_SHEET: &str = "Merged";
pub const FINAL_SHEET: &str = "Final Processed";
pub const REMITTANCE_SHEET: &str = "Remittance_Merged";
pub const REMITTANCE_FILE_SUFFIX: &str = "_With_Remittance";
pub const NON_AI_SHEET: &str = "PO_Match_Result";
pub const CALCULATOR_OUTPUT_FILE: &str = "updated_calculations.xlsx";
pub const CALCULATOR_SHEET: &str = "Updated";
const DEFAULT_BASE_NAME: &str = "Processed_Statement";

/// Per-run state handed to each stage: where outputs go, what they are
/// named, when the run started, and warnings gathered along the way.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub output_dir: PathBuf,
    pub base_name: String,
    pub run_at: DateTime<Local>,
    pub warnings: Vec<String>,
}

impl RunContext {
    pub fn new(output_dir: impl Into<PathBuf>, statement_path: Option<&Path>) -> Self {
        let base_name = statement_path
            .and_then(|p| p.file_stem())
            .map(|s| s.to_string_lossy().into_owned())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| DEFAULT_BASE_NAME.to_string());
        Self {
            output_dir: output_dir.into(),
            base_name,
            run_at: Local::now(),
            warnings: Vec::new(),
        }
    }

    pub fn with_run_at(mut self, run_at: DateTime<Local>) -> Self {
        self.run_at = run_at;
        self
    }

    /// Record a warning and log it.
    pub fn warn(&mut self, msg: impl Into<String>) {
        let msg = msg.into();
        log::warn!("{msg}");
        self.warnings.push(msg);
    }

    pub fn initial_output_path(&self) -> PathBuf {
        self.output_dir.join(INITIAL_OUTPUT_FILE)
    }

    /// `{stem}_Final_Processed_{YYYYmmdd_HHMM}.xlsx`
    pub fn final_output_path(&self) -> PathBuf {
        self.output_dir.join(format!(
            "{}_Final_Processed_{}.xlsx",
            self.base_name,
            self.run_at.format("%Y%m%d_%H%M")
        ))
    }

    /// Final output name with a suffix before the extension, e.g. `_With_Remittance`.
    pub fn derived_output_path(&self, suffix: &str) -> PathBuf {
        self.output_dir.join(format!(
            "{}_Final_Processed_{}{suffix}.xlsx",
            self.base_name,
            self.run_at.format("%Y%m%d_%H%M")
        ))
    }
}

// ---------------------------------------------------------------------------
// Summary + Output
// ---------------------------------------------------------------------------

/// Rows left out of a derived computation, per reason.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Skipped {
    pub financial_parse: usize,
    pub dispute_parse: usize,
    pub date_parse: usize,
}

/// Rows whose key repeats an earlier row's key, per table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DuplicateCounts {
    pub statement: usize,
    pub estimate: usize,
    pub enrichment: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub total_rows: usize,
    pub matched_primary: usize,
    pub unmatched_primary: usize,
    pub duplicate_flagged: usize,
    pub matched_secondary: usize,
    pub still_unmatched: usize,
    pub unresolved_keys: usize,
    pub fallback_dates: usize,
    pub status_counts: BTreeMap<String, usize>,
    pub duplicates: DuplicateCounts,
    pub skipped: Skipped,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunMeta {
    pub profile: String,
    pub duplicate_policy: String,
    pub engine_version: String,
    pub run_at: String,
    pub initial_output: String,
    pub final_output: String,
}

/// Machine-readable part of a run, written as JSON.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub meta: RunMeta,
    pub summary: RunSummary,
}

/// Everything a run produces.
#[derive(Debug, Clone)]
pub struct ReconOutput {
    pub meta: RunMeta,
    pub summary: RunSummary,
    /// Stage-1 table, every statement row with its first status.
    pub initial: RecordSet,
    /// Stage-1 matched/duplicate rows plus stage-2 rows, in statement order.
    pub final_table: RecordSet,
    /// Final status per row of `final_table`.
    pub statuses: Vec<MatchStatus>,
    /// The normalized enrichment set stage 2 joined against.
    pub enrichment: RecordSet,
}

impl ReconOutput {
    pub fn report(&self) -> RunReport {
        RunReport {
            meta: self.meta.clone(),
            summary: self.summary.clone(),
        }
    }
}
