use std::fmt;

use crate::model::MatchStatus;

#[derive(Debug)]
pub enum ReconError {
    /// TOML parse / deserialization error.
    ConfigParse(String),
    /// Profile validation error (bad rate, empty key name, etc.).
    ConfigValidation(String),
    /// No built-in profile with this name.
    UnknownProfile(String),
    /// Neither join-key column exists in a table.
    MissingKeyColumns { table: String, primary: String, fallback: String },
    /// Missing required column in input data.
    MissingColumn { table: String, column: String },
    /// Several required columns are missing at once.
    MissingColumns { table: String, columns: Vec<String> },
    /// Rebate percentage outside 0..=100.
    InvalidRebateRate(f64),
    /// A row tried to move to a status it cannot reach.
    InvalidTransition { row: usize, from: MatchStatus, to: MatchStatus },
    /// Row count changed between stages.
    RowCountMismatch { expected: usize, actual: usize },
    /// IO error (file read, etc.).
    Io(String),
}

impl ReconError {
    /// Table-level configuration problems, as opposed to runtime failures.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingKeyColumns { .. } | Self::MissingColumn { .. } | Self::MissingColumns { .. }
        )
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConfigParse(msg) => write!(f, "config parse error: {msg}"),
            Self::ConfigValidation(msg) => write!(f, "config validation error: {msg}"),
            Self::UnknownProfile(name) => write!(f, "unknown profile: {name}"),
            Self::MissingKeyColumns { table, primary, fallback } => {
                write!(f, "table '{table}': neither '{primary}' nor '{fallback}' column found")
            }
            Self::MissingColumn { table, column } => {
                write!(f, "table '{table}': missing column '{column}'")
            }
            Self::MissingColumns { table, columns } => {
                write!(f, "table '{table}': missing columns: {}", columns.join(", "))
            }
            Self::InvalidRebateRate(rate) => {
                write!(f, "rebate percentage must be between 0 and 100, got {rate}")
            }
            Self::InvalidTransition { row, from, to } => {
                write!(f, "row {row}: cannot move from '{from}' to '{to}'")
            }
            Self::RowCountMismatch { expected, actual } => {
                write!(f, "row count changed between stages: expected {expected}, got {actual}")
            }
            Self::Io(msg) => write!(f, "IO error: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
