use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub enum IoError {
    /// Extension not recognised as a table format.
    UnsupportedFormat(PathBuf),
    /// File could not be opened or decoded.
    Read { path: PathBuf, message: String },
    /// File could not be written.
    Write { path: PathBuf, message: String },
    /// Workbook has no sheet by that name (or no sheets at all).
    SheetNotFound { path: PathBuf, sheet: String },
    /// No header row.
    Empty(PathBuf),
}

impl IoError {
    pub(crate) fn read(path: &Path, err: impl fmt::Display) -> Self {
        Self::Read {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }

    pub(crate) fn write(path: &Path, err: impl fmt::Display) -> Self {
        Self::Write {
            path: path.to_path_buf(),
            message: err.to_string(),
        }
    }
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnsupportedFormat(path) => write!(
                f,
                "{}: unsupported file type (expected .xlsx, .xlsm, .xls, .xlsb, .ods, .csv, .tsv or .txt)",
                path.display()
            ),
            Self::Read { path, message } => write!(f, "cannot read {}: {message}", path.display()),
            Self::Write { path, message } => write!(f, "cannot write {}: {message}", path.display()),
            Self::SheetNotFound { path, sheet } => {
                write!(f, "{}: no sheet named '{sheet}'", path.display())
            }
            Self::Empty(path) => write!(f, "{}: no header row", path.display()),
        }
    }
}

impl std::error::Error for IoError {}
