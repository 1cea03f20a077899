//! Table file I/O: CSV/TSV and Excel workbooks in, CSV or XLSX out.

pub mod csv;
pub mod error;
pub mod xlsx;

use std::collections::HashMap;
use std::path::Path;

use recongrid_core::{CellValue, Record, RecordSet};

pub use error::IoError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TableFormat {
    Csv,
    Tsv,
    Excel,
}

impl TableFormat {
    pub fn from_path(path: &Path) -> Result<Self, IoError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "csv" | "txt" => Ok(Self::Csv),
            "tsv" => Ok(Self::Tsv),
            "xlsx" | "xlsm" | "xls" | "xlsb" | "ods" => Ok(Self::Excel),
            _ => Err(IoError::UnsupportedFormat(path.to_path_buf())),
        }
    }
}

/// Read one table. `sheet` picks a worksheet by name; the first sheet is
/// used otherwise. CSV input ignores it.
pub fn read_table(path: &Path, sheet: Option<&str>) -> Result<RecordSet, IoError> {
    let set = match TableFormat::from_path(path)? {
        TableFormat::Csv => csv::import(path)?,
        TableFormat::Tsv => csv::import_tsv(path)?,
        TableFormat::Excel => xlsx::import(path, sheet)?,
    };
    log::info!(
        "loaded {}: {} row(s), {} column(s)",
        path.display(),
        set.len(),
        set.columns().len()
    );
    Ok(set)
}

/// Write one table. `sheet_name` is used for XLSX output only.
pub fn write_table(set: &RecordSet, path: &Path, sheet_name: &str) -> Result<(), IoError> {
    match TableFormat::from_path(path)? {
        TableFormat::Csv => csv::export(set, path)?,
        TableFormat::Tsv => csv::export_tsv(set, path)?,
        TableFormat::Excel => {
            if path.extension().and_then(|e| e.to_str()).map(|e| e.eq_ignore_ascii_case("xlsx")) != Some(true) {
                return Err(IoError::UnsupportedFormat(path.to_path_buf()));
            }
            xlsx::export(set, path, sheet_name)?
        }
    }
    log::info!("wrote {} ({} row(s))", path.display(), set.len());
    Ok(())
}

/// Trim header cells, name blank ones `Unnamed: N` and suffix repeats with
/// `.1`, `.2`, ... so every column name is unique.
pub(crate) fn normalize_headers<I, S>(raw: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen: HashMap<String, usize> = HashMap::new();
    let mut headers: Vec<String> = Vec::new();
    for (i, h) in raw.into_iter().enumerate() {
        let base = match h.as_ref().trim() {
            "" => format!("Unnamed: {i}"),
            name => name.to_string(),
        };
        let mut name = base.clone();
        while headers.contains(&name) {
            let n = seen.entry(base.clone()).or_insert(0);
            *n += 1;
            name = format!("{base}.{n}");
        }
        headers.push(name);
    }
    headers
}

/// Build a record set from a header row and data rows, skipping rows with
/// no non-empty cell.
pub(crate) fn build_record_set(
    name: &str,
    headers: Vec<String>,
    rows: impl Iterator<Item = Vec<CellValue>>,
) -> RecordSet {
    let mut set = RecordSet::new(name, headers);
    let mut skipped = 0;
    for cells in rows {
        if cells.iter().all(CellValue::is_empty) {
            skipped += 1;
            continue;
        }
        let record = Record::from_pairs(set.columns().iter().cloned().zip(cells));
        set.push(record);
    }
    if skipped > 0 {
        log::debug!("{name}: skipped {skipped} blank row(s)");
    }
    set
}

pub(crate) fn table_name(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "table".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn headers_are_trimmed_and_deduplicated() {
        let h = normalize_headers([" PO ", "Amount", "PO", "", "PO", "PO.1"]);
        assert_eq!(h, vec!["PO", "Amount", "PO.1", "Unnamed: 3", "PO.2", "PO.1.1"]);
    }

    #[test]
    fn format_by_extension() {
        assert_eq!(TableFormat::from_path(Path::new("a.CSV")).unwrap(), TableFormat::Csv);
        assert_eq!(TableFormat::from_path(Path::new("a.tsv")).unwrap(), TableFormat::Tsv);
        assert_eq!(TableFormat::from_path(Path::new("a.xlsm")).unwrap(), TableFormat::Excel);
        assert!(TableFormat::from_path(Path::new("a.pdf")).is_err());
        assert!(TableFormat::from_path(Path::new("noext")).is_err());
    }

    #[test]
    fn blank_rows_are_skipped() {
        let rows = vec![
            vec![CellValue::from("A1"), CellValue::Number(1.0)],
            vec![CellValue::Empty, CellValue::from("  ")],
            vec![CellValue::from("A2")],
        ];
        let set = build_record_set("t", vec!["PO".into(), "Amount".into()], rows.into_iter());
        assert_eq!(set.len(), 2);
        assert!(set.cell(1, "Amount").is_empty());
    }
}
