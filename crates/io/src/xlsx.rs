// Excel import (xlsx, xlsm, xls, xlsb, ods) and export (xlsx only)
//
// Import reads one worksheet into a record set: first row is the header.
// Export writes one record set to a single named sheet with a bold, frozen
// header row.

use std::path::Path;

use calamine::{open_workbook_auto, Data, Reader, Sheets};
use recongrid_core::{CellValue, RecordSet};
use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};

use crate::error::IoError;
use crate::{build_record_set, normalize_headers, table_name};

/// Excel caps sheet names at 31 characters.
const MAX_SHEET_NAME: usize = 31;

/// Import one sheet (by name, or the first sheet).
pub fn import(path: &Path, sheet: Option<&str>) -> Result<RecordSet, IoError> {
    let mut workbook: Sheets<_> = open_workbook_auto(path).map_err(|e| IoError::read(path, e))?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

    let sheet_name = match sheet {
        Some(name) => sheet_names
            .iter()
            .find(|s| s.as_str() == name)
            .cloned()
            .ok_or_else(|| IoError::SheetNotFound {
                path: path.to_path_buf(),
                sheet: name.to_string(),
            })?,
        None => sheet_names.first().cloned().ok_or_else(|| IoError::SheetNotFound {
            path: path.to_path_buf(),
            sheet: "(first sheet)".to_string(),
        })?,
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| IoError::read(path, format!("sheet '{sheet_name}': {e}")))?;

    let mut rows = range.rows();
    let headers = match rows.next() {
        Some(header) => normalize_headers(header.iter().map(|c| convert_cell(c).key_string())),
        None => return Err(IoError::Empty(path.to_path_buf())),
    };
    let width = headers.len();

    let data = rows.map(|row| row.iter().take(width).map(convert_cell).collect::<Vec<_>>());
    Ok(build_record_set(&table_name(path), headers, data))
}

fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::text(s.as_str()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::text(if *b { "TRUE" } else { "FALSE" }),
        Data::Error(e) => CellValue::text(format!("#{e:?}")),
        Data::DateTime(dt) => match dt.as_datetime() {
            Some(ndt) => CellValue::Date(ndt),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) | Data::DurationIso(s) => CellValue::text(s.as_str()),
    }
}

/// Write `set` to a new workbook with one sheet named `sheet_name`.
pub fn export(set: &RecordSet, path: &Path, sheet_name: &str) -> Result<(), IoError> {
    let mut workbook = XlsxWorkbook::new();
    let name: String = sheet_name.chars().take(MAX_SHEET_NAME).collect();
    let worksheet = workbook
        .add_worksheet()
        .set_name(&name)
        .map_err(|e| IoError::write(path, format!("sheet '{name}': {e}")))?;

    let header_format = Format::new().set_bold();
    for (col, header) in set.columns().iter().enumerate() {
        worksheet
            .write_string_with_format(0, col as u16, header, &header_format)
            .map_err(|e| IoError::write(path, e))?;
    }
    worksheet.set_freeze_panes(1, 0).map_err(|e| IoError::write(path, e))?;

    for (r, row) in set.rows().iter().enumerate() {
        let row32 = (r + 1) as u32;
        for (c, column) in set.columns().iter().enumerate() {
            let col16 = c as u16;
            let result = match row.get(column) {
                CellValue::Empty => continue,
                CellValue::Number(n) => worksheet.write_number(row32, col16, *n),
                CellValue::Text(s) => worksheet.write_string(row32, col16, s),
                date @ CellValue::Date(_) => worksheet.write_string(row32, col16, date.to_string()),
            };
            result.map_err(|e| IoError::write(path, format!("cell ({row32}, {col16}): {e}")))?;
        }
    }

    workbook.save(path).map_err(|e| IoError::write(path, e))?;
    Ok(())
}
