// CSV/TSV import/export

use std::io::Read;
use std::path::Path;

use recongrid_core::{CellValue, RecordSet};

use crate::error::IoError;
use crate::{build_record_set, normalize_headers, table_name};

pub fn import(path: &Path) -> Result<RecordSet, IoError> {
    let content = read_file_as_utf8(path)?;
    let delimiter = sniff_delimiter(&content);
    import_from_string(&table_name(path), &content, delimiter).map_err(|e| IoError::read(path, e))
}

pub fn import_tsv(path: &Path) -> Result<RecordSet, IoError> {
    let content = read_file_as_utf8(path)?;
    import_from_string(&table_name(path), &content, b'\t').map_err(|e| IoError::read(path, e))
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// For each candidate (tab, semicolon, comma, pipe), count fields per line. The delimiter
/// that produces the most consistent field count (>1 field) wins.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().take(10).collect();

    if sample_lines.is_empty() {
        return b',';
    }

    let mut best = b',';
    let mut best_score = 0u64;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        if counts.first().copied().unwrap_or(0) <= 1 {
            continue;
        }

        // consistent lines × field count; wider wins ties
        let target = counts[0];
        let consistent = counts.iter().filter(|&&c| c == target).count() as u64;
        let score = consistent * target as u64;

        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

/// Read file and convert to UTF-8 if needed (Excel-exported CSVs are often Windows-1252).
pub fn read_file_as_utf8(path: &Path) -> Result<String, IoError> {
    let mut file = std::fs::File::open(path).map_err(|e| IoError::read(path, e))?;
    let mut bytes = Vec::new();
    file.read_to_end(&mut bytes).map_err(|e| IoError::read(path, e))?;

    match String::from_utf8(bytes) {
        Ok(s) => match s.strip_prefix('\u{feff}') {
            Some(rest) => Ok(rest.to_string()),
            None => Ok(s),
        },
        Err(e) => {
            let bytes = e.into_bytes();
            log::debug!("{}: not UTF-8, decoding as Windows-1252", path.display());
            let (decoded, _, _) = encoding_rs::WINDOWS_1252.decode(&bytes);
            Ok(decoded.into_owned())
        }
    }
}

/// Parse CSV text. The first record is the header row; every other field is
/// kept as text (empty fields become `Empty`).
fn import_from_string(name: &str, content: &str, delimiter: u8) -> Result<RecordSet, csv::Error> {
    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(content.as_bytes());

    let mut records = reader.records();
    let headers = match records.next() {
        Some(header) => normalize_headers(header?.iter()),
        None => return Ok(RecordSet::new(name, Vec::new())),
    };

    let mut rows = Vec::new();
    for result in records {
        let record = result?;
        rows.push(
            record
                .iter()
                .map(|field| {
                    if field.is_empty() {
                        CellValue::Empty
                    } else {
                        CellValue::text(field)
                    }
                })
                .collect::<Vec<_>>(),
        );
    }

    Ok(build_record_set(name, headers, rows.into_iter()))
}

pub fn export(set: &RecordSet, path: &Path) -> Result<(), IoError> {
    export_with_delimiter(set, path, b',')
}

pub fn export_tsv(set: &RecordSet, path: &Path) -> Result<(), IoError> {
    export_with_delimiter(set, path, b'\t')
}

fn export_with_delimiter(set: &RecordSet, path: &Path, delimiter: u8) -> Result<(), IoError> {
    let mut writer = csv::WriterBuilder::new()
        .delimiter(delimiter)
        .from_path(path)
        .map_err(|e| IoError::write(path, e))?;

    writer
        .write_record(set.columns())
        .map_err(|e| IoError::write(path, e))?;
    for row in set.rows() {
        let record: Vec<String> = set.columns().iter().map(|c| row.get(c).to_string()).collect();
        writer.write_record(&record).map_err(|e| IoError::write(path, e))?;
    }

    writer.flush().map_err(|e| IoError::write(path, e))?;
    Ok(())
}
