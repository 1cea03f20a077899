use recongrid_core::{Record, RecordSet};

use crate::config::KeyConfig;
use crate::error::ReconError;

/// Resolve one row's join key: the primary column if non-empty, else the
/// fallback, else `""` (unresolved).
pub fn resolve_key(record: &Record, keys: &KeyConfig) -> String {
    let primary = record.text(&keys.primary);
    if !primary.is_empty() {
        return primary;
    }
    record.text(&keys.fallback)
}

/// A table must carry at least one of the two key columns.
pub fn check_key_columns(set: &RecordSet, keys: &KeyConfig) -> Result<(), ReconError> {
    if set.has_column(&keys.primary) || set.has_column(&keys.fallback) {
        Ok(())
    } else {
        Err(ReconError::MissingKeyColumns {
            table: set.name().to_string(),
            primary: keys.primary.clone(),
            fallback: keys.fallback.clone(),
        })
    }
}

/// Resolve keys for every row, after the table-level guard.
pub fn resolve_keys(set: &RecordSet, keys: &KeyConfig) -> Result<Vec<String>, ReconError> {
    check_key_columns(set, keys)?;
    Ok(set.rows().iter().map(|r| resolve_key(r, keys)).collect())
}

/// Rows whose non-empty key repeats an earlier row's key.
pub fn duplicate_keys(keys: &[String]) -> usize {
    let mut seen = std::collections::HashSet::new();
    keys.iter()
        .filter(|k| !k.is_empty())
        .filter(|k| !seen.insert(k.as_str()))
        .count()
}
