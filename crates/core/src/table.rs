use std::collections::HashMap;

use crate::cell::CellValue;

static EMPTY: CellValue = CellValue::Empty;

// ---------------------------------------------------------------------------
// Record
// ---------------------------------------------------------------------------

/// One row of an uploaded table, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    cells: HashMap<String, CellValue>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_pairs<K, V, I>(pairs: I) -> Self
    where
        K: Into<String>,
        V: Into<CellValue>,
        I: IntoIterator<Item = (K, V)>,
    {
        Self {
            cells: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Missing columns read as `CellValue::Empty`.
    pub fn get(&self, column: &str) -> &CellValue {
        self.cells.get(column).unwrap_or(&EMPTY)
    }

    pub fn set(&mut self, column: impl Into<String>, value: impl Into<CellValue>) {
        self.cells.insert(column.into(), value.into());
    }

    pub fn remove(&mut self, column: &str) -> Option<CellValue> {
        self.cells.remove(column)
    }

    /// Trimmed display text of a cell.
    pub fn text(&self, column: &str) -> String {
        self.get(column).key_string()
    }
}

// ---------------------------------------------------------------------------
// RecordSet
// ---------------------------------------------------------------------------

/// An ordered table: explicit column order plus rows in file order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecordSet {
    name: String,
    columns: Vec<String>,
    rows: Vec<Record>,
}

impl RecordSet {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows: Vec::new(),
        }
    }

    pub fn with_rows(name: impl Into<String>, columns: Vec<String>, rows: Vec<Record>) -> Self {
        Self {
            name: name.into(),
            columns,
            rows,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Record] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [Record] {
        &mut self.rows
    }

    pub fn into_rows(self) -> Vec<Record> {
        self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_column(&self, column: &str) -> bool {
        self.columns.iter().any(|c| c == column)
    }

    /// Append a column if it is not already present.
    pub fn add_column(&mut self, column: impl Into<String>) {
        let column = column.into();
        if !self.has_column(&column) {
            self.columns.push(column);
        }
    }

    pub fn push(&mut self, record: Record) {
        self.rows.push(record);
    }

    pub fn cell(&self, row: usize, column: &str) -> &CellValue {
        self.rows.get(row).map(|r| r.get(column)).unwrap_or(&EMPTY)
    }

    /// Rename a column in place. If `to` already exists it is replaced.
    pub fn rename_column(&mut self, from: &str, to: &str) {
        if from == to || !self.has_column(from) {
            return;
        }
        self.drop_column(to);
        for c in self.columns.iter_mut() {
            if c == from {
                *c = to.to_string();
            }
        }
        for row in self.rows.iter_mut() {
            if let Some(v) = row.remove(from) {
                row.set(to, v);
            }
        }
    }

    pub fn drop_column(&mut self, column: &str) {
        if !self.has_column(column) {
            return;
        }
        self.columns.retain(|c| c != column);
        for row in self.rows.iter_mut() {
            row.remove(column);
        }
    }

    /// Project onto `columns` in the given order. Absent columns are skipped.
    pub fn select(&self, columns: &[String]) -> RecordSet {
        let kept: Vec<String> = columns
            .iter()
            .filter(|c| self.has_column(c))
            .cloned()
            .collect();
        let rows = self
            .rows
            .iter()
            .map(|r| {
                Record::from_pairs(kept.iter().map(|c| (c.clone(), r.get(c).clone())))
            })
            .collect();
        RecordSet::with_rows(self.name.clone(), kept, rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> RecordSet {
        let cols = vec!["PO".to_string(), "Amount".to_string()];
        let rows = vec![
            Record::from_pairs([("PO", CellValue::from("A1")), ("Amount", CellValue::from(100.0))]),
            Record::from_pairs([("PO", CellValue::from("A2")), ("Amount", CellValue::from(200.0))]),
            Record::from_pairs([("PO", CellValue::from(" A1")), ("Amount", CellValue::from(50.0))]),
        ];
        RecordSet::with_rows("statement", cols, rows)
    }

    #[test]
    fn missing_cells_read_empty() {
        let set = sample();
        assert_eq!(set.cell(0, "Nope"), &CellValue::Empty);
        assert_eq!(set.cell(99, "PO"), &CellValue::Empty);
    }

    #[test]
    fn rename_moves_values() {
        let mut set = sample();
        set.rename_column("Amount", "Statement amount");
        assert_eq!(set.columns(), &["PO".to_string(), "Statement amount".to_string()]);
        assert_eq!(set.cell(1, "Statement amount"), &CellValue::Number(200.0));
        assert!(set.cell(1, "Amount").is_empty());
    }

    #[test]
    fn select_skips_absent_and_keeps_order() {
        let set = sample();
        let projected = set.select(&["Amount".to_string(), "Ghost".to_string(), "PO".to_string()]);
        assert_eq!(projected.columns(), &["Amount".to_string(), "PO".to_string()]);
        assert_eq!(projected.len(), 3);
    }
}
