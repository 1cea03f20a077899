use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use recongrid_core::{CellValue, RecordSet};

use crate::config::DateConfig;

pub const APPOINTMENT_DATE_COLUMN: &str = "Appointment date";
pub const APPOINTMENT_MONTH_COLUMN: &str = "Appointment month";
pub const APPOINTMENT_YEAR_COLUMN: &str = "Appointment year";
pub const USED_FALLBACK_COLUMN: &str = "Used created_at";

const DATETIME_FORMATS: [&str; 5] = [
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S%.f",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%m/%d/%Y", "%d-%m-%Y"];

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DateOutcome {
    /// False when neither source column exists.
    pub applied: bool,
    pub used_fallback: usize,
    pub unparsed: usize,
}

/// Parse a date cell. Text accepts RFC 3339 (wall-clock time kept) and the
/// common spreadsheet layouts.
pub fn parse_datetime(cell: &CellValue) -> Option<NaiveDateTime> {
    match cell {
        CellValue::Date(dt) => Some(*dt),
        CellValue::Text(s) => parse_text(s.trim()),
        CellValue::Empty | CellValue::Number(_) => None,
    }
}

fn parse_text(s: &str) -> Option<NaiveDateTime> {
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_local());
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }
    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return Some(d.and_time(chrono::NaiveTime::MIN));
        }
    }
    None
}

fn month_name(month: u32) -> &'static str {
    match month {
        1 => "January",
        2 => "February",
        3 => "March",
        4 => "April",
        5 => "May",
        6 => "June",
        7 => "July",
        8 => "August",
        9 => "September",
        10 => "October",
        11 => "November",
        _ => "December",
    }
}

/// Derive `Appointment date`, `Appointment month` and `Appointment year`,
/// preferring the appointment timestamp and falling back to the creation
/// timestamp. Fallback rows are marked in `Used created_at`.
pub fn normalize(set: &mut RecordSet, cfg: &DateConfig) -> DateOutcome {
    let has_primary = set.has_column(&cfg.primary);
    let has_fallback = set.has_column(&cfg.fallback);
    if !has_primary && !has_fallback {
        return DateOutcome::default();
    }

    for col in [
        APPOINTMENT_DATE_COLUMN,
        APPOINTMENT_MONTH_COLUMN,
        APPOINTMENT_YEAR_COLUMN,
        USED_FALLBACK_COLUMN,
    ] {
        set.add_column(col);
    }

    let mut outcome = DateOutcome {
        applied: true,
        ..DateOutcome::default()
    };

    for row in set.rows_mut() {
        let primary = parse_datetime(row.get(&cfg.primary));
        let (resolved, fallback) = match primary {
            Some(dt) => (Some(dt), false),
            None => match parse_datetime(row.get(&cfg.fallback)) {
                Some(dt) => (Some(dt), true),
                None => (None, false),
            },
        };

        match resolved {
            Some(dt) => {
                row.set(APPOINTMENT_DATE_COLUMN, dt.date());
                row.set(APPOINTMENT_MONTH_COLUMN, month_name(dt.month()));
                row.set(APPOINTMENT_YEAR_COLUMN, dt.year() as i64);
            }
            None => {
                outcome.unparsed += 1;
                row.set(APPOINTMENT_DATE_COLUMN, CellValue::Empty);
                row.set(APPOINTMENT_MONTH_COLUMN, CellValue::Empty);
                row.set(APPOINTMENT_YEAR_COLUMN, CellValue::Empty);
            }
        }
        if fallback {
            outcome.used_fallback += 1;
        }
        row.set(USED_FALLBACK_COLUMN, if fallback { "Yes" } else { "No" });
    }

    outcome
}
