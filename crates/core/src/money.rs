// Fixed-point money helpers. All amounts are integer cents.

use crate::cell::CellValue;

/// Parse a currency-like string into cents.
///
/// Everything except ASCII digits, `.` and `-` is stripped first, so
/// `"$1,234.56"` and `"₹999"` both parse. Digits past the second decimal
/// place round half away from zero. Returns `None` when nothing numeric is left.
pub fn parse_cents(raw: &str) -> Option<i64> {
    let cleaned: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.' || *c == '-')
        .collect();

    let (negative, body) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.as_str()),
    };
    if body.is_empty() || body.contains('-') {
        return None;
    }

    let (int_part, frac_part) = match body.split_once('.') {
        Some((i, f)) => (i, f),
        None => (body, ""),
    };
    if frac_part.contains('.') || (int_part.is_empty() && frac_part.is_empty()) {
        return None;
    }

    let whole: i64 = if int_part.is_empty() { 0 } else { int_part.parse().ok()? };
    let digits: Vec<i64> = frac_part
        .bytes()
        .map(|b| (b - b'0') as i64)
        .collect();
    let tenths = digits.first().copied().unwrap_or(0);
    let hundredths = digits.get(1).copied().unwrap_or(0);
    let round_up = digits.get(2).map(|d| *d >= 5).unwrap_or(false);

    let mut cents = whole.checked_mul(100)?.checked_add(tenths * 10 + hundredths)?;
    if round_up {
        cents = cents.checked_add(1)?;
    }
    Some(if negative { -cents } else { cents })
}

/// Cents from a float, rounded half away from zero.
pub fn cents_from_f64(n: f64) -> Option<i64> {
    if !n.is_finite() {
        return None;
    }
    let scaled = (n * 100.0).round();
    if scaled.abs() > i64::MAX as f64 {
        return None;
    }
    Some(scaled as i64)
}

/// Cents from a cell. Numbers convert directly, text goes through `parse_cents`.
pub fn cell_cents(cell: &CellValue) -> Option<i64> {
    match cell {
        CellValue::Number(n) => cents_from_f64(*n),
        CellValue::Text(s) => parse_cents(s),
        CellValue::Empty | CellValue::Date(_) => None,
    }
}

pub fn cents_to_f64(cents: i64) -> f64 {
    cents as f64 / 100.0
}

/// Integer division rounding half away from zero.
pub fn div_round(num: i128, den: i128) -> i64 {
    debug_assert!(den != 0);
    let q = num / den;
    let r = num % den;
    let bumped = if (r.abs() * 2) >= den.abs() {
        if (num < 0) != (den < 0) {
            q - 1
        } else {
            q + 1
        }
    } else {
        q
    };
    bumped as i64
}

/// Hundredths of a percent as `"-10.00%"`.
pub fn format_basis_points(bp: i64) -> String {
    let sign = if bp < 0 { "-" } else { "" };
    let abs = bp.unsigned_abs();
    format!("{sign}{}.{:02}%", abs / 100, abs % 100)
}
