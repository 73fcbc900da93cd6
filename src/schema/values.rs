//! Parsing of raw entry values into typed values

use chrono::NaiveDate;

pub const DATE_FORMAT: &str = "%Y-%m-%d";

pub fn parse_number(raw: &str) -> Option<f64> {
    raw.trim().parse::<f64>().ok().filter(|n| n.is_finite())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).ok()
}

pub fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "yes" | "y" | "1" | "on" => Some(true),
        "false" | "no" | "n" | "0" | "off" => Some(false),
        _ => None,
    }
}

/// Stricter than [`parse_boolean`]: a column of 0/1 reads as numbers, not flags
pub fn looks_boolean(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "true" | "false" | "yes" | "no"
    )
}

/// Numeric value of an entry cell for formula evaluation; missing or
/// non-numeric cells count as zero
pub fn numeric_or_zero(raw: Option<&str>) -> f64 {
    raw.and_then(parse_number).unwrap_or(0.0)
}
