//! Canonical forms for authorization codes and settlement dates.
//!
//! Both normalizers are pure and idempotent. Neither fails: a value that
//! cannot be canonicalized comes back trimmed but otherwise unchanged, and
//! simply never equals a well-formed target.

use chrono::NaiveDate;

use crate::error::ReconError;
use crate::model::CellValue;

/// Trim a code and, with `pad_width`, left-pad it with `0`.
///
/// Blank input yields `""`; callers drop those before comparing.
pub fn normalize_code(raw: &str, pad_width: Option<usize>) -> String {
    let code = raw.trim();
    match pad_width {
        Some(width) if !code.is_empty() => format!("{code:0>width$}"),
        _ => code.to_string(),
    }
}

/// Normalize a settlement date cell to `YYYYMMDD`.
pub fn normalize_date(cell: &CellValue) -> String {
    match cell {
        CellValue::Date(dt) => dt.format("%Y%m%d").to_string(),
        other => normalize_date_str(&other.as_text()),
    }
}

/// String rules, in order: `YYMMDD` → `20YYMMDD`, `YYYYMMDD` as is,
/// `YYYY/MM/DD` → `YYYYMMDD`, anything else unchanged.
pub fn normalize_date_str(raw: &str) -> String {
    let s = raw.trim();
    if is_digits(s, 6) {
        return format!("20{s}");
    }
    if is_digits(s, 8) {
        return s.to_string();
    }
    if let Some(compact) = slash_date(s) {
        return compact;
    }
    s.to_string()
}

/// Parse a user-supplied target date in any shape [`normalize_date_str`]
/// understands. The result must be a real calendar date.
pub fn parse_target_date(raw: &str) -> Result<NaiveDate, ReconError> {
    let compact = normalize_date_str(raw);
    if !is_digits(&compact, 8) {
        return Err(ReconError::InvalidFilter(format!(
            "date '{}' is not YYYYMMDD, YYMMDD or YYYY/MM/DD",
            raw.trim()
        )));
    }
    NaiveDate::parse_from_str(&compact, "%Y%m%d")
        .map_err(|_| ReconError::InvalidFilter(format!("date '{}' is not a calendar date", raw.trim())))
}

/// True when `s` is already in the canonical `YYYYMMDD` shape.
pub fn is_compact_date(s: &str) -> bool {
    is_digits(s, 8)
}

fn is_digits(s: &str, len: usize) -> bool {
    s.len() == len && s.bytes().all(|b| b.is_ascii_digit())
}

fn slash_date(s: &str) -> Option<String> {
    let mut parts = s.split('/');
    let (year, month, day) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() || !is_digits(year, 4) {
        return None;
    }
    let short = |p: &str| (1..=2).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit());
    if !short(month) || !short(day) {
        return None;
    }
    Some(format!("{year}{month:0>2}{day:0>2}"))
}
