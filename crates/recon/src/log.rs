//! Authorization codes from the terminal's `<YYYYMMDD>_ui.txt` log.
//!
//! Records look like
//!
//! ```text
//! 2025-07-03_14:30:05 [EDC] sale done, Approval ID: AB12
//! ```
//!
//! Some firmware writes the marker and the code on separate lines; see
//! [`next_line_code`].

use chrono::{NaiveDate, NaiveTime};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, trace};

use crate::error::ReconError;
use crate::model::LogRecord;

/// Literal a line must contain to be considered a record.
pub const APPROVAL_MARKER: &str = "Approval ID";

static INLINE_CODE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Approval ID[:：]\s*([A-Z0-9]+)").unwrap());
static TIMESTAMP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2})_(\d{2}:\d{2}:\d{2})").unwrap());
static CODE_LINE: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Z0-9]+$").unwrap());

/// Optional date/time window. With neither set, every marker line counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LogFilter {
    /// Keep only records stamped on this day.
    pub target_date: Option<NaiveDate>,
    /// Keep only records at or before this time of day.
    pub cutoff: Option<NaiveTime>,
}

impl LogFilter {
    pub fn is_active(&self) -> bool {
        self.target_date.is_some() || self.cutoff.is_some()
    }

    /// Stable text form, used to key cached extractions.
    pub fn fingerprint(&self) -> String {
        format!(
            "date={};cutoff={}",
            self.target_date.map(|d| d.to_string()).unwrap_or_default(),
            self.cutoff.map(|t| t.to_string()).unwrap_or_default(),
        )
    }
}

/// Parse a cutoff given as `HH:MM:SS` or `HH:MM`.
pub fn parse_cutoff(raw: &str) -> Result<NaiveTime, ReconError> {
    let s = raw.trim();
    NaiveTime::parse_from_str(s, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M"))
        .map_err(|_| ReconError::InvalidFilter(format!("cutoff '{s}' is not HH:MM:SS")))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct LogExtraction {
    pub records: Vec<LogRecord>,
    pub lines_scanned: usize,
    /// Lines carrying the marker (and the target date, when filtering).
    pub candidate_lines: usize,
    pub skipped_no_time: usize,
    pub skipped_after_cutoff: usize,
    pub skipped_no_code: usize,
}

impl LogExtraction {
    pub fn codes(&self) -> Vec<String> {
        self.records.iter().map(|r| r.code.clone()).collect()
    }
}

/// Scan log text line by line. Codes keep line order and duplicates.
pub fn extract_log(text: &str, filter: &LogFilter) -> LogExtraction {
    let lines: Vec<&str> = text.lines().collect();
    let target = filter.target_date.map(|d| d.format("%Y-%m-%d").to_string());
    let mut out = LogExtraction {
        lines_scanned: lines.len(),
        ..Default::default()
    };

    for (idx, line) in lines.iter().enumerate() {
        if !line.contains(APPROVAL_MARKER) {
            continue;
        }
        if let Some(target) = &target {
            if !line.contains(target.as_str()) {
                continue;
            }
        }
        out.candidate_lines += 1;

        let stamp = timestamp(line, target.as_deref());
        if filter.is_active() && stamp.is_none() {
            trace!(line = idx + 1, "marker line without timestamp skipped");
            out.skipped_no_time += 1;
            continue;
        }

        if let (Some(cutoff), Some((_, time))) = (filter.cutoff, stamp) {
            if time > cutoff {
                out.skipped_after_cutoff += 1;
                continue;
            }
        }

        let (code, from_next_line) = match inline_code(line) {
            Some(code) => (code, false),
            None => match next_line_code(lines.get(idx + 1).copied()) {
                Some(code) => (code, true),
                None => {
                    trace!(line = idx + 1, "marker line without code skipped");
                    out.skipped_no_code += 1;
                    continue;
                }
            },
        };

        out.records.push(LogRecord {
            line: idx + 1,
            date: stamp.map(|(d, _)| d),
            time: stamp.map(|(_, t)| t),
            code: code.to_string(),
            from_next_line,
        });
    }

    debug!(
        records = out.records.len(),
        candidates = out.candidate_lines,
        skipped_no_time = out.skipped_no_time,
        skipped_after_cutoff = out.skipped_after_cutoff,
        skipped_no_code = out.skipped_no_code,
        "log extraction done"
    );
    out
}

/// Codes only; see [`extract_log`].
pub fn extract_log_codes(text: &str, filter: &LogFilter) -> Vec<String> {
    extract_log(text, filter).codes()
}

/// `YYYY-MM-DD_HH:MM:SS` on the line. With a target date, only a stamp
/// on that date counts.
fn timestamp(line: &str, target: Option<&str>) -> Option<(NaiveDate, NaiveTime)> {
    TIMESTAMP.captures_iter(line).find_map(|caps| {
        let date_str = caps.get(1)?.as_str();
        if target.is_some_and(|t| t != date_str) {
            return None;
        }
        let date = NaiveDate::parse_from_str(date_str, "%Y-%m-%d").ok()?;
        let time = NaiveTime::parse_from_str(caps.get(2)?.as_str(), "%H:%M:%S").ok()?;
        Some((date, time))
    })
}

fn inline_code(line: &str) -> Option<&str> {
    INLINE_CODE
        .captures(line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Heuristic lookahead: when the marker line has no inline code, a next
/// line made only of `[A-Z0-9]` is taken as the code. It also accepts any
/// unrelated line of that shape (a bare `OK`, say).
pub fn next_line_code(next: Option<&str>) -> Option<&str> {
    let next = next?.trim();
    CODE_LINE.is_match(next).then_some(next)
}
