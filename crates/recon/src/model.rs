use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use serde::Serialize;

// ---------------------------------------------------------------------------
// Tabular input
// ---------------------------------------------------------------------------

/// One cell of a materialized spreadsheet/CSV grid.
#[derive(Debug, Clone, PartialEq)]
pub enum CellValue {
    Empty,
    Text(String),
    Number(f64),
    /// A cell the source format marked as a date or date-time.
    Date(NaiveDateTime),
}

impl CellValue {
    /// Display text of the cell. Integral numbers render without decimals,
    /// so a code stored as `123456.0` reads back as `"123456"`.
    pub fn as_text(&self) -> String {
        match self {
            Self::Empty => String::new(),
            Self::Text(s) => s.clone(),
            Self::Number(n) => {
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    format!("{}", *n as i64)
                } else {
                    format!("{}", n)
                }
            }
            Self::Date(dt) => {
                if dt.time() == NaiveTime::MIN {
                    dt.format("%Y-%m-%d").to_string()
                } else {
                    dt.format("%Y-%m-%d %H:%M:%S").to_string()
                }
            }
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Self::Empty => true,
            Self::Text(s) => s.trim().is_empty(),
            _ => false,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        if s.is_empty() {
            Self::Empty
        } else {
            Self::Text(s.to_string())
        }
    }
}

/// Row-major cell grid. Rows may have different lengths.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Grid {
    rows: Vec<Vec<CellValue>>,
}

impl Grid {
    pub fn new(rows: Vec<Vec<CellValue>>) -> Self {
        Self { rows }
    }

    /// Build a grid of text cells; empty strings become `CellValue::Empty`.
    pub fn from_text_rows<R, S>(rows: R) -> Self
    where
        R: IntoIterator,
        R::Item: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            rows: rows
                .into_iter()
                .map(|row| row.into_iter().map(|s| CellValue::from(s.as_ref())).collect())
                .collect(),
        }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn row(&self, row: usize) -> Option<&[CellValue]> {
        self.rows.get(row).map(|r| r.as_slice())
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&CellValue> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    pub fn rows(&self) -> impl Iterator<Item = &[CellValue]> {
        self.rows.iter().map(|r| r.as_slice())
    }
}

/// Where a named field's header cell was found. Data starts at `row + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ColumnLocation {
    pub row: usize,
    pub col: usize,
}

impl ColumnLocation {
    pub fn data_start(&self) -> usize {
        self.row + 1
    }
}

// ---------------------------------------------------------------------------
// Log input
// ---------------------------------------------------------------------------

/// One authorization code recovered from the terminal log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LogRecord {
    /// 1-based line number of the `Approval ID` line.
    pub line: usize,
    pub date: Option<NaiveDate>,
    pub time: Option<NaiveTime>,
    pub code: String,
    /// True when the code was taken from the line after the marker.
    pub from_next_line: bool,
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// An authorization code in both forms: raw for display, normalized for matching.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct AuthCode {
    pub normalized: String,
    pub raw: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconMode {
    /// Unique codes; duplicates collapse.
    #[default]
    Set,
    /// Occurrence counts matter; `A×3` vs `A×1` leaves two unmatched `A`.
    Multiset,
}

impl std::fmt::Display for ReconMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Set => write!(f, "set"),
            Self::Multiset => write!(f, "multiset"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconSummary {
    pub settlement_total: usize,
    pub settlement_unique: usize,
    pub log_total: usize,
    pub log_unique: usize,
    /// Unique codes present on both sides.
    pub intersection: usize,
    pub unmatched: usize,
    pub log_only: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ReconWarning {
    /// The device logged more transactions than the bank settled.
    LogExceedsSettlement { settlement_total: usize, log_total: usize },
}

impl std::fmt::Display for ReconWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LogExceedsSettlement { settlement_total, log_total } => write!(
                f,
                "log has more codes ({log_total}) than the settlement file ({settlement_total})"
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReconResult {
    pub mode: ReconMode,
    pub pad_width: Option<usize>,
    pub summary: ReconSummary,
    /// Settlement codes missing from the log.
    pub unmatched: Vec<AuthCode>,
    /// Log codes missing from the settlement file.
    pub log_only: Vec<AuthCode>,
    pub warnings: Vec<ReconWarning>,
}

impl ReconResult {
    pub fn is_reconciled(&self) -> bool {
        self.unmatched.is_empty()
    }
}

// ---------------------------------------------------------------------------
// Diagnostics
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Info => write!(f, "note"),
            Self::Warning => write!(f, "warning"),
            Self::Error => write!(f, "error"),
        }
    }
}

/// A non-fatal finding surfaced alongside results instead of aborting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub code: &'static str,
    pub message: String,
}

impl Diagnostic {
    pub fn info(code: &'static str, message: impl Into<String>) -> Self {
        Self { severity: Severity::Info, code, message: message.into() }
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self { severity: Severity::Warning, code, message: message.into() }
    }

    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self { severity: Severity::Error, code, message: message.into() }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)
    }
}
