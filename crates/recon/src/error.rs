use std::fmt;

use crate::model::Diagnostic;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReconError {
    /// Settlement bytes could not be parsed as a spreadsheet or CSV.
    UnreadableSpreadsheet(String),
    /// A required header was not found within the bounded header scan.
    ColumnNotFound { field: String, keywords: Vec<String> },
    /// A user-supplied target date or cutoff time is malformed.
    InvalidFilter(String),
}

impl ReconError {
    /// Stable identifier used in diagnostics and JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            Self::UnreadableSpreadsheet(_) => "unreadable_spreadsheet",
            Self::ColumnNotFound { .. } => "column_not_found",
            Self::InvalidFilter(_) => "invalid_filter",
        }
    }

    /// Degrade to a diagnostic for callers that continue with zero codes.
    pub fn to_diagnostic(&self) -> Diagnostic {
        Diagnostic::error(self.code(), self.to_string())
    }
}

impl fmt::Display for ReconError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnreadableSpreadsheet(msg) => {
                write!(f, "cannot read settlement file (expected .xls/.xlsx/.csv): {msg}")
            }
            Self::ColumnNotFound { field, keywords } => {
                write!(f, "no '{field}' column found (looked for: {})", keywords.join(", "))
            }
            Self::InvalidFilter(msg) => write!(f, "invalid filter: {msg}"),
        }
    }
}

impl std::error::Error for ReconError {}
