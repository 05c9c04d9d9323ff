//! Authorization codes from the bank's pay-detail settlement report.

use chrono::NaiveDate;
use serde::Serialize;
use tracing::debug;

use crate::config::{SettlementConfig, SETTLEMENT_FILE_PREFIX};
use crate::error::ReconError;
use crate::locate::locate_fields;
use crate::model::{ColumnLocation, Diagnostic, Grid};
use crate::normalize::{is_compact_date, normalize_date};

/// Codes pulled from one settlement grid plus how they were found.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SettlementExtraction {
    /// Trimmed code cells in row order; duplicates kept, blanks dropped.
    pub codes: Vec<String>,
    pub auth_column: ColumnLocation,
    pub date_column: Option<ColumnLocation>,
    pub date_filter_applied: bool,
    pub rows_scanned: usize,
    pub rows_excluded_by_date: usize,
    pub diagnostics: Vec<Diagnostic>,
}

/// Extract authorization codes, keeping only rows dated `target_date` when
/// both a target and a date column exist.
///
/// A missing auth-code header is an error. A missing date header, or a date
/// column where no cell normalizes to `YYYYMMDD`, only disables filtering.
pub fn extract_settlement(
    grid: &Grid,
    config: &SettlementConfig,
    target_date: Option<NaiveDate>,
) -> Result<SettlementExtraction, ReconError> {
    let located = locate_fields(grid, &[&config.auth_code, &config.trans_date], config.header_scan_rows);
    let auth_column = located[0].ok_or_else(|| ReconError::ColumnNotFound {
        field: config.auth_code.field.clone(),
        keywords: config.auth_code.keywords.clone(),
    })?;
    let date_column = located[1];
    debug!(?auth_column, ?date_column, "settlement columns located");

    let mut diagnostics = Vec::new();
    let target = match (target_date, date_column) {
        (Some(_), Some(date_col)) if !date_column_usable(grid, auth_column, date_col) => {
            diagnostics.push(Diagnostic::warning(
                "date_column_unusable",
                format!(
                    "no cell in the '{}' column at row {}, column {} is a recognizable date; \
                     settlement rows are not filtered by date",
                    config.trans_date.field,
                    date_col.row + 1,
                    date_col.col + 1
                ),
            ));
            None
        }
        (Some(date), Some(_)) => Some(date.format("%Y%m%d").to_string()),
        (Some(_), None) => {
            diagnostics.push(Diagnostic::info(
                "date_column_missing",
                format!(
                    "no '{}' column found; settlement rows are not filtered by date",
                    config.trans_date.field
                ),
            ));
            None
        }
        (None, _) => None,
    };

    let mut codes = Vec::new();
    let mut rows_scanned = 0;
    let mut rows_excluded_by_date = 0;

    for row in auth_column.data_start()..grid.height() {
        rows_scanned += 1;

        if let (Some(target), Some(date_col)) = (&target, date_column) {
            let date = grid
                .cell(row, date_col.col)
                .map(normalize_date)
                .unwrap_or_default();
            if date != *target {
                rows_excluded_by_date += 1;
                continue;
            }
        }

        let code = grid
            .cell(row, auth_column.col)
            .map(|c| c.as_text())
            .unwrap_or_default();
        let code = code.trim();
        if !code.is_empty() {
            codes.push(code.to_string());
        }
    }

    debug!(
        codes = codes.len(),
        rows_scanned, rows_excluded_by_date, "settlement extraction done"
    );

    Ok(SettlementExtraction {
        codes,
        auth_column,
        date_column,
        date_filter_applied: target.is_some(),
        rows_scanned,
        rows_excluded_by_date,
        diagnostics,
    })
}

/// Whether any data row's date cell normalizes to `YYYYMMDD`.
fn date_column_usable(grid: &Grid, auth_column: ColumnLocation, date_column: ColumnLocation) -> bool {
    (auth_column.data_start()..grid.height())
        .filter_map(|row| grid.cell(row, date_column.col))
        .any(|cell| is_compact_date(&normalize_date(cell)))
}

/// Codes only; see [`extract_settlement`].
pub fn extract_settlement_codes(
    grid: &Grid,
    config: &SettlementConfig,
    target_date: Option<NaiveDate>,
) -> Result<Vec<String>, ReconError> {
    extract_settlement(grid, config, target_date).map(|e| e.codes)
}

/// Warn when a settlement file doesn't follow the `PayDetailRpt*` naming.
pub fn check_filename(file_name: &str) -> Option<Diagnostic> {
    if file_name.starts_with(SETTLEMENT_FILE_PREFIX) {
        None
    } else {
        Some(Diagnostic::warning(
            "unexpected_file_name",
            format!("file name '{file_name}' does not start with '{SETTLEMENT_FILE_PREFIX}'"),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::CellValue;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn report() -> Grid {
        Grid::from_text_rows([
            vec!["交易日", "卡號", "授權碼", "金額"],
            vec!["20250703", "4311****", " 100200 ", "50"],
            vec!["250703", "5520****", "100300", "75"],
            vec!["2025/07/02", "4311****", "100400", "20"],
            vec!["20250703", "4311****", "", "10"],
            vec!["20250703", "4311****", "100200", "50"],
        ])
    }

    #[test]
    fn all_codes_without_target() {
        let out = extract_settlement(&report(), &SettlementConfig::default(), None).unwrap();
        assert_eq!(out.codes, vec!["100200", "100300", "100400", "100200"]);
        assert!(!out.date_filter_applied);
        assert_eq!(out.rows_scanned, 5);
        assert_eq!(out.auth_column, ColumnLocation { row: 0, col: 2 });
    }

    #[test]
    fn date_filter_keeps_matching_rows() {
        let out = extract_settlement(&report(), &SettlementConfig::default(), Some(date(2025, 7, 3))).unwrap();
        assert_eq!(out.codes, vec!["100200", "100300", "100200"]);
        assert!(out.date_filter_applied);
        assert_eq!(out.rows_excluded_by_date, 1);
    }

    #[test]
    fn missing_date_column_disables_filter() {
        let grid = Grid::from_text_rows([vec!["Auth Code"], vec!["AB12"], vec!["CD34"]]);
        let out = extract_settlement(&grid, &SettlementConfig::default(), Some(date(2025, 7, 3))).unwrap();
        assert_eq!(out.codes, vec!["AB12", "CD34"]);
        assert!(!out.date_filter_applied);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].code, "date_column_missing");
    }

    #[test]
    fn unrecognized_date_column_disables_filter() {
        let grid = Grid::from_text_rows([
            vec!["Trans Date", "Auth Code"],
            vec!["2025-07-03", "100200"],
            vec!["2025-07-03", "100300"],
        ]);
        let out = extract_settlement(&grid, &SettlementConfig::default(), Some(date(2025, 7, 3))).unwrap();
        assert_eq!(out.codes, vec!["100200", "100300"]);
        assert!(!out.date_filter_applied);
        assert_eq!(out.rows_excluded_by_date, 0);
        assert_eq!(out.diagnostics.len(), 1);
        assert_eq!(out.diagnostics[0].code, "date_column_unusable");
    }

    #[test]
    fn partly_bad_dates_still_filter() {
        let grid = Grid::from_text_rows([
            vec!["Trans Date", "Auth Code"],
            vec!["2025-07-03", "100200"],
            vec!["20250703", "100300"],
        ]);
        let out = extract_settlement(&grid, &SettlementConfig::default(), Some(date(2025, 7, 3))).unwrap();
        assert_eq!(out.codes, vec!["100300"]);
        assert!(out.date_filter_applied);
        assert_eq!(out.rows_excluded_by_date, 1);
        assert!(out.diagnostics.is_empty());
    }

    #[test]
    fn missing_auth_column_is_error() {
        let grid = Grid::from_text_rows([vec!["交易日", "金額"], vec!["20250703", "50"]]);
        let err = extract_settlement(&grid, &SettlementConfig::default(), None).unwrap_err();
        assert_eq!(err.code(), "column_not_found");
        assert!(err.to_string().contains("授權碼"));
    }

    #[test]
    fn numeric_and_date_cells() {
        let dt = date(2025, 7, 3).and_hms_opt(0, 0, 0).unwrap();
        let grid = Grid::new(vec![
            vec![CellValue::from("Trans Date"), CellValue::from("Auth")],
            vec![CellValue::Date(dt), CellValue::Number(100200.0)],
            vec![CellValue::Number(20250704.0), CellValue::Number(100300.0)],
            vec![CellValue::Text("bad date".into()), CellValue::Number(100400.0)],
        ]);
        let codes =
            extract_settlement_codes(&grid, &SettlementConfig::default(), Some(date(2025, 7, 3))).unwrap();
        assert_eq!(codes, vec!["100200"]);
    }

    #[test]
    fn data_starts_below_offset_header() {
        let grid = Grid::from_text_rows([
            vec!["Settlement detail", "", ""],
            vec!["", "", ""],
            vec!["", "", ""],
            vec!["No", "Card", "授權碼"],
            vec!["1", "4311", "AA11"],
            vec!["2", "4312", "BB22"],
        ]);
        let codes = extract_settlement_codes(&grid, &SettlementConfig::default(), None).unwrap();
        assert_eq!(codes, vec!["AA11", "BB22"]);
    }

    #[test]
    fn filename_convention() {
        assert!(check_filename("PayDetailRpt_20250703.xlsx").is_none());
        let diag = check_filename("export.xlsx").unwrap();
        assert_eq!(diag.code, "unexpected_file_name");
    }
}
