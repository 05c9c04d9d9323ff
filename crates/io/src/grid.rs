// Settlement grid loading: Excel workbooks (xlsx, xls, xlsb, ods) and CSV/TSV

use std::io::Cursor;
use std::path::Path;

use calamine::{open_workbook_auto_from_rs, Data, Reader};
use chrono::{Duration, NaiveDate, NaiveDateTime};
use edcrecon_recon::{CellValue, Diagnostic, Grid, ReconError};
use tracing::debug;

use crate::text::decode_text;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = b"\xD0\xCF\x11\xE0\xA1\xB1\x1A\xE1";

/// Days from the Excel 1900 epoch to 9999-12-31.
const MAX_EXCEL_SERIAL: f64 = 2_958_465.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GridFormat {
    /// Any format calamine opens.
    Workbook,
    /// Delimiter-separated text; the delimiter is sniffed.
    Delimited,
}

impl GridFormat {
    /// Container magic wins over the file extension, so a CSV-named export
    /// that is really a workbook still opens.
    pub fn detect(path: Option<&Path>, bytes: &[u8]) -> Self {
        if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
            return Self::Workbook;
        }
        let ext = path
            .and_then(|p| p.extension())
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase());
        match ext.as_deref() {
            Some("csv" | "tsv" | "txt") => Self::Delimited,
            _ => Self::Workbook,
        }
    }
}

/// A materialized first sheet plus anything noteworthy about reading it.
#[derive(Debug, Clone)]
pub struct LoadedGrid {
    pub grid: Grid,
    pub format: GridFormat,
    /// Sheet name for workbooks, `None` for delimited text.
    pub sheet: Option<String>,
    pub diagnostics: Vec<Diagnostic>,
}

/// Parse settlement bytes into a grid. Only the first sheet of a workbook
/// is read; rows are relative to the sheet's used range.
pub fn load_grid(bytes: &[u8], format: GridFormat) -> Result<LoadedGrid, ReconError> {
    match format {
        GridFormat::Workbook => load_workbook(bytes),
        GridFormat::Delimited => load_delimited(bytes),
    }
}

fn load_workbook(bytes: &[u8]) -> Result<LoadedGrid, ReconError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| ReconError::UnreadableSpreadsheet(e.to_string()))?;

    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();
    let Some(sheet_name) = sheet_names.first().cloned() else {
        return Err(ReconError::UnreadableSpreadsheet("workbook contains no sheets".to_string()));
    };

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| ReconError::UnreadableSpreadsheet(format!("sheet '{}': {}", sheet_name, e)))?;

    let rows: Vec<Vec<CellValue>> = range
        .rows()
        .map(|row| row.iter().map(cell_value).collect())
        .collect();
    debug!(sheet = %sheet_name, rows = rows.len(), sheets = sheet_names.len(), "workbook loaded");

    let mut diagnostics = Vec::new();
    if sheet_names.len() > 1 {
        diagnostics.push(Diagnostic::info(
            "extra_sheets_ignored",
            format!("read sheet '{}'; {} other sheet(s) ignored", sheet_name, sheet_names.len() - 1),
        ));
    }

    Ok(LoadedGrid {
        grid: Grid::new(rows),
        format: GridFormat::Workbook,
        sheet: Some(sheet_name),
        diagnostics,
    })
}

fn cell_value(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::from(s.as_str()),
        Data::Float(n) => CellValue::Number(*n),
        Data::Int(n) => CellValue::Number(*n as f64),
        Data::Bool(b) => CellValue::Text(if *b { "TRUE" } else { "FALSE" }.to_string()),
        // An error cell carries no code or date.
        Data::Error(_) => CellValue::Empty,
        Data::DateTime(dt) => match excel_serial_to_datetime(dt.as_f64()) {
            Some(dt) => CellValue::Date(dt),
            None => CellValue::Number(dt.as_f64()),
        },
        Data::DateTimeIso(s) => parse_iso_datetime(s).map_or_else(|| CellValue::from(s.as_str()), CellValue::Date),
        Data::DurationIso(s) => CellValue::from(s.as_str()),
    }
}

/// Convert an Excel serial (1900 date system) to a date-time.
///
/// Serials before 1900-03-01 are off by one day because of Excel's
/// phantom 1900-02-29; settlement dates never fall there.
fn excel_serial_to_datetime(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() || !(0.0..=MAX_EXCEL_SERIAL).contains(&serial) {
        return None;
    }
    let epoch = NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)?;
    let seconds = (serial * 86_400.0).round() as i64;
    epoch.checked_add_signed(Duration::seconds(seconds))
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0))
}

fn load_delimited(bytes: &[u8]) -> Result<LoadedGrid, ReconError> {
    let decoded = decode_text(bytes);
    let delimiter = sniff_delimiter(&decoded.text);

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .has_headers(false)
        .flexible(true)
        .from_reader(decoded.text.as_bytes());

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result.map_err(|e| ReconError::UnreadableSpreadsheet(e.to_string()))?;
        rows.push(record.iter().map(CellValue::from).collect());
    }
    debug!(rows = rows.len(), delimiter = %(delimiter as char).escape_default(), encoding = decoded.encoding, "delimited text loaded");

    Ok(LoadedGrid {
        grid: Grid::new(rows),
        format: GridFormat::Delimited,
        sheet: None,
        diagnostics: decoded.diagnostic("settlement").into_iter().collect(),
    })
}

/// Detect the most likely field delimiter by checking consistency across the first few lines.
///
/// Bank exports put a few free-text banner lines above the header, so the
/// widest consistent split wins rather than whatever the first line says.
fn sniff_delimiter(content: &str) -> u8 {
    let candidates: &[u8] = &[b'\t', b';', b',', b'|'];
    let sample_lines: Vec<&str> = content.lines().filter(|l| !l.trim().is_empty()).take(10).collect();

    let mut best = b',';
    let mut best_score = 0usize;

    for &delim in candidates {
        let counts: Vec<usize> = sample_lines
            .iter()
            .map(|line| {
                csv::ReaderBuilder::new()
                    .delimiter(delim)
                    .has_headers(false)
                    .flexible(true)
                    .from_reader(line.as_bytes())
                    .records()
                    .next()
                    .and_then(|r| r.ok())
                    .map(|r| r.len())
                    .unwrap_or(1)
            })
            .collect();

        let Some(&widest) = counts.iter().max() else { continue };
        if widest <= 1 {
            continue;
        }

        // Lines agreeing with the widest split, weighted by its field count
        let consistent = counts.iter().filter(|&&c| c == widest).count();
        let score = consistent * widest;
        if score > best_score {
            best_score = score;
            best = delim;
        }
    }

    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_xlsxwriter::{Format, Workbook as XlsxWorkbook};

    fn write_paydetail_xlsx(path: &Path) {
        let mut workbook = XlsxWorkbook::new();
        let date_format = Format::new().set_num_format("yyyy-mm-dd");
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "PayDetailRpt").unwrap();
        sheet.write_string(2, 0, "交易日").unwrap();
        sheet.write_string(2, 1, "授權碼").unwrap();
        // 45841 = 2025-07-03
        sheet.write_number_with_format(3, 0, 45841.0, &date_format).unwrap();
        sheet.write_number(3, 1, 100200.0).unwrap();
        sheet.write_string(4, 0, "20250703").unwrap();
        sheet.write_string(4, 1, "A1B2C3").unwrap();
        workbook.save(path).unwrap();
    }

    #[test]
    fn xlsx_first_sheet() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("PayDetailRpt_20250703.xlsx");
        write_paydetail_xlsx(&path);
        let bytes = std::fs::read(&path).unwrap();

        assert_eq!(GridFormat::detect(Some(&path), &bytes), GridFormat::Workbook);
        let loaded = load_grid(&bytes, GridFormat::Workbook).unwrap();
        assert_eq!(loaded.sheet.as_deref(), Some("Sheet1"));

        let grid = &loaded.grid;
        assert_eq!(grid.cell(2, 1).map(|c| c.as_text()).as_deref(), Some("授權碼"));
        assert_eq!(grid.cell(3, 1), Some(&CellValue::Number(100200.0)));
        let expected = NaiveDate::from_ymd_opt(2025, 7, 3).unwrap().and_hms_opt(0, 0, 0).unwrap();
        assert_eq!(grid.cell(3, 0), Some(&CellValue::Date(expected)));
        assert_eq!(grid.cell(4, 0).map(|c| c.as_text()).as_deref(), Some("20250703"));
    }

    #[test]
    fn csv_with_banner_lines() {
        let text = "PayDetailRpt\n商店代號: 0123456789\n交易日,卡號,授權碼\n20250703,4311,100200\n20250703,5520,\n";
        let path = Path::new("paydetail.csv");
        assert_eq!(GridFormat::detect(Some(path), text.as_bytes()), GridFormat::Delimited);

        let loaded = load_grid(text.as_bytes(), GridFormat::Delimited).unwrap();
        assert!(loaded.diagnostics.is_empty());
        let grid = &loaded.grid;
        assert_eq!(grid.height(), 5);
        assert_eq!(grid.cell(2, 2).map(|c| c.as_text()).as_deref(), Some("授權碼"));
        assert_eq!(grid.cell(4, 2), Some(&CellValue::Empty));
    }

    #[test]
    fn tsv_big5() {
        let (encoded, _, _) = encoding_rs::BIG5.encode("交易日\t授權碼\n20250703\t100200\n");
        let loaded = load_grid(&encoded, GridFormat::Delimited).unwrap();
        assert_eq!(loaded.grid.cell(0, 1).map(|c| c.as_text()).as_deref(), Some("授權碼"));
        assert_eq!(loaded.diagnostics[0].code, "fallback_encoding");
    }

    #[test]
    fn sniff_prefers_consistent_split() {
        assert_eq!(sniff_delimiter("a;b;c\n1;2;3\n"), b';');
        assert_eq!(sniff_delimiter("banner\nx\ty\tz\n1\t2\t3\n"), b'\t');
        assert_eq!(sniff_delimiter("single"), b',');
        assert_eq!(sniff_delimiter(""), b',');
    }

    #[test]
    fn magic_overrides_extension() {
        assert_eq!(GridFormat::detect(Some(Path::new("x.csv")), b"PK\x03\x04rest"), GridFormat::Workbook);
        assert_eq!(GridFormat::detect(Some(Path::new("x.XLS")), b"plain"), GridFormat::Workbook);
        assert_eq!(GridFormat::detect(None, b"a,b"), GridFormat::Workbook);
    }

    #[test]
    fn garbage_is_unreadable() {
        let err = load_grid(b"definitely not a workbook", GridFormat::Workbook).unwrap_err();
        assert!(matches!(err, ReconError::UnreadableSpreadsheet(_)));
        assert_eq!(err.code(), "unreadable_spreadsheet");
    }

    #[test]
    fn serial_conversion() {
        let dt = excel_serial_to_datetime(45841.5).unwrap();
        assert_eq!(dt.format("%Y-%m-%d %H:%M").to_string(), "2025-07-03 12:00");
        assert!(excel_serial_to_datetime(-1.0).is_none());
        assert!(excel_serial_to_datetime(f64::NAN).is_none());
        assert_eq!(
            parse_iso_datetime("2025-07-03"),
            NaiveDate::from_ymd_opt(2025, 7, 3).unwrap().and_hms_opt(0, 0, 0)
        );
    }
}
