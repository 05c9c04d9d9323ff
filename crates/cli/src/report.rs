//! Run report: the JSON contract and the human rendering.

use std::io::{self, Write};

use edcrecon_io::{DecodedText, LoadedGrid};
use edcrecon_recon::{
    AuthCode, ColumnLocation, Diagnostic, LogExtraction, ReconMode, ReconResult, Severity,
    SettlementExtraction,
};
use serde::Serialize;

/// Bump when a field is removed or changes meaning.
pub const REPORT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Serialize)]
pub struct Report {
    pub schema_version: u32,
    pub meta: ReportMeta,
    pub inputs: ReportInputs,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub settlement: Option<SettlementStats>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log: Option<LogStats>,
    pub diagnostics: Vec<Diagnostic>,
    pub result: ReconResult,
}

#[derive(Debug, Serialize)]
pub struct ReportMeta {
    pub engine_version: &'static str,
    pub run_at: String,
}

impl ReportMeta {
    pub fn now() -> Self {
        Self {
            engine_version: env!("CARGO_PKG_VERSION"),
            run_at: chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ReportInputs {
    pub paydetail: String,
    /// Local path or fetched URL.
    pub log: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub target_date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cutoff: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettlementStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sheet: Option<String>,
    pub auth_column: ColumnLocation,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date_column: Option<ColumnLocation>,
    pub date_filter_applied: bool,
    pub rows_scanned: usize,
    pub rows_excluded_by_date: usize,
    pub codes: usize,
}

impl SettlementStats {
    pub fn new(loaded: &LoadedGrid, extraction: &SettlementExtraction) -> Self {
        Self {
            sheet: loaded.sheet.clone(),
            auth_column: extraction.auth_column,
            date_column: extraction.date_column,
            date_filter_applied: extraction.date_filter_applied,
            rows_scanned: extraction.rows_scanned,
            rows_excluded_by_date: extraction.rows_excluded_by_date,
            codes: extraction.codes.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LogStats {
    pub encoding: &'static str,
    pub lines_scanned: usize,
    pub candidate_lines: usize,
    pub skipped_no_time: usize,
    pub skipped_after_cutoff: usize,
    pub skipped_no_code: usize,
    pub codes: usize,
    /// Codes recovered from the line after `Approval ID`.
    pub next_line_codes: usize,
}

impl LogStats {
    pub fn new(decoded: &DecodedText, extraction: &LogExtraction) -> Self {
        Self {
            encoding: decoded.encoding,
            lines_scanned: extraction.lines_scanned,
            candidate_lines: extraction.candidate_lines,
            skipped_no_time: extraction.skipped_no_time,
            skipped_after_cutoff: extraction.skipped_after_cutoff,
            skipped_no_code: extraction.skipped_no_code,
            codes: extraction.records.len(),
            next_line_codes: extraction.records.iter().filter(|r| r.from_next_line).count(),
        }
    }
}

impl Report {
    pub fn to_json(&self) -> String {
        // Report contains only strings, numbers and enums; serialization cannot fail.
        serde_json::to_string_pretty(self).unwrap_or_default()
    }

    /// Human-readable report for a terminal.
    pub fn render(&self, out: &mut impl Write, show_log_only: bool) -> io::Result<()> {
        let r = &self.result;
        let s = &r.summary;

        writeln!(out, "Mode:        {}{}", r.mode, pad_suffix(r.pad_width))?;
        writeln!(out, "Settlement:  {} codes ({} unique)", s.settlement_total, s.settlement_unique)?;
        writeln!(out, "Log:         {} codes ({} unique)", s.log_total, s.log_unique)?;
        writeln!(out, "Matched:     {} unique", s.intersection)?;
        writeln!(out)?;

        if r.unmatched.is_empty() {
            writeln!(out, "All settlement codes were found in the log.")?;
        } else {
            writeln!(out, "{} settlement code(s) missing from the log:", r.unmatched.len())?;
            render_codes(out, &r.unmatched, r.mode)?;
        }

        if show_log_only {
            writeln!(out)?;
            if r.log_only.is_empty() {
                writeln!(out, "No log codes are missing from the settlement file.")?;
            } else {
                writeln!(out, "{} log code(s) missing from the settlement file:", r.log_only.len())?;
                render_codes(out, &r.log_only, r.mode)?;
            }
        }

        let errors = self.count(Severity::Error);
        let warnings = self.count(Severity::Warning) + r.warnings.len();
        if errors + warnings > 0 {
            writeln!(out)?;
            writeln!(out, "{} error(s), {} warning(s); see stderr", errors, warnings)?;
        }
        Ok(())
    }

    fn count(&self, severity: Severity) -> usize {
        self.diagnostics.iter().filter(|d| d.severity == severity).count()
    }

    /// Diagnostics and reconciliation warnings, one per line.
    pub fn render_diagnostics(&self, err: &mut impl Write) -> io::Result<()> {
        for d in &self.diagnostics {
            writeln!(err, "{}", d)?;
        }
        for w in &self.result.warnings {
            writeln!(err, "warning: {}", w)?;
        }
        Ok(())
    }
}

fn pad_suffix(pad_width: Option<usize>) -> String {
    match pad_width {
        Some(w) => format!(" (zero-padded to {})", w),
        None => String::new(),
    }
}

fn render_codes(out: &mut impl Write, codes: &[AuthCode], mode: ReconMode) -> io::Result<()> {
    match mode {
        ReconMode::Set => {
            for code in codes {
                writeln!(out, "  {}", display_code(code))?;
            }
        }
        ReconMode::Multiset => {
            // Sorted by normalized code, so equal codes are adjacent.
            let mut i = 0;
            while i < codes.len() {
                let run = codes[i..].iter().take_while(|c| c.normalized == codes[i].normalized).count();
                if run > 1 {
                    writeln!(out, "  {}  x{}", display_code(&codes[i]), run)?;
                } else {
                    writeln!(out, "  {}", display_code(&codes[i]))?;
                }
                i += run;
            }
        }
    }
    Ok(())
}

fn display_code(code: &AuthCode) -> String {
    if code.raw.trim() == code.normalized {
        code.normalized.clone()
    } else {
        format!("{} (as '{}')", code.normalized, code.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use edcrecon_recon::{reconcile, ReconOptions};

    fn report(result: ReconResult) -> Report {
        Report {
            schema_version: REPORT_SCHEMA_VERSION,
            meta: ReportMeta { engine_version: "test", run_at: "2025-07-03T00:00:00Z".into() },
            inputs: ReportInputs {
                paydetail: "PayDetailRpt.xlsx".into(),
                log: "20250703_ui.txt".into(),
                target_date: Some("2025-07-03".into()),
                cutoff: None,
            },
            settlement: None,
            log: None,
            diagnostics: vec![Diagnostic::warning("unexpected_file_name", "odd name")],
            result,
        }
    }

    fn rendered(report: &Report, log_only: bool) -> String {
        let mut buf = Vec::new();
        report.render(&mut buf, log_only).unwrap();
        String::from_utf8(buf).unwrap()
    }

    #[test]
    fn renders_unmatched() {
        let r = report(reconcile(&["100200", "100300"], &["100200", "Z9"], &ReconOptions::default()));
        let text = rendered(&r, false);
        assert!(text.contains("1 settlement code(s) missing from the log:\n  100300\n"));
        assert!(!text.contains("Z9"));
        assert!(text.contains("0 error(s), 1 warning(s)"));

        let text = rendered(&r, true);
        assert!(text.contains("1 log code(s) missing from the settlement file:\n  Z9\n"));
    }

    #[test]
    fn multiset_groups_repeats() {
        let opts = ReconOptions::for_mode(ReconMode::Multiset);
        let r = report(reconcile(&["1234", "1234", "1234", "5678"], &["1234"], &opts));
        let text = rendered(&r, false);
        assert!(text.contains("Mode:        multiset (zero-padded to 6)"));
        assert!(text.contains("  001234 (as '1234')  x2\n"));
        assert!(text.contains("  005678 (as '5678')\n"));
    }

    #[test]
    fn json_contract() {
        let r = report(reconcile(&["A1"], &["A1"], &ReconOptions::default()));
        let json: serde_json::Value = serde_json::from_str(&r.to_json()).unwrap();
        assert_eq!(json["schema_version"], 1);
        assert_eq!(json["result"]["mode"], "set");
        assert_eq!(json["result"]["summary"]["intersection"], 1);
        assert_eq!(json["diagnostics"][0]["severity"], "warning");
        assert_eq!(json["diagnostics"][0]["code"], "unexpected_file_name");
        assert!(json.get("settlement").is_none());
        assert!(json["inputs"].get("cutoff").is_none());
    }
}
