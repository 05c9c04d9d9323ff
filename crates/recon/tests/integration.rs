use chrono::NaiveDate;

use edcrecon_recon::config::{ReconOptions, SettlementConfig};
use edcrecon_recon::log::parse_cutoff;
use edcrecon_recon::model::{Grid, ReconMode};
use edcrecon_recon::{
    extract_log, extract_log_codes, extract_settlement, extract_settlement_codes, reconcile, CacheKey,
    ExtractionCache, LogFilter, ReconError,
};

fn target() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 7, 3).unwrap()
}

fn paydetail() -> Grid {
    Grid::from_text_rows([
        vec!["PayDetailRpt", "", "", "", ""],
        vec!["商店代號: 0123456789", "", "", "", ""],
        vec!["", "", "", "", ""],
        vec!["序號", "交易日", "卡號", "授權碼", "金額"],
        vec!["1", "20250703", "4311********1234", "100200", "50"],
        vec!["2", "20250703", "5520********9876", "100300", "75"],
        vec!["3", "20250703", "4311********1234", "A1B2C3", "30"],
        vec!["4", "20250702", "4311********5555", "999999", "20"],
        vec!["5", "250703", "3566********0001", "100200", "50"],
    ])
}

const LOG: &str = "\
2025-07-03_08:00:00 [BOOT] EDC ready
2025-07-03_09:12:44 [EDC] sale approved Approval ID: 100200
2025-07-03_10:03:10 [EDC] sale approved Approval ID:
A1B2C3
2025-07-03_11:40:00 [NET] connection lost
2025-07-03_16:20:00 [EDC] sale approved Approval ID: 100200
2025-07-02_23:59:00 [EDC] sale approved Approval ID: 999999
";

// -------------------------------------------------------------------------
// Settlement vs log, set mode
// -------------------------------------------------------------------------

#[test]
fn set_mode_flags_missing_code() {
    let settlement = extract_settlement_codes(&paydetail(), &SettlementConfig::default(), Some(target())).unwrap();
    assert_eq!(settlement, vec!["100200", "100300", "A1B2C3", "100200"]);

    let filter = LogFilter {
        target_date: Some(target()),
        cutoff: None,
    };
    let log = extract_log_codes(LOG, &filter);
    assert_eq!(log, vec!["100200", "A1B2C3", "100200"]);

    let result = reconcile(&settlement, &log, &ReconOptions::default());
    let unmatched: Vec<&str> = result.unmatched.iter().map(|c| c.raw.as_str()).collect();
    assert_eq!(unmatched, vec!["100300"]);
    assert_eq!(result.summary.settlement_total, 4);
    assert_eq!(result.summary.settlement_unique, 3);
    assert_eq!(result.summary.log_unique, 2);
    assert_eq!(result.summary.intersection, 2);
    assert!(result.log_only.is_empty());
    assert!(result.warnings.is_empty());
}

#[test]
fn multiset_mode_counts_duplicates() {
    let settlement = extract_settlement_codes(&paydetail(), &SettlementConfig::default(), Some(target())).unwrap();
    let filter = LogFilter {
        target_date: Some(target()),
        cutoff: Some(parse_cutoff("15:00:00").unwrap()),
    };
    // The 16:20 sale falls after the cutoff, so one 100200 is unmatched.
    let log = extract_log_codes(LOG, &filter);
    assert_eq!(log, vec!["100200", "A1B2C3"]);

    let result = reconcile(&settlement, &log, &ReconOptions::for_mode(ReconMode::Multiset));
    let unmatched: Vec<&str> = result.unmatched.iter().map(|c| c.normalized.as_str()).collect();
    assert_eq!(unmatched, vec!["100200", "100300"]);
}

#[test]
fn extraction_reports_counters() {
    let filter = LogFilter {
        target_date: Some(target()),
        cutoff: Some(parse_cutoff("15:00").unwrap()),
    };
    let out = extract_log(LOG, &filter);
    assert_eq!(out.lines_scanned, 7);
    assert_eq!(out.candidate_lines, 3);
    assert_eq!(out.skipped_after_cutoff, 1);
    assert!(out.records[1].from_next_line);

    let settlement = extract_settlement(&paydetail(), &SettlementConfig::default(), Some(target())).unwrap();
    assert_eq!(settlement.auth_column.row, 3);
    assert_eq!(settlement.auth_column.col, 3);
    assert_eq!(settlement.rows_scanned, 5);
    assert_eq!(settlement.rows_excluded_by_date, 1);
}

#[test]
fn missing_column_degrades_to_empty() {
    let grid = Grid::from_text_rows([vec!["Date", "Amount"], vec!["20250703", "10"]]);
    let codes = match extract_settlement_codes(&grid, &SettlementConfig::default(), None) {
        Ok(codes) => codes,
        Err(ReconError::ColumnNotFound { .. }) => Vec::new(),
        Err(e) => panic!("unexpected error: {e}"),
    };
    let result = reconcile(&codes, &["100200"], &ReconOptions::default());
    assert_eq!(result.summary.settlement_total, 0);
    assert_eq!(result.log_only.len(), 1);
    assert_eq!(result.warnings.len(), 1);
}

#[test]
fn dashed_dates_still_surface_missing_codes() {
    let grid = Grid::from_text_rows([
        vec!["Trans Date", "Auth Code"],
        vec!["2025-07-03", "100200"],
        vec!["2025-07-03", "100300"],
    ]);
    let extraction = extract_settlement(&grid, &SettlementConfig::default(), Some(target())).unwrap();
    assert!(!extraction.date_filter_applied);
    assert_eq!(extraction.diagnostics[0].code, "date_column_unusable");

    let result = reconcile(&extraction.codes, &["100200"], &ReconOptions::default());
    let unmatched: Vec<&str> = result.unmatched.iter().map(|c| c.raw.as_str()).collect();
    assert_eq!(unmatched, vec!["100300"]);
}

#[test]
fn cache_reuses_log_extraction() {
    let mut cache = ExtractionCache::new();
    let filter = LogFilter {
        target_date: Some(target()),
        cutoff: None,
    };
    let fp = filter.fingerprint();
    let key = CacheKey::new("log", LOG.as_bytes(), &[fp.as_str()]);
    let first = cache
        .get_or_try_insert(key, || Ok::<_, ReconError>(extract_log_codes(LOG, &filter)))
        .unwrap();
    let second = cache
        .get_or_try_insert(key, || Ok::<_, ReconError>(Vec::new()))
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(cache.hits(), 1);

    let changed = format!("{LOG}2025-07-03_12:00:00 Approval ID: ZZ99\n");
    let key2 = CacheKey::new("log", changed.as_bytes(), &[fp.as_str()]);
    let third = cache
        .get_or_try_insert(key2, || Ok::<_, ReconError>(extract_log_codes(&changed, &filter)))
        .unwrap();
    assert_eq!(third.last().map(String::as_str), Some("ZZ99"));
    assert_eq!(cache.misses(), 2);
}
