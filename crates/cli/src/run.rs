//! `edcrecon run`: load both sources, extract, reconcile, report.
//!
//! Settlement problems (unreadable file, no authorization-code column)
//! degrade to zero codes plus an error diagnostic so the log side is still
//! reported. Log problems are fatal: a missing local file exits 3, a failed
//! fetch exits 50-54.

use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::Args;
use edcrecon_io::{decode_text, load_grid, GridFormat};
use edcrecon_recon::settlement::check_filename;
use edcrecon_recon::{
    extract_log, extract_settlement, reconcile, CacheKey, Diagnostic, ExtractionCache, LogFilter,
    ReconError, ReconOptions, SettlementConfig,
};
use tracing::{debug, info};

use crate::exit_codes::EXIT_UNMATCHED;
use crate::report::{LogStats, Report, ReportInputs, ReportMeta, SettlementStats, REPORT_SCHEMA_VERSION};
use crate::{parse_cutoff_arg, parse_date_arg, read_input, sync, write_output, CliError, HeaderArgs, ModeArg};

#[derive(Args)]
pub struct RunArgs {
    /// Bank pay-detail report (xls, xlsx, xlsb, ods, csv, tsv)
    #[arg(long, value_name = "FILE")]
    pub paydetail: PathBuf,

    /// Terminal UI log on disk
    #[arg(long, value_name = "FILE", conflicts_with = "mac", required_unless_present = "mac")]
    pub log: Option<PathBuf>,

    /// Fetch the log for this terminal MAC from the sync server
    #[arg(long)]
    pub mac: Option<String>,

    /// Sync server host, optionally with scheme and port
    #[arg(long, env = "EDCRECON_HOST")]
    pub host: Option<String>,

    /// Day to reconcile (YYYYMMDD, YYMMDD or YYYY/MM/DD); filters both sources
    #[arg(long)]
    pub date: Option<String>,

    /// Ignore log records after this time of day (HH:MM[:SS], inclusive)
    #[arg(long)]
    pub cutoff: Option<String>,

    /// Set compares unique codes; multiset compares occurrence counts
    #[arg(long, value_enum, default_value = "set")]
    pub mode: ModeArg,

    /// Zero-pad codes to this width before comparing (multiset default: 6)
    #[arg(long, value_name = "N", conflicts_with = "no_pad")]
    pub pad_width: Option<usize>,

    /// Compare codes exactly as trimmed, even in multiset mode
    #[arg(long)]
    pub no_pad: bool,

    /// Also list log codes missing from the settlement file
    #[arg(long)]
    pub log_only: bool,

    /// Print the JSON report on stdout instead of the summary
    #[arg(long)]
    pub json: bool,

    /// Also write the JSON report to this file
    #[arg(long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Keep a copy of the fetched log
    #[arg(long, value_name = "FILE", requires = "mac")]
    pub save_log: Option<PathBuf>,

    /// Log fetch timeout in seconds
    #[arg(long, env = "EDCRECON_TIMEOUT", default_value_t = sync::DEFAULT_TIMEOUT_SECS)]
    pub timeout: u64,

    #[command(flatten)]
    pub headers: HeaderArgs,

    /// Suppress diagnostics on stderr
    #[arg(long, short = 'q')]
    pub quiet: bool,
}

impl RunArgs {
    fn recon_options(&self) -> ReconOptions {
        let options = ReconOptions::for_mode(self.mode.into());
        if self.no_pad {
            options.with_pad_width(None)
        } else if let Some(width) = self.pad_width {
            options.with_pad_width(Some(width))
        } else {
            options
        }
    }
}

/// Where the log bytes came from.
enum LogSource {
    File(PathBuf),
    Remote { url: String, timeout: u64 },
}

impl LogSource {
    fn from_args(args: &RunArgs, target_date: Option<NaiveDate>) -> Result<Self, CliError> {
        match (&args.log, &args.mac) {
            (Some(path), _) => Ok(Self::File(path.clone())),
            (None, Some(mac)) => {
                sync::validate_mac(mac)?;
                let host = args.host.as_deref().ok_or_else(|| {
                    CliError::args("--mac needs a sync server").with_hint("pass --host or set EDCRECON_HOST")
                })?;
                let date = target_date.ok_or_else(|| {
                    CliError::args("--mac needs --date").with_hint("the date selects which day's log to fetch")
                })?;
                Ok(Self::Remote { url: sync::log_url(host, mac, date), timeout: args.timeout })
            }
            (None, None) => Err(CliError::args("either --log or --mac is required")),
        }
    }

    fn describe(&self) -> String {
        match self {
            Self::File(path) => path.display().to_string(),
            Self::Remote { url, .. } => url.clone(),
        }
    }

    fn load(&self, save_copy: Option<&Path>) -> Result<Vec<u8>, CliError> {
        match self {
            Self::File(path) => read_input(path, "log"),
            Self::Remote { url, timeout } => {
                let bytes = sync::LogClient::new(*timeout)?.fetch(url)?;
                if let Some(path) = save_copy {
                    write_output(path, &bytes)?;
                    info!(path = %path.display(), "fetched log saved");
                }
                Ok(bytes)
            }
        }
    }
}

/// Result of both extractions before reconciling.
struct Extracted {
    settlement_codes: Vec<String>,
    settlement_stats: Option<SettlementStats>,
    log_codes: Vec<String>,
    log_stats: Option<LogStats>,
    diagnostics: Vec<Diagnostic>,
}

/// Everything one settlement extraction produces, degraded or not.
#[derive(Clone)]
struct SettlementSide {
    codes: Vec<String>,
    stats: Option<SettlementStats>,
    diagnostics: Vec<Diagnostic>,
}

#[derive(Clone)]
struct LogSide {
    codes: Vec<String>,
    stats: LogStats,
    diagnostics: Vec<Diagnostic>,
}

/// Extraction memo for both sources; a hit returns codes, stats and
/// diagnostics exactly as the first extraction produced them.
#[derive(Default)]
struct RunCache {
    settlement: ExtractionCache<SettlementSide>,
    log: ExtractionCache<LogSide>,
}

impl RunCache {
    fn hits(&self) -> usize {
        self.settlement.hits() + self.log.hits()
    }

    fn misses(&self) -> usize {
        self.settlement.misses() + self.log.misses()
    }
}

pub fn cmd_run(args: RunArgs) -> Result<(), CliError> {
    let target_date = parse_date_arg(args.date.as_deref())?;
    let cutoff = parse_cutoff_arg(args.cutoff.as_deref())?;
    let source = LogSource::from_args(&args, target_date)?;

    // Read local inputs before fetching.
    let paydetail = read_input(&args.paydetail, "pay-detail report")?;
    let log_bytes = source.load(args.save_log.as_deref())?;

    let config = args.headers.settlement_config();
    let filter = LogFilter { target_date, cutoff };
    let mut cache = RunCache::default();
    let extracted = extract_both(&args.paydetail, &paydetail, &config, &log_bytes, &filter, &mut cache);
    debug!(hits = cache.hits(), misses = cache.misses(), "extraction cache");

    let result = reconcile(&extracted.settlement_codes, &extracted.log_codes, &args.recon_options());
    let report = Report {
        schema_version: REPORT_SCHEMA_VERSION,
        meta: ReportMeta::now(),
        inputs: ReportInputs {
            paydetail: args.paydetail.display().to_string(),
            log: source.describe(),
            target_date: target_date.map(|d| d.format("%Y-%m-%d").to_string()),
            cutoff: cutoff.map(|t| t.format("%H:%M:%S").to_string()),
        },
        settlement: extracted.settlement_stats,
        log: extracted.log_stats,
        diagnostics: extracted.diagnostics,
        result,
    };

    emit(&args, &report)?;

    if report.result.is_reconciled() {
        Ok(())
    } else {
        Err(CliError::silent(EXIT_UNMATCHED))
    }
}

fn extract_both(
    paydetail_path: &Path,
    paydetail: &[u8],
    config: &SettlementConfig,
    log_bytes: &[u8],
    filter: &LogFilter,
    cache: &mut RunCache,
) -> Extracted {
    let mut diagnostics = Vec::new();
    let target_date = filter.target_date;

    if let Some(name) = paydetail_path.file_name().and_then(|n| n.to_str()) {
        diagnostics.extend(check_filename(name));
    }

    let config_fp = config.fingerprint();
    let date_fp = target_date.map(|d| d.to_string()).unwrap_or_default();
    let settlement_key = CacheKey::new("settlement", paydetail, &[config_fp.as_str(), date_fp.as_str()]);
    let settlement = cache
        .settlement
        .get_or_try_insert(settlement_key, || {
            Ok::<_, std::convert::Infallible>(extract_settlement_side(paydetail_path, paydetail, config, target_date))
        })
        .unwrap_or_else(|never| match never {});

    // Log: decoding never fails; an empty log is just zero codes.
    let filter_fp = filter.fingerprint();
    let log_key = CacheKey::new("log", log_bytes, &[filter_fp.as_str()]);
    let log = cache
        .log
        .get_or_try_insert(log_key, || {
            let decoded = decode_text(log_bytes);
            let extraction = extract_log(&decoded.text, filter);
            Ok::<_, std::convert::Infallible>(LogSide {
                codes: extraction.codes(),
                stats: LogStats::new(&decoded, &extraction),
                diagnostics: decoded.diagnostic("log").into_iter().collect(),
            })
        })
        .unwrap_or_else(|never| match never {});

    diagnostics.extend(settlement.diagnostics);
    diagnostics.extend(log.diagnostics);
    Extracted {
        settlement_codes: settlement.codes,
        settlement_stats: settlement.stats,
        log_codes: log.codes,
        log_stats: Some(log.stats),
        diagnostics,
    }
}

/// Settlement: any failure leaves zero codes and an error diagnostic.
fn extract_settlement_side(
    path: &Path,
    bytes: &[u8],
    config: &SettlementConfig,
    target_date: Option<NaiveDate>,
) -> SettlementSide {
    let mut diagnostics = Vec::new();
    let extracted = load_grid(bytes, GridFormat::detect(Some(path), bytes)).and_then(|loaded| {
        diagnostics.extend(loaded.diagnostics.iter().cloned());
        let extraction = extract_settlement(&loaded.grid, config, target_date)?;
        Ok::<_, ReconError>((loaded, extraction))
    });
    match extracted {
        Ok((loaded, extraction)) => {
            diagnostics.extend(extraction.diagnostics.iter().cloned());
            SettlementSide {
                stats: Some(SettlementStats::new(&loaded, &extraction)),
                codes: extraction.codes,
                diagnostics,
            }
        }
        Err(e) => {
            diagnostics.push(e.to_diagnostic());
            SettlementSide { codes: Vec::new(), stats: None, diagnostics }
        }
    }
}

fn emit(args: &RunArgs, report: &Report) -> Result<(), CliError> {
    let json = report.to_json();
    if let Some(path) = &args.output {
        write_output(path, format!("{}\n", json).as_bytes())?;
    }

    let mut stdout = std::io::stdout().lock();
    let written = if args.json {
        writeln!(stdout, "{}", json)
    } else {
        report.render(&mut stdout, args.log_only)
    };
    written.and_then(|_| stdout.flush()).map_err(|e| CliError::io(e.to_string()))?;

    if !args.quiet {
        let mut stderr = std::io::stderr().lock();
        report.render_diagnostics(&mut stderr).map_err(|e| CliError::io(e.to_string()))?;
    }
    Ok(())
}

/// Reconcile already-loaded bytes; used by tests to skip the filesystem.
#[cfg(test)]
fn reconcile_bytes(
    paydetail_name: &str,
    paydetail: &[u8],
    log: &[u8],
    filter: &LogFilter,
) -> (edcrecon_recon::ReconResult, Vec<Diagnostic>) {
    let mut cache = RunCache::default();
    let extracted = extract_both(
        Path::new(paydetail_name),
        paydetail,
        &SettlementConfig::default(),
        log,
        filter,
        &mut cache,
    );
    let result = reconcile(&extracted.settlement_codes, &extracted.log_codes, &ReconOptions::default());
    (result, extracted.diagnostics)
}

#[cfg(test)]
mod tests {
    use super::*;
    use edcrecon_recon::Severity;

    const PAYDETAIL: &str = "交易日,授權碼\n20250703,100200\n20250703,100300\n20250702,555555\n";
    const LOG: &str = "2025-07-03_09:12:44 Approval ID: 100200\n2025-07-02_09:00:00 Approval ID: 555555\n";

    fn day() -> Option<NaiveDate> {
        NaiveDate::from_ymd_opt(2025, 7, 3)
    }

    #[test]
    fn test_reconcile_csv_bytes() {
        let filter = LogFilter { target_date: day(), cutoff: None };
        let (result, diagnostics) =
            reconcile_bytes("PayDetailRpt_0703.csv", PAYDETAIL.as_bytes(), LOG.as_bytes(), &filter);
        let unmatched: Vec<&str> = result.unmatched.iter().map(|c| c.normalized.as_str()).collect();
        assert_eq!(unmatched, vec!["100300"]);
        assert!(diagnostics.is_empty(), "{:?}", diagnostics);
    }

    #[test]
    fn test_unreadable_settlement_degrades() {
        let filter = LogFilter::default();
        let (result, diagnostics) =
            reconcile_bytes("PayDetailRpt.xlsx", b"not a workbook", LOG.as_bytes(), &filter);
        assert_eq!(result.summary.settlement_total, 0);
        assert_eq!(result.summary.log_total, 2);
        assert!(diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error && d.code == "unreadable_spreadsheet"));
    }

    #[test]
    fn test_unexpected_name_warns() {
        let (_, diagnostics) =
            reconcile_bytes("statement.csv", PAYDETAIL.as_bytes(), LOG.as_bytes(), &LogFilter::default());
        assert_eq!(diagnostics[0].code, "unexpected_file_name");
    }

    #[test]
    fn test_cache_hit_replays_stats_and_diagnostics() {
        let filter = LogFilter { target_date: day(), cutoff: None };
        let path = Path::new("statement.csv");
        let config = SettlementConfig::default();
        let mut cache = RunCache::default();

        let first = extract_both(path, PAYDETAIL.as_bytes(), &config, LOG.as_bytes(), &filter, &mut cache);
        let second = extract_both(path, PAYDETAIL.as_bytes(), &config, LOG.as_bytes(), &filter, &mut cache);

        assert_eq!((cache.hits(), cache.misses()), (2, 2));
        assert_eq!(second.settlement_codes, first.settlement_codes);
        assert_eq!(second.log_codes, first.log_codes);
        assert_eq!(second.diagnostics, first.diagnostics);
        let stats = second.settlement_stats.expect("settlement stats on cache hit");
        assert_eq!(stats.rows_excluded_by_date, 1);
        assert_eq!(second.log_stats.map(|s| s.codes), Some(1));
    }

    #[test]
    fn test_missing_column_degrades() {
        let (result, diagnostics) = reconcile_bytes(
            "PayDetailRpt.csv",
            b"Date,Amount\n20250703,10\n",
            LOG.as_bytes(),
            &LogFilter::default(),
        );
        assert_eq!(result.summary.settlement_total, 0);
        assert_eq!(diagnostics.last().unwrap().code, "column_not_found");
        assert_eq!(result.warnings.len(), 1);
    }
}
