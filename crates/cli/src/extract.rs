//! `edcrecon extract`: show what one extractor finds.
//!
//! Useful when a bank changes its report layout or a terminal firmware
//! changes its log lines: the output shows where the header was found and
//! which records were kept or skipped.

use std::io::Write;
use std::path::PathBuf;

use clap::Subcommand;
use edcrecon_io::{decode_text, load_grid, GridFormat};
use edcrecon_recon::settlement::check_filename;
use edcrecon_recon::{extract_log, extract_settlement, LogFilter};
use serde::Serialize;

use crate::{parse_cutoff_arg, parse_date_arg, read_input, CliError, HeaderArgs};

#[derive(Subcommand)]
pub enum ExtractCommands {
    /// Authorization codes from a pay-detail report
    #[command(after_help = "\
Examples:
  edcrecon extract paydetail PayDetailRpt_0703.xlsx
  edcrecon extract paydetail PayDetailRpt_0703.xlsx --date 20250703 --json
  edcrecon extract paydetail statement.csv --auth-header 'Approval Code'")]
    Paydetail {
        /// Report file (xls, xlsx, xlsb, ods, csv, tsv)
        file: PathBuf,

        /// Keep only rows dated this day
        #[arg(long)]
        date: Option<String>,

        #[command(flatten)]
        headers: HeaderArgs,

        /// Print JSON instead of one code per line
        #[arg(long)]
        json: bool,
    },

    /// Authorization codes from a terminal UI log
    #[command(after_help = "\
Examples:
  edcrecon extract log 20250703_ui.txt
  edcrecon extract log 20250703_ui.txt --date 20250703 --cutoff 23:00 --json")]
    Log {
        /// Log file
        file: PathBuf,

        /// Keep only records stamped on this day
        #[arg(long)]
        date: Option<String>,

        /// Drop records after this time of day (HH:MM[:SS])
        #[arg(long)]
        cutoff: Option<String>,

        /// Print JSON instead of one record per line
        #[arg(long)]
        json: bool,
    },
}

#[derive(Serialize)]
struct JsonOutput<'a, T: Serialize> {
    source: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    encoding: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sheet: Option<&'a str>,
    #[serde(flatten)]
    extraction: &'a T,
}

pub fn cmd_extract(command: ExtractCommands) -> Result<(), CliError> {
    match command {
        ExtractCommands::Paydetail { file, date, headers, json } => cmd_extract_paydetail(file, date, headers, json),
        ExtractCommands::Log { file, date, cutoff, json } => cmd_extract_log(file, date, cutoff, json),
    }
}

fn cmd_extract_paydetail(file: PathBuf, date: Option<String>, headers: HeaderArgs, json: bool) -> Result<(), CliError> {
    let target_date = parse_date_arg(date.as_deref())?;
    let bytes = read_input(&file, "pay-detail report")?;

    let loaded = load_grid(&bytes, GridFormat::detect(Some(&file), &bytes))?;
    let mut extraction = extract_settlement(&loaded.grid, &headers.settlement_config(), target_date)?;
    let mut diagnostics = loaded.diagnostics.clone();
    diagnostics.extend(file.file_name().and_then(|n| n.to_str()).and_then(check_filename));
    diagnostics.append(&mut extraction.diagnostics);
    extraction.diagnostics = diagnostics;

    let mut stdout = std::io::stdout().lock();
    let written = if json {
        let out = JsonOutput {
            source: file.display().to_string(),
            encoding: None,
            sheet: loaded.sheet.as_deref(),
            extraction: &extraction,
        };
        writeln!(stdout, "{}", to_json(&out))
    } else {
        extraction.codes.iter().try_for_each(|code| writeln!(stdout, "{}", code))
    };
    written.and_then(|_| stdout.flush()).map_err(|e| CliError::io(e.to_string()))?;

    if !json {
        let loc = extraction.auth_column;
        eprintln!(
            "{} code(s); header at row {}, column {}; {} row(s) scanned, {} excluded by date",
            extraction.codes.len(),
            loc.row + 1,
            loc.col + 1,
            extraction.rows_scanned,
            extraction.rows_excluded_by_date,
        );
        for d in &extraction.diagnostics {
            eprintln!("{}", d);
        }
    }
    Ok(())
}

fn cmd_extract_log(file: PathBuf, date: Option<String>, cutoff: Option<String>, json: bool) -> Result<(), CliError> {
    let filter = LogFilter {
        target_date: parse_date_arg(date.as_deref())?,
        cutoff: parse_cutoff_arg(cutoff.as_deref())?,
    };
    let bytes = read_input(&file, "log")?;
    let decoded = decode_text(&bytes);
    let extraction = extract_log(&decoded.text, &filter);

    let mut stdout = std::io::stdout().lock();
    let written = if json {
        let out = JsonOutput {
            source: file.display().to_string(),
            encoding: Some(decoded.encoding),
            sheet: None,
            extraction: &extraction,
        };
        writeln!(stdout, "{}", to_json(&out))
    } else {
        extraction.records.iter().try_for_each(|r| {
            let stamp = match (r.date, r.time) {
                (Some(d), Some(t)) => format!("{} {}", d, t),
                _ => "-".to_string(),
            };
            let via = if r.from_next_line { "  (next line)" } else { "" };
            writeln!(stdout, "{}\t{}\t{}{}", r.line, stamp, r.code, via)
        })
    };
    written.and_then(|_| stdout.flush()).map_err(|e| CliError::io(e.to_string()))?;

    if !json {
        eprintln!(
            "{} code(s) from {} line(s); skipped: {} without time, {} after cutoff, {} without code",
            extraction.records.len(),
            extraction.lines_scanned,
            extraction.skipped_no_time,
            extraction.skipped_after_cutoff,
            extraction.skipped_no_code,
        );
        if let Some(d) = decoded.diagnostic("log") {
            eprintln!("{}", d);
        }
    }
    Ok(())
}

fn to_json(value: &impl Serialize) -> String {
    serde_json::to_string_pretty(value).unwrap_or_default()
}
