// edcrecon - reconcile EDC terminal logs against bank pay-detail reports

mod exit_codes;
mod extract;
mod report;
mod run;
mod sync;

use std::path::PathBuf;
use std::process::ExitCode;

use chrono::{NaiveDate, NaiveTime};
use clap::{ArgAction, Args, Parser, Subcommand, ValueEnum};
use edcrecon_recon::config::SettlementConfig;
use edcrecon_recon::log::parse_cutoff;
use edcrecon_recon::normalize::parse_target_date;
use edcrecon_recon::{ReconError, ReconMode};

use exit_codes::{EXIT_INPUT, EXIT_IO, EXIT_SUCCESS, EXIT_USAGE};

#[derive(Parser)]
#[command(name = "edcrecon")]
#[command(about = "Find authorization codes the bank settled but the EDC terminal never logged")]
#[command(long_version = long_version())]
#[command(version)]
struct Cli {
    /// More logging on stderr (-v debug, -vv trace); RUST_LOG overrides
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile a pay-detail report against a terminal log
    #[command(after_help = "\
Examples:
  edcrecon run --paydetail PayDetailRpt_0703.xlsx --log 20250703_ui.txt --date 20250703
  edcrecon run --paydetail PayDetailRpt_0703.xls --mac 00E04C6801A2 --host 10.0.0.5:8080 --date 2025/07/03
  edcrecon run --paydetail pay.csv --log ui.txt --date 250703 --cutoff 23:00 --mode multiset
  edcrecon run --paydetail pay.xlsx --log ui.txt --json --output report.json
  EDCRECON_HOST=sync.example.com edcrecon run --paydetail pay.xlsx --mac 00E04C6801A2 --date 20250703

Exit codes:
  0   every settlement code was found in the log
  1   settlement codes are missing from the log
  2   usage error
  3   file read/write error
  50-54 log fetch failed")]
    Run(run::RunArgs),

    /// List the codes one extractor finds, without reconciling
    #[command(subcommand)]
    Extract(extract::ExtractCommands),

    /// Download a terminal's UI log for one day
    #[command(name = "fetch-log", after_help = "\
Examples:
  edcrecon fetch-log --mac 00E04C6801A2 --host 10.0.0.5:8080 --date 20250703
  edcrecon fetch-log --mac 00E04C6801A2 --host https://sync.example.com --date 20250703 -o ui.txt")]
    FetchLog {
        /// Terminal MAC as used in the sync path
        #[arg(long)]
        mac: String,

        /// Day to fetch (YYYYMMDD, YYMMDD or YYYY/MM/DD)
        #[arg(long)]
        date: String,

        /// Sync server host, optionally with scheme and port
        #[arg(long, env = "EDCRECON_HOST")]
        host: String,

        /// Output file (default: stdout)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,

        /// Request timeout in seconds
        #[arg(long, env = "EDCRECON_TIMEOUT", default_value_t = sync::DEFAULT_TIMEOUT_SECS)]
        timeout: u64,

        /// Suppress the summary on stderr
        #[arg(long, short = 'q')]
        quiet: bool,
    },
}

#[derive(Clone, Copy, ValueEnum)]
pub enum ModeArg {
    /// Compare unique codes
    Set,
    /// Compare occurrence counts
    Multiset,
}

impl From<ModeArg> for ReconMode {
    fn from(mode: ModeArg) -> Self {
        match mode {
            ModeArg::Set => ReconMode::Set,
            ModeArg::Multiset => ReconMode::Multiset,
        }
    }
}

/// Header keyword overrides shared by `run` and `extract paydetail`.
#[derive(Args, Clone)]
pub struct HeaderArgs {
    /// Extra keyword identifying the authorization-code header (repeatable)
    #[arg(long = "auth-header", value_name = "KW")]
    pub auth_header: Vec<String>,

    /// Extra keyword identifying the transaction-date header (repeatable)
    #[arg(long = "date-header", value_name = "KW")]
    pub date_header: Vec<String>,

    /// Rows searched for headers
    #[arg(long, value_name = "N", default_value_t = edcrecon_recon::config::DEFAULT_HEADER_SCAN_ROWS)]
    pub header_rows: usize,
}

impl HeaderArgs {
    pub fn settlement_config(&self) -> SettlementConfig {
        let defaults = SettlementConfig::default();
        SettlementConfig {
            auth_code: defaults.auth_code.with_keywords(&self.auth_header),
            trans_date: defaults.trans_date.with_keywords(&self.date_header),
            header_scan_rows: self.header_rows.max(1),
        }
    }
}

fn long_version() -> &'static str {
    concat!(
        env!("CARGO_PKG_VERSION"),
        " (", env!("GIT_COMMIT_HASH"), ")",
        "\nengine:  edcrecon-recon ", env!("CARGO_PKG_VERSION"),
        "\ntarget:  ", env!("TARGET"),
        "\nreport_schema: 1",
    )
}

fn init_tracing(verbose: u8) {
    let level = match verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("warn,edcrecon={level},edcrecon_recon={level},edcrecon_io={level}").into()
    });
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let result = match cli.command {
        Commands::Run(args) => run::cmd_run(args),
        Commands::Extract(command) => extract::cmd_extract(command),
        Commands::FetchLog { mac, date, host, output, timeout, quiet } => {
            cmd_fetch_log(mac, date, host, output, timeout, quiet)
        }
    };

    match result {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(CliError { code, message, hint }) => {
            if !message.is_empty() {
                eprintln!("error: {}", message);
            }
            if let Some(hint) = hint {
                eprintln!("hint:  {}", hint);
            }
            ExitCode::from(code)
        }
    }
}

#[derive(Debug)]
pub struct CliError {
    pub code: u8,
    pub message: String,
    pub hint: Option<String>,
}

impl CliError {
    pub fn args(msg: impl Into<String>) -> Self {
        Self { code: EXIT_USAGE, message: msg.into(), hint: None }
    }

    pub fn io(msg: impl Into<String>) -> Self {
        Self { code: EXIT_IO, message: msg.into(), hint: None }
    }

    pub fn input(msg: impl Into<String>) -> Self {
        Self { code: EXIT_INPUT, message: msg.into(), hint: None }
    }

    /// Exit with `code` and print nothing (the report already said it).
    pub fn silent(code: u8) -> Self {
        Self { code, message: String::new(), hint: None }
    }

    /// Add a hint to an existing error.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

impl From<ReconError> for CliError {
    fn from(err: ReconError) -> Self {
        match &err {
            ReconError::InvalidFilter(_) => CliError::args(err.to_string()),
            ReconError::ColumnNotFound { .. } => CliError::input(err.to_string())
                .with_hint("add the header text your bank uses with --auth-header, or raise --header-rows"),
            ReconError::UnreadableSpreadsheet(_) => CliError::input(err.to_string()),
        }
    }
}

// ============================================================================
// Shared argument parsing
// ============================================================================

pub fn parse_date_arg(raw: Option<&str>) -> Result<Option<NaiveDate>, CliError> {
    raw.map(|d| {
        parse_target_date(d).map_err(|e| {
            CliError::from(e).with_hint("use YYYYMMDD, YYMMDD or YYYY/MM/DD, e.g. --date 20250703")
        })
    })
    .transpose()
}

pub fn parse_cutoff_arg(raw: Option<&str>) -> Result<Option<NaiveTime>, CliError> {
    raw.map(|c| parse_cutoff(c).map_err(|e| CliError::from(e).with_hint("use HH:MM or HH:MM:SS, e.g. --cutoff 23:00")))
        .transpose()
}

pub fn read_input(path: &std::path::Path, what: &str) -> Result<Vec<u8>, CliError> {
    std::fs::read(path).map_err(|e| CliError::io(format!("cannot read {} '{}': {}", what, path.display(), e)))
}

pub fn write_output(path: &std::path::Path, bytes: &[u8]) -> Result<(), CliError> {
    std::fs::write(path, bytes).map_err(|e| CliError::io(format!("cannot write '{}': {}", path.display(), e)))
}

// ============================================================================
// fetch-log
// ============================================================================

fn cmd_fetch_log(
    mac: String,
    date: String,
    host: String,
    output: Option<PathBuf>,
    timeout: u64,
    quiet: bool,
) -> Result<(), CliError> {
    use std::io::Write;

    sync::validate_mac(&mac)?;
    let Some(date) = parse_date_arg(Some(&date))? else {
        return Err(CliError::args("--date is required"));
    };

    let url = sync::log_url(&host, &mac, date);
    let bytes = sync::LogClient::new(timeout)?.fetch(&url)?;

    match &output {
        Some(path) => write_output(path, &bytes)?,
        None => {
            let mut stdout = std::io::stdout().lock();
            stdout
                .write_all(&bytes)
                .and_then(|_| stdout.flush())
                .map_err(|e| CliError::io(e.to_string()))?;
        }
    }

    if !quiet {
        let dest = output.as_ref().map(|p| p.display().to_string()).unwrap_or_else(|| "stdout".into());
        eprintln!("fetched {} bytes from {} -> {}", bytes.len(), url, dest);
    }
    Ok(())
}
