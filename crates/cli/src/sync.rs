//! Terminal sync endpoint: download a day's EDC UI log.
//!
//! The terminal mirrors its logs to
//! `http://<host>/sync/<MAC>/sqlite/EDC_log/<YYYYMMDD>_ui.txt`. One GET,
//! bounded timeout, no retries; any failure aborts the run.

use std::time::Duration;

use chrono::NaiveDate;
use tracing::debug;

use crate::exit_codes;
use crate::CliError;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;
const USER_AGENT: &str = concat!("edcrecon/", env!("CARGO_PKG_VERSION"));
const MAX_LOG_BYTES: usize = 64 * 1024 * 1024;

/// Build the log URL. `host` may carry its own `http://` or `https://`
/// scheme and a trailing slash.
pub fn log_url(host: &str, mac: &str, date: NaiveDate) -> String {
    let host = host.trim().trim_end_matches('/');
    let base = if host.starts_with("http://") || host.starts_with("https://") {
        host.to_string()
    } else {
        format!("http://{}", host)
    };
    format!("{}/sync/{}/sqlite/EDC_log/{}_ui.txt", base, mac.trim(), date.format("%Y%m%d"))
}

/// Reject MACs that would change the URL path.
pub fn validate_mac(mac: &str) -> Result<(), CliError> {
    let mac = mac.trim();
    if mac.is_empty() || mac.contains(['/', '?', '#', ' ']) {
        return Err(CliError::args(format!("invalid terminal MAC '{}'", mac))
            .with_hint("pass the MAC as shown on the sync server, e.g. --mac 00E04C6801A2"));
    }
    Ok(())
}

pub struct LogClient {
    http: reqwest::blocking::Client,
    timeout: Duration,
    max_bytes: usize,
}

impl LogClient {
    pub fn new(timeout_secs: u64) -> Result<Self, CliError> {
        let timeout = Duration::from_secs(timeout_secs.max(1));
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| CliError {
                code: exit_codes::EXIT_FETCH_UPSTREAM,
                message: format!("failed to build HTTP client: {}", e),
                hint: None,
            })?;
        Ok(Self { http, timeout, max_bytes: MAX_LOG_BYTES })
    }

    #[cfg(test)]
    fn with_max_bytes(mut self, max_bytes: usize) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    fn transport_error(&self, e: reqwest::Error, url: &str) -> CliError {
        if e.is_timeout() {
            CliError {
                code: exit_codes::EXIT_FETCH_TIMEOUT,
                message: format!("log fetch timed out after {}s: {}", self.timeout.as_secs(), url),
                hint: Some("raise --timeout or check the terminal is online".into()),
            }
        } else {
            CliError {
                code: exit_codes::EXIT_FETCH_UPSTREAM,
                message: format!("log fetch failed: {}", e),
                hint: Some("check --host and network access to the sync server".into()),
            }
        }
    }

    fn too_large(&self, len: u64) -> CliError {
        CliError {
            code: exit_codes::EXIT_FETCH_UPSTREAM,
            message: format!("log response too large ({} bytes, limit {})", len, self.max_bytes),
            hint: None,
        }
    }

    /// GET the raw log bytes.
    pub fn fetch(&self, url: &str) -> Result<Vec<u8>, CliError> {
        debug!(%url, timeout_secs = self.timeout.as_secs(), "fetching terminal log");

        let resp = self.http.get(url).send().map_err(|e| self.transport_error(e, url))?;

        let status = resp.status();
        if !status.is_success() {
            let code = exit_codes::fetch_status_exit_code(status.as_u16());
            let hint = (code == exit_codes::EXIT_FETCH_NOT_FOUND)
                .then(|| "the terminal may not have synced a log for that date; check --mac and --date".to_string());
            return Err(CliError {
                code,
                message: format!("log fetch returned HTTP {}: {}", status.as_u16(), url),
                hint,
            });
        }

        if let Some(len) = resp.content_length().filter(|&len| len > self.max_bytes as u64) {
            return Err(self.too_large(len));
        }
        let bytes = resp.bytes().map_err(|e| self.transport_error(e, url))?;
        if bytes.len() > self.max_bytes {
            return Err(self.too_large(bytes.len() as u64));
        }
        debug!(bytes = bytes.len(), "terminal log fetched");
        Ok(bytes.to_vec())
    }
}

// ── Tests ───────────────────────────────────────────────────────────
