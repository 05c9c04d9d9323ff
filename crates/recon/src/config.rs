use crate::model::ReconMode;

// ---------------------------------------------------------------------------
// Header keywords
// ---------------------------------------------------------------------------

/// Rows searched for a header before giving up (rows `0..N`).
pub const DEFAULT_HEADER_SCAN_ROWS: usize = 5;

/// Width codes are zero-padded to in multiset mode.
pub const DEFAULT_PAD_WIDTH: usize = 6;

/// Settlement exports are expected to be named `PayDetailRpt*`.
pub const SETTLEMENT_FILE_PREFIX: &str = "PayDetailRpt";

const AUTH_CODE_KEYWORDS: &[&str] = &["授權碼", "授权码", "授權", "授权", "Auth"];
const TRANS_DATE_KEYWORDS: &[&str] = &["交易日", "Trans Date"];

/// A named field and the header texts that identify it. A header cell
/// matches when its trimmed text contains any keyword.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeywordGroup {
    pub field: String,
    pub keywords: Vec<String>,
}

impl KeywordGroup {
    pub fn new(field: impl Into<String>, keywords: &[&str]) -> Self {
        Self {
            field: field.into(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
        }
    }

    pub fn auth_code() -> Self {
        Self::new("authorization code", AUTH_CODE_KEYWORDS)
    }

    pub fn trans_date() -> Self {
        Self::new("transaction date", TRANS_DATE_KEYWORDS)
    }

    /// Append extra keywords, skipping blanks and duplicates.
    pub fn with_keywords<I, S>(mut self, extra: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for kw in extra {
            let kw = kw.into();
            let kw = kw.trim();
            if !kw.is_empty() && !self.keywords.iter().any(|k| k == kw) {
                self.keywords.push(kw.to_string());
            }
        }
        self
    }

    pub fn matches(&self, text: &str) -> bool {
        let text = text.trim();
        !text.is_empty() && self.keywords.iter().any(|kw| text.contains(kw.as_str()))
    }
}

// ---------------------------------------------------------------------------
// Settlement
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SettlementConfig {
    pub auth_code: KeywordGroup,
    pub trans_date: KeywordGroup,
    pub header_scan_rows: usize,
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            auth_code: KeywordGroup::auth_code(),
            trans_date: KeywordGroup::trans_date(),
            header_scan_rows: DEFAULT_HEADER_SCAN_ROWS,
        }
    }
}

impl SettlementConfig {
    /// Stable text form, used to key cached extractions.
    pub fn fingerprint(&self) -> String {
        format!(
            "auth={};date={};scan={}",
            self.auth_code.keywords.join("|"),
            self.trans_date.keywords.join("|"),
            self.header_scan_rows,
        )
    }
}

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconOptions {
    pub mode: ReconMode,
    /// Zero-pad codes to this width before comparing.
    pub pad_width: Option<usize>,
}

impl ReconOptions {
    /// Mode defaults: no padding for sets, six-wide padding for multisets.
    pub fn for_mode(mode: ReconMode) -> Self {
        let pad_width = match mode {
            ReconMode::Set => None,
            ReconMode::Multiset => Some(DEFAULT_PAD_WIDTH),
        };
        Self { mode, pad_width }
    }

    pub fn with_pad_width(mut self, pad_width: Option<usize>) -> Self {
        self.pad_width = pad_width.filter(|w| *w > 0);
        self
    }
}

impl Default for ReconOptions {
    fn default() -> Self {
        Self::for_mode(ReconMode::Set)
    }
}
