// Byte-to-text decoding for terminal logs and delimited settlement exports

use std::path::Path;

use edcrecon_recon::Diagnostic;
use encoding_rs::{Encoding, BIG5, UTF_8};
use tracing::debug;

/// Text recovered from raw bytes plus the encoding that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedText {
    pub text: String,
    pub encoding: &'static str,
    /// The bytes were not valid UTF-8 and the fallback encoding was used.
    pub fell_back: bool,
    /// The fallback decode hit malformed sequences and substituted U+FFFD.
    pub lossy: bool,
}

impl DecodedText {
    /// Diagnostic worth surfacing to the user, if decoding was not clean.
    pub fn diagnostic(&self, source: &str) -> Option<Diagnostic> {
        if self.lossy {
            Some(Diagnostic::warning(
                "lossy_decode",
                format!("{source}: not valid UTF-8 or {}; some characters were replaced", self.encoding),
            ))
        } else if self.fell_back {
            Some(Diagnostic::info(
                "fallback_encoding",
                format!("{source}: decoded as {}", self.encoding),
            ))
        } else {
            None
        }
    }
}

/// Decode with UTF-8 first, then Big5 (the code page of Taiwanese terminals
/// and bank exports).
pub fn decode_text(bytes: &[u8]) -> DecodedText {
    decode_text_with(bytes, BIG5)
}

/// Decode with UTF-8 first, then `fallback`. A UTF-8 BOM is stripped;
/// decoding never fails, malformed input is replaced.
pub fn decode_text_with(bytes: &[u8], fallback: &'static Encoding) -> DecodedText {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);

    match std::str::from_utf8(bytes) {
        Ok(s) => DecodedText {
            text: s.to_string(),
            encoding: UTF_8.name(),
            fell_back: false,
            lossy: false,
        },
        Err(_) => {
            let (decoded, _, had_errors) = fallback.decode(bytes);
            debug!(encoding = fallback.name(), had_errors, "utf-8 decode failed, used fallback");
            DecodedText {
                text: decoded.into_owned(),
                encoding: fallback.name(),
                fell_back: true,
                lossy: had_errors,
            }
        }
    }
}

/// Read a file and decode it with [`decode_text`].
pub fn read_text_file(path: &Path) -> Result<DecodedText, String> {
    let bytes = std::fs::read(path).map_err(|e| format!("{}: {}", path.display(), e))?;
    Ok(decode_text(&bytes))
}
