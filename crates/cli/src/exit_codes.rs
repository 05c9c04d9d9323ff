//! CLI Exit Code Registry
//!
//! This is the single source of truth for all CLI exit codes.
//! Exit codes are part of the shell contract; scripts rely on them.
//!
//! # Exit Code Ranges
//!
//! | Range   | Domain    | Description                                     |
//! |---------|-----------|-------------------------------------------------|
//! | 0       | Universal | Success (every settlement code found in the log) |
//! | 1       | run       | Settlement codes missing from the log            |
//! | 2       | Universal | CLI usage error (bad args, bad date/cutoff)      |
//! | 3       | Universal | File read/write error                            |
//! | 4       | extract   | Input could not be interpreted                   |
//! | 50-59   | fetch     | Remote terminal log retrieval                    |
//!
//! # Adding New Exit Codes
//!
//! 1. Add the constant in the appropriate range
//! 2. Document what triggers it
//! 3. Update the table above
//! 4. Wire it into the relevant command's error handling

// =============================================================================
// Universal (0-4)
// =============================================================================

/// Success - command completed; for `run`, nothing is unmatched.
pub const EXIT_SUCCESS: u8 = 0;

/// Reconciliation found settlement codes with no log entry.
/// Like `diff(1)`, exit 1 means "inputs differ."
pub const EXIT_UNMATCHED: u8 = 1;

/// Usage error - bad arguments, missing required options, malformed filters.
pub const EXIT_USAGE: u8 = 2;

/// A local file could not be read or written.
pub const EXIT_IO: u8 = 3;

/// `extract` could not interpret the input (unreadable workbook, no
/// authorization-code column). `run` degrades these to diagnostics instead.
pub const EXIT_INPUT: u8 = 4;

// =============================================================================
// Fetch (50-59): terminal sync endpoint
// =============================================================================

/// No log for that terminal/day (404).
pub const EXIT_FETCH_NOT_FOUND: u8 = 50;

/// Endpoint refused access (401/403).
pub const EXIT_FETCH_AUTH: u8 = 51;

/// Endpoint rejected the request (other 4xx).
pub const EXIT_FETCH_REJECTED: u8 = 52;

/// Request timed out.
pub const EXIT_FETCH_TIMEOUT: u8 = 53;

/// Upstream error (5xx), connection failure or unreadable body.
pub const EXIT_FETCH_UPSTREAM: u8 = 54;

/// Map an HTTP status from the sync endpoint to its exit code.
pub fn fetch_status_exit_code(status: u16) -> u8 {
    match status {
        404 | 410 => EXIT_FETCH_NOT_FOUND,
        401 | 403 => EXIT_FETCH_AUTH,
        408 => EXIT_FETCH_TIMEOUT,
        400..=499 => EXIT_FETCH_REJECTED,
        _ => EXIT_FETCH_UPSTREAM,
    }
}
