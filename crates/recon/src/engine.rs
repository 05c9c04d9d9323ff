use tracing::debug;

use crate::config::ReconOptions;
use crate::evidence::{compute_summary, compute_warnings};
use crate::matcher::{multiset_difference, normalize_codes, set_difference};
use crate::model::{ReconMode, ReconResult};

/// Reconcile settlement codes against log codes. Inputs are raw strings;
/// both sides are normalized with `options.pad_width` and blanks dropped.
pub fn reconcile<S, L>(settlement: &[S], log: &[L], options: &ReconOptions) -> ReconResult
where
    S: AsRef<str>,
    L: AsRef<str>,
{
    let settlement = normalize_codes(settlement, options.pad_width);
    let log = normalize_codes(log, options.pad_width);

    let (unmatched, log_only) = match options.mode {
        ReconMode::Set => (set_difference(&settlement, &log), set_difference(&log, &settlement)),
        ReconMode::Multiset => (
            multiset_difference(&settlement, &log),
            multiset_difference(&log, &settlement),
        ),
    };

    let summary = compute_summary(&settlement, &log, &unmatched, &log_only);
    let warnings = compute_warnings(&summary);
    debug!(mode = %options.mode, ?summary, "reconciled");

    ReconResult {
        mode: options.mode,
        pad_width: options.pad_width,
        summary,
        unmatched,
        log_only,
        warnings,
    }
}
