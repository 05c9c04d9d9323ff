use crate::matcher::unique_codes;
use crate::model::{AuthCode, ReconSummary, ReconWarning};

/// Compute summary counts from normalized inputs and computed differences.
pub fn compute_summary(
    settlement: &[AuthCode],
    log: &[AuthCode],
    unmatched: &[AuthCode],
    log_only: &[AuthCode],
) -> ReconSummary {
    let settlement_unique = unique_codes(settlement);
    let log_unique = unique_codes(log);
    let intersection = settlement_unique
        .keys()
        .filter(|k| log_unique.contains_key(*k))
        .count();

    ReconSummary {
        settlement_total: settlement.len(),
        settlement_unique: settlement_unique.len(),
        log_total: log.len(),
        log_unique: log_unique.len(),
        intersection,
        unmatched: unmatched.len(),
        log_only: log_only.len(),
    }
}

/// Data-integrity warnings derived from the summary.
pub fn compute_warnings(summary: &ReconSummary) -> Vec<ReconWarning> {
    let mut warnings = Vec::new();
    if summary.settlement_total < summary.log_total {
        warnings.push(ReconWarning::LogExceedsSettlement {
            settlement_total: summary.settlement_total,
            log_total: summary.log_total,
        });
    }
    warnings
}
