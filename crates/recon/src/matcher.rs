use std::collections::{BTreeMap, HashMap, HashSet};

use crate::model::AuthCode;
use crate::normalize::normalize_code;

/// Normalize raw codes, dropping blanks. Order and duplicates are kept.
pub fn normalize_codes<S: AsRef<str>>(raw: &[S], pad_width: Option<usize>) -> Vec<AuthCode> {
    raw.iter()
        .filter_map(|r| {
            let raw = r.as_ref().trim();
            let normalized = normalize_code(raw, pad_width);
            (!normalized.is_empty()).then(|| AuthCode {
                normalized,
                raw: raw.to_string(),
            })
        })
        .collect()
}

/// Unique normalized codes, each with the first raw form seen.
pub fn unique_codes(codes: &[AuthCode]) -> BTreeMap<&str, &AuthCode> {
    let mut unique = BTreeMap::new();
    for code in codes {
        unique.entry(code.normalized.as_str()).or_insert(code);
    }
    unique
}

/// Unique codes of `left` absent from `right`, sorted by normalized code.
pub fn set_difference(left: &[AuthCode], right: &[AuthCode]) -> Vec<AuthCode> {
    let right: HashSet<&str> = right.iter().map(|c| c.normalized.as_str()).collect();
    unique_codes(left)
        .into_iter()
        .filter(|(key, _)| !right.contains(key))
        .map(|(_, code)| code.clone())
        .collect()
}

/// Count-wise bag difference `left − right`, sorted by normalized code.
///
/// Each occurrence in `right` cancels one occurrence in `left`, earliest
/// first; whatever is left over is returned without deduplication.
pub fn multiset_difference(left: &[AuthCode], right: &[AuthCode]) -> Vec<AuthCode> {
    let mut remaining: HashMap<&str, usize> = HashMap::new();
    for code in right {
        *remaining.entry(code.normalized.as_str()).or_insert(0) += 1;
    }

    let mut out: Vec<AuthCode> = left
        .iter()
        .filter(|code| match remaining.get_mut(code.normalized.as_str()) {
            Some(n) if *n > 0 => {
                *n -= 1;
                false
            }
            _ => true,
        })
        .cloned()
        .collect();
    out.sort_by(|a, b| a.normalized.cmp(&b.normalized));
    out
}
