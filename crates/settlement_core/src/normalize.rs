//! Settlement name canonicalization and fuzzy matching.
//!
//! # Responsibility
//! - Build geocoder search queries from census display names.
//! - Normalize names for fuzzy comparison between name sources.
//! - Select the nearest name above a fixed similarity threshold.
//!
//! # Invariants
//! - Every function here is pure and deterministic.
//! - The administrative region survives search-query cleaning.

use crate::model::settlement::admin_region;
use once_cell::sync::Lazy;
use regex::Regex;

/// Minimum similarity ratio (exclusive) for a fuzzy match to be accepted.
pub const FUZZY_MATCH_THRESHOLD: f64 = 0.85;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));

/// Electoral-division qualifiers stripped before a geocoder search, applied in order.
///
/// Multi-word special cases come first. Stripping `Rural` before
/// `/Monkstown Rural/Douglas` would leave `Carrigaline/Monkstown /Douglas`,
/// which the special case no longer matches.
const SEARCH_QUALIFIERS: &[&str] = &[
    "/Monkstown Rural/Douglas",
    "-Blakestown",
    "-Esker",
    "-Knockmaroon",
    "Rural",
    "Urban",
    "(South)",
    "(North)",
    "(East)",
    "(West)",
];

/// Lowercase fragments dropped by [`normalize_name`], applied in order.
const NORMALIZE_REPLACEMENTS: &[&str] = &[
    "city and suburbs",
    "legal town",
    "town",
    "village",
    "suburb",
    "townland",
    "(part)",
    "county",
    "co.",
    "rural",
    "urban",
];

/// Suffixes dropped from simulation display names, applied in order.
const DISPLAY_QUALIFIERS: &[&str] = &[
    " Urban", " Rural", " Town", " Village", " ED", " (North)", " (South)", " (East)", " (West)",
];

/// Cleans a census name into a geocoder query while keeping its region.
///
/// `"Clonmel Urban, Tipperary"` becomes `"Clonmel, Tipperary"`. Any token still
/// carrying a parenthesis after qualifier removal is dropped.
pub fn clean_search_name(name: &str) -> String {
    let place = name.split(',').next().unwrap_or("").trim();
    let region = admin_region(name);

    let mut place = place.to_string();
    for qualifier in SEARCH_QUALIFIERS {
        place = place.replace(qualifier, "");
    }
    let place = place
        .split_whitespace()
        .filter(|token| !token.contains('(') && !token.contains(')'))
        .collect::<Vec<_>>()
        .join(" ");

    if region.is_empty() {
        place
    } else {
        format!("{place}, {region}")
    }
}

/// Lowercases, strips settlement-type words and punctuation, and collapses spaces.
pub fn normalize_name(name: &str) -> String {
    let mut normalized = name.to_lowercase();
    for fragment in NORMALIZE_REPLACEMENTS {
        normalized = normalized.replace(fragment, "");
    }
    let normalized: String = normalized
        .chars()
        .filter(|c| c.is_alphanumeric() || c.is_whitespace())
        .collect();
    WHITESPACE_RE.replace_all(normalized.trim(), " ").into_owned()
}

/// Short display name for the simulation export: region and qualifiers removed.
pub fn simulation_display_name(name: &str) -> String {
    let mut display = name.split(',').next().unwrap_or("").trim().to_string();
    for qualifier in DISPLAY_QUALIFIERS {
        display = display.replace(qualifier, "");
    }
    display.trim().to_string()
}

/// Ratcliff/Obershelp similarity: `2 * matched / (len(a) + len(b))`.
///
/// Two empty strings are identical (`1.0`).
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }
    2.0 * matching_chars(&a, &b) as f64 / total as f64
}

/// Returns the candidate with the highest ratio strictly above
/// [`FUZZY_MATCH_THRESHOLD`]. On ties the earliest candidate wins.
pub fn best_fuzzy_match<'a, T>(
    target: &str,
    candidates: impl IntoIterator<Item = (&'a str, T)>,
) -> Option<(T, f64)> {
    let mut best: Option<(T, f64)> = None;
    for (candidate, value) in candidates {
        let ratio = similarity_ratio(target, candidate);
        let best_ratio = best.as_ref().map_or(0.0, |(_, r)| *r);
        if ratio > FUZZY_MATCH_THRESHOLD && ratio > best_ratio {
            best = Some((value, ratio));
        }
    }
    best
}

/// Total size of the recursive longest-common-block decomposition.
fn matching_chars(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, k) = longest_match(a, b, alo, ahi, blo, bhi);
        if k == 0 {
            continue;
        }
        matched += k;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + k < ahi && j + k < bhi {
            queue.push((i + k, ahi, j + k, bhi));
        }
    }
    matched
}

/// Longest common block in `a[alo..ahi]` x `b[blo..bhi]`, earliest in `a` then `b`.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_k) = (alo, blo, 0);
    // run[j] = length of the common suffix ending at a[i-1], b[j].
    let mut run = vec![0usize; bhi - blo];
    for i in alo..ahi {
        let mut next = vec![0usize; bhi - blo];
        for j in blo..bhi {
            if a[i] != b[j] {
                continue;
            }
            let k = if j > blo { run[j - blo - 1] + 1 } else { 1 };
            next[j - blo] = k;
            if k > best_k {
                best_i = i + 1 - k;
                best_j = j + 1 - k;
                best_k = k;
            }
        }
        run = next;
    }
    (best_i, best_j, best_k)
}

#[cfg(test)]
mod tests {
    use super::{
        best_fuzzy_match, clean_search_name, normalize_name, similarity_ratio,
        simulation_display_name,
    };

    #[test]
    fn clean_search_name_strips_qualifiers_and_keeps_region() {
        assert_eq!(clean_search_name("Clonmel Urban, Tipperary"), "Clonmel, Tipperary");
        assert_eq!(clean_search_name("Lucan-Esker, Dublin"), "Lucan, Dublin");
        assert_eq!(clean_search_name("Ennis (North), Clare"), "Ennis, Clare");
        assert_eq!(clean_search_name("Kells (Kilkenny)"), "Kells");
        assert_eq!(
            clean_search_name("Carrigaline/Monkstown Rural/Douglas, Cork"),
            "Carrigaline, Cork"
        );
    }

    #[test]
    fn multi_word_qualifier_is_stripped_before_rural() {
        assert_eq!(
            clean_search_name("Carrigaline/Monkstown Rural/Douglas, Cork"),
            "Carrigaline, Cork"
        );
        assert_eq!(clean_search_name("Monkstown Rural, Dublin"), "Monkstown, Dublin");
    }

    #[test]
    fn normalize_name_removes_type_words_and_punctuation() {
        assert_eq!(normalize_name("Kilkenny Legal Town"), "kilkenny");
        assert_eq!(normalize_name("Co. Galway Rural"), "galway");
        assert_eq!(normalize_name("St. Mary's  (part)"), "st marys");
    }

    #[test]
    fn simulation_display_name_drops_region_and_suffixes() {
        assert_eq!(simulation_display_name("Clonmel Urban, Tipperary"), "Clonmel");
        assert_eq!(simulation_display_name("Ennis (North), Clare"), "Ennis");
    }

    #[test]
    fn similarity_ratio_matches_block_decomposition() {
        assert_eq!(similarity_ratio("abcd", "bcde"), 0.75);
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("abc", ""), 0.0);
        assert_eq!(similarity_ratio("ballymore", "ballymore"), 1.0);
        let ratio = similarity_ratio("ballymore", "ballymor");
        assert!((ratio - 16.0 / 17.0).abs() < 1e-12);
    }

    #[test]
    fn best_fuzzy_match_requires_ratio_above_threshold() {
        let candidates = vec![("abcdefghxy", 1), ("ballymor", 2), ("ballymore west", 3)];
        let found = best_fuzzy_match("ballymore", candidates.iter().map(|(n, v)| (*n, *v)));
        assert_eq!(found.map(|(v, _)| v), Some(2));

        let rejected = best_fuzzy_match("abcdefghij", [("abcdefghxy", 1)]);
        assert!(rejected.is_none());
    }

    #[test]
    fn best_fuzzy_match_keeps_first_on_tie() {
        let found = best_fuzzy_match("ballymore", [("ballymora", "first"), ("ballymorx", "second")]);
        assert_eq!(found.map(|(v, _)| v), Some("first"));
    }
}
