//! Ratcliff/Obershelp ("Gestalt pattern matching") string similarity and the
//! acronym resolver built on top of it. Grounded in
//! `original_source/worker/src/fuzzy.py`, which leans on Python's
//! `difflib`; no crate in the dependency stack reproduces that exact ratio,
//! so the matching-blocks recursion is implemented directly.

use std::collections::HashMap;

use crate::models::MasterRecord;

pub const FUZZY_CUTOFF: f64 = 0.7;
pub const FUZZY_WARNING_THRESHOLD: f64 = 0.95;

/// Similarity ratio in `[0.0, 1.0]`: `2*M/T` where `M` is the total length of
/// recursively-found longest common substrings and `T` is the combined
/// length of both strings.
pub fn ratio(a: &str, b: &str) -> f64 {
    let ac: Vec<char> = a.chars().collect();
    let bc: Vec<char> = b.chars().collect();
    let total = ac.len() + bc.len();
    if total == 0 {
        return 1.0;
    }
    let matched = matching_total(&ac, &bc);
    2.0 * matched as f64 / total as f64
}

fn matching_total(a: &[char], b: &[char]) -> usize {
    if a.is_empty() || b.is_empty() {
        return 0;
    }
    let (i, j, len) = longest_common_substring(a, b);
    if len == 0 {
        return 0;
    }
    let left = matching_total(&a[..i], &b[..j]);
    let right = matching_total(&a[i + len..], &b[j + len..]);
    left + len + right
}

/// Leftmost-longest common contiguous substring, matching the tie-breaking
/// behavior `difflib.SequenceMatcher.find_longest_match` relies on.
fn longest_common_substring(a: &[char], b: &[char]) -> (usize, usize, usize) {
    let mut best = (0usize, 0usize, 0usize);
    let mut prev = vec![0usize; b.len() + 1];
    for i in 0..a.len() {
        let mut curr = vec![0usize; b.len() + 1];
        for j in 0..b.len() {
            if a[i] == b[j] {
                let run = prev[j] + 1;
                curr[j + 1] = run;
                if run > best.2 {
                    best = (i + 1 - run, j + 1 - run, run);
                }
            }
        }
        prev = curr;
    }
    best
}

/// Resolves a candidate acronym against the master cache: exact (case
/// insensitive) hit first, else the best fuzzy match at or above
/// `FUZZY_CUTOFF`, else the uppercased candidate with no record.
pub fn match_sigla(candidate: &str, master: &HashMap<String, MasterRecord>) -> (String, Option<MasterRecord>) {
    let upper = candidate.to_uppercase();
    if let Some(record) = master.get(&upper) {
        return (upper, Some(record.clone()));
    }

    let mut keys: Vec<&String> = master.keys().collect();
    keys.sort();

    let mut best_key: Option<&String> = None;
    let mut best_ratio = 0.0_f64;
    for key in keys {
        let candidate_ratio = ratio(&upper, key);
        if candidate_ratio >= FUZZY_CUTOFF && candidate_ratio > best_ratio {
            best_ratio = candidate_ratio;
            best_key = Some(key);
        }
    }

    match best_key {
        Some(key) => (key.clone(), master.get(key).cloned()),
        None => (upper, None),
    }
}
