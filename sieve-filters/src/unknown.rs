//! Unknown parameter detection with "did you mean" suggestions.
//!
//! Similarity is the ratio `2 * M / T`, where `T` is the combined length of
//! both strings and `M` the number of characters in matching blocks found by
//! repeatedly taking the longest common substring and recursing on both
//! sides. Comparison is case sensitive.

use std::collections::HashMap;

use crate::error::{ErrorDetail, ErrorMap};

/// Maximum number of suggestions per parameter.
pub const MAX_SUGGESTIONS: usize = 3;

/// Minimum similarity for a suggestion.
pub const CUTOFF: f64 = 0.6;

/// Similarity of two strings in `0.0..=1.0`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    ratio(matching_characters(&a, &b), a.len() + b.len())
}

fn ratio(matched: usize, total: usize) -> f64 {
    if total == 0 {
        return 1.0;
    }
    2.0 * matched as f64 / total as f64
}

fn char_counts(chars: &[char]) -> HashMap<char, usize> {
    let mut counts = HashMap::new();
    for &c in chars {
        *counts.entry(c).or_insert(0) += 1;
    }
    counts
}

/// Characters the two strings have in common, ignoring order.
///
/// Never less than [`matching_characters`], so it bounds the similarity.
fn shared_characters(chars: &[char], counts: &HashMap<char, usize>) -> usize {
    char_counts(chars)
        .into_iter()
        .map(|(c, n)| n.min(counts.get(&c).copied().unwrap_or(0)))
        .sum()
}

fn matching_characters(a: &[char], b: &[char]) -> usize {
    let mut matched = 0;
    let mut queue = vec![(0, a.len(), 0, b.len())];
    while let Some((alo, ahi, blo, bhi)) = queue.pop() {
        let (i, j, size) = longest_match(a, b, alo, ahi, blo, bhi);
        if size == 0 {
            continue;
        }
        matched += size;
        if alo < i && blo < j {
            queue.push((alo, i, blo, j));
        }
        if i + size < ahi && j + size < bhi {
            queue.push((i + size, ahi, j + size, bhi));
        }
    }
    matched
}

/// Longest common run of `a[alo..ahi]` and `b[blo..bhi]`, earliest in `a` on ties.
fn longest_match(
    a: &[char],
    b: &[char],
    alo: usize,
    ahi: usize,
    blo: usize,
    bhi: usize,
) -> (usize, usize, usize) {
    let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
    // lengths[j + 1] holds the run ending at (i - 1, j)
    let mut lengths = vec![0usize; bhi - blo + 1];
    let mut next = vec![0usize; bhi - blo + 1];
    for i in alo..ahi {
        next.fill(0);
        for j in blo..bhi {
            if a[i] == b[j] {
                let k = lengths[j - blo] + 1;
                next[j - blo + 1] = k;
                if k > best_size {
                    best_i = i + 1 - k;
                    best_j = j + 1 - k;
                    best_size = k;
                }
            }
        }
        std::mem::swap(&mut lengths, &mut next);
    }
    (best_i, best_j, best_size)
}

/// The closest `known` names to `word`, best first.
///
/// Candidates are first screened by length and by shared characters, both
/// upper bounds of the similarity, before the full comparison runs.
///
/// ```rust
/// use sieve_filters::unknown::close_matches;
///
/// let known = ["username", "email", "first_name"];
/// assert_eq!(close_matches("usrname", known), vec!["username"]);
/// assert!(close_matches("zzz999", known).is_empty());
/// ```
pub fn close_matches<'a>(word: &str, known: impl IntoIterator<Item = &'a str>) -> Vec<&'a str> {
    let word: Vec<char> = word.chars().collect();
    let mut counts = None;

    let mut scored: Vec<(f64, &str)> = known
        .into_iter()
        .filter_map(|candidate| {
            let chars: Vec<char> = candidate.chars().collect();
            let total = chars.len() + word.len();
            if ratio(chars.len().min(word.len()), total) < CUTOFF {
                return None;
            }
            let counts = counts.get_or_insert_with(|| char_counts(&word));
            if ratio(shared_characters(&chars, counts), total) < CUTOFF {
                return None;
            }
            let score = ratio(matching_characters(&chars, &word), total);
            (score >= CUTOFF).then_some((score, candidate))
        })
        .collect();
    // Highest score first, ties broken by the larger string
    scored.sort_by(|(sa, a), (sb, b)| sb.total_cmp(sa).then_with(|| b.cmp(a)));
    scored.truncate(MAX_SUGGESTIONS);
    scored.into_iter().map(|(_, candidate)| candidate).collect()
}

/// Message for a parameter that matches nothing.
pub fn unknown_message(matches: &[&str]) -> String {
    match matches {
        [] => "This query parameter does not exist.".to_string(),
        [only] => format!("This query parameter does not exist. Did you mean \"{}\"?", only),
        many => {
            let possibilities: Vec<_> = many.iter().map(|m| format!("\"{}\"", m)).collect();
            format!(
                "This query parameter does not exist. Did you mean one of these: {}?",
                possibilities.join(", ")
            )
        }
    }
}

/// One error per unknown parameter, with suggestions from `known`.
pub fn unknown_parameter_errors(unknown: &[String], known: &[String]) -> ErrorMap {
    let mut errors = ErrorMap::new();
    for param in unknown {
        let matches = close_matches(param, known.iter().map(String::as_str));
        errors.insert(
            param.clone(),
            vec![ErrorDetail::invalid(unknown_message(&matches))],
        );
    }
    errors
}
