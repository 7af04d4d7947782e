//! Pulling structure out of free-form generations.
//!
//! Both functions always produce output: malformed generations degrade to a
//! fallback instead of failing.

use once_cell::sync::Lazy;
use regex::Regex;

static FINAL_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)FINAL:[ \t]*(.*)").expect("Invalid final marker regex"));

/// Branch lines outside this whitespace-token range are discarded.
const MIN_BRANCH_TOKENS: usize = 3;
const MAX_BRANCH_TOKENS: usize = 40;

/// Character cap for the last-resort branch.
const FALLBACK_BRANCH_CHARS: usize = 140;

/// Extract the terminal answer from a generation.
///
/// The first `FINAL:` marker (any case) wins and the rest of its line is
/// returned trimmed; a marker that ends its line yields an empty answer. Without a marker the last non-empty line is returned
/// trimmed, in full. Empty input yields an empty string.
pub fn extract_final(text: &str) -> String {
    let text = text.trim();
    if let Some(caps) = FINAL_MARKER.captures(text) {
        return caps
            .get(1)
            .map(|m| m.as_str().trim().to_string())
            .unwrap_or_default();
    }
    text.lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .unwrap_or_default()
        .to_string()
}

fn strip_bullet(line: &str) -> &str {
    line.trim_matches(|c| matches!(c, '-' | '•' | ' ' | '\t'))
}

/// Split a generation into candidate continuation steps.
///
/// Returns at most `max_branches` entries (a zero cap is treated as one) and
/// never an empty sequence.
pub fn parse_branches(text: &str, max_branches: usize) -> Vec<String> {
    let max_branches = max_branches.max(1);

    let stripped: Vec<&str> = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(strip_bullet)
        .collect();

    let branches: Vec<String> = stripped
        .iter()
        .filter(|line| {
            let tokens = line.split_whitespace().count();
            (MIN_BRANCH_TOKENS..=MAX_BRANCH_TOKENS).contains(&tokens)
        })
        .take(max_branches)
        .map(|line| line.to_string())
        .collect();

    if !branches.is_empty() {
        return branches;
    }

    if let Some(first) = stripped.iter().find(|line| !line.is_empty()) {
        return vec![first.to_string()];
    }

    // Every line was bullets only.
    if let Some(raw) = text.lines().map(str::trim).find(|line| !line.is_empty()) {
        return vec![raw.chars().take(FALLBACK_BRANCH_CHARS).collect()];
    }

    vec![text.trim().chars().take(FALLBACK_BRANCH_CHARS).collect()]
}
