//! Answer normalization and metrics.
//!
//! Predictions and gold labels are unstructured text, so nothing here fails:
//! missing or malformed values score as empty strings.
//!
//! Answer spaces:
//! - **numeric** (`accuracy`): last numeric literal on both sides, compared in
//!   canonical form; falls back to normalized-text equality when either side
//!   has no number. Well-formed thousands groups read as one number, so
//!   "100,200" is 100200; anything else splits at the comma.
//! - **free text** (`em`, `f1`): lowercase, alphanumerics only, articles dropped
//! - **multiple choice** (`mc`): first standalone letter A-E

use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;
use crate::records::{AnnotatedRecord, ResultRecord};

// Comma-grouped thousands first, then plain signed decimals/integers. A group
// must end at a word boundary, so "12,3456" is two literals, not "12,345" + "6".
static NUMERIC_LITERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[-+]?(?:\d{1,3}(?:,\d{3})+\b(?:\.\d+)?|\d*\.?\d+)")
        .expect("Invalid numeric literal regex")
});

static MC_CHOICE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\b([A-E])\b").expect("Invalid choice label regex"));

const ARTICLES: [&str; 3] = ["a", "an", "the"];

// =============================================================================
// Normalization
// =============================================================================

/// Outcome of numeric normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NumericForm {
    /// Whether a numeric literal was found.
    pub found: bool,
    /// Canonical literal when found, otherwise the trimmed input.
    pub value: String,
}

/// Last numeric literal in `s`, verbatim.
pub fn last_numeric_literal(s: &str) -> Option<&str> {
    NUMERIC_LITERAL.find_iter(s).last().map(|m| m.as_str())
}

/// Canonical spelling of a matched literal: no sign for positives or zero,
/// no thousands separators, no leading integer zeros, no trailing fraction
/// zeros. "42.0", "+42" and "042" all become "42".
fn canonical_number(literal: &str) -> String {
    let cleaned: String = literal.chars().filter(|c| *c != ',').collect();
    let (negative, digits) = match cleaned.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, cleaned.strip_prefix('+').unwrap_or(&cleaned)),
    };

    let (int_part, frac_part) = digits.split_once('.').unwrap_or((digits, ""));
    let int_part = int_part.trim_start_matches('0');
    let int_part = if int_part.is_empty() { "0" } else { int_part };
    let frac_part = frac_part.trim_end_matches('0');

    let mut out = String::with_capacity(cleaned.len() + 1);
    let is_zero = int_part == "0" && frac_part.is_empty();
    if negative && !is_zero {
        out.push('-');
    }
    out.push_str(int_part);
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}

pub fn normalize_numeric(s: &str) -> NumericForm {
    match last_numeric_literal(s) {
        Some(literal) => NumericForm {
            found: true,
            value: canonical_number(literal),
        },
        None => NumericForm {
            found: false,
            value: s.trim().to_string(),
        },
    }
}

pub fn normalize_text(s: &str) -> String {
    let lowered = s.to_lowercase();
    let kept: String = lowered
        .chars()
        .filter(|c| c.is_ascii_digit() || c.is_ascii_lowercase() || c.is_whitespace())
        .collect();
    kept.split_whitespace()
        .filter(|token| !ARTICLES.contains(token))
        .collect::<Vec<_>>()
        .join(" ")
}

/// First standalone choice letter A-E, uppercased; empty when none.
pub fn extract_mc_label(text: &str) -> String {
    MC_CHOICE
        .captures(text)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str().to_ascii_uppercase())
        .unwrap_or_default()
}

// =============================================================================
// Per-pair judgements
// =============================================================================

pub fn exact_match_single(pred: &str, gold: &str) -> bool {
    normalize_text(pred) == normalize_text(gold)
}

pub fn numeric_match(pred: &str, gold: &str) -> bool {
    let g = normalize_numeric(gold);
    let p = normalize_numeric(pred);
    if g.found && p.found {
        g.value == p.value
    } else {
        exact_match_single(pred, gold)
    }
}

/// Token-level F1 over normalized-text bags of tokens.
pub fn f1_token(pred: &str, gold: &str) -> f64 {
    let pred_norm = normalize_text(pred);
    let gold_norm = normalize_text(gold);
    let p_toks: Vec<&str> = pred_norm.split_whitespace().collect();
    let g_toks: Vec<&str> = gold_norm.split_whitespace().collect();

    if p_toks.is_empty() && g_toks.is_empty() {
        return 1.0;
    }
    if p_toks.is_empty() || g_toks.is_empty() {
        return 0.0;
    }

    let mut gold_counts: HashMap<&str, usize> = HashMap::new();
    for tok in &g_toks {
        *gold_counts.entry(*tok).or_default() += 1;
    }
    let mut overlap = 0usize;
    for tok in &p_toks {
        if let Some(count) = gold_counts.get_mut(tok) {
            if *count > 0 {
                *count -= 1;
                overlap += 1;
            }
        }
    }
    if overlap == 0 {
        return 0.0;
    }

    let precision = overlap as f64 / p_toks.len() as f64;
    let recall = overlap as f64 / g_toks.len() as f64;
    if precision + recall > 0.0 {
        2.0 * precision * recall / (precision + recall)
    } else {
        0.0
    }
}

/// Multiple-choice correctness. An empty gold label never matches.
pub fn mc_match(pred: &str, gold: &str) -> bool {
    let gold = gold.trim().to_uppercase();
    if gold.is_empty() {
        return false;
    }
    extract_mc_label(pred) == gold
}

// =============================================================================
// Metrics
// =============================================================================

/// Anything that carries a gold label and a prediction.
pub trait AnswerPair {
    fn gold(&self) -> &str;
    fn prediction(&self) -> &str;
}

impl AnswerPair for ResultRecord {
    fn gold(&self) -> &str {
        &self.gold
    }

    fn prediction(&self) -> &str {
        &self.final_answer
    }
}

impl<'a> AnswerPair for (&'a str, &'a str) {
    fn gold(&self) -> &str {
        self.0
    }

    fn prediction(&self) -> &str {
        self.1
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// Numeric accuracy with text fallback.
    Accuracy,
    /// Normalized exact match.
    Em,
    /// Mean token F1.
    F1,
    /// Multiple-choice accuracy.
    Mc,
}

/// Correctness of one pair under a metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Judgement {
    pub correct: bool,
    /// Raw per-pair score; only F1 has one.
    pub score: Option<f64>,
}

impl Metric {
    pub const NAMES: &'static str = "accuracy, em, f1, mc";

    pub fn as_str(&self) -> &'static str {
        match self {
            Metric::Accuracy => "accuracy",
            Metric::Em => "em",
            Metric::F1 => "f1",
            Metric::Mc => "mc",
        }
    }

    pub fn judge(&self, pred: &str, gold: &str) -> Judgement {
        match self {
            Metric::Accuracy => Judgement {
                correct: numeric_match(pred, gold),
                score: None,
            },
            Metric::Em => Judgement {
                correct: exact_match_single(pred, gold),
                score: None,
            },
            Metric::F1 => {
                let score = f1_token(pred, gold);
                Judgement {
                    correct: score == 1.0,
                    score: Some(score),
                }
            }
            Metric::Mc => Judgement {
                correct: mc_match(pred, gold),
                score: None,
            },
        }
    }

    /// Batch value in [0, 1]: fraction correct, or mean F1. Empty batches
    /// score 0.
    pub fn score<P: AnswerPair>(&self, rows: &[P]) -> f64 {
        match self {
            Metric::Accuracy => accuracy_numeric(rows),
            Metric::Em => exact_match(rows),
            Metric::F1 => f1_average(rows),
            Metric::Mc => mc_accuracy(rows),
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Metric {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "accuracy" => Ok(Metric::Accuracy),
            "em" => Ok(Metric::Em),
            "f1" => Ok(Metric::F1),
            "mc" => Ok(Metric::Mc),
            _ => Err(ConfigError::unknown("metric", s, Self::NAMES)),
        }
    }
}

fn fraction_correct<P: AnswerPair>(rows: &[P], judge: impl Fn(&str, &str) -> bool) -> f64 {
    let correct = rows
        .iter()
        .filter(|r| judge(r.prediction(), r.gold()))
        .count();
    correct as f64 / rows.len().max(1) as f64
}

pub fn accuracy_numeric<P: AnswerPair>(rows: &[P]) -> f64 {
    fraction_correct(rows, numeric_match)
}

pub fn exact_match<P: AnswerPair>(rows: &[P]) -> f64 {
    fraction_correct(rows, exact_match_single)
}

pub fn f1_average<P: AnswerPair>(rows: &[P]) -> f64 {
    let total: f64 = rows
        .iter()
        .map(|r| f1_token(r.prediction(), r.gold()))
        .sum();
    total / rows.len().max(1) as f64
}

pub fn mc_accuracy<P: AnswerPair>(rows: &[P]) -> f64 {
    fraction_correct(rows, mc_match)
}

// =============================================================================
// Annotation and summaries
// =============================================================================

/// Copy of `record` carrying the metric's per-pair verdict.
pub fn annotate(record: &ResultRecord, metric: Metric) -> AnnotatedRecord {
    let judgement = metric.judge(&record.final_answer, &record.gold);
    AnnotatedRecord {
        record: record.clone(),
        metric_name: metric.as_str().to_string(),
        metric_correct: judgement.correct,
        metric_score: judgement.score,
    }
}

/// Annotate every record; inputs are left untouched.
pub fn annotate_rows(rows: &[ResultRecord], metric: Metric) -> Vec<AnnotatedRecord> {
    rows.iter().map(|r| annotate(r, metric)).collect()
}

/// Aggregate metric over a batch, recomputable from records alone.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricSummary {
    pub metric: Metric,
    pub value: f64,
    pub n: usize,
}

pub fn summarize<P: AnswerPair>(rows: &[P], metric: Metric) -> MetricSummary {
    MetricSummary {
        metric,
        value: metric.score(rows),
        n: rows.len(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonical_number_spellings() {
        assert_eq!(canonical_number("42.0"), "42");
        assert_eq!(canonical_number("+42"), "42");
        assert_eq!(canonical_number("042"), "42");
        assert_eq!(canonical_number("-3.50"), "-3.5");
        assert_eq!(canonical_number(".5"), "0.5");
        assert_eq!(canonical_number("-0.0"), "0");
        assert_eq!(canonical_number("1,234.50"), "1234.5");
    }

    #[test]
    fn last_literal_prefers_grouped_thousands() {
        assert_eq!(last_numeric_literal("paid $1,000 total"), Some("1,000"));
        assert_eq!(last_numeric_literal("12345 and 7"), Some("7"));
        assert_eq!(last_numeric_literal("no digits"), None);
    }
}
