//! Self-consistency: `k` independent direct samples, majority answer wins.

use tracing::debug;

use crate::gateway::Backend;
use crate::prompts;

use super::direct::answer_with;
use super::{StrategyError, StrategyOutcome};

/// Sample the direct strategy `k` times and return the most frequent answer.
///
/// All `k` samples are always drawn, even once a majority is certain. A `k`
/// of zero is treated as one; [`super::StrategyConfig`] rejects it earlier.
pub async fn self_consistency(
    backend: &dyn Backend,
    question: &str,
    k: usize,
) -> Result<StrategyOutcome, StrategyError> {
    let k = k.max(1);
    let prompt = prompts::cot(question);

    let mut answers = Vec::with_capacity(k);
    for _ in 0..k {
        answers.push(answer_with(backend, &prompt).await?);
    }

    let final_answer = majority_vote(&answers).unwrap_or_default().to_string();
    debug!(k, answers = ?answers, winner = %final_answer, "self-consistency vote");

    Ok(StrategyOutcome {
        final_answer,
        backend_calls: k,
    })
}

/// Most frequent value; ties go to the value seen first.
///
/// Answers are compared verbatim (after extraction), so "42" and "42.0" are
/// separate votes.
pub fn majority_vote(answers: &[String]) -> Option<&str> {
    // (answer, count) in first-seen order
    let mut tally: Vec<(&str, usize)> = Vec::new();
    for answer in answers {
        match tally.iter_mut().find(|(seen, _)| *seen == answer.as_str()) {
            Some((_, count)) => *count += 1,
            None => tally.push((answer.as_str(), 1)),
        }
    }

    let mut best: Option<(&str, usize)> = None;
    for (answer, count) in tally {
        if best.map_or(true, |(_, best_count)| count > best_count) {
            best = Some((answer, count));
        }
    }
    best.map(|(answer, _)| answer)
}
