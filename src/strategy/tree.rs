//! Tree-of-thought: breadth-first expansion over partial reasoning paths.
//!
//! The frontier starts as a single empty partial. Each level issues one call
//! per frontier member (a root prompt at depth 0, a refine prompt carrying the
//! partial afterwards), splits every response into branches, appends each
//! branch to its parent, then keeps the `breadth` shortest candidates. Sorting
//! is stable, so equal-length candidates keep generation order.
//!
//! Under [`TreeFinal::Rerun`] the searched frontier does not pick the answer:
//! the final answer comes from a fresh direct call on the bare question.
//! [`TreeFinal::Leaf`] instead feeds the best surviving path into that final
//! call.

use std::fmt;
use std::str::FromStr;

use tracing::debug;

use crate::config::ConfigError;
use crate::extract::parse_branches;
use crate::gateway::Backend;
use crate::prompts;

use super::direct::answer_with;
use super::{StrategyError, StrategyOutcome};

/// How the final answer is produced once the search finishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TreeFinal {
    /// Discard the frontier and run a fresh direct call on the question.
    #[default]
    Rerun,
    /// Run the final direct call with the first surviving path as context.
    Leaf,
}

impl TreeFinal {
    pub const NAMES: &'static str = "rerun, leaf";

    pub fn as_str(&self) -> &'static str {
        match self {
            TreeFinal::Rerun => "rerun",
            TreeFinal::Leaf => "leaf",
        }
    }
}

impl fmt::Display for TreeFinal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TreeFinal {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rerun" => Ok(TreeFinal::Rerun),
            "leaf" => Ok(TreeFinal::Leaf),
            _ => Err(ConfigError::unknown("tree final policy", s, Self::NAMES)),
        }
    }
}

/// Frontiers produced by a finished search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeSearch {
    /// Frontier after each level, `depth` entries, each at most `breadth` long.
    pub levels: Vec<Vec<String>>,
    /// Backend calls issued by the search (final answer call excluded).
    pub backend_calls: usize,
}

impl TreeSearch {
    /// Frontier after the last level.
    pub fn frontier(&self) -> &[String] {
        self.levels.last().map(Vec::as_slice).unwrap_or(&[])
    }
}

fn extend_partial(parent: &str, branch: &str) -> String {
    if parent.is_empty() {
        branch.trim().to_string()
    } else {
        format!("{parent}\n{branch}").trim().to_string()
    }
}

/// Run the breadth-first expansion only.
///
/// Zero `breadth` or `depth` is treated as one; [`super::StrategyConfig`]
/// rejects them earlier.
pub async fn search(
    backend: &dyn Backend,
    question: &str,
    breadth: usize,
    depth: usize,
) -> Result<TreeSearch, StrategyError> {
    let breadth = breadth.max(1);
    let depth = depth.max(1);

    let mut frontier = vec![String::new()];
    let mut levels = Vec::with_capacity(depth);
    let mut backend_calls = 0;

    for level in 0..depth {
        let mut pool: Vec<String> = Vec::new();
        for partial in &frontier {
            let prompt = if level == 0 {
                prompts::tot_root(question)
            } else {
                prompts::tot_refine(question, partial)
            };
            let raw = backend.complete(&prompt.user, Some(prompt.system)).await?;
            backend_calls += 1;

            for branch in parse_branches(&raw, breadth) {
                pool.push(extend_partial(partial, &branch));
            }
        }

        let generated = pool.len();
        pool.sort_by_key(|candidate| candidate.chars().count());
        pool.truncate(breadth);
        debug!(level, generated, kept = pool.len(), "tree search level");

        levels.push(pool.clone());
        frontier = pool;
    }

    Ok(TreeSearch {
        levels,
        backend_calls,
    })
}

/// Search, then produce the final answer per `final_policy`.
pub async fn tree_of_thought(
    backend: &dyn Backend,
    question: &str,
    breadth: usize,
    depth: usize,
    final_policy: TreeFinal,
) -> Result<StrategyOutcome, StrategyError> {
    let tree = search(backend, question, breadth, depth).await?;

    let prompt = match (final_policy, tree.frontier().first()) {
        (TreeFinal::Leaf, Some(path)) if !path.is_empty() => prompts::cot_with_path(question, path),
        _ => prompts::cot(question),
    };
    let final_answer = answer_with(backend, &prompt).await?;

    Ok(StrategyOutcome {
        final_answer,
        backend_calls: tree.backend_calls + 1,
    })
}
