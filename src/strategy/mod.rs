//! Reasoning strategies over a [`Backend`].
//!
//! Three strategies turn one question into one or more backend calls and a
//! single final-answer string:
//! - **Direct** (`cot`): one chain-of-thought call
//! - **Self-consistency** (`sc`): `k` independent direct samples, majority vote
//! - **Tree-of-thought** (`tot`): breadth-limited, depth-bounded search, then
//!   one final direct call
//!
//! Calls within a question are issued one at a time in a fixed order, so
//! identical backend response sequences always yield identical answers. Any
//! backend failure aborts the question and is returned to the caller.

pub mod direct;
pub mod tree;
pub mod vote;

use std::fmt;
use std::str::FromStr;

use crate::config::ConfigError;
use crate::gateway::{Backend, ProviderError};

pub use direct::direct;
pub use tree::{search, tree_of_thought, TreeFinal, TreeSearch};
pub use vote::{majority_vote, self_consistency};

/// Which strategy to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    /// Chain-of-thought, one call.
    Cot,
    /// Self-consistency voting.
    Sc,
    /// Tree-of-thought search.
    Tot,
}

impl Strategy {
    pub const NAMES: &'static str = "cot, sc, tot";

    pub fn as_str(&self) -> &'static str {
        match self {
            Strategy::Cot => "cot",
            Strategy::Sc => "sc",
            Strategy::Tot => "tot",
        }
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Strategy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cot" => Ok(Strategy::Cot),
            "sc" => Ok(Strategy::Sc),
            "tot" => Ok(Strategy::Tot),
            _ => Err(ConfigError::unknown("strategy", s, Self::NAMES)),
        }
    }
}

/// Validated strategy parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyConfig {
    pub strategy: Strategy,
    /// Self-consistency sample count.
    pub k: usize,
    /// Tree search frontier cap per level.
    pub breadth: usize,
    /// Tree search levels.
    pub depth: usize,
    /// How tree search produces its answer.
    pub tree_final: TreeFinal,
}

impl StrategyConfig {
    /// Build and validate. Zero `k`, `breadth` or `depth` is a configuration
    /// fault regardless of the chosen strategy.
    pub fn new(
        strategy: Strategy,
        k: usize,
        breadth: usize,
        depth: usize,
        tree_final: TreeFinal,
    ) -> Result<Self, ConfigError> {
        for (name, value) in [("k", k), ("breadth", breadth), ("depth", depth)] {
            if value == 0 {
                return Err(ConfigError::invalid(name, "must be >= 1"));
            }
        }
        Ok(Self {
            strategy,
            k,
            breadth,
            depth,
            tree_final,
        })
    }

    /// Default parameters (k=5, breadth=3, depth=2) for a strategy.
    pub fn for_strategy(strategy: Strategy) -> Self {
        Self {
            strategy,
            k: 5,
            breadth: 3,
            depth: 2,
            tree_final: TreeFinal::Rerun,
        }
    }
}

/// Result of running one strategy on one question.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategyOutcome {
    /// Extracted final answer.
    pub final_answer: String,
    /// Backend calls issued.
    pub backend_calls: usize,
}

/// Backend fault while running a strategy.
#[derive(Debug, thiserror::Error)]
pub enum StrategyError {
    #[error("backend call failed: {0}")]
    Backend(#[from] ProviderError),
}

impl StrategyError {
    pub fn code(&self) -> &'static str {
        match self {
            StrategyError::Backend(e) => e.code(),
        }
    }
}

/// Run the configured strategy for one question.
pub async fn run_strategy(
    backend: &dyn Backend,
    question: &str,
    config: &StrategyConfig,
) -> Result<StrategyOutcome, StrategyError> {
    match config.strategy {
        Strategy::Cot => direct(backend, question).await,
        Strategy::Sc => self_consistency(backend, question, config.k).await,
        Strategy::Tot => {
            tree_of_thought(
                backend,
                question,
                config.breadth,
                config.depth,
                config.tree_final,
            )
            .await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strategy_names_parse_case_insensitively() {
        assert_eq!("cot".parse::<Strategy>().unwrap(), Strategy::Cot);
        assert_eq!(" SC ".parse::<Strategy>().unwrap(), Strategy::Sc);
        assert_eq!("tot".parse::<Strategy>().unwrap(), Strategy::Tot);
        assert!("beam".parse::<Strategy>().is_err());
    }

    #[test]
    fn zero_parameters_are_rejected() {
        assert!(StrategyConfig::new(Strategy::Sc, 0, 3, 2, TreeFinal::Rerun).is_err());
        assert!(StrategyConfig::new(Strategy::Tot, 5, 0, 2, TreeFinal::Rerun).is_err());
        assert!(StrategyConfig::new(Strategy::Tot, 5, 3, 0, TreeFinal::Rerun).is_err());
        let cfg = StrategyConfig::new(Strategy::Tot, 1, 1, 1, TreeFinal::Leaf).unwrap();
        assert_eq!(cfg.tree_final, TreeFinal::Leaf);
    }

    #[test]
    fn defaults_match_command_surface() {
        let cfg = StrategyConfig::for_strategy(Strategy::Sc);
        assert_eq!((cfg.k, cfg.breadth, cfg.depth), (5, 3, 2));
        assert_eq!(cfg.tree_final, TreeFinal::Rerun);
    }
}
