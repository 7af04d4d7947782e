//! Run orchestration: questions in, result records and a metric summary out.
//!
//! Each question runs its strategy sequentially. Questions themselves may
//! overlap when `parallel > 1`; results are still emitted in question order.

use std::time::Instant;

use futures::stream::{self, StreamExt};
use tracing::{info, warn};

use crate::config::ConfigError;
use crate::dataset::Question;
use crate::gateway::Backend;
use crate::records::{OutputLine, RecordError, RecordSink, ResultRecord, SummaryLine};
use crate::scoring::{annotate, summarize, Metric, MetricSummary};
use crate::strategy::{run_strategy, StrategyConfig, StrategyError};

/// What to do when a backend call fails for one question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailurePolicy {
    /// Log the failure, drop the question, keep going.
    #[default]
    Skip,
    /// Stop the batch at the first failure.
    Abort,
}

#[derive(Debug, Clone)]
pub struct RunConfig {
    pub strategy: StrategyConfig,
    pub metric: Metric,
    pub failure_policy: FailurePolicy,
    /// Questions in flight at once.
    pub parallel: usize,
    /// Write annotated records instead of plain ones.
    pub annotate: bool,
}

impl RunConfig {
    pub fn new(strategy: StrategyConfig, metric: Metric) -> Self {
        Self {
            strategy,
            metric,
            failure_policy: FailurePolicy::Skip,
            parallel: 1,
            annotate: false,
        }
    }

    pub fn failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn parallel(mut self, parallel: usize) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn annotate(mut self, annotate: bool) -> Self {
        self.annotate = annotate;
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallel == 0 {
            return Err(ConfigError::invalid("parallel", "must be >= 1"));
        }
        Ok(())
    }
}

/// A question dropped under [`FailurePolicy::Skip`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionFailure {
    pub index: usize,
    /// Short error code (`rate_limited`, `timeout`, ...).
    pub code: &'static str,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct RunReport {
    /// Successful questions, in question order.
    pub records: Vec<ResultRecord>,
    pub failures: Vec<QuestionFailure>,
    /// Metric over `records`.
    pub summary: MetricSummary,
    pub backend_calls: usize,
}

impl RunReport {
    /// True when the run should exit with success: an empty dataset, or at
    /// least one answered question.
    pub fn exit_ok(&self) -> bool {
        !self.records.is_empty() || self.failures.is_empty()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("question {index} failed: {source}")]
    Aborted {
        index: usize,
        #[source]
        source: StrategyError,
    },
    #[error("failed to write records: {0}")]
    Records(#[from] RecordError),
}

/// Run every question and, when a sink is given, write each record followed
/// by one summary line.
pub async fn run_questions(
    backend: &dyn Backend,
    questions: &[Question],
    config: &RunConfig,
    sink: Option<&dyn RecordSink>,
) -> Result<RunReport, RunError> {
    config.validate()?;
    let started = Instant::now();
    let total = questions.len();
    info!(
        questions = total,
        strategy = %config.strategy.strategy,
        metric = %config.metric,
        parallel = config.parallel,
        "starting run"
    );

    let mut outcomes = stream::iter(questions.iter().enumerate())
        .map(|(index, question)| async move {
            let outcome = run_strategy(backend, &question.text, &config.strategy).await;
            (index, question, outcome)
        })
        .buffered(config.parallel);

    let mut records = Vec::with_capacity(total);
    let mut failures = Vec::new();
    let mut backend_calls = 0;

    while let Some((index, question, outcome)) = outcomes.next().await {
        let outcome = match outcome {
            Ok(outcome) => outcome,
            Err(err) => match config.failure_policy {
                FailurePolicy::Abort => {
                    return Err(RunError::Aborted { index, source: err });
                }
                FailurePolicy::Skip => {
                    warn!(index, code = err.code(), error = %err, "question skipped");
                    failures.push(QuestionFailure {
                        index,
                        code: err.code(),
                        error: err.to_string(),
                    });
                    continue;
                }
            },
        };

        backend_calls += outcome.backend_calls;
        let record = ResultRecord {
            index,
            question: question.text.clone(),
            gold: question.gold.clone(),
            final_answer: outcome.final_answer,
            subject: question.subject().map(str::to_string),
        };
        info!(
            index,
            progress = %format!("{}/{}", index + 1, total),
            calls = outcome.backend_calls,
            gold = %record.gold,
            answer = %record.final_answer,
            "question done"
        );

        if let Some(sink) = sink {
            let line = if config.annotate {
                OutputLine::Annotated(annotate(&record, config.metric))
            } else {
                OutputLine::Result(record.clone())
            };
            sink.record(line)?;
        }
        records.push(record);
    }

    let summary = summarize(&records, config.metric);
    if let Some(sink) = sink {
        let failed = (!failures.is_empty()).then_some(failures.len());
        sink.record(OutputLine::Summary(SummaryLine::new(summary.clone(), failed)))?;
    }

    info!(
        metric = %summary.metric,
        value = summary.value,
        n = summary.n,
        failed = failures.len(),
        backend_calls,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "run complete"
    );

    Ok(RunReport {
        records,
        failures,
        summary,
        backend_calls,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;

    fn report(records: usize, failures: usize) -> RunReport {
        let record = ResultRecord {
            index: 0,
            question: String::new(),
            gold: String::new(),
            final_answer: String::new(),
            subject: None,
        };
        let failure = QuestionFailure {
            index: 0,
            code: "timeout",
            error: String::new(),
        };
        RunReport {
            records: vec![record; records],
            failures: vec![failure; failures],
            summary: MetricSummary {
                metric: Metric::Em,
                value: 0.0,
                n: records,
            },
            backend_calls: 0,
        }
    }

    #[test]
    fn exit_status_policy() {
        assert!(report(0, 0).exit_ok());
        assert!(report(2, 1).exit_ok());
        assert!(!report(0, 3).exit_ok());
    }

    #[test]
    fn zero_parallelism_is_a_config_fault() {
        let cfg = RunConfig::new(StrategyConfig::for_strategy(Strategy::Cot), Metric::Em)
            .parallel(0);
        assert!(cfg.validate().is_err());
        assert_eq!(
            RunConfig::new(StrategyConfig::for_strategy(Strategy::Cot), Metric::Em)
                .failure_policy,
            FailurePolicy::Skip
        );
    }
}
