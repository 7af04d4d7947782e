#![forbid(unsafe_code)]

//! # benchkit
//!
//! Benchmark LLM reasoning strategies on question-answering datasets.
//!
//! A question is answered by one of three strategies driving a text
//! generation [`Backend`]: a single chain-of-thought call (`cot`),
//! self-consistency voting over `k` samples (`sc`), or a breadth-limited
//! tree-of-thought search (`tot`). Final answers are pulled from the
//! `FINAL:` marker, written as JSONL result records, and scored with
//! numeric accuracy, exact match, token F1 or multiple-choice accuracy.
//!
//! Strategies issue their backend calls strictly in sequence, so a backend
//! that replays the same responses always yields the same answers.

pub mod config;
pub mod dataset;
pub mod extract;
pub mod gateway;
pub mod prompts;
pub mod records;
pub mod runner;
pub mod scoring;
pub mod strategy;

pub use config::{build_backend, BackendConfig, BackendKind, ConfigError};
pub use dataset::{load_questions, DatasetError, DatasetKind, Question};
pub use extract::{extract_final, parse_branches};
pub use gateway::{Backend, MeteredBackend, ProviderError, UsageSink};
pub use records::{
    read_records, AnnotatedRecord, JsonlRecordWriter, OutputLine, RecordError, RecordSink,
    RecordWorker, ResultRecord,
};
pub use runner::{run_questions, FailurePolicy, RunConfig, RunError, RunReport};
pub use scoring::{annotate_rows, summarize, Metric, MetricSummary};
pub use strategy::{
    run_strategy, Strategy, StrategyConfig, StrategyError, StrategyOutcome, TreeFinal,
};
