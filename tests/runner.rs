use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use benchkit::dataset::Question;
use benchkit::gateway::{Backend, ProviderError};
use benchkit::records::{OutputLine, RecordError, RecordSink};
use benchkit::runner::{run_questions, FailurePolicy, RunConfig, RunError};
use benchkit::scoring::Metric;
use benchkit::strategy::{Strategy, StrategyConfig};

/// Answers "What is N?" with N, after a delay that shrinks for later
/// questions. Questions listed in `failing` return a server error.
struct EchoBackend {
    failing: Vec<usize>,
    calls: AtomicUsize,
}

impl EchoBackend {
    fn new(failing: &[usize]) -> Self {
        Self {
            failing: failing.to_vec(),
            calls: AtomicUsize::new(0),
        }
    }
}

fn number_in(prompt: &str) -> usize {
    prompt
        .trim_start_matches("What is ")
        .split('?')
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0)
}

#[async_trait::async_trait]
impl Backend for EchoBackend {
    async fn complete(&self, prompt: &str, _system: Option<&str>) -> Result<String, ProviderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let n = number_in(prompt);
        tokio::time::sleep(Duration::from_millis(40u64.saturating_sub(n as u64 * 10))).await;
        if self.failing.contains(&n) {
            return Err(ProviderError::provider("echo", "server exploded", true));
        }
        Ok(format!("thinking\nFINAL: {n}"))
    }
}

#[derive(Default)]
struct MemorySink {
    lines: Mutex<Vec<OutputLine>>,
}

impl RecordSink for MemorySink {
    fn record(&self, line: OutputLine) -> Result<(), RecordError> {
        self.lines.lock().unwrap().push(line);
        Ok(())
    }
}

fn questions(n: usize) -> Vec<Question> {
    (0..n)
        .map(|i| {
            let gold = if i == 1 { "999".to_string() } else { i.to_string() };
            Question::new(format!("What is {i}?"), gold).with_meta("subject", "arithmetic")
        })
        .collect()
}

fn config() -> RunConfig {
    RunConfig::new(StrategyConfig::for_strategy(Strategy::Cot), Metric::Accuracy)
}

#[tokio::test]
async fn records_follow_question_order_under_parallelism() {
    let backend = EchoBackend::new(&[]);
    let qs = questions(4);
    let report = run_questions(&backend, &qs, &config().parallel(4), None)
        .await
        .unwrap();

    let indices: Vec<usize> = report.records.iter().map(|r| r.index).collect();
    assert_eq!(indices, vec![0, 1, 2, 3]);
    assert_eq!(report.records[2].final_answer, "2");
    assert_eq!(report.records[2].question, "What is 2?");
    assert_eq!(report.records[2].subject.as_deref(), Some("arithmetic"));
    assert_eq!(report.backend_calls, 4);

    assert_eq!(report.summary.n, 4);
    assert!((report.summary.value - 0.75).abs() < 1e-9);
    assert!(report.exit_ok());
}

#[tokio::test]
async fn skip_policy_drops_failed_questions_and_keeps_going() {
    let backend = EchoBackend::new(&[2]);
    let qs = questions(4);
    let sink = MemorySink::default();
    let report = run_questions(&backend, &qs, &config(), Some(&sink))
        .await
        .unwrap();

    assert_eq!(report.records.len(), 3);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 2);
    assert_eq!(report.failures[0].code, "provider_error");
    assert!(report.exit_ok());
    assert_eq!(backend.calls.load(Ordering::SeqCst), 4);

    let lines = sink.lines.lock().unwrap();
    assert_eq!(lines.len(), 4);
    match lines.last().unwrap() {
        OutputLine::Summary(summary) => {
            assert_eq!(summary.metric.n, 3);
            assert_eq!(summary.failed, Some(1));
        }
        other => panic!("expected summary line, got {other:?}"),
    }
}

#[tokio::test]
async fn abort_policy_stops_at_first_failure() {
    let backend = EchoBackend::new(&[1]);
    let qs = questions(4);
    let sink = MemorySink::default();
    let cfg = config().failure_policy(FailurePolicy::Abort);
    let err = run_questions(&backend, &qs, &cfg, Some(&sink))
        .await
        .unwrap_err();

    match err {
        RunError::Aborted { index, source } => {
            assert_eq!(index, 1);
            assert_eq!(source.code(), "provider_error");
        }
        other => panic!("expected abort, got {other:?}"),
    }
    // Question 0 was written; no summary after an abort.
    let lines = sink.lines.lock().unwrap();
    assert_eq!(lines.len(), 1);
    assert!(matches!(lines[0], OutputLine::Result(_)));
}

#[tokio::test]
async fn all_failures_is_not_a_successful_run() {
    let backend = EchoBackend::new(&[0, 1]);
    let report = run_questions(&backend, &questions(2), &config(), None)
        .await
        .unwrap();
    assert!(report.records.is_empty());
    assert!(!report.exit_ok());
    assert_eq!(report.summary.value, 0.0);
}

#[tokio::test]
async fn empty_dataset_succeeds_with_zero_summary() {
    let backend = EchoBackend::new(&[]);
    let report = run_questions(&backend, &[], &config(), None).await.unwrap();
    assert!(report.exit_ok());
    assert_eq!(report.summary.n, 0);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn annotate_writes_verdicts() {
    let backend = EchoBackend::new(&[]);
    let sink = MemorySink::default();
    run_questions(&backend, &questions(2), &config().annotate(true), Some(&sink))
        .await
        .unwrap();

    let lines = sink.lines.lock().unwrap();
    match (&lines[0], &lines[1]) {
        (OutputLine::Annotated(first), OutputLine::Annotated(second)) => {
            assert!(first.metric_correct);
            assert!(!second.metric_correct);
            assert_eq!(first.metric_name, "accuracy");
        }
        other => panic!("expected annotated lines, got {other:?}"),
    }
}

#[tokio::test]
async fn zero_parallelism_fails_before_any_call() {
    let backend = EchoBackend::new(&[]);
    let err = run_questions(&backend, &questions(2), &config().parallel(0), None)
        .await
        .unwrap_err();
    assert!(matches!(err, RunError::Config(_)));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}
