//! Result records and their JSONL persistence.
//!
//! One JSON object per line, in question order. A results file may end with
//! summary lines (`"_summary": true`), which readers skip.

use std::fs::{File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

use serde::{Deserialize, Serialize};

use crate::scoring::MetricSummary;

/// Outcome of one question. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultRecord {
    #[serde(rename = "idx")]
    pub index: usize,
    #[serde(default)]
    pub question: String,
    #[serde(default)]
    pub gold: String,
    #[serde(rename = "final", alias = "winner", default)]
    pub final_answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

/// A result record plus one metric's verdict.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedRecord {
    #[serde(flatten)]
    pub record: ResultRecord,
    pub metric_name: String,
    pub metric_correct: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metric_score: Option<f64>,
}

/// Trailing summary line of a results file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SummaryLine {
    #[serde(rename = "_summary")]
    pub summary: bool,
    #[serde(flatten)]
    pub metric: MetricSummary,
    /// Questions skipped after a backend fault.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failed: Option<usize>,
}

impl SummaryLine {
    pub fn new(metric: MetricSummary, failed: Option<usize>) -> Self {
        Self {
            summary: true,
            metric,
            failed,
        }
    }
}

/// Any line a results file can hold.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OutputLine {
    Result(ResultRecord),
    Annotated(AnnotatedRecord),
    Summary(SummaryLine),
}

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serde(String),
    #[error("line {line}: {message}")]
    Parse { line: usize, message: String },
    #[error("record channel closed")]
    Closed,
    #[error("record worker failed: {0}")]
    Join(String),
}

pub trait RecordSink: Send + Sync {
    fn record(&self, line: OutputLine) -> Result<(), RecordError>;
}

// =============================================================================
// JSONL writer
// =============================================================================

/// Channel-fed JSONL writer; a background thread owns the file.
#[derive(Clone)]
pub struct JsonlRecordWriter {
    sender: mpsc::Sender<OutputLine>,
}

/// Handle to the writer thread. `join` after dropping every writer clone.
pub struct RecordWorker {
    handle: Option<std::thread::JoinHandle<Result<usize, RecordError>>>,
}

impl RecordWorker {
    /// Wait for the writer to flush; returns the number of lines written.
    pub fn join(mut self) -> Result<usize, RecordError> {
        match self.handle.take() {
            Some(handle) => match handle.join() {
                Ok(result) => result,
                Err(_) => Err(RecordError::Join("record worker panicked".to_string())),
            },
            None => Ok(0),
        }
    }
}

impl JsonlRecordWriter {
    /// Create (or truncate) `path`, creating parent directories.
    pub fn create(path: impl AsRef<Path>) -> Result<(Self, RecordWorker), RecordError> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let file = File::create(path)?;
        Ok(Self::spawn(file))
    }

    /// Open `path` for appending, creating it if missing.
    pub fn append(path: impl AsRef<Path>) -> Result<(Self, RecordWorker), RecordError> {
        let path = path.as_ref();
        ensure_parent(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self::spawn(file))
    }

    fn spawn(file: File) -> (Self, RecordWorker) {
        let (sender, receiver) = mpsc::channel::<OutputLine>();
        let handle = std::thread::spawn(move || write_record_loop(file, receiver));
        (
            Self { sender },
            RecordWorker {
                handle: Some(handle),
            },
        )
    }
}

impl RecordSink for JsonlRecordWriter {
    fn record(&self, line: OutputLine) -> Result<(), RecordError> {
        self.sender.send(line).map_err(|_| RecordError::Closed)
    }
}

fn ensure_parent(path: &Path) -> Result<(), RecordError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

fn write_record_loop(
    file: File,
    receiver: mpsc::Receiver<OutputLine>,
) -> Result<usize, RecordError> {
    let mut writer = BufWriter::new(file);
    let mut written = 0;
    for line in receiver {
        let json = serde_json::to_string(&line).map_err(|e| RecordError::Serde(e.to_string()))?;
        writeln!(writer, "{json}")?;
        written += 1;
    }
    writer.flush()?;
    Ok(written)
}

// =============================================================================
// Reading
// =============================================================================

/// Read result records back, skipping blank and summary lines.
pub fn read_records(path: impl AsRef<Path>) -> Result<Vec<ResultRecord>, RecordError> {
    let file = File::open(path)?;
    let mut records = Vec::new();
    for (idx, line) in BufReader::new(file).lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let value: serde_json::Value = serde_json::from_str(&line).map_err(|e| {
            RecordError::Parse {
                line: idx + 1,
                message: e.to_string(),
            }
        })?;
        if value.get("_summary").and_then(|v| v.as_bool()) == Some(true) {
            continue;
        }
        let record: ResultRecord =
            serde_json::from_value(value).map_err(|e| RecordError::Parse {
                line: idx + 1,
                message: e.to_string(),
            })?;
        records.push(record);
    }
    Ok(records)
}

/// `results/{dataset}_{backend}_{strategy}_{YYYYmmdd-HHMMSS}.jsonl`
pub fn default_output_path(dataset: &str, backend: &str, strategy: &str) -> PathBuf {
    let ts = chrono::Local::now().format("%Y%m%d-%H%M%S");
    PathBuf::from("results").join(format!("{dataset}_{backend}_{strategy}_{ts}.jsonl"))
}
