//! Question sources.
//!
//! Loaders read local JSONL exports of the supported benchmarks (one row per
//! line, as written by `datasets.Dataset.to_json`) and turn each row into a
//! [`Question`]. Row order is preserved.

use std::collections::BTreeMap;
use std::fmt;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::Deserialize;
use serde_json::Value;

use crate::config::ConfigError;
use crate::scoring::{last_numeric_literal, Metric};

/// One benchmark item. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub text: String,
    pub gold: String,
    pub metadata: BTreeMap<String, String>,
}

impl Question {
    pub fn new(text: impl Into<String>, gold: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            gold: gold.into(),
            metadata: BTreeMap::new(),
        }
    }

    pub fn with_meta(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn subject(&self) -> Option<&str> {
        self.metadata.get("subject").map(String::as_str)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("{}:{line}: {message}", path.display())]
    Parse {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    /// Grade-school math; numeric gold.
    Gsm8k,
    /// ARC-Challenge; letter gold.
    Arc,
    /// MMLU; letter gold, subject metadata.
    Mmlu,
    /// Generic `{question, gold, metadata?}` rows.
    Jsonl,
}

impl DatasetKind {
    pub const NAMES: &'static str = "gsm8k, arc, mmlu, jsonl";

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::Gsm8k => "gsm8k",
            DatasetKind::Arc => "arc",
            DatasetKind::Mmlu => "mmlu",
            DatasetKind::Jsonl => "jsonl",
        }
    }

    /// Metric that fits the dataset's answer space.
    pub fn default_metric(&self) -> Metric {
        match self {
            DatasetKind::Gsm8k => Metric::Accuracy,
            DatasetKind::Arc | DatasetKind::Mmlu => Metric::Mc,
            DatasetKind::Jsonl => Metric::Em,
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gsm8k" => Ok(DatasetKind::Gsm8k),
            "arc" => Ok(DatasetKind::Arc),
            "mmlu" => Ok(DatasetKind::Mmlu),
            "jsonl" => Ok(DatasetKind::Jsonl),
            _ => Err(ConfigError::unknown("dataset", s, Self::NAMES)),
        }
    }
}

// =============================================================================
// Row formats
// =============================================================================

#[derive(Deserialize)]
struct Gsm8kRow {
    question: String,
    answer: String,
}

#[derive(Deserialize)]
struct ArcRow {
    question: String,
    #[serde(default)]
    choices: Option<ArcChoices>,
    #[serde(rename = "answerKey", default)]
    answer_key: String,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ArcChoices {
    Columns {
        #[serde(default)]
        text: Vec<String>,
        #[serde(default)]
        label: Vec<String>,
    },
    Rows(Vec<ArcChoice>),
    Other(Value),
}

#[derive(Deserialize)]
struct ArcChoice {
    #[serde(default)]
    label: String,
    #[serde(default)]
    text: String,
}

#[derive(Deserialize)]
struct MmluRow {
    question: String,
    #[serde(default)]
    choices: Vec<String>,
    #[serde(default)]
    answer: Value,
    #[serde(default)]
    subject: Option<String>,
}

#[derive(Deserialize)]
struct GenericRow {
    #[serde(alias = "q")]
    question: String,
    #[serde(alias = "a", default)]
    gold: Value,
    #[serde(default)]
    subject: Option<String>,
    #[serde(default)]
    metadata: BTreeMap<String, Value>,
}

fn value_to_string(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `A..=Z` for the first 26 choices.
fn choice_letter(index: u64) -> Option<char> {
    u8::try_from(index)
        .ok()
        .filter(|i| *i < 26)
        .map(|i| char::from(b'A' + i))
}

fn choice_label(index: usize) -> String {
    choice_letter(index as u64)
        .map(String::from)
        .unwrap_or_else(|| (index + 1).to_string())
}

fn with_choices(question: &str, choices: &[String]) -> String {
    format!("{question}\nChoices: {}", choices.join(" | "))
}

fn gsm8k_question(row: Gsm8kRow) -> Question {
    let gold = last_numeric_literal(&row.answer)
        .map(str::to_string)
        .unwrap_or_else(|| row.answer.trim().to_string());
    Question::new(row.question, gold)
}

fn arc_question(row: ArcRow) -> Question {
    let choices: Vec<String> = match row.choices {
        Some(ArcChoices::Columns { text, label }) => {
            if !label.is_empty() && label.len() == text.len() {
                label
                    .iter()
                    .zip(&text)
                    .map(|(lab, txt)| format!("{lab}) {txt}"))
                    .collect()
            } else {
                text
            }
        }
        Some(ArcChoices::Rows(rows)) => rows
            .into_iter()
            .map(|c| {
                if c.label.is_empty() {
                    c.text
                } else {
                    format!("{}) {}", c.label, c.text)
                }
            })
            .collect(),
        Some(ArcChoices::Other(value)) => vec![value_to_string(&value)],
        None => Vec::new(),
    };
    Question::new(with_choices(&row.question, &choices), row.answer_key.trim())
}

/// Integer answers index the choice list; letters pass through.
fn mmlu_gold(answer: &Value, choice_count: usize) -> Result<String, String> {
    let index = match answer {
        Value::Number(n) => n.as_u64(),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    let Some(index) = index else {
        return Ok(value_to_string(answer).trim().to_uppercase());
    };
    let in_range = choice_count == 0 || usize::try_from(index).is_ok_and(|i| i < choice_count);
    match choice_letter(index) {
        Some(letter) if in_range => Ok(letter.to_string()),
        _ => Err(format!(
            "answer index {index} out of range for {choice_count} choices"
        )),
    }
}

fn mmlu_question(row: MmluRow, fallback_subject: Option<&str>) -> Result<Question, String> {
    let labelled: Vec<String> = row
        .choices
        .iter()
        .enumerate()
        .map(|(i, c)| format!("{}) {c}", choice_label(i)))
        .collect();
    let gold = mmlu_gold(&row.answer, row.choices.len())?;
    let question = Question::new(with_choices(&row.question, &labelled), gold);
    Ok(match row.subject.as_deref().or(fallback_subject) {
        Some(subject) => question.with_meta("subject", subject),
        None => question,
    })
}

fn generic_question(row: GenericRow) -> Question {
    let mut question = Question::new(row.question, value_to_string(&row.gold).trim());
    for (key, value) in &row.metadata {
        question = question.with_meta(key, value_to_string(value));
    }
    if let Some(subject) = row.subject {
        question = question.with_meta("subject", subject);
    }
    question
}

// =============================================================================
// Loading
// =============================================================================

fn parse_row(
    kind: DatasetKind,
    line: &str,
    fallback_subject: Option<&str>,
) -> Result<Question, String> {
    fn row<T: serde::de::DeserializeOwned>(line: &str) -> Result<T, String> {
        serde_json::from_str(line).map_err(|e| e.to_string())
    }
    match kind {
        DatasetKind::Gsm8k => Ok(gsm8k_question(row(line)?)),
        DatasetKind::Arc => Ok(arc_question(row(line)?)),
        DatasetKind::Mmlu => mmlu_question(row(line)?, fallback_subject),
        DatasetKind::Jsonl => Ok(generic_question(row(line)?)),
    }
}

/// Parse rows from any reader. `source` names the input in errors; its file
/// stem doubles as the MMLU subject when rows carry none.
pub fn parse_questions(
    kind: DatasetKind,
    reader: impl BufRead,
    source: &Path,
    max_samples: Option<usize>,
) -> Result<Vec<Question>, DatasetError> {
    let fallback_subject = source.file_stem().and_then(|s| s.to_str());
    let limit = max_samples.unwrap_or(usize::MAX);

    let mut questions = Vec::new();
    for (idx, line) in reader.lines().enumerate() {
        if questions.len() >= limit {
            break;
        }
        let line = line.map_err(|source_err| DatasetError::Io {
            path: source.to_path_buf(),
            source: source_err,
        })?;
        if line.trim().is_empty() {
            continue;
        }
        let question =
            parse_row(kind, &line, fallback_subject).map_err(|e| DatasetError::Parse {
                path: source.to_path_buf(),
                line: idx + 1,
                message: e,
            })?;
        questions.push(question);
    }
    Ok(questions)
}

/// Load up to `max_samples` questions from a JSONL file.
pub fn load_questions(
    kind: DatasetKind,
    path: impl AsRef<Path>,
    max_samples: Option<usize>,
) -> Result<Vec<Question>, DatasetError> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|source| DatasetError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    parse_questions(kind, BufReader::new(file), path, max_samples)
}
