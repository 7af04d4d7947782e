//! Usage tracking via the UsageSink trait.
//!
//! Every metered backend call is reported through a UsageSink, which keeps
//! the gateway independent of where call accounting ends up:
//! - the CLI logs records through `TracingUsageSink`
//! - tests count calls with `CountingUsageSink`
//! - embedders that do not care use `NoopUsageSink`

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Status of a backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallStatus {
    Success,
    Error,
}

impl CallStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallStatus::Success => "success",
            CallStatus::Error => "error",
        }
    }
}

/// Record of one `complete` call.
#[derive(Debug, Clone)]
pub struct CallRecord {
    /// Backend name: "openai", "ollama", "hf", ...
    pub provider: &'static str,
    /// Model used.
    pub model: String,
    /// Which code path made this call, e.g. "strategy::direct".
    pub caller: &'static str,
    /// Prompt length in characters (system included).
    pub prompt_chars: usize,
    /// Response length in characters (0 on error).
    pub response_chars: usize,
    /// Latency in milliseconds.
    pub latency_ms: u64,
    /// Call status.
    pub status: CallStatus,
    /// Error code if status is Error.
    pub error_code: Option<String>,
    /// When the call finished.
    pub timestamp: DateTime<Utc>,
}

impl CallRecord {
    pub fn new(provider: &'static str, model: impl Into<String>, caller: &'static str) -> Self {
        Self {
            provider,
            model: model.into(),
            caller,
            prompt_chars: 0,
            response_chars: 0,
            latency_ms: 0,
            status: CallStatus::Success,
            error_code: None,
            timestamp: Utc::now(),
        }
    }

    pub fn chars(mut self, prompt: usize, response: usize) -> Self {
        self.prompt_chars = prompt;
        self.response_chars = response;
        self
    }

    pub fn latency(mut self, ms: u64) -> Self {
        self.latency_ms = ms;
        self
    }

    pub fn error(mut self, code: impl Into<String>) -> Self {
        self.status = CallStatus::Error;
        self.error_code = Some(code.into());
        self
    }
}

/// Trait for recording backend call usage.
///
/// Recording is fire-and-forget: sinks log their own failures instead of
/// propagating them into the strategy.
#[async_trait]
pub trait UsageSink: Send + Sync {
    async fn record(&self, record: CallRecord);
}

/// No-op usage sink that discards all records.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopUsageSink;

#[async_trait]
impl UsageSink for NoopUsageSink {
    async fn record(&self, _record: CallRecord) {}
}

/// Usage sink that emits one `debug` event per call.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingUsageSink;

#[async_trait]
impl UsageSink for TracingUsageSink {
    async fn record(&self, record: CallRecord) {
        tracing::debug!(
            provider = record.provider,
            model = %record.model,
            caller = record.caller,
            prompt_chars = record.prompt_chars,
            response_chars = record.response_chars,
            latency_ms = record.latency_ms,
            status = record.status.as_str(),
            error_code = record.error_code.as_deref().unwrap_or(""),
            "backend call"
        );
    }
}

/// Usage sink that counts calls and failures.
#[derive(Debug, Default)]
pub struct CountingUsageSink {
    calls: AtomicUsize,
    errors: AtomicUsize,
}

impl CountingUsageSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn errors(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UsageSink for CountingUsageSink {
    async fn record(&self, record: CallRecord) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if record.status == CallStatus::Error {
            self.errors.fetch_add(1, Ordering::SeqCst);
        }
    }
}
