//! Backend gateway: the `complete(prompt, system)` capability and its adapters.
//!
//! Strategy code depends only on [`Backend`]. Concrete variants live in
//! their own modules (remote OpenAI-compatible API, local Ollama, local
//! text-generation-inference) and are constructed from explicit config in
//! [`crate::config`].

pub mod error;
pub mod ollama;
pub mod openai;
pub mod tgi;
pub mod types;
pub mod usage;

use std::sync::Arc;
use std::time::{Duration, Instant};

use usage::CallRecord;

pub use error::{ErrorContext, ProviderError};
pub use ollama::OllamaAdapter;
pub use openai::OpenAiAdapter;
pub use tgi::TgiAdapter;
pub use types::*;
pub use usage::{CallStatus, CountingUsageSink, NoopUsageSink, TracingUsageSink, UsageSink};

/// Maximum allowed response body length (1MB).
pub(crate) const MAX_RESPONSE_LEN: usize = 1_024 * 1_024;

/// Maximum allowed input characters (~125k tokens).
pub(crate) const MAX_INPUT_CHARS: usize = 500_000;

/// A text generation capability.
///
/// Each call is independent; implementations hold no conversational state
/// between calls. Failures are returned, never retried here.
#[async_trait::async_trait]
pub trait Backend: Send + Sync {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, ProviderError>;

    /// Short backend name for logs and usage records.
    fn provider(&self) -> &'static str {
        "custom"
    }

    /// Model identifier for logs and usage records.
    fn model(&self) -> &str {
        ""
    }
}

/// Wraps a backend and reports every call to a usage sink.
pub struct MeteredBackend<U: UsageSink> {
    inner: Arc<dyn Backend>,
    usage_sink: Arc<U>,
    caller: &'static str,
}

impl<U: UsageSink> MeteredBackend<U> {
    pub fn new(inner: Arc<dyn Backend>, usage_sink: Arc<U>, caller: &'static str) -> Self {
        Self {
            inner,
            usage_sink,
            caller,
        }
    }

    pub fn usage_sink(&self) -> &Arc<U> {
        &self.usage_sink
    }
}

#[async_trait::async_trait]
impl<U: UsageSink> Backend for MeteredBackend<U> {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, ProviderError> {
        let start = Instant::now();
        let result = self.inner.complete(prompt, system).await;
        let prompt_chars = prompt.len() + system.map_or(0, str::len);

        let record = CallRecord::new(self.inner.provider(), self.inner.model(), self.caller)
            .latency(start.elapsed().as_millis() as u64);
        let record = match &result {
            Ok(text) => record.chars(prompt_chars, text.len()),
            Err(err) => record.chars(prompt_chars, 0).error(err.code()),
        };
        self.usage_sink.record(record).await;

        result
    }

    fn provider(&self) -> &'static str {
        self.inner.provider()
    }

    fn model(&self) -> &str {
        self.inner.model()
    }
}

/// Extract request ID from response headers.
pub(crate) fn request_id_from(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string())
}

/// Stream a response body, enforcing the size limit.
pub(crate) async fn read_capped_body(
    mut response: reqwest::Response,
    provider: &'static str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    let mut bytes = Vec::new();
    while let Some(chunk) = response
        .chunk()
        .await
        .map_err(|e| ProviderError::from_transport(e, timeout))?
    {
        let new_len = bytes.len() + chunk.len();
        if new_len > MAX_RESPONSE_LEN {
            return Err(ProviderError::provider(
                provider,
                format!("Response too large: {new_len} bytes"),
                false,
            ));
        }
        bytes.extend_from_slice(&chunk);
    }
    Ok(String::from_utf8_lossy(&bytes).to_string())
}
