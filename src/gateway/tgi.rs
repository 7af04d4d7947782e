//! Hugging Face text-generation-inference adapter (local inference backend).
//!
//! TGI has no chat roles on `/generate`, so the system instruction is
//! prepended to the prompt on its own line.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::{ErrorContext, ProviderError};
use super::types::*;
use super::{read_capped_body, Backend, MAX_INPUT_CHARS};

pub const DEFAULT_TGI_BASE_URL: &str = "http://127.0.0.1:8080";

/// TGI rejects a zero temperature even when sampling is off.
const MIN_TGI_TEMPERATURE: f32 = 0.1;

#[derive(Debug, Clone)]
pub struct TgiAdapter {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    params: GenerationParams,
    max_new_tokens: u32,
}

impl TgiAdapter {
    pub fn with_config(
        base_url: impl Into<String>,
        timeout: Duration,
        params: GenerationParams,
        max_new_tokens: u32,
    ) -> Result<Self, ProviderError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProviderError::config(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            timeout,
            params,
            max_new_tokens,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/generate", self.base_url)
    }

    /// Raw `/generate` call on an already-assembled input.
    pub async fn generate(&self, inputs: &str) -> Result<ChatResponse, ProviderError> {
        if inputs.len() > MAX_INPUT_CHARS {
            return Err(ProviderError::invalid_request(format!(
                "Input too large: {} chars (max {MAX_INPUT_CHARS})",
                inputs.len()
            )));
        }

        let start = Instant::now();
        let api_req = GenerateRequest {
            inputs,
            parameters: GenerateParameters {
                max_new_tokens: self.max_new_tokens,
                do_sample: self.params.temperature > 0.0,
                temperature: self.params.temperature.max(MIN_TGI_TEMPERATURE),
            },
        };

        let response = self
            .client
            .post(self.generate_url())
            .json(&api_req)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, self.timeout))?;

        let status = response.status();
        let body = read_capped_body(response, "tgi", self.timeout).await?;

        if !status.is_success() {
            let parsed = serde_json::from_str::<GenerateResponse>(&body).ok();
            let ctx = ErrorContext::for_status(status.as_u16());
            let ctx = match parsed.as_ref().and_then(|p| p.error_type.clone()) {
                Some(kind) => ctx.with_code(kind),
                None => ctx,
            };
            let message = parsed
                .and_then(|p| p.error)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));

            return Err(match status.as_u16() {
                429 => ProviderError::rate_limited(Duration::from_secs(60), ctx),
                code => ProviderError::provider_with_context("tgi", message, code >= 500, ctx),
            });
        }

        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::provider("tgi", format!("Invalid JSON: {e}"), false))?;

        let text = parsed
            .generated_text
            .ok_or_else(|| ProviderError::provider("tgi", "No generated_text in response", false))?;

        Ok(ChatResponse {
            content: strip_echo(&text, inputs),
            input_tokens: 0,
            output_tokens: 0,
            latency: start.elapsed(),
            finish_reason: FinishReason::Unknown("tgi".to_string()),
        })
    }
}

/// Assemble the single-string input TGI expects.
pub fn join_system(prompt: &str, system: Option<&str>) -> String {
    match system.filter(|s| !s.is_empty()) {
        Some(system) => format!("{system}\n{prompt}"),
        None => prompt.to_string(),
    }
}

/// Servers started with `return_full_text` echo the input; drop it.
fn strip_echo(text: &str, inputs: &str) -> String {
    text.strip_prefix(inputs).unwrap_or(text).trim().to_string()
}

#[async_trait]
impl Backend for TgiAdapter {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, ProviderError> {
        let inputs = join_system(prompt, system);
        Ok(self.generate(&inputs).await?.content)
    }

    fn provider(&self) -> &'static str {
        "hf"
    }

    fn model(&self) -> &str {
        &self.params.model
    }
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    inputs: &'a str,
    parameters: GenerateParameters,
}

#[derive(Serialize)]
struct GenerateParameters {
    max_new_tokens: u32,
    do_sample: bool,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    generated_text: Option<String>,
    error: Option<String>,
    error_type: Option<String>,
}
