//! Ollama chat adapter (local inference backend).

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::{ErrorContext, ProviderError};
use super::openai::ApiMessage;
use super::types::*;
use super::{read_capped_body, Backend, MAX_INPUT_CHARS};

pub const DEFAULT_OLLAMA_BASE_URL: &str = "http://127.0.0.1:11434";

/// Local Ollama server speaking `/api/chat` without streaming.
#[derive(Debug, Clone)]
pub struct OllamaAdapter {
    client: reqwest::Client,
    base_url: String,
    timeout: Duration,
    params: GenerationParams,
}

impl OllamaAdapter {
    pub fn new(params: GenerationParams) -> Result<Self, ProviderError> {
        Self::with_config(DEFAULT_OLLAMA_BASE_URL, Duration::from_secs(300), params)
    }

    pub fn with_config(
        base_url: impl Into<String>,
        timeout: Duration,
        params: GenerationParams,
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
        })
    }

    fn chat_url(&self) -> String {
        format!("{}/api/chat", self.base_url)
    }

    pub async fn chat(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let total_chars = req.input_chars();
        if total_chars > MAX_INPUT_CHARS {
            return Err(ProviderError::invalid_request(format!(
                "Input too large: {total_chars} chars (max {MAX_INPUT_CHARS})"
            )));
        }

        let start = Instant::now();
        let messages: Vec<ApiMessage> = req.messages.iter().map(ApiMessage::from).collect();
        let api_req = OllamaChatRequest {
            model: &req.model,
            messages: &messages,
            stream: false,
            options: OllamaOptions {
                temperature: req.temperature,
                num_predict: req.max_tokens,
            },
        };

        let response = self
            .client
            .post(self.chat_url())
            .json(&api_req)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(e, self.timeout))?;

        let status = response.status();
        let body = read_capped_body(response, "ollama", self.timeout).await?;

        if !status.is_success() {
            let ctx = ErrorContext::for_status(status.as_u16());
            let message = serde_json::from_str::<OllamaChatResponse>(&body)
                .ok()
                .and_then(|p| p.error)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(ProviderError::provider_with_context(
                "ollama",
                message,
                status.as_u16() >= 500,
                ctx,
            ));
        }

        let parsed: OllamaChatResponse = serde_json::from_str(&body)
            .map_err(|e| ProviderError::provider("ollama", format!("Invalid JSON: {e}"), false))?;

        if let Some(error) = parsed.error {
            return Err(ProviderError::provider("ollama", error, false));
        }

        let message = parsed
            .message
            .ok_or_else(|| ProviderError::provider("ollama", "No message in response", false))?;

        Ok(ChatResponse {
            content: message.content.unwrap_or_default(),
            input_tokens: parsed.prompt_eval_count.unwrap_or(0),
            output_tokens: parsed.eval_count.unwrap_or(0),
            latency: start.elapsed(),
            finish_reason: FinishReason::from(parsed.done_reason),
        })
    }
}

#[async_trait]
impl Backend for OllamaAdapter {
    async fn complete(&self, prompt: &str, system: Option<&str>) -> Result<String, ProviderError> {
        let req = ChatRequest::from_params(&self.params, Message::prompt_pair(prompt, system));
        Ok(self.chat(&req).await?.content)
    }

    fn provider(&self) -> &'static str {
        "ollama"
    }

    fn model(&self) -> &str {
        &self.params.model
    }
}

#[derive(Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: &'a [ApiMessage],
    stream: bool,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    #[serde(skip_serializing_if = "Option::is_none")]
    num_predict: Option<u32>,
}

#[derive(Deserialize)]
struct OllamaChatResponse {
    message: Option<OllamaMessage>,
    done_reason: Option<String>,
    prompt_eval_count: Option<u32>,
    eval_count: Option<u32>,
    error: Option<String>,
}

#[derive(Deserialize)]
struct OllamaMessage {
    content: Option<String>,
}
