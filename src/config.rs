//! Backend configuration and construction.
//!
//! Each backend variant has its own explicit config struct; unknown fields
//! are rejected at load time and ranges are validated before any backend is
//! built. Nothing here reads the process environment: callers resolve
//! secrets and pass them in.

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Deserialize;

use crate::gateway::ollama::DEFAULT_OLLAMA_BASE_URL;
use crate::gateway::openai::DEFAULT_OPENAI_BASE_URL;
use crate::gateway::tgi::DEFAULT_TGI_BASE_URL;
use crate::gateway::{
    Backend, GenerationParams, OllamaAdapter, OpenAiAdapter, ProviderError, TgiAdapter,
};

/// Configuration fault: always raised before any backend call.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("unknown {kind} '{name}'; expected one of: {expected}")]
    Unknown {
        kind: &'static str,
        name: String,
        expected: &'static str,
    },
    #[error("invalid {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },
    #[error("missing {0}")]
    Missing(&'static str),
    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },
    #[error("failed to build backend: {0}")]
    Backend(#[from] ProviderError),
}

impl ConfigError {
    pub fn unknown(kind: &'static str, name: &str, expected: &'static str) -> Self {
        Self::Unknown {
            kind,
            name: name.to_string(),
            expected,
        }
    }

    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }
}

// =============================================================================
// Backend kinds
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    /// Remote OpenAI-compatible chat completions.
    OpenAi,
    /// Local Ollama server.
    Ollama,
    /// Local Hugging Face text-generation-inference server.
    Hf,
}

impl BackendKind {
    pub const NAMES: &'static str = "openai, ollama, hf";

    pub fn all() -> [BackendKind; 3] {
        [BackendKind::OpenAi, BackendKind::Ollama, BackendKind::Hf]
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "openai",
            BackendKind::Ollama => "ollama",
            BackendKind::Hf => "hf",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            BackendKind::OpenAi => "remote OpenAI-compatible chat completions",
            BackendKind::Ollama => "local Ollama /api/chat",
            BackendKind::Hf => "local text-generation-inference /generate",
        }
    }
}

impl fmt::Display for BackendKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BackendKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "openai" => Ok(BackendKind::OpenAi),
            "ollama" => Ok(BackendKind::Ollama),
            "hf" => Ok(BackendKind::Hf),
            _ => Err(ConfigError::unknown("backend", s, Self::NAMES)),
        }
    }
}

// =============================================================================
// Per-variant config
// =============================================================================

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    512
}

fn default_max_new_tokens() -> u32 {
    256
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_openai_base_url() -> String {
    DEFAULT_OPENAI_BASE_URL.to_string()
}

fn default_ollama_base_url() -> String {
    DEFAULT_OLLAMA_BASE_URL.to_string()
}

fn default_tgi_base_url() -> String {
    DEFAULT_TGI_BASE_URL.to_string()
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OpenAiConfig {
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_openai_base_url")]
    pub base_url: String,
    /// Bearer token. Left empty in files checked into a repo; the CLI fills
    /// it from `OPENAI_API_KEY`.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OllamaConfig {
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_ollama_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HfConfig {
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    #[serde(default = "default_tgi_base_url")]
    pub base_url: String,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

/// Loaded configuration for one backend variant.
#[derive(Debug, Clone, PartialEq)]
pub enum BackendConfig {
    OpenAi(OpenAiConfig),
    Ollama(OllamaConfig),
    Hf(HfConfig),
}

fn validate_params(
    model: &str,
    temperature: f32,
    max_tokens: u32,
    timeout_secs: u64,
) -> Result<(), ConfigError> {
    if model.trim().is_empty() {
        return Err(ConfigError::invalid("model", "must be non-empty"));
    }
    if !(0.0..=2.0).contains(&temperature) {
        return Err(ConfigError::invalid(
            "temperature",
            format!("{temperature} is outside [0, 2]"),
        ));
    }
    if max_tokens == 0 {
        return Err(ConfigError::invalid("max_tokens", "must be > 0"));
    }
    if timeout_secs == 0 {
        return Err(ConfigError::invalid("timeout_secs", "must be > 0"));
    }
    Ok(())
}

impl BackendConfig {
    pub fn kind(&self) -> BackendKind {
        match self {
            BackendConfig::OpenAi(_) => BackendKind::OpenAi,
            BackendConfig::Ollama(_) => BackendKind::Ollama,
            BackendConfig::Hf(_) => BackendKind::Hf,
        }
    }

    /// Parse config text for `kind`. `format` is `toml`, `yaml` or `json`.
    pub fn parse(kind: BackendKind, raw: &str, format: ConfigFormat) -> Result<Self, String> {
        let config = match kind {
            BackendKind::OpenAi => BackendConfig::OpenAi(format.deserialize(raw)?),
            BackendKind::Ollama => BackendConfig::Ollama(format.deserialize(raw)?),
            BackendKind::Hf => BackendConfig::Hf(format.deserialize(raw)?),
        };
        Ok(config)
    }

    /// Load from a file; the format follows the extension.
    pub fn load(kind: BackendKind, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::parse(kind, &raw, ConfigFormat::from_path(path)).map_err(|message| {
            ConfigError::Parse {
                path: path.to_path_buf(),
                message,
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        match self {
            BackendConfig::OpenAi(c) => {
                validate_params(&c.model, c.temperature, c.max_tokens, c.timeout_secs)
            }
            BackendConfig::Ollama(c) => {
                validate_params(&c.model, c.temperature, c.max_tokens, c.timeout_secs)
            }
            BackendConfig::Hf(c) => {
                validate_params(&c.model, c.temperature, c.max_tokens, c.timeout_secs)?;
                if c.max_new_tokens == 0 {
                    return Err(ConfigError::invalid("max_new_tokens", "must be > 0"));
                }
                Ok(())
            }
        }
    }

    /// Fill a missing API key (OpenAI only; other variants ignore it).
    pub fn with_api_key_fallback(mut self, api_key: Option<String>) -> Self {
        if let BackendConfig::OpenAi(c) = &mut self {
            if c.api_key.as_deref().map_or(true, str::is_empty) {
                c.api_key = api_key;
            }
        }
        self
    }

    pub fn params(&self) -> GenerationParams {
        match self {
            BackendConfig::OpenAi(c) => GenerationParams::new(&c.model)
                .temperature(c.temperature)
                .max_tokens(c.max_tokens),
            BackendConfig::Ollama(c) => GenerationParams::new(&c.model)
                .temperature(c.temperature)
                .max_tokens(c.max_tokens),
            BackendConfig::Hf(c) => GenerationParams::new(&c.model)
                .temperature(c.temperature)
                .max_tokens(c.max_tokens),
        }
    }
}

/// Validate `config` and construct its backend.
pub fn build_backend(config: &BackendConfig) -> Result<Arc<dyn Backend>, ConfigError> {
    config.validate()?;
    let params = config.params();
    let backend: Arc<dyn Backend> = match config {
        BackendConfig::OpenAi(c) => {
            let api_key = c
                .api_key
                .as_deref()
                .filter(|k| !k.is_empty())
                .ok_or(ConfigError::Missing("openai api_key"))?;
            Arc::new(OpenAiAdapter::with_config(
                api_key,
                &c.base_url,
                Duration::from_secs(c.timeout_secs),
                params,
            )?)
        }
        BackendConfig::Ollama(c) => Arc::new(OllamaAdapter::with_config(
            &c.base_url,
            Duration::from_secs(c.timeout_secs),
            params,
        )?),
        BackendConfig::Hf(c) => Arc::new(TgiAdapter::with_config(
            &c.base_url,
            Duration::from_secs(c.timeout_secs),
            params,
            c.max_new_tokens,
        )?),
    };
    Ok(backend)
}

// =============================================================================
// File formats
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    pub fn from_path(path: &Path) -> Self {
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .as_deref()
        {
            Some("toml") => ConfigFormat::Toml,
            Some("yaml") | Some("yml") => ConfigFormat::Yaml,
            _ => ConfigFormat::Json,
        }
    }

    fn deserialize<T: for<'de> Deserialize<'de>>(&self, raw: &str) -> Result<T, String> {
        match self {
            ConfigFormat::Toml => toml::from_str(raw).map_err(|e| e.to_string()),
            ConfigFormat::Yaml => serde_yaml::from_str(raw).map_err(|e| e.to_string()),
            ConfigFormat::Json => serde_json::from_str(raw).map_err(|e| e.to_string()),
        }
    }
}
