//! Backend fault taxonomy.
//!
//! Every adapter maps its transport and status failures onto
//! [`ProviderError`]; the strategy engine passes them through untouched and the
//! runner records `code()` for each failed question.

use std::time::Duration;
use thiserror::Error;

/// What the backend told us about a failed call, when it told us anything.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ErrorContext {
    pub http_status: Option<u16>,
    /// Error kind from the response body (`rate_limit_exceeded`, `overloaded`).
    pub provider_code: Option<String>,
    /// `x-request-id` response header.
    pub request_id: Option<String>,
}

impl ErrorContext {
    pub fn for_status(status: u16) -> Self {
        Self {
            http_status: Some(status),
            ..Self::default()
        }
    }

    pub fn with_code(self, code: impl Into<String>) -> Self {
        Self {
            provider_code: Some(code.into()),
            ..self
        }
    }

    pub fn with_request_id(self, id: impl Into<String>) -> Self {
        Self {
            request_id: Some(id.into()),
            ..self
        }
    }
}

/// A failed `complete` call.
///
/// Nothing in this crate retries; `is_retryable` is reported so that callers
/// wrapping a backend can decide for themselves.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// HTTP 429, or a local server reporting it is overloaded.
    #[error("rate limited, retry after {retry_after:?}")]
    RateLimited {
        retry_after: Duration,
        context: Option<ErrorContext>,
    },

    /// Rejected before or by the backend; sending it again will not help.
    #[error("invalid request: {message}")]
    InvalidRequest {
        message: String,
        context: Option<ErrorContext>,
    },

    /// Non-success status or unusable body from a named backend.
    #[error("{provider} error: {message}")]
    Provider {
        provider: &'static str,
        message: String,
        retryable: bool,
        context: Option<ErrorContext>,
    },

    /// The configured client timeout elapsed.
    #[error("timeout after {0:?}")]
    Timeout(Duration, Option<ErrorContext>),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Client could not be built from the backend settings.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ProviderError {
    pub fn rate_limited(retry_after: Duration, context: ErrorContext) -> Self {
        Self::RateLimited {
            retry_after,
            context: Some(context),
        }
    }

    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
            context: None,
        }
    }

    pub fn provider(provider: &'static str, message: impl Into<String>, retryable: bool) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            retryable,
            context: None,
        }
    }

    /// Like [`ProviderError::provider`], keeping the status and body details.
    pub fn provider_with_context(
        provider: &'static str,
        message: impl Into<String>,
        retryable: bool,
        context: ErrorContext,
    ) -> Self {
        Self::Provider {
            provider,
            message: message.into(),
            retryable,
            context: Some(context),
        }
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    /// Map a reqwest send/read failure, surfacing client timeouts as `Timeout`.
    pub fn from_transport(err: reqwest::Error, timeout: Duration) -> Self {
        if err.is_timeout() {
            Self::Timeout(timeout, None)
        } else {
            Self::Http(err)
        }
    }

    pub fn is_retryable(&self) -> bool {
        match self {
            Self::RateLimited { .. } | Self::Timeout(..) => true,
            Self::Provider { retryable, .. } => *retryable,
            Self::Http(e) => e.is_timeout() || e.is_connect(),
            Self::InvalidRequest { .. } | Self::Config(_) => false,
        }
    }

    /// Stable label written to failure logs and `QuestionFailure::code`.
    pub fn code(&self) -> &'static str {
        match self {
            Self::RateLimited { .. } => "rate_limited",
            Self::InvalidRequest { .. } => "invalid_request",
            Self::Provider { .. } => "provider_error",
            Self::Timeout(..) => "timeout",
            Self::Http(_) => "http_error",
            Self::Config(_) => "config_error",
        }
    }

    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Self::RateLimited { context, .. }
            | Self::InvalidRequest { context, .. }
            | Self::Provider { context, .. }
            | Self::Timeout(_, context) => context.as_ref(),
            Self::Http(_) | Self::Config(_) => None,
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        self.context().and_then(|c| c.request_id.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn context_builders_fill_fields() {
        let ctx = ErrorContext::for_status(503)
            .with_code("overloaded")
            .with_request_id("r-1");
        assert_eq!(ctx.http_status, Some(503));
        assert_eq!(ctx.provider_code.as_deref(), Some("overloaded"));

        let err = ProviderError::provider_with_context("tgi", "busy", true, ctx);
        assert_eq!(err.request_id(), Some("r-1"));
        assert!(err.is_retryable());
        assert_eq!(err.code(), "provider_error");
    }

    #[test]
    fn permanent_faults_are_not_retryable() {
        assert!(!ProviderError::invalid_request("too long").is_retryable());
        assert!(!ProviderError::config("bad header").is_retryable());
        assert!(ProviderError::invalid_request("x").context().is_none());
    }
}
