//! Error taxonomy shared by every pipeline stage.
//!
//! Each failure crossing a component boundary is tagged with an
//! [`ErrorKind`] so callers can tell "nothing there" (`NotFound`) apart
//! from "could not ask" (`Provider`). The gateway converts these into the
//! `{success:false, error:{code,message,details}}` envelope; raw upstream
//! errors never reach the client.

use thiserror::Error;

// ── Error kinds ──────────────────────────────────────────────────

/// Classification of a pipeline failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed or missing caller input. Never retried.
    Validation,
    /// Well-formed request, no matching resource. Not a system fault.
    NotFound,
    /// Upstream transport failure, 5xx, or timeout. Retryable.
    Provider,
    /// Required external capability unavailable (e.g. missing API key).
    Configuration,
    /// Upstream returned data that does not match the expected contract.
    Parse,
}

impl ErrorKind {
    /// Stable machine-readable code for this kind.
    ///
    /// Total over all kinds — endpoint-specific codes are layered on top
    /// via [`ApiError::with_code`], never by falling through to a generic
    /// 500-style bucket.
    pub fn code(self) -> &'static str {
        match self {
            Self::Validation => "VALIDATION_ERROR",
            Self::NotFound => "NOT_FOUND",
            Self::Provider => "PROVIDER_ERROR",
            Self::Configuration => "CONFIGURATION_ERROR",
            Self::Parse => "PARSE_ERROR",
        }
    }

    /// HTTP status equivalent.
    pub fn http_status(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::NotFound => 404,
            Self::Provider | Self::Parse => 502,
            Self::Configuration => 500,
        }
    }

    /// Whether a bounded retry is worthwhile. Only transient provider
    /// failures qualify; validation and not-found are deterministic.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::Provider)
    }
}

// ── ApiError ─────────────────────────────────────────────────────

/// A tagged pipeline failure.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    /// Diagnostic payload, only exposed outside production.
    pub details: Option<serde_json::Value>,
    code_override: Option<&'static str>,
}

impl ApiError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            details: None,
            code_override: None,
        }
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, message)
    }

    pub fn provider(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Provider, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn parse(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Parse, message)
    }

    /// Attach a diagnostic payload.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Override the wire code with an endpoint-specific one
    /// (e.g. `DIRECTIONS_ERROR`). Kind and status are unchanged.
    pub fn with_code(mut self, code: &'static str) -> Self {
        self.code_override = Some(code);
        self
    }

    /// The code string emitted in the error envelope.
    pub fn code(&self) -> &'static str {
        self.code_override.unwrap_or_else(|| self.kind.code())
    }
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            ApiError::provider(format!("upstream request timed out: {err}"))
        } else if err.is_connect() {
            ApiError::provider(format!("upstream connection failed: {err}"))
        } else if err.is_decode() {
            ApiError::parse(format!("upstream response malformed: {err}"))
        } else {
            ApiError::provider(format!("upstream request failed: {err}"))
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

// ── Tests ────────────────────────────────────────────────────────
