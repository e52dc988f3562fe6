//! Response normalization: one stable success/error envelope for every
//! pipeline exit, independent of which upstream produced the result.

use serde::Serialize;
use serde_json::Value;

use crate::error::ApiError;

/// The wire envelope: `{success, data?, error?}`.
#[derive(Debug, Serialize)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorBody>,
}

#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl Envelope {
    /// Wrap a successful result.
    pub fn ok(data: impl Serialize) -> Self {
        Self {
            success: true,
            data: Some(serde_json::to_value(data).unwrap_or(Value::Null)),
            error: None,
        }
    }

    /// Wrap a failure. `include_details` is false in production, where
    /// diagnostic payloads must not leak to clients.
    pub fn err(error: &ApiError, include_details: bool) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ErrorBody {
                code: error.code().to_string(),
                message: error.message.clone(),
                details: if include_details {
                    error.details.clone()
                } else {
                    None
                },
            }),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
