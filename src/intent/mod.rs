//! Voice intent classification.
//!
//! Maps a raw utterance to a structured [`VoiceIntent`] via the
//! JSON-constrained text-generation capability. Unparseable or
//! out-of-contract model output fails closed: a `help` intent with zero
//! confidence, never an error — "I didn't understand" is a normal
//! outcome, not a system fault. Transport failures, by contrast, do
//! propagate as provider errors: "couldn't ask" is not "didn't
//! understand".

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::providers::{strip_code_fence, TextGenerator};

// ── Intent model ─────────────────────────────────────────────────

/// The fixed, small intent vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    Navigate,
    Location,
    Nearby,
    Help,
    StopNavigation,
}

impl IntentKind {
    fn from_wire(value: &str) -> Option<Self> {
        match value {
            "navigate" => Some(Self::Navigate),
            "location" => Some(Self::Location),
            "nearby" => Some(Self::Nearby),
            "help" => Some(Self::Help),
            "stop_navigation" => Some(Self::StopNavigation),
            _ => None,
        }
    }
}

/// A classified utterance. Immutable; consumed once by the dispatcher.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceIntent {
    #[serde(rename = "intent")]
    pub kind: IntentKind,
    pub destination: Option<String>,
    pub category: Option<String>,
    pub confidence: f64,
    /// Raw model text, surfaced only when classification fell back.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub raw_response: Option<String>,
}

impl VoiceIntent {
    /// The fail-closed fallback: `help` at zero confidence, raw model
    /// text preserved for diagnostics.
    pub fn fallback(raw: impl Into<String>) -> Self {
        Self {
            kind: IntentKind::Help,
            destination: None,
            category: None,
            confidence: 0.0,
            raw_response: Some(raw.into()),
        }
    }
}

// ── Wire shape from the model ────────────────────────────────────

#[derive(Debug, Deserialize)]
struct RawIntent {
    intent: Option<String>,
    destination: Option<String>,
    category: Option<String>,
    confidence: Option<f64>,
}

// ── Prompt ───────────────────────────────────────────────────────

fn build_prompt(utterance: &str) -> String {
    format!(
        r#"You are a navigation assistant for visually impaired users. Analyze this voice command and extract structured information.

Voice Command: "{utterance}"

Extract and return JSON with these fields:
{{
  "intent": "navigate" | "location" | "nearby" | "help" | "stop_navigation",
  "destination": "destination name or null",
  "category": "place category if asking for nearby (e.g., pharmacy, restaurant) or null",
  "confidence": 0.0 to 1.0
}}

Examples:
- "Navigate to the pharmacy" -> {{"intent": "navigate", "destination": "pharmacy", "category": null, "confidence": 0.95}}
- "Where am I?" -> {{"intent": "location", "destination": null, "category": null, "confidence": 1.0}}
- "Find nearby restaurants" -> {{"intent": "nearby", "destination": null, "category": "restaurant", "confidence": 0.9}}
- "Stop navigation" -> {{"intent": "stop_navigation", "destination": null, "category": null, "confidence": 1.0}}"#
    )
}

// ── Classifier ───────────────────────────────────────────────────

/// Classifies free-form utterances into [`VoiceIntent`]s.
pub struct IntentClassifier {
    text: Arc<dyn TextGenerator>,
}

impl IntentClassifier {
    pub fn new(text: Arc<dyn TextGenerator>) -> Self {
        Self { text }
    }

    /// Classify one utterance.
    ///
    /// Errors only on empty input (validation) or a failed upstream call
    /// (provider). Contract violations in the model's output return the
    /// fallback intent instead.
    pub async fn classify(&self, utterance: &str) -> ApiResult<VoiceIntent> {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return Err(ApiError::validation("utterance must be a non-empty string"));
        }

        let raw = self.text.generate_json(&build_prompt(utterance)).await?;
        Ok(Self::validate(&raw))
    }

    /// Validate model output against the intent contract, failing closed.
    fn validate(raw: &str) -> VoiceIntent {
        let body = strip_code_fence(raw);
        let parsed: RawIntent = match serde_json::from_str(body) {
            Ok(parsed) => parsed,
            Err(err) => {
                tracing::warn!("intent output not parseable JSON ({err}), failing closed");
                return VoiceIntent::fallback(raw);
            }
        };

        let (Some(intent), Some(confidence)) = (parsed.intent, parsed.confidence) else {
            tracing::warn!("intent output missing required fields, failing closed");
            return VoiceIntent::fallback(raw);
        };
        let Some(kind) = IntentKind::from_wire(&intent) else {
            tracing::warn!(intent, "unknown intent kind, failing closed");
            return VoiceIntent::fallback(raw);
        };

        let non_empty = |v: Option<String>| v.filter(|s| !s.trim().is_empty());

        VoiceIntent {
            kind,
            // Field invariants: destination only travels with navigate,
            // category only with nearby.
            destination: if kind == IntentKind::Navigate {
                non_empty(parsed.destination)
            } else {
                None
            },
            category: if kind == IntentKind::Nearby {
                non_empty(parsed.category)
            } else {
                None
            },
            confidence: confidence.clamp(0.0, 1.0),
            raw_response: None,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
