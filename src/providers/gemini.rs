//! Gemini `generateContent` client.
//!
//! One client serves both generation capabilities: JSON-constrained text
//! (intent classification) and vision (obstacle analysis, image sent as
//! base64 inline data). Responses are constrained to
//! `application/json` so downstream parsing is schema-driven, not
//! parse-and-hope.

use async_trait::async_trait;
use base64::Engine;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use super::{with_retry, TextGenerator, VisionGenerator};
use crate::config::GeminiConfig;
use crate::error::{ApiError, ApiResult};

/// Sampling temperature for intent classification. Low: we want the
/// documented JSON shape, not creativity.
const TEXT_TEMPERATURE: f64 = 0.3;

/// Sampling temperature for obstacle analysis.
const VISION_TEMPERATURE: f64 = 0.4;

const MAX_OUTPUT_TOKENS: u32 = 2048;

// ── Wire shapes ──────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(rename = "inlineData", skip_serializing_if = "Option::is_none")]
    inline_data: Option<InlineData>,
}

#[derive(Debug, Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(Debug, Serialize)]
struct GenerationConfig {
    temperature: f64,
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Debug, Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: String,
}

// ── Client ───────────────────────────────────────────────────────

/// Gemini REST client for both text and vision generation.
pub struct GeminiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    text_model: String,
    vision_model: String,
    max_retries: u32,
}

impl GeminiClient {
    pub fn new(config: &GeminiConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(config.timeout_secs))
                .connect_timeout(Duration::from_secs(5))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone().unwrap_or_default(),
            text_model: config.text_model.clone(),
            vision_model: config.vision_model.clone(),
            max_retries: config.max_retries,
        }
    }

    async fn generate(
        &self,
        model: &str,
        parts: Vec<Part>,
        temperature: f64,
    ) -> ApiResult<String> {
        let url = format!("{}/v1beta/models/{}:generateContent", self.base_url, model);
        let body = GenerateRequest {
            contents: vec![Content { parts }],
            generation_config: GenerationConfig {
                temperature,
                response_mime_type: "application/json",
                max_output_tokens: MAX_OUTPUT_TOKENS,
            },
        };

        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED
            || status == reqwest::StatusCode::FORBIDDEN
        {
            return Err(ApiError::configuration(format!(
                "generation backend rejected credentials ({status})"
            )));
        }
        if !status.is_success() {
            return Err(ApiError::provider(format!(
                "generation backend returned {status}"
            )));
        }

        let parsed: GenerateResponse = response.json().await?;
        let text: String = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|c| {
                c.parts
                    .into_iter()
                    .map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .unwrap_or_default();

        if text.trim().is_empty() {
            return Err(ApiError::parse("generation backend returned no candidates"));
        }
        Ok(text)
    }
}

#[async_trait]
impl TextGenerator for GeminiClient {
    async fn generate_json(&self, prompt: &str) -> ApiResult<String> {
        with_retry(self.max_retries, || {
            self.generate(
                &self.text_model,
                vec![Part {
                    text: Some(prompt.to_string()),
                    inline_data: None,
                }],
                TEXT_TEMPERATURE,
            )
        })
        .await
    }
}

#[async_trait]
impl VisionGenerator for GeminiClient {
    async fn analyze_image(
        &self,
        prompt: &str,
        image: &[u8],
        mime_type: &str,
    ) -> ApiResult<String> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(image);
        with_retry(self.max_retries, || {
            self.generate(
                &self.vision_model,
                vec![
                    Part {
                        text: Some(prompt.to_string()),
                        inline_data: None,
                    },
                    Part {
                        text: None,
                        inline_data: Some(InlineData {
                            mime_type: mime_type.to_string(),
                            data: encoded.clone(),
                        }),
                    },
                ],
                VISION_TEMPERATURE,
            )
        })
        .await
    }
}
