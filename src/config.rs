//! Configuration: TOML file plus environment overrides.
//!
//! Secrets (`GOOGLE_GEMINI_API_KEY`, `GOOGLE_MAPS_API_KEY`) are taken from
//! the environment when present, so config files never need to carry them.
//! Missing keys are caught at boot, before the gateway binds.

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{ApiError, ApiResult};

/// Top-level configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// `development` or `production`. Error-envelope `details` are only
    /// emitted outside production.
    pub environment: String,
    pub server: ServerConfig,
    pub gemini: GeminiConfig,
    pub maps: MapsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub allowed_origins: Vec<String>,
    /// Request body cap in bytes. Sized for camera frames.
    pub body_limit_bytes: usize,
    pub request_timeout_secs: u64,
    /// Sliding-window rate limit: requests per window per client IP.
    pub rate_limit_per_window: u32,
    pub rate_limit_window_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub text_model: String,
    pub vision_model: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MapsConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            environment: "development".into(),
            server: ServerConfig::default(),
            gemini: GeminiConfig::default(),
            maps: MapsConfig::default(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 5000,
            allowed_origins: vec![
                "http://localhost:3000".into(),
                "http://localhost:5173".into(),
            ],
            body_limit_bytes: 5 * 1024 * 1024,
            request_timeout_secs: 30,
            rate_limit_per_window: 100,
            rate_limit_window_secs: 15 * 60,
        }
    }
}

impl Default for GeminiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".into(),
            text_model: "gemini-2.0-flash-latest".into(),
            vision_model: "gemini-2.0-flash-exp".into(),
            timeout_secs: 20,
            max_retries: 2,
        }
    }
}

impl Default for MapsConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: "https://maps.googleapis.com/maps/api".into(),
            timeout_secs: 10,
            max_retries: 2,
        }
    }
}

impl Config {
    /// Load from a TOML file (if it exists), then apply env overrides.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let mut config = match path {
            Some(p) if p.exists() => {
                let raw = std::fs::read_to_string(p)?;
                toml::from_str(&raw)?
            }
            Some(p) => {
                anyhow::bail!("config file not found: {}", p.display());
            }
            None => Self::default(),
        };
        config.apply_env();
        Ok(config)
    }

    /// Environment variables take precedence over the file.
    fn apply_env(&mut self) {
        if let Ok(key) = std::env::var("GOOGLE_GEMINI_API_KEY") {
            if !key.trim().is_empty() {
                self.gemini.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(key) = std::env::var("GOOGLE_MAPS_API_KEY") {
            if !key.trim().is_empty() {
                self.maps.api_key = Some(key.trim().to_string());
            }
        }
        if let Ok(env) = std::env::var("WAYFINDER_ENV") {
            if !env.trim().is_empty() {
                self.environment = env.trim().to_string();
            }
        }
        if let Ok(port) = std::env::var("PORT") {
            if let Ok(port) = port.trim().parse() {
                self.server.port = port;
            }
        }
        if let Ok(origins) = std::env::var("ALLOWED_ORIGINS") {
            let origins: Vec<String> = origins
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(String::from)
                .collect();
            if !origins.is_empty() {
                self.server.allowed_origins = origins;
            }
        }
    }

    /// Fail fast when a required capability credential is missing.
    pub fn validate_keys(&self) -> ApiResult<()> {
        let mut missing = Vec::new();
        if self.gemini.api_key.as_deref().map_or(true, str::is_empty) {
            missing.push("GOOGLE_GEMINI_API_KEY");
        }
        if self.maps.api_key.as_deref().map_or(true, str::is_empty) {
            missing.push("GOOGLE_MAPS_API_KEY");
        }
        if missing.is_empty() {
            Ok(())
        } else {
            Err(
                ApiError::configuration("server configuration error: missing API keys")
                    .with_details(serde_json::json!({ "missingKeys": missing })),
            )
        }
    }

    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }
}

// ── Tests ────────────────────────────────────────────────────────
