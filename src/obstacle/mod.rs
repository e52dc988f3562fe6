//! Obstacle analysis: one camera frame → one actionable report.
//!
//! Delegates scene understanding to the vision-generation capability but
//! treats its output with partial trust. Enum fields are validated, a
//! malformed distance is clamped instead of discarding the whole report,
//! and the safety invariant — danger means stop or turn, never continue —
//! is enforced locally. Reports are per-frame; nothing is tracked across
//! frames.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::error::{ApiError, ApiResult};
use crate::providers::{strip_code_fence, VisionGenerator};

/// Valid obstacle distance range, meters.
pub const MIN_OBSTACLE_DISTANCE_M: f64 = 0.5;
pub const MAX_OBSTACLE_DISTANCE_M: f64 = 10.0;

// ── Report model ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleStatus {
    Clear,
    ObstaclesDetected,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Left,
    Center,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObstacleType {
    Person,
    Vehicle,
    Object,
    Step,
    Wall,
    Pole,
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Urgency {
    Safe,
    Caution,
    Danger,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Recommendation {
    Continue,
    SlowDown,
    Stop,
    TurnLeft,
    TurnRight,
}

impl Recommendation {
    /// Whether this action is acceptable under danger status.
    fn is_danger_safe(self) -> bool {
        matches!(self, Self::Stop | Self::TurnLeft | Self::TurnRight)
    }
}

/// One detected obstacle.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Obstacle {
    pub direction: Direction,
    #[serde(rename = "type")]
    pub kind: ObstacleType,
    pub distance_meters: f64,
    pub urgency: Urgency,
}

/// The per-frame report handed to the client.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ObstacleReport {
    pub status: ObstacleStatus,
    pub obstacles: Vec<Obstacle>,
    pub guidance: String,
    pub recommendation: Recommendation,
}

// ── Wire shape from the model ────────────────────────────────────
//
// Enum fields arrive as free strings and are validated per-field; the
// model names the distance field simply "distance".

#[derive(Debug, Deserialize)]
struct RawReport {
    status: Option<String>,
    #[serde(default)]
    obstacles: Vec<RawObstacle>,
    #[serde(default)]
    guidance: String,
    recommendation: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawObstacle {
    direction: Option<String>,
    #[serde(rename = "type")]
    kind: Option<String>,
    distance: Option<f64>,
    urgency: Option<String>,
}

fn parse_enum<T: serde::de::DeserializeOwned>(value: &str) -> Option<T> {
    serde_json::from_value(serde_json::Value::String(value.to_string())).ok()
}

// ── Prompt ───────────────────────────────────────────────────────

const ANALYSIS_PROMPT: &str = r#"You are helping a visually impaired person navigate safely. Analyze this image from their forward-facing camera.

Identify obstacles and provide guidance in JSON format:
{
  "status": "clear" | "obstacles_detected" | "danger",
  "obstacles": [
    {
      "direction": "left" | "center" | "right",
      "type": "person" | "vehicle" | "object" | "step" | "wall" | "pole" | "unknown",
      "distance": estimated distance in meters (0.5 to 10),
      "urgency": "safe" | "caution" | "danger"
    }
  ],
  "guidance": "brief verbal guidance message",
  "recommendation": "continue" | "slow_down" | "stop" | "turn_left" | "turn_right"
}

Focus on:
- Immediate obstacles within 5 meters
- Direction relative to camera view (left, center, right)
- Safety priority: walking hazards, moving vehicles, drop-offs

Be concise and actionable."#;

// ── Analyzer ─────────────────────────────────────────────────────

/// Turns camera frames into validated [`ObstacleReport`]s.
pub struct ObstacleAnalyzer {
    vision: Arc<dyn VisionGenerator>,
}

impl ObstacleAnalyzer {
    pub fn new(vision: Arc<dyn VisionGenerator>) -> Self {
        Self { vision }
    }

    /// Analyze one frame.
    pub async fn analyze(&self, frame: &[u8], mime_type: &str) -> ApiResult<ObstacleReport> {
        if frame.is_empty() {
            return Err(ApiError::validation("image frame must not be empty"));
        }

        let raw = self
            .vision
            .analyze_image(ANALYSIS_PROMPT, frame, mime_type)
            .await?;

        let report: RawReport = serde_json::from_str(strip_code_fence(&raw)).map_err(|err| {
            ApiError::parse(format!("vision output did not match report contract: {err}"))
                .with_details(serde_json::json!({ "raw": raw }))
        })?;

        Ok(Self::validate(report))
    }

    /// Validate and police the model's report.
    fn validate(raw: RawReport) -> ObstacleReport {
        let mut obstacles = Vec::with_capacity(raw.obstacles.len());
        for entry in raw.obstacles {
            let direction = entry.direction.as_deref().and_then(parse_enum::<Direction>);
            let urgency = entry.urgency.as_deref().and_then(parse_enum::<Urgency>);
            let (Some(direction), Some(urgency)) = (direction, urgency) else {
                tracing::warn!("dropping obstacle with unrecognized direction/urgency");
                continue;
            };
            // Unknown type strings degrade to Unknown rather than losing
            // the obstacle; a malformed distance is clamped into range.
            let kind = entry
                .kind
                .as_deref()
                .and_then(parse_enum::<ObstacleType>)
                .unwrap_or(ObstacleType::Unknown);
            let distance_meters = entry
                .distance
                .filter(|d| d.is_finite())
                .unwrap_or(MAX_OBSTACLE_DISTANCE_M)
                .clamp(MIN_OBSTACLE_DISTANCE_M, MAX_OBSTACLE_DISTANCE_M);
            obstacles.push(Obstacle {
                direction,
                kind,
                distance_meters,
                urgency,
            });
        }

        // Status follows the validated obstacle list, not the model's
        // top-level claim: danger iff any obstacle is danger-urgent.
        let any_danger = obstacles.iter().any(|o| o.urgency == Urgency::Danger);
        let status = if any_danger {
            ObstacleStatus::Danger
        } else if !obstacles.is_empty() {
            raw.status
                .as_deref()
                .and_then(parse_enum::<ObstacleStatus>)
                .filter(|s| *s != ObstacleStatus::Danger)
                .unwrap_or(ObstacleStatus::ObstaclesDetected)
        } else {
            ObstacleStatus::Clear
        };

        let mut recommendation = raw
            .recommendation
            .as_deref()
            .and_then(parse_enum::<Recommendation>)
            .unwrap_or(Recommendation::SlowDown);

        // Safety policy enforced locally, never trusted from the model.
        if status == ObstacleStatus::Danger && !recommendation.is_danger_safe() {
            tracing::warn!(
                ?recommendation,
                "model recommendation violates danger policy, correcting to stop"
            );
            recommendation = Recommendation::Stop;
        }

        ObstacleReport {
            status,
            obstacles,
            guidance: raw.guidance,
            recommendation,
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
