//! Instruction synthesis: raw provider steps → clean, client-ready
//! instruction objects.
//!
//! Pure and total. Step order is safety-critical navigation order and is
//! never reordered or deduplicated.

use serde::{Deserialize, Serialize};

use crate::providers::RawStep;
use crate::types::{LatLng, Maneuver};

/// One atomic directional instruction, markup-free.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteStep {
    pub instruction: String,
    pub distance_text: String,
    pub duration_text: String,
    pub start_location: LatLng,
    pub end_location: LatLng,
    pub maneuver: Maneuver,
}

/// Normalize raw provider steps in order.
pub fn synthesize(raw_steps: Vec<RawStep>) -> Vec<RouteStep> {
    raw_steps
        .into_iter()
        .map(|step| RouteStep {
            instruction: strip_markup(&step.instruction),
            distance_text: step.distance_text,
            duration_text: step.duration_text,
            start_location: step.start_location,
            end_location: step.end_location,
            maneuver: Maneuver::from_provider(step.maneuver.as_deref()),
        })
        .collect()
}

/// Remove markup from instruction text.
///
/// Single-pass scanner rather than a regex: tolerates nested and
/// unbalanced tags without ever panicking, and guarantees no `<` or `>`
/// survives — a stray closing bracket outside any tag is dropped too.
pub fn strip_markup(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;
    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            c if !in_tag => out.push(c),
            _ => {}
        }
    }
    // Providers pad instructions with non-breaking-space entities.
    out.replace("&nbsp;", " ").trim().to_string()
}

// ── Tests ────────────────────────────────────────────────────────
