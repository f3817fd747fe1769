//! Scenario files in JSON.
//!
//! ```json
//! {
//!   "name": "harbour",
//!   "reference": "2025-01-01T12:00:00Z",
//!   "primary": { "name": "PRIMARY", "waypoints": [{ "x": 0, "y": 0, "t": 0 }] },
//!   "others": [{ "waypoints": [{ "x": 5, "y": 5, "z": 10, "t": "2025-01-01T12:00:04Z" }] }]
//! }
//! ```
//!
//! Numeric `t` values are seconds after `reference` (or process start when
//! `reference` is omitted).

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use deconflict_core::{Mission, TimeSpec, Waypoint};
use serde::Deserialize;
use std::path::Path;

use crate::scenarios::Scenario;

#[derive(Debug, Deserialize)]
struct ScenarioFile {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    reference: Option<DateTime<Utc>>,
    primary: MissionFile,
    #[serde(default)]
    others: Vec<MissionFile>,
}

#[derive(Debug, Deserialize)]
struct MissionFile {
    #[serde(default)]
    name: Option<String>,
    waypoints: Vec<WaypointFile>,
}

#[derive(Debug, Deserialize)]
struct WaypointFile {
    x: f64,
    y: f64,
    #[serde(default)]
    z: f64,
    t: TimeSpec,
}

impl MissionFile {
    fn into_mission(self, reference: Option<DateTime<Utc>>) -> Result<Mission> {
        let waypoints = self
            .waypoints
            .into_iter()
            .enumerate()
            .map(|(idx, wp)| {
                Waypoint::from_spec(wp.x, wp.y, wp.z, wp.t, reference)
                    .with_context(|| format!("waypoint {idx}"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Mission::new(waypoints))
    }
}

/// Parse a scenario from JSON text.
pub fn parse_scenario(json: &str) -> Result<Scenario> {
    let file: ScenarioFile = serde_json::from_str(json).context("Invalid scenario JSON")?;
    let reference = file.reference;

    let primary_name = file.primary.name.clone().unwrap_or_else(|| "PRIMARY".to_string());
    let primary = file
        .primary
        .into_mission(reference)
        .with_context(|| format!("mission '{primary_name}'"))?;

    let others = file
        .others
        .into_iter()
        .enumerate()
        .map(|(idx, mission)| {
            let name = mission
                .name
                .clone()
                .unwrap_or_else(|| format!("DRONE{:03}", idx + 1));
            let mission = mission
                .into_mission(reference)
                .with_context(|| format!("mission '{name}'"))?;
            Ok((name, mission))
        })
        .collect::<Result<Vec<_>>>()?;

    Ok(Scenario {
        name: file.name.unwrap_or_else(|| "file".to_string()),
        primary: (primary_name, primary),
        others,
    })
}

/// Read and parse a scenario file.
pub fn load_scenario(path: &Path) -> Result<Scenario> {
    let json = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;
    parse_scenario(&json).with_context(|| format!("Failed to load {}", path.display()))
}
