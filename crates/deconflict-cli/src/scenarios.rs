//! Pre-defined mission scenarios for checking the detector by hand.

use anyhow::{bail, Result};
use chrono::{DateTime, Utc};
use deconflict_core::{Mission, TimeSpec, Waypoint};

/// A named primary mission plus the traffic it is checked against.
#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub primary: (String, Mission),
    pub others: Vec<(String, Mission)>,
}

impl Scenario {
    pub fn primary_mission(&self) -> &Mission {
        &self.primary.1
    }

    /// Other missions in detector index order.
    pub fn other_missions(&self) -> Vec<Mission> {
        self.others.iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn other_label(&self, idx: usize) -> &str {
        self.others
            .get(idx)
            .map(|(label, _)| label.as_str())
            .unwrap_or("unknown")
    }
}

pub const SCENARIO_NAMES: [&str; 2] = ["conflict", "no-conflict"];

/// Look up a built-in scenario by name.
pub fn by_name(name: &str, reference: DateTime<Utc>) -> Result<Scenario> {
    match name {
        "conflict" => create_conflict_scenario(reference),
        "no-conflict" => create_no_conflict_scenario(reference),
        other => bail!(
            "unknown scenario '{}' (expected one of: {})",
            other,
            SCENARIO_NAMES.join(", ")
        ),
    }
}

/// Straight two-waypoint leg, times in seconds after `reference`.
fn leg(
    reference: DateTime<Utc>,
    from: (f64, f64, f64, f64),
    to: (f64, f64, f64, f64),
) -> Result<Mission> {
    let waypoint = |(x, y, z, secs): (f64, f64, f64, f64)| {
        Waypoint::from_spec(x, y, z, TimeSpec::OffsetSeconds(secs), Some(reference))
    };
    Ok(Mission::new(vec![waypoint(from)?, waypoint(to)?]))
}

/// Primary climbing diagonally while one drone crosses its path mid-flight.
///
/// - Drone 1: mirror-image diagonal, meets the primary at t+5s
/// - Drone 2: parallel, well offset
/// - Drone 3: parallel escort trailing ~7m behind
/// - Drone 4: parallel, far away
pub fn create_conflict_scenario(reference: DateTime<Utc>) -> Result<Scenario> {
    let primary = leg(reference, (0.0, 0.0, 0.0, 0.0), (10.0, 10.0, 10.0, 10.0))?;

    let others = vec![
        (
            "DRONE001".to_string(),
            leg(reference, (10.0, 0.0, 0.0, 0.0), (0.0, 10.0, 10.0, 10.0))?,
        ),
        (
            "DRONE002".to_string(),
            leg(reference, (20.0, 20.0, 5.0, 0.0), (30.0, 30.0, 15.0, 10.0))?,
        ),
        (
            "DRONE003".to_string(),
            leg(reference, (-5.0, -5.0, 0.0, 0.0), (5.0, 5.0, 10.0, 10.0))?,
        ),
        (
            "DRONE004".to_string(),
            leg(reference, (40.0, 40.0, 0.0, 0.0), (50.0, 50.0, 10.0, 10.0))?,
        ),
    ];

    Ok(Scenario {
        name: "conflict".to_string(),
        primary: ("PRIMARY".to_string(), primary),
        others,
    })
}

/// Same primary with traffic separated in space, time or altitude.
pub fn create_no_conflict_scenario(reference: DateTime<Utc>) -> Result<Scenario> {
    let primary = leg(reference, (0.0, 0.0, 0.0, 0.0), (10.0, 10.0, 10.0, 10.0))?;

    let others = vec![
        // Far away in space
        (
            "DRONE001".to_string(),
            leg(reference, (50.0, 50.0, 0.0, 0.0), (60.0, 60.0, 10.0, 10.0))?,
        ),
        // Far in space and time
        (
            "DRONE002".to_string(),
            leg(reference, (30.0, 30.0, 20.0, 20.0), (40.0, 40.0, 30.0, 30.0))?,
        ),
        // Different path and altitude
        (
            "DRONE003".to_string(),
            leg(reference, (20.0, 0.0, 30.0, 0.0), (30.0, 10.0, 40.0, 10.0))?,
        ),
        (
            "DRONE004".to_string(),
            leg(reference, (-100.0, -100.0, 0.0, 0.0), (-90.0, -90.0, 10.0, 10.0))?,
        ),
    ];

    Ok(Scenario {
        name: "no-conflict".to_string(),
        primary: ("PRIMARY".to_string(), primary),
        others,
    })
}
