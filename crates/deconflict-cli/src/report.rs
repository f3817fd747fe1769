//! Human-readable and JSON output for detection results.

use anyhow::Result;
use chrono::{DateTime, Duration, Utc};
use deconflict_core::{interpolate, DetectionOutcome, Vec3};
use serde::Serialize;
use std::fmt::Write;

use crate::scenarios::Scenario;

/// Process exit status of `check` when conflicts are found.
pub const CONFLICT_EXIT_STATUS: u8 = 2;

/// Exit status for a detection outcome: 0 when clear.
pub fn exit_status(outcome: &DetectionOutcome) -> u8 {
    if outcome.is_clear() {
        0
    } else {
        CONFLICT_EXIT_STATUS
    }
}

/// Explain a detection outcome, one block per conflict.
pub fn explain(scenario: &Scenario, outcome: &DetectionOutcome) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "=== Conflict Detection Result ({}) ===", scenario.name);

    if outcome.is_clear() {
        let _ = writeln!(out, "No Conflicts Detected (CLEAR)");
        return out;
    }

    let _ = writeln!(out, "CONFLICTS DETECTED: {}", outcome.len());
    for (idx, conflict) in outcome.records().iter().enumerate() {
        let loc = conflict.primary_position;
        let _ = writeln!(out);
        let _ = writeln!(out, "Conflict {}:", idx + 1);
        let _ = writeln!(out, "  Time     : {}", conflict.time.format("%Y-%m-%d %H:%M:%S%.3f"));
        let _ = writeln!(out, "  Location : X={:.2}, Y={:.2}, Z={:.2}", loc.x, loc.y, loc.z);
        let _ = writeln!(
            out,
            "  Between  : {} and {}",
            scenario.primary.0,
            scenario.other_label(conflict.other_mission_idx)
        );
        let _ = writeln!(out, "  Distance : {:.2} m", conflict.distance_m);
    }
    out
}

#[derive(Serialize)]
struct JsonReport<'a> {
    scenario: &'a str,
    buffer_m: f64,
    #[serde(flatten)]
    outcome: &'a DetectionOutcome,
}

pub fn to_json(scenario: &Scenario, buffer_m: f64, outcome: &DetectionOutcome) -> Result<String> {
    Ok(serde_json::to_string_pretty(&JsonReport {
        scenario: &scenario.name,
        buffer_m,
        outcome,
    })?)
}

/// Positions of every mission at one instant of the timeline.
#[derive(Debug, Clone, Serialize)]
pub struct TimelineFrame {
    pub frame: usize,
    pub time: DateTime<Utc>,
    /// Seconds since the earliest waypoint in the scenario
    pub elapsed_s: f64,
    /// Primary first, then others; `None` while a mission is not airborne
    pub positions: Vec<Option<Vec3>>,
}

/// Sample all missions over `frames + 1` evenly spaced instants spanning the
/// whole scenario.
pub fn timeline(scenario: &Scenario, frames: usize) -> Vec<TimelineFrame> {
    let missions: Vec<_> = std::iter::once(&scenario.primary.1)
        .chain(scenario.others.iter().map(|(_, m)| m))
        .collect();

    let spans: Vec<_> = missions.iter().filter_map(|m| m.time_span()).collect();
    let (Some(t_min), Some(t_max)) = (
        spans.iter().map(|s| s.0).min(),
        spans.iter().map(|s| s.1).max(),
    ) else {
        return Vec::new();
    };

    let total = t_max - t_min;
    let frames = frames.max(1);
    (0..=frames)
        .map(|frame| {
            let time = t_min + scale(total, frame, frames);
            let positions = missions.iter().map(|m| interpolate(m, time)).collect();
            TimelineFrame {
                frame,
                time,
                elapsed_s: (time - t_min).num_milliseconds() as f64 / 1000.0,
                positions,
            }
        })
        .collect()
}

fn scale(total: Duration, frame: usize, frames: usize) -> Duration {
    let nanos = total.num_nanoseconds().unwrap_or(i64::MAX) as i128;
    Duration::nanoseconds((nanos * frame as i128 / frames as i128) as i64)
}

/// Render a timeline as a fixed-width table.
pub fn render_timeline(scenario: &Scenario, frames: &[TimelineFrame]) -> String {
    let mut out = String::new();
    let _ = write!(out, "{:>8}", "t (s)");
    let _ = write!(out, " | {:^26}", scenario.primary.0);
    for (label, _) in &scenario.others {
        let _ = write!(out, " | {:^26}", label);
    }
    let _ = writeln!(out);

    for frame in frames {
        let _ = write!(out, "{:>8.2}", frame.elapsed_s);
        for position in &frame.positions {
            match position {
                Some(p) => {
                    let _ = write!(out, " | {:>8.2},{:>8.2},{:>8.2}", p.x, p.y, p.z);
                }
                None => {
                    let _ = write!(out, " | {:^26}", "-");
                }
            }
        }
        let _ = writeln!(out);
    }
    out
}
