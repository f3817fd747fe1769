//! Trajectory model: timed waypoints, missions and their segments.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

use crate::error::{DeconflictError, Result};
use crate::spatial::{lerp, Vec3};

static PROCESS_START: OnceLock<DateTime<Utc>> = OnceLock::new();

/// Instant captured the first time any caller asks for it. Offsets without an
/// explicit reference resolve against this.
pub fn process_start() -> DateTime<Utc> {
    *PROCESS_START.get_or_init(Utc::now)
}

/// Time of a waypoint as given by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TimeSpec {
    Absolute(DateTime<Utc>),
    /// Seconds after a reference instant
    OffsetSeconds(f64),
}

impl From<DateTime<Utc>> for TimeSpec {
    fn from(t: DateTime<Utc>) -> Self {
        TimeSpec::Absolute(t)
    }
}

impl From<f64> for TimeSpec {
    fn from(offset_s: f64) -> Self {
        TimeSpec::OffsetSeconds(offset_s)
    }
}

impl TimeSpec {
    /// Resolve into an absolute instant. Offsets are added to `reference`, or
    /// to [`process_start`] when no reference is given.
    pub fn resolve(self, reference: Option<DateTime<Utc>>) -> Result<DateTime<Utc>> {
        match self {
            TimeSpec::Absolute(t) => Ok(t),
            TimeSpec::OffsetSeconds(offset_s) => {
                let base = reference.unwrap_or_else(process_start);
                offset_time(base, offset_s).ok_or_else(|| {
                    DeconflictError::InvalidTime(format!(
                        "offset {offset_s}s from {base} is not representable"
                    ))
                })
            }
        }
    }
}

/// `base + secs`, or `None` when `secs` is not finite or overflows.
pub(crate) fn offset_time(base: DateTime<Utc>, secs: f64) -> Option<DateTime<Utc>> {
    // i64 nanoseconds cover roughly +/- 292 years
    if !secs.is_finite() || secs.abs() >= 9.0e9 {
        return None;
    }
    base.checked_add_signed(Duration::nanoseconds((secs * 1e9).round() as i64))
}

/// Signed seconds from `from` to `to`.
pub(crate) fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    delta.num_seconds() as f64 + f64::from(delta.subsec_nanos()) * 1e-9
}

/// A point in space with an absolute time. Immutable once constructed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "WaypointRecord", into = "WaypointRecord")]
pub struct Waypoint {
    position: Vec3,
    t: DateTime<Utc>,
}

#[derive(Serialize, Deserialize)]
struct WaypointRecord {
    x: f64,
    y: f64,
    #[serde(default)]
    z: f64,
    t: DateTime<Utc>,
}

impl TryFrom<WaypointRecord> for Waypoint {
    type Error = DeconflictError;

    fn try_from(record: WaypointRecord) -> Result<Self> {
        Waypoint::new(record.x, record.y, record.z, record.t)
    }
}

impl From<Waypoint> for WaypointRecord {
    fn from(wp: Waypoint) -> Self {
        Self {
            x: wp.position.x,
            y: wp.position.y,
            z: wp.position.z,
            t: wp.t,
        }
    }
}

impl Waypoint {
    pub fn new(x: f64, y: f64, z: f64, t: DateTime<Utc>) -> Result<Self> {
        for (axis, value) in [('x', x), ('y', y), ('z', z)] {
            if !value.is_finite() {
                return Err(DeconflictError::NonFiniteCoordinate { axis, value });
            }
        }
        Ok(Self {
            position: Vec3::new(x, y, z),
            t,
        })
    }

    /// Waypoint at ground level (z = 0).
    pub fn planar(x: f64, y: f64, t: DateTime<Utc>) -> Result<Self> {
        Self::new(x, y, 0.0, t)
    }

    pub fn from_spec(
        x: f64,
        y: f64,
        z: f64,
        t: TimeSpec,
        reference: Option<DateTime<Utc>>,
    ) -> Result<Self> {
        Self::new(x, y, z, t.resolve(reference)?)
    }

    pub fn x(&self) -> f64 {
        self.position.x
    }

    pub fn y(&self) -> f64 {
        self.position.y
    }

    pub fn z(&self) -> f64 {
        self.position.z
    }

    pub fn t(&self) -> DateTime<Utc> {
        self.t
    }

    pub fn position(&self) -> Vec3 {
        self.position
    }
}

/// Time-ordered waypoints flown by one vehicle.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "MissionRecord")]
pub struct Mission {
    waypoints: Vec<Waypoint>,
}

#[derive(Deserialize)]
struct MissionRecord {
    waypoints: Vec<Waypoint>,
}

impl From<MissionRecord> for Mission {
    fn from(record: MissionRecord) -> Self {
        Mission::new(record.waypoints)
    }
}

impl FromIterator<Waypoint> for Mission {
    fn from_iter<I: IntoIterator<Item = Waypoint>>(iter: I) -> Self {
        Mission::new(iter.into_iter().collect())
    }
}

impl Mission {
    /// Build a mission, stably sorting the waypoints by time.
    pub fn new(mut waypoints: Vec<Waypoint>) -> Self {
        waypoints.sort_by_key(|wp| wp.t);
        Self { waypoints }
    }

    pub fn waypoints(&self) -> &[Waypoint] {
        &self.waypoints
    }

    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    /// Consecutive waypoint pairs, in time order.
    pub fn segments(&self) -> impl ExactSizeIterator<Item = Segment<'_>> + '_ {
        self.waypoints
            .windows(2)
            .map(|pair| Segment::new(&pair[0], &pair[1]))
    }

    pub fn segment_count(&self) -> usize {
        self.waypoints.len().saturating_sub(1)
    }

    /// First and last instant of the mission.
    pub fn time_span(&self) -> Option<(DateTime<Utc>, DateTime<Utc>)> {
        Some((self.waypoints.first()?.t, self.waypoints.last()?.t))
    }

    /// Interpolated position at `t`, or `None` when no segment covers `t`.
    ///
    /// The first segment whose closed interval contains `t` is used, so a
    /// shared endpoint resolves to the earlier segment.
    pub fn position_at(&self, t: DateTime<Utc>) -> Option<Vec3> {
        self.segments()
            .find(|seg| seg.start_time() <= t && t <= seg.end_time())
            .map(|seg| seg.position_at(t))
    }
}

/// See [`Mission::position_at`].
pub fn interpolate(mission: &Mission, t: DateTime<Utc>) -> Option<Vec3> {
    mission.position_at(t)
}

/// Constant-velocity leg between two consecutive waypoints.
#[derive(Debug, Clone, Copy)]
pub struct Segment<'a> {
    start: &'a Waypoint,
    end: &'a Waypoint,
    duration_s: f64,
}

impl<'a> Segment<'a> {
    fn new(start: &'a Waypoint, end: &'a Waypoint) -> Self {
        Self {
            start,
            end,
            duration_s: seconds_between(start.t, end.t),
        }
    }

    pub fn start(&self) -> &'a Waypoint {
        self.start
    }

    pub fn end(&self) -> &'a Waypoint {
        self.end
    }

    pub fn start_time(&self) -> DateTime<Utc> {
        self.start.t
    }

    pub fn end_time(&self) -> DateTime<Utc> {
        self.end.t
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    /// Both waypoints share a timestamp.
    pub fn is_degenerate(&self) -> bool {
        self.start.t == self.end.t
    }

    /// Velocity in length units per second; zero for a degenerate segment.
    pub fn velocity(&self) -> Vec3 {
        if self.is_degenerate() {
            return Vec3::zero();
        }
        (self.end.position - self.start.position) / self.duration_s
    }

    /// Linear interpolation by this segment's own time ratio. Not clamped to
    /// the segment's interval.
    pub fn position_at(&self, t: DateTime<Utc>) -> Vec3 {
        if self.is_degenerate() {
            return self.start.position;
        }
        let ratio = seconds_between(self.start.t, t) / self.duration_s;
        lerp(self.start.position, self.end.position, ratio)
    }
}
