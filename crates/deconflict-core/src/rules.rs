//! Detection thresholds and geometry policies.

use serde::{Deserialize, Serialize};

use crate::error::{DeconflictError, Result};

/// Default separation buffer when none is configured.
pub const DEFAULT_BUFFER_M: f64 = 15.0;

/// Where the relative-position term of a segment pair is anchored.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum RelativeAnchor {
    /// Difference of the two segments' own start waypoints. Exact only when
    /// both segments start at the overlap start.
    #[default]
    SegmentStart,
    /// Difference of both interpolated positions at the overlap start.
    OverlapStart,
}

/// Handling of segments whose two waypoints share a timestamp.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ZeroDurationPolicy {
    /// Pair is never evaluated.
    #[default]
    Skip,
    /// Segment is a stationary point at its start waypoint.
    Stationary,
}

/// Configuration for the conflict detector.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectionRules {
    /// Minimum acceptable separation; anything strictly closer is a conflict
    pub buffer_m: f64,
    #[serde(default)]
    pub anchor: RelativeAnchor,
    #[serde(default)]
    pub zero_duration: ZeroDurationPolicy,
}

impl Default for DetectionRules {
    fn default() -> Self {
        Self {
            buffer_m: DEFAULT_BUFFER_M,
            anchor: RelativeAnchor::default(),
            zero_duration: ZeroDurationPolicy::default(),
        }
    }
}

impl DetectionRules {
    pub fn with_buffer(buffer_m: f64) -> Self {
        Self {
            buffer_m,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        if !self.buffer_m.is_finite() || self.buffer_m < 0.0 {
            return Err(DeconflictError::InvalidBuffer(self.buffer_m));
        }
        Ok(())
    }
}
