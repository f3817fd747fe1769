//! Strategic conflict detection between planned missions.
//!
//! Every segment of the primary mission is paired with every segment of each
//! other mission. Pairs that are active at the same time are reduced to a
//! closest-approach instant under constant velocity, and any instant where the
//! vehicles are closer than the buffer is reported.

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{offset_time, Mission, Segment};
use crate::rules::{DetectionRules, RelativeAnchor, ZeroDurationPolicy};
use crate::spatial::{distance, Vec3};

/// A separation violation between the primary and one other mission.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictRecord {
    /// Instant of closest approach within the overlap window
    pub time: DateTime<Utc>,
    pub primary_position: Vec3,
    pub other_position: Vec3,
    pub distance_m: f64,
    /// Index into the `others` slice passed to the detector
    pub other_mission_idx: usize,
    pub primary_segment_idx: usize,
    pub other_segment_idx: usize,
}

/// Result of a detection run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "conflicts", rename_all = "lowercase")]
pub enum DetectionOutcome {
    Clear,
    /// Records in evaluation order: other mission, primary segment, other
    /// segment. Never empty.
    Conflicts(Vec<ConflictRecord>),
}

impl DetectionOutcome {
    pub fn from_records(records: Vec<ConflictRecord>) -> Self {
        if records.is_empty() {
            DetectionOutcome::Clear
        } else {
            DetectionOutcome::Conflicts(records)
        }
    }

    pub fn is_clear(&self) -> bool {
        matches!(self, DetectionOutcome::Clear)
    }

    pub fn records(&self) -> &[ConflictRecord] {
        match self {
            DetectionOutcome::Clear => &[],
            DetectionOutcome::Conflicts(records) => records,
        }
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.is_clear()
    }

    pub fn into_records(self) -> Vec<ConflictRecord> {
        match self {
            DetectionOutcome::Clear => Vec::new(),
            DetectionOutcome::Conflicts(records) => records,
        }
    }

    /// Records involving one of the other missions.
    pub fn involving(&self, other_mission_idx: usize) -> impl Iterator<Item = &ConflictRecord> {
        self.records()
            .iter()
            .filter(move |r| r.other_mission_idx == other_mission_idx)
    }
}

/// One candidate instant checked for a segment pair.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairEvaluation {
    pub other_mission_idx: usize,
    pub primary_segment_idx: usize,
    pub other_segment_idx: usize,
    pub time: DateTime<Utc>,
    pub distance_m: f64,
    pub is_conflict: bool,
}

/// Hook receiving every evaluated candidate instant. Does not affect results.
pub trait PairObserver {
    fn on_evaluation(&mut self, evaluation: &PairEvaluation);
}

impl<F> PairObserver for F
where
    F: FnMut(&PairEvaluation),
{
    fn on_evaluation(&mut self, evaluation: &PairEvaluation) {
        self(evaluation)
    }
}

impl PairObserver for () {
    fn on_evaluation(&mut self, _evaluation: &PairEvaluation) {}
}

#[derive(Clone, Copy)]
struct PairContext<'a> {
    other_mission_idx: usize,
    primary_segment_idx: usize,
    other_segment_idx: usize,
    primary: Segment<'a>,
    other: Segment<'a>,
}

/// Pure conflict detector over piecewise-linear missions.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConflictDetector {
    rules: DetectionRules,
}

impl ConflictDetector {
    /// Create a detector, rejecting a negative or non-finite buffer.
    pub fn new(rules: DetectionRules) -> Result<Self> {
        rules.validate()?;
        Ok(Self { rules })
    }

    pub fn with_buffer(buffer_m: f64) -> Result<Self> {
        Self::new(DetectionRules::with_buffer(buffer_m))
    }

    pub fn rules(&self) -> &DetectionRules {
        &self.rules
    }

    /// Check the primary mission against every other mission.
    pub fn detect(&self, primary: &Mission, others: &[Mission]) -> DetectionOutcome {
        self.detect_observed(primary, others, &mut ())
    }

    /// Same as [`detect`](Self::detect), reporting each evaluation to `observer`.
    pub fn detect_observed<O: PairObserver>(
        &self,
        primary: &Mission,
        others: &[Mission],
        observer: &mut O,
    ) -> DetectionOutcome {
        let mut records = Vec::new();
        for (other_idx, other) in others.iter().enumerate() {
            for (primary_idx, segment) in primary.segments().enumerate() {
                self.scan_segment(other_idx, primary_idx, segment, other, observer, &mut records);
            }
        }

        tracing::debug!(
            others = others.len(),
            conflicts = records.len(),
            "Conflict detection finished"
        );
        DetectionOutcome::from_records(records)
    }

    /// Parallel variant of [`detect`](Self::detect) with identical output.
    ///
    /// Work is split over `(other mission, primary segment)` pairs; partial
    /// results are concatenated in enumeration order.
    pub fn detect_parallel(&self, primary: &Mission, others: &[Mission]) -> DetectionOutcome {
        let primary_segments: Vec<Segment<'_>> = primary.segments().collect();
        let segment_count = primary_segments.len();

        let partials: Vec<Vec<ConflictRecord>> = (0..others.len() * segment_count)
            .into_par_iter()
            .map(|job| {
                let (other_idx, primary_idx) = (job / segment_count, job % segment_count);
                let mut out = Vec::new();
                self.scan_segment(
                    other_idx,
                    primary_idx,
                    primary_segments[primary_idx],
                    &others[other_idx],
                    &mut (),
                    &mut out,
                );
                out
            })
            .collect();

        let records: Vec<ConflictRecord> = partials.into_iter().flatten().collect();
        tracing::debug!(
            others = others.len(),
            conflicts = records.len(),
            "Conflict detection finished"
        );
        DetectionOutcome::from_records(records)
    }

    fn scan_segment<O: PairObserver>(
        &self,
        other_mission_idx: usize,
        primary_segment_idx: usize,
        primary: Segment<'_>,
        other_mission: &Mission,
        observer: &mut O,
        out: &mut Vec<ConflictRecord>,
    ) {
        for (other_segment_idx, other) in other_mission.segments().enumerate() {
            let ctx = PairContext {
                other_mission_idx,
                primary_segment_idx,
                other_segment_idx,
                primary,
                other,
            };
            self.evaluate_pair(ctx, observer, out);
        }
    }

    fn evaluate_pair<O: PairObserver>(
        &self,
        ctx: PairContext<'_>,
        observer: &mut O,
        out: &mut Vec<ConflictRecord>,
    ) {
        let (a, b) = (ctx.primary, ctx.other);

        let t_start = a.start_time().max(b.start_time());
        let t_end = a.end_time().min(b.end_time());
        if t_start > t_end {
            return;
        }

        if self.rules.zero_duration == ZeroDurationPolicy::Skip
            && (a.is_degenerate() || b.is_degenerate())
        {
            return;
        }

        let rel_v = a.velocity() - b.velocity();
        let rel_p = match self.rules.anchor {
            RelativeAnchor::SegmentStart => a.start().position() - b.start().position(),
            RelativeAnchor::OverlapStart => a.position_at(t_start) - b.position_at(t_start),
        };

        let rel_v_sq = rel_v.norm_squared();
        if rel_v_sq == 0.0 {
            // Constant separation: both ends of the window
            self.check_instant(ctx, t_start, observer, out);
            if t_end != t_start {
                self.check_instant(ctx, t_end, observer, out);
            }
            return;
        }

        let t_star = -rel_p.dot(rel_v) / rel_v_sq;
        let candidate = clamp_time(
            offset_time(t_start, t_star).unwrap_or(if t_star < 0.0 { t_start } else { t_end }),
            t_start,
            t_end,
        );
        self.check_instant(ctx, candidate, observer, out);
    }

    fn check_instant<O: PairObserver>(
        &self,
        ctx: PairContext<'_>,
        t: DateTime<Utc>,
        observer: &mut O,
        out: &mut Vec<ConflictRecord>,
    ) {
        let primary_position = ctx.primary.position_at(t);
        let other_position = ctx.other.position_at(t);
        let distance_m = distance(primary_position, other_position);
        let is_conflict = distance_m < self.rules.buffer_m;

        tracing::trace!(
            other = ctx.other_mission_idx,
            primary_segment = ctx.primary_segment_idx,
            other_segment = ctx.other_segment_idx,
            distance_m,
            time = %t,
            "Checked segment pair"
        );

        observer.on_evaluation(&PairEvaluation {
            other_mission_idx: ctx.other_mission_idx,
            primary_segment_idx: ctx.primary_segment_idx,
            other_segment_idx: ctx.other_segment_idx,
            time: t,
            distance_m,
            is_conflict,
        });

        if !is_conflict {
            return;
        }

        tracing::debug!(
            other = ctx.other_mission_idx,
            distance_m,
            buffer_m = self.rules.buffer_m,
            time = %t,
            "Separation conflict"
        );

        out.push(ConflictRecord {
            time: t,
            primary_position,
            other_position,
            distance_m,
            other_mission_idx: ctx.other_mission_idx,
            primary_segment_idx: ctx.primary_segment_idx,
            other_segment_idx: ctx.other_segment_idx,
        });
    }
}

fn clamp_time(t: DateTime<Utc>, lo: DateTime<Utc>, hi: DateTime<Utc>) -> DateTime<Utc> {
    if t < lo {
        lo
    } else if t > hi {
        hi
    } else {
        t
    }
}

/// Check `primary` against `others` with the reference geometry policies.
pub fn detect(primary: &Mission, others: &[Mission], buffer_m: f64) -> Result<DetectionOutcome> {
    Ok(ConflictDetector::with_buffer(buffer_m)?.detect(primary, others))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DeconflictError;
    use crate::models::{TimeSpec, Waypoint};
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 12, 0, 0).unwrap()
    }

    fn mission(points: &[(f64, f64, f64, f64)]) -> Mission {
        points
            .iter()
            .map(|&(x, y, z, secs)| {
                Waypoint::from_spec(x, y, z, TimeSpec::OffsetSeconds(secs), Some(t0())).unwrap()
            })
            .collect()
    }

    fn detector(
        buffer_m: f64,
        anchor: RelativeAnchor,
        zero_duration: ZeroDurationPolicy,
    ) -> ConflictDetector {
        ConflictDetector::new(DetectionRules {
            buffer_m,
            anchor,
            zero_duration,
        })
        .unwrap()
    }

    // Other mission starts halfway through the primary's segment. True closest
    // approach is at t0+9s, sqrt(20) apart.
    fn late_start_pair() -> (Mission, Mission) {
        (
            mission(&[(0.0, 0.0, 0.0, 0.0), (10.0, 0.0, 0.0, 10.0)]),
            mission(&[(5.0, 10.0, 0.0, 5.0), (5.0, -10.0, 0.0, 15.0)]),
        )
    }

    #[test]
    fn test_crossing_paths_conflict_at_midpoint() {
        let primary = mission(&[(0.0, 0.0, 0.0, 0.0), (10.0, 10.0, 10.0, 10.0)]);
        let other = mission(&[(10.0, 0.0, 0.0, 0.0), (0.0, 10.0, 10.0, 10.0)]);

        let outcome = detect(&primary, &[other], 15.0).unwrap();
        let records = outcome.records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].time, t0() + Duration::seconds(5));
        assert!(records[0].distance_m.abs() < 1e-9);
        assert_eq!(records[0].primary_position, Vec3::new(5.0, 5.0, 5.0));
        assert_eq!(records[0].other_mission_idx, 0);
    }

    #[test]
    fn test_negative_buffer_is_rejected_before_detection() {
        let primary = mission(&[(0.0, 0.0, 0.0, 0.0), (1.0, 0.0, 0.0, 1.0)]);
        assert_eq!(
            detect(&primary, &[], -0.5),
            Err(DeconflictError::InvalidBuffer(-0.5))
        );
    }

    #[test]
    fn test_segment_start_anchor_keeps_reference_approximation() {
        let (primary, other) = late_start_pair();
        let outcome = detector(10.0, RelativeAnchor::SegmentStart, ZeroDurationPolicy::Skip)
            .detect(&primary, &[other]);

        let record = &outcome.records()[0];
        assert_eq!(record.time, t0() + Duration::seconds(10));
        assert!((record.distance_m - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_overlap_start_anchor_finds_true_closest_approach() {
        let (primary, other) = late_start_pair();
        let outcome = detector(10.0, RelativeAnchor::OverlapStart, ZeroDurationPolicy::Skip)
            .detect(&primary, &[other]);

        let record = &outcome.records()[0];
        assert_eq!(record.time, t0() + Duration::seconds(9));
        assert!((record.distance_m - 20.0_f64.sqrt()).abs() < 1e-9);
    }

    #[test]
    fn test_anchor_choice_changes_verdict_near_buffer() {
        let (primary, other) = late_start_pair();
        let others = [other];
        let reference = detector(4.8, RelativeAnchor::SegmentStart, ZeroDurationPolicy::Skip);
        let corrected = detector(4.8, RelativeAnchor::OverlapStart, ZeroDurationPolicy::Skip);
        assert!(reference.detect(&primary, &others).is_clear());
        assert_eq!(corrected.detect(&primary, &others).len(), 1);
    }

    #[test]
    fn test_zero_duration_segment_policies() {
        let primary = mission(&[(0.0, 0.0, 0.0, 0.0), (10.0, 0.0, 0.0, 10.0)]);
        let hover = mission(&[(5.0, 1.0, 0.0, 5.0), (5.0, 1.0, 0.0, 5.0)]);
        let others = [hover];

        let skip = detector(2.0, RelativeAnchor::SegmentStart, ZeroDurationPolicy::Skip);
        assert!(skip.detect(&primary, &others).is_clear());

        let stationary =
            detector(2.0, RelativeAnchor::SegmentStart, ZeroDurationPolicy::Stationary);
        let outcome = stationary.detect(&primary, &others);
        assert_eq!(outcome.len(), 1);
        let record = &outcome.records()[0];
        assert_eq!(record.time, t0() + Duration::seconds(5));
        assert!((record.distance_m - 1.0).abs() < 1e-9);
        assert_eq!(record.other_position, Vec3::new(5.0, 1.0, 0.0));
    }

    #[test]
    fn test_unit_observer_leaves_result_unchanged() {
        let primary = mission(&[(0.0, 0.0, 0.0, 0.0), (10.0, 10.0, 10.0, 10.0)]);
        let others = [
            mission(&[(10.0, 0.0, 0.0, 0.0), (0.0, 10.0, 10.0, 10.0)]),
            mission(&[(-5.0, -5.0, 0.0, 0.0), (5.0, 5.0, 10.0, 10.0)]),
        ];
        let detector = ConflictDetector::with_buffer(15.0).unwrap();

        let observed = detector.detect_observed(&primary, &others, &mut ());
        assert_eq!(observed.len(), 3);
        assert_eq!(observed, detector.detect(&primary, &others));
    }

    #[test]
    fn test_parallel_velocity_checks_both_window_ends() {
        let primary = mission(&[(0.0, 0.0, 0.0, 0.0), (10.0, 10.0, 10.0, 10.0)]);
        let escort = mission(&[(-5.0, -5.0, 0.0, 0.0), (5.0, 5.0, 10.0, 10.0)]);

        let mut times = Vec::new();
        let outcome = ConflictDetector::with_buffer(15.0)
            .unwrap()
            .detect_observed(&primary, &[escort], &mut |e: &PairEvaluation| times.push(e.time));

        assert_eq!(times, vec![t0(), t0() + Duration::seconds(10)]);
        assert_eq!(outcome.len(), 2);
        for record in outcome.records() {
            assert!((record.distance_m - 50.0_f64.sqrt()).abs() < 1e-9);
        }
    }

    #[test]
    fn test_touching_windows_evaluate_shared_instant_once() {
        let primary = mission(&[(0.0, 0.0, 0.0, 0.0), (10.0, 0.0, 0.0, 10.0)]);
        let follower = mission(&[(10.0, 1.0, 0.0, 10.0), (20.0, 1.0, 0.0, 20.0)]);

        let mut evaluations = 0;
        let outcome = ConflictDetector::with_buffer(2.0)
            .unwrap()
            .detect_observed(&primary, &[follower], &mut |_: &PairEvaluation| evaluations += 1);

        assert_eq!(evaluations, 1);
        assert_eq!(outcome.records()[0].time, t0() + Duration::seconds(10));
    }

    #[test]
    fn test_records_follow_evaluation_order() {
        let primary = mission(&[
            (0.0, 0.0, 0.0, 0.0),
            (10.0, 0.0, 0.0, 10.0),
            (20.0, 0.0, 0.0, 20.0),
        ]);
        let shadow = mission(&[
            (0.0, 1.0, 0.0, 0.0),
            (10.0, 1.0, 0.0, 10.0),
            (20.0, 1.0, 0.0, 20.0),
        ]);
        let outcome = ConflictDetector::with_buffer(2.0)
            .unwrap()
            .detect(&primary, &[shadow.clone(), Mission::default(), shadow]);

        let keys: Vec<(usize, usize, usize)> = outcome
            .records()
            .iter()
            .map(|r| (r.other_mission_idx, r.primary_segment_idx, r.other_segment_idx))
            .collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
        assert_eq!(outcome.involving(1).count(), 0);
        assert!(outcome.involving(0).count() > 0);
        assert_eq!(outcome.involving(0).count(), outcome.involving(2).count());
    }

    #[test]
    fn test_parallel_detection_matches_sequential() {
        let primary = mission(&[
            (0.0, 0.0, 0.0, 0.0),
            (10.0, 10.0, 10.0, 10.0),
            (20.0, 0.0, 5.0, 20.0),
            (30.0, 10.0, 0.0, 30.0),
        ]);
        let others = vec![
            mission(&[(10.0, 0.0, 0.0, 0.0), (0.0, 10.0, 10.0, 10.0), (25.0, 5.0, 5.0, 25.0)]),
            mission(&[(-5.0, -5.0, 0.0, 0.0), (5.0, 5.0, 10.0, 10.0)]),
            mission(&[(30.0, 0.0, 0.0, 12.0), (15.0, 5.0, 3.0, 22.0), (28.0, 9.0, 1.0, 31.0)]),
        ];
        let detector = ConflictDetector::with_buffer(8.0).unwrap();
        let sequential = detector.detect(&primary, &others);
        assert!(!sequential.is_clear());
        assert_eq!(detector.detect_parallel(&primary, &others), sequential);
    }

    #[derive(Clone, Default)]
    struct CapturedLog(std::sync::Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for CapturedLog {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    fn debug_log_of(run: impl FnOnce()) -> String {
        let log = CapturedLog::default();
        let writer = log.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, run);
        let bytes = log.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }

    #[test]
    fn test_both_detection_paths_log_summary() {
        let primary = mission(&[(0.0, 0.0, 0.0, 0.0), (10.0, 10.0, 10.0, 10.0)]);
        let others = [mission(&[(10.0, 0.0, 0.0, 0.0), (0.0, 10.0, 10.0, 10.0)])];
        let detector = ConflictDetector::with_buffer(15.0).unwrap();

        let sequential = debug_log_of(|| {
            detector.detect(&primary, &others);
        });
        let parallel = debug_log_of(|| {
            detector.detect_parallel(&primary, &others);
        });

        for log in [sequential, parallel] {
            assert!(log.contains("Conflict detection finished"), "missing summary in {log}");
            assert!(log.contains("conflicts=1"));
        }
    }

    #[test]
    fn test_outcome_serializes_with_status_tag() {
        let clear = serde_json::to_value(DetectionOutcome::Clear).unwrap();
        assert_eq!(clear["status"], "clear");

        let primary = mission(&[(0.0, 0.0, 0.0, 0.0), (10.0, 10.0, 10.0, 10.0)]);
        let other = mission(&[(10.0, 0.0, 0.0, 0.0), (0.0, 10.0, 10.0, 10.0)]);
        let outcome = detect(&primary, &[other], 15.0).unwrap();
        let json = serde_json::to_value(&outcome).unwrap();
        assert_eq!(json["status"], "conflicts");
        assert_eq!(json["conflicts"][0]["other_mission_idx"], 0);
    }
}
