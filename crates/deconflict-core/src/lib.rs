pub mod conflict;
pub mod error;
pub mod models;
pub mod rules;
pub mod spatial;

pub use conflict::{
    detect, ConflictDetector, ConflictRecord, DetectionOutcome, PairEvaluation, PairObserver,
};
pub use error::{DeconflictError, Result};
pub use models::{interpolate, process_start, Mission, Segment, TimeSpec, Waypoint};
pub use rules::{DetectionRules, RelativeAnchor, ZeroDurationPolicy};
pub use spatial::Vec3;
