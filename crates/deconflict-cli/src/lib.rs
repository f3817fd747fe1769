//! Deconflict CLI - fixtures, loaders and reporting around the detector.
//!
//! The `deconflict` binary runs a scenario through the detector and prints
//! either a conflict explanation or a sampled position timeline.

pub mod config;
pub mod loader;
pub mod report;
pub mod scenarios;

pub use config::Config;
pub use scenarios::Scenario;
