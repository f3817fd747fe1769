//! Detection configuration from environment.

use anyhow::{anyhow, Context, Result};
use deconflict_core::{DetectionRules, RelativeAnchor, ZeroDurationPolicy};
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    pub rules: DetectionRules,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from an arbitrary variable source. Unset variables take the
    /// defaults; set but unparseable ones are an error.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = DetectionRules::default();
        Ok(Self {
            rules: DetectionRules {
                buffer_m: read_var(&lookup, "DECONFLICT_BUFFER_M", |s| {
                    s.trim().parse::<f64>().map_err(|e| anyhow!(e))
                })?
                .unwrap_or(defaults.buffer_m),
                anchor: read_var(&lookup, "DECONFLICT_ANCHOR", |s| {
                    parse_anchor(s).ok_or_else(|| {
                        anyhow!("expected segment-start or overlap-start, got '{s}'")
                    })
                })?
                .unwrap_or(defaults.anchor),
                zero_duration: read_var(&lookup, "DECONFLICT_ZERO_DURATION", |s| {
                    parse_zero_duration(s)
                        .ok_or_else(|| anyhow!("expected skip or stationary, got '{s}'"))
                })?
                .unwrap_or(defaults.zero_duration),
            },
        })
    }
}

fn read_var<F, T, P>(lookup: &F, key: &str, parse: P) -> Result<Option<T>>
where
    F: Fn(&str) -> Option<String>,
    P: FnOnce(&str) -> Result<T>,
{
    lookup(key)
        .map(|value| parse(&value).with_context(|| format!("invalid {key}")))
        .transpose()
}

pub fn parse_anchor(value: &str) -> Option<RelativeAnchor> {
    match value.trim().to_ascii_lowercase().as_str() {
        "segment-start" => Some(RelativeAnchor::SegmentStart),
        "overlap-start" => Some(RelativeAnchor::OverlapStart),
        _ => None,
    }
}

pub fn parse_zero_duration(value: &str) -> Option<ZeroDurationPolicy> {
    match value.trim().to_ascii_lowercase().as_str() {
        "skip" => Some(ZeroDurationPolicy::Skip),
        "stationary" => Some(ZeroDurationPolicy::Stationary),
        _ => None,
    }
}
