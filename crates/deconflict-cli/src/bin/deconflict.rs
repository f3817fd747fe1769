//! Check a primary mission against other traffic.
//!
//! Usage:
//!   cargo run -p deconflict-cli --bin deconflict -- check --scenario conflict --buffer 2
//!   cargo run -p deconflict-cli --bin deconflict -- timeline --file missions.json --frames 50

use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use deconflict_cli::config::{parse_anchor, parse_zero_duration};
use deconflict_cli::{loader, report, scenarios, Config, Scenario};
use deconflict_core::{ConflictDetector, RelativeAnchor, ZeroDurationPolicy};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser, Debug)]
#[command(author, version, about = "Strategic deconfliction for planned drone missions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Detect separation conflicts between the primary and every other mission
    Check {
        #[command(flatten)]
        source: SourceArgs,

        /// Minimum separation (overrides DECONFLICT_BUFFER_M)
        #[arg(long)]
        buffer: Option<f64>,

        /// Relative-position anchor: segment-start or overlap-start
        #[arg(long, value_parser = anchor_arg)]
        anchor: Option<RelativeAnchor>,

        /// Zero-duration segments: skip or stationary
        #[arg(long, value_parser = zero_duration_arg)]
        zero_duration: Option<ZeroDurationPolicy>,

        /// Evaluate segment pairs on the rayon thread pool
        #[arg(long)]
        parallel: bool,

        /// Print the outcome as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print every mission's interpolated position over the scenario's time span
    Timeline {
        #[command(flatten)]
        source: SourceArgs,

        /// Number of steps between the first and last waypoint
        #[arg(long, default_value_t = 20)]
        frames: usize,
    },
}

#[derive(Args, Debug)]
struct SourceArgs {
    /// Built-in scenario (conflict, no-conflict)
    #[arg(long, default_value = "conflict", conflicts_with = "file")]
    scenario: String,

    /// JSON scenario file
    #[arg(long)]
    file: Option<PathBuf>,
}

impl SourceArgs {
    fn load(&self) -> Result<Scenario> {
        match &self.file {
            Some(path) => loader::load_scenario(path),
            None => scenarios::by_name(&self.scenario, Utc::now()),
        }
    }
}

fn anchor_arg(value: &str) -> Result<RelativeAnchor, String> {
    parse_anchor(value)
        .ok_or_else(|| format!("expected segment-start or overlap-start, got '{value}'"))
}

fn zero_duration_arg(value: &str) -> Result<ZeroDurationPolicy, String> {
    parse_zero_duration(value).ok_or_else(|| format!("expected skip or stationary, got '{value}'"))
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .with(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("deconflict=info".parse()?),
        )
        .init();

    let cli = Cli::parse();
    let config = Config::from_env()?;

    match cli.command {
        Command::Check {
            source,
            buffer,
            anchor,
            zero_duration,
            parallel,
            json,
        } => {
            let scenario = source.load()?;
            let mut rules = config.rules;
            if let Some(buffer) = buffer {
                rules.buffer_m = buffer;
            }
            if let Some(anchor) = anchor {
                rules.anchor = anchor;
            }
            if let Some(zero_duration) = zero_duration {
                rules.zero_duration = zero_duration;
            }

            let detector = ConflictDetector::new(rules).context("Invalid detection rules")?;
            tracing::info!(
                scenario = %scenario.name,
                others = scenario.others.len(),
                buffer_m = rules.buffer_m,
                "Checking missions"
            );

            let others = scenario.other_missions();
            let outcome = if parallel {
                detector.detect_parallel(scenario.primary_mission(), &others)
            } else {
                detector.detect(scenario.primary_mission(), &others)
            };

            if json {
                println!("{}", report::to_json(&scenario, rules.buffer_m, &outcome)?);
            } else {
                print!("{}", report::explain(&scenario, &outcome));
            }

            if !outcome.is_clear() {
                tracing::warn!("Detected {} conflict(s)", outcome.len());
            }
            Ok(ExitCode::from(report::exit_status(&outcome)))
        }
        Command::Timeline { source, frames } => {
            let scenario = source.load()?;
            let frames = report::timeline(&scenario, frames);
            print!("{}", report::render_timeline(&scenario, &frames));
            Ok(ExitCode::SUCCESS)
        }
    }
}
