//! Landmark Frame Simulation
//!
//! Generates synthetic body-tracker frames for exercising fitform-ar without
//! a camera. Frames are written to stdout as JSON lines; `null` lines are
//! empty polls.
//!
//! Scenarios:
//! - steady, too_close, no_plane, dropout, partial_body
//! - full: a scripted capture that walks through the failure scenarios
//!   before settling into a steady scan
//!
//! # Usage
//! ```bash
//! ./simulation --scenario full --frames 300 | ./fitform-ar --stdin
//! ```

use std::io::{self, Write};
use std::time::{Duration, Instant};

use clap::Parser;

use fitform_ar::pipeline::synthetic::{BodyProfile, FrameGenerator, Scenario, DEFAULT_JITTER_M};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "fitform-simulation")]
#[command(about = "Synthetic landmark frames for FitForm AR testing")]
#[command(version = "1.0")]
struct Args {
    /// Number of polls to emit
    #[arg(short = 'n', long, default_value = "300", value_parser = clap::value_parser!(u64).range(1..=1_000_000))]
    frames: u64,

    /// Output rate in frames per second (0 = as fast as possible)
    #[arg(short, long, default_value = "10")]
    rate: u32,

    /// Scenario: steady, too_close, no_plane, dropout, partial_body, or full
    #[arg(long, default_value = "full")]
    scenario: String,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,

    /// Per-coordinate jitter standard deviation (m)
    #[arg(long, default_value_t = DEFAULT_JITTER_M)]
    jitter_m: f64,

    /// Simulated shoulder width (cm)
    #[arg(long, default_value = "44")]
    shoulder_width_cm: f64,

    /// Simulated height (cm)
    #[arg(long, default_value = "171")]
    height_cm: f64,

    /// Simulated distance from the camera (m)
    #[arg(long, default_value = "2.0")]
    distance_m: f64,

    /// Suppress the capture log (only output frames)
    #[arg(short, long)]
    quiet: bool,
}

// ============================================================================
// Scripted Capture Phases
// ============================================================================

/// Phase of the `full` scripted capture, chosen by progress through the run.
fn scripted_scenario(progress: f64) -> Scenario {
    match progress {
        p if p < 0.10 => Scenario::NoPlane,
        p if p < 0.20 => Scenario::TooClose,
        p if p < 0.30 => Scenario::PartialBody,
        p if p < 0.45 => Scenario::Dropout,
        _ => Scenario::Steady,
    }
}

fn phase_description(scenario: Scenario) -> &'static str {
    match scenario {
        Scenario::NoPlane => "Scanning for floor (no plane lock)",
        Scenario::TooClose => "User standing too close",
        Scenario::PartialBody => "Legs out of frame",
        Scenario::Dropout => "Tracker dropping frames",
        Scenario::Steady => "Steady full-body capture",
    }
}

fn log_capture(frame: u64, message: &str, quiet: bool) {
    if !quiet {
        eprintln!("[frame {:>6}] {}", frame, message);
    }
}

// ============================================================================
// Main
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let scripted = args.scenario.eq_ignore_ascii_case("full");
    let initial = if scripted {
        scripted_scenario(0.0)
    } else {
        args.scenario.parse::<Scenario>()?
    };
    let profile = BodyProfile {
        shoulder_width_m: args.shoulder_width_cm / 100.0,
        height_m: args.height_cm / 100.0,
        distance_m: args.distance_m,
    };

    // One generator per scenario so each keeps its own deterministic stream
    let mut generators = Vec::new();
    for (i, scenario) in Scenario::ALL.into_iter().enumerate() {
        let seed = args.seed.map(|s| s.wrapping_add(i as u64));
        generators.push(FrameGenerator::with_jitter(scenario, profile, args.jitter_m, seed)?);
    }

    let interval = if args.rate == 0 {
        None
    } else {
        Some(Duration::from_secs_f64(1.0 / f64::from(args.rate)))
    };

    log_capture(
        0,
        &format!(
            "Simulating {} polls ({}) at {} Hz, body {:.0} cm / {:.0} cm at {:.1} m",
            args.frames,
            if scripted { "full" } else { initial.name() },
            args.rate,
            args.shoulder_width_cm,
            args.height_cm,
            args.distance_m
        ),
        args.quiet,
    );

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let mut current = initial;
    let mut empty_polls = 0u64;
    log_capture(0, phase_description(current), args.quiet);

    for n in 0..args.frames {
        let loop_start = Instant::now();

        if scripted {
            let next = scripted_scenario(n as f64 / args.frames as f64);
            if next != current {
                current = next;
                log_capture(n, phase_description(current), args.quiet);
            }
        }

        let generator = generators
            .iter_mut()
            .find(|g| g.scenario() == current)
            .ok_or("no generator for scenario")?;
        let frame = generator.next_frame();
        if frame.is_none() {
            empty_polls += 1;
        }
        writeln!(out, "{}", serde_json::to_string(&frame)?)?;
        out.flush()?;

        if let Some(interval) = interval {
            let elapsed = loop_start.elapsed();
            if elapsed < interval {
                std::thread::sleep(interval - elapsed);
            }
        }
    }

    log_capture(
        args.frames,
        &format!("Done: {} polls, {} empty", args.frames, empty_polls),
        args.quiet,
    );
    Ok(())
}
