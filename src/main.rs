//! FitForm AR - measurement session host
//!
//! Runs one measurement session against a landmark frame source and logs
//! every published measurement.
//!
//! # Usage
//!
//! ```bash
//! # Synthetic body (default)
//! cargo run --release -- --duration-secs 10 --mark-scans
//!
//! # Frames from the simulation harness
//! ./simulation --scenario dropout | ./fitform-ar --stdin
//!
//! # Replay a JSONL recording with a live-reloaded config
//! ./fitform-ar --replay scan.jsonl --config fitform.toml --watch-config
//! ```
//!
//! # Environment Variables
//!
//! - `FITFORM_CONFIG`: Path to pipeline config TOML (default: ./fitform.toml)
//! - `RUST_LOG`: Logging level (default: info)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{broadcast, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use fitform_ar::config::watcher::{run_config_watcher, ConfigEvent};
use fitform_ar::pipeline::synthetic::{BodyProfile, FrameGenerator, Scenario, SyntheticSource};
use fitform_ar::{DeviceTier, PipelineConfig, PlatformAdapter, ReplaySource, Session, StdinSource};

/// How often the host checks whether a finite source has run dry.
const EXHAUSTION_POLL: Duration = Duration::from_millis(250);

/// Accepted measurements to see before marking the front scan (and again
/// before the side scan) with `--mark-scans`.
const MEASUREMENTS_PER_SCAN: u64 = 10;

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "fitform-ar")]
#[command(about = "FitForm AR body-measurement session host")]
#[command(version)]
struct CliArgs {
    /// Read landmark frames from stdin (one JSON frame per line)
    /// Use with simulator: ./simulation | ./fitform-ar --stdin
    #[arg(long, conflicts_with = "replay")]
    stdin: bool,

    /// Replay landmark frames from a JSONL recording
    #[arg(long, value_name = "FILE")]
    replay: Option<PathBuf>,

    /// Pipeline config TOML (default: $FITFORM_CONFIG, then ./fitform.toml)
    #[arg(short, long, env = "FITFORM_CONFIG")]
    config: Option<PathBuf>,

    /// Re-read the config file when it changes and apply it to the running session
    #[arg(long, requires = "config")]
    watch_config: bool,

    /// Device tier used to pick the base frame interval (high_end, mid_range, low_end)
    #[arg(long)]
    device_tier: Option<DeviceTier>,

    /// Stop after this many seconds (default: until Ctrl+C or end of input)
    #[arg(long)]
    duration_secs: Option<u64>,

    /// Mark the front and then the side scan completed as measurements arrive
    #[arg(long)]
    mark_scans: bool,

    /// Synthetic scenario when no other source is given
    #[arg(long, default_value = "steady")]
    scenario: Scenario,

    /// Random seed for the synthetic source
    #[arg(long)]
    seed: Option<u64>,

    /// Print each published measurement as a JSON line on stdout
    #[arg(long)]
    json: bool,
}

// ============================================================================
// Setup
// ============================================================================

fn load_config(args: &CliArgs) -> Result<PipelineConfig> {
    let config = match &args.config {
        Some(path) => PipelineConfig::load_from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => PipelineConfig::load(),
    };
    Ok(match args.device_tier {
        Some(tier) => {
            info!(tier = %tier, frame_interval_ms = tier.frame_interval_ms(), "Device tier override");
            config.with_device_tier(tier)
        }
        None => config,
    })
}

fn build_adapter(args: &CliArgs) -> Result<Arc<dyn PlatformAdapter>> {
    if args.stdin {
        info!("Input: stdin (JSON landmark frames)");
        return Ok(Arc::new(StdinSource::new()));
    }
    if let Some(path) = &args.replay {
        info!(path = %path.display(), "Input: JSONL replay");
        return Ok(Arc::new(ReplaySource::from_jsonl_file(path)?));
    }
    info!(scenario = %args.scenario, "Input: synthetic body");
    let generator = FrameGenerator::new(args.scenario, BodyProfile::default(), args.seed)
        .context("Failed to build synthetic frame generator")?;
    Ok(Arc::new(SyntheticSource::new(generator, None)))
}

fn spawn_config_watcher(session: &Session, path: PathBuf, cancel: CancellationToken) {
    let (tx, mut rx) = mpsc::channel(8);
    let target = session.clone();
    tokio::spawn(run_config_watcher(
        path,
        move |config| target.apply_config(config),
        tx,
        cancel,
    ));
    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            match event {
                ConfigEvent::Reloaded(changes) => {
                    info!(changes = changes.len(), "Config reloaded");
                }
                ConfigEvent::Error(e) => warn!(error = %e, "Config reload failed, keeping current config"),
            }
        }
    });
}

// ============================================================================
// Main
// ============================================================================

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let args = CliArgs::parse();

    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");
    info!("  FitForm AR - Body Measurement Session");
    info!("━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━");

    let config = load_config(&args)?;
    let adapter = build_adapter(&args)?;
    let session = Session::new(config, Arc::clone(&adapter)).context("Invalid pipeline configuration")?;

    // Graceful shutdown via Ctrl+C
    let cancel_token = CancellationToken::new();
    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        tokio::signal::ctrl_c().await.ok();
        info!("Received Ctrl+C, stopping session...");
        shutdown_token.cancel();
    });

    if args.watch_config {
        if let Some(path) = args.config.clone() {
            spawn_config_watcher(&session, path, cancel_token.child_token());
        }
    }

    let mut updates = session.subscribe();
    session
        .start_session()
        .with_context(|| format!("Failed to start session on {}", adapter.adapter_name()))?;
    session.start_real_time_processing()?;

    let deadline = args
        .duration_secs
        .map(|s| tokio::time::Instant::now() + Duration::from_secs(s));
    let mut exhaustion_check = tokio::time::interval(EXHAUSTION_POLL);
    let mut published = 0u64;

    loop {
        tokio::select! {
            _ = cancel_token.cancelled() => break,
            _ = async {
                match deadline {
                    Some(d) => tokio::time::sleep_until(d).await,
                    None => std::future::pending().await,
                }
            } => {
                info!("Duration elapsed");
                break;
            }
            _ = exhaustion_check.tick() => {
                if adapter.is_exhausted() {
                    info!(adapter = adapter.adapter_name(), "Frame source exhausted");
                    // Let the tick holding the last frame finish
                    tokio::time::sleep(session.effective_frame_interval()).await;
                    break;
                }
            }
            update = updates.recv() => match update {
                Ok(measurement) => {
                    published += 1;
                    if args.json {
                        println!("{}", serde_json::to_string(&measurement)?);
                    }
                    if args.mark_scans {
                        if published == MEASUREMENTS_PER_SCAN {
                            session.mark_scan_completed("front")?;
                        } else if published == 2 * MEASUREMENTS_PER_SCAN {
                            session.mark_scan_completed("side")?;
                        }
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Measurement listener lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }
    }

    let status = session.get_session_status();
    match session.get_measurements() {
        Ok(m) => info!(
            width_cm = m.shoulder_width_cm,
            height_cm = m.height_cm,
            confidence = m.confidence,
            "Final measurement"
        ),
        Err(e) => warn!(code = e.code(), "{}", e),
    }
    info!(
        published,
        retry_count = status.retry_count,
        scan_status = %status.scan_status,
        "Session summary"
    );
    info!("Session status: {}", serde_json::to_string(&status)?);

    session.stop_session();
    cancel_token.cancel();

    info!("✓ FitForm AR shutdown complete");
    Ok(())
}
