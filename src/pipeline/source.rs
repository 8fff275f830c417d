//! Platform adapter abstraction for landmark frame ingestion.
//!
//! The pipeline core never talks to a camera or body tracker directly. A host
//! platform implements [`PlatformAdapter`]; this module also ships the
//! adapters used by the CLI and tests: JSONL replay and stdin.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::Mutex;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader, Lines, Stdin};

use crate::types::{LandmarkFrame, Measurement};

/// Platform precondition failure reported at session start.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum PreflightError {
    #[error("no host activity is available")]
    NoActivity,
    #[error("camera permission denied")]
    CameraPermissionDenied,
    #[error("AR body tracking is not supported on this device")]
    ArNotSupported,
}

/// Trait abstracting the host platform's body tracker.
///
/// The session shares one adapter between the sampling loop and its own
/// operations, so methods take `&self`; implementations keep mutable state
/// behind their own locks.
#[async_trait]
pub trait PlatformAdapter: Send + Sync + 'static {
    /// Pull the latest tracked frame.
    ///
    /// `Ok(None)` means nothing was tracked this tick and the tick is skipped.
    /// `Err` is a processing failure and goes to recovery.
    async fn poll_frame(&self) -> Result<Option<LandmarkFrame>>;

    /// Push notification for every accepted measurement.
    fn on_measurement_update(&self, _measurement: &Measurement) {}

    /// Platform preconditions checked by `start_session`.
    fn preflight(&self) -> std::result::Result<(), PreflightError> {
        Ok(())
    }

    /// True once the adapter will never yield another frame.
    fn is_exhausted(&self) -> bool {
        false
    }

    /// Human-readable name for logging (e.g. "replay", "stdin", "synthetic").
    fn adapter_name(&self) -> &str;
}

// ============================================================================
// Replay Source (pre-recorded frames)
// ============================================================================

/// Replays pre-loaded frames, one per poll.
///
/// `None` entries reproduce ticks where the tracker saw nothing.
pub struct ReplaySource {
    frames: Mutex<VecDeque<Option<LandmarkFrame>>>,
}

impl ReplaySource {
    pub fn new(frames: Vec<LandmarkFrame>) -> Self {
        Self::with_gaps(frames.into_iter().map(Some).collect())
    }

    pub fn with_gaps(frames: Vec<Option<LandmarkFrame>>) -> Self {
        Self {
            frames: Mutex::new(frames.into()),
        }
    }

    /// Parse a JSONL recording; blank lines and `null` lines are empty polls.
    pub fn from_jsonl(content: &str) -> Result<Self> {
        let mut frames = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let frame: Option<LandmarkFrame> = serde_json::from_str(line)
                .with_context(|| format!("line {}: invalid landmark frame", i + 1))?;
            frames.push(frame);
        }
        Ok(Self::with_gaps(frames))
    }

    pub fn from_jsonl_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read replay file {}", path.display()))?;
        let source = Self::from_jsonl(&content)
            .with_context(|| format!("Failed to parse replay file {}", path.display()))?;
        tracing::info!(path = %path.display(), frames = source.remaining(), "Loaded replay recording");
        Ok(source)
    }

    pub fn remaining(&self) -> usize {
        self.frames.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl PlatformAdapter for ReplaySource {
    async fn poll_frame(&self) -> Result<Option<LandmarkFrame>> {
        let next = self.frames.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        Ok(next.flatten())
    }

    fn is_exhausted(&self) -> bool {
        self.remaining() == 0
    }

    fn adapter_name(&self) -> &str {
        "replay"
    }
}

// ============================================================================
// Stdin Source (JSON landmark frames, one per line)
// ============================================================================

/// Reads JSON landmark frames from stdin.
///
/// Used with the simulation harness:
/// `./simulation --scenario steady | ./fitform-ar --stdin`
///
/// Each poll consumes at most one line; malformed lines are logged and
/// treated as empty polls.
pub struct StdinSource {
    lines: tokio::sync::Mutex<Lines<BufReader<Stdin>>>,
    eof: std::sync::atomic::AtomicBool,
}

impl StdinSource {
    pub fn new() -> Self {
        Self {
            lines: tokio::sync::Mutex::new(BufReader::new(tokio::io::stdin()).lines()),
            eof: std::sync::atomic::AtomicBool::new(false),
        }
    }
}

impl Default for StdinSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlatformAdapter for StdinSource {
    async fn poll_frame(&self) -> Result<Option<LandmarkFrame>> {
        use std::sync::atomic::Ordering;

        if self.eof.load(Ordering::Acquire) {
            return Ok(None);
        }
        let line = self.lines.lock().await.next_line().await?;
        let Some(line) = line else {
            tracing::info!("[StdinSource] End of input");
            self.eof.store(true, Ordering::Release);
            return Ok(None);
        };

        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        match serde_json::from_str::<LandmarkFrame>(line) {
            Ok(frame) => Ok(Some(frame)),
            Err(e) => {
                tracing::warn!("[StdinSource] Failed to parse frame: {}", e);
                Ok(None)
            }
        }
    }

    fn is_exhausted(&self) -> bool {
        self.eof.load(std::sync::atomic::Ordering::Acquire)
    }

    fn adapter_name(&self) -> &str {
        "stdin"
    }
}
