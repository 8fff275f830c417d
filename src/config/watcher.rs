//! Polling-based config file watcher.
//!
//! Checks the config file's mtime every 2 seconds. When a change is detected,
//! debounces for 500ms (to handle partial writes from editors), then re-reads
//! the file, hands the new config to the caller's `apply` hook, and sends the
//! result via an mpsc channel.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{ConfigChange, ConfigError, PipelineConfig};

/// Events emitted by the config watcher.
#[derive(Debug)]
pub enum ConfigEvent {
    /// Config was successfully reloaded with these changes.
    Reloaded(Vec<ConfigChange>),
    /// Reload was attempted but failed (old config remains active).
    Error(String),
}

/// Interval between mtime checks.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Debounce delay after detecting a change (editors often write in stages).
pub const DEBOUNCE_DELAY: Duration = Duration::from_millis(500);

/// Run the config file watcher loop.
///
/// `apply` receives each successfully parsed config and returns the changes
/// it made (typically `Session::apply_config`). Returns when the
/// channel is closed or `cancel` fires.
pub async fn run_config_watcher<F>(
    path: PathBuf,
    mut apply: F,
    tx: mpsc::Sender<ConfigEvent>,
    cancel: CancellationToken,
) where
    F: FnMut(PipelineConfig) -> Result<Vec<ConfigChange>, ConfigError> + Send,
{
    tracing::info!(path = %path.display(), "Config watcher started");

    let mut last_mtime = get_mtime(&path);

    loop {
        tokio::select! {
            () = cancel.cancelled() => {
                tracing::debug!("Config watcher cancelled");
                return;
            }
            () = tokio::time::sleep(POLL_INTERVAL) => {}
        }

        let Some(current) = get_mtime(&path) else {
            // Only warn on the transition from readable to missing
            if last_mtime.is_some() {
                tracing::warn!(
                    path = %path.display(),
                    "Config file not accessible, keeping current config, will retry"
                );
                last_mtime = None;
            }
            continue;
        };

        let changed = match last_mtime {
            Some(prev) => current != prev,
            None => true,
        };
        if !changed {
            continue;
        }

        tokio::time::sleep(DEBOUNCE_DELAY).await;
        if get_mtime(&path) != Some(current) {
            // Still being written, pick it up next cycle
            continue;
        }
        last_mtime = Some(current);

        let event = match PipelineConfig::load_from_file(&path).and_then(&mut apply) {
            Ok(changes) => {
                for change in &changes {
                    tracing::info!(%change, "Config value changed");
                }
                ConfigEvent::Reloaded(changes)
            }
            Err(e) => {
                tracing::error!(error = %e, "Config hot-reload failed, keeping previous config");
                ConfigEvent::Error(e.to_string())
            }
        };

        if tx.send(event).await.is_err() {
            tracing::debug!("Config watcher channel closed, stopping");
            return;
        }
    }
}

/// Read the modification time of a file, returning None on any error.
fn get_mtime(path: &Path) -> Option<SystemTime> {
    std::fs::metadata(path).ok().and_then(|m| m.modified().ok())
}
