//! Measurement Session
//!
//! A [`Session`] owns everything one AR measurement run needs: the active
//! configuration, the pipeline buffers, recovery bookkeeping, scan progress,
//! and the sampling loop. There is no process-wide state; clone the session
//! to share it.
//!
//! ## Concurrency
//!
//! - The sampling loop is the only writer of pipeline buffers.
//! - Queries read the current measurement and config through `arc-swap`.
//! - Buffers sit behind short-held `std::sync::Mutex` locks that are never
//!   held across an `.await`.
//! - Delayed recovery work carries the session epoch it was scheduled in and
//!   is dropped if the session has been stopped or restarted since.

mod error;
mod status;

pub use error::SessionError;
pub use status::SessionStatus;

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use arc_swap::{ArcSwap, ArcSwapOption};
use async_trait::async_trait;
use chrono::Utc;
use futures::FutureExt;
use tokio::sync::broadcast;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::defaults::MEASUREMENT_CHANNEL_CAPACITY;
use crate::config::{ConfigChange, ConfigError, ConfigOverrides, PipelineConfig};
use crate::pipeline::processing_loop::{LoopExit, SamplingLoop, TickDriver};
use crate::pipeline::{
    FrameIntervalTuner, FrameOutcome, MeasurementPipeline, PipelineError, PlatformAdapter,
    RecoveryCategory, RecoveryDecision, RecoveryManager, RecoveryPhase,
};
use crate::types::{ConfidenceFactors, Measurement, ScanProgress, ScanStatus, ScanType};

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|e| e.into_inner())
}

// ============================================================================
// Session
// ============================================================================

/// Handle to one measurement session. Cheap to clone.
#[derive(Clone)]
pub struct Session {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    weak_self: Weak<SessionInner>,
    adapter: Arc<dyn PlatformAdapter>,

    config: ArcSwap<PipelineConfig>,
    /// Serializes config writers so a diff is always against the value replaced.
    config_writer: Mutex<()>,

    active: AtomicBool,
    realtime: AtomicBool,
    /// Bumped on every session start and stop.
    epoch: AtomicU64,
    /// Set by the realtime mitigation, consumed by its delayed re-arm.
    rearm_pending: AtomicBool,
    ticking: AtomicBool,

    current: ArcSwapOption<Measurement>,
    last_frame: ArcSwapOption<Measurement>,
    scans: Mutex<ScanProgress>,
    pipeline: Mutex<MeasurementPipeline>,
    recovery: Mutex<RecoveryManager>,
    timing: Mutex<FrameTiming>,
    loop_cancel: Mutex<Option<CancellationToken>>,
    updates: broadcast::Sender<Measurement>,
}

#[derive(Default)]
struct FrameTiming {
    last_processed: Option<Instant>,
    tuner: FrameIntervalTuner,
}

impl Session {
    /// Create an inactive session. The config is validated first.
    pub fn new(config: PipelineConfig, adapter: Arc<dyn PlatformAdapter>) -> Result<Self, SessionError> {
        config.validate()?;

        let pipeline = MeasurementPipeline::new(&config);
        let recovery = RecoveryManager::new(&config.recovery);
        let (updates, _) = broadcast::channel(MEASUREMENT_CHANNEL_CAPACITY);

        let inner = Arc::new_cyclic(|weak_self| SessionInner {
            weak_self: weak_self.clone(),
            adapter,
            config: ArcSwap::from_pointee(config),
            config_writer: Mutex::new(()),
            active: AtomicBool::new(false),
            realtime: AtomicBool::new(false),
            epoch: AtomicU64::new(0),
            rearm_pending: AtomicBool::new(false),
            ticking: AtomicBool::new(false),
            current: ArcSwapOption::empty(),
            last_frame: ArcSwapOption::empty(),
            scans: Mutex::new(ScanProgress::default()),
            pipeline: Mutex::new(pipeline),
            recovery: Mutex::new(recovery),
            timing: Mutex::new(FrameTiming::default()),
            loop_cancel: Mutex::new(None),
            updates,
        });
        Ok(Self { inner })
    }

    // ========================================================================
    // Lifecycle
    // ========================================================================

    /// Start the session. Idempotent; platform preconditions are checked
    /// first and nothing changes if they fail.
    pub fn start_session(&self) -> Result<(), SessionError> {
        let inner = &self.inner;
        if inner.active.load(Ordering::SeqCst) {
            debug!("AR session already active");
            return Ok(());
        }

        inner.adapter.preflight()?;
        inner.reset_state();
        inner.epoch.fetch_add(1, Ordering::SeqCst);
        if inner
            .active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            info!(adapter = inner.adapter.adapter_name(), "AR session started");
        }
        Ok(())
    }

    /// Stop the session and clear all pipeline state. Always succeeds.
    pub fn stop_session(&self) {
        let inner = &self.inner;
        let was_active = inner.active.swap(false, Ordering::SeqCst);
        inner.rearm_pending.store(false, Ordering::SeqCst);
        inner.stop_loop();
        inner.epoch.fetch_add(1, Ordering::SeqCst);
        inner.reset_state();
        if was_active {
            info!("AR session stopped");
        }
    }

    /// Start the sampling loop. Returns immediately; a running loop is left as is.
    pub fn start_real_time_processing(&self) -> Result<(), SessionError> {
        self.require_active()?;
        self.inner.rearm_pending.store(false, Ordering::SeqCst);
        self.inner.spawn_loop()
    }

    pub fn stop_real_time_processing(&self) -> Result<(), SessionError> {
        self.require_active()?;
        self.inner.rearm_pending.store(false, Ordering::SeqCst);
        if self.inner.stop_loop() {
            info!("Real-time processing stopped");
        }
        Ok(())
    }

    // ========================================================================
    // Queries
    // ========================================================================

    /// Latest accepted measurement.
    pub fn get_measurements(&self) -> Result<Measurement, SessionError> {
        self.require_active()?;
        self.inner
            .current
            .load_full()
            .map(|m| (*m).clone())
            .ok_or(SessionError::NoMeasurements)
    }

    pub fn get_session_status(&self) -> SessionStatus {
        let inner = &self.inner;
        let is_active = inner.active.load(Ordering::SeqCst);
        let scans = *lock(&inner.scans);
        SessionStatus {
            is_active,
            is_real_time_processing: inner.realtime.load(Ordering::SeqCst),
            has_valid_measurements: inner.current.load().is_some(),
            retry_count: lock(&inner.recovery).total_attempts(),
            front_scan_completed: scans.front_scan_completed,
            side_scan_completed: scans.side_scan_completed,
            scan_status: if is_active { scans.status() } else { ScanStatus::Idle },
        }
    }

    /// Result of the most recently processed frame, accepted or not.
    ///
    /// Rejected frames carry the user-facing `error_reason`.
    pub fn last_frame_result(&self) -> Option<Measurement> {
        self.inner.last_frame.load_full().map(|m| (*m).clone())
    }

    /// Factor breakdown behind the latest scored confidence.
    pub fn confidence_factors(&self) -> ConfidenceFactors {
        lock(&self.inner.pipeline).factors()
    }

    pub fn is_active(&self) -> bool {
        self.inner.active.load(Ordering::SeqCst)
    }

    pub fn is_real_time_processing(&self) -> bool {
        self.inner.realtime.load(Ordering::SeqCst)
    }

    /// (smoothing, consistency) buffer lengths.
    pub fn buffer_lengths(&self) -> (usize, usize) {
        let pipeline = lock(&self.inner.pipeline);
        (pipeline.smoothing_len(), pipeline.consistency_len())
    }

    pub fn recovery_phase(&self, category: RecoveryCategory) -> RecoveryPhase {
        lock(&self.inner.recovery).phase(category)
    }

    pub fn recovery_attempts(&self, category: RecoveryCategory) -> u32 {
        lock(&self.inner.recovery).attempts(category)
    }

    /// Frame interval the next due check will use.
    pub fn effective_frame_interval(&self) -> Duration {
        let config = self.inner.config.load();
        let timing = lock(&self.inner.timing);
        frame_interval(&config, &timing.tuner)
    }

    pub fn config(&self) -> Arc<PipelineConfig> {
        self.inner.config.load_full()
    }

    pub fn adapter_name(&self) -> &str {
        self.inner.adapter.adapter_name()
    }

    /// Receiver for every accepted measurement.
    pub fn subscribe(&self) -> broadcast::Receiver<Measurement> {
        self.inner.updates.subscribe()
    }

    // ========================================================================
    // Scans
    // ========================================================================

    /// Mark `"front"` or `"side"` as completed and refresh the current
    /// measurement's scan flags.
    pub fn mark_scan_completed(&self, scan_type: &str) -> Result<ScanProgress, SessionError> {
        let scan = ScanType::parse(scan_type)
            .ok_or_else(|| SessionError::InvalidScanType(scan_type.to_string()))?;
        self.require_active()?;

        let mut scans = lock(&self.inner.scans);
        scans.mark(scan);
        let progress = *scans;
        self.inner
            .current
            .rcu(|current| current.as_ref().map(|m| Arc::new(m.with_scan_progress(progress))));
        drop(scans);

        info!(scan = %scan, status = %progress.status(), "Scan marked completed");
        Ok(progress)
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    /// Merge a JSON option payload onto the current config.
    ///
    /// Unknown keys, wrong types, and invalid merged values are rejected
    /// with `CONFIG_ERROR` and leave the config untouched.
    pub fn load_configuration(&self, options: &str) -> Result<Vec<ConfigChange>, SessionError> {
        let overrides = ConfigOverrides::from_json(options)?;
        self.apply_overrides(&overrides)
    }

    pub fn apply_overrides(&self, overrides: &ConfigOverrides) -> Result<Vec<ConfigChange>, SessionError> {
        let _writer = lock(&self.inner.config_writer);
        let current = self.inner.config.load_full();
        let next = overrides.apply_to(&current)?;
        Ok(self.inner.swap_config(&current, next))
    }

    /// Replace the whole config (used by the file watcher).
    pub fn apply_config(&self, config: PipelineConfig) -> Result<Vec<ConfigChange>, ConfigError> {
        config.validate()?;
        let _writer = lock(&self.inner.config_writer);
        let current = self.inner.config.load_full();
        Ok(self.inner.swap_config(&current, config))
    }

    fn require_active(&self) -> Result<(), SessionError> {
        if self.inner.active.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(SessionError::SessionInactive)
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("adapter", &self.inner.adapter.adapter_name())
            .field("status", &self.get_session_status())
            .finish()
    }
}

fn frame_interval(config: &PipelineConfig, tuner: &FrameIntervalTuner) -> Duration {
    let base = config.timing.frame_processing_interval_ms;
    let ms = if config.timing.adaptive_interval {
        tuner.effective_interval_ms(base)
    } else {
        base
    };
    Duration::from_millis(ms)
}

// ============================================================================
// Internals
// ============================================================================

impl SessionInner {
    fn is_current(&self, epoch: u64) -> bool {
        self.epoch.load(Ordering::SeqCst) == epoch
    }

    fn reset_state(&self) {
        lock(&self.pipeline).clear();
        lock(&self.recovery).clear();
        *lock(&self.timing) = FrameTiming::default();
        *lock(&self.scans) = ScanProgress::default();
        self.current.store(None);
        self.last_frame.store(None);
    }

    fn swap_config(&self, current: &PipelineConfig, next: PipelineConfig) -> Vec<ConfigChange> {
        let changes = current.diff(&next);
        lock(&self.recovery).reconfigure(&next.recovery);
        self.config.store(Arc::new(next));

        if changes.is_empty() {
            debug!("Configuration reloaded with no changes");
        }
        for change in &changes {
            info!(key = %change.key, old = %change.old_value, new = %change.new_value, "Configuration changed");
        }
        changes
    }

    fn spawn_loop(&self) -> Result<(), SessionError> {
        let handle = tokio::runtime::Handle::try_current().map_err(|_| SessionError::RuntimeUnavailable)?;
        if self.realtime.swap(true, Ordering::SeqCst) {
            debug!("Real-time processing already running");
            return Ok(());
        }

        let token = CancellationToken::new();
        if let Some(previous) = lock(&self.loop_cancel).replace(token.clone()) {
            previous.cancel();
        }
        let weak = self.weak_self.clone();
        handle.spawn(async move {
            let (exit, _) = SamplingLoop::new(weak.clone(), token.clone()).run().await;
            if exit != LoopExit::Cancelled {
                if let Some(inner) = weak.upgrade() {
                    inner.on_loop_exit(&token, exit);
                }
            }
        });

        let config = self.config.load();
        info!(
            adapter = self.adapter.adapter_name(),
            tick_ms = config.timing.tick_interval_ms,
            frame_interval_ms = config.timing.frame_processing_interval_ms,
            "Real-time processing started"
        );
        Ok(())
    }

    /// Clear the loop flag and cancel the task. True if a loop was running.
    fn stop_loop(&self) -> bool {
        let was_running = self.realtime.swap(false, Ordering::SeqCst);
        if let Some(token) = lock(&self.loop_cancel).take() {
            token.cancel();
        }
        was_running
    }

    /// A loop that ended on its own no longer counts as running. Loops that
    /// were replaced or stopped have their token cancelled and are ignored.
    fn on_loop_exit(&self, token: &CancellationToken, exit: LoopExit) {
        let mut slot = lock(&self.loop_cancel);
        if token.is_cancelled() {
            return;
        }
        slot.take();
        token.cancel();
        if self.realtime.swap(false, Ordering::SeqCst) {
            warn!(exit = ?exit, "Sampling loop ended on its own, real-time processing cleared");
        }
    }

    // ------------------------------------------------------------------------
    // Tick
    // ------------------------------------------------------------------------

    /// Run one tick, turning a panic anywhere inside it into a
    /// `realtime_processing` failure.
    async fn guarded_tick(&self) {
        let epoch = self.epoch.load(Ordering::SeqCst);
        if let Err(payload) = AssertUnwindSafe(self.run_tick()).catch_unwind().await {
            let message = panic_message(payload.as_ref());
            error!(panic = %message, "Tick panicked");
            self.handle_failure(PipelineError::Source(format!("tick panicked: {message}")), epoch);
        }
    }

    async fn run_tick(&self) {
        let Some(_guard) = TickGuard::acquire(&self.ticking) else {
            debug!("Previous tick still running, skipping");
            return;
        };
        if !self.is_running() {
            return;
        }
        let epoch = self.epoch.load(Ordering::SeqCst);
        let config = self.config.load_full();

        let started = Instant::now();
        {
            let mut timing = lock(&self.timing);
            let interval = frame_interval(&config, &timing.tuner);
            if let Some(last) = timing.last_processed {
                if started.duration_since(last) < interval {
                    return;
                }
            }
            timing.last_processed = Some(started);
        }

        let frame = match self.adapter.poll_frame().await {
            Ok(Some(frame)) => frame,
            Ok(None) => {
                debug!("No frame this tick");
                return;
            }
            Err(e) => {
                self.handle_failure(PipelineError::from(e), epoch);
                return;
            }
        };

        let timestamp_ms = Utc::now().timestamp_millis();
        let outcome = {
            let mut pipeline = lock(&self.pipeline);
            if !self.is_current(epoch) {
                debug!("Session restarted mid-tick, dropping frame");
                return;
            }
            pipeline.reconfigure(&config);
            pipeline.process(&frame, &config, timestamp_ms)
        };
        lock(&self.timing).tuner.record(started.elapsed());

        match outcome {
            Ok(outcome) => {
                let reset = lock(&self.recovery).record_success();
                if !reset.is_empty() {
                    info!(categories = ?reset, "[Recovery] Tick succeeded, recovery counters reset");
                }
                self.publish(outcome, epoch);
            }
            Err(e) => self.handle_failure(e, epoch),
        }
    }

    fn publish(&self, outcome: FrameOutcome, epoch: u64) {
        let accepted = outcome.is_accepted();
        let previous_reason = self.last_frame.load_full().and_then(|m| m.error_reason.clone());

        let measurement = {
            let scans = lock(&self.scans);
            if !self.is_current(epoch) || !self.active.load(Ordering::SeqCst) {
                return;
            }
            let stamped = Arc::new(outcome.measurement().with_scan_progress(*scans));
            if accepted {
                self.current.store(Some(Arc::clone(&stamped)));
            }
            self.last_frame.store(Some(Arc::clone(&stamped)));
            stamped
        };

        match &outcome {
            FrameOutcome::Accepted(_) => {
                info!(
                    width_cm = measurement.shoulder_width_cm,
                    height_cm = measurement.height_cm,
                    confidence = measurement.confidence,
                    scan_status = %measurement.scan_status,
                    "Measurement published"
                );
                // No subscribers is fine
                let _ = self.updates.send((*measurement).clone());
                self.adapter.on_measurement_update(&measurement);
            }
            FrameOutcome::Held { verdict, .. } => {
                debug!(%verdict, confidence = measurement.confidence, "Measurement held back");
            }
            FrameOutcome::Rejected(_) => {
                if measurement.error_reason != previous_reason {
                    warn!(
                        reason = measurement.error_reason.as_deref().unwrap_or(""),
                        "Frame rejected"
                    );
                }
            }
        }
    }

    // ------------------------------------------------------------------------
    // Recovery
    // ------------------------------------------------------------------------

    fn handle_failure(&self, err: PipelineError, epoch: u64) {
        if !self.is_current(epoch) {
            return;
        }
        let category = err.category();
        let decision = lock(&self.recovery).on_failure(category, Utc::now().timestamp_millis());

        match decision {
            RecoveryDecision::Retry { attempt, retry_after } => {
                warn!(
                    category = %category,
                    attempt,
                    retry_after_ms = retry_after.as_millis() as u64,
                    error = %err,
                    "[Recovery] Tick failed, applying mitigation"
                );
                self.mitigate(category);
                if category == RecoveryCategory::RealtimeProcessing {
                    self.schedule(retry_after, epoch, SessionInner::rearm);
                }
            }
            RecoveryDecision::Exhausted { reset_after, generation } => {
                error!(
                    category = %category,
                    reset_after_ms = reset_after.as_millis() as u64,
                    error = %err,
                    "[Recovery] Max recovery attempts reached, waiting for extended cooldown"
                );
                self.schedule(reset_after, epoch, move |inner| {
                    if lock(&inner.recovery).expire(category, generation) {
                        info!(category = %category, "[Recovery] Extended cooldown elapsed, attempts reset");
                    }
                });
            }
            RecoveryDecision::AlreadyExhausted => {
                debug!(category = %category, error = %err, "[Recovery] Still exhausted");
            }
        }
    }

    fn mitigate(&self, category: RecoveryCategory) {
        match category {
            RecoveryCategory::RealtimeProcessing => {
                self.rearm_pending.store(true, Ordering::SeqCst);
                self.stop_loop();
                let mut pipeline = lock(&self.pipeline);
                pipeline.clear_smoothing();
                pipeline.clear_consistency();
            }
            RecoveryCategory::MultiFrameValidation => lock(&self.pipeline).clear_consistency(),
            RecoveryCategory::ConfidenceCalculation => lock(&self.pipeline).clear_factors(),
        }
    }

    fn rearm(&self) {
        if !self.rearm_pending.swap(false, Ordering::SeqCst) {
            debug!("[Recovery] Re-arm superseded by an explicit start or stop");
            return;
        }
        if !self.active.load(Ordering::SeqCst) {
            return;
        }
        match self.spawn_loop() {
            Ok(()) => info!("[Recovery] Real-time processing re-armed"),
            Err(e) => warn!(error = %e, "[Recovery] Could not re-arm real-time processing"),
        }
    }

    /// Run `work` after `delay` unless the session epoch changed meanwhile.
    fn schedule<F>(&self, delay: Duration, epoch: u64, work: F)
    where
        F: FnOnce(&SessionInner) + Send + 'static,
    {
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            warn!("[Recovery] No runtime available, delayed recovery work dropped");
            return;
        };
        let weak = self.weak_self.clone();
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(inner) = weak.upgrade() else {
                return;
            };
            if !inner.is_current(epoch) {
                debug!("[Recovery] Discarding delayed work from an earlier session");
                return;
            }
            work(&inner);
        });
    }
}

#[async_trait]
impl TickDriver for SessionInner {
    fn is_running(&self) -> bool {
        self.active.load(Ordering::SeqCst) && self.realtime.load(Ordering::SeqCst)
    }

    fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.config.load().timing.tick_interval_ms)
    }

    async fn tick(&self) {
        self.guarded_tick().await;
    }

    fn driver_name(&self) -> &str {
        self.adapter.adapter_name()
    }
}

impl Drop for SessionInner {
    fn drop(&mut self) {
        if let Some(token) = self.loop_cancel.get_mut().unwrap_or_else(|e| e.into_inner()).take() {
            token.cancel();
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Marks a tick in progress; released on drop, including when the tick
/// future is cancelled.
struct TickGuard<'a>(&'a AtomicBool);

impl<'a> TickGuard<'a> {
    fn acquire(flag: &'a AtomicBool) -> Option<Self> {
        flag.compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| Self(flag))
    }
}

impl Drop for TickGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::ReplaySource;
    use crate::types::{Joint, Landmark, LandmarkFrame, LandmarkSet};

    fn session() -> Session {
        Session::new(PipelineConfig::default(), Arc::new(ReplaySource::new(Vec::new()))).unwrap()
    }

    #[test]
    fn test_operations_require_active_session() {
        let s = session();
        assert_eq!(s.get_measurements().unwrap_err().code(), "SESSION_INACTIVE");
        assert_eq!(s.stop_real_time_processing().unwrap_err().code(), "SESSION_INACTIVE");
        assert_eq!(s.start_real_time_processing().unwrap_err().code(), "SESSION_INACTIVE");
        assert_eq!(s.mark_scan_completed("front").unwrap_err().code(), "SESSION_INACTIVE");
    }

    #[test]
    fn test_start_is_idempotent_and_stop_always_succeeds() {
        let s = session();
        s.stop_session();
        s.start_session().unwrap();
        s.start_session().unwrap();
        assert!(s.is_active());
        assert_eq!(s.get_measurements().unwrap_err().code(), "NO_MEASUREMENTS");
        s.stop_session();
        s.stop_session();
        assert!(!s.is_active());
    }

    #[test]
    fn test_status_scan_flags() {
        let s = session();
        assert_eq!(s.get_session_status().scan_status, ScanStatus::Idle);
        s.start_session().unwrap();
        assert_eq!(s.get_session_status().scan_status, ScanStatus::InProgress);

        assert_eq!(s.mark_scan_completed("diagonal").unwrap_err().code(), "INVALID_SCAN_TYPE");
        s.mark_scan_completed("front").unwrap();
        let status = s.get_session_status();
        assert!(status.front_scan_completed && !status.side_scan_completed);
        assert_eq!(status.scan_status, ScanStatus::InProgress);

        s.mark_scan_completed("side").unwrap();
        assert_eq!(s.get_session_status().scan_status, ScanStatus::Completed);

        s.stop_session();
        let status = s.get_session_status();
        assert_eq!(status.scan_status, ScanStatus::Idle);
        assert!(!status.front_scan_completed);
    }

    #[test]
    fn test_realtime_without_runtime_fails_cleanly() {
        let s = session();
        s.start_session().unwrap();
        assert_eq!(s.start_real_time_processing().unwrap_err().code(), "RUNTIME_UNAVAILABLE");
        assert!(!s.is_real_time_processing());
    }

    #[test]
    fn test_invalid_initial_config_rejected() {
        let mut config = PipelineConfig::default();
        config.thresholds.min_confidence_threshold = 1.5;
        let err = Session::new(config, Arc::new(ReplaySource::new(Vec::new()))).unwrap_err();
        assert_eq!(err.code(), "CONFIG_ERROR");
    }

    #[test]
    fn test_load_configuration_merges_and_reports_changes() {
        let s = session();
        let changes = s
            .load_configuration(r#"{"minConfidenceThreshold": 0.8, "recoveryCooldownMs": 500}"#)
            .unwrap();
        assert_eq!(changes.len(), 2);
        let config = s.config();
        assert!((config.thresholds.min_confidence_threshold - 0.8).abs() < f64::EPSILON);
        assert_eq!(config.recovery.recovery_cooldown_ms, 500);
        assert_eq!(config.validation.smoothing_history_size, 5);
    }

    #[test]
    fn test_load_configuration_errors_leave_config_untouched() {
        let s = session();
        let before = s.config();
        for bad in [
            r#"{"minConfidenceThreshold": 2.0}"#,
            r#"{"minConfidenceTreshold": 0.8}"#,
            r#"{"maxRecoveryAttempts": "three"}"#,
            "not json",
        ] {
            assert_eq!(s.load_configuration(bad).unwrap_err().code(), "CONFIG_ERROR", "{bad}");
        }
        assert_eq!(*s.config(), *before);
    }

    #[test]
    fn test_scoring_failure_clears_only_factors() {
        let s = session();
        s.start_session().unwrap();
        let config = s.config();
        let frame = LandmarkFrame::new(
            0.95,
            LandmarkSet::new()
                .with(Joint::Head, Landmark::new(0.0, 0.80, 2.0))
                .with(Joint::LeftShoulder, Landmark::new(-0.22, 0.45, 2.0))
                .with(Joint::RightShoulder, Landmark::new(0.22, 0.45, 2.0))
                .with(Joint::LeftHip, Landmark::new(-0.15, -0.05, 2.0))
                .with(Joint::RightHip, Landmark::new(0.15, -0.05, 2.0))
                .with(Joint::LeftKnee, Landmark::new(-0.15, -0.45, 2.0))
                .with(Joint::RightKnee, Landmark::new(0.15, -0.45, 2.0))
                .with(Joint::LeftAnkle, Landmark::new(-0.15, -0.91, 2.0))
                .with(Joint::RightAnkle, Landmark::new(0.15, -0.91, 2.0)),
        );
        lock(&s.inner.pipeline).process(&frame, &config, 0).unwrap();
        assert!(s.confidence_factors().base > 0.0);
        assert_eq!(s.buffer_lengths(), (1, 1));

        let epoch = s.inner.epoch.load(Ordering::SeqCst);
        s.inner
            .handle_failure(PipelineError::Scoring("weighted sum not finite".to_string()), epoch);

        assert_eq!(s.confidence_factors(), ConfidenceFactors::default());
        assert_eq!(s.buffer_lengths(), (1, 1));
        assert_eq!(s.recovery_attempts(RecoveryCategory::ConfidenceCalculation), 1);
        assert_eq!(s.recovery_attempts(RecoveryCategory::RealtimeProcessing), 0);
    }

    #[test]
    fn test_stale_failure_is_ignored() {
        let s = session();
        s.start_session().unwrap();
        let stale = s.inner.epoch.load(Ordering::SeqCst);
        s.stop_session();
        s.start_session().unwrap();
        s.inner.handle_failure(PipelineError::Consistency("late".to_string()), stale);
        assert_eq!(s.get_session_status().retry_count, 0);
    }

    #[test]
    fn test_loop_exit_clears_realtime_unless_replaced() {
        let s = session();
        s.start_session().unwrap();

        let token = CancellationToken::new();
        *lock(&s.inner.loop_cancel) = Some(token.clone());
        s.inner.realtime.store(true, Ordering::SeqCst);
        s.inner.on_loop_exit(&token, LoopExit::Stopped);
        assert!(!s.is_real_time_processing());
        assert!(lock(&s.inner.loop_cancel).is_none());

        // A replaced loop has a cancelled token and leaves the new one alone
        let old = CancellationToken::new();
        old.cancel();
        let current = CancellationToken::new();
        *lock(&s.inner.loop_cancel) = Some(current.clone());
        s.inner.realtime.store(true, Ordering::SeqCst);
        s.inner.on_loop_exit(&old, LoopExit::Stopped);
        assert!(s.is_real_time_processing());
        assert!(!current.is_cancelled());
    }

    #[test]
    fn test_panic_message_reads_str_and_string() {
        assert_eq!(panic_message(&"boom"), "boom");
        assert_eq!(panic_message(&String::from("bang")), "bang");
        assert_eq!(panic_message(&42_u32), "non-string panic payload");
    }

    #[test]
    fn test_tick_guard_is_exclusive() {
        let flag = AtomicBool::new(false);
        let first = TickGuard::acquire(&flag);
        assert!(first.is_some());
        assert!(TickGuard::acquire(&flag).is_none());
        drop(first);
        assert!(TickGuard::acquire(&flag).is_some());
    }
}
