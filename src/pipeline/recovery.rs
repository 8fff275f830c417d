//! Recovery Manager: bounded per-category retry bookkeeping
//!
//! Pure state machine; the session applies mitigations and schedules the
//! delayed re-arm / reset tasks the decisions ask for.
//!
//! Per category: Idle → Retrying → Exhausted → Idle.
//! - Failure below the cap: attempts += 1, mitigate, re-arm after the cooldown
//! - Failure at the cap: log exhausted, no increment, reset after 2× cooldown
//! - Successful tick: every category back to Idle

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;

use crate::config::defaults::EXHAUSTED_RESET_MULTIPLIER;
use crate::config::RecoveryConfig;

/// A named class of failure with its own retry bookkeeping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RecoveryCategory {
    RealtimeProcessing,
    MultiFrameValidation,
    ConfidenceCalculation,
}

impl RecoveryCategory {
    pub fn name(&self) -> &'static str {
        match self {
            RecoveryCategory::RealtimeProcessing => "realtime_processing",
            RecoveryCategory::MultiFrameValidation => "multi_frame_validation",
            RecoveryCategory::ConfidenceCalculation => "confidence_calculation",
        }
    }
}

impl std::fmt::Display for RecoveryCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryPhase {
    Idle,
    Retrying,
    Exhausted,
}

/// What the caller should do about a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    /// Apply the category mitigation now and re-arm after `retry_after`.
    Retry { attempt: u32, retry_after: Duration },
    /// Cap reached: no mitigation; call [`RecoveryManager::expire`] with
    /// `generation` after `reset_after`.
    Exhausted { reset_after: Duration, generation: u64 },
    /// Cap reached earlier and a reset is already pending.
    AlreadyExhausted,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RecoveryEntry {
    pub attempts: u32,
    pub last_attempt_ms: i64,
    generation: u64,
    reset_pending: bool,
}

#[derive(Debug, Clone)]
pub struct RecoveryManager {
    max_attempts: u32,
    cooldown: Duration,
    entries: BTreeMap<RecoveryCategory, RecoveryEntry>,
}

impl RecoveryManager {
    pub fn new(config: &RecoveryConfig) -> Self {
        Self {
            max_attempts: config.max_recovery_attempts,
            cooldown: Duration::from_millis(config.recovery_cooldown_ms),
            entries: BTreeMap::new(),
        }
    }

    /// Pick up a new retry policy. Existing counters are kept.
    pub fn reconfigure(&mut self, config: &RecoveryConfig) {
        self.max_attempts = config.max_recovery_attempts;
        self.cooldown = Duration::from_millis(config.recovery_cooldown_ms);
    }

    pub fn cooldown(&self) -> Duration {
        self.cooldown
    }

    /// Record a failure in `category` at `now_ms` and decide what to do.
    pub fn on_failure(&mut self, category: RecoveryCategory, now_ms: i64) -> RecoveryDecision {
        let entry = self.entries.entry(category).or_default();

        if entry.attempts < self.max_attempts {
            entry.attempts += 1;
            entry.last_attempt_ms = now_ms;
            return RecoveryDecision::Retry {
                attempt: entry.attempts,
                retry_after: self.cooldown,
            };
        }

        if entry.reset_pending {
            return RecoveryDecision::AlreadyExhausted;
        }
        entry.reset_pending = true;
        RecoveryDecision::Exhausted {
            reset_after: self.cooldown * EXHAUSTED_RESET_MULTIPLIER,
            generation: entry.generation,
        }
    }

    /// Extended cooldown elapsed: reset `category` unless it was reset since.
    ///
    /// Returns true if the counter was cleared.
    pub fn expire(&mut self, category: RecoveryCategory, generation: u64) -> bool {
        match self.entries.get_mut(&category) {
            Some(entry) if entry.generation == generation && entry.reset_pending => {
                Self::reset_entry(entry);
                true
            }
            _ => false,
        }
    }

    /// A tick succeeded: every category with attempts goes back to Idle.
    ///
    /// Returns the categories that were reset.
    pub fn record_success(&mut self) -> Vec<RecoveryCategory> {
        let mut reset = Vec::new();
        for (category, entry) in &mut self.entries {
            if entry.attempts > 0 {
                Self::reset_entry(entry);
                reset.push(*category);
            }
        }
        reset
    }

    fn reset_entry(entry: &mut RecoveryEntry) {
        entry.attempts = 0;
        entry.reset_pending = false;
        entry.generation += 1;
    }

    pub fn attempts(&self, category: RecoveryCategory) -> u32 {
        self.entries.get(&category).map_or(0, |e| e.attempts)
    }

    pub fn entry(&self, category: RecoveryCategory) -> Option<RecoveryEntry> {
        self.entries.get(&category).copied()
    }

    pub fn phase(&self, category: RecoveryCategory) -> RecoveryPhase {
        match self.attempts(category) {
            0 => RecoveryPhase::Idle,
            n if n < self.max_attempts => RecoveryPhase::Retrying,
            _ => RecoveryPhase::Exhausted,
        }
    }

    /// Sum of attempts across categories (reported as `retryCount`).
    pub fn total_attempts(&self) -> u32 {
        self.entries.values().map(|e| e.attempts).sum()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
