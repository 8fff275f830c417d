//! Synthetic landmark frames
//!
//! Generates a standing body with Gaussian per-coordinate jitter under a few
//! capture scenarios. Drives the `simulation` binary and the CLI's default
//! source so the pipeline can run without a tracker attached.

use std::str::FromStr;
use std::sync::Mutex;

use anyhow::Result;
use async_trait::async_trait;
use rand::prelude::*;
use rand_distr::{Distribution, Normal, NormalError};

use crate::types::{Joint, Landmark, LandmarkFrame, LandmarkSet};

use super::source::PlatformAdapter;

/// Ankle height in tracker space (m); every other joint hangs off it.
const ANKLE_Y: f64 = -0.9;
/// Default per-coordinate jitter (m).
pub const DEFAULT_JITTER_M: f64 = 0.003;
/// Distance used by the `too_close` scenario (m).
const TOO_CLOSE_DISTANCE_M: f64 = 0.4;
/// Probability of an empty poll in the `dropout` scenario.
const DROPOUT_PROBABILITY: f64 = 0.25;

// ============================================================================
// Scenarios
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scenario {
    /// Full body, good plane, inside the distance window.
    Steady,
    /// User well inside the minimum distance.
    TooClose,
    /// Floor plane never locks.
    NoPlane,
    /// Steady body, but a quarter of polls come back empty.
    Dropout,
    /// Legs out of frame (knees and ankles untracked).
    PartialBody,
}

impl Scenario {
    pub const ALL: [Scenario; 5] = [
        Scenario::Steady,
        Scenario::TooClose,
        Scenario::NoPlane,
        Scenario::Dropout,
        Scenario::PartialBody,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Scenario::Steady => "steady",
            Scenario::TooClose => "too_close",
            Scenario::NoPlane => "no_plane",
            Scenario::Dropout => "dropout",
            Scenario::PartialBody => "partial_body",
        }
    }
}

impl std::fmt::Display for Scenario {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Scenario {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        Scenario::ALL
            .into_iter()
            .find(|sc| sc.name() == normalized)
            .ok_or_else(|| {
                let names: Vec<&str> = Scenario::ALL.iter().map(Scenario::name).collect();
                format!("unknown scenario '{}' (expected one of: {})", s, names.join(", "))
            })
    }
}

// ============================================================================
// Body Profile
// ============================================================================

/// Physical body being "scanned".
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyProfile {
    pub shoulder_width_m: f64,
    pub height_m: f64,
    pub distance_m: f64,
}

impl Default for BodyProfile {
    fn default() -> Self {
        Self {
            shoulder_width_m: 0.44,
            height_m: 1.71,
            distance_m: 2.0,
        }
    }
}

// ============================================================================
// Frame Generator
// ============================================================================

pub struct FrameGenerator {
    rng: StdRng,
    scenario: Scenario,
    profile: BodyProfile,
    jitter: Normal<f64>,
    frames_generated: u64,
    empty_polls: u64,
}

impl FrameGenerator {
    pub fn new(scenario: Scenario, profile: BodyProfile, seed: Option<u64>) -> Result<Self, NormalError> {
        Self::with_jitter(scenario, profile, DEFAULT_JITTER_M, seed)
    }

    pub fn with_jitter(
        scenario: Scenario,
        profile: BodyProfile,
        jitter_m: f64,
        seed: Option<u64>,
    ) -> Result<Self, NormalError> {
        let rng = match seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Ok(Self {
            rng,
            scenario,
            profile,
            jitter: Normal::new(0.0, jitter_m)?,
            frames_generated: 0,
            empty_polls: 0,
        })
    }

    pub fn scenario(&self) -> Scenario {
        self.scenario
    }

    pub fn frames_generated(&self) -> u64 {
        self.frames_generated
    }

    pub fn empty_polls(&self) -> u64 {
        self.empty_polls
    }

    /// Next poll result; `None` is an empty poll.
    pub fn next_frame(&mut self) -> Option<LandmarkFrame> {
        if self.scenario == Scenario::Dropout && self.rng.gen_bool(DROPOUT_PROBABILITY) {
            self.empty_polls += 1;
            return None;
        }

        let plane = match self.scenario {
            Scenario::NoPlane => self.rng.gen_range(0.2..0.6),
            _ => self.rng.gen_range(0.88..0.99),
        };
        let distance = match self.scenario {
            Scenario::TooClose => TOO_CLOSE_DISTANCE_M,
            _ => self.profile.distance_m,
        };

        let half_width = self.profile.shoulder_width_m / 2.0;
        let head_y = ANKLE_Y + self.profile.height_m;
        let shoulder_y = head_y - 0.35;
        let hip_y = ANKLE_Y + 0.86;
        let knee_y = ANKLE_Y + 0.46;

        let skeleton = [
            (Joint::Head, 0.0, head_y),
            (Joint::LeftShoulder, -half_width, shoulder_y),
            (Joint::RightShoulder, half_width, shoulder_y),
            (Joint::LeftElbow, -half_width - 0.05, shoulder_y - 0.28),
            (Joint::RightElbow, half_width + 0.05, shoulder_y - 0.28),
            (Joint::LeftWrist, -half_width - 0.07, shoulder_y - 0.52),
            (Joint::RightWrist, half_width + 0.07, shoulder_y - 0.52),
            (Joint::LeftHip, -0.15, hip_y),
            (Joint::RightHip, 0.15, hip_y),
            (Joint::LeftKnee, -0.15, knee_y),
            (Joint::RightKnee, 0.15, knee_y),
            (Joint::LeftAnkle, -0.15, ANKLE_Y),
            (Joint::RightAnkle, 0.15, ANKLE_Y),
        ];

        let mut landmarks = LandmarkSet::new();
        for (joint, x, y) in skeleton {
            if self.scenario == Scenario::PartialBody
                && matches!(joint, Joint::LeftKnee | Joint::RightKnee | Joint::LeftAnkle | Joint::RightAnkle)
            {
                continue;
            }
            let landmark = Landmark::new(
                x + self.jitter.sample(&mut self.rng),
                y + self.jitter.sample(&mut self.rng),
                distance + self.jitter.sample(&mut self.rng),
            )
            .with_visibility(self.rng.gen_range(0.85..=1.0));
            landmarks.insert(joint, landmark);
        }

        self.frames_generated += 1;
        Some(LandmarkFrame::new(plane, landmarks))
    }
}

// ============================================================================
// Synthetic Source
// ============================================================================

/// [`PlatformAdapter`] over a [`FrameGenerator`], optionally bounded.
pub struct SyntheticSource {
    generator: Mutex<FrameGenerator>,
    max_frames: Option<u64>,
}

impl SyntheticSource {
    pub fn new(generator: FrameGenerator, max_frames: Option<u64>) -> Self {
        Self {
            generator: Mutex::new(generator),
            max_frames,
        }
    }
}

#[async_trait]
impl PlatformAdapter for SyntheticSource {
    async fn poll_frame(&self) -> Result<Option<LandmarkFrame>> {
        let mut generator = self.generator.lock().unwrap_or_else(|e| e.into_inner());
        if self.max_frames.is_some_and(|max| generator.frames_generated() >= max) {
            return Ok(None);
        }
        Ok(generator.next_frame())
    }

    fn is_exhausted(&self) -> bool {
        let generator = self.generator.lock().unwrap_or_else(|e| e.into_inner());
        self.max_frames.is_some_and(|max| generator.frames_generated() >= max)
    }

    fn adapter_name(&self) -> &str {
        "synthetic"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PipelineConfig;
    use crate::pipeline::calculator;
    use crate::pipeline::validator::{validate_frame, FrameRejection};
    use crate::types::REQUIRED_JOINTS;

    fn generator(scenario: Scenario) -> FrameGenerator {
        FrameGenerator::new(scenario, BodyProfile::default(), Some(7)).unwrap()
    }

    fn first_frame(scenario: Scenario) -> LandmarkFrame {
        let mut g = generator(scenario);
        (0..100).find_map(|_| g.next_frame()).unwrap()
    }

    fn check(frame: &LandmarkFrame) -> Result<(), FrameRejection> {
        let config = PipelineConfig::default();
        validate_frame(
            frame.ground_plane_confidence,
            &frame.landmarks.visible(config.thresholds.min_landmark_visibility),
            &REQUIRED_JOINTS,
            &config.thresholds,
        )
    }

    #[test]
    fn test_scenario_parse() {
        assert_eq!("too-close".parse::<Scenario>().unwrap(), Scenario::TooClose);
        assert_eq!("PARTIAL_BODY".parse::<Scenario>().unwrap(), Scenario::PartialBody);
        assert!("sideways".parse::<Scenario>().is_err());
    }

    #[test]
    fn test_steady_frames_pass_and_measure_the_profile() {
        let frame = first_frame(Scenario::Steady);
        assert_eq!(check(&frame), Ok(()));
        let width = calculator::shoulder_width_cm(&frame.landmarks);
        let height = calculator::height_cm(&frame.landmarks);
        assert!((width - 44.0).abs() < 2.0, "width {width}");
        assert!((height - 171.0).abs() < 2.0, "height {height}");
    }

    #[test]
    fn test_failure_scenarios_are_rejected() {
        assert!(matches!(check(&first_frame(Scenario::TooClose)), Err(FrameRejection::TooClose { .. })));
        assert!(matches!(
            check(&first_frame(Scenario::NoPlane)),
            Err(FrameRejection::PlaneNotDetected { .. })
        ));
        assert!(matches!(
            check(&first_frame(Scenario::PartialBody)),
            Err(FrameRejection::InsufficientLandmarks { present: 5, .. })
        ));
    }

    #[test]
    fn test_dropout_yields_empty_polls() {
        let mut g = generator(Scenario::Dropout);
        let empties = (0..200).filter(|_| g.next_frame().is_none()).count();
        assert!(empties > 20 && empties < 100, "empties {empties}");
        assert_eq!(g.empty_polls(), empties as u64);
    }

    #[test]
    fn test_seed_is_reproducible() {
        let a: Vec<_> = {
            let mut g = generator(Scenario::Steady);
            (0..3).map(|_| g.next_frame()).collect()
        };
        let b: Vec<_> = {
            let mut g = generator(Scenario::Steady);
            (0..3).map(|_| g.next_frame()).collect()
        };
        assert_eq!(a, b);
    }

    #[tokio::test]
    async fn test_bounded_source_runs_dry() {
        let source = SyntheticSource::new(generator(Scenario::Steady), Some(2));
        assert!(source.poll_frame().await.unwrap().is_some());
        assert!(source.poll_frame().await.unwrap().is_some());
        assert!(source.is_exhausted());
        assert!(source.poll_frame().await.unwrap().is_none());
    }
}
