//! Landmark types: Joint, Landmark, LandmarkSet, LandmarkFrame

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

// ============================================================================
// Joint Vocabulary
// ============================================================================

/// Named skeletal joint tracked by the platform body tracker.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum Joint {
    Head,
    LeftShoulder,
    RightShoulder,
    LeftElbow,
    RightElbow,
    LeftWrist,
    RightWrist,
    LeftHip,
    RightHip,
    LeftKnee,
    RightKnee,
    LeftAnkle,
    RightAnkle,
}

impl Joint {
    /// Full tracked vocabulary.
    pub const ALL: [Joint; 13] = [
        Joint::Head,
        Joint::LeftShoulder,
        Joint::RightShoulder,
        Joint::LeftElbow,
        Joint::RightElbow,
        Joint::LeftWrist,
        Joint::RightWrist,
        Joint::LeftHip,
        Joint::RightHip,
        Joint::LeftKnee,
        Joint::RightKnee,
        Joint::LeftAnkle,
        Joint::RightAnkle,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Joint::Head => "head",
            Joint::LeftShoulder => "left_shoulder",
            Joint::RightShoulder => "right_shoulder",
            Joint::LeftElbow => "left_elbow",
            Joint::RightElbow => "right_elbow",
            Joint::LeftWrist => "left_wrist",
            Joint::RightWrist => "right_wrist",
            Joint::LeftHip => "left_hip",
            Joint::RightHip => "right_hip",
            Joint::LeftKnee => "left_knee",
            Joint::RightKnee => "right_knee",
            Joint::LeftAnkle => "left_ankle",
            Joint::RightAnkle => "right_ankle",
        }
    }
}

impl std::fmt::Display for Joint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Joints that must be tracked for a frame to be measurable.
///
/// Elbows and wrists are tracked but never gate a frame.
pub const REQUIRED_JOINTS: [Joint; 9] = [
    Joint::Head,
    Joint::LeftShoulder,
    Joint::RightShoulder,
    Joint::LeftHip,
    Joint::RightHip,
    Joint::LeftKnee,
    Joint::RightKnee,
    Joint::LeftAnkle,
    Joint::RightAnkle,
];

// ============================================================================
// Landmark
// ============================================================================

/// A tracked 3D joint position (meters, camera space) with visibility in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Landmark {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default = "default_visibility")]
    pub visibility: f64,
}

fn default_visibility() -> f64 {
    1.0
}

impl Landmark {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z, visibility: 1.0 }
    }

    pub fn with_visibility(mut self, visibility: f64) -> Self {
        self.visibility = visibility.clamp(0.0, 1.0);
        self
    }

    /// Euclidean distance between two landmarks.
    pub fn distance_to(&self, other: &Landmark) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        let dz = self.z - other.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance from the camera origin.
    pub fn norm(&self) -> f64 {
        (self.x * self.x + self.y * self.y + self.z * self.z).sqrt()
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }
}

// ============================================================================
// LandmarkSet
// ============================================================================

/// Per-frame mapping from joint to landmark; a joint is absent if untracked.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LandmarkSet {
    joints: BTreeMap<Joint, Landmark>,
}

impl LandmarkSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, joint: Joint, landmark: Landmark) -> Self {
        self.joints.insert(joint, landmark);
        self
    }

    pub fn insert(&mut self, joint: Joint, landmark: Landmark) {
        self.joints.insert(joint, landmark);
    }

    pub fn remove(&mut self, joint: Joint) -> Option<Landmark> {
        self.joints.remove(&joint)
    }

    pub fn get(&self, joint: Joint) -> Option<&Landmark> {
        self.joints.get(&joint)
    }

    pub fn contains(&self, joint: Joint) -> bool {
        self.joints.contains_key(&joint)
    }

    pub fn len(&self) -> usize {
        self.joints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.joints.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (Joint, &Landmark)> {
        self.joints.iter().map(|(j, l)| (*j, l))
    }

    /// Number of `required` joints present in this set.
    pub fn count_present(&self, required: &[Joint]) -> usize {
        required.iter().filter(|j| self.contains(**j)).count()
    }

    /// Copy of this set without landmarks whose visibility is below `min_visibility`.
    pub fn visible(&self, min_visibility: f64) -> LandmarkSet {
        Self {
            joints: self
                .joints
                .iter()
                .filter(|(_, l)| l.visibility >= min_visibility)
                .map(|(j, l)| (*j, *l))
                .collect(),
        }
    }
}

impl FromIterator<(Joint, Landmark)> for LandmarkSet {
    fn from_iter<I: IntoIterator<Item = (Joint, Landmark)>>(iter: I) -> Self {
        Self {
            joints: iter.into_iter().collect(),
        }
    }
}

// ============================================================================
// LandmarkFrame
// ============================================================================

/// One poll of the platform tracker: ground-plane confidence plus landmarks.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LandmarkFrame {
    /// Tracker certainty that a floor/support plane has been located.
    #[serde(default)]
    pub ground_plane_confidence: f32,
    #[serde(default)]
    pub landmarks: LandmarkSet,
}

impl LandmarkFrame {
    pub fn new(ground_plane_confidence: f32, landmarks: LandmarkSet) -> Self {
        Self {
            ground_plane_confidence,
            landmarks,
        }
    }
}
