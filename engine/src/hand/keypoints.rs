//! Hand keypoint model: the 21 landmarks the external tracker reports
//! for the first detected hand each frame.
//!
//! Coordinates are camera-normalized: x and y in [0, 1] relative to the
//! image, z a relative depth with its origin at the wrist (smaller = closer
//! to the camera).  The core only ever reads a keypoint set.

use glam::Vec3;

// ── Keypoint definitions ───────────────────────────────────

/// The 21 hand landmarks, in tracker order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandKeypoint {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexMcp,
    IndexPip,
    IndexDip,
    IndexTip,
    MiddleMcp,
    MiddlePip,
    MiddleDip,
    MiddleTip,
    RingMcp,
    RingPip,
    RingDip,
    RingTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

/// Total number of keypoints per hand.
pub const KEYPOINT_COUNT: usize = 21;

impl HandKeypoint {
    /// All keypoints in tracker order.
    pub const ALL: [HandKeypoint; KEYPOINT_COUNT] = [
        Self::Wrist,
        Self::ThumbCmc,
        Self::ThumbMcp,
        Self::ThumbIp,
        Self::ThumbTip,
        Self::IndexMcp,
        Self::IndexPip,
        Self::IndexDip,
        Self::IndexTip,
        Self::MiddleMcp,
        Self::MiddlePip,
        Self::MiddleDip,
        Self::MiddleTip,
        Self::RingMcp,
        Self::RingPip,
        Self::RingDip,
        Self::RingTip,
        Self::PinkyMcp,
        Self::PinkyPip,
        Self::PinkyDip,
        Self::PinkyTip,
    ];

    /// Position of this keypoint within a keypoint set (0-20).
    pub fn index(&self) -> usize {
        *self as usize
    }

    /// String representation for status output and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Wrist => "wrist",
            Self::ThumbCmc => "thumb-cmc",
            Self::ThumbMcp => "thumb-mcp",
            Self::ThumbIp => "thumb-ip",
            Self::ThumbTip => "thumb-tip",
            Self::IndexMcp => "index-mcp",
            Self::IndexPip => "index-pip",
            Self::IndexDip => "index-dip",
            Self::IndexTip => "index-tip",
            Self::MiddleMcp => "middle-mcp",
            Self::MiddlePip => "middle-pip",
            Self::MiddleDip => "middle-dip",
            Self::MiddleTip => "middle-tip",
            Self::RingMcp => "ring-mcp",
            Self::RingPip => "ring-pip",
            Self::RingDip => "ring-dip",
            Self::RingTip => "ring-tip",
            Self::PinkyMcp => "pinky-mcp",
            Self::PinkyPip => "pinky-pip",
            Self::PinkyDip => "pinky-dip",
            Self::PinkyTip => "pinky-tip",
        }
    }

    /// The four non-thumb fingertips, index first.
    pub fn finger_tips() -> [HandKeypoint; 4] {
        [Self::IndexTip, Self::MiddleTip, Self::RingTip, Self::PinkyTip]
    }
}

// ── Keypoint ───────────────────────────────────────────────

/// One landmark estimate in camera-normalized space.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Keypoint {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Keypoint {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    pub fn to_vec3(self) -> Vec3 {
        Vec3::new(self.x, self.y, self.z)
    }

    /// Euclidean distance in all three normalized axes.
    pub fn distance(&self, other: &Keypoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        let dz = other.z - self.z;
        (dx * dx + dy * dy + dz * dz).sqrt()
    }

    /// Distance in the image plane only.
    pub fn distance_2d(&self, other: &Keypoint) -> f32 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }

    /// Component-wise midpoint.
    pub fn midpoint(&self, other: &Keypoint) -> Keypoint {
        Keypoint {
            x: (self.x + other.x) / 2.0,
            y: (self.y + other.y) / 2.0,
            z: (self.z + other.z) / 2.0,
        }
    }
}

// ── Set helpers ────────────────────────────────────────────

/// Whether a keypoint set carries every landmark.
pub fn is_complete(keypoints: &[Keypoint]) -> bool {
    keypoints.len() >= KEYPOINT_COUNT
}

/// Look up a named keypoint, `None` if the set is too short.
pub fn get(keypoints: &[Keypoint], which: HandKeypoint) -> Option<&Keypoint> {
    keypoints.get(which.index())
}

/// Midpoint of the thumb tip and index tip, used for grab targeting.
pub fn pinch_point(keypoints: Option<&[Keypoint]>) -> Option<Keypoint> {
    let keypoints = keypoints?;
    let thumb = get(keypoints, HandKeypoint::ThumbTip)?;
    let index = get(keypoints, HandKeypoint::IndexTip)?;
    Some(thumb.midpoint(index))
}

/// A full set of keypoints at the origin.
#[cfg(test)]
pub(crate) fn make_hand() -> Vec<Keypoint> {
    vec![Keypoint::default(); KEYPOINT_COUNT]
}

#[cfg(test)]
pub(crate) fn set_kp(hand: &mut [Keypoint], which: HandKeypoint, x: f32, y: f32, z: f32) {
    hand[which.index()] = Keypoint::new(x, y, z);
}

// ── Tests ──────────────────────────────────────────────────
