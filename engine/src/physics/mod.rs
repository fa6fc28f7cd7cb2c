//! Physics collaborator seam.
//!
//! The engine never owns a rigid-body solver.  It talks to one through
//! two traits: [`PhysicsQuery`] for read-only proximity and body state
//! (all the cursor needs) and [`PhysicsWorld`] for the handful of writes
//! the grab coordinator performs (kinematic targets, fixed joints, damping,
//! wake).  `scene::SceneWorld` is the in-memory implementation used by the
//! replay binary and the tests.

pub mod scene;

use std::fmt;
use std::ops::Mul;

use glam::{Quat, Vec3};
use thiserror::Error;

pub use scene::{BodyKind, SceneWorld, Shape};

// ── Handles ────────────────────────────────────────────────

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct BodyHandle(pub u32);

impl fmt::Display for BodyHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BodyHandle({})", self.0)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct JointHandle(pub u32);

impl fmt::Display for JointHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "JointHandle({})", self.0)
    }
}

// ── Pose ───────────────────────────────────────────────────

/// Rigid transform: rotate, then translate.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Pose {
    pub translation: Vec3,
    pub rotation: Quat,
}

impl Default for Pose {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl Pose {
    pub const IDENTITY: Pose = Pose {
        translation: Vec3::ZERO,
        rotation: Quat::IDENTITY,
    };

    pub fn new(translation: Vec3, rotation: Quat) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    pub fn from_translation(translation: Vec3) -> Self {
        Self {
            translation,
            rotation: Quat::IDENTITY,
        }
    }

    pub fn inverse(&self) -> Pose {
        let rotation = self.rotation.inverse();
        Pose {
            translation: rotation * -self.translation,
            rotation,
        }
    }

    pub fn transform_point(&self, point: Vec3) -> Vec3 {
        self.rotation * point + self.translation
    }

    /// Approximate equality for tests and assertions.
    pub fn abs_diff_eq(&self, other: &Pose, max_abs_diff: f32) -> bool {
        self.translation.abs_diff_eq(other.translation, max_abs_diff)
            && (self.rotation.abs_diff_eq(other.rotation, max_abs_diff)
                || self.rotation.abs_diff_eq(-other.rotation, max_abs_diff))
    }
}

impl Mul for Pose {
    type Output = Pose;

    fn mul(self, rhs: Pose) -> Pose {
        Pose {
            translation: self.translation + self.rotation * rhs.translation,
            rotation: (self.rotation * rhs.rotation).normalize(),
        }
    }
}

// ── Body state ─────────────────────────────────────────────

#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Damping {
    pub linear: f32,
    pub angular: f32,
}

impl Damping {
    pub fn uniform(value: f32) -> Self {
        Self {
            linear: value,
            angular: value,
        }
    }
}

impl Default for Damping {
    fn default() -> Self {
        Self::uniform(0.0)
    }
}

/// Fixed joint locking `body_b` to `body_a` such that
/// `pose_a * local_frame_a == pose_b * local_frame_b`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct FixedJointDesc {
    pub body_a: BodyHandle,
    pub body_b: BodyHandle,
    pub local_frame_a: Pose,
    pub local_frame_b: Pose,
    /// Whether the two jointed bodies still collide with each other.
    pub contacts_enabled: bool,
}

// ── Errors ─────────────────────────────────────────────────

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PhysicsError {
    /// The world has not finished initializing.
    #[error("physics world not ready")]
    NotReady,

    #[error("unknown body {0}")]
    UnknownBody(BodyHandle),

    #[error("unknown joint {0}")]
    UnknownJoint(JointHandle),

    #[error("physics backend: {0}")]
    Backend(String),
}

pub type Result<T> = std::result::Result<T, PhysicsError>;

// ── Traits ─────────────────────────────────────────────────

/// Read-only access to the physics world.
pub trait PhysicsQuery {
    fn body_pose(&self, body: BodyHandle) -> Result<Pose>;

    fn is_dynamic(&self, body: BodyHandle) -> Result<bool>;

    fn damping(&self, body: BodyHandle) -> Result<Damping>;

    /// Bodies whose collider overlaps a sphere at `center`.
    fn intersect_sphere(&self, center: Vec3, radius: f32) -> Result<Vec<BodyHandle>>;

    /// Presentation identifier of a body, if it has one.
    fn label(&self, _body: BodyHandle) -> Option<String> {
        None
    }
}

/// The writes the grab coordinator performs.
pub trait PhysicsWorld: PhysicsQuery {
    /// Target for a kinematic body, applied on the next step.
    fn set_next_kinematic_translation(&mut self, body: BodyHandle, translation: Vec3) -> Result<()>;

    fn create_fixed_joint(&mut self, desc: &FixedJointDesc) -> Result<JointHandle>;

    fn remove_joint(&mut self, joint: JointHandle) -> Result<()>;

    fn set_damping(&mut self, body: BodyHandle, damping: Damping) -> Result<()>;

    fn wake_up(&mut self, body: BodyHandle) -> Result<()>;
}

// ── Tests ──────────────────────────────────────────────────
