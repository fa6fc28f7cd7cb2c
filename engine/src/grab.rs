//! Grab/release coordinator.
//!
//! Drives 21 kinematic anchor bodies from the tracked keypoints and binds
//! a dynamic body to the thumb-tip anchor for the length of one pinch.
//! The joint is created with the body's pose relative to the anchor at
//! capture time, so the grabbed block keeps its offset instead of snapping
//! to the fingers.  Damping is raised while held and restored on release.
//!
//! Physics failures never leave this module: they are logged and the
//! coordinator carries on without a grab.

use glam::Vec3;
use tracing::{debug, info, warn};

use crate::hand::coordinates::{project_keypoint, MapperConfig};
use crate::hand::depth::{calculate_depth, DepthConfig};
use crate::hand::gesture::{GestureState, GestureUpdate};
use crate::hand::keypoints::{pinch_point, HandKeypoint, Keypoint, KEYPOINT_COUNT};
use crate::hand::smoothing::adaptive_lerp_vec3;
use crate::physics::{
    BodyHandle, Damping, FixedJointDesc, JointHandle, PhysicsError, PhysicsWorld, Pose,
};

// ── Config ─────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq)]
pub struct GrabConfig {
    /// Radius of the capture query around the pinch midpoint.
    pub capture_radius: f32,
    /// Linear and angular damping applied to a held body.
    pub grab_damping: f32,
    /// World units per unit of tracker-relative keypoint z.
    pub relative_z_scale: f32,
    /// Anchor smoothing factor for slow motion.
    pub anchor_min_t: f32,
    /// Anchor smoothing factor for fast motion.
    pub anchor_max_t: f32,
    /// Where anchors wait while no hand is tracked.
    pub park_position: Vec3,
}

impl Default for GrabConfig {
    fn default() -> Self {
        Self {
            capture_radius: 1.0,
            grab_damping: 10.0,
            relative_z_scale: 10.0,
            anchor_min_t: 0.3,
            anchor_max_t: 0.7,
            park_position: Vec3::new(0.0, -100.0, 0.0),
        }
    }
}

// ── Binding and events ─────────────────────────────────────

/// Live association between the thumb anchor and a held body.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrabBinding {
    pub joint: JointHandle,
    pub body: BodyHandle,
    pub saved_damping: Damping,
}

#[derive(Debug, Clone, PartialEq)]
pub enum GrabEvent {
    Captured { body: BodyHandle, joint: JointHandle },
    Released { body: BodyHandle },
    /// Pinch committed but nothing grabbable was in range.
    Missed { at: Vec3 },
}

impl GrabEvent {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Captured { .. } => "captured",
            Self::Released { .. } => "released",
            Self::Missed { .. } => "missed",
        }
    }
}

// ── Coordinator ────────────────────────────────────────────

pub struct GrabCoordinator {
    pub config: GrabConfig,
    pub mapper: MapperConfig,
    pub depth: DepthConfig,
    anchors: [BodyHandle; KEYPOINT_COUNT],
    /// Last commanded anchor positions (the smoothing state).
    positions: [Vec3; KEYPOINT_COUNT],
    needs_teleport: bool,
    binding: Option<GrabBinding>,
}

impl GrabCoordinator {
    pub fn new(
        config: GrabConfig,
        mapper: MapperConfig,
        depth: DepthConfig,
        anchors: [BodyHandle; KEYPOINT_COUNT],
    ) -> Self {
        let park = config.park_position;
        Self {
            config,
            mapper,
            depth,
            anchors,
            positions: [park; KEYPOINT_COUNT],
            needs_teleport: true,
            binding: None,
        }
    }

    pub fn anchors(&self) -> &[BodyHandle; KEYPOINT_COUNT] {
        &self.anchors
    }

    pub fn anchor(&self, which: HandKeypoint) -> BodyHandle {
        self.anchors[which.index()]
    }

    pub fn is_anchor(&self, body: BodyHandle) -> bool {
        self.anchors.contains(&body)
    }

    pub fn anchor_position(&self, which: HandKeypoint) -> Vec3 {
        self.positions[which.index()]
    }

    pub fn binding(&self) -> Option<&GrabBinding> {
        self.binding.as_ref()
    }

    pub fn held_body(&self) -> Option<BodyHandle> {
        self.binding.map(|b| b.body)
    }

    pub fn is_parked(&self) -> bool {
        self.needs_teleport
    }

    /// World position of a keypoint using the anchor transform.
    pub fn project(&self, keypoints: &[Keypoint], keypoint: &Keypoint) -> Vec3 {
        let hand_z = calculate_depth(&self.depth, keypoints);
        project_keypoint(&self.mapper, keypoint, hand_z, self.config.relative_z_scale)
    }

    /// World position of the thumb/index midpoint, `None` without a hand.
    pub fn project_pinch(&self, keypoints: Option<&[Keypoint]>) -> Option<Vec3> {
        let keypoints = keypoints?;
        let mid = pinch_point(Some(keypoints))?;
        Some(self.project(keypoints, &mid))
    }

    /// One tick: move anchors, then react to the gesture transition.
    pub fn update<W: PhysicsWorld>(
        &mut self,
        world: &mut W,
        keypoints: &[Keypoint],
        gesture: &GestureUpdate,
    ) -> Option<GrabEvent> {
        self.track(world, keypoints);
        self.on_gesture(world, gesture)
    }

    /// Command every anchor toward its keypoint.  The first frame after
    /// (re)acquisition jumps straight to the target.
    pub fn track<W: PhysicsWorld>(&mut self, world: &mut W, keypoints: &[Keypoint]) {
        let hand_z = calculate_depth(&self.depth, keypoints);
        let teleport = self.needs_teleport;
        let mut failed: Option<PhysicsError> = None;

        for (i, kp) in keypoints.iter().take(KEYPOINT_COUNT).enumerate() {
            let target = project_keypoint(&self.mapper, kp, hand_z, self.config.relative_z_scale);
            let next = if teleport {
                target
            } else {
                adaptive_lerp_vec3(
                    self.positions[i],
                    target,
                    self.config.anchor_min_t,
                    self.config.anchor_max_t,
                )
            };
            match world.set_next_kinematic_translation(self.anchors[i], next) {
                Ok(()) => self.positions[i] = next,
                Err(e) => failed = Some(e),
            }
        }

        if let Some(e) = failed {
            warn!("Anchor update degraded: {}", e);
            return;
        }
        if teleport {
            debug!("Hand acquired: anchors teleported (hand z {:.2})", hand_z);
            self.needs_teleport = false;
        }
    }

    /// Capture on pinch start.  Release whenever a binding outlives its
    /// pinch, which also retries a release the world refused earlier.
    pub fn on_gesture<W: PhysicsWorld>(
        &mut self,
        world: &mut W,
        gesture: &GestureUpdate,
    ) -> Option<GrabEvent> {
        if gesture.pinch_started() {
            self.try_capture(world)
        } else if self.binding.is_some() && gesture.state != GestureState::Pinching {
            self.release(world)
        } else {
            None
        }
    }

    /// Bind the nearest dynamic body around the pinch midpoint.  A no-op
    /// while a binding exists.
    pub fn try_capture<W: PhysicsWorld>(&mut self, world: &mut W) -> Option<GrabEvent> {
        if self.binding.is_some() {
            return None;
        }
        match self.capture(world) {
            Ok(event) => Some(event),
            Err(e) => {
                warn!("Grab capture skipped: {}", e);
                None
            }
        }
    }

    fn capture<W: PhysicsWorld>(&mut self, world: &mut W) -> Result<GrabEvent, PhysicsError> {
        let thumb = self.anchor(HandKeypoint::ThumbTip);
        let thumb_pose = world.body_pose(thumb)?;
        let index_pose = world.body_pose(self.anchor(HandKeypoint::IndexTip))?;
        let center = (thumb_pose.translation + index_pose.translation) / 2.0;

        let hits = world.intersect_sphere(center, self.config.capture_radius)?;
        let mut best: Option<(BodyHandle, Pose, f32)> = None;
        for body in hits {
            if self.is_anchor(body) || !world.is_dynamic(body)? {
                continue;
            }
            let pose = world.body_pose(body)?;
            let dist = pose.translation.distance(center);
            if best.is_none_or(|(_, _, d)| dist < d) {
                best = Some((body, pose, dist));
            }
        }
        let Some((body, body_pose, _)) = best else {
            debug!("Pinch at ({:.2}, {:.2}, {:.2}): nothing in range", center.x, center.y, center.z);
            return Ok(GrabEvent::Missed { at: center });
        };

        let saved_damping = world.damping(body)?;
        world.set_damping(body, Damping::uniform(self.config.grab_damping))?;

        let desc = FixedJointDesc {
            body_a: thumb,
            body_b: body,
            local_frame_a: thumb_pose.inverse() * body_pose,
            local_frame_b: Pose::IDENTITY,
            contacts_enabled: false,
        };
        let joint = match world.create_fixed_joint(&desc) {
            Ok(joint) => joint,
            Err(e) => {
                if let Err(restore) = world.set_damping(body, saved_damping) {
                    warn!("Failed to restore damping on {}: {}", body, restore);
                }
                return Err(e);
            }
        };
        if let Err(e) = world.wake_up(body) {
            warn!("Failed to wake {}: {}", body, e);
        }

        self.binding = Some(GrabBinding {
            joint,
            body,
            saved_damping,
        });
        info!("Grabbed {} via {}", body, joint);
        Ok(GrabEvent::Captured { body, joint })
    }

    /// Tear down the binding.  A no-op without one.  If the world refuses
    /// to remove the joint the binding is kept and `None` returned.
    pub fn release<W: PhysicsWorld>(&mut self, world: &mut W) -> Option<GrabEvent> {
        let binding = self.binding.take()?;

        match world.remove_joint(binding.joint) {
            Ok(()) => {}
            Err(PhysicsError::UnknownJoint(joint)) => {
                debug!("{} already gone", joint);
            }
            Err(e) => {
                warn!("Release of {} deferred: {}", binding.body, e);
                self.binding = Some(binding);
                return None;
            }
        }
        if let Err(e) = world.set_damping(binding.body, binding.saved_damping) {
            warn!("Failed to restore damping on {}: {}", binding.body, e);
        }
        if let Err(e) = world.wake_up(binding.body) {
            warn!("Failed to wake {}: {}", binding.body, e);
        }

        info!("Released {}", binding.body);
        Some(GrabEvent::Released { body: binding.body })
    }

    /// Send every anchor to the park position and re-arm the teleport.
    pub fn park<W: PhysicsWorld>(&mut self, world: &mut W) {
        let park = self.config.park_position;
        for (i, anchor) in self.anchors.iter().enumerate() {
            if let Err(e) = world.set_next_kinematic_translation(*anchor, park) {
                warn!("Failed to park {}: {}", anchor, e);
            }
            self.positions[i] = park;
        }
        if !self.needs_teleport {
            debug!("Hand lost: anchors parked");
        }
        self.needs_teleport = true;
    }

    /// S-expression for status output.
    pub fn status_sexp(&self) -> String {
        match &self.binding {
            Some(b) => format!(
                "(:grabbing t :body {} :joint {} :parked {})",
                b.body.0,
                b.joint.0,
                if self.needs_teleport { "t" } else { "nil" },
            ),
            None => format!(
                "(:grabbing nil :parked {})",
                if self.needs_teleport { "t" } else { "nil" },
            ),
        }
    }
}

// ── Tests ──────────────────────────────────────────────────
