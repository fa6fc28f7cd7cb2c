//! In-memory physics world.
//!
//! Enough of a rigid-body world to drive the engine end to end: bodies
//! with poses, colliders, damping and sleep flags, fixed joints, and a
//! sphere overlap query.  `step()` only applies kinematic targets and
//! snaps jointed bodies to their joint frames.  There is no integration,
//! gravity, or contact resolution.

use std::collections::BTreeMap;
use std::f32::consts::FRAC_PI_2;

use glam::{Quat, Vec3};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use super::{
    BodyHandle, Damping, FixedJointDesc, JointHandle, PhysicsError, PhysicsQuery, PhysicsWorld,
    Pose, Result,
};
use crate::hand::keypoints::{HandKeypoint, KEYPOINT_COUNT};

// ── Tower layout ───────────────────────────────────────────

pub const TOWER_LEVELS: u32 = 18;
pub const BLOCKS_PER_LEVEL: i32 = 3;
pub const LEVEL_HEIGHT: f32 = 1.5;
/// Half extents of one block (2.5 x 1.5 x 7.5).
pub const BLOCK_HALF_EXTENTS: Vec3 = Vec3::new(1.25, 0.75, 3.75);
/// Center-to-center distance between blocks in a level.
pub const BLOCK_SPACING: f32 = 2.55;
const JITTER_POS: f32 = 0.05;
const JITTER_ROT: f32 = 0.02;

/// Radius of each kinematic hand-anchor sphere.
pub const ANCHOR_RADIUS: f32 = 0.1;

// ── Bodies ─────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodyKind {
    Dynamic,
    /// Moved only by explicit targets.
    Kinematic,
    Fixed,
}

impl BodyKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Dynamic => "dynamic",
            Self::Kinematic => "kinematic",
            Self::Fixed => "fixed",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Shape {
    Sphere { r: f32 },
    Cuboid { hx: f32, hy: f32, hz: f32 },
}

impl Shape {
    pub fn cuboid(half_extents: Vec3) -> Self {
        Self::Cuboid {
            hx: half_extents.x,
            hy: half_extents.y,
            hz: half_extents.z,
        }
    }

    /// Whether this shape at `pose` overlaps a sphere.
    pub fn overlaps_sphere(&self, pose: &Pose, center: Vec3, radius: f32) -> bool {
        match *self {
            Shape::Sphere { r } => pose.translation.distance(center) <= r + radius,
            Shape::Cuboid { hx, hy, hz } => {
                let local = pose.inverse().transform_point(center);
                let he = Vec3::new(hx, hy, hz);
                local.clamp(-he, he).distance(local) <= radius
            }
        }
    }
}

#[derive(Debug, Clone)]
pub struct Body {
    pub kind: BodyKind,
    pub pose: Pose,
    pub shape: Shape,
    pub damping: Damping,
    pub sleeping: bool,
    pub label: Option<String>,
    next_translation: Option<Vec3>,
}

// ── World ──────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct SceneWorld {
    ready: bool,
    bodies: Vec<Body>,
    joints: BTreeMap<JointHandle, FixedJointDesc>,
    next_joint: u32,
}

impl Default for SceneWorld {
    fn default() -> Self {
        Self::new()
    }
}

impl SceneWorld {
    pub fn new() -> Self {
        Self {
            ready: true,
            bodies: Vec::new(),
            joints: BTreeMap::new(),
            next_joint: 0,
        }
    }

    /// Every query and write fails with `NotReady` until `set_ready(true)`.
    pub fn set_ready(&mut self, ready: bool) {
        self.ready = ready;
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn add_body(&mut self, kind: BodyKind, pose: Pose, shape: Shape) -> BodyHandle {
        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(Body {
            kind,
            pose,
            shape,
            damping: Damping::default(),
            sleeping: false,
            label: None,
            next_translation: None,
        });
        handle
    }

    pub fn add_labeled_body(
        &mut self,
        kind: BodyKind,
        pose: Pose,
        shape: Shape,
        label: impl Into<String>,
    ) -> BodyHandle {
        let handle = self.add_body(kind, pose, shape);
        self.bodies[handle.0 as usize].label = Some(label.into());
        handle
    }

    pub fn body(&self, handle: BodyHandle) -> Option<&Body> {
        self.bodies.get(handle.0 as usize)
    }

    pub fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut Body> {
        self.bodies.get_mut(handle.0 as usize)
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    pub fn joint(&self, handle: JointHandle) -> Option<&FixedJointDesc> {
        self.joints.get(&handle)
    }

    pub fn joint_count(&self) -> usize {
        self.joints.len()
    }

    pub fn find_label(&self, label: &str) -> Option<BodyHandle> {
        self.bodies
            .iter()
            .position(|b| b.label.as_deref() == Some(label))
            .map(|i| BodyHandle(i as u32))
    }

    /// Mark a body asleep.
    pub fn sleep(&mut self, handle: BodyHandle) {
        if let Some(body) = self.body_mut(handle) {
            body.sleeping = true;
        }
    }

    fn checked(&self, handle: BodyHandle) -> Result<&Body> {
        if !self.ready {
            return Err(PhysicsError::NotReady);
        }
        self.body(handle).ok_or(PhysicsError::UnknownBody(handle))
    }

    fn checked_mut(&mut self, handle: BodyHandle) -> Result<&mut Body> {
        if !self.ready {
            return Err(PhysicsError::NotReady);
        }
        self.body_mut(handle).ok_or(PhysicsError::UnknownBody(handle))
    }

    /// Advance one tick: apply kinematic targets, then carry jointed
    /// dynamic bodies along with their partners.
    pub fn step(&mut self) {
        if !self.ready {
            return;
        }
        for body in self.bodies.iter_mut() {
            if let Some(target) = body.next_translation.take() {
                body.pose.translation = target;
            }
        }

        let joints: Vec<FixedJointDesc> = self.joints.values().copied().collect();
        for joint in joints {
            let Some(pose_a) = self.body(joint.body_a).map(|b| b.pose) else {
                continue;
            };
            if let Some(body_b) = self.body_mut(joint.body_b) {
                if body_b.kind == BodyKind::Dynamic {
                    body_b.pose = pose_a * joint.local_frame_a * joint.local_frame_b.inverse();
                }
            }
        }
    }

    // ── Scene construction ─────────────────────────────────

    /// One kinematic sphere per keypoint, parked at `park`.
    pub fn spawn_hand_anchors(&mut self, park: Vec3) -> [BodyHandle; KEYPOINT_COUNT] {
        HandKeypoint::ALL.map(|kp| {
            self.add_labeled_body(
                BodyKind::Kinematic,
                Pose::from_translation(park),
                Shape::Sphere { r: ANCHOR_RADIUS },
                format!("hand-{}", kp.as_str()),
            )
        })
    }

    /// Fixed table (top face at y = 0) and floor.
    pub fn spawn_ground(&mut self) -> (BodyHandle, BodyHandle) {
        let table = self.add_labeled_body(
            BodyKind::Fixed,
            Pose::from_translation(Vec3::new(0.0, -1.0, 0.0)),
            Shape::cuboid(Vec3::new(5.0, 1.0, 5.0)),
            "table",
        );
        let floor = self.add_labeled_body(
            BodyKind::Fixed,
            Pose::from_translation(Vec3::new(0.0, -5.0, 0.0)),
            Shape::cuboid(Vec3::new(50.0, 0.5, 50.0)),
            "floor",
        );
        (table, floor)
    }

    /// Stack `levels` of three blocks on the table.  Odd levels are turned
    /// a quarter turn about Y.  Blocks are labelled `"{level}-{i}"` with
    /// `i` in -1..=1.  The same seed always gives the same jitter.
    pub fn build_tower(&mut self, levels: u32, jitter_seed: u64) -> Vec<BodyHandle> {
        let mut rng = StdRng::seed_from_u64(jitter_seed);
        let mut blocks = Vec::with_capacity(levels as usize * BLOCKS_PER_LEVEL as usize);
        let half = BLOCKS_PER_LEVEL / 2;

        for level in 0..levels {
            let odd = level % 2 != 0;
            let y = level as f32 * LEVEL_HEIGHT + LEVEL_HEIGHT / 2.0;

            for i in -half..=half {
                let offset = i as f32 * BLOCK_SPACING;
                let jx = jitter(&mut rng, JITTER_POS);
                let jz = jitter(&mut rng, JITTER_POS);
                let jr = jitter(&mut rng, JITTER_ROT);

                let (translation, yaw) = if odd {
                    (Vec3::new(jx, y, offset + jz), FRAC_PI_2 + jr)
                } else {
                    (Vec3::new(offset + jx, y, jz), jr)
                };

                blocks.push(self.add_labeled_body(
                    BodyKind::Dynamic,
                    Pose::new(translation, Quat::from_rotation_y(yaw)),
                    Shape::cuboid(BLOCK_HALF_EXTENTS),
                    format!("{}-{}", level, i),
                ));
            }
        }

        debug!("Built tower: {} levels, {} blocks", levels, blocks.len());
        blocks
    }
}

impl PhysicsQuery for SceneWorld {
    fn body_pose(&self, body: BodyHandle) -> Result<Pose> {
        Ok(self.checked(body)?.pose)
    }

    fn is_dynamic(&self, body: BodyHandle) -> Result<bool> {
        Ok(self.checked(body)?.kind == BodyKind::Dynamic)
    }

    fn damping(&self, body: BodyHandle) -> Result<Damping> {
        Ok(self.checked(body)?.damping)
    }

    fn intersect_sphere(&self, center: Vec3, radius: f32) -> Result<Vec<BodyHandle>> {
        if !self.ready {
            return Err(PhysicsError::NotReady);
        }
        Ok(self
            .bodies
            .iter()
            .enumerate()
            .filter(|(_, b)| b.shape.overlaps_sphere(&b.pose, center, radius))
            .map(|(i, _)| BodyHandle(i as u32))
            .collect())
    }

    fn label(&self, body: BodyHandle) -> Option<String> {
        self.body(body).and_then(|b| b.label.clone())
    }
}

impl PhysicsWorld for SceneWorld {
    fn set_next_kinematic_translation(&mut self, body: BodyHandle, translation: Vec3) -> Result<()> {
        let b = self.checked_mut(body)?;
        if b.kind != BodyKind::Kinematic {
            return Err(PhysicsError::Backend(format!(
                "{} is {}, not kinematic",
                body,
                b.kind.as_str()
            )));
        }
        b.next_translation = Some(translation);
        Ok(())
    }

    fn create_fixed_joint(&mut self, desc: &FixedJointDesc) -> Result<JointHandle> {
        self.checked(desc.body_a)?;
        self.checked(desc.body_b)?;
        if desc.body_a == desc.body_b {
            return Err(PhysicsError::Backend(format!(
                "cannot joint {} to itself",
                desc.body_a
            )));
        }
        let handle = JointHandle(self.next_joint);
        self.next_joint += 1;
        self.joints.insert(handle, *desc);
        Ok(handle)
    }

    fn remove_joint(&mut self, joint: JointHandle) -> Result<()> {
        if !self.ready {
            return Err(PhysicsError::NotReady);
        }
        self.joints
            .remove(&joint)
            .map(|_| ())
            .ok_or(PhysicsError::UnknownJoint(joint))
    }

    fn set_damping(&mut self, body: BodyHandle, damping: Damping) -> Result<()> {
        self.checked_mut(body)?.damping = damping;
        Ok(())
    }

    fn wake_up(&mut self, body: BodyHandle) -> Result<()> {
        self.checked_mut(body)?.sleeping = false;
        Ok(())
    }
}

/// Uniform in `[-amplitude / 2, amplitude / 2)`.
fn jitter(rng: &mut StdRng, amplitude: f32) -> f32 {
    rng.gen_range(-0.5..0.5) * amplitude
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_sphere_at(world: &mut SceneWorld, kind: BodyKind, at: Vec3) -> BodyHandle {
        world.add_body(kind, Pose::from_translation(at), Shape::Sphere { r: 0.5 })
    }

    #[test]
    fn test_tower_layout() {
        let mut world = SceneWorld::new();
        let blocks = world.build_tower(TOWER_LEVELS, 7);
        assert_eq!(blocks.len(), 54);

        let bottom = world.find_label("0-0").expect("0-0");
        let pose = world.body(bottom).unwrap().pose;
        assert!((pose.translation.y - 0.75).abs() < 1e-6);
        assert!(pose.translation.x.abs() <= JITTER_POS / 2.0);

        let left = world.body(world.find_label("0--1").unwrap()).unwrap().pose;
        assert!((left.translation.x + BLOCK_SPACING).abs() <= JITTER_POS / 2.0 + 1e-6);

        let top = world.body(world.find_label("17-1").unwrap()).unwrap().pose;
        assert!((top.translation.y - (17.0 * 1.5 + 0.75)).abs() < 1e-4);
    }

    #[test]
    fn test_tower_odd_levels_rotated() {
        let mut world = SceneWorld::new();
        world.build_tower(2, 3);
        let even = world.body(world.find_label("0-1").unwrap()).unwrap().pose;
        let odd = world.body(world.find_label("1-1").unwrap()).unwrap().pose;

        let (_, even_yaw, _) = even.rotation.to_euler(glam::EulerRot::XYZ);
        assert!(even_yaw.abs() <= JITTER_ROT, "even yaw {}", even_yaw);
        // Odd levels run along Z
        let long_axis = odd.rotation * Vec3::Z;
        assert!(long_axis.x.abs() > 0.99, "got {:?}", long_axis);
        assert!((odd.translation.z - BLOCK_SPACING).abs() <= JITTER_POS);
    }

    #[test]
    fn test_tower_deterministic_seed() {
        let mut a = SceneWorld::new();
        let mut b = SceneWorld::new();
        a.build_tower(4, 42);
        b.build_tower(4, 42);
        for i in 0..a.body_count() as u32 {
            assert_eq!(a.body(BodyHandle(i)).unwrap().pose, b.body(BodyHandle(i)).unwrap().pose);
        }
    }

    #[test]
    fn test_tower_seed_changes_jitter() {
        let mut a = SceneWorld::new();
        let mut b = SceneWorld::new();
        a.build_tower(2, 1);
        b.build_tower(2, 2);
        let differs = (0..a.body_count() as u32)
            .any(|i| a.body(BodyHandle(i)).unwrap().pose != b.body(BodyHandle(i)).unwrap().pose);
        assert!(differs);
    }

    #[test]
    fn test_intersect_sphere_vs_cuboid() {
        let mut world = SceneWorld::new();
        let block = world.add_body(
            BodyKind::Dynamic,
            Pose::new(Vec3::ZERO, Quat::from_rotation_y(FRAC_PI_2)),
            Shape::cuboid(BLOCK_HALF_EXTENTS),
        );
        // Long axis now runs along world X
        assert_eq!(world.intersect_sphere(Vec3::new(4.0, 0.0, 0.0), 0.5).unwrap(), vec![block]);
        assert!(world.intersect_sphere(Vec3::new(0.0, 0.0, 4.0), 0.5).unwrap().is_empty());
        assert_eq!(world.intersect_sphere(Vec3::new(0.0, 1.0, 0.0), 0.3).unwrap(), vec![block]);
    }

    #[test]
    fn test_intersect_sphere_vs_sphere() {
        let mut world = SceneWorld::new();
        let s = unit_sphere_at(&mut world, BodyKind::Dynamic, Vec3::ZERO);
        assert_eq!(world.intersect_sphere(Vec3::new(0.9, 0.0, 0.0), 0.5).unwrap(), vec![s]);
        assert!(world.intersect_sphere(Vec3::new(1.1, 0.0, 0.0), 0.5).unwrap().is_empty());
    }

    #[test]
    fn test_kinematic_target_applied_on_step() {
        let mut world = SceneWorld::new();
        let anchors = world.spawn_hand_anchors(Vec3::new(0.0, -100.0, 0.0));
        let wrist = anchors[HandKeypoint::Wrist.index()];
        world.set_next_kinematic_translation(wrist, Vec3::ONE).unwrap();
        assert_eq!(world.body_pose(wrist).unwrap().translation.y, -100.0);
        world.step();
        assert_eq!(world.body_pose(wrist).unwrap().translation, Vec3::ONE);
        assert_eq!(world.label(wrist).as_deref(), Some("hand-wrist"));
    }

    #[test]
    fn test_kinematic_target_rejected_for_dynamic() {
        let mut world = SceneWorld::new();
        let s = unit_sphere_at(&mut world, BodyKind::Dynamic, Vec3::ZERO);
        let err = world.set_next_kinematic_translation(s, Vec3::ONE).unwrap_err();
        assert!(matches!(err, PhysicsError::Backend(_)), "got {:?}", err);
    }

    #[test]
    fn test_joint_carries_body() {
        let mut world = SceneWorld::new();
        let anchor = unit_sphere_at(&mut world, BodyKind::Kinematic, Vec3::ZERO);
        let block = unit_sphere_at(&mut world, BodyKind::Dynamic, Vec3::new(1.0, 0.0, 0.0));

        let rel = world.body_pose(anchor).unwrap().inverse() * world.body_pose(block).unwrap();
        let joint = world
            .create_fixed_joint(&FixedJointDesc {
                body_a: anchor,
                body_b: block,
                local_frame_a: rel,
                local_frame_b: Pose::IDENTITY,
                contacts_enabled: false,
            })
            .unwrap();

        world.step();
        // No snap at creation
        assert!((world.body_pose(block).unwrap().translation - Vec3::X).length() < 1e-5);

        world.set_next_kinematic_translation(anchor, Vec3::new(0.0, 2.0, 0.0)).unwrap();
        world.step();
        let moved = world.body_pose(block).unwrap().translation;
        assert!((moved - Vec3::new(1.0, 2.0, 0.0)).length() < 1e-5, "got {:?}", moved);

        world.remove_joint(joint).unwrap();
        assert_eq!(world.joint_count(), 0);
        assert_eq!(world.remove_joint(joint), Err(PhysicsError::UnknownJoint(joint)));
    }

    #[test]
    fn test_not_ready() {
        let mut world = SceneWorld::new();
        let s = unit_sphere_at(&mut world, BodyKind::Dynamic, Vec3::ZERO);
        world.set_ready(false);
        assert_eq!(world.body_pose(s), Err(PhysicsError::NotReady));
        assert_eq!(world.intersect_sphere(Vec3::ZERO, 1.0), Err(PhysicsError::NotReady));
        assert_eq!(world.wake_up(s), Err(PhysicsError::NotReady));
    }

    #[test]
    fn test_unknown_body() {
        let world = SceneWorld::new();
        assert_eq!(
            world.damping(BodyHandle(9)),
            Err(PhysicsError::UnknownBody(BodyHandle(9)))
        );
    }

    #[test]
    fn test_damping_and_wake() {
        let mut world = SceneWorld::new();
        let s = unit_sphere_at(&mut world, BodyKind::Dynamic, Vec3::ZERO);
        world.set_damping(s, Damping { linear: 2.0, angular: 3.0 }).unwrap();
        assert_eq!(world.damping(s).unwrap(), Damping { linear: 2.0, angular: 3.0 });
        world.sleep(s);
        assert!(world.body(s).unwrap().sleeping);
        world.wake_up(s).unwrap();
        assert!(!world.body(s).unwrap().sleeping);
    }

    #[test]
    fn test_ground_under_tower() {
        let mut world = SceneWorld::new();
        let (table, _floor) = world.spawn_ground();
        world.build_tower(1, 1);
        let hits = world.intersect_sphere(Vec3::new(0.0, 0.0, 0.0), 0.1).unwrap();
        assert!(hits.contains(&table));
        assert!(!world.is_dynamic(table).unwrap());
    }
}
