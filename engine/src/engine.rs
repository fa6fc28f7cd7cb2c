//! Per-hand engine.
//!
//! `HandEngine` owns everything bound to the one tracked hand (gesture
//! machine, grab coordinator, cursor, orbit driver) and advances it with
//! an explicit `tick(keypoints, now_ms, world)` called by the host loop.
//!
//! Hand loss: the first `hand_loss_grace_frames` absent frames hold every
//! piece of state as it was.  The frame after that resets the gesture to
//! `Idle`, releases any grab, and parks anchors and cursor.  The next
//! frame with a hand teleports the anchors to it.

use glam::Vec3;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::cursor::{CursorFrame, CursorInput, CursorProjector};
use crate::grab::{GrabCoordinator, GrabEvent};
use crate::hand::gesture::{GestureMachine, GestureUpdate};
use crate::hand::keypoints::{HandKeypoint, Keypoint, KEYPOINT_COUNT};
use crate::hand::orbit::{OrbitDelta, OrbitDriver};
use crate::physics::{BodyHandle, PhysicsQuery, PhysicsWorld, SceneWorld};

/// Everything one tick produced.
#[derive(Debug, Clone)]
pub struct TickReport {
    pub at_ms: f64,
    pub hand_present: bool,
    /// Absent frame absorbed by the grace policy.
    pub grace: bool,
    pub gesture: GestureUpdate,
    pub grab_event: Option<GrabEvent>,
    pub cursor: CursorFrame,
    pub orbit: Option<OrbitDelta>,
    /// Pinch midpoint in world space.
    pub pinch_world: Option<Vec3>,
    pub hovered: Option<BodyHandle>,
    pub hovered_label: Option<String>,
    pub held: Option<BodyHandle>,
    pub held_label: Option<String>,
}

pub struct HandEngine {
    pub config: EngineConfig,
    gesture: GestureMachine,
    grab: GrabCoordinator,
    cursor: CursorProjector,
    orbit: OrbitDriver,
    /// Consecutive absent frames.
    absent_frames: u32,
    ticks: u64,
}

impl HandEngine {
    pub fn new(config: EngineConfig, anchors: [BodyHandle; KEYPOINT_COUNT]) -> Self {
        let gesture = GestureMachine::new(config.gesture.clone());
        let grab = GrabCoordinator::new(
            config.grab.clone(),
            config.mapper.clone(),
            config.depth.clone(),
            anchors,
        );
        let cursor = CursorProjector::new(config.cursor.clone());
        let orbit = OrbitDriver::new(config.orbit.clone());
        Self {
            config,
            gesture,
            grab,
            cursor,
            orbit,
            absent_frames: 0,
            ticks: 0,
        }
    }

    /// Spawn the anchor bodies in `world` and bind an engine to them.
    pub fn with_scene(config: EngineConfig, world: &mut SceneWorld) -> Self {
        let anchors = world.spawn_hand_anchors(config.grab.park_position);
        Self::new(config, anchors)
    }

    pub fn gesture(&self) -> &GestureMachine {
        &self.gesture
    }

    pub fn grab(&self) -> &GrabCoordinator {
        &self.grab
    }

    pub fn cursor(&self) -> &CursorProjector {
        &self.cursor
    }

    pub fn absent_frames(&self) -> u32 {
        self.absent_frames
    }

    /// Advance one tick.  `keypoints` is the first detected hand, or
    /// `None`/empty when no hand was detected.
    pub fn tick<W: PhysicsWorld>(
        &mut self,
        keypoints: Option<&[Keypoint]>,
        now_ms: f64,
        world: &mut W,
    ) -> TickReport {
        self.ticks += 1;
        let keypoints = match keypoints {
            Some(kps) if kps.len() == KEYPOINT_COUNT => Some(kps),
            Some([]) | None => None,
            Some(kps) => {
                debug_assert!(false, "malformed keypoint set: {} entries", kps.len());
                warn!("Dropping malformed keypoint set ({} entries)", kps.len());
                None
            }
        };

        match keypoints {
            Some(kps) => self.tick_present(kps, now_ms, world),
            None => self.tick_absent(now_ms, world),
        }
    }

    fn tick_present<W: PhysicsWorld>(
        &mut self,
        keypoints: &[Keypoint],
        now_ms: f64,
        world: &mut W,
    ) -> TickReport {
        if self.absent_frames > 0 {
            debug!("Hand back after {} absent frames", self.absent_frames);
        }
        self.absent_frames = 0;

        let gesture = self.gesture.update(Some(keypoints), now_ms);
        let grab_event = self.grab.update(world, keypoints, &gesture);

        let pinch_world = self.grab.project_pinch(Some(keypoints));
        let direction = self.grab.anchor_position(HandKeypoint::IndexTip)
            - self.grab.anchor_position(HandKeypoint::ThumbTip);
        let held = self.grab.held_body();
        let cursor = self.cursor.update(
            &*world,
            pinch_world.map(|target| CursorInput { target, direction }),
            gesture.state,
            held.is_some(),
        );
        let orbit = self.orbit.update(gesture.state, Some(keypoints));

        self.report(&*world, now_ms, true, false, gesture, grab_event, cursor, orbit, pinch_world)
    }

    fn tick_absent<W: PhysicsWorld>(&mut self, now_ms: f64, world: &mut W) -> TickReport {
        self.absent_frames = self.absent_frames.saturating_add(1);

        if self.absent_frames <= self.config.hand_loss_grace_frames {
            let state = self.gesture.state();
            let gesture = GestureUpdate {
                state,
                previous: state,
                confidence: self.gesture.confidence(),
                pinch_point: None,
                metrics: None,
                at_ms: now_ms,
            };
            let cursor = *self.cursor.last();
            return self.report(&*world, now_ms, false, true, gesture, None, cursor, None, None);
        }

        let gesture = self.gesture.update(None, now_ms);
        let grab_event = self.grab.release(world);
        if self.absent_frames == self.config.hand_loss_grace_frames + 1 {
            self.grab.park(world);
            self.cursor.park();
            self.orbit.reset();
        }
        let cursor = *self.cursor.last();
        self.report(&*world, now_ms, false, false, gesture, grab_event, cursor, None, None)
    }

    #[allow(clippy::too_many_arguments)]
    fn report<Q: PhysicsQuery>(
        &self,
        world: &Q,
        at_ms: f64,
        hand_present: bool,
        grace: bool,
        gesture: GestureUpdate,
        grab_event: Option<GrabEvent>,
        cursor: CursorFrame,
        orbit: Option<OrbitDelta>,
        pinch_world: Option<Vec3>,
    ) -> TickReport {
        let held = self.grab.held_body();
        let label = |body: BodyHandle| world.label(body).unwrap_or_else(|| body.to_string());
        TickReport {
            at_ms,
            hand_present,
            grace,
            gesture,
            grab_event,
            orbit,
            pinch_world,
            hovered: cursor.hovered,
            hovered_label: cursor.hovered.map(label),
            held,
            held_label: held.map(label),
            cursor,
        }
    }

    /// S-expression for status output.
    pub fn status_sexp(&self, now_ms: f64) -> String {
        format!(
            "(:ticks {} :absent-frames {} :gesture {} :grab {} :cursor {})",
            self.ticks,
            self.absent_frames,
            self.gesture.status_sexp(now_ms),
            self.grab.status_sexp(),
            self.cursor.last().visual.as_str(),
        )
    }
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hand::gesture::{make_palm_hand, make_pinch_hand, make_relaxed_hand, GestureState};
    use crate::physics::{BodyKind, Damping, JointHandle, Pose, Shape};

    const FRAME_MS: f64 = 16.0;

    fn setup(grace: u32) -> (HandEngine, SceneWorld) {
        let mut world = SceneWorld::new();
        let config = EngineConfig {
            hand_loss_grace_frames: grace,
            ..EngineConfig::default()
        };
        let engine = HandEngine::with_scene(config, &mut world);
        (engine, world)
    }

    fn tick(engine: &mut HandEngine, world: &mut SceneWorld, hand: Option<&[Keypoint]>, t: f64) -> TickReport {
        let report = engine.tick(hand, t, world);
        world.step();
        report
    }

    fn thumb_pose(engine: &HandEngine, world: &SceneWorld) -> Pose {
        world.body_pose(engine.grab().anchor(HandKeypoint::ThumbTip)).unwrap()
    }

    /// Shows the pinch hand once, then puts a block beside the pinch point.
    fn place_block(engine: &mut HandEngine, world: &mut SceneWorld) -> (BodyHandle, Pose) {
        tick(engine, world, Some(&make_pinch_hand()), 0.0);

        let thumb = thumb_pose(engine, world).translation;
        let index = world
            .body_pose(engine.grab().anchor(HandKeypoint::IndexTip))
            .unwrap()
            .translation;
        let mid = (thumb + index) / 2.0;
        let pose = Pose::new(mid + Vec3::new(0.3, -0.2, 0.0), glam::Quat::from_rotation_y(0.3));
        let block = world.add_labeled_body(
            BodyKind::Dynamic,
            pose,
            Shape::cuboid(Vec3::splat(0.5)),
            "7-0",
        );
        (block, pose)
    }

    /// Holds the pinch until the block is captured.  Returns the capture time.
    fn pinch_until_captured(engine: &mut HandEngine, world: &mut SceneWorld, block: BodyHandle) -> f64 {
        let hand = make_pinch_hand();
        let mut t = 0.0;
        loop {
            t += FRAME_MS;
            let report = tick(engine, world, Some(&hand), t);
            if report.grab_event.is_some() {
                assert_eq!(
                    report.grab_event,
                    Some(GrabEvent::Captured { body: block, joint: JointHandle(0) })
                );
                return t;
            }
            assert!(t < 500.0, "never captured");
        }
    }

    fn grab_block(engine: &mut HandEngine, world: &mut SceneWorld) -> (BodyHandle, f64) {
        let (block, _) = place_block(engine, world);
        let t = pinch_until_captured(engine, world, block);
        (block, t)
    }

    #[test]
    fn test_grab_keeps_relative_pose() {
        let (mut engine, mut world) = setup(1);
        let (block, placed) = place_block(&mut engine, &mut world);
        pinch_until_captured(&mut engine, &mut world, block);

        // Capture and the following step did not move the block
        let block_pose = world.body_pose(block).unwrap();
        assert!(block_pose.abs_diff_eq(&placed, 1e-4), "snapped: {:?} vs {:?}", block_pose, placed);
        let rel = thumb_pose(&engine, &world).inverse() * block_pose;

        // Move the hand; the block follows with the same offset
        let mut hand = make_pinch_hand();
        for kp in hand.iter_mut() {
            kp.y -= 0.05;
        }
        let mut t = 200.0;
        for _ in 0..20 {
            t += FRAME_MS;
            tick(&mut engine, &mut world, Some(&hand), t);
        }
        let thumb = thumb_pose(&engine, &world);
        let now = world.body_pose(block).unwrap();
        assert!(now.translation.y > block_pose.translation.y + 1.0, "block did not lift: {:?}", now);
        assert!((thumb * rel).abs_diff_eq(&now, 1e-4));
    }

    #[test]
    fn test_report_labels_and_damping() {
        let (mut engine, mut world) = setup(1);
        let (block, t) = grab_block(&mut engine, &mut world);
        let report = tick(&mut engine, &mut world, Some(&make_pinch_hand()), t + FRAME_MS);
        assert_eq!(report.held, Some(block));
        assert_eq!(report.held_label.as_deref(), Some("7-0"));
        assert_eq!(report.cursor.visual, crate::cursor::CursorVisual::Grabbing);
        assert!(report.pinch_world.is_some());
        assert_eq!(world.damping(block).unwrap().linear, 10.0);

        let report = tick(&mut engine, &mut world, Some(&make_relaxed_hand()), t + 2.0 * FRAME_MS);
        assert_eq!(report.grab_event, Some(GrabEvent::Released { body: block }));
        assert_eq!(world.damping(block).unwrap().linear, 0.0);
        assert!(report.held_label.is_none());
        assert_eq!(world.joint_count(), 0);
    }

    #[test]
    fn test_single_absent_frame_is_tolerated() {
        let (mut engine, mut world) = setup(1);
        let (block, t) = grab_block(&mut engine, &mut world);

        let report = tick(&mut engine, &mut world, None, t + FRAME_MS);
        assert!(report.grace);
        assert!(report.grab_event.is_none());
        assert_eq!(report.gesture.state, GestureState::Pinching);
        assert_eq!(report.held, Some(block));
        assert_eq!(world.joint_count(), 1);

        // Hand comes back: still the same grab
        let report = tick(&mut engine, &mut world, Some(&make_pinch_hand()), t + 2.0 * FRAME_MS);
        assert!(report.grab_event.is_none());
        assert_eq!(report.held, Some(block));
        assert_eq!(engine.absent_frames(), 0);
    }

    #[test]
    fn test_second_absent_frame_releases_and_parks() {
        let (mut engine, mut world) = setup(1);
        let (block, t) = grab_block(&mut engine, &mut world);

        tick(&mut engine, &mut world, None, t + FRAME_MS);
        let report = tick(&mut engine, &mut world, None, t + 2.0 * FRAME_MS);
        assert!(!report.grace);
        assert_eq!(report.grab_event, Some(GrabEvent::Released { body: block }));
        assert_eq!(report.gesture.state, GestureState::Idle);
        assert!(!report.cursor.visible);
        assert_eq!(world.joint_count(), 0);
        assert_eq!(thumb_pose(&engine, &world).translation, Vec3::new(0.0, -100.0, 0.0));

        // Further absent frames are quiet
        let report = tick(&mut engine, &mut world, None, t + 3.0 * FRAME_MS);
        assert!(report.grab_event.is_none());
    }

    #[test]
    fn test_zero_grace_resets_immediately() {
        let (mut engine, mut world) = setup(0);
        let (block, t) = grab_block(&mut engine, &mut world);
        let report = tick(&mut engine, &mut world, None, t + FRAME_MS);
        assert_eq!(report.grab_event, Some(GrabEvent::Released { body: block }));
        assert!(engine.grab().is_parked());
    }

    #[test]
    fn test_release_retried_after_world_recovers() {
        let (mut engine, mut world) = setup(0);
        let (block, t) = grab_block(&mut engine, &mut world);

        world.set_ready(false);
        let report = tick(&mut engine, &mut world, None, t + FRAME_MS);
        assert!(report.grab_event.is_none());
        assert_eq!(report.held, Some(block));

        world.set_ready(true);
        let report = tick(&mut engine, &mut world, None, t + 2.0 * FRAME_MS);
        assert_eq!(report.grab_event, Some(GrabEvent::Released { body: block }));
        assert!(report.held.is_none());
        assert_eq!(world.joint_count(), 0);
        assert_eq!(world.damping(block).unwrap(), Damping::default());
    }

    #[test]
    fn test_reacquire_teleports() {
        let (mut engine, mut world) = setup(0);
        let hand = make_relaxed_hand();
        tick(&mut engine, &mut world, Some(&hand), 0.0);
        tick(&mut engine, &mut world, None, 16.0);
        assert!(engine.grab().is_parked());

        tick(&mut engine, &mut world, Some(&hand), 32.0);
        let wrist = engine.grab().anchor(HandKeypoint::Wrist);
        let expected = engine.grab().project(&hand, &hand[HandKeypoint::Wrist.index()]);
        let actual = world.body_pose(wrist).unwrap().translation;
        assert!((actual - expected).length() < 1e-5, "{:?} vs {:?}", actual, expected);
    }

    #[test]
    fn test_gesture_runs_without_physics() {
        let (mut engine, mut world) = setup(1);
        world.set_ready(false);
        let hand = make_pinch_hand();
        let mut last = None;
        for i in 0..10 {
            last = Some(engine.tick(Some(&hand), i as f64 * FRAME_MS, &mut world));
        }
        let report = last.unwrap();
        assert_eq!(report.gesture.state, GestureState::Pinching);
        assert!(report.held.is_none());
        assert!(report.hovered.is_none());
    }

    #[test]
    fn test_palm_drives_orbit() {
        let (mut engine, mut world) = setup(1);
        let mut hand = make_palm_hand();
        let mut deltas = Vec::new();
        for i in 0..12 {
            for kp in hand.iter_mut() {
                kp.x += 0.005;
            }
            let report = tick(&mut engine, &mut world, Some(&hand), 300.0 + i as f64 * FRAME_MS);
            if let Some(d) = report.orbit {
                deltas.push(d);
            }
        }
        assert!(!deltas.is_empty());
        assert!(deltas.iter().all(|d| d.azimuth > 0.0), "got {:?}", deltas);
        assert_eq!(engine.cursor().last().visual, crate::cursor::CursorVisual::PalmMode);
    }

    #[test]
    fn test_empty_slice_is_absent() {
        let (mut engine, mut world) = setup(0);
        let report = tick(&mut engine, &mut world, Some(&[]), 0.0);
        assert!(!report.hand_present);
        assert_eq!(report.gesture.state, GestureState::Idle);
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "malformed keypoint set")]
    fn test_malformed_count_asserts() {
        let (mut engine, mut world) = setup(1);
        let short = vec![Keypoint::default(); 12];
        engine.tick(Some(&short), 0.0, &mut world);
    }

    #[test]
    fn test_status_sexp() {
        let (engine, _world) = setup(1);
        let sexp = engine.status_sexp(0.0);
        assert!(sexp.starts_with("(:ticks 0 :absent-frames 0"));
        assert!(sexp.contains(":grabbing nil"));
    }
}
