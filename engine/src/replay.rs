//! Frame-log replay.
//!
//! A frame log holds one s-expression per line:
//!
//! ```text
//! ; comment
//! (:t 16.0 :hand ((0.5 0.6 0.0) (0.49 0.55 -0.01) ...))
//! (:t 32.0 :hand nil)
//! (:t 48.0)
//! ```
//!
//! `:hand` carries the 21 keypoints in landmark order; `nil`, `()` or a
//! missing `:hand` means no hand was detected that frame.

use anyhow::{bail, Context};
use lexpr::Value;
use tracing::{debug, info};

use crate::config::{get_float, get_value, parse_vec3};
use crate::engine::HandEngine;
use crate::grab::GrabEvent;
use crate::hand::keypoints::{HandKeypoint, Keypoint, KEYPOINT_COUNT};
use crate::physics::SceneWorld;
use crate::session::SessionState;

/// Milliseconds between synthetic frames.
pub const FRAME_INTERVAL_MS: f64 = 16.0;

#[derive(Debug, Clone, PartialEq)]
pub struct ReplayFrame {
    pub t_ms: f64,
    pub hand: Option<Vec<Keypoint>>,
}

impl ReplayFrame {
    /// One log line for this frame.
    pub fn to_sexp(&self) -> String {
        match &self.hand {
            Some(hand) => {
                let points: Vec<String> = hand
                    .iter()
                    .map(|kp| format!("({} {} {})", kp.x, kp.y, kp.z))
                    .collect();
                format!("(:t {} :hand ({}))", self.t_ms, points.join(" "))
            }
            None => format!("(:t {} :hand nil)", self.t_ms),
        }
    }
}

// ── Parsing ────────────────────────────────────────────────

/// Parse a whole frame log.
pub fn parse_frames(text: &str) -> anyhow::Result<Vec<ReplayFrame>> {
    let mut frames = Vec::new();
    for (n, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with(';') {
            continue;
        }
        let frame = parse_frame(line).with_context(|| format!("frame log line {}", n + 1))?;
        frames.push(frame);
    }
    Ok(frames)
}

fn parse_frame(line: &str) -> anyhow::Result<ReplayFrame> {
    let value = lexpr::from_str(line).context("not a valid s-expression")?;
    let Some(t_ms) = get_float(&value, "t")? else {
        bail!("missing :t");
    };
    let hand = match get_value(&value, "hand") {
        None => None,
        Some(v) => parse_hand(v)?,
    };
    Ok(ReplayFrame { t_ms, hand })
}

fn parse_hand(value: &Value) -> anyhow::Result<Option<Vec<Keypoint>>> {
    match value {
        Value::Nil | Value::Null => return Ok(None),
        Value::Symbol(s) if &**s == "nil" => return Ok(None),
        _ => {}
    }
    let Some(entries) = value.list_iter() else {
        bail!(":hand expects a list of (x y z), got {}", value);
    };
    let hand = entries
        .enumerate()
        .map(|(i, entry)| {
            let v = parse_vec3(entry).with_context(|| format!("keypoint {}", i))?;
            Ok(Keypoint::new(v.x, v.y, v.z))
        })
        .collect::<anyhow::Result<Vec<_>>>()?;
    if hand.len() != KEYPOINT_COUNT {
        bail!(":hand has {} keypoints, expected {}", hand.len(), KEYPOINT_COUNT);
    }
    Ok(Some(hand))
}

// ── Synthetic session ──────────────────────────────────────

/// Wrist to middle-MCP distance of the synthetic hand.  Maps to a world
/// depth just in front of the tower's center plane.
const HAND_SCALE: f32 = 0.19;
/// Thumb/index gap of a relaxed hand (above the pinch-exit threshold).
const RELAXED_GAP: f32 = 0.134;
/// Thumb/index gap of a pinch.
const PINCH_GAP: f32 = 0.02;
/// Image-space pinch point over the center block of level 5.
const TARGET: (f32, f32) = (0.5, 0.41333);

/// A hand whose pinch point sits at `(px, py)` with the given thumb/index
/// gap.  Non-pinching fingers are curled onto the middle MCP.
fn pinch_pose(px: f32, py: f32, gap: f32) -> Vec<Keypoint> {
    let mcp = Keypoint::new(px, py + 0.05, 0.0);
    let mut hand = vec![mcp; KEYPOINT_COUNT];
    hand[HandKeypoint::Wrist.index()] = Keypoint::new(px, mcp.y + HAND_SCALE, 0.0);
    hand[HandKeypoint::ThumbTip.index()] = Keypoint::new(px - gap / 2.0, py, 0.0);
    hand[HandKeypoint::IndexTip.index()] = Keypoint::new(px + gap / 2.0, py, 0.0);
    hand
}

/// Open hand with all five fingers extended and spread, wrist at `(wx, wy)`.
fn palm_pose(wx: f32, wy: f32) -> Vec<Keypoint> {
    let mut hand = vec![Keypoint::new(wx, wy - HAND_SCALE, 0.0); KEYPOINT_COUNT];
    let mut set = |which: HandKeypoint, dx: f32, dy: f32| {
        hand[which.index()] = Keypoint::new(wx + dx, wy + dy, 0.0);
    };
    set(HandKeypoint::Wrist, 0.0, 0.0);
    set(HandKeypoint::ThumbTip, -0.3, -0.09);
    set(HandKeypoint::IndexTip, -0.15, -0.34);
    set(HandKeypoint::MiddleTip, -0.03, -0.37);
    set(HandKeypoint::RingTip, 0.09, -0.35);
    set(HandKeypoint::PinkyTip, 0.2, -0.29);
    hand
}

fn lerp2(a: (f32, f32), b: (f32, f32), t: f32) -> (f32, f32) {
    (a.0 + (b.0 - a.0) * t, a.1 + (b.1 - a.1) * t)
}

/// A scripted session: the hand appears beside the tower, moves its pinch
/// point onto a block, pinches, lifts, lets go, drags the camera with an
/// open palm and leaves.
pub fn synthetic_session() -> Vec<ReplayFrame> {
    let start = (0.75, 0.6);
    let lifted = (TARGET.0, 0.25);

    let mut hands: Vec<Option<Vec<Keypoint>>> = Vec::new();
    hands.extend((0..10).map(|_| None));
    hands.extend((0..30).map(|i| {
        let (x, y) = lerp2(start, TARGET, i as f32 / 29.0);
        Some(pinch_pose(x, y, RELAXED_GAP))
    }));
    hands.extend((0..20).map(|_| Some(pinch_pose(TARGET.0, TARGET.1, PINCH_GAP))));
    hands.extend((0..30).map(|i| {
        let (x, y) = lerp2(TARGET, lifted, (i + 1) as f32 / 30.0);
        Some(pinch_pose(x, y, PINCH_GAP))
    }));
    hands.extend((0..10).map(|_| Some(pinch_pose(lifted.0, lifted.1, RELAXED_GAP))));
    hands.extend((0..30).map(|i| Some(palm_pose(0.45 + 0.1 * i as f32 / 29.0, 0.7))));
    hands.extend((0..10).map(|_| None));

    hands
        .into_iter()
        .enumerate()
        .map(|(i, hand)| ReplayFrame {
            t_ms: i as f64 * FRAME_INTERVAL_MS,
            hand,
        })
        .collect()
}

// ── Replay loop ────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct ReplaySummary {
    pub frames: usize,
    pub captures: usize,
    pub releases: usize,
    pub misses: usize,
    /// Ticks that produced a camera-orbit delta.
    pub orbit_frames: usize,
    /// Labels of captured bodies, in capture order.
    pub held_labels: Vec<String>,
    pub final_session: String,
}

impl ReplaySummary {
    pub fn status_sexp(&self) -> String {
        let labels: Vec<String> = self.held_labels.iter().map(|l| format!("\"{}\"", l)).collect();
        format!(
            "(:frames {} :captures {} :releases {} :misses {} :orbit-frames {} :held ({}) :session {})",
            self.frames,
            self.captures,
            self.releases,
            self.misses,
            self.orbit_frames,
            labels.join(" "),
            self.final_session,
        )
    }
}

/// Drive `engine` through `frames`, stepping the world and publishing
/// into `session` after every tick.
pub fn run_replay(
    engine: &mut HandEngine,
    world: &mut SceneWorld,
    session: &mut SessionState,
    frames: &[ReplayFrame],
) -> ReplaySummary {
    let mut summary = ReplaySummary::default();

    for frame in frames {
        let report = engine.tick(frame.hand.as_deref(), frame.t_ms, world);
        world.step();
        session.publish(&report, frame.t_ms);

        if report.gesture.changed() {
            debug!(
                "t={:.0} gesture {} -> {} ({:.2})",
                frame.t_ms,
                report.gesture.previous.as_str(),
                report.gesture.state.as_str(),
                report.gesture.confidence
            );
        }
        match &report.grab_event {
            Some(GrabEvent::Captured { .. }) => {
                summary.captures += 1;
                if let Some(label) = &report.held_label {
                    summary.held_labels.push(label.clone());
                }
            }
            Some(GrabEvent::Released { .. }) => summary.releases += 1,
            Some(GrabEvent::Missed { .. }) => summary.misses += 1,
            None => {}
        }
        if report.orbit.is_some() {
            summary.orbit_frames += 1;
        }
        summary.frames += 1;
    }

    summary.final_session = session.status_sexp();
    info!(
        "Replayed {} frames: {} captures, {} releases, {} misses",
        summary.frames, summary.captures, summary.releases, summary.misses
    );
    summary
}

// ── Tests ──────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::hand::gesture::{calculate_gesture_metrics, GestureConfig};
    use crate::hand::keypoints::pinch_point;
    use crate::physics::PhysicsQuery;
    use crate::session::GameMode;

    fn hand_line(t: f64) -> String {
        let points = vec!["(0.5 0.5 0)"; KEYPOINT_COUNT].join(" ");
        format!("(:t {} :hand ({}))", t, points)
    }

    #[test]
    fn test_parse_present_and_absent() {
        let log = format!(
            "; recorded session\n\n{}\n(:t 32 :hand nil)\n(:t 48)\n(:t 64 :hand ())\n",
            hand_line(16.0)
        );
        let frames = parse_frames(&log).unwrap();
        assert_eq!(frames.len(), 4);
        assert_eq!(frames[0].t_ms, 16.0);
        let hand = frames[0].hand.as_ref().unwrap();
        assert_eq!(hand.len(), KEYPOINT_COUNT);
        assert_eq!(hand[0], Keypoint::new(0.5, 0.5, 0.0));
        assert!(frames[1..].iter().all(|f| f.hand.is_none()), "{:?}", frames);
    }

    #[test]
    fn test_parse_errors_name_the_line() {
        let err = parse_frames("(:t 0)\n(:hand nil)\n").unwrap_err();
        assert!(format!("{:#}", err).contains("line 2"), "got {:#}", err);

        let err = parse_frames("(:t 0 :hand ((0 0 0)))").unwrap_err();
        assert!(format!("{:#}", err).contains("keypoints"), "got {:#}", err);

        assert!(parse_frames("(:t 0 :hand ((0 0) ").is_err());
        assert!(parse_frames("(:t fast)").is_err());
    }

    #[test]
    fn test_to_sexp_reparses() {
        let frames = synthetic_session();
        let log: Vec<String> = frames.iter().map(ReplayFrame::to_sexp).collect();
        let parsed = parse_frames(&log.join("\n")).unwrap();
        assert_eq!(parsed.len(), frames.len());
        assert_eq!(parsed[0], frames[0]);
        assert_eq!(parsed[40].hand.as_ref().map(Vec::len), Some(KEYPOINT_COUNT));
    }

    #[test]
    fn test_synthetic_hand_shapes() {
        let cfg = GestureConfig::default();
        let relaxed = pinch_pose(0.5, 0.4, RELAXED_GAP);
        let m = calculate_gesture_metrics(&cfg, Some(&relaxed)).unwrap();
        assert!(m.pinch_distance > cfg.pinch_exit);
        assert!(!m.all_fingers_extended);

        let pinch = pinch_pose(0.5, 0.4, PINCH_GAP);
        let m = calculate_gesture_metrics(&cfg, Some(&pinch)).unwrap();
        assert!(m.pinch_distance < cfg.pinch_enter);
        let mid = pinch_point(Some(&pinch)).unwrap();
        assert!((mid.x - 0.5).abs() < 1e-6 && (mid.y - 0.4).abs() < 1e-6, "{:?}", mid);

        let palm = palm_pose(0.5, 0.7);
        let m = calculate_gesture_metrics(&cfg, Some(&palm)).unwrap();
        assert!(m.all_fingers_extended && m.thumb_extended, "{:?}", m);
        assert!(m.finger_spread > cfg.palm_finger_spread, "{:?}", m);
    }

    #[test]
    fn test_synthetic_session_grabs_a_block() {
        let mut world = SceneWorld::new();
        world.spawn_ground();
        world.build_tower(18, 7);
        let mut engine = HandEngine::with_scene(EngineConfig::default(), &mut world);
        let mut session = SessionState::default();
        session.start_game(GameMode::Classic);

        let frames = synthetic_session();
        let summary = run_replay(&mut engine, &mut world, &mut session, &frames);

        assert_eq!(summary.frames, frames.len());
        assert_eq!(summary.captures, 1, "{:?}", summary);
        assert_eq!(summary.releases, 1, "{:?}", summary);
        assert_eq!(summary.misses, 0, "{:?}", summary);
        assert_eq!(summary.held_labels, vec!["5-0".to_string()]);
        assert!(summary.orbit_frames > 0, "{:?}", summary);

        assert!(session.is_safe("5-0"));
        assert!(session.held_block.is_none());
        assert!(summary.final_session.contains(":mode classic"));

        // The block was lifted with the hand
        let block = world.find_label("5-0").unwrap();
        let pose = world.body_pose(block).unwrap();
        assert!(pose.translation.y > 8.25 + 4.0, "{:?}", pose);
        assert!(world.joint_count() == 0);
        assert!(engine.grab().is_parked());
    }
}
