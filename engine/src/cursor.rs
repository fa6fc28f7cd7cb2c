//! Cursor/feedback projector.
//!
//! Presentation-only indicator at the pinch point: a smoothed position,
//! an orientation along the thumb→index direction, a discrete visual
//! state, and a proximity scalar toward the nearest grabbable body.  Reads
//! the physics world through [`PhysicsQuery`] and never writes to it.

use glam::{Quat, Vec3};
use tracing::warn;

use crate::hand::gesture::GestureState;
use crate::hand::smoothing::ema_vec3;
use crate::physics::{BodyHandle, PhysicsQuery};

#[derive(Debug, Clone, PartialEq)]
pub struct CursorConfig {
    /// Bodies within this radius of the cursor count as in range.
    pub detection_radius: f32,
    /// EMA factor toward the projected pinch point.
    pub smoothing_alpha: f32,
    /// Off-scene position while no hand is tracked.
    pub park_position: Vec3,
}

impl Default for CursorConfig {
    fn default() -> Self {
        Self {
            detection_radius: 2.0,
            smoothing_alpha: 0.2,
            park_position: Vec3::new(0.0, -100.0, 0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CursorVisual {
    #[default]
    Idle,
    InRange,
    Grabbing,
    PalmMode,
}

impl CursorVisual {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::InRange => "in-range",
            Self::Grabbing => "grabbing",
            Self::PalmMode => "palm-mode",
        }
    }
}

/// Per-tick hand input, already in world space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorInput {
    /// Projected pinch midpoint.
    pub target: Vec3,
    /// Thumb tip to index tip.
    pub direction: Vec3,
}

/// What the presentation layer draws this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorFrame {
    pub position: Vec3,
    pub orientation: Quat,
    pub visual: CursorVisual,
    /// 0 at the detection-radius edge, 1 at the body center.
    pub proximity: f32,
    pub hovered: Option<BodyHandle>,
    pub visible: bool,
}

pub struct CursorProjector {
    pub config: CursorConfig,
    frame: CursorFrame,
    needs_teleport: bool,
}

impl CursorProjector {
    pub fn new(config: CursorConfig) -> Self {
        let frame = CursorFrame {
            position: config.park_position,
            orientation: Quat::IDENTITY,
            visual: CursorVisual::Idle,
            proximity: 0.0,
            hovered: None,
            visible: false,
        };
        Self {
            config,
            frame,
            needs_teleport: true,
        }
    }

    /// The most recent frame.
    pub fn last(&self) -> &CursorFrame {
        &self.frame
    }

    pub fn update<Q: PhysicsQuery>(
        &mut self,
        world: &Q,
        input: Option<CursorInput>,
        gesture: GestureState,
        holding: bool,
    ) -> CursorFrame {
        let Some(input) = input else {
            self.park();
            return self.frame;
        };

        let position = if self.needs_teleport {
            self.needs_teleport = false;
            input.target
        } else {
            ema_vec3(self.frame.position, input.target, self.config.smoothing_alpha)
        };

        let orientation = if input.direction.length_squared() > 1e-12 {
            Quat::from_rotation_arc(Vec3::Y, input.direction.normalize())
        } else {
            self.frame.orientation
        };

        let (hovered, proximity) = self.nearest(world, position);

        let visual = if holding {
            CursorVisual::Grabbing
        } else if gesture.is_closed_fist() {
            CursorVisual::PalmMode
        } else if hovered.is_some() {
            CursorVisual::InRange
        } else {
            CursorVisual::Idle
        };

        self.frame = CursorFrame {
            position,
            orientation,
            visual,
            proximity,
            hovered,
            visible: true,
        };
        self.frame
    }

    /// Jump to the park position and re-arm the teleport.
    pub fn park(&mut self) {
        self.needs_teleport = true;
        self.frame = CursorFrame {
            position: self.config.park_position,
            visual: CursorVisual::Idle,
            proximity: 0.0,
            hovered: None,
            visible: false,
            ..self.frame
        };
    }

    fn nearest<Q: PhysicsQuery>(&self, world: &Q, at: Vec3) -> (Option<BodyHandle>, f32) {
        let radius = self.config.detection_radius;
        let hits = match world.intersect_sphere(at, radius) {
            Ok(hits) => hits,
            Err(e) => {
                warn!("Cursor proximity unavailable: {}", e);
                return (None, 0.0);
            }
        };

        let mut best: Option<(BodyHandle, f32)> = None;
        for body in hits {
            if !world.is_dynamic(body).unwrap_or(false) {
                continue;
            }
            let Ok(pose) = world.body_pose(body) else {
                continue;
            };
            let dist = pose.translation.distance(at);
            if best.is_none_or(|(_, d)| dist < d) {
                best = Some((body, dist));
            }
        }

        match best {
            Some((body, dist)) => (Some(body), (1.0 - dist / radius).clamp(0.0, 1.0)),
            None => (None, 0.0),
        }
    }
}

impl Default for CursorProjector {
    fn default() -> Self {
        Self::new(CursorConfig::default())
    }
}
