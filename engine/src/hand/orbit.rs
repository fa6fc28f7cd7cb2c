//! Open-palm camera orbit.
//!
//! While the hand holds `OpenPalm`, wrist motion between ticks becomes an
//! orbit delta for the external camera controller.  Horizontal motion
//! turns azimuth; vertical motion tilts the polar angle (moving the hand up
//! tilts the view down).

use super::gesture::GestureState;
use super::keypoints::{get, HandKeypoint, Keypoint};

#[derive(Debug, Clone, PartialEq)]
pub struct OrbitConfig {
    /// Radians of orbit per unit of normalized wrist motion.
    pub sensitivity: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self { sensitivity: 15.0 }
    }
}

/// Angles to add to the camera's spherical coordinates.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct OrbitDelta {
    pub azimuth: f32,
    pub polar: f32,
}

/// Tracks the wrist across consecutive palm frames.
#[derive(Debug, Clone, Default)]
pub struct OrbitDriver {
    pub config: OrbitConfig,
    last_wrist: Option<Keypoint>,
}

impl OrbitDriver {
    pub fn new(config: OrbitConfig) -> Self {
        Self {
            config,
            last_wrist: None,
        }
    }

    /// Whether a palm drag is in progress.
    pub fn is_active(&self) -> bool {
        self.last_wrist.is_some()
    }

    /// Feed one tick.  Returns a delta only on the second and later
    /// consecutive `OpenPalm` frames.
    pub fn update(&mut self, state: GestureState, keypoints: Option<&[Keypoint]>) -> Option<OrbitDelta> {
        if !state.is_closed_fist() {
            self.last_wrist = None;
            return None;
        }
        let Some(wrist) = keypoints.and_then(|kps| get(kps, HandKeypoint::Wrist)).copied() else {
            self.last_wrist = None;
            return None;
        };

        let delta = self.last_wrist.map(|prev| OrbitDelta {
            azimuth: (wrist.x - prev.x) * self.config.sensitivity,
            polar: -(wrist.y - prev.y) * self.config.sensitivity,
        });
        self.last_wrist = Some(wrist);
        delta
    }

    pub fn reset(&mut self) {
        self.last_wrist = None;
    }
}
