//! World depth from apparent hand scale.
//!
//! The wrist → middle-metacarpal distance in the image plane grows as the
//! hand approaches the camera.  It is clamped to a band and remapped
//! linearly onto a world Z band where larger Z is closer to the camera.

use super::keypoints::{get, HandKeypoint, Keypoint};

#[derive(Debug, Clone, PartialEq)]
pub struct DepthConfig {
    /// Apparent scale of a far hand.
    pub min_dist: f32,
    /// Apparent scale of a near hand.
    pub max_dist: f32,
    /// World Z for a far hand (pushed into the scene).
    pub min_z: f32,
    /// World Z for a near hand.
    pub max_z: f32,
}

impl Default for DepthConfig {
    fn default() -> Self {
        Self {
            min_dist: 0.05,
            max_dist: 0.30,
            min_z: -2.5,
            max_z: 2.0,
        }
    }
}

/// World Z for a keypoint set, `0.0` when the scale landmarks are missing.
pub fn calculate_depth(config: &DepthConfig, keypoints: &[Keypoint]) -> f32 {
    let (Some(wrist), Some(mcp)) = (
        get(keypoints, HandKeypoint::Wrist),
        get(keypoints, HandKeypoint::MiddleMcp),
    ) else {
        return 0.0;
    };

    let dist = wrist.distance_2d(mcp).clamp(config.min_dist, config.max_dist);
    let t = (dist - config.min_dist) / (config.max_dist - config.min_dist);
    config.min_z + t * (config.max_z - config.min_z)
}
