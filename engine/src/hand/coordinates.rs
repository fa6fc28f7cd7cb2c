//! Coordinate mapping from camera-normalized image space to world X/Y.
//!
//! The camera view is mirrored: a smaller normalized x is further to the
//! user's right, which maps to positive world X.  Image y grows downward,
//! world Y grows upward.

use glam::Vec3;

use super::keypoints::Keypoint;

/// Fixed world extents and reach expansion.
#[derive(Debug, Clone, PartialEq)]
pub struct MapperConfig {
    /// World units spanned by the (unexpanded) image width.
    pub world_width: f32,
    /// World units spanned by the (unexpanded) image height.
    pub world_height: f32,
    /// Added to every mapped world Y.
    pub y_offset: f32,
    /// Expansion about the image center (1.0 = none).  Values above 1.0
    /// let the hand reach the scene edges before leaving the camera frame.
    pub sensitivity: f32,
}

impl Default for MapperConfig {
    fn default() -> Self {
        Self {
            world_width: 40.0,
            world_height: 30.0,
            y_offset: 5.0,
            sensitivity: 1.25,
        }
    }
}

/// Map a normalized `(nx, ny)` to world `(x, y)`.
pub fn normalize_coordinates(config: &MapperConfig, nx: f32, ny: f32) -> (f32, f32) {
    let ex = 0.5 + (nx - 0.5) * config.sensitivity;
    let ey = 0.5 + (ny - 0.5) * config.sensitivity;
    let world_x = (0.5 - ex) * config.world_width;
    let world_y = (0.5 - ey) * config.world_height + config.y_offset;
    (world_x, world_y)
}

/// World position of one keypoint.  `hand_z` is the whole hand's depth;
/// the keypoint's own relative z is inverted (tracker z shrinks toward the
/// camera, world z grows) and scaled on top of it.
pub fn project_keypoint(
    config: &MapperConfig,
    keypoint: &Keypoint,
    hand_z: f32,
    relative_z_scale: f32,
) -> Vec3 {
    let (x, y) = normalize_coordinates(config, keypoint.x, keypoint.y);
    Vec3::new(x, y, hand_z - keypoint.z * relative_z_scale)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_center_maps_to_offset() {
        let cfg = MapperConfig::default();
        let (x, y) = normalize_coordinates(&cfg, 0.5, 0.5);
        assert_eq!(x, 0.0);
        assert!((y - cfg.y_offset).abs() < 1e-6, "got {}", y);
    }

    #[test]
    fn test_mirrored_x_is_symmetric() {
        let cfg = MapperConfig::default();
        let (right, _) = normalize_coordinates(&cfg, 0.0, 0.5);
        let (left, _) = normalize_coordinates(&cfg, 1.0, 0.5);
        assert!(right > 0.0, "image left edge should be world +X, got {}", right);
        assert!(left < 0.0);
        assert!((right + left).abs() < 1e-5, "{} vs {}", right, left);
    }

    #[test]
    fn test_y_inverted() {
        let cfg = MapperConfig::default();
        let (_, top) = normalize_coordinates(&cfg, 0.5, 0.0);
        let (_, bottom) = normalize_coordinates(&cfg, 0.5, 1.0);
        assert!(top > cfg.y_offset);
        assert!(bottom < cfg.y_offset);
    }

    #[test]
    fn test_sensitivity_extends_reach() {
        let cfg = MapperConfig::default();
        let (x, _) = normalize_coordinates(&cfg, 0.0, 0.5);
        assert!(x.abs() > 20.0, "edge reach too small: {}", x);

        let flat = MapperConfig {
            sensitivity: 1.0,
            ..MapperConfig::default()
        };
        let (x_flat, _) = normalize_coordinates(&flat, 0.0, 0.5);
        assert!((x_flat - flat.world_width / 2.0).abs() < 1e-5);
        assert!(x > x_flat);
    }

    #[test]
    fn test_project_keypoint_relative_z() {
        let cfg = MapperConfig::default();
        let near = project_keypoint(&cfg, &Keypoint::new(0.5, 0.5, -0.1), 1.0, 10.0);
        let far = project_keypoint(&cfg, &Keypoint::new(0.5, 0.5, 0.1), 1.0, 10.0);
        assert!((near.z - 2.0).abs() < 1e-5, "got {:?}", near);
        assert!((far.z - 0.0).abs() < 1e-5, "got {:?}", far);
        assert_eq!(near.x, 0.0);
    }
}
