//! Hand-side processing: pure keypoint geometry, smoothing, and the
//! gesture state machine.  Nothing here touches the physics world.

pub mod coordinates;
pub mod depth;
pub mod gesture;
pub mod keypoints;
pub mod orbit;
pub mod smoothing;

pub use coordinates::{normalize_coordinates, project_keypoint, MapperConfig};
pub use depth::{calculate_depth, DepthConfig};
pub use gesture::{
    calculate_confidence, calculate_gesture_metrics, transition_gesture_state, GestureConfig,
    GestureContext, GestureMachine, GestureMetrics, GestureState, GestureUpdate,
};
pub use keypoints::{pinch_point, HandKeypoint, Keypoint, KEYPOINT_COUNT};
pub use orbit::{OrbitConfig, OrbitDelta, OrbitDriver};
