//! Hand-driven block tower engine.
//!
//! Turns a stream of 21-point hand keypoint sets into discrete gestures,
//! couples the hand to a physics world through kinematic anchors and a
//! fixed-joint grab, and publishes cursor and session state for a
//! presentation layer to draw.

pub mod config;
pub mod cursor;
pub mod engine;
pub mod grab;
pub mod hand;
pub mod physics;
pub mod replay;
pub mod session;
