//! Stateless smoothing primitives.  Callers own the previous value.

use glam::Vec3;

/// Linear interpolation: `t = 0` gives `a`, `t = 1` gives `b`.
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a * (1.0 - t) + b * t
}

/// Exponential moving average toward `next`.
pub fn ema(current: f32, next: f32, alpha: f32) -> f32 {
    alpha * next + (1.0 - alpha) * current
}

/// Blend whose factor rises from `min_t` to `max_t` with per-tick velocity,
/// so fast motion tracks closely and slow motion is smoothed harder.
pub fn adaptive_lerp(start: f32, end: f32, velocity: f32, min_t: f32, max_t: f32) -> f32 {
    let velocity_factor = (velocity * 2.0).min(1.0);
    let t = lerp(min_t, max_t, velocity_factor).clamp(min_t, max_t);
    lerp(start, end, t)
}

/// Distance moved between two samples.
pub fn calculate_velocity(prev: Vec3, next: Vec3) -> f32 {
    prev.distance(next)
}

pub fn lerp_vec3(a: Vec3, b: Vec3, t: f32) -> Vec3 {
    Vec3::new(lerp(a.x, b.x, t), lerp(a.y, b.y, t), lerp(a.z, b.z, t))
}

pub fn ema_vec3(current: Vec3, next: Vec3, alpha: f32) -> Vec3 {
    Vec3::new(
        ema(current.x, next.x, alpha),
        ema(current.y, next.y, alpha),
        ema(current.z, next.z, alpha),
    )
}

/// [`adaptive_lerp`] per component, with the velocity measured once.
pub fn adaptive_lerp_vec3(start: Vec3, end: Vec3, min_t: f32, max_t: f32) -> Vec3 {
    let velocity = calculate_velocity(start, end);
    Vec3::new(
        adaptive_lerp(start.x, end.x, velocity, min_t, max_t),
        adaptive_lerp(start.y, end.y, velocity, min_t, max_t),
        adaptive_lerp(start.z, end.z, velocity, min_t, max_t),
    )
}
