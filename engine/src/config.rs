//! Engine configuration.
//!
//! `EngineConfig` gathers every tunable.  Overrides come from an
//! s-expression plist such as `(:pinch-enter 0.05 :debounce-ms 100)`,
//! read from a file or a string; keys not given keep their defaults.

use std::path::Path;

use anyhow::{bail, ensure, Context};
use glam::Vec3;
use lexpr::Value;
use tracing::debug;

use crate::cursor::CursorConfig;
use crate::grab::GrabConfig;
use crate::hand::coordinates::MapperConfig;
use crate::hand::depth::DepthConfig;
use crate::hand::gesture::GestureConfig;
use crate::hand::orbit::OrbitConfig;

/// Every plist key `apply_sexp` understands.
const KNOWN_KEYS: &[&str] = &[
    "world-width",
    "world-height",
    "y-offset",
    "sensitivity",
    "min-dist",
    "max-dist",
    "min-z",
    "max-z",
    "pinch-enter",
    "pinch-exit",
    "palm-finger-min-dist",
    "palm-finger-spread",
    "thumb-extension-ratio",
    "debounce-ms",
    "post-pinch-cooldown-ms",
    "palm-full-extension",
    "palm-full-spread",
    "capture-radius",
    "grab-damping",
    "relative-z-scale",
    "anchor-min-t",
    "anchor-max-t",
    "park-position",
    "detection-radius",
    "cursor-alpha",
    "orbit-sensitivity",
    "hand-loss-grace-frames",
    "instructions-timeout-ms",
];

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub mapper: MapperConfig,
    pub depth: DepthConfig,
    pub gesture: GestureConfig,
    pub grab: GrabConfig,
    pub cursor: CursorConfig,
    pub orbit: OrbitConfig,
    /// Absent frames tolerated before the hand counts as lost.
    pub hand_loss_grace_frames: u32,
    /// How long the instructions stay up after a game starts.
    pub instructions_timeout_ms: f64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            mapper: MapperConfig::default(),
            depth: DepthConfig::default(),
            gesture: GestureConfig::default(),
            grab: GrabConfig::default(),
            cursor: CursorConfig::default(),
            orbit: OrbitConfig::default(),
            hand_loss_grace_frames: 1,
            instructions_timeout_ms: 5000.0,
        }
    }
}

impl EngineConfig {
    /// Defaults with the overrides in `raw` applied.
    pub fn from_sexp(raw: &str) -> anyhow::Result<Self> {
        let mut config = Self::default();
        config.apply_sexp(raw)?;
        Ok(config)
    }

    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        Self::from_sexp(&raw).with_context(|| format!("loading config {}", path.display()))
    }

    /// Apply plist overrides, then validate the result.
    pub fn apply_sexp(&mut self, raw: &str) -> anyhow::Result<()> {
        let value = lexpr::from_str(raw).context("config is not a valid s-expression")?;

        for key in plist_keys(&value) {
            if !KNOWN_KEYS.contains(&key.as_str()) {
                debug!("Ignoring unknown config key :{}", key);
            }
        }

        set_f32(&value, "world-width", &mut self.mapper.world_width)?;
        set_f32(&value, "world-height", &mut self.mapper.world_height)?;
        set_f32(&value, "y-offset", &mut self.mapper.y_offset)?;
        set_f32(&value, "sensitivity", &mut self.mapper.sensitivity)?;

        set_f32(&value, "min-dist", &mut self.depth.min_dist)?;
        set_f32(&value, "max-dist", &mut self.depth.max_dist)?;
        set_f32(&value, "min-z", &mut self.depth.min_z)?;
        set_f32(&value, "max-z", &mut self.depth.max_z)?;

        let g = &mut self.gesture;
        set_f32(&value, "pinch-enter", &mut g.pinch_enter)?;
        set_f32(&value, "pinch-exit", &mut g.pinch_exit)?;
        set_f32(&value, "palm-finger-min-dist", &mut g.palm_finger_min_dist)?;
        set_f32(&value, "palm-finger-spread", &mut g.palm_finger_spread)?;
        set_f32(&value, "thumb-extension-ratio", &mut g.thumb_extension_ratio)?;
        set_f64(&value, "debounce-ms", &mut g.debounce_ms)?;
        set_f64(&value, "post-pinch-cooldown-ms", &mut g.post_pinch_cooldown_ms)?;
        set_f32(&value, "palm-full-extension", &mut g.palm_full_extension)?;
        set_f32(&value, "palm-full-spread", &mut g.palm_full_spread)?;

        set_f32(&value, "capture-radius", &mut self.grab.capture_radius)?;
        set_f32(&value, "grab-damping", &mut self.grab.grab_damping)?;
        set_f32(&value, "relative-z-scale", &mut self.grab.relative_z_scale)?;
        set_f32(&value, "anchor-min-t", &mut self.grab.anchor_min_t)?;
        set_f32(&value, "anchor-max-t", &mut self.grab.anchor_max_t)?;
        if let Some(park) = get_value(&value, "park-position") {
            let park = parse_vec3(park).context(":park-position must be (x y z)")?;
            self.grab.park_position = park;
            self.cursor.park_position = park;
        }

        set_f32(&value, "detection-radius", &mut self.cursor.detection_radius)?;
        set_f32(&value, "cursor-alpha", &mut self.cursor.smoothing_alpha)?;
        set_f32(&value, "orbit-sensitivity", &mut self.orbit.sensitivity)?;

        if let Some(frames) = get_int(&value, "hand-loss-grace-frames")? {
            self.hand_loss_grace_frames = u32::try_from(frames)
                .with_context(|| format!(":hand-loss-grace-frames out of range: {}", frames))?;
        }
        set_f64(&value, "instructions-timeout-ms", &mut self.instructions_timeout_ms)?;

        self.validate()
    }

    /// Reject settings that break the required orderings.
    pub fn validate(&self) -> anyhow::Result<()> {
        let g = &self.gesture;
        ensure!(
            g.pinch_enter < g.pinch_exit,
            "pinch-enter ({}) must be below pinch-exit ({})",
            g.pinch_enter,
            g.pinch_exit
        );
        ensure!(g.debounce_ms >= 0.0, "debounce-ms must not be negative");
        ensure!(g.post_pinch_cooldown_ms >= 0.0, "post-pinch-cooldown-ms must not be negative");
        ensure!(
            g.palm_full_extension > 0.0 && g.palm_full_spread > 0.0,
            "palm confidence scales must be positive"
        );
        ensure!(
            self.depth.min_dist < self.depth.max_dist,
            "min-dist ({}) must be below max-dist ({})",
            self.depth.min_dist,
            self.depth.max_dist
        );
        ensure!(
            self.grab.anchor_min_t <= self.grab.anchor_max_t,
            "anchor-min-t must not exceed anchor-max-t"
        );
        ensure!(self.grab.capture_radius > 0.0, "capture-radius must be positive");
        ensure!(self.cursor.detection_radius > 0.0, "detection-radius must be positive");
        ensure!(
            (0.0..=1.0).contains(&self.cursor.smoothing_alpha),
            "cursor-alpha must be within 0..1"
        );
        Ok(())
    }

    /// S-expression of the effective configuration, readable by `from_sexp`.
    pub fn config_sexp(&self) -> String {
        let p = self.grab.park_position;
        format!(
            "(:world-width {} :world-height {} :y-offset {} :sensitivity {} \
             :min-dist {} :max-dist {} :min-z {} :max-z {} \
             :pinch-enter {} :pinch-exit {} :palm-finger-min-dist {} :palm-finger-spread {} \
             :thumb-extension-ratio {} :debounce-ms {} :post-pinch-cooldown-ms {} \
             :palm-full-extension {} :palm-full-spread {} \
             :capture-radius {} :grab-damping {} :relative-z-scale {} :anchor-min-t {} :anchor-max-t {} \
             :park-position ({} {} {}) :detection-radius {} :cursor-alpha {} :orbit-sensitivity {} \
             :hand-loss-grace-frames {} :instructions-timeout-ms {})",
            self.mapper.world_width,
            self.mapper.world_height,
            self.mapper.y_offset,
            self.mapper.sensitivity,
            self.depth.min_dist,
            self.depth.max_dist,
            self.depth.min_z,
            self.depth.max_z,
            self.gesture.pinch_enter,
            self.gesture.pinch_exit,
            self.gesture.palm_finger_min_dist,
            self.gesture.palm_finger_spread,
            self.gesture.thumb_extension_ratio,
            self.gesture.debounce_ms,
            self.gesture.post_pinch_cooldown_ms,
            self.gesture.palm_full_extension,
            self.gesture.palm_full_spread,
            self.grab.capture_radius,
            self.grab.grab_damping,
            self.grab.relative_z_scale,
            self.grab.anchor_min_t,
            self.grab.anchor_max_t,
            p.x,
            p.y,
            p.z,
            self.cursor.detection_radius,
            self.cursor.smoothing_alpha,
            self.orbit.sensitivity,
            self.hand_loss_grace_frames,
            self.instructions_timeout_ms,
        )
    }
}

// ── Plist helpers ──────────────────────────────────────────

fn is_key(value: &Value, key: &str) -> bool {
    match value {
        Value::Keyword(k) => &**k == key,
        Value::Symbol(s) => s.strip_prefix(':') == Some(key),
        _ => false,
    }
}

/// Value following `:key` in a plist.  Accepts both keyword forms the
/// parser can produce (`Keyword("key")` and `Symbol(":key")`).
pub(crate) fn get_value<'a>(value: &'a Value, key: &str) -> Option<&'a Value> {
    let mut current = value;
    while let Value::Cons(pair) = current {
        if is_key(pair.car(), key) {
            return match pair.cdr() {
                Value::Cons(next) => Some(next.car()),
                _ => None,
            };
        }
        current = pair.cdr();
    }
    None
}

/// Names of every `:key` in a plist.
fn plist_keys(value: &Value) -> Vec<String> {
    let mut keys = Vec::new();
    let mut current = value;
    while let Value::Cons(pair) = current {
        match pair.car() {
            Value::Keyword(k) => keys.push(k.to_string()),
            Value::Symbol(s) if s.starts_with(':') => keys.push(s[1..].to_string()),
            _ => {}
        }
        current = pair.cdr();
    }
    keys
}

/// Numeric value for `:key`.  Present but non-numeric is an error.
pub(crate) fn get_float(value: &Value, key: &str) -> anyhow::Result<Option<f64>> {
    match get_value(value, key) {
        None => Ok(None),
        Some(v) => match v.as_f64() {
            Some(n) => Ok(Some(n)),
            None => bail!(":{} expects a number, got {}", key, v),
        },
    }
}

fn get_int(value: &Value, key: &str) -> anyhow::Result<Option<i64>> {
    match get_value(value, key) {
        None => Ok(None),
        Some(v) => match v.as_i64() {
            Some(n) => Ok(Some(n)),
            None => bail!(":{} expects an integer, got {}", key, v),
        },
    }
}

fn set_f32(value: &Value, key: &str, field: &mut f32) -> anyhow::Result<()> {
    if let Some(n) = get_float(value, key)? {
        *field = n as f32;
    }
    Ok(())
}

fn set_f64(value: &Value, key: &str, field: &mut f64) -> anyhow::Result<()> {
    if let Some(n) = get_float(value, key)? {
        *field = n;
    }
    Ok(())
}

/// `(x y z)` as a vector.
pub(crate) fn parse_vec3(value: &Value) -> anyhow::Result<Vec3> {
    let items: Vec<f64> = match value.list_iter() {
        Some(iter) => iter
            .map(|v| v.as_f64().with_context(|| format!("not a number: {}", v)))
            .collect::<anyhow::Result<_>>()?,
        None => bail!("expected a list, got {}", value),
    };
    match items.as_slice() {
        [x, y, z] => Ok(Vec3::new(*x as f32, *y as f32, *z as f32)),
        _ => bail!("expected 3 numbers, got {}", items.len()),
    }
}

// ── Tests ──────────────────────────────────────────────────
