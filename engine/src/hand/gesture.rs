//! Gesture recognition from hand keypoints.
//!
//! Two gestures are recognized: pinch (thumb tip to index tip, used to
//! grab) and open palm (all fingers extended and spread, used for camera
//! control).  Each has a `*Ready` state that must be held for the debounce
//! interval before the gesture commits.  Pinch uses separate enter/exit
//! thresholds, always wins over palm, and suppresses palm detection for a
//! cooldown after it ends.

use tracing::debug;

use super::keypoints::{pinch_point, HandKeypoint, Keypoint, KEYPOINT_COUNT};

// ── Gesture states ─────────────────────────────────────────

/// Discrete gesture state for one tracked hand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum GestureState {
    #[default]
    Idle,
    /// Pinch condition met, waiting out the debounce.
    PinchReady,
    /// Pinch committed; a grab may be bound.
    Pinching,
    /// Palm condition met, waiting out the debounce.
    PalmReady,
    /// Palm committed; drives the camera orbit.
    OpenPalm,
}

impl GestureState {
    /// String representation for status output.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::PinchReady => "pinch-ready",
            Self::Pinching => "pinching",
            Self::PalmReady => "palm-ready",
            Self::OpenPalm => "open-palm",
        }
    }

    pub fn is_pinch(&self) -> bool {
        matches!(self, Self::PinchReady | Self::Pinching)
    }

    pub fn is_palm(&self) -> bool {
        matches!(self, Self::PalmReady | Self::OpenPalm)
    }

    /// Legacy name for the camera-control trigger.  Same as `OpenPalm`.
    pub fn is_closed_fist(&self) -> bool {
        *self == Self::OpenPalm
    }
}

// ── Config ─────────────────────────────────────────────────

/// Thresholds for gesture recognition.  Distances are in normalized
/// keypoint units.  `pinch_enter` must stay below `pinch_exit`.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureConfig {
    /// Pinch starts when thumb/index tips are closer than this.
    pub pinch_enter: f32,
    /// Pinch ends when thumb/index tips are farther than this.
    pub pinch_exit: f32,
    /// Each fingertip must be at least this far from the wrist.
    pub palm_finger_min_dist: f32,
    /// Mean adjacent-fingertip distance must exceed this.
    pub palm_finger_spread: f32,
    /// Thumb counts as extended beyond `palm_finger_min_dist * ratio`.
    pub thumb_extension_ratio: f32,
    /// Dwell time in a ready state before the gesture commits.
    pub debounce_ms: f64,
    /// Palm detection is suppressed this long after a pinch ends.
    pub post_pinch_cooldown_ms: f64,
    /// Finger extension that scores full palm confidence.
    pub palm_full_extension: f32,
    /// Finger spread that scores full palm confidence.
    pub palm_full_spread: f32,
}

impl Default for GestureConfig {
    fn default() -> Self {
        Self {
            pinch_enter: 0.06,
            pinch_exit: 0.10,
            palm_finger_min_dist: 0.28,
            palm_finger_spread: 0.08,
            thumb_extension_ratio: 0.8,
            debounce_ms: 80.0,
            post_pinch_cooldown_ms: 200.0,
            palm_full_extension: 0.4,
            palm_full_spread: 0.15,
        }
    }
}

// ── Metrics ────────────────────────────────────────────────

/// Geometric facts about one keypoint set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GestureMetrics {
    /// Thumb tip to index tip.
    pub pinch_distance: f32,
    /// Mean wrist-to-fingertip distance over index, middle, ring, pinky.
    pub avg_finger_extension: f32,
    /// Mean distance between adjacent fingertips.
    pub finger_spread: f32,
    pub all_fingers_extended: bool,
    pub thumb_extended: bool,
}

/// Compute metrics, `None` when the set is absent or incomplete.
pub fn calculate_gesture_metrics(
    config: &GestureConfig,
    keypoints: Option<&[Keypoint]>,
) -> Option<GestureMetrics> {
    let keypoints = keypoints?;
    if keypoints.len() < KEYPOINT_COUNT {
        return None;
    }

    let kp = |which: HandKeypoint| keypoints[which.index()];
    let wrist = kp(HandKeypoint::Wrist);
    let thumb_tip = kp(HandKeypoint::ThumbTip);
    let tips = HandKeypoint::finger_tips().map(kp);

    let pinch_distance = thumb_tip.distance(&tips[0]);

    let extensions = tips.map(|tip| wrist.distance(&tip));
    let avg_finger_extension = extensions.iter().sum::<f32>() / extensions.len() as f32;

    let finger_spread = tips
        .windows(2)
        .map(|pair| pair[0].distance(&pair[1]))
        .sum::<f32>()
        / (tips.len() - 1) as f32;

    let all_fingers_extended = extensions
        .iter()
        .all(|&d| d > config.palm_finger_min_dist);
    let thumb_extended =
        wrist.distance(&thumb_tip) > config.palm_finger_min_dist * config.thumb_extension_ratio;

    Some(GestureMetrics {
        pinch_distance,
        avg_finger_extension,
        finger_spread,
        all_fingers_extended,
        thumb_extended,
    })
}

// ── Transition ─────────────────────────────────────────────

/// Timing context carried between transitions.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct GestureContext {
    /// When the current `*Ready` state was entered.
    pub ready_timestamp: Option<f64>,
    /// When `Pinching` last ended.
    pub last_pinch_end: Option<f64>,
}

/// Advance one step.  The only place `context` is mutated.
pub fn transition_gesture_state(
    config: &GestureConfig,
    state: GestureState,
    metrics: &GestureMetrics,
    context: &mut GestureContext,
    now_ms: f64,
) -> GestureState {
    let pinch_enter = metrics.pinch_distance < config.pinch_enter;
    let pinch_exit = metrics.pinch_distance > config.pinch_exit;
    let palm = metrics.all_fingers_extended
        && metrics.thumb_extended
        && metrics.finger_spread > config.palm_finger_spread;
    let in_cooldown = context
        .last_pinch_end
        .is_some_and(|end| now_ms - end < config.post_pinch_cooldown_ms);

    match state {
        GestureState::Idle => {
            if pinch_enter {
                context.ready_timestamp = Some(now_ms);
                GestureState::PinchReady
            } else if palm && !in_cooldown {
                context.ready_timestamp = Some(now_ms);
                GestureState::PalmReady
            } else {
                context.ready_timestamp = None;
                GestureState::Idle
            }
        }
        GestureState::PinchReady => {
            if pinch_exit {
                context.ready_timestamp = None;
                GestureState::Idle
            } else if debounced(config, context, now_ms) {
                context.ready_timestamp = None;
                GestureState::Pinching
            } else {
                GestureState::PinchReady
            }
        }
        GestureState::Pinching => {
            if pinch_exit {
                context.ready_timestamp = None;
                context.last_pinch_end = Some(now_ms);
                GestureState::Idle
            } else {
                GestureState::Pinching
            }
        }
        GestureState::PalmReady => {
            if !palm || pinch_enter {
                context.ready_timestamp = None;
                GestureState::Idle
            } else if debounced(config, context, now_ms) {
                context.ready_timestamp = None;
                GestureState::OpenPalm
            } else {
                GestureState::PalmReady
            }
        }
        GestureState::OpenPalm => {
            if !palm || pinch_enter {
                context.ready_timestamp = None;
                GestureState::Idle
            } else {
                GestureState::OpenPalm
            }
        }
    }
}

/// Whether the ready state has been held for the debounce interval.  A
/// missing ready timestamp is armed at `now_ms`.
fn debounced(config: &GestureConfig, context: &mut GestureContext, now_ms: f64) -> bool {
    let ready = *context.ready_timestamp.get_or_insert(now_ms);
    now_ms - ready >= config.debounce_ms
}

/// How committed the current gesture is (0.0-1.0).
pub fn calculate_confidence(
    config: &GestureConfig,
    state: GestureState,
    metrics: &GestureMetrics,
) -> f32 {
    match state {
        GestureState::PinchReady | GestureState::Pinching => {
            (1.0 - metrics.pinch_distance / config.pinch_exit).clamp(0.0, 1.0)
        }
        GestureState::PalmReady | GestureState::OpenPalm => {
            let ext = (metrics.avg_finger_extension / config.palm_full_extension).min(1.0);
            let spread = (metrics.finger_spread / config.palm_full_spread).min(1.0);
            (ext + spread) / 2.0
        }
        GestureState::Idle => 0.0,
    }
}

// ── Machine ────────────────────────────────────────────────

/// Result of one machine step.
#[derive(Debug, Clone, PartialEq)]
pub struct GestureUpdate {
    pub state: GestureState,
    pub previous: GestureState,
    pub confidence: f32,
    pub pinch_point: Option<Keypoint>,
    pub metrics: Option<GestureMetrics>,
    pub at_ms: f64,
}

impl GestureUpdate {
    pub fn changed(&self) -> bool {
        self.state != self.previous
    }

    /// This step committed a pinch.
    pub fn pinch_started(&self) -> bool {
        self.state == GestureState::Pinching && self.previous != GestureState::Pinching
    }

    /// This step ended a committed pinch.
    pub fn pinch_ended(&self) -> bool {
        self.previous == GestureState::Pinching && self.state != GestureState::Pinching
    }
}

/// Gesture sequencer bound to one tracked hand.
#[derive(Debug, Clone)]
pub struct GestureMachine {
    pub config: GestureConfig,
    state: GestureState,
    context: GestureContext,
    /// When the current state was entered.
    entered_at: f64,
    confidence: f32,
}

impl GestureMachine {
    pub fn new(config: GestureConfig) -> Self {
        Self {
            config,
            state: GestureState::Idle,
            context: GestureContext::default(),
            entered_at: 0.0,
            confidence: 0.0,
        }
    }

    pub fn state(&self) -> GestureState {
        self.state
    }

    pub fn context(&self) -> &GestureContext {
        &self.context
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Time spent in the current state.
    pub fn hold_ms(&self, now_ms: f64) -> f64 {
        (now_ms - self.entered_at).max(0.0)
    }

    /// Step with this tick's keypoints.  Absent or incomplete keypoints
    /// reset the machine to `Idle`.
    pub fn update(&mut self, keypoints: Option<&[Keypoint]>, now_ms: f64) -> GestureUpdate {
        let previous = self.state;

        let Some(metrics) = calculate_gesture_metrics(&self.config, keypoints) else {
            self.reset(now_ms);
            return GestureUpdate {
                state: GestureState::Idle,
                previous,
                confidence: 0.0,
                pinch_point: None,
                metrics: None,
                at_ms: now_ms,
            };
        };

        let next =
            transition_gesture_state(&self.config, previous, &metrics, &mut self.context, now_ms);
        if next != previous {
            debug!(
                "Gesture {} -> {} (pinch={:.3} spread={:.3})",
                previous.as_str(),
                next.as_str(),
                metrics.pinch_distance,
                metrics.finger_spread,
            );
            self.entered_at = now_ms;
        }
        self.state = next;
        self.confidence = calculate_confidence(&self.config, next, &metrics);

        GestureUpdate {
            state: next,
            previous,
            confidence: self.confidence,
            pinch_point: pinch_point(keypoints),
            metrics: Some(metrics),
            at_ms: now_ms,
        }
    }

    /// Force `Idle`.  Ending a committed pinch this way still starts the
    /// palm cooldown.
    pub fn reset(&mut self, now_ms: f64) {
        if self.state == GestureState::Pinching {
            self.context.last_pinch_end = Some(now_ms);
        }
        if self.state != GestureState::Idle {
            debug!("Gesture {} -> idle (hand lost)", self.state.as_str());
            self.entered_at = now_ms;
        }
        self.state = GestureState::Idle;
        self.context.ready_timestamp = None;
        self.confidence = 0.0;
    }

    /// S-expression for status output.
    pub fn status_sexp(&self, now_ms: f64) -> String {
        let last_end = self
            .context
            .last_pinch_end
            .map(|t| format!("{:.0}", t))
            .unwrap_or_else(|| "nil".to_string());
        format!(
            "(:state {} :confidence {:.2} :hold-ms {:.0} :last-pinch-end {})",
            self.state.as_str(),
            self.confidence,
            self.hold_ms(now_ms),
            last_end,
        )
    }

    /// S-expression for the active thresholds.
    pub fn config_sexp(&self) -> String {
        format!(
            "(:pinch-enter {:.3} :pinch-exit {:.3} :palm-finger-min-dist {:.3} :palm-finger-spread {:.3} :debounce-ms {:.0} :post-pinch-cooldown-ms {:.0})",
            self.config.pinch_enter,
            self.config.pinch_exit,
            self.config.palm_finger_min_dist,
            self.config.palm_finger_spread,
            self.config.debounce_ms,
            self.config.post_pinch_cooldown_ms,
        )
    }
}

impl Default for GestureMachine {
    fn default() -> Self {
        Self::new(GestureConfig::default())
    }
}

// ── Test helpers ───────────────────────────────────────────

/// Thumb and index tips 0.02 apart, other fingers curled.
#[cfg(test)]
pub(crate) fn make_pinch_hand() -> Vec<Keypoint> {
    use super::keypoints::{make_hand, set_kp};

    let mut hand = make_hand();
    for kp in hand.iter_mut() {
        *kp = Keypoint::new(0.5, 0.65, 0.0);
    }
    set_kp(&mut hand, HandKeypoint::Wrist, 0.5, 0.8, 0.0);
    set_kp(&mut hand, HandKeypoint::MiddleMcp, 0.5, 0.65, 0.0);
    set_kp(&mut hand, HandKeypoint::ThumbTip, 0.5, 0.5, 0.0);
    set_kp(&mut hand, HandKeypoint::IndexTip, 0.52, 0.5, 0.0);
    hand
}

/// Relaxed hand: neither pinch nor palm.
#[cfg(test)]
pub(crate) fn make_relaxed_hand() -> Vec<Keypoint> {
    use super::keypoints::set_kp;

    let mut hand = make_pinch_hand();
    set_kp(&mut hand, HandKeypoint::ThumbTip, 0.4, 0.55, 0.0);
    set_kp(&mut hand, HandKeypoint::IndexTip, 0.6, 0.5, 0.0);
    hand
}

/// All five fingers extended and spread.
#[cfg(test)]
pub(crate) fn make_palm_hand() -> Vec<Keypoint> {
    use super::keypoints::set_kp;

    let mut hand = make_pinch_hand();
    set_kp(&mut hand, HandKeypoint::ThumbTip, 0.2, 0.6, 0.0);
    set_kp(&mut hand, HandKeypoint::IndexTip, 0.35, 0.45, 0.0);
    set_kp(&mut hand, HandKeypoint::MiddleTip, 0.47, 0.42, 0.0);
    set_kp(&mut hand, HandKeypoint::RingTip, 0.59, 0.44, 0.0);
    set_kp(&mut hand, HandKeypoint::PinkyTip, 0.7, 0.5, 0.0);
    hand
}

// ── Tests ──────────────────────────────────────────────────
