//! Session state published to presentation and game rules.
//!
//! Plain fields plus setters.  Whatever observes the session (HUD, game
//! rules, a status socket) polls these or the `status_sexp()` rendering;
//! nothing here pushes.

use std::collections::BTreeSet;
use std::str::FromStr;

use glam::Vec3;
use thiserror::Error;
use tracing::info;

use crate::engine::TickReport;
use crate::hand::gesture::GestureState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameState {
    #[default]
    Playing,
    GameOver,
}

impl GameState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Playing => "playing",
            Self::GameOver => "game-over",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GameMode {
    #[default]
    Menu,
    /// Tower collapse ends the game.
    Classic,
    /// Free play.
    Sandbox,
}

impl GameMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Menu => "menu",
            Self::Classic => "classic",
            Self::Sandbox => "sandbox",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown game mode: {0}")]
pub struct UnknownGameMode(pub String);

impl FromStr for GameMode {
    type Err = UnknownGameMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "menu" => Ok(Self::Menu),
            "classic" => Ok(Self::Classic),
            "sandbox" => Ok(Self::Sandbox),
            other => Err(UnknownGameMode(other.to_string())),
        }
    }
}

#[derive(Debug, Clone)]
pub struct SessionState {
    pub game_state: GameState,
    pub game_mode: GameMode,
    pub score: u32,
    pub game_id: u32,
    pub held_block: Option<String>,
    pub hovered_block: Option<String>,
    /// Every block held at least once this game.
    pub safe_blocks: BTreeSet<String>,
    pub gesture: GestureState,
    pub confidence: f32,
    pub pinch_point: Option<Vec3>,
    pub webcam_visible: bool,
    pub instructions_visible: bool,
    /// When the instructions were first published as visible.
    pub instructions_shown_at: Option<f64>,
    pub instructions_timeout_ms: f64,
}

impl SessionState {
    pub fn new(instructions_timeout_ms: f64) -> Self {
        Self {
            game_state: GameState::Playing,
            game_mode: GameMode::Menu,
            score: 0,
            game_id: 0,
            held_block: None,
            hovered_block: None,
            safe_blocks: BTreeSet::new(),
            gesture: GestureState::Idle,
            confidence: 0.0,
            pinch_point: None,
            webcam_visible: false,
            instructions_visible: true,
            instructions_shown_at: None,
            instructions_timeout_ms,
        }
    }

    pub fn start_game(&mut self, mode: GameMode) {
        self.game_mode = mode;
        self.reset_game();
        info!("Game {} started ({})", self.game_id, mode.as_str());
    }

    pub fn return_to_menu(&mut self) {
        self.game_mode = GameMode::Menu;
        self.held_block = None;
        self.hovered_block = None;
    }

    /// New round in the current mode.
    pub fn reset_game(&mut self) {
        self.game_state = GameState::Playing;
        self.score = 0;
        self.held_block = None;
        self.safe_blocks.clear();
        self.game_id += 1;
        self.instructions_visible = true;
        self.instructions_shown_at = None;
    }

    pub fn set_game_state(&mut self, state: GameState) {
        self.game_state = state;
    }

    pub fn increment_score(&mut self) {
        self.score += 1;
    }

    pub fn set_held_block(&mut self, block: Option<String>) {
        if let Some(id) = &block {
            self.safe_blocks.insert(id.clone());
        }
        self.held_block = block;
    }

    pub fn set_webcam_visible(&mut self, visible: bool) {
        self.webcam_visible = visible;
    }

    pub fn set_instructions_visible(&mut self, visible: bool) {
        self.instructions_visible = visible;
        if !visible {
            self.instructions_shown_at = None;
        }
    }

    pub fn is_safe(&self, block: &str) -> bool {
        self.safe_blocks.contains(block)
    }

    /// The tower fell.  Ends a classic game; ignored otherwise.
    pub fn report_collapse(&mut self) -> bool {
        if self.game_mode != GameMode::Classic || self.game_state != GameState::Playing {
            return false;
        }
        self.game_state = GameState::GameOver;
        info!("Game {} over: tower collapsed (score {})", self.game_id, self.score);
        true
    }

    /// Copy one tick's outputs in.
    pub fn publish(&mut self, report: &TickReport, now_ms: f64) {
        self.gesture = report.gesture.state;
        self.confidence = report.gesture.confidence;
        self.pinch_point = report.pinch_world;
        self.hovered_block = report.hovered_label.clone();
        self.set_held_block(report.held_label.clone());

        if self.instructions_visible {
            let shown_at = *self.instructions_shown_at.get_or_insert(now_ms);
            if now_ms - shown_at >= self.instructions_timeout_ms {
                self.set_instructions_visible(false);
            }
        }
    }

    /// S-expression for status output.
    pub fn status_sexp(&self) -> String {
        fn opt_str(s: &Option<String>) -> String {
            s.as_ref()
                .map(|v| format!("\"{}\"", v))
                .unwrap_or_else(|| "nil".to_string())
        }
        format!(
            "(:game-state {} :mode {} :score {} :game-id {} :held {} :hovered {} :safe {} :gesture {} :confidence {:.2} :instructions {})",
            self.game_state.as_str(),
            self.game_mode.as_str(),
            self.score,
            self.game_id,
            opt_str(&self.held_block),
            opt_str(&self.hovered_block),
            self.safe_blocks.len(),
            self.gesture.as_str(),
            self.confidence,
            if self.instructions_visible { "t" } else { "nil" },
        )
    }
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(5000.0)
    }
}
