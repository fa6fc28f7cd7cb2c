//! handtower-engine - replay hand keypoint logs against a block tower

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tracing::info;

use handtower_engine::config::EngineConfig;
use handtower_engine::engine::HandEngine;
use handtower_engine::physics::scene::TOWER_LEVELS;
use handtower_engine::physics::SceneWorld;
use handtower_engine::replay::{parse_frames, run_replay, synthetic_session};
use handtower_engine::session::{GameMode, SessionState};

#[derive(Parser, Debug)]
#[command(name = "handtower-engine", about = "Hand gesture grab engine for a block tower")]
struct Cli {
    /// Frame log to replay (default: built-in synthetic session)
    #[arg(long)]
    frames: Option<PathBuf>,

    /// S-expression config overrides
    #[arg(long)]
    config: Option<PathBuf>,

    /// Tower height in levels
    #[arg(long, default_value_t = TOWER_LEVELS)]
    levels: u32,

    /// Seed for the tower's placement jitter
    #[arg(long, default_value_t = 1)]
    seed: u64,

    /// Game mode: classic, sandbox, or menu
    #[arg(long, default_value = "classic")]
    mode: GameMode,

    /// Absent frames tolerated before the hand counts as lost
    #[arg(long)]
    grace_frames: Option<u32>,

    /// Print the effective config and exit
    #[arg(long)]
    print_config: bool,

    /// Show version and exit
    #[arg(long)]
    version: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("handtower-engine {}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "handtower_engine=info".into()),
        )
        .init();

    let mut config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };
    if let Some(frames) = cli.grace_frames {
        config.hand_loss_grace_frames = frames;
    }

    if cli.print_config {
        println!("{}", config.config_sexp());
        return Ok(());
    }

    info!("handtower-engine v{} starting", env!("CARGO_PKG_VERSION"));

    let frames = match &cli.frames {
        Some(path) => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading frame log {}", path.display()))?;
            parse_frames(&text).with_context(|| format!("parsing {}", path.display()))?
        }
        None => {
            info!("no frame log given, replaying synthetic session");
            synthetic_session()
        }
    };

    let mut world = SceneWorld::new();
    world.spawn_ground();
    world.build_tower(cli.levels, cli.seed);

    let mut session = SessionState::new(config.instructions_timeout_ms);
    let mut engine = HandEngine::with_scene(config, &mut world);
    session.start_game(cli.mode);

    let summary = run_replay(&mut engine, &mut world, &mut session, &frames);
    let end = frames.last().map_or(0.0, |f| f.t_ms);

    println!("{}", summary.status_sexp());
    println!("{}", engine.status_sexp(end));
    Ok(())
}
