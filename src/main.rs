use orbit_engine::config::{EngineConfig, LaunchOptions};
use orbit_engine::games::create_game;
use orbit_engine::logging;
use orbit_engine::runtime::{HeadlessPlatform, Runtime};
use tracing::{info, warn};
use winit::keyboard::KeyCode;

const CONFIG_PATH: &str = "orbit_engine.json";
const FRAME_DELTA_S: f64 = 1.0 / 60.0;

fn main() -> anyhow::Result<()> {
    let (options, errors) = LaunchOptions::parse(std::env::args().skip(1));
    logging::init(options.log_target, options.log_level);
    for e in &errors {
        warn!("{}", e);
    }

    info!("=== Orbit Engine Starting ===");
    let config = EngineConfig::load_or_default(CONFIG_PATH);
    let max_frames = config.runtime.max_frames;

    // No window: a scripted headless platform, Enter tapped to leave the title screen
    let platform = HeadlessPlatform::new(FRAME_DELTA_S, max_frames)
        .hold_keys(2, &[KeyCode::Enter])
        .hold_keys(3, &[]);
    let mut runtime = Runtime::new(Box::new(platform), config);

    info!("Running game '{}'", options.game.name());
    let mut game = create_game(options.game);
    runtime.run(game.as_mut())?;

    info!("Engine shutdown complete.");
    Ok(())
}
