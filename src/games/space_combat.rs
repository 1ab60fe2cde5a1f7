/// State-machine driven orbital game: title, gameplay, pause, settings

use tracing::{info, warn};

use crate::gameplay::{
    default_earth_moon_config, load_scenario_config, GameStateManager, ScenarioConfig, TitleState, UiFrame,
};
use crate::runtime::{GameCallbacks, Runtime};

pub struct SpaceCombatGame {
    states: GameStateManager,
    last_ui: UiFrame,
}

impl Default for SpaceCombatGame {
    fn default() -> Self {
        Self::new()
    }
}

impl SpaceCombatGame {
    pub fn new() -> Self {
        Self {
            states: GameStateManager::new(default_earth_moon_config()),
            last_ui: UiFrame::default(),
        }
    }

    pub fn states(&self) -> &GameStateManager {
        &self.states
    }

    pub fn states_mut(&mut self) -> &mut GameStateManager {
        &mut self.states
    }

    /// HUD panels produced by the last frame
    pub fn last_ui(&self) -> &UiFrame {
        &self.last_ui
    }
}

/// Scenario file from the engine config, else the built-in Earth-Moon system
pub fn resolve_scenario(path: Option<&str>) -> ScenarioConfig {
    let Some(path) = path else {
        return default_earth_moon_config();
    };
    match load_scenario_config(path) {
        Some(config) => {
            info!("[SpaceCombat] Loaded scenario '{}'", path);
            config
        }
        None => {
            warn!("[SpaceCombat] Scenario '{}' unusable, using the default", path);
            default_earth_moon_config()
        }
    }
}

impl GameCallbacks for SpaceCombatGame {
    fn on_init(&mut self, runtime: &mut Runtime) {
        let scenario = resolve_scenario(runtime.config().runtime.scenario_path.as_deref());
        self.states.set_scenario(scenario);
        self.states.push(runtime, Box::new(TitleState::new()));
    }

    fn on_update(&mut self, runtime: &mut Runtime, dt: f32) {
        self.states.update(runtime, dt);
        self.last_ui = self.states.draw_ui(runtime);
        if self.states.is_empty() {
            runtime.request_quit();
        }
    }

    fn on_fixed_update(&mut self, runtime: &mut Runtime, fixed_dt: f32) {
        self.states.fixed_update(runtime, fixed_dt);
    }

    fn on_shutdown(&mut self, runtime: &mut Runtime) {
        self.states.shutdown(runtime);
    }
}
