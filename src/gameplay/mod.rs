//! State-machine driven orbital gameplay: title, gameplay, pause and
//! settings states on a stack, plus the orbital scenario, maneuver nodes,
//! trajectory prediction and time warp that the gameplay state drives.

pub mod contact_log;
pub mod gameplay_state;
pub mod maneuver;
pub mod pause;
pub mod prediction;
pub mod scenario;
pub mod scenario_loader;
pub mod scene;
pub mod settings;
pub mod sim;
pub mod state;
pub mod state_manager;
pub mod time_warp;
pub mod title;

pub use contact_log::{ContactLog, ContactLogEntry, CONTACT_LOG_CAPACITY};
pub use gameplay_state::GameplayState;
pub use maneuver::{ManeuverNode, ManeuverState, WarpToTime};
pub use pause::{PauseAction, PauseState};
pub use prediction::{PredictionCache, PredictionDraw, PredictionRequest, RebuildCheck};
pub use scenario::{
    default_earth_moon_config, CelestialBodyInfo, CelestialDef, OrbitalScenario, OrbiterDef, OrbiterInfo,
    RailsState, ScenarioConfig,
};
pub use scenario_loader::{load_scenario_config, parse_scenario_config, save_scenario_config, serialize_scenario_config};
pub use scene::{build_orbital_scenario, primary_orbit_state};
pub use settings::SettingsState;
pub use sim::{gravity_accel_world_at, VelocityOriginMode};
pub use state::{GameState, GameStateContext, StateTransition, UiFrame, UiPanel};
pub use state_manager::GameStateManager;
pub use time_warp::{TimeWarpState, WarpMode, MAX_PHYSICS_WARP_LEVEL, MAX_WARP_LEVEL};
pub use title::TitleState;
