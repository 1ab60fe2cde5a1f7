/// Title screen: Enter starts a session, Esc quits

use std::any::Any;

use tracing::info;
use winit::keyboard::KeyCode;

use super::gameplay_state::GameplayState;
use super::state::{GameState, GameStateContext, StateTransition, UiFrame};

#[derive(Default)]
pub struct TitleState {
    elapsed: f32,
    pending: StateTransition,
}

impl TitleState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Same as pressing Enter
    pub fn start_game(&mut self) {
        self.pending = StateTransition::switch_to(|ctx| GameplayState::new(ctx.scenario.clone()));
    }
}

impl GameState for TitleState {
    fn on_enter(&mut self, _ctx: &mut GameStateContext) {
        self.elapsed = 0.0;
        info!("[Title] Press Enter to start");
    }

    fn on_exit(&mut self, _ctx: &mut GameStateContext) {}

    fn on_update(&mut self, ctx: &mut GameStateContext, dt: f32) {
        self.elapsed += dt;
        if ctx.runtime.input().key_pressed(KeyCode::Enter) {
            self.start_game();
        } else if ctx.runtime.input().key_pressed(KeyCode::Escape) {
            ctx.quit();
        }
    }

    fn on_draw_ui(&mut self, ctx: &mut GameStateContext, ui: &mut UiFrame) {
        let panel = ui.panel("Orbit Engine");
        panel.line(format!(
            "{} celestials, {} orbiters",
            ctx.scenario.celestials.len(),
            ctx.scenario.orbiters.len()
        ));
        panel.line("[ENTER] Start  [ESC] Quit");
    }

    fn name(&self) -> &'static str {
        "Title"
    }

    fn pending_transition(&mut self) -> &mut StateTransition {
        &mut self.pending
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}
