/// Pause overlay on top of gameplay
///
/// The gameplay below stops ticking but keeps drawing its HUD.

use std::any::Any;

use winit::keyboard::KeyCode;

use super::settings::SettingsState;
use super::state::{GameState, GameStateContext, StateTransition, UiFrame};
use super::title::TitleState;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PauseAction {
    Resume,
    Settings,
    MainMenu,
    Quit,
}

impl PauseAction {
    pub const ALL: [PauseAction; 4] = [
        PauseAction::Resume,
        PauseAction::Settings,
        PauseAction::MainMenu,
        PauseAction::Quit,
    ];

    pub fn label(self) -> &'static str {
        match self {
            PauseAction::Resume => "Resume",
            PauseAction::Settings => "Settings",
            PauseAction::MainMenu => "Main Menu",
            PauseAction::Quit => "Quit",
        }
    }
}

#[derive(Default)]
pub struct PauseState {
    pending: StateTransition,
}

impl PauseState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, ctx: &mut GameStateContext, action: PauseAction) {
        match action {
            PauseAction::Resume => self.pending = StateTransition::Pop,
            PauseAction::Settings => self.pending = StateTransition::push(|_| SettingsState::new()),
            PauseAction::MainMenu => self.pending = StateTransition::switch_to(|_| TitleState::new()),
            PauseAction::Quit => ctx.quit(),
        }
    }
}

impl GameState for PauseState {
    fn on_enter(&mut self, _ctx: &mut GameStateContext) {}

    fn on_exit(&mut self, _ctx: &mut GameStateContext) {}

    fn on_update(&mut self, ctx: &mut GameStateContext, _dt: f32) {
        if ctx.runtime.input().key_pressed(KeyCode::Escape) {
            self.apply(ctx, PauseAction::Resume);
        }
    }

    fn on_draw_ui(&mut self, _ctx: &mut GameStateContext, ui: &mut UiFrame) {
        let panel = ui.panel("PAUSED");
        for action in PauseAction::ALL {
            panel.line(action.label());
        }
        panel.line("Press ESC to resume");
    }

    fn is_overlay(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Pause"
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
