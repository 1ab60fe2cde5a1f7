/// Settings overlay: fixed dt, time scale and debug draw, backed by
/// `EngineConfig`

use std::any::Any;

use tracing::info;
use winit::keyboard::KeyCode;

use super::state::{GameState, GameStateContext, StateTransition, UiFrame};
use crate::runtime::Runtime;

const MIN_TIME_SCALE: f64 = 0.125;
const MAX_TIME_SCALE: f64 = 8.0;

#[derive(Default)]
pub struct SettingsState {
    pending: StateTransition,
}

impl SettingsState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_debug_draw(runtime: &mut Runtime, enabled: bool) {
        runtime.config_mut().debug_draw.enabled = enabled;
        runtime.scene_mut().set_debug_draw_enabled(enabled);
        info!("[Settings] Debug draw {}", if enabled { "on" } else { "off" });
    }

    pub fn set_time_scale(runtime: &mut Runtime, scale: f64) {
        let scale = scale.clamp(MIN_TIME_SCALE, MAX_TIME_SCALE);
        runtime.set_time_scale(scale);
        info!("[Settings] Time scale {:.3}", scale);
    }

    /// Clamped by the clock; the config keeps what the clock accepted
    pub fn set_fixed_dt(runtime: &mut Runtime, dt: f64) {
        runtime.set_fixed_delta_time(dt);
        let applied = runtime.time().fixed_delta_time();
        runtime.config_mut().physics.fixed_dt = applied;
        info!("[Settings] Fixed dt {:.5} s", applied);
    }
}

impl GameState for SettingsState {
    fn on_enter(&mut self, _ctx: &mut GameStateContext) {}

    fn on_exit(&mut self, _ctx: &mut GameStateContext) {}

    fn on_update(&mut self, ctx: &mut GameStateContext, _dt: f32) {
        let input = ctx.runtime.input();
        let escape = input.key_pressed(KeyCode::Escape);
        let toggle_debug = input.key_pressed(KeyCode::KeyD);
        let slower = input.key_pressed(KeyCode::BracketLeft);
        let faster = input.key_pressed(KeyCode::BracketRight);

        if escape {
            self.pending = StateTransition::Pop;
            return;
        }
        if toggle_debug {
            let enabled = !ctx.runtime.scene().debug_draw_enabled();
            Self::set_debug_draw(ctx.runtime, enabled);
        }
        let scale = ctx.runtime.time().time_scale();
        if slower {
            Self::set_time_scale(ctx.runtime, scale * 0.5);
        } else if faster {
            Self::set_time_scale(ctx.runtime, scale * 2.0);
        }
    }

    fn on_draw_ui(&mut self, ctx: &mut GameStateContext, ui: &mut UiFrame) {
        let runtime = &*ctx.runtime;
        let panel = ui.panel("Settings");
        panel.line(format!("Fixed dt: {:.5} s", runtime.time().fixed_delta_time()));
        panel.line(format!("Time scale: {:.3}x  [[/]]", runtime.time().time_scale()));
        panel.line(format!(
            "Debug draw: {}  [D]",
            if runtime.scene().debug_draw_enabled() { "on" } else { "off" }
        ));
        panel.line("Press ESC to go back");
    }

    fn is_overlay(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Settings"
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
