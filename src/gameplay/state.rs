/// Game state interface and transitions
///
/// A state requests a transition by storing it in its pending slot during
/// `on_update`; the manager reads and clears it right after the update.

use crate::runtime::Runtime;

use super::scenario::ScenarioConfig;

/// Shared data handed to every state callback
pub struct GameStateContext<'a> {
    pub runtime: &'a mut Runtime,
    /// Scenario used when a new gameplay session starts
    pub scenario: &'a ScenarioConfig,
}

impl<'a> GameStateContext<'a> {
    pub fn new(runtime: &'a mut Runtime, scenario: &'a ScenarioConfig) -> Self {
        Self { runtime, scenario }
    }

    pub fn quit(&mut self) {
        self.runtime.request_quit();
    }

    pub fn delta_time(&self) -> f32 {
        self.runtime.delta_time()
    }

    pub fn fixed_delta_time(&self) -> f32 {
        self.runtime.fixed_delta_time()
    }

    pub fn interpolation_alpha(&self) -> f64 {
        self.runtime.time().interpolation_alpha()
    }
}

/// Builds the state a transition switches or pushes to
pub type StateFactory = Box<dyn FnOnce(&GameStateContext) -> Box<dyn GameState>>;

#[derive(Default)]
pub enum StateTransition {
    #[default]
    None,
    /// New state on top; the current one stops ticking
    Push(StateFactory),
    /// Remove the current state
    Pop,
    /// Replace the whole stack
    Switch(StateFactory),
}

impl StateTransition {
    pub fn push<S, F>(factory: F) -> Self
    where
        S: GameState + 'static,
        F: FnOnce(&GameStateContext) -> S + 'static,
    {
        StateTransition::Push(Box::new(move |ctx| Box::new(factory(ctx)) as Box<dyn GameState>))
    }

    pub fn switch_to<S, F>(factory: F) -> Self
    where
        S: GameState + 'static,
        F: FnOnce(&GameStateContext) -> S + 'static,
    {
        StateTransition::Switch(Box::new(move |ctx| Box::new(factory(ctx)) as Box<dyn GameState>))
    }

    pub fn is_none(&self) -> bool {
        matches!(self, StateTransition::None)
    }

    pub fn kind(&self) -> &'static str {
        match self {
            StateTransition::None => "none",
            StateTransition::Push(_) => "push",
            StateTransition::Pop => "pop",
            StateTransition::Switch(_) => "switch",
        }
    }
}

impl std::fmt::Debug for StateTransition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.kind())
    }
}

/// One text panel of the HUD
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UiPanel {
    pub title: String,
    pub lines: Vec<String>,
}

/// HUD for one frame, panels in draw order (bottom state first)
#[derive(Debug, Clone, PartialEq, Default)]
pub struct UiFrame {
    pub panels: Vec<UiPanel>,
}

impl UiFrame {
    pub fn panel(&mut self, title: &str) -> &mut UiPanel {
        self.panels.push(UiPanel {
            title: title.to_string(),
            lines: Vec::new(),
        });
        let last = self.panels.len() - 1;
        &mut self.panels[last]
    }

    pub fn titles(&self) -> Vec<&str> {
        self.panels.iter().map(|p| p.title.as_str()).collect()
    }
}

impl UiPanel {
    pub fn line(&mut self, text: impl Into<String>) -> &mut Self {
        self.lines.push(text.into());
        self
    }
}

pub trait GameState {
    fn on_enter(&mut self, ctx: &mut GameStateContext);

    fn on_exit(&mut self, ctx: &mut GameStateContext);

    /// Variable dt. Set a pending transition here.
    fn on_update(&mut self, ctx: &mut GameStateContext, dt: f32);

    fn on_fixed_update(&mut self, _ctx: &mut GameStateContext, _fixed_dt: f32) {}

    fn on_draw_ui(&mut self, _ctx: &mut GameStateContext, _ui: &mut UiFrame) {}

    fn wants_fixed_update(&self) -> bool {
        false
    }

    /// States below an overlay keep drawing their UI
    fn is_overlay(&self) -> bool {
        false
    }

    fn name(&self) -> &'static str;

    fn pending_transition(&mut self) -> &mut StateTransition;

    /// Downcasting hook for callers that know the concrete state
    fn as_any(&self) -> &dyn std::any::Any;
    fn as_any_mut(&mut self) -> &mut dyn std::any::Any;
}
