/// Stack of game states
///
/// - top of stack receives update / fixed update
/// - push: new state on top, previous pauses
/// - pop: remove top, return to previous
/// - switch: clear the stack and push the new state
/// - overlays let the state below keep drawing its UI

use tracing::info;

use super::scenario::ScenarioConfig;
use super::state::{GameState, GameStateContext, StateTransition, UiFrame};
use crate::runtime::Runtime;

pub struct GameStateManager {
    stack: Vec<Box<dyn GameState>>,
    scenario: ScenarioConfig,
}

impl GameStateManager {
    pub fn new(scenario: ScenarioConfig) -> Self {
        Self {
            stack: Vec::new(),
            scenario,
        }
    }

    pub fn scenario(&self) -> &ScenarioConfig {
        &self.scenario
    }

    pub fn set_scenario(&mut self, scenario: ScenarioConfig) {
        self.scenario = scenario;
    }

    pub fn push(&mut self, runtime: &mut Runtime, mut state: Box<dyn GameState>) {
        info!("[StateManager] Push: {}", state.name());
        let mut ctx = GameStateContext::new(runtime, &self.scenario);
        state.on_enter(&mut ctx);
        self.stack.push(state);
    }

    pub fn pop(&mut self, runtime: &mut Runtime) {
        let Some(mut state) = self.stack.pop() else {
            return;
        };
        info!("[StateManager] Pop: {}", state.name());
        let mut ctx = GameStateContext::new(runtime, &self.scenario);
        state.on_exit(&mut ctx);
    }

    pub fn switch_to(&mut self, runtime: &mut Runtime, mut state: Box<dyn GameState>) {
        info!("[StateManager] Switch to: {}", state.name());
        let mut ctx = GameStateContext::new(runtime, &self.scenario);
        while let Some(mut old) = self.stack.pop() {
            old.on_exit(&mut ctx);
        }
        state.on_enter(&mut ctx);
        self.stack.push(state);
    }

    /// Update the top state, then apply the transition it requested
    pub fn update(&mut self, runtime: &mut Runtime, dt: f32) {
        let transition = {
            let Some(top) = self.stack.last_mut() else {
                return;
            };
            let mut ctx = GameStateContext::new(runtime, &self.scenario);
            top.on_update(&mut ctx, dt);
            std::mem::take(top.pending_transition())
        };
        self.process_transition(runtime, transition);
    }

    /// Fixed update, only if the top state asks for it
    pub fn fixed_update(&mut self, runtime: &mut Runtime, fixed_dt: f32) {
        let Some(top) = self.stack.last_mut() else {
            return;
        };
        if top.wants_fixed_update() {
            let mut ctx = GameStateContext::new(runtime, &self.scenario);
            top.on_fixed_update(&mut ctx, fixed_dt);
        }
    }

    /// Draw from the lowest visible state (walking down through overlays) to the top
    pub fn draw_ui(&mut self, runtime: &mut Runtime) -> UiFrame {
        let mut ui = UiFrame::default();
        if self.stack.is_empty() {
            return ui;
        }

        let mut first_visible = self.stack.len() - 1;
        while first_visible > 0 && self.stack[first_visible].is_overlay() {
            first_visible -= 1;
        }

        let mut ctx = GameStateContext::new(runtime, &self.scenario);
        for state in &mut self.stack[first_visible..] {
            state.on_draw_ui(&mut ctx, &mut ui);
        }
        ui
    }

    pub fn shutdown(&mut self, runtime: &mut Runtime) {
        while !self.stack.is_empty() {
            self.pop(runtime);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn top(&self) -> Option<&dyn GameState> {
        self.stack.last().map(|s| s.as_ref())
    }

    pub fn top_name(&self) -> Option<&'static str> {
        self.stack.last().map(|s| s.name())
    }

    /// Concrete state anywhere on the stack, topmost first
    pub fn find<S: GameState + 'static>(&self) -> Option<&S> {
        self.stack.iter().rev().find_map(|s| s.as_any().downcast_ref::<S>())
    }

    pub fn find_mut<S: GameState + 'static>(&mut self) -> Option<&mut S> {
        self.stack
            .iter_mut()
            .rev()
            .find_map(|s| s.as_any_mut().downcast_mut::<S>())
    }

    fn process_transition(&mut self, runtime: &mut Runtime, transition: StateTransition) {
        match transition {
            StateTransition::None => {}
            StateTransition::Push(factory) => {
                let state = factory(&GameStateContext::new(runtime, &self.scenario));
                self.push(runtime, state);
            }
            StateTransition::Pop => self.pop(runtime),
            StateTransition::Switch(factory) => {
                let state = factory(&GameStateContext::new(runtime, &self.scenario));
                self.switch_to(runtime, state);
            }
        }
    }
}
