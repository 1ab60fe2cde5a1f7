/// Orbital gameplay: a player ship and other orbiters around a body system
///
/// Per fixed tick, outside rails warp, each substep runs: warp-to update,
/// component fixed update (ship control), due maneuver, prediction refresh,
/// physics step. In rails warp the rails step replaces the physics step and
/// components do not run.

use std::any::Any;
use std::cell::{Ref, RefCell};
use std::rc::Rc;

use glam::DVec3;
use tracing::info;
use winit::keyboard::KeyCode;

use super::contact_log::ContactLog;
use super::maneuver::{emit_maneuver_debug, ManeuverState, EXECUTE_EPS_S};
use super::pause::PauseState;
use super::prediction::{
    build_prediction_cache, emit_prediction_debug, should_rebuild, PredictionCache, PredictionDraw,
    PredictionRequest, RebuildCheck,
};
use super::scenario::{OrbitalScenario, OrbiterInfo, ScenarioConfig};
use super::sim::VelocityOriginMode;
use super::state::{GameState, GameStateContext, StateTransition, UiFrame};
use super::time_warp::{mode_for_level, rails_level_for_remaining, TimeWarpState, WarpMode, MAX_PHYSICS_WARP_LEVEL, MAX_WARP_LEVEL};
use crate::config::PredictionConfigData;
use crate::debug_draw::{debug_draw_physics_colliders, PhysicsDebugSettings};
use crate::game::{GameWorld, ShipController};
use crate::runtime::Runtime;
use crate::world::safe_length;

/// A node further away than this gets a warp-to on execute
const EXECUTE_WARP_LEAD_S: f64 = 0.01;
const HUD_CONTACT_LINES: usize = 6;

pub struct GameplayState {
    pub(super) world: GameWorld,
    pub(super) orbitsim: Option<OrbitalScenario>,
    pub(super) orbiters: Vec<OrbiterInfo>,
    pub(super) scenario_config: ScenarioConfig,
    pub(super) maneuvers: ManeuverState,
    pub(super) prediction: PredictionCache,
    pub(super) prediction_dirty: bool,
    pub(super) prediction_settings: PredictionConfigData,
    pub(super) physics_debug: PhysicsDebugSettings,
    pub(super) time_warp: TimeWarpState,
    pub(super) rails_warp_active: bool,
    pub(super) velocity_origin_mode: VelocityOriginMode,
    pub(super) contact_log: Rc<RefCell<ContactLog>>,
    pub(super) fixed_time_s: f64,
    /// Sim time covered by the last fixed step (physics or rails)
    pub(super) last_sim_step_dt_s: f64,
    pub(super) elapsed: f32,
    reset_requested: bool,
    pending: StateTransition,
}

impl GameplayState {
    pub fn new(scenario: ScenarioConfig) -> Self {
        Self {
            world: GameWorld::new(None),
            orbitsim: None,
            orbiters: Vec::new(),
            scenario_config: scenario,
            maneuvers: ManeuverState::default(),
            prediction: PredictionCache::default(),
            prediction_dirty: true,
            prediction_settings: PredictionConfigData::default(),
            physics_debug: PhysicsDebugSettings::default(),
            time_warp: TimeWarpState::default(),
            rails_warp_active: false,
            velocity_origin_mode: VelocityOriginMode::default(),
            contact_log: Rc::new(RefCell::new(ContactLog::default())),
            fixed_time_s: 0.0,
            last_sim_step_dt_s: 0.0,
            elapsed: 0.0,
            reset_requested: false,
            pending: StateTransition::None,
        }
    }

    /// Session-level state back to its start values
    pub(super) fn reset_session(&mut self) {
        self.orbiters.clear();
        self.orbitsim = None;
        self.maneuvers = ManeuverState::default();
        self.prediction.clear();
        self.prediction_dirty = true;
        self.time_warp = TimeWarpState::default();
        self.rails_warp_active = false;
        self.contact_log.borrow_mut().clear();
        self.fixed_time_s = 0.0;
        self.last_sim_step_dt_s = 0.0;
        self.elapsed = 0.0;
        self.reset_requested = false;
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub fn world(&self) -> &GameWorld {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut GameWorld {
        &mut self.world
    }

    pub fn orbitsim(&self) -> Option<&OrbitalScenario> {
        self.orbitsim.as_ref()
    }

    pub fn orbiters(&self) -> &[OrbiterInfo] {
        &self.orbiters
    }

    pub fn scenario_config(&self) -> &ScenarioConfig {
        &self.scenario_config
    }

    pub fn maneuvers(&self) -> &ManeuverState {
        &self.maneuvers
    }

    pub fn prediction(&self) -> &PredictionCache {
        &self.prediction
    }

    pub fn prediction_settings_mut(&mut self) -> &mut PredictionConfigData {
        self.prediction_dirty = true;
        &mut self.prediction_settings
    }

    pub fn physics_debug_settings_mut(&mut self) -> &mut PhysicsDebugSettings {
        &mut self.physics_debug
    }

    pub fn time_warp(&self) -> TimeWarpState {
        self.time_warp
    }

    pub fn rails_warp_active(&self) -> bool {
        self.rails_warp_active
    }

    pub fn contact_log(&self) -> Ref<'_, ContactLog> {
        self.contact_log.borrow()
    }

    pub fn fixed_time_s(&self) -> f64 {
        self.fixed_time_s
    }

    pub fn velocity_origin_mode(&self) -> VelocityOriginMode {
        self.velocity_origin_mode
    }

    pub fn set_velocity_origin_mode(&mut self, mode: VelocityOriginMode) {
        self.velocity_origin_mode = mode;
    }

    /// Rebuild the scenario on the next tick
    pub fn request_reset(&mut self) {
        self.reset_requested = true;
    }

    // ------------------------------------------------------------------------
    // Time warp
    // ------------------------------------------------------------------------

    /// User warp change. Cancels a running warp-to.
    pub fn set_time_warp_level(&mut self, level: i32) {
        self.maneuvers.cancel_warp_to();
        self.apply_warp_level(level);
    }

    pub(super) fn apply_warp_level(&mut self, level: i32) {
        let mut level = level.clamp(0, MAX_WARP_LEVEL);
        let mut mode = mode_for_level(level);
        if mode == WarpMode::RailsWarp && self.orbitsim.is_none() {
            level = MAX_PHYSICS_WARP_LEVEL;
            mode = WarpMode::PhysicsWarp;
        }
        if level == self.time_warp.warp_level && mode == self.time_warp.mode {
            return;
        }

        let was_rails = self.time_warp.is_rails();
        if was_rails && mode != WarpMode::RailsWarp {
            self.exit_rails();
        } else if !was_rails && mode == WarpMode::RailsWarp && !self.enter_rails() {
            level = MAX_PHYSICS_WARP_LEVEL;
            mode = WarpMode::PhysicsWarp;
        }

        self.time_warp = TimeWarpState { mode, warp_level: level };
        info!(
            "[TimeWarp] Level {} ({}x, {:?})",
            level,
            self.time_warp.factor(),
            mode
        );
    }

    /// Drive a running warp-to: finish when the target is reached, otherwise
    /// pick the fastest rails level that does not overshoot
    pub(super) fn update_warp_to(&mut self, fixed_dt: f32) {
        let warp_to = self.maneuvers.warp_to;
        if !warp_to.active {
            return;
        }
        let remaining = warp_to.target_s - self.sim_time_s();
        if self.orbitsim.is_none() || !(remaining > EXECUTE_EPS_S) {
            self.maneuvers.cancel_warp_to();
            self.apply_warp_level(warp_to.restore_level);
            return;
        }
        let level = rails_level_for_remaining(f64::from(fixed_dt), remaining);
        if level != self.time_warp.warp_level {
            self.apply_warp_level(level);
        }
    }

    // ------------------------------------------------------------------------
    // Maneuver nodes
    // ------------------------------------------------------------------------

    pub fn add_maneuver_node(&mut self) -> u32 {
        let id = self.maneuvers.add_node(self.sim_time_s());
        self.prediction_dirty = true;
        id
    }

    pub fn delete_maneuver_node(&mut self, id: u32) -> bool {
        let removed = self.maneuvers.delete(id);
        self.prediction_dirty |= removed;
        removed
    }

    pub fn clear_maneuver_nodes(&mut self) {
        self.maneuvers.clear();
        self.maneuvers.cancel_warp_to();
        self.prediction_dirty = true;
    }

    pub fn select_maneuver_node(&mut self, id: u32) -> bool {
        self.maneuvers.select(id)
    }

    pub fn set_maneuver_node_time(&mut self, id: u32, time_s: f64) -> bool {
        let now = self.sim_time_s();
        let changed = self.maneuvers.set_node_time(id, time_s, now);
        self.prediction_dirty |= changed;
        changed
    }

    pub fn set_maneuver_node_dv(&mut self, id: u32, dv_rtn_mps: DVec3) -> bool {
        let changed = self.maneuvers.set_node_dv(id, dv_rtn_mps);
        self.prediction_dirty |= changed;
        changed
    }

    /// Arm the selected node and warp to it when it lies ahead
    pub fn execute_selected_node(&mut self) -> bool {
        let Some(node) = self.maneuvers.selected().cloned() else {
            return false;
        };
        self.maneuvers.arm(node.id);
        self.warp_to_node_time(node.time_s);
        info!("[Maneuver] Node {} armed for t={:.2}s", node.id, node.time_s);
        true
    }

    /// Warp to the selected node without arming it
    pub fn warp_to_selected_node(&mut self) -> bool {
        let Some(time_s) = self.maneuvers.selected().map(|n| n.time_s) else {
            return false;
        };
        self.warp_to_node_time(time_s);
        true
    }

    fn warp_to_node_time(&mut self, time_s: f64) {
        if self.orbitsim.is_none() || time_s <= self.sim_time_s() + EXECUTE_WARP_LEAD_S {
            return;
        }
        let restore = self.time_warp.warp_level.min(MAX_PHYSICS_WARP_LEVEL);
        self.maneuvers.start_warp_to(time_s, restore);
    }

    // ------------------------------------------------------------------------
    // Prediction
    // ------------------------------------------------------------------------

    pub(super) fn update_prediction(&mut self, fixed_dt: f32) {
        if !self.prediction_settings.enabled {
            if self.prediction.valid {
                self.prediction.clear();
            }
            return;
        }
        let Some(orbit) = self.orbitsim.as_ref() else {
            return;
        };

        let thrusting = self.player_thrusting();
        let check = RebuildCheck {
            dirty: self.prediction_dirty,
            thrusting,
            now_s: orbit.sim.time_s(),
            fixed_dt_s: f64::from(fixed_dt),
            plan_max_time_s: if self.maneuvers.enabled {
                self.maneuvers.max_time_s()
            } else {
                None
            },
        };
        if !should_rebuild(&self.prediction, &self.prediction_settings, &check) {
            return;
        }

        let Some((ship_pos_world, ship_vel_world)) = self.player_world_state() else {
            self.prediction.clear();
            return;
        };
        let request = PredictionRequest {
            ship_pos_world,
            ship_vel_world,
            ref_body_world: self.scenario_config.system_center,
            thrusting,
            future_window_s: self.prediction_settings.future_window_s,
        };
        self.prediction = build_prediction_cache(orbit, &self.maneuvers, &request);
        self.prediction_dirty = false;
    }

    /// Orbit and maneuver overlays for this frame
    fn emit_debug(&mut self, runtime: &mut Runtime, alpha: f64, frame_dt: f32) {
        if !runtime.scene().debug_draw_enabled() {
            return;
        }
        if self.physics_debug.enabled {
            if let Some(physics) = self.world.physics() {
                debug_draw_physics_colliders(
                    runtime.scene_mut().debug_draw_mut(),
                    self.world.origin_world(),
                    physics,
                    &self.physics_debug,
                );
            }
        }
        if !self.prediction_settings.enabled || !self.prediction.valid {
            return;
        }
        let Some((_, ship_vel_world)) = self.player_world_state() else {
            return;
        };
        let Some(ship_render_pos_world) = self
            .world
            .entities
            .find(self.player_entity())
            .map(|e| e.render_position_world(alpha))
        else {
            return;
        };

        let params = PredictionDraw {
            sim_time_s: self.sim_time_s(),
            alpha,
            interp_dt_s: self.last_sim_step_dt_s,
            frame_dt_s: frame_dt,
            ship_render_pos_world,
            ship_vel_world,
            ref_body_world: self.scenario_config.system_center,
        };
        let draw = runtime.scene_mut().debug_draw_mut();
        let align = emit_prediction_debug(&self.prediction, &self.prediction_settings, draw, &params);

        if self.maneuvers.enabled && self.maneuvers.debug_draw {
            let trajectory = if self.prediction.trajectory_bci_planned.len() >= 2 {
                &self.prediction.trajectory_bci_planned
            } else {
                &self.prediction.trajectory_bci
            };
            emit_maneuver_debug(
                &mut self.maneuvers,
                draw,
                trajectory,
                params.ref_body_world,
                align,
                params.ttl_s(),
            );
        }
    }

    /// One physics-mode substep
    fn physics_substep(&mut self, runtime: &Runtime, fixed_dt: f32) {
        self.fixed_time_s += f64::from(fixed_dt);
        self.world.fixed_update(Some(runtime.input()), fixed_dt);
        self.execute_due_maneuver();
        self.update_prediction(fixed_dt);
        self.step_physics(fixed_dt);
    }

    fn handle_keys(&mut self, runtime: &Runtime) {
        let input = runtime.input();
        if input.ui_capture_keyboard {
            return;
        }
        if input.key_pressed(KeyCode::Escape) {
            self.pending = StateTransition::push(|_| PauseState::new());
            return;
        }
        let level = self.time_warp.warp_level;
        if input.key_pressed(KeyCode::Period) {
            self.set_time_warp_level(level + 1);
        } else if input.key_pressed(KeyCode::Comma) {
            self.set_time_warp_level(level - 1);
        } else if input.key_pressed(KeyCode::Slash) || input.key_pressed(KeyCode::Backspace) {
            self.set_time_warp_level(0);
        }

        if input.key_pressed(KeyCode::KeyN) {
            self.add_maneuver_node();
        }
        if input.key_pressed(KeyCode::Delete) {
            if let Some(id) = self.maneuvers.selected_node_id {
                self.delete_maneuver_node(id);
            }
        }
        if input.key_pressed(KeyCode::KeyX) {
            self.execute_selected_node();
        }
    }
}

impl GameState for GameplayState {
    fn on_enter(&mut self, ctx: &mut GameStateContext) {
        self.setup_scene(ctx.runtime);
    }

    fn on_exit(&mut self, ctx: &mut GameStateContext) {
        self.world.clear_rebase_anchor();
        self.world.clear(ctx.runtime.scene_mut());
        self.world.set_physics(None);
        self.reset_session();
    }

    fn on_update(&mut self, ctx: &mut GameStateContext, dt: f32) {
        if self.reset_requested {
            self.setup_scene(ctx.runtime);
            return;
        }
        self.elapsed += dt;

        self.handle_keys(ctx.runtime);
        if !self.pending.is_none() {
            return;
        }

        let alpha = ctx.interpolation_alpha();
        {
            let (input, _) = ctx.runtime.input_and_scene_mut();
            self.world.update(Some(input), dt);
        }
        self.emit_debug(ctx.runtime, alpha, dt);

        let scene = ctx.runtime.scene_mut();
        self.world.sync_to_render(scene, alpha);
        scene.set_world_origin(self.world.origin_world());
    }

    fn on_fixed_update(&mut self, ctx: &mut GameStateContext, fixed_dt: f32) {
        if self.reset_requested {
            self.setup_scene(ctx.runtime);
            return;
        }

        if self.time_warp.is_rails() {
            self.update_warp_to(fixed_dt);
            if self.time_warp.is_rails() {
                self.execute_due_maneuver();
                self.rails_step(ctx.runtime.input(), fixed_dt);
                self.update_prediction(fixed_dt);
            }
            return;
        }

        for _ in 0..self.time_warp.physics_substeps() {
            self.update_warp_to(fixed_dt);
            if self.time_warp.is_rails() {
                break;
            }
            self.physics_substep(ctx.runtime, fixed_dt);
        }
    }

    fn on_draw_ui(&mut self, _ctx: &mut GameStateContext, ui: &mut UiFrame) {
        let sim_time = self.sim_time_s();

        let panel = ui.panel("Gameplay");
        panel.line(format!("Time: {:.1} s (fixed {:.2}, sim {:.1})", self.elapsed, self.fixed_time_s, sim_time));
        panel.line(format!(
            "Warp: level {} ({}x, {:?})",
            self.time_warp.warp_level,
            self.time_warp.factor(),
            self.time_warp.mode
        ));
        if self.maneuvers.warp_to.active {
            panel.line(format!(
                "Warping to t={:.1}s ({:.1}s left)",
                self.maneuvers.warp_to.target_s,
                self.maneuvers.warp_to.target_s - sim_time
            ));
        }
        panel.line("[ESC] Pause  [,/.] Warp  [/] 1x  [N] Node  [X] Execute");

        let orbit_panel = ui.panel("Orbit");
        orbit_panel.line(format!("Velocity origin: {}", self.velocity_origin_mode.name()));
        match self.player_world_state() {
            None => {
                orbit_panel.line("Ship state unavailable.");
            }
            Some((pos, vel)) => {
                let r = safe_length(pos - self.scenario_config.system_center);
                let radius = self.orbitsim.as_ref().and_then(|o| o.reference_radius_m()).unwrap_or(0.0);
                let mu = self.scenario_config.mu();
                let v_circ = if r > 1.0 { (mu / r).sqrt() } else { 0.0 };
                orbit_panel.line(format!("Altitude: {:.0} m", r - radius));
                orbit_panel.line(format!(
                    "Speed:    {:.3} km/s (v_circ est {:.3} km/s)",
                    safe_length(vel) * 1.0e-3,
                    v_circ * 1.0e-3
                ));
                let vo = self.world.context.velocity_origin_world();
                orbit_panel.line(format!("v_origin: {:.1}, {:.1}, {:.1} m/s", vo.x, vo.y, vo.z));
                if let (Some(body), Some(physics)) = (self.entity_body(self.player_entity()), self.world.physics()) {
                    let v = physics.get_linear_velocity(body);
                    let w = physics.get_angular_velocity(body);
                    orbit_panel.line(format!("v_local:  {:.2}, {:.2}, {:.2} m/s", v.x, v.y, v.z));
                    orbit_panel.line(format!("w_local:  |w|={:.3} rad/s", w.length()));
                }
                let sas = self
                    .world
                    .entities
                    .with_component::<ShipController, bool>(self.player_entity(), |c| c.sas_enabled)
                    .unwrap_or(false);
                orbit_panel.line(format!("SAS: {}", if sas { "on" } else { "off" }));
            }
        }
        if self.prediction.valid {
            let p = &self.prediction;
            orbit_panel.line(format!("Pe: {:.1} km  Ap: {:.1} km", p.periapsis_alt_km, p.apoapsis_alt_km));
            orbit_panel.line(format!("a: {:.0} m  e: {:.4}  T: {:.0} s", p.semi_major_axis_m, p.eccentricity, p.orbital_period_s));
        }

        let contacts = self.contact_log.borrow();
        let contact_panel = ui.panel("Contacts");
        contact_panel.line(format!("Contacts: {}", contacts.len()));
        for e in contacts.entries().rev().take(HUD_CONTACT_LINES) {
            contact_panel.line(format!(
                "[{:?}][{:.2}s] self={} other={} depth={:.3} p=({:.2},{:.2},{:.2})",
                e.event_type,
                e.time_s,
                e.self_body.value(),
                e.other_body.value(),
                e.penetration_depth,
                e.point.x,
                e.point.y,
                e.point.z
            ));
        }
        drop(contacts);

        let node_panel = ui.panel("Maneuver nodes");
        if self.maneuvers.nodes.is_empty() {
            node_panel.line("No nodes.");
        }
        for node in &self.maneuvers.nodes {
            let selected = if self.maneuvers.selected_node_id == Some(node.id) { ">" } else { " " };
            let armed = if self.maneuvers.execute_node_id == Some(node.id) { " [armed]" } else { "" };
            node_panel.line(format!(
                "{} #{} T{:+.1}s dv=({:.2}, {:.2}, {:.2}) |dv|={:.2} m/s{}",
                selected,
                node.id,
                node.time_s - sim_time,
                node.dv_rtn_mps.x,
                node.dv_rtn_mps.y,
                node.dv_rtn_mps.z,
                safe_length(node.dv_rtn_mps),
                armed
            ));
        }
    }

    fn wants_fixed_update(&self) -> bool {
        true
    }

    fn name(&self) -> &'static str {
        "Gameplay"
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
