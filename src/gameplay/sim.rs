/// Fixed-step simulation of the gameplay state
///
/// Two authorities exist for orbiter motion. Outside rails warp the rigid-body
/// world integrates the orbiters in a moving local frame
/// (`x_world = origin_world + x_local`, `v_world = velocity_origin_world + v_local`)
/// and gravity is applied here as a velocity increment. In rails warp the
/// rigid bodies are frozen and one spacecraft per orbiter is propagated by the
/// N-body simulator; bodies are only teleported along.

use glam::{DVec3, Quat, Vec3};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use winit::keyboard::KeyCode;

use super::gameplay_state::GameplayState;
use super::scenario::{OrbitalScenario, RailsState};
use crate::game::{EntityId, ShipController};
use crate::orbit::{compute_rtn_frame, make_state, nbody_accel_body_centered, point_mass_accel, Spacecraft, SpacecraftId, G_SI};
use crate::physics::BodyId;
use crate::runtime::InputState;
use crate::world::{self, WorldVec3};

/// How the velocity origin follows the anchor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VelocityOriginMode {
    /// Galilean shift every step so the anchor's local velocity stays ~0
    PerStepAnchorSync,
    /// Integrate the velocity origin with the anchor's gravity and apply
    /// gravity in the anchor's free-fall frame. The threshold rebaser only
    /// corrects drift.
    #[default]
    FreeFallAnchorFrame,
}

impl VelocityOriginMode {
    pub fn name(self) -> &'static str {
        match self {
            VelocityOriginMode::PerStepAnchorSync => "per-step anchor sync",
            VelocityOriginMode::FreeFallAnchorFrame => "free-fall anchor frame",
        }
    }
}

/// Gravitational acceleration at a world position, in the frame translating
/// with the reference body. Falls back to a point mass when the simulator
/// has no usable reference body.
pub fn gravity_accel_world_at(orbit: Option<&OrbitalScenario>, system_center: WorldVec3, p_world: WorldVec3) -> DVec3 {
    let Some(orbit) = orbit else {
        return DVec3::ZERO;
    };
    let p_rel = p_world - system_center;
    if let Some(ref_id) = orbit.reference_sim_id() {
        if orbit.sim.body_by_id(ref_id).is_some() {
            return nbody_accel_body_centered(&orbit.sim, ref_id, p_rel);
        }
    }
    match orbit.reference_mass_kg() {
        Some(mass) if mass > 0.0 => point_mass_accel(G_SI, mass, p_rel, 0.0),
        _ => DVec3::ZERO,
    }
}

impl GameplayState {
    /// Sim time: the rails simulator's clock when present
    pub fn sim_time_s(&self) -> f64 {
        match &self.orbitsim {
            Some(orbit) => orbit.sim.time_s(),
            None => self.fixed_time_s,
        }
    }

    pub(super) fn player_index(&self) -> Option<usize> {
        if self.orbiters.is_empty() {
            return None;
        }
        Some(self.orbiters.iter().position(|o| o.is_player).unwrap_or(0))
    }

    pub fn player_entity(&self) -> EntityId {
        self.player_index()
            .map(|i| self.orbiters[i].entity)
            .unwrap_or(EntityId::INVALID)
    }

    /// Anchor preference: flagged anchor, then the player, then any orbiter
    pub(super) fn select_rebase_anchor(&self) -> EntityId {
        let alive = |id: EntityId| self.world.entities.exists(id);
        self.orbiters
            .iter()
            .find(|o| o.is_rebase_anchor && alive(o.entity))
            .or_else(|| self.orbiters.iter().find(|o| o.is_player && alive(o.entity)))
            .or_else(|| self.orbiters.iter().find(|o| alive(o.entity)))
            .map(|o| o.entity)
            .unwrap_or(EntityId::INVALID)
    }

    /// Re-pick the anchor when the current one disappeared
    pub(super) fn update_rebase_anchor(&mut self) {
        let current = self.world.rebase_anchor();
        if current.is_valid() && self.world.entities.exists(current) {
            return;
        }
        let next = self.select_rebase_anchor();
        if next.is_valid() && next != current {
            self.world.set_rebase_anchor(next);
            debug!("Rebase anchor set to entity {}", next.0);
        }
    }

    /// Valid body of the anchor, or of the player when no anchor is set
    fn anchor_body(&self) -> Option<BodyId> {
        let mut id = self.world.rebase_anchor();
        if !id.is_valid() {
            id = self.player_entity();
        }
        self.entity_body(id)
    }

    pub(super) fn entity_body(&self, id: EntityId) -> Option<BodyId> {
        let body = self.world.entities.find(id)?.physics_body?;
        let physics = self.world.physics()?;
        physics.is_body_valid(body).then_some(body)
    }

    /// Move celestial render entities to their simulated positions
    pub(super) fn sync_celestials(&mut self) {
        let Some(orbit) = self.orbitsim.as_ref() else {
            return;
        };
        let (Some(ref_id), Some(ref_state)) = (orbit.reference_sim_id(), orbit.reference_state()) else {
            return;
        };
        let center = self.scenario_config.system_center;
        for info in &orbit.bodies {
            let Some(body) = orbit.sim.body_by_id(info.sim_id) else {
                continue;
            };
            let position = if info.sim_id == ref_id {
                center
            } else {
                center + (body.state.position_m - ref_state.position_m)
            };
            if let Some(entity) = self.world.entities.find_mut(info.render_entity) {
                entity.set_position_world(position);
                entity.set_rotation(Quat::IDENTITY);
            }
        }
    }

    /// One rigid-body step with N-body gravity and the moving frame
    pub(super) fn step_physics(&mut self, fixed_dt: f32) {
        if self.world.physics.is_none() {
            return;
        }
        let dt = f64::from(fixed_dt);

        self.update_rebase_anchor();
        self.contact_log.borrow_mut().set_time(self.fixed_time_s);
        self.world.pre_physics_step();

        if let Some(orbit) = self.orbitsim.as_mut() {
            orbit.sim.step(dt);
        }
        self.sync_celestials();

        let center = self.scenario_config.system_center;
        let origin = self.world.context.origin_world();
        let anchor = self.anchor_body();
        let gravity_bodies: Vec<BodyId> = self
            .orbiters
            .iter()
            .filter(|o| o.apply_gravity)
            .filter_map(|o| self.entity_body(o.entity))
            .collect();

        let orbit = self.orbitsim.as_ref();
        let context = &mut self.world.context;
        let Some(physics) = self.world.physics.as_deref_mut() else {
            return;
        };

        let mut frame_accel = DVec3::ZERO;
        if let Some(body) = anchor {
            match self.velocity_origin_mode {
                VelocityOriginMode::PerStepAnchorSync => {
                    let v_local = physics.get_linear_velocity(body).as_dvec3();
                    if world::is_finite(v_local) {
                        let v_origin = context.velocity_origin_world() + v_local;
                        context.set_velocity_origin_world(v_origin);
                        physics.shift_velocity_origin(v_local);
                    }
                }
                VelocityOriginMode::FreeFallAnchorFrame => {
                    let p_anchor = origin + physics.get_position(body);
                    let a_anchor = gravity_accel_world_at(orbit, center, p_anchor);
                    context.set_velocity_origin_world(context.velocity_origin_world() + a_anchor * dt);
                    frame_accel = a_anchor;
                }
            }
        }

        for body in gravity_bodies {
            let p_world = origin + physics.get_position(body);
            let a_local = gravity_accel_world_at(orbit, center, p_world) - frame_accel;
            let v_local = physics.get_linear_velocity(body) + (a_local * dt).as_vec3();
            physics.set_linear_velocity(body, v_local);
            physics.activate(body);
        }

        physics.step(fixed_dt);

        let v_origin = context.velocity_origin_world();
        if world::is_finite(v_origin) {
            context.set_origin_world(context.origin_world() + v_origin * dt);
        }

        self.world.post_physics_step();
        self.last_sim_step_dt_s = dt;
    }

    /// World position and velocity of the player, from whichever side is
    /// authoritative. Velocity is relative to the reference body.
    pub fn player_world_state(&self) -> Option<(WorldVec3, DVec3)> {
        let index = self.player_index()?;
        let orbiter = &self.orbiters[index];

        if self.rails_warp_active {
            let orbit = self.orbitsim.as_ref()?;
            let sc = orbit.sim.spacecraft_by_id(orbiter.rails.sc_id)?;
            let rel = sc.state.relative_to(&orbit.reference_state()?);
            return Some((self.scenario_config.system_center + rel.position_m, rel.velocity_mps));
        }

        let position = self.world.entities.find(orbiter.entity)?.position_world();
        let velocity = match (self.entity_body(orbiter.entity), self.world.physics()) {
            (Some(body), Some(physics)) => {
                self.world.context.velocity_origin_world() + physics.get_linear_velocity(body).as_dvec3()
            }
            _ => DVec3::ZERO,
        };
        Some((position, velocity))
    }

    pub(super) fn player_thrusting(&self) -> bool {
        if self.rails_warp_active {
            return false;
        }
        self.world
            .entities
            .with_component::<ShipController, bool>(self.player_entity(), |c| c.thrust_applied_this_tick())
            .unwrap_or(false)
    }

    /// Fire the armed node once its time has come
    pub(super) fn execute_due_maneuver(&mut self) {
        let now = self.sim_time_s();
        let Some(node) = self.maneuvers.due_node(now).cloned() else {
            return;
        };

        match self.player_world_state() {
            Some((position, velocity)) => {
                let frame = compute_rtn_frame(position - self.scenario_config.system_center, velocity);
                let dv_world = frame.to_world(node.dv_rtn_mps);
                if world::is_finite(dv_world) {
                    self.apply_player_delta_v(dv_world);
                    info!(
                        "[Maneuver] Node {} executed at t={:.2}s, |dv|={:.3} m/s",
                        node.id,
                        now,
                        world::safe_length(dv_world)
                    );
                } else {
                    warn!("[Maneuver] Node {} produced a non-finite burn, skipped", node.id);
                }
            }
            None => warn!("[Maneuver] Node {} dropped: no player state", node.id),
        }

        self.maneuvers.finish_execution(node.id);
        self.prediction_dirty = true;
    }

    fn apply_player_delta_v(&mut self, dv_world: DVec3) {
        let Some(index) = self.player_index() else {
            return;
        };
        if self.rails_warp_active {
            let sc_id = self.orbiters[index].rails.sc_id;
            if let Some(sc) = self.orbitsim.as_mut().and_then(|o| o.sim.spacecraft_by_id_mut(sc_id)) {
                sc.state.velocity_mps += dv_world;
            }
            return;
        }
        let Some(body) = self.entity_body(self.orbiters[index].entity) else {
            return;
        };
        if let Some(physics) = self.world.physics_mut() {
            let v_local = physics.get_linear_velocity(body) + dv_world.as_vec3();
            physics.set_linear_velocity(body, v_local);
            physics.activate(body);
        }
    }

    // ------------------------------------------------------------------------
    // Rails warp
    // ------------------------------------------------------------------------

    /// Hand every orbiter over to the N-body simulator
    pub(super) fn enter_rails(&mut self) -> bool {
        if self.rails_warp_active {
            return true;
        }
        let Some(ref_state) = self.orbitsim.as_ref().and_then(|o| o.reference_state()) else {
            return false;
        };
        let center = self.scenario_config.system_center;
        let origin = self.world.context.origin_world();
        let v_origin = self.world.context.velocity_origin_world();
        let player_sas = self
            .world
            .entities
            .with_component::<ShipController, bool>(self.player_entity(), |c| c.sas_enabled)
            .unwrap_or(false);

        let mut handed_over = Vec::with_capacity(self.orbiters.len());
        for orbiter in &self.orbiters {
            let body = self.entity_body(orbiter.entity);
            let Some(entity) = self.world.entities.find(orbiter.entity) else {
                handed_over.push(None);
                continue;
            };
            let (p_world, v_world, rotation, omega) = match (body, self.world.physics()) {
                (Some(body), Some(physics)) => (
                    origin + physics.get_position(body),
                    v_origin + physics.get_linear_velocity(body).as_dvec3(),
                    physics.get_rotation(body),
                    physics.get_angular_velocity(body),
                ),
                _ => (entity.position_world(), v_origin, entity.rotation(), Vec3::ZERO),
            };
            handed_over.push(Some((p_world, v_world, rotation, omega)));
        }

        let Some(orbit) = self.orbitsim.as_mut() else {
            return false;
        };
        for (orbiter, state) in self.orbiters.iter_mut().zip(handed_over) {
            let Some((p_world, v_world, rotation, omega)) = state else {
                orbiter.rails = RailsState::default();
                continue;
            };
            let handle = orbit.sim.create_spacecraft(Spacecraft {
                state: make_state(
                    ref_state.position_m + (p_world - center),
                    ref_state.velocity_mps + v_world,
                ),
                ..Spacecraft::default()
            });
            orbiter.rails = RailsState {
                sc_id: handle.id,
                rotation,
                angular_velocity: omega,
                sas_enabled: orbiter.is_player && player_sas,
                sas_toggle_prev_down: false,
            };
        }

        self.rails_warp_active = true;
        info!("[TimeWarp] Entered rails warp with {} orbiters", self.orbiters.len());
        true
    }

    /// Snap entities and bodies back onto the simulator's final states and
    /// re-seed both origins on the anchor
    pub(super) fn exit_rails(&mut self) {
        if !self.rails_warp_active {
            return;
        }
        let center = self.scenario_config.system_center;
        let states: Vec<Option<(WorldVec3, DVec3)>> = match self.orbitsim.as_ref() {
            Some(orbit) => {
                let ref_state = orbit.reference_state().unwrap_or_default();
                self.orbiters
                    .iter()
                    .map(|o| {
                        orbit.sim.spacecraft_by_id(o.rails.sc_id).map(|sc| {
                            let rel = sc.state.relative_to(&ref_state);
                            (center + rel.position_m, rel.velocity_mps)
                        })
                    })
                    .collect()
            }
            None => vec![None; self.orbiters.len()],
        };

        let anchor = self.world.rebase_anchor();
        let anchor_state = self
            .orbiters
            .iter()
            .zip(&states)
            .find(|(o, _)| o.entity == anchor)
            .or_else(|| self.orbiters.iter().zip(&states).find(|(o, _)| o.is_player))
            .and_then(|(_, s)| *s);
        if let Some((p_anchor, v_anchor)) = anchor_state {
            self.world.context.set_origin_world(p_anchor);
            self.world.context.set_velocity_origin_world(v_anchor);
        }
        let origin = self.world.context.origin_world();
        let v_origin = self.world.context.velocity_origin_world();

        for (orbiter, state) in self.orbiters.iter().zip(&states) {
            let Some((p_world, v_world)) = *state else {
                continue;
            };
            let rails = orbiter.rails;
            let body = self.entity_body(orbiter.entity);
            if let Some(entity) = self.world.entities.find_mut(orbiter.entity) {
                entity.set_position_world(p_world);
                entity.set_rotation(rails.rotation);
                entity.interpolation.set_immediate(p_world, rails.rotation);
            }
            if let (Some(body), Some(physics)) = (body, self.world.physics_mut()) {
                physics.set_transform(body, p_world - origin, rails.rotation);
                physics.set_linear_velocity(body, (v_world - v_origin).as_vec3());
                physics.set_angular_velocity(body, rails.angular_velocity);
                physics.activate(body);
            }
            if orbiter.is_player {
                if let Some(controller) = self.world.entities.get_component_mut::<ShipController>(orbiter.entity) {
                    controller.sas_enabled = rails.sas_enabled;
                }
            }
        }

        if let Some(orbit) = self.orbitsim.as_mut() {
            for orbiter in &self.orbiters {
                if orbiter.rails.sc_id.is_valid() {
                    orbit.sim.remove_spacecraft(orbiter.rails.sc_id);
                }
            }
        }
        for orbiter in &mut self.orbiters {
            orbiter.rails.sc_id = SpacecraftId::INVALID;
        }

        self.rails_warp_active = false;
        self.prediction_dirty = true;
        info!("[TimeWarp] Left rails warp at t={:.2}s", self.sim_time_s());
    }

    /// One rails step of `fixed_dt · factor`, clamped to a pending warp-to target
    pub(super) fn rails_step(&mut self, input: &InputState, fixed_dt: f32) {
        if !self.rails_warp_active {
            return;
        }
        let mut dt = f64::from(fixed_dt) * self.time_warp.factor();
        if self.maneuvers.warp_to.active {
            dt = dt.min(self.maneuvers.warp_to.target_s - self.sim_time_s());
        }
        if !(dt > 0.0) || !dt.is_finite() {
            return;
        }

        let Some(orbit) = self.orbitsim.as_mut() else {
            return;
        };
        orbit.sim.step(dt);
        let ref_state = orbit.reference_state().unwrap_or_default();
        self.sync_celestials();
        self.fixed_time_s += dt;
        self.last_sim_step_dt_s = dt;

        let center = self.scenario_config.system_center;
        let toggle_down = !input.ui_capture_keyboard && input.key_down_raw(KeyCode::KeyT);
        let player_controller = self
            .world
            .entities
            .with_component::<ShipController, ShipController>(self.player_entity(), |c| c.clone());

        let mut poses = Vec::with_capacity(self.orbiters.len());
        for orbiter in &mut self.orbiters {
            let Some(sc) = self.orbitsim.as_ref().and_then(|o| o.sim.spacecraft_by_id(orbiter.rails.sc_id)) else {
                poses.push(None);
                continue;
            };
            let p_world = center + (sc.state.position_m - ref_state.position_m);

            let rails = &mut orbiter.rails;
            if orbiter.is_player {
                if toggle_down && !rails.sas_toggle_prev_down {
                    rails.sas_enabled = !rails.sas_enabled;
                }
                rails.sas_toggle_prev_down = toggle_down;
                if rails.sas_enabled {
                    if let Some(controller) = &player_controller {
                        rails.angular_velocity = controller.damp_angular_velocity(rails.angular_velocity, dt as f32);
                    }
                }
            }
            let spin = Quat::from_scaled_axis(rails.angular_velocity * dt as f32);
            rails.rotation = world::sanitize_rotation((spin * rails.rotation).normalize());
            poses.push(Some((orbiter.entity, p_world, rails.rotation)));
        }

        let origin = self.world.context.origin_world();
        for (id, p_world, rotation) in poses.into_iter().flatten() {
            let body = self.entity_body(id);
            if let Some(entity) = self.world.entities.find_mut(id) {
                if entity.use_interpolation {
                    entity.interpolation.store_current_as_previous();
                    entity.interpolation.curr_position = p_world;
                    entity.interpolation.curr_rotation = rotation;
                }
                entity.set_position_world(p_world);
                entity.set_rotation(rotation);
            }
            if let (Some(body), Some(physics)) = (body, self.world.physics_mut()) {
                physics.set_transform(body, p_world - origin, rotation);
            }
        }

        self.update_rebase_anchor();
        if let Some(body) = self.anchor_body() {
            let settings = self.world.rebase_settings();
            if let Some(physics) = self.world.physics.as_deref_mut() {
                self.world.context.maybe_rebase_origin_to_body(
                    physics,
                    body,
                    settings.origin_threshold_m,
                    settings.origin_snap_m,
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameplay::scene::build_orbital_scenario;
    use crate::gameplay::scenario::default_earth_moon_config;

    #[test]
    fn test_gravity_points_at_reference() {
        let cfg = default_earth_moon_config();
        let orbit = build_orbital_scenario(&cfg);
        let p = cfg.system_center + DVec3::new(6_771_000.0, 0.0, 0.0);
        let a = gravity_accel_world_at(orbit.as_ref(), cfg.system_center, p);
        assert!(a.x < 0.0);
        assert!((a.length() - 8.69).abs() < 0.05, "|a| = {}", a.length());
    }

    #[test]
    fn test_gravity_without_scenario_is_zero() {
        assert_eq!(gravity_accel_world_at(None, DVec3::ZERO, DVec3::X), DVec3::ZERO);
    }

    #[test]
    fn test_velocity_origin_mode_serde() {
        let json = serde_json::to_string(&VelocityOriginMode::PerStepAnchorSync).unwrap();
        assert_eq!(json, "\"per_step_anchor_sync\"");
        let back: VelocityOriginMode = serde_json::from_str("\"free_fall_anchor_frame\"").unwrap();
        assert_eq!(back, VelocityOriginMode::FreeFallAnchorFrame);
    }
}
