/// Scenario setup for the gameplay state
///
/// The reference body is pinned at `system_center` in the rendered world.
/// Satellites start on circular two-body orbits around it and the whole
/// system is moved into its barycentric frame before the bodies are created.

use std::f64::consts::TAU;

use glam::{DVec3, Vec3};
use tracing::{info, warn};

use super::gameplay_state::GameplayState;
use super::scenario::{CelestialBodyInfo, OrbitalScenario, OrbiterInfo, RailsState, ScenarioConfig};
use crate::game::{EntityId, PrimitiveType, ShipController};
use crate::orbit::{
    circular_orbit_relative_state_xz, make_state, GameSimulation, MassiveBody, SimConfig, State, G_SI,
};
use crate::physics::{BodyCallbacks, PhysicsContext, PhysicsWorld, RapierPhysicsWorld};
use crate::runtime::Runtime;
use crate::world::WorldVec3;

/// Camera offset from the player at scene start
const CAMERA_OFFSET: DVec3 = DVec3::new(0.0, 10.0, 40.0);

/// N-body scenario for `cfg`, or `None` without a usable reference body
pub fn build_orbital_scenario(cfg: &ScenarioConfig) -> Option<OrbitalScenario> {
    let reference = cfg.reference()?;
    if !(reference.mass_kg > 0.0) {
        warn!("[Gameplay] Reference body '{}' has no mass", reference.name);
        return None;
    }

    let speed_scale = cfg.speed_scale.max(0.0);
    let g = G_SI * speed_scale * speed_scale;
    let mut sim = GameSimulation::new(SimConfig {
        gravitational_constant: g,
        softening_length_m: 0.0,
        enable_events: false,
    });

    // Reference at rest at the origin, satellites spread in argument of latitude
    let satellites = cfg.celestials.len().saturating_sub(1).max(1);
    let mut states: Vec<State> = Vec::with_capacity(cfg.celestials.len());
    for (i, c) in cfg.celestials.iter().enumerate() {
        if i == 0 {
            states.push(State::default());
            continue;
        }
        let separation = c.orbit_distance_m.max(reference.radius_m * 2.0);
        let u = TAU * (i - 1) as f64 / satellites as f64;
        states.push(circular_orbit_relative_state_xz(
            g,
            reference.mass_kg + c.mass_kg.max(0.0),
            separation,
            u,
        ));
    }

    let total_mass: f64 = cfg.celestials.iter().map(|c| c.mass_kg.max(0.0)).sum();
    if total_mass > 0.0 {
        let mut com = State::default();
        for (c, s) in cfg.celestials.iter().zip(&states) {
            com.position_m += c.mass_kg.max(0.0) * s.position_m;
            com.velocity_mps += c.mass_kg.max(0.0) * s.velocity_mps;
        }
        com.position_m /= total_mass;
        com.velocity_mps /= total_mass;
        for s in &mut states {
            *s = s.relative_to(&com);
        }
    }

    let mut bodies = Vec::with_capacity(cfg.celestials.len());
    for (i, (c, state)) in cfg.celestials.iter().zip(states).enumerate() {
        let handle = sim.create_body(MassiveBody {
            mass_kg: c.mass_kg,
            radius_m: c.radius_m,
            atmosphere_top_height_m: c.atmosphere_top_m,
            terrain_max_height_m: c.terrain_max_m,
            soi_radius_m: c.soi_radius_m,
            state: make_state(state.position_m, state.velocity_mps),
            ..MassiveBody::default()
        });
        if !handle.valid() {
            if i == 0 {
                warn!("[Gameplay] Reference body '{}' rejected by the simulator", c.name);
                return None;
            }
            warn!("[Gameplay] Celestial '{}' rejected by the simulator", c.name);
            continue;
        }
        bodies.push(CelestialBodyInfo {
            sim_id: handle.id,
            render_entity: EntityId::INVALID,
            name: c.name.clone(),
            radius_m: c.radius_m,
            mass_kg: c.mass_kg,
        });
    }

    Some(OrbitalScenario {
        sim,
        bodies,
        reference_body_index: 0,
    })
}

/// Circular-orbit start state of the primary orbiter, relative to the
/// reference body: position in world space and velocity
pub fn primary_orbit_state(cfg: &ScenarioConfig, altitude_m: f64) -> (WorldVec3, DVec3) {
    let Some(reference) = cfg.reference() else {
        return (cfg.system_center, DVec3::ZERO);
    };
    let speed_scale = cfg.speed_scale.max(0.0);
    let g = G_SI * speed_scale * speed_scale;
    let radius = (reference.radius_m + altitude_m.max(0.0)).max(1.0);
    let rel = circular_orbit_relative_state_xz(g, reference.mass_kg, radius, 0.0);
    (cfg.system_center + rel.position_m, rel.velocity_mps)
}

impl GameplayState {
    /// Tear down whatever exists and build the scenario from `scenario_config`
    pub(super) fn setup_scene(&mut self, runtime: &mut Runtime) {
        self.reset_session();

        self.world.clear_rebase_anchor();
        self.world.clear(runtime.scene_mut());
        runtime.scene_mut().clear_instances();

        let physics: Box<dyn PhysicsWorld> = Box::new(RapierPhysicsWorld::with_gravity(Vec3::ZERO));
        self.world.set_physics(Some(physics));
        self.world.context = PhysicsContext::new();

        let physics_cfg = runtime.config().physics.clone();
        self.velocity_origin_mode = physics_cfg.velocity_origin_mode;
        self.prediction_settings = runtime.config().prediction.clone();
        self.physics_debug = runtime.config().debug_draw.physics_colliders.clone();
        let debug_draw = runtime.config().debug_draw.enabled;

        let cfg = self.scenario_config.clone();
        let mut orbit = build_orbital_scenario(&cfg);

        let primary = cfg.orbiters.iter().position(|o| o.is_player).unwrap_or(0);
        let altitude = cfg.orbiters.get(primary).map(|o| o.orbit_altitude_m).unwrap_or(0.0);
        let (primary_pos, primary_vel) = primary_orbit_state(&cfg, altitude);

        self.world.context.set_origin_world(primary_pos);
        self.world.context.set_velocity_origin_world(primary_vel);
        let v_origin = self.world.context.velocity_origin_world();

        for (i, def) in cfg.orbiters.iter().enumerate() {
            let (pos, vel) = if i == primary {
                (primary_pos, primary_vel)
            } else {
                (primary_pos + def.offset_from_player, primary_vel + def.relative_velocity)
            };
            let settings = def
                .body_settings
                .clone()
                .with_linear_velocity((vel - v_origin).as_vec3());

            let mut builder = self
                .world
                .builder(&def.name)
                .position(pos)
                .scale(def.render_scale)
                .render_primitive(def.primitive)
                .physics(settings);
            if def.is_player {
                builder = builder.component(ShipController::default());
            }
            let Some(id) = builder.build(runtime.scene_mut()) else {
                warn!("[Gameplay] Orbiter '{}' could not be spawned", def.name);
                continue;
            };
            self.orbiters.push(OrbiterInfo {
                entity: id,
                name: def.name.clone(),
                apply_gravity: true,
                is_player: def.is_player,
                is_rebase_anchor: def.is_rebase_anchor,
                rails: RailsState::default(),
            });
        }

        if let Some(orbit) = orbit.as_mut() {
            self.spawn_celestials(runtime, &cfg, orbit);
        }
        self.orbitsim = orbit;
        self.sync_celestials();

        let anchor = self.select_rebase_anchor();
        if anchor.is_valid() {
            self.world.set_rebase_anchor(anchor);
        }
        self.world.set_rebase_settings(crate::game::RebaseSettings {
            origin_threshold_m: physics_cfg.origin_threshold_m,
            origin_snap_m: physics_cfg.origin_snap_m,
            velocity_threshold_mps: physics_cfg.velocity_threshold_mps,
        });

        self.install_contact_callbacks();

        let scene = runtime.scene_mut();
        scene.camera.position_world = primary_pos + CAMERA_OFFSET;
        scene.set_debug_draw_enabled(debug_draw);
        scene.set_world_origin(self.world.origin_world());

        info!(
            "[Gameplay] Scenario ready: {} celestials, {} orbiters, {}",
            self.orbitsim.as_ref().map(|o| o.bodies.len()).unwrap_or(0),
            self.orbiters.len(),
            self.velocity_origin_mode.name()
        );
    }

    /// Plain spheres for every celestial, scaled by radius
    fn spawn_celestials(&mut self, runtime: &mut Runtime, cfg: &ScenarioConfig, orbit: &mut OrbitalScenario) {
        for info in &mut orbit.bodies {
            let render_scale = cfg
                .celestials
                .iter()
                .find(|c| c.name == info.name)
                .map(|c| c.render_scale)
                .unwrap_or(1.0);
            let scale = Vec3::splat(info.radius_m as f32 * render_scale);
            let built = self
                .world
                .builder(&info.name)
                .position(cfg.system_center)
                .scale(scale)
                .render_primitive(PrimitiveType::Sphere)
                .interpolate(false)
                .build(runtime.scene_mut());
            match built {
                Some(id) => info.render_entity = id,
                None => warn!("[Gameplay] Celestial '{}' has no render entity", info.name),
            }
        }
    }

    /// Record Begin contacts of the player body into the contact log
    fn install_contact_callbacks(&mut self) {
        let Some(body) = self.entity_body(self.player_entity()) else {
            return;
        };
        let log = self.contact_log.clone();
        if let Some(physics) = self.world.physics_mut() {
            physics.set_body_callbacks(
                body,
                BodyCallbacks::new().with_collision(move |event| log.borrow_mut().record(event)),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gameplay::scenario::default_earth_moon_config;

    #[test]
    fn test_scenario_barycentric() {
        let cfg = default_earth_moon_config();
        let orbit = build_orbital_scenario(&cfg).unwrap();
        assert_eq!(orbit.bodies.len(), 2);

        let mut p = DVec3::ZERO;
        let mut v = DVec3::ZERO;
        for body in orbit.sim.massive_bodies() {
            p += body.mass_kg * body.state.position_m;
            v += body.mass_kg * body.state.velocity_mps;
        }
        assert!(p.length() / 6.0e24 < 1e-6);
        assert!(v.length() / 6.0e24 < 1e-9);
    }

    #[test]
    fn test_moon_at_configured_distance() {
        let cfg = default_earth_moon_config();
        let orbit = build_orbital_scenario(&cfg).unwrap();
        let earth = orbit.sim.body_by_id(orbit.bodies[0].sim_id).unwrap();
        let moon = orbit.sim.body_by_id(orbit.bodies[1].sim_id).unwrap();
        let d = (moon.state.position_m - earth.state.position_m).length();
        assert!((d - 384_400_000.0).abs() < 1.0);
    }

    #[test]
    fn test_no_reference_without_mass() {
        let mut cfg = default_earth_moon_config();
        cfg.celestials[0].mass_kg = 0.0;
        assert!(build_orbital_scenario(&cfg).is_none());
    }

    #[test]
    fn test_primary_orbit_is_circular() {
        let cfg = default_earth_moon_config();
        let (p, v) = primary_orbit_state(&cfg, 400_000.0);
        let r = (p - cfg.system_center).length();
        assert!((r - 6_771_000.0).abs() < 1e-6);
        assert!((v.length() - (cfg.mu() / r).sqrt()).abs() < 1.0);
        assert!((p - cfg.system_center).dot(v).abs() < 1e-3);
    }
}
