/// Floating-origin stress test: one ship on a fast point-mass orbit far from
/// the world origin, with position and velocity rebasing doing all the work
/// of keeping local coordinates small.

use std::collections::VecDeque;

use glam::{DVec3, Vec3, Vec4};
use tracing::info;

use crate::debug_draw::{DebugDrawLayer, DebugStyle};
use crate::game::{EntityId, GameWorld, PrimitiveType, RebaseSettings};
use crate::orbit::{circular_orbit_relative_state_xz, point_mass_accel, G_SI};
use crate::physics::{BodySettings, CollisionShape, Layer, RapierPhysicsWorld};
use crate::runtime::{GameCallbacks, Runtime};
use crate::world::WorldVec3;

const CENTER: WorldVec3 = DVec3::new(1.0e12, 0.0, 0.0);
const EARTH_MASS_KG: f64 = 5.972e24;
const ORBIT_RADIUS_M: f64 = 6_771_000.0;
const SPEED_SCALE: f64 = 10.0;
const TRAIL_LEN: usize = 256;
const TRAIL_EVERY_TICKS: u64 = 30;
const REPORT_EVERY_S: f64 = 10.0;

/// Rebase counters. Only revision bumps made while rebasing count; the
/// per-tick advection of the origin by the velocity origin does not.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RebaseStats {
    pub origin_rebases: u64,
    pub velocity_rebases: u64,
    pub max_local_distance_m: u64,
}

pub struct RebasingTestGame {
    world: GameWorld,
    ship: EntityId,
    gravitational_constant: f64,
    ticks: u64,
    sim_time_s: f64,
    next_report_s: f64,
    stats: RebaseStats,
    trail: VecDeque<WorldVec3>,
}

impl Default for RebasingTestGame {
    fn default() -> Self {
        Self::new()
    }
}

impl RebasingTestGame {
    pub fn new() -> Self {
        Self {
            world: GameWorld::new(None),
            ship: EntityId::INVALID,
            gravitational_constant: G_SI * SPEED_SCALE * SPEED_SCALE,
            ticks: 0,
            sim_time_s: 0.0,
            next_report_s: REPORT_EVERY_S,
            stats: RebaseStats::default(),
            trail: VecDeque::with_capacity(TRAIL_LEN),
        }
    }

    pub fn world(&self) -> &GameWorld {
        &self.world
    }

    pub fn ship(&self) -> EntityId {
        self.ship
    }

    pub fn stats(&self) -> RebaseStats {
        self.stats
    }

    pub fn sim_time_s(&self) -> f64 {
        self.sim_time_s
    }

    /// Radius of the ship's orbit right now
    pub fn orbit_radius_m(&self) -> Option<f64> {
        self.world
            .entities
            .find(self.ship)
            .map(|e| (e.position_world() - CENTER).length())
    }

    fn apply_gravity(&mut self, dt: f32) {
        let Some(body) = self.world.entities.find(self.ship).map(|e| e.body_id()) else {
            return;
        };
        let origin = self.world.context.origin_world();
        let g = self.gravitational_constant;
        let Some(physics) = self.world.physics_mut() else {
            return;
        };
        let p_world = origin + physics.get_position(body);
        let a = point_mass_accel(g, EARTH_MASS_KG, p_world - CENTER, 0.0);
        let v = physics.get_linear_velocity(body).as_dvec3() + a * f64::from(dt);
        physics.set_linear_velocity(body, v.as_vec3());
        physics.activate(body);
    }

    /// Rebase through the world and record which origins moved
    fn rebase_and_count(&mut self) {
        let origin_rev = self.world.context.origin_revision();
        let velocity_rev = self.world.context.velocity_origin_revision();
        self.world.pre_physics_step();
        if self.world.context.origin_revision() != origin_rev {
            self.stats.origin_rebases += 1;
        }
        if self.world.context.velocity_origin_revision() != velocity_rev {
            self.stats.velocity_rebases += 1;
        }
    }

    fn track_local_distance(&mut self) {
        if let (Some(body), Some(physics)) = (
            self.world.entities.find(self.ship).map(|e| e.body_id()),
            self.world.physics(),
        ) {
            let d = physics.get_position(body).length() as u64;
            self.stats.max_local_distance_m = self.stats.max_local_distance_m.max(d);
        }
    }

    fn draw_trail(&self, runtime: &mut Runtime) {
        if !runtime.scene().debug_draw_enabled() {
            return;
        }
        let style = DebugStyle::new(Vec4::new(0.2, 0.9, 1.0, 1.0))
            .on_top()
            .layer(DebugDrawLayer::Misc);
        let draw = runtime.scene_mut().debug_draw_mut();
        for (a, b) in self.trail.iter().zip(self.trail.iter().skip(1)) {
            draw.add_line(*a, *b, &style);
        }
    }
}

impl GameCallbacks for RebasingTestGame {
    fn on_init(&mut self, runtime: &mut Runtime) {
        self.world.set_physics(Some(Box::new(RapierPhysicsWorld::with_gravity(Vec3::ZERO))));

        let rel = circular_orbit_relative_state_xz(self.gravitational_constant, EARTH_MASS_KG, ORBIT_RADIUS_M, 0.0);
        let start = CENTER + rel.position_m;
        self.world.context.set_origin_world(start);

        let physics_cfg = runtime.config().physics.clone();
        let built = self
            .world
            .builder("ship")
            .position(start)
            .scale(Vec3::new(2.0, 2.0, 4.0))
            .render_primitive(PrimitiveType::Capsule)
            .physics(
                BodySettings::new()
                    .with_shape(CollisionShape::Capsule {
                        radius: 1.0,
                        half_height: 1.0,
                    })
                    .with_layer(Layer::PLAYER)
                    .with_angular_damping(0.0)
                    .with_allow_sleeping(false)
                    .with_linear_velocity(rel.velocity_mps.as_vec3()),
            )
            .build(runtime.scene_mut());
        let Some(ship) = built else {
            info!("[RebasingTest] Ship could not be created");
            runtime.request_quit();
            return;
        };
        self.ship = ship;
        self.world.set_rebase_anchor(ship);
        self.world.set_rebase_settings(RebaseSettings {
            origin_threshold_m: physics_cfg.origin_threshold_m,
            origin_snap_m: physics_cfg.origin_snap_m,
            velocity_threshold_mps: physics_cfg.velocity_threshold_mps.max(2000.0),
        });

        info!(
            "[RebasingTest] Orbit r={:.0} m, v={:.0} m/s",
            ORBIT_RADIUS_M,
            rel.velocity_mps.length()
        );
    }

    fn on_update(&mut self, runtime: &mut Runtime, dt: f32) {
        let alpha = runtime.time().interpolation_alpha();
        self.draw_trail(runtime);

        let (input, scene) = runtime.input_and_scene_mut();
        self.world.update(Some(input), dt);
        self.world.sync_to_render(scene, alpha);
        scene.set_world_origin(self.world.origin_world());
        if let Some(ship) = self.world.entities.find(self.ship) {
            scene.camera.position_world = ship.render_position_world(alpha) + DVec3::new(0.0, 5.0, 20.0);
        }
    }

    fn on_fixed_update(&mut self, runtime: &mut Runtime, fixed_dt: f32) {
        self.world.fixed_update(Some(runtime.input()), fixed_dt);
        self.apply_gravity(fixed_dt);

        self.rebase_and_count();
        if let Some(physics) = self.world.physics_mut() {
            physics.step(fixed_dt);
        }
        let dt = f64::from(fixed_dt);
        let origin = self.world.context.origin_world() + self.world.context.velocity_origin_world() * dt;
        self.world.context.set_origin_world(origin);
        self.world.post_physics_step();

        self.ticks += 1;
        self.sim_time_s += dt;
        self.track_local_distance();

        if self.ticks % TRAIL_EVERY_TICKS == 0 {
            if let Some(p) = self.world.entities.find(self.ship).map(|e| e.position_world()) {
                if self.trail.len() == TRAIL_LEN {
                    self.trail.pop_front();
                }
                self.trail.push_back(p);
            }
        }

        if self.sim_time_s >= self.next_report_s {
            self.next_report_s += REPORT_EVERY_S;
            info!(
                "[RebasingTest] t={:.0}s r={:.0} m origin rebases={} velocity rebases={} max |p_local|={} m",
                self.sim_time_s,
                self.orbit_radius_m().unwrap_or(0.0),
                self.stats.origin_rebases,
                self.stats.velocity_rebases,
                self.stats.max_local_distance_m
            );
        }
    }

    fn on_shutdown(&mut self, runtime: &mut Runtime) {
        info!(
            "[RebasingTest] Done: {} origin rebases, {} velocity rebases",
            self.stats.origin_rebases, self.stats.velocity_rebases
        );
        self.world.clear(runtime.scene_mut());
        self.world.set_physics(None);
    }
}
