/// Box stack on a ground slab; a sphere is launched into it after a delay
/// and everything is put back once something falls off the world

use glam::{DVec3, Quat, Vec3};
use tracing::info;

use crate::game::{EntityId, GameWorld, PrimitiveType};
use crate::physics::{BodySettings, CollisionShape, Layer, RapierPhysicsWorld};
use crate::runtime::{GameCallbacks, Runtime};
use crate::world::WorldVec3;

const GRAVITY: Vec3 = Vec3::new(0.0, -9.81, 0.0);
const STACK_HEIGHT: usize = 6;
const BOX_HALF: f32 = 0.5;
const LAUNCH_DELAY_S: f32 = 10.0;
const LAUNCH_VELOCITY: Vec3 = Vec3::new(18.0, 0.0, 4.0);
const KILL_Y: f64 = -50.0;
const BALL_START: DVec3 = DVec3::new(-20.0, 1.0, -4.0);

pub struct ExampleGame {
    world: GameWorld,
    elapsed: f32,
    launched: bool,
    ball: EntityId,
    /// Entity and spawn position of everything that can be reset
    spawns: Vec<(EntityId, WorldVec3)>,
}

impl Default for ExampleGame {
    fn default() -> Self {
        Self::new()
    }
}

impl ExampleGame {
    pub fn new() -> Self {
        Self {
            world: GameWorld::new(None),
            elapsed: 0.0,
            launched: false,
            ball: EntityId::INVALID,
            spawns: Vec::new(),
        }
    }

    pub fn world(&self) -> &GameWorld {
        &self.world
    }

    pub fn launched(&self) -> bool {
        self.launched
    }

    pub fn ball(&self) -> EntityId {
        self.ball
    }

    fn build_scene(&mut self, runtime: &mut Runtime) {
        let scene = runtime.scene_mut();

        self.world
            .builder("ground")
            .position(DVec3::new(0.0, -0.5, 0.0))
            .scale(Vec3::new(100.0, 1.0, 100.0))
            .render_primitive(PrimitiveType::Cube)
            .physics(
                BodySettings::new()
                    .with_shape(CollisionShape::Box {
                        half_extents: Vec3::new(50.0, 0.5, 50.0),
                    })
                    .with_layer(Layer::STATIC)
                    .set_static(),
            )
            .build(scene);

        for i in 0..STACK_HEIGHT {
            let name = format!("box_{i}");
            let pos = DVec3::new(0.0, f64::from(BOX_HALF) + i as f64 * 1.05, 0.0);
            let built = self
                .world
                .builder(&name)
                .position(pos)
                .render_primitive(PrimitiveType::Cube)
                .physics(
                    BodySettings::new()
                        .with_shape(CollisionShape::Box {
                            half_extents: Vec3::splat(BOX_HALF),
                        })
                        .with_layer(Layer::DYNAMIC)
                        .with_mass(1.0),
                )
                .build(scene);
            if let Some(id) = built {
                self.spawns.push((id, pos));
            }
        }

        let ball = self
            .world
            .builder("ball")
            .position(BALL_START)
            .render_primitive(PrimitiveType::Sphere)
            .physics(
                BodySettings::new()
                    .with_shape(CollisionShape::Sphere { radius: 0.5 })
                    .with_layer(Layer::PROJECTILE)
                    .with_mass(5.0)
                    .with_restitution(0.3),
            )
            .build(scene);
        if let Some(id) = ball {
            self.ball = id;
            self.spawns.push((id, BALL_START));
        }

        scene.camera.position_world = DVec3::new(0.0, 6.0, 25.0);
    }

    fn launch_ball(&mut self) {
        let Some(body) = self.world.entities.find(self.ball).map(|e| e.body_id()) else {
            return;
        };
        if let Some(physics) = self.world.physics_mut() {
            physics.set_linear_velocity(body, LAUNCH_VELOCITY);
            physics.activate(body);
        }
        self.launched = true;
        info!("[Example] Ball launched");
    }

    fn fell_off(&self) -> bool {
        self.spawns.iter().any(|(id, _)| {
            self.world
                .entities
                .find(*id)
                .map(|e| e.position_world().y < KILL_Y)
                .unwrap_or(false)
        })
    }

    fn reset(&mut self) {
        for (id, pos) in self.spawns.clone() {
            self.world.teleport(id, pos, Quat::IDENTITY);
        }
        self.elapsed = 0.0;
        self.launched = false;
        info!("[Example] Scene reset");
    }
}

impl GameCallbacks for ExampleGame {
    fn on_init(&mut self, runtime: &mut Runtime) {
        self.world.set_physics(Some(Box::new(RapierPhysicsWorld::with_gravity(GRAVITY))));
        self.build_scene(runtime);
        info!("[Example] {} entities", self.world.entities.count());
    }

    fn on_update(&mut self, runtime: &mut Runtime, dt: f32) {
        let alpha = runtime.time().interpolation_alpha();
        let (input, scene) = runtime.input_and_scene_mut();
        self.world.update(Some(input), dt);
        self.world.sync_to_render(scene, alpha);
        scene.set_world_origin(self.world.origin_world());
    }

    fn on_fixed_update(&mut self, runtime: &mut Runtime, fixed_dt: f32) {
        self.elapsed += fixed_dt;
        if !self.launched && self.elapsed >= LAUNCH_DELAY_S {
            self.launch_ball();
        }

        self.world.fixed_update(Some(runtime.input()), fixed_dt);
        self.world.pre_physics_step();
        if let Some(physics) = self.world.physics_mut() {
            physics.step(fixed_dt);
        }
        self.world.post_physics_step();

        if self.fell_off() {
            self.reset();
        }
    }

    fn on_shutdown(&mut self, runtime: &mut Runtime) {
        self.world.clear(runtime.scene_mut());
        self.world.set_physics(None);
    }
}
