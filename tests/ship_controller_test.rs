/// Ship controller SAS damping and render interpolation of physics entities

use glam::{DVec3, Vec3};
use orbit_engine::game::{GameWorld, SceneApi, ShipController};
use orbit_engine::physics::{BodySettings, CollisionShape, PhysicsWorld, RapierPhysicsWorld};
use orbit_engine::runtime::InputState;

const FIXED_DT: f32 = 1.0 / 60.0;

fn tick(world: &mut GameWorld, input: &InputState) {
    world.fixed_update(Some(input), FIXED_DT);
    world.pre_physics_step();
    if let Some(physics) = world.physics_mut() {
        physics.step(FIXED_DT);
    }
    world.post_physics_step();
}

fn free_sphere() -> BodySettings {
    BodySettings::new()
        .with_shape(CollisionShape::Sphere { radius: 1.0 })
        .with_angular_damping(0.0)
        .with_allow_sleeping(false)
}

#[test]
fn test_sas_damps_spin_exponentially() {
    let mut world = GameWorld::new(Some(Box::new(RapierPhysicsWorld::new())));
    let mut scene = SceneApi::new();
    let ship = world
        .builder("ship")
        .physics(free_sphere().with_angular_velocity(Vec3::new(0.0, 1.0, 0.0)))
        .component(ShipController::default().with_sas(true))
        .build(&mut scene)
        .unwrap();
    let body = world.entities.find(ship).unwrap().body_id();

    let input = InputState::new();
    for _ in 0..60 {
        tick(&mut world, &input);
    }

    let omega = world.physics().unwrap().get_angular_velocity(body);
    let expected = (-5.0_f32).exp();
    assert!((omega.length() - expected).abs() < 5.0e-4, "|w| = {}", omega.length());
    assert!(omega.x.abs() < 1.0e-5 && omega.z.abs() < 1.0e-5);
}

#[test]
fn test_spin_is_kept_without_sas() {
    let mut world = GameWorld::new(Some(Box::new(RapierPhysicsWorld::new())));
    let mut scene = SceneApi::new();
    let ship = world
        .builder("ship")
        .physics(free_sphere().with_angular_velocity(Vec3::new(0.0, 1.0, 0.0)))
        .component(ShipController::default())
        .build(&mut scene)
        .unwrap();
    let body = world.entities.find(ship).unwrap().body_id();

    let input = InputState::new();
    for _ in 0..60 {
        tick(&mut world, &input);
    }
    let omega = world.physics().unwrap().get_angular_velocity(body);
    assert!((omega.length() - 1.0).abs() < 1.0e-3);
}

#[test]
fn test_sas_toggle_is_edge_triggered() {
    let mut sas = ShipController::default();
    assert!(!sas.sas_enabled);
    sas.update_sas_toggle(true);
    sas.update_sas_toggle(true);
    sas.update_sas_toggle(true);
    assert!(sas.sas_enabled);
    sas.update_sas_toggle(false);
    sas.update_sas_toggle(true);
    assert!(!sas.sas_enabled);
}

#[test]
fn test_builder_keeps_first_of_duplicate_components() {
    let mut world = GameWorld::new(Some(Box::new(RapierPhysicsWorld::new())));
    let mut scene = SceneApi::new();
    let ship = world
        .builder("ship")
        .physics(free_sphere())
        .component(ShipController::default().with_sas(true))
        .component(ShipController::default())
        .build(&mut scene)
        .unwrap();

    assert!(world.entities.has_component::<ShipController>(ship));
    assert_eq!(world.entities.with_component(ship, |c: &ShipController| c.sas_enabled), Some(true));
}

#[test]
fn test_thrust_accelerates_along_ship_forward() {
    let mut world = GameWorld::new(Some(Box::new(RapierPhysicsWorld::new())));
    let mut scene = SceneApi::new();
    let ship = world
        .builder("ship")
        .physics(free_sphere().with_mass(10.0))
        .component(ShipController::new(100.0, 0.0))
        .build(&mut scene)
        .unwrap();
    let body = world.entities.find(ship).unwrap().body_id();

    let mut input = InputState::new();
    input.set_key(winit::keyboard::KeyCode::KeyW, true);
    for _ in 0..60 {
        tick(&mut world, &input);
    }

    // F/m = 10 m/s^2 along -Z for one second
    let v = world.physics().unwrap().get_linear_velocity(body);
    assert!((v.z + 10.0).abs() < 0.5, "v = {v:?}");
    assert!(v.x.abs() < 1.0e-3 && v.y.abs() < 1.0e-3);
}

#[test]
fn test_render_position_interpolates_between_physics_ticks() {
    let mut world = GameWorld::new(Some(Box::new(RapierPhysicsWorld::new())));
    let mut scene = SceneApi::new();
    world.context.set_origin_world(DVec3::new(4.0e11, 0.0, 0.0));
    let id = world
        .builder("mover")
        .position(DVec3::new(4.0e11, 0.0, 0.0))
        .physics(free_sphere().with_linear_velocity(Vec3::new(6.0, 0.0, -3.0)))
        .interpolate(true)
        .build(&mut scene)
        .unwrap();

    let input = InputState::new();
    for _ in 0..10 {
        tick(&mut world, &input);
    }

    let entity = world.entities.find(id).unwrap();
    let prev = entity.interpolation.prev_position;
    let curr = entity.interpolation.curr_position;
    let step = DVec3::new(6.0, 0.0, -3.0) * f64::from(FIXED_DT);
    assert!((curr - prev - step).length() < 1.0e-3);

    for alpha in [0.0, 0.25, 0.5, 0.75] {
        let expected = prev + (curr - prev) * alpha;
        assert!((entity.render_position_world(alpha) - expected).length() < 1.0e-3);
    }
    assert_eq!(entity.render_position_world(1.0), entity.position_world());
}
