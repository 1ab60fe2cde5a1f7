/// Floating origin: rebasing rules and world/local consistency

use glam::{DVec3, Quat, Vec3};
use orbit_engine::game::{EntityId, GameWorld, PrimitiveType, RebaseSettings, SceneApi};
use orbit_engine::physics::{BodySettings, CollisionShape, PhysicsContext, PhysicsWorld, RapierPhysicsWorld};
use orbit_engine::world::WorldVec3;

const FIXED_DT: f32 = 1.0 / 60.0;

fn sphere(velocity: Vec3) -> BodySettings {
    BodySettings::new()
        .with_shape(CollisionShape::Sphere { radius: 1.0 })
        .with_linear_velocity(velocity)
        .with_angular_damping(0.0)
        .with_allow_sleeping(false)
}

fn step(world: &mut GameWorld) {
    world.pre_physics_step();
    if let Some(physics) = world.physics_mut() {
        physics.step(FIXED_DT);
    }
    world.post_physics_step();
}

fn coordinate_error(world: &GameWorld, id: EntityId) -> f64 {
    let entity = world.entities.find(id).unwrap();
    let physics = world.physics().unwrap();
    let body = entity.body_id();
    (entity.position_world() - (world.context.origin_world() + physics.get_position(body))).length()
}

#[test]
fn test_rebase_at_threshold_far_from_origin() {
    let start = DVec3::new(1.0e12 + 400.0e3, 0.0, 0.0);
    let mut world = GameWorld::new(Some(Box::new(RapierPhysicsWorld::new())));
    let mut scene = SceneApi::new();
    world.context.set_origin_world(start);
    let first_revision = world.context.origin_revision();

    let ship = world
        .builder("ship")
        .position(start)
        .render_primitive(PrimitiveType::Sphere)
        .physics(sphere(Vec3::new(0.0, 0.0, 7670.0)))
        .build(&mut scene)
        .unwrap();
    world.set_rebase_anchor(ship);
    world.set_rebase_settings(RebaseSettings {
        origin_threshold_m: 20_000.0,
        origin_snap_m: 10_000.0,
        velocity_threshold_mps: 0.0,
    });

    let body = world.entities.find(ship).unwrap().body_id();
    let mut max_local = 0.0_f64;
    for _ in 0..(30 * 60) {
        step(&mut world);
        let p_local = world.physics().unwrap().get_position(body);
        max_local = max_local.max(p_local.length());
        assert!(coordinate_error(&world, ship) < 1.0e-3);
    }

    assert!(world.context.origin_revision() > first_revision);
    assert!(max_local < 20_000.0 + 7670.0 * f64::from(FIXED_DT) + 1.0, "max |p_local| = {max_local}");

    let p = world.entities.find(ship).unwrap().position_world();
    assert!((p.x - 1.0e12 - 400.0e3).abs() < 20_000.0);
    assert!((p.z - 7670.0 * 30.0).abs() < 50.0, "z = {}", p.z);
}

#[test]
fn test_rebase_is_idempotent() {
    let mut physics = RapierPhysicsWorld::new();
    let mut ctx = PhysicsContext::new();
    ctx.set_origin_world(DVec3::new(5.0e9, 0.0, 0.0));
    let body = physics
        .create_body(&sphere(Vec3::ZERO).with_position(DVec3::new(35_000.0, -12_000.0, 4.0)))
        .unwrap();

    assert!(ctx.maybe_rebase_origin_to_body(&mut physics, body, 20_000.0, 10_000.0));
    let origin = ctx.origin_world();
    let world_pos = origin + physics.get_position(body);

    assert!(!ctx.maybe_rebase_origin_to_body(&mut physics, body, 20_000.0, 10_000.0));
    assert_eq!(ctx.origin_world(), origin);
    assert_eq!(ctx.origin_world() + physics.get_position(body), world_pos);
}

#[test]
fn test_rebase_preserves_world_state() {
    let mut physics = RapierPhysicsWorld::new();
    let mut ctx = PhysicsContext::new();
    ctx.set_origin_world(DVec3::new(1.0e12, 2.0e6, -3.0e5));
    ctx.set_velocity_origin_world(DVec3::new(0.0, 0.0, 7_000.0));

    let anchor = physics
        .create_body(&sphere(Vec3::new(2_500.0, 0.0, 0.0)).with_position(DVec3::new(30_000.0, 0.0, 0.0)))
        .unwrap();
    let other = physics
        .create_body(&sphere(Vec3::new(-3.0, 1.0, 0.5)).with_position(DVec3::new(29_000.0, 150.0, -20.0)))
        .unwrap();

    let world_state = |ctx: &PhysicsContext, physics: &RapierPhysicsWorld, id| -> (WorldVec3, WorldVec3) {
        (
            ctx.origin_world() + physics.get_position(id),
            ctx.velocity_origin_world() + physics.get_linear_velocity(id).as_dvec3(),
        )
    };
    let before: Vec<_> = [anchor, other].iter().map(|&id| world_state(&ctx, &physics, id)).collect();

    assert!(ctx.maybe_rebase_origin_to_body(&mut physics, anchor, 20_000.0, 0.0));
    assert!(ctx.maybe_rebase_velocity_to_body(&mut physics, anchor, 2_000.0));

    let after: Vec<_> = [anchor, other].iter().map(|&id| world_state(&ctx, &physics, id)).collect();
    for ((p0, v0), (p1, v1)) in before.iter().zip(&after) {
        assert!((*p0 - *p1).length() < 1.0e-2, "{p0:?} vs {p1:?}");
        assert!((*v0 - *v1).length() < 1.0e-3, "{v0:?} vs {v1:?}");
    }
    assert!(physics.get_linear_velocity(anchor).length() < 1.0e-3);
}

#[test]
fn test_teleport_keeps_world_position() {
    let mut world = GameWorld::new(Some(Box::new(RapierPhysicsWorld::new())));
    let mut scene = SceneApi::new();
    world.context.set_origin_world(DVec3::new(-7.0e10, 0.0, 0.0));
    let id = world
        .builder("probe")
        .position(DVec3::new(-7.0e10, 10.0, 0.0))
        .physics(sphere(Vec3::new(1.0, 0.0, 0.0)))
        .build(&mut scene)
        .unwrap();

    let target = DVec3::new(-7.0e10 + 1_234.5, -20.0, 3.0);
    assert!(world.teleport(id, target, Quat::IDENTITY));
    let body = world.entities.find(id).unwrap().body_id();
    assert!(world.physics().unwrap().get_linear_velocity(body).length() < 1.0e-6);
    assert!(coordinate_error(&world, id) < 1.0e-3);
    assert!((world.entities.find(id).unwrap().position_world() - target).length() < 1.0e-3);
}
