/// Frame clock, headless loop and debug draw lifetimes

use glam::{DVec3, Quat, Vec3, Vec4};
use orbit_engine::config::EngineConfig;
use orbit_engine::debug_draw::{debug_draw_physics_colliders, DebugDrawLayer, DebugDrawSystem, DebugStyle, PhysicsDebugSettings};
use orbit_engine::games::SpaceCombatGame;
use orbit_engine::physics::{BodySettings, CollisionShape, CompoundChild, PhysicsWorld, RapierPhysicsWorld};
use orbit_engine::runtime::time_manager::{MAX_FIXED_DELTA, MAX_FRAME_DELTA, MIN_FIXED_DELTA};
use orbit_engine::runtime::{GameCallbacks, HeadlessPlatform, Runtime, TimeManager};
use winit::keyboard::KeyCode;

#[test]
fn test_accumulator_accounts_for_all_scaled_time() {
    let mut time = TimeManager::new();
    time.set_fixed_delta_time(1.0 / 50.0);
    time.set_time_scale(1.5);

    let deltas = [0.016, 0.033, 0.007, 0.25, 0.0, 0.05, f64::NAN, 0.012];
    let mut steps = 0u32;
    for raw in deltas {
        time.begin_frame_with(raw);
        while time.consume_fixed_step() {
            steps += 1;
        }
        let alpha = time.interpolation_alpha();
        assert!((0.0..1.0).contains(&alpha), "alpha = {alpha}");
        assert!(time.fixed_accumulator() < time.fixed_delta_time());
    }

    // The stall frame is clamped and NaN counts as zero
    let scaled: f64 = [0.016, 0.033, 0.007, MAX_FRAME_DELTA, 0.0, 0.05, 0.0, 0.012]
        .iter()
        .map(|d| d * 1.5)
        .sum();
    let accounted = f64::from(steps) * time.fixed_delta_time() + time.fixed_accumulator();
    assert!((accounted - scaled).abs() < 1e-9);
    assert!((time.total_time() - scaled).abs() < 1e-9);
    assert_eq!(time.frame_count(), deltas.len() as u64);
}

#[test]
fn test_fixed_delta_is_clamped() {
    let mut time = TimeManager::new();
    time.set_fixed_delta_time(1.0);
    assert_eq!(time.fixed_delta_time(), MAX_FIXED_DELTA);
    time.set_fixed_delta_time(1.0e-6);
    assert_eq!(time.fixed_delta_time(), MIN_FIXED_DELTA);
    time.set_fixed_delta_time(f64::INFINITY);
    assert_eq!(time.fixed_delta_time(), MIN_FIXED_DELTA);
}

#[test]
fn test_zero_time_scale_runs_no_fixed_steps() {
    let mut time = TimeManager::new();
    time.set_time_scale(-2.0);
    assert_eq!(time.time_scale(), 0.0);
    for _ in 0..10 {
        time.begin_frame_with(1.0 / 60.0);
        assert!(!time.consume_fixed_step());
    }
    assert_eq!(time.total_time(), 0.0);
    assert!(time.unscaled_total_time() > 0.16);
}

#[derive(Default)]
struct CountingGame {
    inits: u32,
    updates: u32,
    fixed_updates: u32,
    shutdowns: u32,
}

impl GameCallbacks for CountingGame {
    fn on_init(&mut self, _runtime: &mut Runtime) {
        self.inits += 1;
    }

    fn on_update(&mut self, _runtime: &mut Runtime, _dt: f32) {
        self.updates += 1;
    }

    fn on_fixed_update(&mut self, _runtime: &mut Runtime, _fixed_dt: f32) {
        self.fixed_updates += 1;
    }

    fn on_shutdown(&mut self, _runtime: &mut Runtime) {
        self.shutdowns += 1;
    }
}

#[test]
fn test_headless_run_stops_after_max_frames() {
    let platform = HeadlessPlatform::new(1.0 / 60.0, 10);
    let mut runtime = Runtime::new(Box::new(platform), EngineConfig::default());
    let mut game = CountingGame::default();
    runtime.run(&mut game).unwrap();

    assert_eq!(game.inits, 1);
    assert_eq!(game.shutdowns, 1);
    assert_eq!(game.updates, 10);
    assert!((9..=10).contains(&game.fixed_updates), "fixed updates = {}", game.fixed_updates);
    assert!(runtime.quit_requested());
}

#[test]
fn test_minimized_frames_skip_updates() {
    let platform = HeadlessPlatform::new(1.0 / 60.0, 6).minimized_at(2).minimized_at(3);
    let mut runtime = Runtime::new(Box::new(platform), EngineConfig::default());
    let mut game = CountingGame::default();
    runtime.run(&mut game).unwrap();
    assert_eq!(game.updates, 4);
}

#[test]
fn test_space_combat_leaves_title_on_enter() {
    let platform = HeadlessPlatform::new(1.0 / 60.0, 12)
        .hold_keys(2, &[KeyCode::Enter])
        .hold_keys(3, &[]);
    let mut runtime = Runtime::new(Box::new(platform), EngineConfig::default());
    let mut game = SpaceCombatGame::new();
    runtime.run(&mut game).unwrap();

    let titles = game.last_ui().titles();
    assert!(titles.contains(&"Gameplay"), "panels: {titles:?}");
    assert!(!titles.contains(&"Orbit Engine"));
    // shutdown pops everything
    assert!(game.states().is_empty());
}

#[test]
fn test_debug_draw_ttl_expiry() {
    let white = Vec4::ONE;
    let mut draw = DebugDrawSystem::new();

    draw.add_line(DVec3::ZERO, DVec3::X, &DebugStyle::new(white).ttl(0.05));
    assert_eq!(draw.command_count(), 1);
    draw.begin_frame(0.1);
    assert_eq!(draw.command_count(), 0);

    // One-frame commands survive until the next begin_frame, whatever its dt
    draw.add_line(DVec3::ZERO, DVec3::Y, &DebugStyle::new(white).ttl(-1.0));
    draw.add_line(DVec3::ZERO, DVec3::Z, &DebugStyle::new(white));
    assert_eq!(draw.command_count(), 2);
    draw.begin_frame(0.0);
    assert_eq!(draw.command_count(), 0);

    draw.add_line(DVec3::ZERO, DVec3::X, &DebugStyle::new(white).ttl(1.0));
    for _ in 0..5 {
        draw.begin_frame(0.1);
    }
    assert_eq!(draw.command_count(), 1);
    for _ in 0..6 {
        draw.begin_frame(0.1);
    }
    assert_eq!(draw.command_count(), 0);
}

#[test]
fn test_debug_lines_are_origin_relative() {
    let mut draw = DebugDrawSystem::new();
    draw.settings.enabled = true;
    let origin = DVec3::new(1.0e12, -3.0e9, 5.0);
    draw.add_line(
        origin + DVec3::new(1.0, 2.0, 3.0),
        origin + DVec3::new(-4.0, 0.5, 0.0),
        &DebugStyle::new(Vec4::ONE),
    );
    let lists = draw.build_line_vertices(origin);
    let vertices = lists.depth_vertices();
    assert_eq!(vertices.len(), 2);
    assert!((vertices[0].position - glam::Vec3::new(1.0, 2.0, 3.0)).length() < 1e-5);
    assert!((vertices[1].position - glam::Vec3::new(-4.0, 0.5, 0.0)).length() < 1e-5);
}

/// Ground plane, dynamic box, kinematic capsule, sensor sphere, sleeping
/// cylinder and a two-child compound, created in that order
fn collider_zoo() -> RapierPhysicsWorld {
    let mut physics = RapierPhysicsWorld::new();
    let bodies = [
        BodySettings::new()
            .with_shape(CollisionShape::Plane { normal: Vec3::Y, offset: 0.0 })
            .set_static(),
        BodySettings::new().with_position(DVec3::new(10.0, 0.0, 0.0)),
        BodySettings::new()
            .with_shape(CollisionShape::capsule(0.5, 1.0))
            .with_position(DVec3::new(0.0, 5.0, 0.0))
            .set_kinematic(),
        BodySettings::new()
            .with_shape(CollisionShape::sphere(2.0))
            .with_position(DVec3::new(0.0, 0.0, 10.0))
            .as_sensor(true),
        BodySettings::new()
            .with_shape(CollisionShape::cylinder(1.0, 1.0))
            .with_position(DVec3::new(-10.0, 0.0, 0.0))
            .with_start_active(false),
        BodySettings::new()
            .with_shape(CollisionShape::compound(vec![
                CompoundChild::new(CollisionShape::cuboid(0.5, 0.5, 0.5), Vec3::new(-1.0, 0.0, 0.0), Quat::IDENTITY),
                CompoundChild::new(CollisionShape::sphere(0.5), Vec3::new(1.0, 0.0, 0.0), Quat::IDENTITY),
            ]))
            .with_position(DVec3::new(0.0, 0.0, -10.0)),
    ];
    for settings in &bodies {
        physics.create_body(settings).unwrap();
    }
    physics
}

fn draw_colliders(physics: &RapierPhysicsWorld, settings: &PhysicsDebugSettings) -> (usize, usize) {
    let mut draw = DebugDrawSystem::new();
    let bodies = debug_draw_physics_colliders(&mut draw, DVec3::ZERO, physics, settings);
    (bodies, draw.command_count())
}

#[test]
fn test_physics_collider_filters() {
    let physics = collider_zoo();
    let all = PhysicsDebugSettings::default();

    // plane patch 4, box 1, capsule 1, sphere 1, cylinder 6, compound 2
    assert_eq!(draw_colliders(&physics, &all), (6, 15));

    let no_static = PhysicsDebugSettings { include_static: false, ..all.clone() };
    assert_eq!(draw_colliders(&physics, &no_static), (5, 11));

    let no_sensors = PhysicsDebugSettings { include_sensors: false, ..all.clone() };
    assert_eq!(draw_colliders(&physics, &no_sensors), (5, 14));

    let no_dynamic = PhysicsDebugSettings { include_dynamic: false, ..all.clone() };
    assert_eq!(draw_colliders(&physics, &no_dynamic), (2, 5));

    // Static bodies and the sleeping cylinder are not active
    let active_only = PhysicsDebugSettings { active_only: true, ..all.clone() };
    assert_eq!(draw_colliders(&physics, &active_only), (4, 5));

    let first_two = PhysicsDebugSettings { max_bodies: 2, ..all };
    assert_eq!(draw_colliders(&physics, &first_two), (2, 5));
}

#[test]
fn test_physics_colliders_on_physics_layer() {
    let physics = collider_zoo();
    let origin = DVec3::new(1.0e12, 0.0, 0.0);
    let only_box = PhysicsDebugSettings {
        include_static: false,
        include_kinematic: false,
        include_sensors: false,
        max_bodies: 1,
        ..PhysicsDebugSettings::default()
    };

    let mut draw = DebugDrawSystem::new();
    draw.settings.enabled = true;
    assert_eq!(debug_draw_physics_colliders(&mut draw, origin, &physics, &only_box), 1);

    // Overlay by default; local box spans x in [9.5, 10.5]
    let lists = draw.build_line_vertices(origin);
    assert!(lists.depth_vertices().is_empty());
    let vertices = lists.overlay_vertices();
    assert_eq!(vertices.len(), 24);
    for v in vertices {
        assert!((9.5 - 1e-4..=10.5 + 1e-4).contains(&v.position.x), "{:?}", v.position);
        assert!((v.color.w - 0.75).abs() < 1e-6);
    }

    draw.settings.layer_mask = DebugDrawLayer::ALL_MASK & !DebugDrawLayer::Physics.bit();
    assert!(draw.build_line_vertices(origin).vertices.is_empty());
}
