/// Gameplay state driven headless: rails warp, maneuver execution and overlays

use glam::DVec3;
use orbit_engine::config::EngineConfig;
use orbit_engine::gameplay::{
    default_earth_moon_config, GameStateManager, GameplayState, PauseState, ScenarioConfig, VelocityOriginMode,
};
use orbit_engine::orbit::{compute_orbital_elements, G_SI};
use orbit_engine::physics::PhysicsWorld;
use orbit_engine::runtime::{HeadlessPlatform, Runtime};

const FIXED_DT: f32 = 1.0 / 60.0;

fn start_session() -> (Runtime, GameStateManager) {
    start_session_with(|config| config.prediction.enabled = false)
}

fn start_session_with(configure: impl FnOnce(&mut EngineConfig)) -> (Runtime, GameStateManager) {
    let mut config = EngineConfig::default();
    configure(&mut config);
    let mut runtime = Runtime::new(Box::new(HeadlessPlatform::new(f64::from(FIXED_DT), 0)), config);
    let scenario = default_earth_moon_config();
    let mut states = GameStateManager::new(scenario.clone());
    states.push(&mut runtime, Box::new(GameplayState::new(scenario)));
    (runtime, states)
}

fn gameplay(states: &mut GameStateManager) -> &mut GameplayState {
    states.find_mut::<GameplayState>().unwrap()
}

fn earth_mu(cfg: &ScenarioConfig) -> f64 {
    G_SI * cfg.celestials[0].mass_kg
}

/// Player position relative to the reference body and velocity
fn player_rel(state: &GameplayState) -> (DVec3, DVec3) {
    let (p, v) = state.player_world_state().unwrap();
    (p - state.scenario_config().system_center, v)
}

#[test]
fn test_rails_round_trip_restores_entities() {
    let (mut runtime, mut states) = start_session();
    for _ in 0..30 {
        states.fixed_update(&mut runtime, FIXED_DT);
    }

    gameplay(&mut states).set_time_warp_level(6);
    assert!(gameplay(&mut states).rails_warp_active());
    assert!(gameplay(&mut states).time_warp().is_rails());

    let t0 = gameplay(&mut states).sim_time_s();
    for _ in 0..60 {
        states.fixed_update(&mut runtime, FIXED_DT);
    }
    let state = gameplay(&mut states);
    assert!((state.sim_time_s() - t0 - 60.0 * 1000.0 * f64::from(FIXED_DT)).abs() < 1e-6);

    let orbit = state.orbitsim().unwrap();
    let ref_state = orbit.reference_state().unwrap();
    let center = state.scenario_config().system_center;
    let expected: Vec<_> = state
        .orbiters()
        .iter()
        .map(|o| {
            let sc = orbit.sim.spacecraft_by_id(o.rails.sc_id).unwrap();
            (o.entity, center + sc.state.relative_to(&ref_state).position_m)
        })
        .collect();
    let spacecraft_before = orbit.sim.spacecraft().len();

    state.set_time_warp_level(0);
    assert!(!state.rails_warp_active());
    assert_eq!(state.orbitsim().unwrap().sim.spacecraft().len(), spacecraft_before - expected.len());

    for (id, p) in expected {
        let entity = state.world().entities.find(id).unwrap();
        assert!((entity.position_world() - p).length() < 1.0, "{:?} vs {:?}", entity.position_world(), p);
    }
    // Origin re-seeded on the anchor
    let anchor = state.world().rebase_anchor();
    let p_anchor = state.world().entities.find(anchor).unwrap().position_world();
    assert!((state.world().origin_world() - p_anchor).length() < 1.0);
}

#[test]
fn test_rails_energy_drift_is_small() {
    let (mut runtime, mut states) = start_session();
    let mu = earth_mu(&default_earth_moon_config());

    let state = gameplay(&mut states);
    state.set_time_warp_level(6);
    let (r0, v0) = player_rel(state);
    let e0 = 0.5 * v0.length_squared() - mu / r0.length();

    // 216 rails steps of 16.67 s cover one hour
    for _ in 0..216 {
        states.fixed_update(&mut runtime, FIXED_DT);
    }
    let state = gameplay(&mut states);
    assert!((state.sim_time_s() - 3600.0).abs() < 1.0);
    let (r1, v1) = player_rel(state);
    let e1 = 0.5 * v1.length_squared() - mu / r1.length();
    assert!(((e1 - e0) / e0).abs() <= 1.0e-3, "e0 = {e0}, e1 = {e1}");
}

#[test]
fn test_prediction_cache_follows_prograde_burn() {
    let (mut runtime, mut states) = start_session_with(|_| {});
    let cfg = default_earth_moon_config();
    let mu = earth_mu(&cfg);
    let earth_radius_km = cfg.celestials[0].radius_m / 1000.0;

    states.fixed_update(&mut runtime, FIXED_DT);
    let state = gameplay(&mut states);
    let cache = state.prediction();
    assert!(cache.valid);
    assert!(cache.trajectory_bci.len() > 100);
    assert!(cache.trajectory_bci_planned.is_empty());
    assert!((cache.apoapsis_alt_km - 400.0).abs() < 1.0, "Ap = {}", cache.apoapsis_alt_km);
    let baseline_apo_km = cache.apoapsis_alt_km;
    let baseline_max_alt_km = cache.altitude_km.iter().copied().fold(0.0_f32, f32::max);

    // The planned trajectory shows the raised orbit before the burn
    let now = state.sim_time_s();
    let id = state.add_maneuver_node();
    let node_time = state.maneuvers().find(id).unwrap().time_s;
    assert!((node_time - now - 60.0).abs() < 1e-9);
    assert!(state.set_maneuver_node_dv(id, DVec3::new(0.0, 10.0, 0.0)));
    states.fixed_update(&mut runtime, FIXED_DT);
    let state = gameplay(&mut states);
    let cache = state.prediction();
    assert!(cache.valid);
    assert!(!cache.trajectory_bci_planned.is_empty());
    assert_eq!(cache.points_world_planned.len(), cache.trajectory_bci_planned.len());
    let center = state.scenario_config().system_center;
    let planned_max_alt_km = cache
        .trajectory_bci_planned
        .iter()
        .map(|s| s.position_m.length() / 1000.0 - earth_radius_km)
        .fold(0.0_f64, f64::max);
    assert!(planned_max_alt_km > f64::from(baseline_max_alt_km) + 20.0);
    for (p, s) in cache.points_world_planned.iter().zip(&cache.trajectory_bci_planned) {
        assert!((*p - center - s.position_m).length() < 1e-3);
    }

    assert!(state.execute_selected_node());
    assert!(state.maneuvers().warp_to.active);

    let mut before = player_rel(gameplay(&mut states));
    let mut fired = false;
    for _ in 0..2_000 {
        states.fixed_update(&mut runtime, FIXED_DT);
        let state = gameplay(&mut states);
        if state.maneuvers().nodes.is_empty() {
            fired = true;
            break;
        }
        before = player_rel(state);
    }
    assert!(fired, "node never executed");

    let state = gameplay(&mut states);
    assert!(!state.rails_warp_active());
    assert!(!state.maneuvers().warp_to.active);
    assert_eq!(state.time_warp().warp_level, 0);
    assert!(state.sim_time_s() >= node_time);

    let (r, v) = player_rel(state);
    let (_, v_before) = before;
    assert!((v.length() - v_before.length() - 10.0).abs() < 0.05, "{} -> {}", v_before.length(), v.length());
    assert!(v.angle_between(v_before) <= 0.02);

    // Burn at a circular orbit: the new apoapsis follows from vis-viva
    let r_len = r.length();
    let a = 1.0 / (2.0 / r_len - v.length_squared() / mu);
    let expected_apo_m = 2.0 * a - r_len;
    let elements = compute_orbital_elements(mu, r, v).unwrap();
    assert!(((elements.apoapsis_m - expected_apo_m) / expected_apo_m).abs() < 0.02);

    // The cache was rebuilt after the burn and reports the raised apoapsis
    let cache = state.prediction();
    assert!(cache.valid);
    assert!(cache.trajectory_bci_planned.is_empty());
    let expected_rise_km = (expected_apo_m / 1000.0 - earth_radius_km) - baseline_apo_km;
    let rise_km = cache.apoapsis_alt_km - baseline_apo_km;
    assert!(expected_rise_km > 30.0);
    assert!(
        ((rise_km - expected_rise_km) / expected_rise_km).abs() < 0.02,
        "rise {rise_km} km, expected {expected_rise_km} km"
    );
}

/// Runs physics-mode ticks and checks world/local consistency for every orbiter
fn run_physics_ticks(runtime: &mut Runtime, states: &mut GameStateManager, ticks: usize, max_anchor_speed: f32) {
    let expected_radius = 6_771.0e3;
    for _ in 0..ticks {
        states.fixed_update(runtime, FIXED_DT);
        let state = gameplay(states);
        assert!(!state.rails_warp_active());

        let world = state.world();
        let physics = world.physics().unwrap();
        for orbiter in state.orbiters() {
            let entity = world.entities.find(orbiter.entity).unwrap();
            let body = entity.body_id();
            let err = (entity.position_world() - (world.origin_world() + physics.get_position(body))).length();
            assert!(err < 1.0e-3, "{} off by {err} m", orbiter.name);
        }

        let anchor = world.entities.find(world.rebase_anchor()).unwrap();
        let anchor_speed = physics.get_linear_velocity(anchor.body_id()).length();
        assert!(anchor_speed < max_anchor_speed, "anchor v_local = {anchor_speed}");

        let (r, _) = player_rel(state);
        assert!((r.length() - expected_radius).abs() < 50.0, "r = {}", r.length());
    }
}

fn check_physics_mode_consistency(mode: VelocityOriginMode, max_anchor_speed: f32) {
    let (mut runtime, mut states) = start_session_with(|config| {
        config.prediction.enabled = false;
        config.physics.velocity_origin_mode = mode;
    });
    assert_eq!(gameplay(&mut states).velocity_origin_mode(), mode);

    run_physics_ticks(&mut runtime, &mut states, 1_200, max_anchor_speed);
    let t_level0 = gameplay(&mut states).sim_time_s();
    assert!((t_level0 - 1_200.0 * f64::from(FIXED_DT)).abs() < 1e-6);

    // Highest physics warp level: substeps, no rails
    gameplay(&mut states).set_time_warp_level(3);
    assert!(!gameplay(&mut states).time_warp().is_rails());
    run_physics_ticks(&mut runtime, &mut states, 600, max_anchor_speed);
    let elapsed = gameplay(&mut states).sim_time_s() - t_level0;
    assert!((elapsed - 600.0 * 10.0 * f64::from(FIXED_DT)).abs() < 1e-3, "elapsed {elapsed}");
}

#[test]
fn test_free_fall_frame_keeps_coordinates_consistent() {
    check_physics_mode_consistency(VelocityOriginMode::FreeFallAnchorFrame, 0.5);
}

#[test]
fn test_per_step_sync_keeps_coordinates_consistent() {
    check_physics_mode_consistency(VelocityOriginMode::PerStepAnchorSync, 1.0);
}

#[test]
fn test_pause_overlay_freezes_gameplay() {
    let (mut runtime, mut states) = start_session();
    for _ in 0..10 {
        states.fixed_update(&mut runtime, FIXED_DT);
    }
    let t_before = gameplay(&mut states).fixed_time_s();

    states.push(&mut runtime, Box::new(PauseState::new()));
    assert_eq!(states.top_name(), Some("Pause"));
    for _ in 0..10 {
        states.fixed_update(&mut runtime, FIXED_DT);
        states.update(&mut runtime, FIXED_DT);
    }
    assert_eq!(gameplay(&mut states).fixed_time_s(), t_before);

    let ui = states.draw_ui(&mut runtime);
    let titles = ui.titles();
    assert!(titles.contains(&"Gameplay"));
    assert!(titles.contains(&"PAUSED"));

    states.pop(&mut runtime);
    states.fixed_update(&mut runtime, FIXED_DT);
    assert!(gameplay(&mut states).fixed_time_s() > t_before);
}

#[test]
fn test_reset_rebuilds_scenario() {
    let (mut runtime, mut states) = start_session();
    let state = gameplay(&mut states);
    state.set_time_warp_level(5);
    state.add_maneuver_node();
    state.request_reset();

    states.fixed_update(&mut runtime, FIXED_DT);
    let state = gameplay(&mut states);
    assert_eq!(state.time_warp().warp_level, 0);
    assert!(!state.rails_warp_active());
    assert!(state.maneuvers().nodes.is_empty());
    assert_eq!(state.orbiters().len(), 2);
    assert_eq!(state.sim_time_s(), 0.0);
}
