/// Laws of the orbit helpers and the N-body propagator

use glam::DVec3;
use orbit_engine::orbit::{
    build_celestial_ephemeris, circular_orbit_relative_state_xz, make_state, point_mass_accel, predict_spacecraft_trajectory,
    two_body_circular_barycentric_xz, GameSimulation, ManeuverImpulse, ManeuverPlan, MassiveBody, SimConfig,
    Spacecraft, TrajectoryOptions, G_SI,
};
use orbit_engine::world::snap_world;

const EARTH_MASS: f64 = 5.972e24;
const MOON_MASS: f64 = 7.342e22;

#[test]
fn test_snap_idempotence() {
    let points = [
        DVec3::new(1.0e12 + 12_345.678, -9_999.5, 0.25),
        DVec3::new(-5.0, 15_000.0, 4_999.999),
        DVec3::new(123_456_789.0, 0.0, -987_654.321),
    ];
    for grid in [1.0, 10_000.0, 0.5] {
        for p in points {
            let once = snap_world(p, grid);
            assert_eq!(snap_world(once, grid), once, "grid {grid} point {p:?}");
        }
    }
}

#[test]
fn test_circular_orbit_constructor() {
    for (r, u) in [(6.771e6, 0.0), (4.2164e7, 1.3), (3.844e8, -2.5)] {
        let s = circular_orbit_relative_state_xz(G_SI, EARTH_MASS, r, u);
        let v_circ = (G_SI * EARTH_MASS / r).sqrt();
        assert!((s.position_m.length() - r).abs() < 1e-6 * r);
        assert!((s.velocity_mps.length() - v_circ).abs() < 1e-9 * v_circ);
        assert!(s.position_m.dot(s.velocity_mps).abs() < 1e-6 * r * v_circ);
        assert_eq!(s.position_m.y, 0.0);
    }
}

#[test]
fn test_two_body_barycentric() {
    let s = two_body_circular_barycentric_xz(G_SI, EARTH_MASS, MOON_MASS, 3.844e8, 0.7);
    let p = EARTH_MASS * s.state_a.position_m + MOON_MASS * s.state_b.position_m;
    let v = EARTH_MASS * s.state_a.velocity_mps + MOON_MASS * s.state_b.velocity_mps;
    assert!(p.length() / (EARTH_MASS * 3.844e8) < 1e-12);
    assert!(v.length() / (EARTH_MASS * 1.0e3) < 1e-12);
    let separation = (s.state_b.position_m - s.state_a.position_m).length();
    assert!((separation - 3.844e8).abs() < 1e-3);
}

#[test]
fn test_point_mass_accel_points_inward() {
    for r in [
        DVec3::new(7.0e6, 0.0, 0.0),
        DVec3::new(-1.0, 2.0, -3.0),
        DVec3::new(1.0e9, -4.0e8, 2.5e8),
    ] {
        let a = point_mass_accel(G_SI, EARTH_MASS, r, 0.0);
        assert!(a.dot(r) < 0.0, "r = {r:?}");
    }
    assert_eq!(point_mass_accel(G_SI, EARTH_MASS, DVec3::ZERO, 0.0), DVec3::ZERO);
}

fn earth_moon_sim() -> GameSimulation {
    let mut sim = GameSimulation::new(SimConfig {
        gravitational_constant: G_SI,
        softening_length_m: 0.0,
        enable_events: false,
    });
    let pair = two_body_circular_barycentric_xz(G_SI, EARTH_MASS, MOON_MASS, 3.844e8, 0.0);
    sim.create_body(MassiveBody {
        mass_kg: EARTH_MASS,
        radius_m: 6.371e6,
        state: pair.state_a,
        ..MassiveBody::default()
    });
    sim.create_body(MassiveBody {
        mass_kg: MOON_MASS,
        radius_m: 1.7374e6,
        state: pair.state_b,
        ..MassiveBody::default()
    });
    sim
}

#[test]
fn test_trajectory_determinism() {
    let mut sim = earth_moon_sim();
    let earth = sim.massive_bodies()[0].clone();
    let rel = circular_orbit_relative_state_xz(G_SI, EARTH_MASS, 6.771e6, 0.4);
    let sc = sim.create_spacecraft(Spacecraft {
        state: make_state(
            earth.state.position_m + rel.position_m,
            earth.state.velocity_mps + rel.velocity_mps,
        ),
        ..Spacecraft::default()
    });
    assert!(sc.valid());

    let mut plan = ManeuverPlan::default();
    plan.push(ManeuverImpulse {
        spacecraft_id: sc.id,
        time_s: 600.0,
        dv_rtn_mps: DVec3::new(0.0, 25.0, 0.0),
        rtn_body: earth.id,
    });
    sim.set_maneuver_plan(plan);

    let opt = TrajectoryOptions {
        duration_s: 6_000.0,
        sample_dt_s: 10.0,
        spacecraft_sample_dt_s: 10.0,
        spacecraft_lookup_dt_s: 10.0,
        celestial_dt_s: 10.0,
        max_samples: 1_000,
        include_start: true,
        include_end: true,
        stop_on_impact: false,
    };
    let run = || {
        let eph = build_celestial_ephemeris(&sim, &opt);
        predict_spacecraft_trajectory(&sim, &eph, sc.id, &opt)
    };
    let first = run();
    let second = run();
    assert!(first.len() > 100);
    assert_eq!(first, second);
}

#[test]
fn test_leapfrog_keeps_circular_radius() {
    let mut sim = GameSimulation::new(SimConfig {
        gravitational_constant: G_SI,
        softening_length_m: 0.0,
        enable_events: false,
    });
    sim.create_body(MassiveBody {
        mass_kg: EARTH_MASS,
        radius_m: 6.371e6,
        ..MassiveBody::default()
    });
    let sc = sim.create_spacecraft(Spacecraft {
        state: circular_orbit_relative_state_xz(G_SI, EARTH_MASS, 6.771e6, 0.0),
        ..Spacecraft::default()
    });

    for _ in 0..600 {
        sim.step(10.0);
    }
    let r = sim.spacecraft_by_id(sc.id).unwrap().state.position_m.length();
    assert!((r - 6.771e6).abs() < 5_000.0, "r = {r}");
    assert!((sim.time_s() - 6_000.0).abs() < 1e-6);
}
