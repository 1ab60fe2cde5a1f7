/// Orbit prediction cache
///
/// The cache holds the player's predicted trajectory relative to the
/// reference body (body-centred inertial), with and without the maneuver
/// plan, plus two-body elements for the HUD. It is rebuilt wholesale in a
/// sandbox copy of the live scenario and drawn every frame as debug lines.

use glam::{DVec3, Vec4};

use super::maneuver::ManeuverState;
use super::scenario::OrbitalScenario;
use crate::config::PredictionConfigData;
use crate::debug_draw::{DebugDrawLayer, DebugDrawSystem, DebugStyle};
use crate::orbit::{
    build_celestial_ephemeris, compute_orbital_elements, estimate_orbital_period, predict_spacecraft_trajectory,
    sample_state_hermite, select_prediction_horizon_and_dt, trajectory_to_body_centered_inertial, Spacecraft,
    State, TrajectoryOptions, TrajectorySample,
};
use crate::world::{safe_length, WorldVec3};

/// Visual subdivision step for drawn windows
const ORBIT_DRAW_MAX_DT_S: f64 = 1.0;
/// Larger offsets mean the cache is stale, not a chord error
const MAX_ALIGN_DELTA_M: f64 = 10_000.0;

const COLOR_ORBIT_FULL: Vec4 = Vec4::new(0.2, 0.9, 0.2, 0.22);
const COLOR_ORBIT_FUTURE: Vec4 = Vec4::new(0.2, 0.9, 0.2, 0.75);
const COLOR_ORBIT_PLANNED: Vec4 = Vec4::new(0.3, 0.8, 1.0, 0.55);
const COLOR_VELOCITY: Vec4 = Vec4::new(1.0, 0.35, 0.1, 1.0);

#[derive(Debug, Clone, PartialEq, Default)]
pub struct PredictionCache {
    pub valid: bool,
    pub build_time_s: f64,
    pub build_pos_world: WorldVec3,
    pub build_vel_world: DVec3,
    /// Relative to the reference body, no maneuver plan
    pub trajectory_bci: Vec<TrajectorySample>,
    /// Same with the maneuver plan installed; empty without nodes
    pub trajectory_bci_planned: Vec<TrajectorySample>,
    pub altitude_km: Vec<f32>,
    pub speed_kmps: Vec<f32>,
    pub points_world: Vec<WorldVec3>,
    pub points_world_planned: Vec<WorldVec3>,
    pub orbital_period_s: f64,
    pub semi_major_axis_m: f64,
    pub eccentricity: f64,
    pub periapsis_alt_km: f64,
    /// Infinite on escape
    pub apoapsis_alt_km: f64,
}

impl PredictionCache {
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn start_time_s(&self) -> Option<f64> {
        self.trajectory_bci.first().map(|s| s.t_s)
    }

    pub fn end_time_s(&self) -> Option<f64> {
        self.trajectory_bci.last().map(|s| s.t_s)
    }

    /// Re-anchor the world-space polylines on the reference body
    pub fn refresh_points_world(&mut self, ref_body_world: WorldVec3) {
        if !self.valid {
            self.points_world.clear();
            self.points_world_planned.clear();
            return;
        }
        self.points_world = self
            .trajectory_bci
            .iter()
            .map(|s| ref_body_world + s.position_m)
            .collect();
        self.points_world_planned = self
            .trajectory_bci_planned
            .iter()
            .map(|s| ref_body_world + s.position_m)
            .collect();
    }
}

/// Inputs of the rebuild decision
#[derive(Debug, Clone, Copy)]
pub struct RebuildCheck {
    pub dirty: bool,
    pub thrusting: bool,
    pub now_s: f64,
    pub fixed_dt_s: f64,
    /// Latest maneuver node time, if any
    pub plan_max_time_s: Option<f64>,
}

pub fn should_rebuild(cache: &PredictionCache, settings: &PredictionConfigData, check: &RebuildCheck) -> bool {
    if check.dirty || !cache.valid {
        return true;
    }
    let since_build = check.now_s - cache.build_time_s;
    if check.thrusting && since_build >= settings.thrust_refresh_s {
        return true;
    }
    if settings.periodic_refresh_s > 0.0 && since_build >= settings.periodic_refresh_s {
        return true;
    }

    let Some(cache_end) = cache.end_time_s() else {
        return true;
    };
    let required_ahead = if settings.draw_future_segment {
        settings.future_window_s.max(0.0)
    } else {
        0.0
    };
    if cache_end - check.now_s < required_ahead + check.fixed_dt_s.max(0.0) {
        return true;
    }
    check.plan_max_time_s.is_some_and(|t| t > cache_end)
}

/// Player state handed to the cache builder
#[derive(Debug, Clone, Copy)]
pub struct PredictionRequest {
    pub ship_pos_world: WorldVec3,
    /// Relative to the reference body
    pub ship_vel_world: DVec3,
    pub ref_body_world: WorldVec3,
    pub thrusting: bool,
    pub future_window_s: f64,
}

/// Build a fresh cache from the live scenario. Returns an invalid cache when
/// the scenario has no usable reference body or the prediction is too short.
pub fn build_prediction_cache(
    orbit: &OrbitalScenario,
    maneuvers: &ManeuverState,
    request: &PredictionRequest,
) -> PredictionCache {
    let mut cache = PredictionCache::default();

    let Some(ref_info) = orbit.reference_body() else {
        return cache;
    };
    let mu = orbit.sim.config().gravitational_constant * ref_info.mass_kg;
    if !(mu > 0.0) || !mu.is_finite() {
        return cache;
    }
    let planet_radius_m = ref_info.radius_m;
    let now_s = orbit.sim.time_s();

    let rel_pos = request.ship_pos_world - request.ref_body_world;
    let rel_vel = request.ship_vel_world;

    let period = estimate_orbital_period(mu, rel_pos, rel_vel);
    let mut sampling = select_prediction_horizon_and_dt(period, request.thrusting, request.future_window_s);

    // Reach past the last maneuver node
    let nodes_active = maneuvers.enabled && !maneuvers.nodes.is_empty();
    if nodes_active {
        if let Some(last) = maneuvers.max_time_s() {
            let needed = (last - now_s).max(0.0) + request.future_window_s.max(0.0);
            if needed > sampling.horizon_s {
                sampling.horizon_s = needed.min(36_000.0);
                let max_steps = if request.thrusting { 1000 } else { 2000 };
                sampling.dt_s = sampling.dt_s.max(sampling.horizon_s / max_steps as f64);
                sampling.steps = ((sampling.horizon_s / sampling.dt_s).ceil() as usize).clamp(2, max_steps);
            }
        }
    }

    let Some(ref_state) = orbit.reference_state() else {
        return cache;
    };
    let Some(ref_id) = orbit.reference_sim_id() else {
        return cache;
    };

    // Sandbox: live bodies plus one spacecraft for the ship
    let mut sandbox = orbit.sim.clone();
    sandbox.strip_spacecraft();
    let ship = sandbox.create_spacecraft(Spacecraft {
        state: State {
            position_m: ref_state.position_m + rel_pos,
            velocity_mps: ref_state.velocity_mps + rel_vel,
        },
        ..Spacecraft::default()
    });
    if !ship.valid() {
        return cache;
    }

    let opt = TrajectoryOptions {
        duration_s: sampling.horizon_s,
        sample_dt_s: sampling.dt_s,
        spacecraft_sample_dt_s: sampling.dt_s,
        spacecraft_lookup_dt_s: sampling.dt_s,
        celestial_dt_s: sampling.dt_s,
        max_samples: sampling.steps + 1,
        include_start: true,
        include_end: true,
        stop_on_impact: false,
    };

    let eph = build_celestial_ephemeris(&sandbox, &opt);
    let inertial = predict_spacecraft_trajectory(&sandbox, &eph, ship.id, &opt);
    let trajectory_bci = trajectory_to_body_centered_inertial(&inertial, &eph, ref_id);
    if trajectory_bci.len() < 2 {
        return cache;
    }

    if nodes_active {
        sandbox.set_maneuver_plan(maneuvers.to_plan(ship.id, ref_id, now_s));
        let planned = predict_spacecraft_trajectory(&sandbox, &eph, ship.id, &opt);
        cache.trajectory_bci_planned = trajectory_to_body_centered_inertial(&planned, &eph, ref_id);
    }

    cache.altitude_km = trajectory_bci
        .iter()
        .map(|s| ((safe_length(s.position_m) - planet_radius_m) * 1.0e-3) as f32)
        .collect();
    cache.speed_kmps = trajectory_bci
        .iter()
        .map(|s| (safe_length(s.velocity_mps) * 1.0e-3) as f32)
        .collect();
    cache.trajectory_bci = trajectory_bci;

    if let Some(el) = compute_orbital_elements(mu, rel_pos, rel_vel) {
        cache.semi_major_axis_m = el.semi_major_axis_m;
        cache.eccentricity = el.eccentricity;
        cache.orbital_period_s = el.period_s;
        cache.periapsis_alt_km = (el.periapsis_m - planet_radius_m) * 1.0e-3;
        cache.apoapsis_alt_km = if el.apoapsis_m.is_finite() {
            (el.apoapsis_m - planet_radius_m) * 1.0e-3
        } else {
            f64::INFINITY
        };
    }

    cache.build_time_s = now_s;
    cache.build_pos_world = request.ship_pos_world;
    cache.build_vel_world = request.ship_vel_world;
    cache.valid = true;
    cache.refresh_points_world(request.ref_body_world);
    cache
}

/// Per-frame drawing inputs
#[derive(Debug, Clone, Copy)]
pub struct PredictionDraw {
    /// Sim time at the end of the last fixed step
    pub sim_time_s: f64,
    pub alpha: f64,
    /// Sim time covered by the last fixed step
    pub interp_dt_s: f64,
    pub frame_dt_s: f32,
    pub ship_render_pos_world: WorldVec3,
    pub ship_vel_world: DVec3,
    pub ref_body_world: WorldVec3,
}

impl PredictionDraw {
    /// Rendered entities sit between the previous and current fixed step
    pub fn render_time_s(&self) -> f64 {
        let mut now = self.sim_time_s;
        if self.interp_dt_s.is_finite() && self.interp_dt_s > 0.0 {
            now -= (1.0 - self.alpha.clamp(0.0, 1.0)) * self.interp_dt_s;
        }
        now
    }

    /// Debug lines are pruned at the start of the next frame
    pub fn ttl_s(&self) -> f32 {
        self.frame_dt_s.clamp(0.0, 0.1) + 0.002
    }
}

/// World-space Hermite position on `samples` at `t_s`
fn hermite_world(samples: &[TrajectorySample], ref_body_world: WorldVec3, t_s: f64) -> Option<WorldVec3> {
    sample_state_hermite(samples, t_s).map(|s| ref_body_world + s.position_m)
}

/// Offset that moves the curve onto the rendered ship, zero when implausible
pub fn alignment_delta(cache: &PredictionCache, draw: &PredictionDraw) -> DVec3 {
    let (Some(t0), Some(t1)) = (cache.start_time_s(), cache.end_time_s()) else {
        return DVec3::ZERO;
    };
    let now = draw.render_time_s().clamp(t0, t1);
    let Some(predicted) = hermite_world(&cache.trajectory_bci, draw.ref_body_world, now) else {
        return DVec3::ZERO;
    };
    let delta = draw.ship_render_pos_world - predicted;
    let len = safe_length(delta);
    if !len.is_finite() || len > MAX_ALIGN_DELTA_M || !delta.is_finite() {
        DVec3::ZERO
    } else {
        delta
    }
}

/// Polyline over `[t_start, t_end]` with Hermite sub-segments no longer than
/// `ORBIT_DRAW_MAX_DT_S`, starting from `prev`
#[allow(clippy::too_many_arguments)]
fn draw_window(
    draw: &mut DebugDrawSystem,
    samples: &[TrajectorySample],
    ref_body_world: WorldVec3,
    align: DVec3,
    t_start: f64,
    t_end: f64,
    mut prev: WorldVec3,
    style: &DebugStyle,
) -> usize {
    let n = samples.len();
    if n < 2 || !(t_end > t_start) {
        return 0;
    }
    let (first, last) = (samples[0].t_s, samples[n - 1].t_s);
    let mut t = t_start.clamp(first, last);
    let t_end = t_end.clamp(first, last);
    let mut seg = samples.partition_point(|s| s.t_s < t).saturating_sub(1);
    let mut lines = 0;

    while t < t_end && seg + 1 < n {
        let (a, b) = (&samples[seg], &samples[seg + 1]);
        let seg_start = t.max(a.t_s);
        let seg_end = t_end.min(b.t_s);
        let seg_len = seg_end - seg_start;
        if !(seg_len > 0.0) || !seg_len.is_finite() {
            seg += 1;
            continue;
        }

        let sub = ((seg_len / ORBIT_DRAW_MAX_DT_S).ceil() as usize).max(1);
        for j in 1..=sub {
            let tj = seg_start + seg_len * (j as f64 / sub as f64);
            let p = crate::orbit::hermite_position(
                a.position_m,
                a.velocity_mps,
                b.position_m,
                b.velocity_mps,
                a.t_s,
                b.t_s,
                tj,
            );
            let p = ref_body_world + p + align;
            draw.add_line(prev, p, style);
            prev = p;
            lines += 1;
        }

        t = seg_end;
        if t >= b.t_s {
            seg += 1;
        }
    }
    lines
}

/// Emit the orbit overlay. Returns the alignment offset so maneuver markers
/// can share it.
pub fn emit_prediction_debug(
    cache: &PredictionCache,
    settings: &PredictionConfigData,
    draw: &mut DebugDrawSystem,
    params: &PredictionDraw,
) -> DVec3 {
    if !cache.valid || cache.trajectory_bci.len() < 2 {
        return DVec3::ZERO;
    }
    let (Some(t0), Some(t1)) = (cache.start_time_s(), cache.end_time_s()) else {
        return DVec3::ZERO;
    };
    if !(t1 > t0) {
        return DVec3::ZERO;
    }
    let now = params.render_time_s();
    if !now.is_finite() {
        return DVec3::ZERO;
    }
    let now = now.clamp(t0, t1);
    let ttl = params.ttl_s();
    let align = alignment_delta(cache, params);
    let ref_world = params.ref_body_world;
    let traj = &cache.trajectory_bci;

    if settings.draw_full_orbit {
        let mut t_full_end = t1;
        if cache.orbital_period_s.is_finite() && cache.orbital_period_s > 0.0 {
            t_full_end = (t0 + cache.orbital_period_s).min(t1);
        }
        let start = ref_world + traj[0].position_m + align;
        let style = DebugStyle::new(COLOR_ORBIT_FULL).ttl(ttl).on_top().layer(DebugDrawLayer::Misc);
        draw_window(draw, traj, ref_world, align, t0, t_full_end, start, &style);
    }

    if settings.draw_future_segment {
        let window = settings.future_window_s.max(0.0);
        let t_end = if window > 0.0 { (now + window).min(t1) } else { t1 };
        let style = DebugStyle::new(COLOR_ORBIT_FUTURE).ttl(ttl).on_top().layer(DebugDrawLayer::Misc);
        draw_window(draw, traj, ref_world, align, now, t_end, params.ship_render_pos_world, &style);
    }

    let planned = &cache.trajectory_bci_planned;
    if planned.len() >= 2 {
        let p_t0 = planned[0].t_s;
        let p_t1 = planned[planned.len() - 1].t_s;
        let start_t = now.clamp(p_t0, p_t1);
        if let Some(start) = hermite_world(planned, ref_world, start_t) {
            let style = DebugStyle::new(COLOR_ORBIT_PLANNED).ttl(ttl).on_top().layer(DebugDrawLayer::Misc);
            draw_window(draw, planned, ref_world, align, start_t, p_t1, start + align, &style);
        }
    }

    if settings.draw_velocity_ray {
        let speed = safe_length(params.ship_vel_world);
        let length = if speed.is_finite() && speed > 1.0 {
            (speed * 0.002).clamp(10.0, 250.0)
        } else {
            40.0
        };
        let style = DebugStyle::new(COLOR_VELOCITY).ttl(ttl).on_top().layer(DebugDrawLayer::Misc);
        draw.add_ray(params.ship_render_pos_world, params.ship_vel_world, length, &style);
    }

    align
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid_cache(build: f64, end: f64) -> PredictionCache {
        PredictionCache {
            valid: true,
            build_time_s: build,
            trajectory_bci: vec![
                TrajectorySample {
                    t_s: build,
                    ..TrajectorySample::default()
                },
                TrajectorySample {
                    t_s: end,
                    ..TrajectorySample::default()
                },
            ],
            ..PredictionCache::default()
        }
    }

    fn check(now: f64) -> RebuildCheck {
        RebuildCheck {
            dirty: false,
            thrusting: false,
            now_s: now,
            fixed_dt_s: 1.0 / 60.0,
            plan_max_time_s: None,
        }
    }

    #[test]
    fn test_fresh_cache_kept() {
        let settings = PredictionConfigData::default();
        assert!(!should_rebuild(&valid_cache(5.0, 10_000.0), &settings, &check(6.0)));
    }

    #[test]
    fn test_rebuild_triggers() {
        let settings = PredictionConfigData::default();
        let cache = valid_cache(5.0, 10_000.0);

        assert!(should_rebuild(&cache, &settings, &RebuildCheck { dirty: true, ..check(6.0) }));
        assert!(should_rebuild(&cache, &settings, &RebuildCheck { thrusting: true, ..check(6.0) }));
        assert!(should_rebuild(&cache, &settings, &check(9_950.0)));
        assert!(should_rebuild(
            &cache,
            &settings,
            &RebuildCheck {
                plan_max_time_s: Some(12_000.0),
                ..check(6.0)
            }
        ));

        let periodic = PredictionConfigData {
            periodic_refresh_s: 0.5,
            ..PredictionConfigData::default()
        };
        assert!(should_rebuild(&cache, &periodic, &check(6.0)));
    }

    #[test]
    fn test_render_time_lags_by_missing_alpha() {
        let draw = PredictionDraw {
            sim_time_s: 10.0,
            alpha: 0.25,
            interp_dt_s: 1.0,
            frame_dt_s: 0.5,
            ship_render_pos_world: DVec3::ZERO,
            ship_vel_world: DVec3::ZERO,
            ref_body_world: DVec3::ZERO,
        };
        assert!((draw.render_time_s() - 9.25).abs() < 1e-12);
        assert!((draw.ttl_s() - 0.102).abs() < 1e-6);
    }
}
