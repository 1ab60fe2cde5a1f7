/// Sandbox trajectory prediction
///
/// A spacecraft is propagated as a test particle through a precomputed
/// celestial ephemeris, so predicting never touches the live simulation.
/// Impulses from the simulation's maneuver plan for that spacecraft are
/// applied at their exact times.

use glam::DVec3;

use super::ephemeris::{hermite_state, CelestialEphemeris};
use super::frames::compute_rtn_frame;
use super::helpers::point_mass_accel;
use super::simulation::{GameSimulation, ManeuverImpulse};
use super::types::{make_state, BodyId, SpacecraftId, State};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrajectoryOptions {
    pub duration_s: f64,
    /// Spacing of returned samples
    pub sample_dt_s: f64,
    /// Spacecraft integrator step
    pub spacecraft_sample_dt_s: f64,
    /// Upper bound on the interval between body lookups inside one integrator step
    pub spacecraft_lookup_dt_s: f64,
    /// Ephemeris sample spacing
    pub celestial_dt_s: f64,
    pub max_samples: usize,
    pub include_start: bool,
    pub include_end: bool,
    /// End at the first sample inside a body's radius
    pub stop_on_impact: bool,
}

impl Default for TrajectoryOptions {
    fn default() -> Self {
        Self {
            duration_s: 0.0,
            sample_dt_s: 60.0,
            spacecraft_sample_dt_s: 60.0,
            spacecraft_lookup_dt_s: 60.0,
            celestial_dt_s: 60.0,
            max_samples: 10_000,
            include_start: true,
            include_end: true,
            stop_on_impact: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct TrajectorySample {
    pub t_s: f64,
    pub position_m: DVec3,
    pub velocity_mps: DVec3,
}

impl TrajectorySample {
    pub fn state(&self) -> State {
        make_state(self.position_m, self.velocity_mps)
    }
}

pub fn build_celestial_ephemeris(sim: &GameSimulation, opt: &TrajectoryOptions) -> CelestialEphemeris {
    CelestialEphemeris::build(sim, opt.duration_s, opt.celestial_dt_s)
}

fn positive_or(value: f64, fallback: f64) -> f64 {
    if value > 0.0 && value.is_finite() {
        value
    } else {
        fallback
    }
}

fn accel_at(eph: &CelestialEphemeris, position_m: DVec3, t_s: f64) -> DVec3 {
    let g = eph.config().gravitational_constant;
    let eps = eph.config().softening_length_m;
    let eps2 = eps * eps;
    let mut a = DVec3::ZERO;
    for (i, body) in eph.bodies().iter().enumerate() {
        if let Some(s) = eph.state_by_index(i, t_s) {
            a += point_mass_accel(g, body.mass_kg, position_m - s.position_m, eps2);
        }
    }
    a
}

fn leapfrog(eph: &CelestialEphemeris, state: &mut State, t_s: f64, h: f64) {
    let half = 0.5 * h;
    state.velocity_mps += accel_at(eph, state.position_m, t_s) * half;
    state.position_m += state.velocity_mps * h;
    state.velocity_mps += accel_at(eph, state.position_m, t_s + h) * half;
}

/// Body with the strongest pull, as seen through the ephemeris
fn dominant_body(eph: &CelestialEphemeris, position_m: DVec3, t_s: f64) -> Option<State> {
    let g = eph.config().gravitational_constant;
    let mut best: Option<(f64, State)> = None;
    for (i, body) in eph.bodies().iter().enumerate() {
        let Some(s) = eph.state_by_index(i, t_s) else {
            continue;
        };
        let pull = point_mass_accel(g, body.mass_kg, position_m - s.position_m, 0.0).length_squared();
        if best.map_or(true, |(p, _)| pull > p) {
            best = Some((pull, s));
        }
    }
    best.map(|(_, s)| s)
}

fn apply_impulse(eph: &CelestialEphemeris, state: &mut State, impulse: &ManeuverImpulse, t_s: f64) {
    let center = if impulse.rtn_body.is_valid() {
        eph.body_state_at(impulse.rtn_body, t_s)
    } else {
        None
    }
    .or_else(|| dominant_body(eph, state.position_m, t_s));

    let rel = match center {
        Some(c) => state.relative_to(&c),
        None => *state,
    };
    state.velocity_mps += compute_rtn_frame(rel.position_m, rel.velocity_mps).to_world(impulse.dv_rtn_mps);
}

struct Propagator<'a> {
    eph: &'a CelestialEphemeris,
    impulses: Vec<ManeuverImpulse>,
    next_impulse: usize,
    step_s: f64,
    state: State,
    t_s: f64,
}

impl Propagator<'_> {
    fn advance_to(&mut self, t_target: f64) {
        while self.t_s < t_target {
            let burn = self
                .impulses
                .get(self.next_impulse)
                .filter(|i| i.time_s <= t_target)
                .copied();
            let seg_end = burn.map_or(t_target, |i| i.time_s.max(self.t_s));

            while self.t_s < seg_end {
                let h = (seg_end - self.t_s).min(self.step_s);
                leapfrog(self.eph, &mut self.state, self.t_s, h);
                self.t_s = if seg_end - self.t_s <= self.step_s { seg_end } else { self.t_s + h };
            }

            if let Some(impulse) = burn {
                apply_impulse(self.eph, &mut self.state, &impulse, self.t_s);
                self.next_impulse += 1;
            }
        }
        // Impulses exactly at the target time
        while let Some(impulse) = self.impulses.get(self.next_impulse).copied() {
            if impulse.time_s > self.t_s {
                break;
            }
            apply_impulse(self.eph, &mut self.state, &impulse, self.t_s);
            self.next_impulse += 1;
        }
    }

    fn sample(&self) -> TrajectorySample {
        TrajectorySample {
            t_s: self.t_s,
            position_m: self.state.position_m,
            velocity_mps: self.state.velocity_mps,
        }
    }

    fn impacted(&self) -> bool {
        self.eph.bodies().iter().enumerate().any(|(i, body)| {
            body.radius_m > 0.0
                && self
                    .eph
                    .state_by_index(i, self.t_s)
                    .is_some_and(|s| (self.state.position_m - s.position_m).length() < body.radius_m)
        })
    }
}

/// Samples of `sc_id`'s barycentric trajectory from the simulation's current
/// time. Empty if the spacecraft does not exist. Identical inputs give
/// bit-identical output.
pub fn predict_spacecraft_trajectory(
    sim: &GameSimulation,
    eph: &CelestialEphemeris,
    sc_id: SpacecraftId,
    opt: &TrajectoryOptions,
) -> Vec<TrajectorySample> {
    let Some(sc) = sim.spacecraft_by_id(sc_id) else {
        return Vec::new();
    };
    if opt.max_samples == 0 {
        return Vec::new();
    }

    let t0 = sim.time_s();
    let duration = if opt.duration_s.is_finite() { opt.duration_s.max(0.0) } else { 0.0 };
    let t_end = t0 + duration;
    let sample_dt = positive_or(opt.sample_dt_s, positive_or(opt.spacecraft_sample_dt_s, 60.0));
    let step_s = positive_or(opt.spacecraft_sample_dt_s, sample_dt)
        .min(positive_or(opt.spacecraft_lookup_dt_s, f64::INFINITY))
        .min(sample_dt);

    let impulses = sim
        .maneuver_plan()
        .impulses()
        .iter()
        .filter(|i| i.spacecraft_id == sc_id && i.time_s >= t0 && i.time_s <= t_end)
        .copied()
        .collect();

    let mut prop = Propagator {
        eph,
        impulses,
        next_impulse: 0,
        step_s,
        state: sc.state,
        t_s: t0,
    };

    let mut out = Vec::new();
    if opt.include_start {
        prop.advance_to(t0);
        out.push(prop.sample());
        if opt.stop_on_impact && prop.impacted() {
            return out;
        }
    }

    let end_eps = sample_dt * 1.0e-9;
    let mut k: u64 = 1;
    while out.len() < opt.max_samples {
        let t_k = t0 + sample_dt * k as f64;
        let at_end = t_k >= t_end - end_eps;
        let target = if at_end { t_end } else { t_k };
        if at_end && (!opt.include_end || duration <= 0.0) {
            break;
        }

        prop.advance_to(target);
        out.push(prop.sample());
        if at_end || (opt.stop_on_impact && prop.impacted()) {
            break;
        }
        k += 1;
    }

    out
}

/// Re-express barycentric samples relative to `reference` (body-centered,
/// non-rotating). Empty if the body is not in the ephemeris.
pub fn trajectory_to_body_centered_inertial(
    samples: &[TrajectorySample],
    eph: &CelestialEphemeris,
    reference: BodyId,
) -> Vec<TrajectorySample> {
    if eph.body_state_at(reference, eph.t0_s()).is_none() {
        return Vec::new();
    }
    samples
        .iter()
        .filter_map(|s| {
            let body = eph.body_state_at(reference, s.t_s)?;
            Some(TrajectorySample {
                t_s: s.t_s,
                position_m: s.position_m - body.position_m,
                velocity_mps: s.velocity_mps - body.velocity_mps,
            })
        })
        .collect()
}

/// Index `i` with `samples[i].t_s <= t < samples[i + 1].t_s`, clamped to the
/// last segment
fn segment_index(samples: &[TrajectorySample], t_s: f64) -> Option<usize> {
    if samples.len() < 2 {
        return None;
    }
    let upper = samples.partition_point(|s| s.t_s <= t_s);
    Some(upper.saturating_sub(1).min(samples.len() - 2))
}

/// Hermite-interpolated state at `t_s`, clamped to the sampled range
pub fn sample_state_hermite(samples: &[TrajectorySample], t_s: f64) -> Option<State> {
    match samples.len() {
        0 => None,
        1 => Some(samples[0].state()),
        _ => {
            let i = segment_index(samples, t_s)?;
            let (a, b) = (&samples[i], &samples[i + 1]);
            Some(hermite_state(a.state(), b.state(), a.t_s, b.t_s, t_s.clamp(a.t_s, b.t_s)))
        }
    }
}

/// Linearly interpolated state at `t_s`, clamped to the sampled range
pub fn sample_state_linear(samples: &[TrajectorySample], t_s: f64) -> Option<State> {
    match samples.len() {
        0 => None,
        1 => Some(samples[0].state()),
        _ => {
            let i = segment_index(samples, t_s)?;
            let (a, b) = (&samples[i], &samples[i + 1]);
            let h = b.t_s - a.t_s;
            let u = if h > 0.0 { ((t_s - a.t_s) / h).clamp(0.0, 1.0) } else { 0.0 };
            Some(make_state(
                a.position_m.lerp(b.position_m, u),
                a.velocity_mps.lerp(b.velocity_mps, u),
            ))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orbit::helpers::circular_orbit_relative_state_xz;
    use crate::orbit::types::{MassiveBody, Spacecraft, G_SI};

    fn single_body() -> (GameSimulation, BodyId, SpacecraftId) {
        let mut sim = GameSimulation::default();
        let earth = sim.create_body(MassiveBody {
            mass_kg: 5.972e24,
            radius_m: 6.371e6,
            ..Default::default()
        });
        let rel = circular_orbit_relative_state_xz(G_SI, 5.972e24, 6.771e6, 0.0);
        let sc = sim.create_spacecraft(Spacecraft {
            state: rel,
            ..Default::default()
        });
        (sim, earth.id, sc.id)
    }

    #[test]
    fn test_sample_layout() {
        let (sim, _, sc) = single_body();
        let opt = TrajectoryOptions {
            duration_s: 100.0,
            sample_dt_s: 30.0,
            spacecraft_sample_dt_s: 10.0,
            spacecraft_lookup_dt_s: 10.0,
            celestial_dt_s: 10.0,
            ..Default::default()
        };
        let eph = build_celestial_ephemeris(&sim, &opt);
        let samples = predict_spacecraft_trajectory(&sim, &eph, sc, &opt);
        let times: Vec<f64> = samples.iter().map(|s| s.t_s).collect();
        assert_eq!(times, vec![0.0, 30.0, 60.0, 90.0, 100.0]);
    }

    #[test]
    fn test_max_samples_and_missing_spacecraft() {
        let (sim, _, sc) = single_body();
        let opt = TrajectoryOptions {
            duration_s: 600.0,
            sample_dt_s: 10.0,
            max_samples: 5,
            ..Default::default()
        };
        let eph = build_celestial_ephemeris(&sim, &opt);
        assert_eq!(predict_spacecraft_trajectory(&sim, &eph, sc, &opt).len(), 5);
        assert!(predict_spacecraft_trajectory(&sim, &eph, SpacecraftId(99), &opt).is_empty());
    }

    #[test]
    fn test_stop_on_impact() {
        let (mut sim, _, sc) = single_body();
        if let Some(s) = sim.spacecraft_by_id_mut(sc) {
            s.state.velocity_mps = DVec3::new(-2000.0, 0.0, 0.0);
        }
        let opt = TrajectoryOptions {
            duration_s: 3600.0,
            sample_dt_s: 10.0,
            spacecraft_sample_dt_s: 1.0,
            stop_on_impact: true,
            ..Default::default()
        };
        let eph = build_celestial_ephemeris(&sim, &opt);
        let samples = predict_spacecraft_trajectory(&sim, &eph, sc, &opt);
        let last = samples.last().copied().unwrap_or_default();
        assert!(last.t_s < 3600.0);
        assert!(last.position_m.length() < 6.371e6);
    }

    #[test]
    fn test_body_centered_of_single_body_is_identity() {
        let (sim, earth, sc) = single_body();
        let opt = TrajectoryOptions {
            duration_s: 120.0,
            ..Default::default()
        };
        let eph = build_celestial_ephemeris(&sim, &opt);
        let bary = predict_spacecraft_trajectory(&sim, &eph, sc, &opt);
        let bci = trajectory_to_body_centered_inertial(&bary, &eph, earth);
        assert_eq!(bary.len(), bci.len());
        // Single body at rest at the origin
        assert_eq!(bary[1].position_m, bci[1].position_m);
        assert!(trajectory_to_body_centered_inertial(&bary, &eph, BodyId(42)).is_empty());
    }

    #[test]
    fn test_interpolation_clamps() {
        let samples = vec![
            TrajectorySample {
                t_s: 0.0,
                position_m: DVec3::ZERO,
                velocity_mps: DVec3::X,
            },
            TrajectorySample {
                t_s: 2.0,
                position_m: DVec3::new(2.0, 0.0, 0.0),
                velocity_mps: DVec3::X,
            },
        ];
        let h = sample_state_hermite(&samples, 1.0).map(|s| s.position_m.x);
        assert!((h.unwrap_or_default() - 1.0).abs() < 1e-12);
        let l = sample_state_linear(&samples, 5.0).map(|s| s.position_m.x);
        assert_eq!(l, Some(2.0));
        assert!(sample_state_linear(&[], 0.0).is_none());
    }
}
