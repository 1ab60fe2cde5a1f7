/// Sampled massive-body states with cubic Hermite lookup

use glam::DVec3;

use super::simulation::{GameSimulation, SimConfig};
use super::types::{make_state, BodyId, State};

/// Upper bound on ephemeris frames for one build
const MAX_FRAMES: usize = 1_000_000;

/// Cubic Hermite position between `(p0, v0)` at `t0` and `(p1, v1)` at `t1`
pub fn hermite_position(p0: DVec3, v0: DVec3, p1: DVec3, v1: DVec3, t0: f64, t1: f64, t: f64) -> DVec3 {
    hermite_state(make_state(p0, v0), make_state(p1, v1), t0, t1, t).position_m
}

/// Cubic Hermite position and its time derivative. Degenerate intervals
/// return the nearer endpoint.
pub fn hermite_state(a: State, b: State, t0: f64, t1: f64, t: f64) -> State {
    let h = t1 - t0;
    if !(h > 0.0) || !h.is_finite() {
        return if t >= t1 { b } else { a };
    }
    let s = ((t - t0) / h).clamp(0.0, 1.0);
    let s2 = s * s;
    let s3 = s2 * s;

    let h00 = 2.0 * s3 - 3.0 * s2 + 1.0;
    let h10 = s3 - 2.0 * s2 + s;
    let h01 = -2.0 * s3 + 3.0 * s2;
    let h11 = s3 - s2;

    let d00 = 6.0 * s2 - 6.0 * s;
    let d10 = 3.0 * s2 - 4.0 * s + 1.0;
    let d01 = -6.0 * s2 + 6.0 * s;
    let d11 = 3.0 * s2 - 2.0 * s;

    let position_m = a.position_m * h00 + a.velocity_mps * (h10 * h) + b.position_m * h01 + b.velocity_mps * (h11 * h);
    let velocity_mps =
        (a.position_m * d00 + b.position_m * d01) / h + a.velocity_mps * d10 + b.velocity_mps * d11;

    make_state(position_m, velocity_mps)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EphemerisBody {
    pub id: BodyId,
    pub mass_kg: f64,
    pub radius_m: f64,
}

/// Body states at `t0 + k·dt` for every massive body in a simulation
#[derive(Debug, Clone, Default)]
pub struct CelestialEphemeris {
    config: SimConfig,
    t0_s: f64,
    dt_s: f64,
    bodies: Vec<EphemerisBody>,
    /// `frames[k][i]` is body `i` at `t0 + k·dt`
    frames: Vec<Vec<State>>,
}

impl CelestialEphemeris {
    /// Propagate a copy of `sim`'s massive bodies for at least `duration_s`
    pub fn build(sim: &GameSimulation, duration_s: f64, dt_s: f64) -> Self {
        let mut sandbox = sim.clone();
        sandbox.strip_spacecraft();

        let dt_s = if dt_s > 0.0 && dt_s.is_finite() { dt_s } else { 60.0 };
        let duration_s = if duration_s.is_finite() { duration_s.max(0.0) } else { 0.0 };
        let steps = ((duration_s / dt_s).ceil() as usize).clamp(1, MAX_FRAMES - 1);

        let bodies = sandbox
            .massive_bodies()
            .iter()
            .map(|b| EphemerisBody {
                id: b.id,
                mass_kg: b.mass_kg,
                radius_m: b.radius_m,
            })
            .collect();

        let snapshot = |s: &GameSimulation| s.massive_bodies().iter().map(|b| b.state).collect::<Vec<_>>();
        let mut frames = Vec::with_capacity(steps + 1);
        frames.push(snapshot(&sandbox));
        for _ in 0..steps {
            sandbox.step(dt_s);
            frames.push(snapshot(&sandbox));
        }

        Self {
            config: *sim.config(),
            t0_s: sim.time_s(),
            dt_s,
            bodies,
            frames,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty() || self.bodies.is_empty()
    }

    pub fn config(&self) -> &SimConfig {
        &self.config
    }

    pub fn t0_s(&self) -> f64 {
        self.t0_s
    }

    pub fn t_end_s(&self) -> f64 {
        self.t0_s + self.dt_s * self.frames.len().saturating_sub(1) as f64
    }

    pub fn dt_s(&self) -> f64 {
        self.dt_s
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn bodies(&self) -> &[EphemerisBody] {
        &self.bodies
    }

    fn body_index(&self, id: BodyId) -> Option<usize> {
        self.bodies.iter().position(|b| b.id == id)
    }

    /// Interpolated state, clamped to the sampled range
    pub fn body_state_at(&self, id: BodyId, t_s: f64) -> Option<State> {
        let index = self.body_index(id)?;
        self.state_by_index(index, t_s)
    }

    pub fn body_position_at(&self, id: BodyId, t_s: f64) -> Option<DVec3> {
        self.body_state_at(id, t_s).map(|s| s.position_m)
    }

    pub(crate) fn state_by_index(&self, index: usize, t_s: f64) -> Option<State> {
        let last = self.frames.len().checked_sub(1)?;
        if index >= self.bodies.len() {
            return None;
        }
        if last == 0 || !t_s.is_finite() {
            return Some(self.frames[0][index]);
        }

        let u = ((t_s - self.t0_s) / self.dt_s).clamp(0.0, last as f64);
        let k = (u.floor() as usize).min(last - 1);
        let t0 = self.t0_s + self.dt_s * k as f64;
        let t1 = t0 + self.dt_s;
        Some(hermite_state(
            self.frames[k][index],
            self.frames[k + 1][index],
            t0,
            t1,
            t_s.clamp(t0, t1),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hermite_endpoints() {
        let a = make_state(DVec3::ZERO, DVec3::X);
        let b = make_state(DVec3::new(1.0, 0.0, 0.0), DVec3::X);
        assert_eq!(hermite_state(a, b, 0.0, 1.0, 0.0).position_m, DVec3::ZERO);
        assert!((hermite_state(a, b, 0.0, 1.0, 1.0).position_m - b.position_m).length() < 1e-12);
        // Constant velocity is reproduced exactly
        let mid = hermite_state(a, b, 0.0, 1.0, 0.25);
        assert!((mid.position_m.x - 0.25).abs() < 1e-12);
        assert!((mid.velocity_mps.x - 1.0).abs() < 1e-12);
    }
}
