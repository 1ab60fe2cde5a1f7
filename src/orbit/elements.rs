/// Two-body orbital elements and prediction sampling

use std::f64::consts::PI;

use glam::DVec3;

/// Period assumed for escape trajectories when picking a horizon
pub const ESCAPE_PERIOD_FALLBACK_S: f64 = 7200.0;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OrbitalElements {
    /// Negative for hyperbolic orbits
    pub semi_major_axis_m: f64,
    pub eccentricity: f64,
    /// Infinite for escape trajectories
    pub period_s: f64,
    pub periapsis_m: f64,
    /// Infinite for escape trajectories
    pub apoapsis_m: f64,
    pub specific_energy: f64,
}

impl OrbitalElements {
    pub fn is_bound(&self) -> bool {
        self.specific_energy < 0.0
    }
}

/// Elements of `(r, v)` about a point mass with parameter `mu`
pub fn compute_orbital_elements(mu: f64, r: DVec3, v: DVec3) -> Option<OrbitalElements> {
    if !(mu > 0.0) || !r.is_finite() || !v.is_finite() {
        return None;
    }
    let r_len = r.length();
    if !(r_len > 0.0) {
        return None;
    }

    let v2 = v.length_squared();
    let energy = 0.5 * v2 - mu / r_len;
    let h = r.cross(v);
    let e_vec = v.cross(h) / mu - r / r_len;
    let e = e_vec.length();

    let elements = if energy < 0.0 {
        let a = -mu / (2.0 * energy);
        let mut rp = a * (1.0 - e);
        if !(rp > 0.0) {
            rp = r_len;
        }
        OrbitalElements {
            semi_major_axis_m: a,
            eccentricity: e,
            period_s: 2.0 * PI * (a * a * a / mu).sqrt(),
            periapsis_m: rp,
            apoapsis_m: a * (1.0 + e),
            specific_energy: energy,
        }
    } else {
        let a = if energy > 0.0 { -mu / (2.0 * energy) } else { f64::INFINITY };
        let mut rp = h.length_squared() / (mu * (1.0 + e));
        if !(rp > 0.0) || !rp.is_finite() {
            rp = r_len;
        }
        OrbitalElements {
            semi_major_axis_m: a,
            eccentricity: e,
            period_s: f64::INFINITY,
            periapsis_m: rp,
            apoapsis_m: f64::INFINITY,
            specific_energy: energy,
        }
    };

    Some(elements)
}

/// Bound-orbit period, or `None` on escape or invalid input
pub fn estimate_orbital_period(mu: f64, r: DVec3, v: DVec3) -> Option<f64> {
    compute_orbital_elements(mu, r, v)
        .map(|e| e.period_s)
        .filter(|p| p.is_finite() && *p > 0.0)
}

/// Horizon, integrator step and step count for one prediction build
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionSampling {
    pub horizon_s: f64,
    pub dt_s: f64,
    pub steps: usize,
}

/// `horizon = clamp(1.1 T, 60, 36000)` with 500..2000 samples. While
/// thrusting the horizon shrinks to a window around the drawn future segment
/// and sampling gets coarser so rebuilds stay cheap.
pub fn select_prediction_horizon_and_dt(
    period_s: Option<f64>,
    thrusting: bool,
    future_window_s: f64,
) -> PredictionSampling {
    let period = period_s.filter(|p| p.is_finite() && *p > 0.0).unwrap_or(ESCAPE_PERIOD_FALLBACK_S);

    let mut horizon_s = (period * 1.1).clamp(60.0, 36_000.0);
    let (dt_s, max_steps) = if thrusting {
        let window = if future_window_s.is_finite() { future_window_s.max(0.0) } else { 0.0 };
        let thrust_horizon = (120.0f64).max(1.25 * window).clamp(120.0, 3600.0);
        horizon_s = horizon_s.min(thrust_horizon);
        let samples = horizon_s.clamp(300.0, 800.0);
        ((horizon_s / samples).clamp(0.02, 20.0), 1000usize)
    } else {
        let samples = (horizon_s * 0.5).clamp(500.0, 2000.0);
        ((horizon_s / samples).clamp(0.01, 60.0), 2000usize)
    };

    let steps = ((horizon_s / dt_s).ceil() as usize).clamp(2, max_steps);
    PredictionSampling {
        horizon_s,
        dt_s,
        steps,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MU_EARTH: f64 = 3.986004418e14;

    #[test]
    fn test_circular_elements() {
        let r = 6.771e6;
        let v = (MU_EARTH / r).sqrt();
        let el = compute_orbital_elements(MU_EARTH, DVec3::new(r, 0.0, 0.0), DVec3::new(0.0, 0.0, v)).unwrap();
        assert!(el.eccentricity < 1e-9);
        assert!((el.semi_major_axis_m - r).abs() < 1e-3);
        assert!((el.periapsis_m - r).abs() < 1e-3);
        assert!((el.period_s - 2.0 * PI * (r * r * r / MU_EARTH).sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_escape_has_infinite_period() {
        let r = 6.771e6;
        let v = (2.0 * MU_EARTH / r).sqrt() * 1.1;
        let el = compute_orbital_elements(MU_EARTH, DVec3::new(r, 0.0, 0.0), DVec3::new(0.0, v, 0.0)).unwrap();
        assert!(!el.is_bound());
        assert!(el.period_s.is_infinite());
        assert!(el.apoapsis_m.is_infinite());
        assert!((el.periapsis_m - r).abs() / r < 1e-9);
        assert!(estimate_orbital_period(MU_EARTH, DVec3::new(r, 0.0, 0.0), DVec3::new(0.0, v, 0.0)).is_none());
    }

    #[test]
    fn test_sampling_bounds() {
        let s = select_prediction_horizon_and_dt(Some(5550.0), false, 120.0);
        assert!((s.horizon_s - 6105.0).abs() < 1e-9);
        assert!(s.steps >= 500 && s.steps <= 2000);

        let t = select_prediction_horizon_and_dt(Some(5550.0), true, 120.0);
        assert_eq!(t.horizon_s, 150.0);
        assert!(t.steps <= 1000);

        let esc = select_prediction_horizon_and_dt(None, false, 0.0);
        assert!((esc.horizon_s - 7920.0).abs() < 1e-9);
    }
}
