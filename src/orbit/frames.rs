/// Radial / tangential / normal frame

use glam::DVec3;

const DEGENERATE_EPS: f64 = 1.0e-12;

/// Orthonormal basis at an orbital state: `R = r̂`, `N = (r×v)̂`, `T = N×R`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RtnFrame {
    pub r: DVec3,
    pub t: DVec3,
    pub n: DVec3,
}

impl Default for RtnFrame {
    fn default() -> Self {
        Self {
            r: DVec3::X,
            t: DVec3::Y,
            n: DVec3::Z,
        }
    }
}

impl RtnFrame {
    /// `(radial, tangential, normal)` components to the inertial frame
    pub fn to_world(&self, rtn: DVec3) -> DVec3 {
        self.r * rtn.x + self.t * rtn.y + self.n * rtn.z
    }

    pub fn from_world(&self, v: DVec3) -> DVec3 {
        DVec3::new(v.dot(self.r), v.dot(self.t), v.dot(self.n))
    }
}

/// RTN frame of a state relative to its central body. Degenerate input
/// (zero radius, radial or zero velocity) falls back to a stable basis.
pub fn compute_rtn_frame(rel_position_m: DVec3, rel_velocity_mps: DVec3) -> RtnFrame {
    if !rel_position_m.is_finite() || !rel_velocity_mps.is_finite() {
        return RtnFrame::default();
    }

    let r_len = rel_position_m.length();
    if r_len <= DEGENERATE_EPS {
        return RtnFrame::default();
    }
    let r = rel_position_m / r_len;

    let h = rel_position_m.cross(rel_velocity_mps);
    let h_len = h.length();
    let n = if h_len > DEGENERATE_EPS * r_len.max(1.0) {
        h / h_len
    } else {
        // Radial or zero velocity: any normal perpendicular to r
        let helper = if r.y.abs() < 0.9 { DVec3::Y } else { DVec3::X };
        r.cross(helper).normalize()
    };
    let t = n.cross(r);

    RtnFrame { r, t, n }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_orbit_frame() {
        let f = compute_rtn_frame(DVec3::new(7.0e6, 0.0, 0.0), DVec3::new(0.0, 7500.0, 0.0));
        assert!((f.r - DVec3::X).length() < 1e-12);
        assert!((f.t - DVec3::Y).length() < 1e-12);
        assert!((f.n - DVec3::Z).length() < 1e-12);
    }

    #[test]
    fn test_round_trip_components() {
        let f = compute_rtn_frame(DVec3::new(1.0, 2.0, 3.0), DVec3::new(-3.0, 1.0, 0.5));
        let rtn = DVec3::new(1.5, -2.0, 0.25);
        let back = f.from_world(f.to_world(rtn));
        assert!((back - rtn).length() < 1e-12);
    }

    #[test]
    fn test_radial_velocity_is_still_orthonormal() {
        let f = compute_rtn_frame(DVec3::new(0.0, 5.0, 0.0), DVec3::new(0.0, 3.0, 0.0));
        assert!((f.r.length() - 1.0).abs() < 1e-12);
        assert!(f.r.dot(f.n).abs() < 1e-12);
        assert!(f.t.dot(f.n).abs() < 1e-12);
    }
}
