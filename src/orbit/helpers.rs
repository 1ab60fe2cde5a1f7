/// Orbit construction and gravity helpers shared by the game and the simulator

use glam::DVec3;

use super::simulation::GameSimulation;
use super::types::{make_state, BodyId, State, TwoBodyBarycentricStates};

/// Circular orbit in the XZ plane around a point mass, at argument of
/// latitude `arg_latitude_rad` measured from +X towards +Z.
/// Invalid input yields a zero state.
pub fn circular_orbit_relative_state_xz(
    gravitational_constant: f64,
    central_mass_kg: f64,
    orbital_radius_m: f64,
    arg_latitude_rad: f64,
) -> State {
    if !(central_mass_kg > 0.0) || !(orbital_radius_m > 0.0) || !gravitational_constant.is_finite() {
        return State::default();
    }

    let mu = gravitational_constant * central_mass_kg;
    let v_circ = (mu / orbital_radius_m).sqrt();
    let (sin_u, cos_u) = arg_latitude_rad.sin_cos();

    make_state(
        DVec3::new(orbital_radius_m * cos_u, 0.0, orbital_radius_m * sin_u),
        DVec3::new(-v_circ * sin_u, 0.0, v_circ * cos_u),
    )
}

/// Two bodies on a mutual circular orbit with the barycenter at rest at the origin
pub fn two_body_circular_barycentric_xz(
    gravitational_constant: f64,
    mass_a_kg: f64,
    mass_b_kg: f64,
    separation_m: f64,
    arg_latitude_rad: f64,
) -> TwoBodyBarycentricStates {
    let m_tot = mass_a_kg + mass_b_kg;
    if !(m_tot > 0.0) || !(separation_m > 0.0) || !m_tot.is_finite() {
        return TwoBodyBarycentricStates::default();
    }

    let rel = circular_orbit_relative_state_xz(gravitational_constant, m_tot, separation_m, arg_latitude_rad);
    let frac_a = mass_b_kg / m_tot;
    let frac_b = mass_a_kg / m_tot;

    TwoBodyBarycentricStates {
        state_a: make_state(-frac_a * rel.position_m, -frac_a * rel.velocity_mps),
        state_b: make_state(frac_b * rel.position_m, frac_b * rel.velocity_mps),
    }
}

/// `-G m r / (|r|² + ε²)^{3/2}`. Zero for non-positive G or mass and for
/// any non-finite intermediate.
pub fn point_mass_accel(gravitational_constant: f64, mass_kg: f64, r_m: DVec3, softening_length2_m2: f64) -> DVec3 {
    if !(gravitational_constant > 0.0) || !(mass_kg > 0.0) {
        return DVec3::ZERO;
    }

    let r2 = r_m.length_squared() + softening_length2_m2;
    if !r2.is_finite() || r2 <= 0.0 {
        return DVec3::ZERO;
    }

    let inv_r = 1.0 / r2.sqrt();
    let inv_r3 = inv_r * inv_r * inv_r;
    let a = (-gravitational_constant * mass_kg) * r_m * inv_r3;
    if a.is_finite() {
        a
    } else {
        DVec3::ZERO
    }
}

/// Acceleration of a test particle at `p_rel_m` in the translating frame
/// centered on `reference`: barycentric acceleration of the particle minus
/// that of the reference body.
pub fn nbody_accel_body_centered(sim: &GameSimulation, reference: BodyId, p_rel_m: DVec3) -> DVec3 {
    let Some(ref_body) = sim.body_by_id(reference) else {
        return DVec3::ZERO;
    };

    let g = sim.config().gravitational_constant;
    let eps = sim.config().softening_length_m;
    let eps2 = eps * eps;

    let p_ref = ref_body.state.position_m;
    let p_sc = p_ref + p_rel_m;

    let mut a_sc = point_mass_accel(g, ref_body.mass_kg, p_rel_m, eps2);
    let mut a_ref = DVec3::ZERO;

    for body in sim.massive_bodies() {
        if body.id == reference {
            continue;
        }
        a_sc += point_mass_accel(g, body.mass_kg, p_sc - body.state.position_m, eps2);
        a_ref += point_mass_accel(g, body.mass_kg, p_ref - body.state.position_m, eps2);
    }

    a_sc - a_ref
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::orbit::types::G_SI;

    #[test]
    fn test_invalid_inputs_give_zero() {
        assert_eq!(circular_orbit_relative_state_xz(G_SI, 0.0, 1.0e7, 0.0), State::default());
        assert_eq!(circular_orbit_relative_state_xz(G_SI, 1.0e24, -5.0, 0.0), State::default());
        assert_eq!(point_mass_accel(G_SI, 1.0e24, DVec3::ZERO, 0.0), DVec3::ZERO);
        assert_eq!(point_mass_accel(0.0, 1.0e24, DVec3::X, 0.0), DVec3::ZERO);
    }

    #[test]
    fn test_softening_bounds_acceleration() {
        let hard = point_mass_accel(1.0, 1.0, DVec3::new(1.0e-3, 0.0, 0.0), 0.0);
        let soft = point_mass_accel(1.0, 1.0, DVec3::new(1.0e-3, 0.0, 0.0), 1.0);
        assert!(soft.length() < hard.length());
        assert!(soft.x < 0.0);
    }
}
