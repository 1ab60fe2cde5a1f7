/// World-space primitives
///
/// The authoritative world is double precision (`WorldVec3`). Everything that
/// is handed to the renderer or the rigid-body backend is first translated into
/// a 32-bit local bubble around some origin.

use glam::{DQuat, DVec3, Quat, Vec3};

/// 64-bit world position or velocity
pub type WorldVec3 = DVec3;

/// Convert a world position into the local frame at `origin_world`.
/// Subtraction happens in f64, only the result is truncated to f32.
pub fn world_to_local(p_world: WorldVec3, origin_world: WorldVec3) -> Vec3 {
    let rel = p_world - origin_world;
    Vec3::new(rel.x as f32, rel.y as f32, rel.z as f32)
}

/// Double-precision variant used by the physics bridge.
pub fn world_to_local_d(p_world: WorldVec3, origin_world: WorldVec3) -> DVec3 {
    p_world - origin_world
}

pub fn local_to_world(p_local: Vec3, origin_world: WorldVec3) -> WorldVec3 {
    origin_world + p_local.as_dvec3()
}

pub fn local_to_world_d(p_local: DVec3, origin_world: WorldVec3) -> WorldVec3 {
    origin_world + p_local
}

/// Round each component to the nearest multiple of `grid`.
/// A non-positive or non-finite grid leaves the point untouched.
pub fn snap_world(p: WorldVec3, grid: f64) -> WorldVec3 {
    if !(grid > 0.0) || !grid.is_finite() {
        return p;
    }
    let snapped = (p / grid).round() * grid;
    if is_finite(snapped) {
        snapped
    } else {
        p
    }
}

pub fn is_finite(v: DVec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

pub fn is_finite_f(v: Vec3) -> bool {
    v.x.is_finite() && v.y.is_finite() && v.z.is_finite()
}

pub fn is_zero(v: DVec3) -> bool {
    v.x == 0.0 && v.y == 0.0 && v.z == 0.0
}

/// Length that never returns NaN; non-finite input maps to zero.
pub fn safe_length(v: DVec3) -> f64 {
    let len2 = v.length_squared();
    if !len2.is_finite() || len2 <= 0.0 {
        return 0.0;
    }
    len2.sqrt()
}

pub fn normalized_or(v: DVec3, fallback: DVec3) -> DVec3 {
    let len = safe_length(v);
    if !(len > 0.0) {
        return fallback;
    }
    v / len
}

/// Finite vector or zero.
pub fn finite_or_zero(v: DVec3) -> DVec3 {
    if is_finite(v) {
        v
    } else {
        DVec3::ZERO
    }
}

/// Normalized finite rotation or identity.
pub fn sanitize_rotation(q: Quat) -> Quat {
    let len2 = q.length_squared();
    if !len2.is_finite() || len2 <= 1.0e-12 {
        return Quat::IDENTITY;
    }
    q.normalize()
}

pub fn quat_to_dquat(q: Quat) -> DQuat {
    DQuat::from_xyzw(q.x as f64, q.y as f64, q.z as f64, q.w as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snap_rejects_bad_grid() {
        let p = DVec3::new(12.3, -4.5, 6.7);
        assert_eq!(snap_world(p, 0.0), p);
        assert_eq!(snap_world(p, -10.0), p);
        assert_eq!(snap_world(p, f64::NAN), p);
    }

    #[test]
    fn test_sanitize_rotation() {
        assert_eq!(sanitize_rotation(Quat::from_xyzw(0.0, 0.0, 0.0, 0.0)), Quat::IDENTITY);
        assert_eq!(sanitize_rotation(Quat::from_xyzw(f32::NAN, 0.0, 0.0, 1.0)), Quat::IDENTITY);
    }
}
