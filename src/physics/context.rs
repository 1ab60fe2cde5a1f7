/// Physics origin bookkeeping
///
/// For any body: `p_world = origin_world + p_local` and
/// `v_world = velocity_origin_world + v_local`.

use glam::DVec3;
use tracing::debug;

use super::{BodyId, PhysicsWorld};
use crate::world::{self, WorldVec3};

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PhysicsContext {
    origin_world: WorldVec3,
    origin_revision: u64,
    velocity_origin_world: WorldVec3,
    velocity_origin_revision: u64,
    anchor_world: Option<WorldVec3>,
}

impl PhysicsContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn origin_world(&self) -> WorldVec3 {
        self.origin_world
    }

    pub fn origin_revision(&self) -> u64 {
        self.origin_revision
    }

    pub fn velocity_origin_world(&self) -> WorldVec3 {
        self.velocity_origin_world
    }

    pub fn velocity_origin_revision(&self) -> u64 {
        self.velocity_origin_revision
    }

    /// Returns true if the origin changed. Exact comparison on purpose.
    pub fn set_origin_world(&mut self, origin: WorldVec3) -> bool {
        if origin == self.origin_world {
            return false;
        }
        self.origin_world = origin;
        self.origin_revision += 1;
        true
    }

    pub fn set_velocity_origin_world(&mut self, velocity: WorldVec3) -> bool {
        if velocity == self.velocity_origin_world {
            return false;
        }
        self.velocity_origin_world = velocity;
        self.velocity_origin_revision += 1;
        true
    }

    pub fn anchor_world(&self) -> Option<WorldVec3> {
        self.anchor_world
    }

    pub fn set_anchor_world(&mut self, anchor: WorldVec3) {
        self.anchor_world = Some(anchor);
    }

    pub fn clear_anchor(&mut self) {
        self.anchor_world = None;
    }

    pub fn world_to_local(&self, p_world: WorldVec3) -> DVec3 {
        world::world_to_local_d(p_world, self.origin_world)
    }

    pub fn local_to_world(&self, p_local: DVec3) -> WorldVec3 {
        world::local_to_world_d(p_local, self.origin_world)
    }

    pub fn velocity_world_to_local(&self, v_world: WorldVec3) -> DVec3 {
        v_world - self.velocity_origin_world
    }

    pub fn velocity_local_to_world(&self, v_local: DVec3) -> WorldVec3 {
        self.velocity_origin_world + v_local
    }

    /// Move the position origin onto `body` once it strays further than
    /// `threshold_m` from it. The new origin is snapped to `snap_m` when positive.
    pub fn maybe_rebase_origin_to_body(
        &mut self,
        physics: &mut dyn PhysicsWorld,
        body: BodyId,
        threshold_m: f64,
        snap_m: f64,
    ) -> bool {
        if !physics.is_body_valid(body) {
            return false;
        }

        let p_local = physics.get_position(body);
        if !world::is_finite(p_local) {
            return false;
        }
        let threshold = threshold_m.max(0.0);
        if p_local.length_squared() <= threshold * threshold {
            return false;
        }

        let anchor = self.origin_world + p_local;
        let new_origin = if snap_m > 0.0 {
            world::snap_world(anchor, snap_m)
        } else {
            anchor
        };

        let delta_local = self.origin_world - new_origin;
        if world::is_zero(delta_local) {
            return false;
        }

        physics.shift_origin(delta_local);
        self.set_origin_world(new_origin);
        self.anchor_world = Some(anchor);

        debug!(
            "Rebased physics origin to ({:.1}, {:.1}, {:.1}), shift {:.1} m",
            new_origin.x,
            new_origin.y,
            new_origin.z,
            delta_local.length()
        );
        true
    }

    /// Absorb the body's local velocity into the velocity origin once it
    /// exceeds `threshold_mps`.
    pub fn maybe_rebase_velocity_to_body(
        &mut self,
        physics: &mut dyn PhysicsWorld,
        body: BodyId,
        threshold_mps: f64,
    ) -> bool {
        if !physics.is_body_valid(body) {
            return false;
        }

        let v_local = physics.get_linear_velocity(body).as_dvec3();
        if !world::is_finite(v_local) || world::is_zero(v_local) {
            return false;
        }
        let threshold = threshold_mps.max(0.0);
        if v_local.length_squared() <= threshold * threshold {
            return false;
        }

        physics.shift_velocity_origin(v_local);
        let new_velocity = self.velocity_origin_world + v_local;
        self.set_velocity_origin_world(new_velocity);

        debug!("Rebased velocity origin by {:.2} m/s", v_local.length());
        true
    }
}
