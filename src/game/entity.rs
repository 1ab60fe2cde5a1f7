/// Game entities
///
/// Transforms are world-space and double precision. Entities bind to a
/// physics body (local space, by id) and a render instance (by name).

use glam::{DVec3, Mat4, Quat, Vec3};

use crate::physics::BodyId;
use crate::world::{world_to_local, WorldVec3};

/// Entity identifier, unique and monotonic per manager. Zero is invalid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct EntityId(pub u32);

impl EntityId {
    pub const INVALID: EntityId = EntityId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }
}

/// World-space transform
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    pub position_world: WorldVec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position_world: DVec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    pub fn from_position(position_world: WorldVec3) -> Self {
        Self {
            position_world,
            ..Default::default()
        }
    }

    /// Matrix in the local frame at `origin_world`
    pub fn to_local_matrix(&self, origin_world: WorldVec3) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.scale,
            self.rotation,
            world_to_local(self.position_world, origin_world),
        )
    }
}

/// Previous / current pose pair for rendering between fixed steps
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InterpolatedTransform {
    pub prev_position: WorldVec3,
    pub prev_rotation: Quat,
    pub curr_position: WorldVec3,
    pub curr_rotation: Quat,
}

impl Default for InterpolatedTransform {
    fn default() -> Self {
        Self {
            prev_position: DVec3::ZERO,
            prev_rotation: Quat::IDENTITY,
            curr_position: DVec3::ZERO,
            curr_rotation: Quat::IDENTITY,
        }
    }
}

impl InterpolatedTransform {
    pub fn interpolated_position(&self, alpha: f64) -> WorldVec3 {
        let a = alpha.clamp(0.0, 1.0);
        self.prev_position.lerp(self.curr_position, a)
    }

    pub fn interpolated_rotation(&self, alpha: f64) -> Quat {
        let a = alpha.clamp(0.0, 1.0) as f32;
        self.prev_rotation.slerp(self.curr_rotation, a)
    }

    pub fn store_current_as_previous(&mut self) {
        self.prev_position = self.curr_position;
        self.prev_rotation = self.curr_rotation;
    }

    /// Teleport: both snapshots equal, no blending
    pub fn set_immediate(&mut self, position: WorldVec3, rotation: Quat) {
        self.prev_position = position;
        self.curr_position = position;
        self.prev_rotation = rotation;
        self.curr_rotation = rotation;
    }
}

#[derive(Debug, Clone)]
pub struct Entity {
    id: EntityId,
    name: String,
    pub transform: Transform,
    pub interpolation: InterpolatedTransform,
    pub use_interpolation: bool,
    pub physics_body: Option<BodyId>,
    pub render_name: Option<String>,
    pub active: bool,
    pub visible: bool,
}

impl Entity {
    pub fn new(id: EntityId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            transform: Transform::default(),
            interpolation: InterpolatedTransform::default(),
            use_interpolation: false,
            physics_body: None,
            render_name: None,
            active: true,
            visible: true,
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub(crate) fn set_name(&mut self, name: String) {
        self.name = name;
    }

    pub fn position_world(&self) -> WorldVec3 {
        self.transform.position_world
    }

    pub fn rotation(&self) -> Quat {
        self.transform.rotation
    }

    pub fn scale(&self) -> Vec3 {
        self.transform.scale
    }

    pub fn set_position_world(&mut self, position: WorldVec3) {
        self.transform.position_world = position;
    }

    pub fn set_rotation(&mut self, rotation: Quat) {
        self.transform.rotation = rotation;
    }

    pub fn set_scale(&mut self, scale: Vec3) {
        self.transform.scale = scale;
    }

    pub fn has_physics(&self) -> bool {
        self.physics_body.is_some()
    }

    /// Bound body, or the invalid id
    pub fn body_id(&self) -> BodyId {
        self.physics_body.unwrap_or(BodyId::INVALID)
    }

    pub fn has_render(&self) -> bool {
        self.render_name.as_deref().is_some_and(|n| !n.is_empty())
    }

    pub fn render_position_world(&self, alpha: f64) -> WorldVec3 {
        if self.use_interpolation {
            self.interpolation.interpolated_position(alpha)
        } else {
            self.transform.position_world
        }
    }

    pub fn render_rotation(&self, alpha: f64) -> Quat {
        if self.use_interpolation {
            self.interpolation.interpolated_rotation(alpha)
        } else {
            self.transform.rotation
        }
    }

    pub fn render_local_matrix(&self, alpha: f64, origin_world: WorldVec3) -> Mat4 {
        Mat4::from_scale_rotation_translation(
            self.transform.scale,
            self.render_rotation(alpha),
            world_to_local(self.render_position_world(alpha), origin_world),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_interpolation_endpoints() {
        let mut interp = InterpolatedTransform::default();
        interp.set_immediate(DVec3::new(1.0, 2.0, 3.0), Quat::IDENTITY);
        interp.curr_position = DVec3::new(3.0, 2.0, 3.0);
        assert_eq!(interp.interpolated_position(0.0), DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(interp.interpolated_position(1.0), DVec3::new(3.0, 2.0, 3.0));
        assert_eq!(interp.interpolated_position(0.5), DVec3::new(2.0, 2.0, 3.0));
    }

    #[test]
    fn test_render_pose_without_interpolation() {
        let mut e = Entity::new(EntityId(1), "probe");
        e.set_position_world(DVec3::new(5.0, 0.0, 0.0));
        e.interpolation.set_immediate(DVec3::ZERO, Quat::IDENTITY);
        assert_eq!(e.render_position_world(0.5), DVec3::new(5.0, 0.0, 0.0));
    }
}
