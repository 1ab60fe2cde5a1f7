/// Wireframe overlay of physics colliders
///
/// Reads bodies through `PhysicsWorld::for_each_debug_body` and queues one-frame
/// commands on the Physics layer. Color encodes motion type, sleep state and
/// the sensor flag.

use glam::{DVec3, Quat, Vec3, Vec4};
use serde::{Deserialize, Serialize};

use super::{DebugDepth, DebugDrawLayer, DebugDrawSystem, DebugStyle};
use crate::physics::{CollisionShape, DebugBodyView, MotionType, PhysicsWorld};
use crate::world::{normalized_or, WorldVec3};

/// Half size of the square drawn for an infinite plane
pub const PLANE_PATCH_HALF_SIZE: f32 = 25.0;

pub const DYNAMIC_COLOR: Vec4 = Vec4::new(0.2, 0.9, 0.3, 1.0);
pub const STATIC_COLOR: Vec4 = Vec4::new(0.6, 0.6, 0.6, 1.0);
pub const KINEMATIC_COLOR: Vec4 = Vec4::new(0.2, 0.6, 1.0, 1.0);
pub const SLEEPING_COLOR: Vec4 = Vec4::new(0.15, 0.35, 0.15, 1.0);
pub const SENSOR_COLOR: Vec4 = Vec4::new(1.0, 0.35, 0.9, 1.0);

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct PhysicsDebugSettings {
    pub enabled: bool,
    /// Draw on top of geometry instead of depth tested
    pub overlay: bool,
    pub alpha: f32,
    /// 0 = no limit
    pub max_bodies: u32,
    pub active_only: bool,
    pub include_sensors: bool,
    pub include_static: bool,
    pub include_kinematic: bool,
    pub include_dynamic: bool,
}

impl Default for PhysicsDebugSettings {
    fn default() -> Self {
        Self {
            enabled: false,
            overlay: true,
            alpha: 0.75,
            max_bodies: 0,
            active_only: false,
            include_sensors: true,
            include_static: true,
            include_kinematic: true,
            include_dynamic: true,
        }
    }
}

impl PhysicsDebugSettings {
    fn accepts(&self, body: &DebugBodyView<'_>) -> bool {
        if self.active_only && !body.is_active {
            return false;
        }
        if body.is_sensor && !self.include_sensors {
            return false;
        }
        match body.motion_type {
            MotionType::Static => self.include_static,
            MotionType::Kinematic => self.include_kinematic,
            MotionType::Dynamic => self.include_dynamic,
        }
    }
}

pub fn collider_color(body: &DebugBodyView<'_>, alpha: f32) -> Vec4 {
    let mut color = match body.motion_type {
        MotionType::Static => STATIC_COLOR,
        MotionType::Kinematic => KINEMATIC_COLOR,
        MotionType::Dynamic => DYNAMIC_COLOR,
    };
    if !body.is_active && body.motion_type != MotionType::Static {
        color = SLEEPING_COLOR;
    }
    if body.is_sensor {
        color = SENSOR_COLOR;
    }
    color.w *= alpha;
    color
}

/// Queue wireframes for every accepted body. Returns the number of bodies drawn.
pub fn debug_draw_physics_colliders(
    draw: &mut DebugDrawSystem,
    origin_world: WorldVec3,
    physics: &dyn PhysicsWorld,
    settings: &PhysicsDebugSettings,
) -> usize {
    let depth = if settings.overlay {
        DebugDepth::AlwaysOnTop
    } else {
        DebugDepth::DepthTested
    };
    let alpha = if settings.alpha.is_finite() {
        settings.alpha.clamp(0.0, 1.0)
    } else {
        1.0
    };
    let limit = settings.max_bodies as usize;

    let mut drawn = 0usize;
    physics.for_each_debug_body(&mut |body| {
        if limit > 0 && drawn >= limit {
            return;
        }
        if !settings.accepts(body) {
            return;
        }
        let style = DebugStyle::new(collider_color(body, alpha))
            .depth(depth)
            .layer(DebugDrawLayer::Physics);

        let position = origin_world + body.position;
        match body.shape {
            CollisionShape::Compound { children } => {
                for child in children {
                    let child_pos = position + (body.rotation * child.position).as_dvec3();
                    let child_rot = body.rotation * child.rotation;
                    draw_shape(draw, &child.shape, child_pos, child_rot, &style);
                }
            }
            shape => draw_shape(draw, shape, position, body.rotation, &style),
        }
        drawn += 1;
    });
    drawn
}

fn draw_shape(draw: &mut DebugDrawSystem, shape: &CollisionShape, center: WorldVec3, rotation: Quat, style: &DebugStyle) {
    let up = normalized_or((rotation * Vec3::Y).as_dvec3(), DVec3::Y);
    match *shape {
        CollisionShape::Box { half_extents } => draw.add_obb(center, rotation, half_extents, style),
        CollisionShape::Sphere { radius } => draw.add_sphere(center, radius, style),
        CollisionShape::Capsule { radius, half_height } => {
            let offset = up * f64::from(half_height);
            draw.add_capsule(center - offset, center + offset, radius, style);
        }
        CollisionShape::Cylinder { radius, half_height } => {
            draw.add_cylinder(center, up, radius, half_height, style);
        }
        CollisionShape::TaperedCylinder {
            half_height,
            top_radius,
            bottom_radius,
        } => draw.add_tapered_cylinder(center, up, half_height, top_radius, bottom_radius, style),
        CollisionShape::Plane { normal, offset } => {
            let n0 = normalized_or(normal.as_dvec3(), DVec3::Y).as_vec3();
            let n = normalized_or((rotation * n0).as_dvec3(), DVec3::Y);
            draw.add_plane_patch(center + n * f64::from(offset), n, PLANE_PATCH_HALF_SIZE, style);
        }
        // Nested compounds are rejected when the body is created
        CollisionShape::Compound { .. } => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::{BodyId, Layer};

    fn view(shape: &CollisionShape, motion_type: MotionType, is_active: bool, is_sensor: bool) -> DebugBodyView<'_> {
        DebugBodyView {
            id: BodyId(1),
            shape,
            position: DVec3::ZERO,
            rotation: Quat::IDENTITY,
            motion_type,
            layer: Layer::default(),
            is_active,
            is_sensor,
        }
    }

    #[test]
    fn test_collider_colors() {
        let shape = CollisionShape::default();
        assert_eq!(collider_color(&view(&shape, MotionType::Dynamic, true, false), 1.0), DYNAMIC_COLOR);
        assert_eq!(collider_color(&view(&shape, MotionType::Static, false, false), 1.0), STATIC_COLOR);
        assert_eq!(collider_color(&view(&shape, MotionType::Dynamic, false, false), 1.0), SLEEPING_COLOR);
        assert_eq!(collider_color(&view(&shape, MotionType::Kinematic, true, true), 1.0), SENSOR_COLOR);
        let faded = collider_color(&view(&shape, MotionType::Kinematic, true, false), 0.5);
        assert_eq!(faded.w, 0.5);
    }
}
