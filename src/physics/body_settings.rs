/// Rigid body creation settings
///
/// Positions are in the physics local frame (relative to the physics origin),
/// stored as f64 so callers never truncate before subtracting the origin.

use glam::{DVec3, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::layers::Layer;
use super::shape::CollisionShape;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MotionType {
    Static,
    Kinematic,
    #[default]
    Dynamic,
}

impl MotionType {
    pub fn name(self) -> &'static str {
        match self {
            MotionType::Static => "static",
            MotionType::Kinematic => "kinematic",
            MotionType::Dynamic => "dynamic",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BodySettings {
    pub shape: CollisionShape,
    pub position: DVec3,
    pub rotation: Quat,
    pub linear_velocity: Vec3,
    pub angular_velocity: Vec3,
    pub motion_type: MotionType,
    pub mass: f32,
    pub friction: f32,
    pub restitution: f32,
    pub linear_damping: f32,
    pub angular_damping: f32,
    pub layer: Layer,
    pub is_sensor: bool,
    pub start_active: bool,
    pub allow_sleeping: bool,
    pub gravity_scale: f32,
    pub user_data: u64,
}

impl Default for BodySettings {
    fn default() -> Self {
        Self::new()
    }
}

impl BodySettings {
    pub fn new() -> Self {
        Self {
            shape: CollisionShape::default(),
            position: DVec3::ZERO,
            rotation: Quat::IDENTITY,
            linear_velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            motion_type: MotionType::Dynamic,
            mass: 1.0,
            friction: 0.5,
            restitution: 0.0,
            linear_damping: 0.0,
            angular_damping: 0.05,
            layer: Layer::DEFAULT,
            is_sensor: false,
            start_active: true,
            allow_sleeping: true,
            gravity_scale: 1.0,
            user_data: 0,
        }
    }

    pub fn with_shape(mut self, shape: CollisionShape) -> Self {
        self.shape = shape;
        self
    }

    pub fn with_position(mut self, position: DVec3) -> Self {
        self.position = position;
        self
    }

    pub fn with_rotation(mut self, rotation: Quat) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn with_linear_velocity(mut self, velocity: Vec3) -> Self {
        self.linear_velocity = velocity;
        self
    }

    pub fn with_angular_velocity(mut self, velocity: Vec3) -> Self {
        self.angular_velocity = velocity;
        self
    }

    pub fn with_motion_type(mut self, motion_type: MotionType) -> Self {
        self.motion_type = motion_type;
        self
    }

    pub fn set_static(self) -> Self {
        self.with_motion_type(MotionType::Static).with_layer(Layer::STATIC)
    }

    pub fn set_kinematic(self) -> Self {
        self.with_motion_type(MotionType::Kinematic)
    }

    pub fn set_dynamic(self) -> Self {
        self.with_motion_type(MotionType::Dynamic)
    }

    pub fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self
    }

    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    pub fn with_restitution(mut self, restitution: f32) -> Self {
        self.restitution = restitution;
        self
    }

    pub fn with_linear_damping(mut self, damping: f32) -> Self {
        self.linear_damping = damping;
        self
    }

    pub fn with_angular_damping(mut self, damping: f32) -> Self {
        self.angular_damping = damping;
        self
    }

    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layer = layer;
        self
    }

    pub fn as_sensor(mut self, is_sensor: bool) -> Self {
        self.is_sensor = is_sensor;
        self
    }

    pub fn with_start_active(mut self, active: bool) -> Self {
        self.start_active = active;
        self
    }

    pub fn with_allow_sleeping(mut self, allow: bool) -> Self {
        self.allow_sleeping = allow;
        self
    }

    pub fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    pub fn with_user_data(mut self, user_data: u64) -> Self {
        self.user_data = user_data;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let s = BodySettings::default();
        assert_eq!(s.motion_type, MotionType::Dynamic);
        assert_eq!(s.mass, 1.0);
        assert_eq!(s.friction, 0.5);
        assert_eq!(s.angular_damping, 0.05);
        assert_eq!(s.layer, Layer::DEFAULT);
        assert!(s.start_active && s.allow_sleeping && !s.is_sensor);
    }

    #[test]
    fn test_set_static_moves_to_static_layer() {
        let s = BodySettings::new().set_static();
        assert_eq!(s.motion_type, MotionType::Static);
        assert_eq!(s.layer, Layer::STATIC);
    }
}
