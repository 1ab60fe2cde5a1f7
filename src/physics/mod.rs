/// Rigid-body physics interface
///
/// Provides:
/// - `PhysicsWorld` trait consumed by the game layer (local-space bodies)
/// - `RapierPhysicsWorld` backend
/// - `PhysicsContext` that owns the position and velocity origins
///
/// Bodies live in a 32-bit local bubble. Positions are exchanged as f64 so
/// the caller can add the physics origin without losing precision first.

pub mod body_settings;
pub mod context;
pub mod events;
pub mod layers;
pub mod query;
pub mod rapier_world;
pub mod shape;

use glam::{DVec3, Quat, Vec3};

pub use body_settings::{BodySettings, MotionType};
pub use context::PhysicsContext;
pub use events::{BodyCallbacks, CollisionEvent, ContactEventType, TriggerEvent};
pub use layers::{Layer, LayerMatrix, ALL_LAYERS, LAYER_COUNT};
pub use query::{QueryFilter, RayHit, RaycastOptions, SweepHit};
pub use rapier_world::RapierPhysicsWorld;
pub use shape::{CollisionShape, CompoundChild};

use crate::error::PhysicsError;

/// Handle to a body inside one physics world. Zero is the invalid handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct BodyId(pub u32);

impl BodyId {
    pub const INVALID: BodyId = BodyId(0);

    pub fn is_valid(self) -> bool {
        self.0 != 0
    }

    pub fn value(self) -> u32 {
        self.0
    }

    pub fn from_value(value: u32) -> Self {
        BodyId(value)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BodyTransform {
    pub position: DVec3,
    pub rotation: Quat,
}

impl Default for BodyTransform {
    fn default() -> Self {
        Self {
            position: DVec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

/// Read-only snapshot of one body, used by the collider overlay
#[derive(Debug, Clone, Copy)]
pub struct DebugBodyView<'a> {
    pub id: BodyId,
    pub shape: &'a CollisionShape,
    /// Local body position and rotation
    pub position: DVec3,
    pub rotation: Quat,
    pub motion_type: MotionType,
    pub layer: Layer,
    pub is_active: bool,
    pub is_sensor: bool,
}

/// Backend-agnostic rigid-body world.
///
/// Invalid ids are silent no-ops for setters; getters return zero / identity.
/// `shift_origin` and `shift_velocity_origin` must be called before `step`
/// in the tick they apply to.
pub trait PhysicsWorld {
    fn step(&mut self, dt: f32);

    fn create_body(&mut self, settings: &BodySettings) -> Result<BodyId, PhysicsError>;
    fn destroy_body(&mut self, id: BodyId);
    fn is_body_valid(&self, id: BodyId) -> bool;
    fn body_count(&self) -> usize;

    fn get_transform(&self, id: BodyId) -> BodyTransform;
    fn get_position(&self, id: BodyId) -> DVec3;
    fn get_rotation(&self, id: BodyId) -> Quat;
    fn get_linear_velocity(&self, id: BodyId) -> Vec3;
    fn get_angular_velocity(&self, id: BodyId) -> Vec3;
    fn get_user_data(&self, id: BodyId) -> u64;
    fn get_layer(&self, id: BodyId) -> Layer;
    fn is_active(&self, id: BodyId) -> bool;

    fn set_position(&mut self, id: BodyId, position: DVec3);
    fn set_rotation(&mut self, id: BodyId, rotation: Quat);
    fn set_transform(&mut self, id: BodyId, position: DVec3, rotation: Quat);
    fn set_linear_velocity(&mut self, id: BodyId, velocity: Vec3);
    fn set_angular_velocity(&mut self, id: BodyId, velocity: Vec3);
    fn add_force(&mut self, id: BodyId, force: Vec3);
    fn add_impulse(&mut self, id: BodyId, impulse: Vec3);
    fn add_torque(&mut self, id: BodyId, torque: Vec3);
    fn activate(&mut self, id: BodyId);
    fn deactivate(&mut self, id: BodyId);
    fn set_user_data(&mut self, id: BodyId, user_data: u64);

    /// Translate every body by `delta_local`.
    fn shift_origin(&mut self, delta_local: DVec3);
    /// Subtract `delta_local_velocity` from every body's linear velocity.
    fn shift_velocity_origin(&mut self, delta_local_velocity: DVec3);

    fn set_gravity(&mut self, gravity: Vec3);
    fn gravity(&self) -> Vec3;

    fn set_layer_collision(&mut self, a: Layer, b: Layer, should_collide: bool);
    fn layer_collides(&self, a: Layer, b: Layer) -> bool;

    fn raycast(&self, origin: DVec3, direction: Vec3, options: &RaycastOptions) -> RayHit;
    fn sweep_sphere(
        &self,
        radius: f32,
        start: DVec3,
        direction: Vec3,
        distance: f32,
        filter: &QueryFilter,
    ) -> SweepHit;
    fn sweep_capsule(
        &self,
        radius: f32,
        half_height: f32,
        start: DVec3,
        rotation: Quat,
        direction: Vec3,
        distance: f32,
        filter: &QueryFilter,
    ) -> SweepHit;
    fn overlap_sphere(&self, center: DVec3, radius: f32, filter: &QueryFilter) -> Vec<BodyId>;
    fn overlap_box(
        &self,
        center: DVec3,
        half_extents: Vec3,
        rotation: Quat,
        filter: &QueryFilter,
    ) -> Vec<BodyId>;

    fn set_body_callbacks(&mut self, id: BodyId, callbacks: BodyCallbacks);
    fn clear_body_callbacks(&mut self, id: BodyId);

    /// Visit every body in ascending id order
    fn for_each_debug_body(&self, visit: &mut dyn FnMut(&DebugBodyView<'_>));
}
