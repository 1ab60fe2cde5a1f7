/// Contact and trigger events delivered to per-body callbacks

use glam::Vec3;

use super::layers::Layer;
use super::BodyId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContactEventType {
    Begin,
    Stay,
    End,
}

/// Collision between two solid bodies, reported from `self_body`'s point of view.
/// `normal` points from self towards other.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CollisionEvent {
    pub event_type: ContactEventType,
    pub self_body: BodyId,
    pub other_body: BodyId,
    pub self_sub_shape: u32,
    pub other_sub_shape: u32,
    /// Contact point in the physics local frame
    pub point: Vec3,
    pub normal: Vec3,
    pub penetration_depth: f32,
    pub self_user_data: u64,
    pub other_user_data: u64,
    pub self_layer: Layer,
    pub other_layer: Layer,
}

impl CollisionEvent {
    /// Same contact seen from the other participant
    pub fn mirrored(&self) -> Self {
        Self {
            event_type: self.event_type,
            self_body: self.other_body,
            other_body: self.self_body,
            self_sub_shape: self.other_sub_shape,
            other_sub_shape: self.self_sub_shape,
            point: self.point,
            normal: -self.normal,
            penetration_depth: self.penetration_depth,
            self_user_data: self.other_user_data,
            other_user_data: self.self_user_data,
            self_layer: self.other_layer,
            other_layer: self.self_layer,
        }
    }
}

/// Overlap involving at least one sensor body
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TriggerEvent {
    pub event_type: ContactEventType,
    pub self_body: BodyId,
    pub other_body: BodyId,
    pub self_sub_shape: u32,
    pub other_sub_shape: u32,
    pub self_user_data: u64,
    pub other_user_data: u64,
    pub self_layer: Layer,
    pub other_layer: Layer,
}

impl TriggerEvent {
    pub fn mirrored(&self) -> Self {
        Self {
            event_type: self.event_type,
            self_body: self.other_body,
            other_body: self.self_body,
            self_sub_shape: self.other_sub_shape,
            other_sub_shape: self.self_sub_shape,
            self_user_data: self.other_user_data,
            other_user_data: self.self_user_data,
            self_layer: self.other_layer,
            other_layer: self.self_layer,
        }
    }
}

pub type CollisionCallback = Box<dyn FnMut(&CollisionEvent)>;
pub type TriggerCallback = Box<dyn FnMut(&TriggerEvent)>;

/// Callbacks registered for a single body
#[derive(Default)]
pub struct BodyCallbacks {
    pub on_collision: Option<CollisionCallback>,
    pub on_trigger: Option<TriggerCallback>,
}

impl BodyCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_collision(mut self, f: impl FnMut(&CollisionEvent) + 'static) -> Self {
        self.on_collision = Some(Box::new(f));
        self
    }

    pub fn with_trigger(mut self, f: impl FnMut(&TriggerEvent) + 'static) -> Self {
        self.on_trigger = Some(Box::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.on_collision.is_none() && self.on_trigger.is_none()
    }
}

impl std::fmt::Debug for BodyCallbacks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BodyCallbacks")
            .field("on_collision", &self.on_collision.is_some())
            .field("on_trigger", &self.on_trigger.is_some())
            .finish()
    }
}
