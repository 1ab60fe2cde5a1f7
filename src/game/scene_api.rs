/// Render-facing scene surface
///
/// Holds named primitive instances in world space plus the debug-draw queue.
/// `build_render_list` is the only way instance data leaves this module and it
/// is always single precision, relative to the camera/physics origin.

use std::collections::BTreeMap;

use glam::{Mat4, Quat, Vec3};
use serde::{Deserialize, Serialize};

use super::entity_manager::RenderSink;
use crate::debug_draw::{DebugDrawSystem, LineVertexLists};
use crate::world::{sanitize_rotation, world_to_local, WorldVec3};

/// Built-in meshes the scene can instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveType {
    #[default]
    Cube,
    Sphere,
    Plane,
    Capsule,
}

impl PrimitiveType {
    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Cube => "cube",
            PrimitiveType::Sphere => "sphere",
            PrimitiveType::Plane => "plane",
            PrimitiveType::Capsule => "capsule",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "cube" => Some(PrimitiveType::Cube),
            "sphere" => Some(PrimitiveType::Sphere),
            "plane" => Some(PrimitiveType::Plane),
            "capsule" => Some(PrimitiveType::Capsule),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct MeshInstance {
    pub primitive: PrimitiveType,
    pub position_world: WorldVec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

/// One instance ready for submission
#[derive(Debug, Clone, PartialEq)]
pub struct RenderItem {
    pub name: String,
    pub primitive: PrimitiveType,
    pub model: Mat4,
}

/// Main camera in world space
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    pub position_world: WorldVec3,
    pub rotation: Quat,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            position_world: WorldVec3::ZERO,
            rotation: Quat::IDENTITY,
        }
    }
}

impl Camera {
    pub fn forward(&self) -> Vec3 {
        self.rotation * Vec3::NEG_Z
    }

    pub fn up(&self) -> Vec3 {
        self.rotation * Vec3::Y
    }
}

#[derive(Default)]
pub struct SceneApi {
    instances: BTreeMap<String, MeshInstance>,
    debug_draw: DebugDrawSystem,
    /// Floating origin used for every render-side conversion
    world_origin: WorldVec3,
    pub camera: Camera,
}

impl SceneApi {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a primitive instance. Fails if the name is empty or already used.
    pub fn add_mesh_instance(
        &mut self,
        name: &str,
        primitive: PrimitiveType,
        position_world: WorldVec3,
        rotation: Quat,
        scale: Vec3,
    ) -> bool {
        if name.is_empty() || self.instances.contains_key(name) {
            return false;
        }
        self.instances.insert(
            name.to_string(),
            MeshInstance {
                primitive,
                position_world,
                rotation: sanitize_rotation(rotation),
                scale,
            },
        );
        true
    }

    pub fn remove_mesh_instance(&mut self, name: &str) -> bool {
        self.instances.remove(name).is_some()
    }

    pub fn has_instance(&self, name: &str) -> bool {
        self.instances.contains_key(name)
    }

    pub fn instance(&self, name: &str) -> Option<&MeshInstance> {
        self.instances.get(name)
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    pub fn clear_instances(&mut self) {
        self.instances.clear();
    }

    pub fn world_origin(&self) -> WorldVec3 {
        self.world_origin
    }

    /// Games keep this in step with the physics origin
    pub fn set_world_origin(&mut self, origin: WorldVec3) {
        if crate::world::is_finite(origin) {
            self.world_origin = origin;
        }
    }

    pub fn camera_local_position(&self) -> Vec3 {
        world_to_local(self.camera.position_world, self.world_origin)
    }

    pub fn debug_draw(&self) -> &DebugDrawSystem {
        &self.debug_draw
    }

    pub fn debug_draw_mut(&mut self) -> &mut DebugDrawSystem {
        &mut self.debug_draw
    }

    pub fn debug_draw_enabled(&self) -> bool {
        self.debug_draw.settings.enabled
    }

    pub fn set_debug_draw_enabled(&mut self, enabled: bool) {
        self.debug_draw.settings.enabled = enabled;
    }

    /// Model matrices relative to `origin_world`, sorted by instance name
    pub fn build_render_list(&self, origin_world: WorldVec3) -> Vec<RenderItem> {
        self.instances
            .iter()
            .map(|(name, inst)| RenderItem {
                name: name.clone(),
                primitive: inst.primitive,
                model: Mat4::from_scale_rotation_translation(
                    inst.scale,
                    inst.rotation,
                    world_to_local(inst.position_world, origin_world),
                ),
            })
            .collect()
    }

    /// Debug lines in the same local frame as `build_render_list`
    pub fn build_debug_lines(&self, origin_world: WorldVec3) -> LineVertexLists {
        if !self.debug_draw.settings.enabled {
            return LineVertexLists::default();
        }
        self.debug_draw.build_line_vertices(origin_world)
    }
}

impl RenderSink for SceneApi {
    fn set_instance_transform(&mut self, name: &str, position_world: WorldVec3, rotation: Quat, scale: Vec3) -> bool {
        match self.instances.get_mut(name) {
            Some(inst) => {
                inst.position_world = position_world;
                inst.rotation = sanitize_rotation(rotation);
                inst.scale = scale;
                true
            }
            None => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_render_list_is_origin_relative() {
        let mut scene = SceneApi::new();
        assert!(scene.add_mesh_instance("ship", PrimitiveType::Capsule, DVec3::new(1.0e12 + 5.0, 0.0, 0.0), Quat::IDENTITY, Vec3::ONE));
        assert!(!scene.add_mesh_instance("ship", PrimitiveType::Cube, DVec3::ZERO, Quat::IDENTITY, Vec3::ONE));

        let items = scene.build_render_list(DVec3::new(1.0e12, 0.0, 0.0));
        assert_eq!(items.len(), 1);
        let t = items[0].model.w_axis;
        assert!((t.x - 5.0).abs() < 1e-6);
    }
}
