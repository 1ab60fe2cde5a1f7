/// Game world: entities bound to render instances and physics bodies
///
/// The world owns the entity table, the physics backend and the floating
/// origin context. Render instances live in the caller's `SceneApi`, which is
/// passed in wherever instances are created, moved or removed.

use glam::{Quat, Vec3};
use tracing::{debug, warn};

use super::component::{Component, ComponentContext};
use super::entity::{EntityId, Transform};
use super::entity_manager::EntityManager;
use super::scene_api::{PrimitiveType, SceneApi};
use crate::physics::{BodyId, BodySettings, PhysicsContext, PhysicsWorld};
use crate::runtime::input::InputState;
use crate::world::{sanitize_rotation, WorldVec3};

/// Floating origin thresholds applied in `pre_physics_step`
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RebaseSettings {
    pub origin_threshold_m: f64,
    pub origin_snap_m: f64,
    /// Disabled unless > 0
    pub velocity_threshold_mps: f64,
}

impl Default for RebaseSettings {
    fn default() -> Self {
        Self {
            origin_threshold_m: 20_000.0,
            origin_snap_m: 10_000.0,
            velocity_threshold_mps: 0.0,
        }
    }
}

pub struct GameWorld {
    pub entities: EntityManager,
    pub physics: Option<Box<dyn PhysicsWorld>>,
    pub context: PhysicsContext,
    rebase_anchor: EntityId,
    rebase_settings: RebaseSettings,
}

impl Default for GameWorld {
    fn default() -> Self {
        Self::new(None)
    }
}

/// Reborrow a boxed backend as a plain trait object
pub(crate) fn physics_ref(physics: &mut Option<Box<dyn PhysicsWorld>>) -> Option<&mut dyn PhysicsWorld> {
    match physics {
        Some(p) => Some(p.as_mut() as &mut dyn PhysicsWorld),
        None => None,
    }
}

impl GameWorld {
    pub fn new(physics: Option<Box<dyn PhysicsWorld>>) -> Self {
        Self {
            entities: EntityManager::new(),
            physics,
            context: PhysicsContext::new(),
            rebase_anchor: EntityId::INVALID,
            rebase_settings: RebaseSettings::default(),
        }
    }

    pub fn set_physics(&mut self, physics: Option<Box<dyn PhysicsWorld>>) {
        self.physics = physics;
    }

    pub fn physics_mut(&mut self) -> Option<&mut dyn PhysicsWorld> {
        physics_ref(&mut self.physics)
    }

    pub fn physics(&self) -> Option<&dyn PhysicsWorld> {
        self.physics.as_deref()
    }

    pub fn origin_world(&self) -> WorldVec3 {
        self.context.origin_world()
    }

    pub fn rebase_settings(&self) -> RebaseSettings {
        self.rebase_settings
    }

    pub fn set_rebase_settings(&mut self, settings: RebaseSettings) {
        self.rebase_settings = settings;
    }

    pub fn rebase_anchor(&self) -> EntityId {
        self.rebase_anchor
    }

    /// Fails if the entity does not exist
    pub fn set_rebase_anchor(&mut self, id: EntityId) -> bool {
        if !self.entities.exists(id) {
            return false;
        }
        self.rebase_anchor = id;
        true
    }

    pub fn clear_rebase_anchor(&mut self) {
        self.rebase_anchor = EntityId::INVALID;
        self.context.clear_anchor();
    }

    pub fn builder(&mut self, name: &str) -> EntityBuilder<'_> {
        EntityBuilder::new(self, name)
    }

    // ------------------------------------------------------------------------
    // Binding
    // ------------------------------------------------------------------------

    /// Point an existing entity at a render instance
    pub fn bind_render(&mut self, id: EntityId, render_name: &str) -> bool {
        match self.entities.find_mut(id) {
            Some(e) => {
                e.render_name = (!render_name.is_empty()).then(|| render_name.to_string());
                true
            }
            None => false,
        }
    }

    /// Adopt a body created elsewhere. The entity takes the body's current pose.
    pub fn bind_physics(&mut self, id: EntityId, body: BodyId, use_interpolation: bool, override_user_data: bool) -> bool {
        let origin = self.context.origin_world();
        let Some(physics) = self.physics.as_deref_mut() else {
            return false;
        };
        if !physics.is_body_valid(body) {
            return false;
        }
        let Some(entity) = self.entities.find_mut(id) else {
            return false;
        };

        let t = physics.get_transform(body);
        entity.physics_body = Some(body);
        entity.use_interpolation = use_interpolation;
        entity.transform.position_world = origin + t.position;
        entity.transform.rotation = t.rotation;
        entity
            .interpolation
            .set_immediate(entity.transform.position_world, t.rotation);
        if override_user_data {
            physics.set_user_data(body, u64::from(id.0));
        }
        true
    }

    // ------------------------------------------------------------------------
    // Destruction
    // ------------------------------------------------------------------------

    /// Tear down components, render instance and body, then the entity
    pub fn destroy_entity(&mut self, scene: &mut SceneApi, id: EntityId) -> bool {
        if !self.entities.exists(id) {
            return false;
        }

        {
            let mut ctx = ComponentContext::new(None, physics_ref(&mut self.physics));
            self.entities.destroy_components(id, &mut ctx);
        }

        let (render_name, body) = match self.entities.find(id) {
            Some(e) => (e.render_name.clone(), e.physics_body),
            None => (None, None),
        };
        if let Some(name) = render_name {
            scene.remove_mesh_instance(&name);
        }
        if let (Some(body), Some(physics)) = (body, self.physics.as_deref_mut()) {
            physics.destroy_body(body);
        }
        if self.rebase_anchor == id {
            self.clear_rebase_anchor();
        }
        self.entities.destroy_entity(id)
    }

    pub fn clear(&mut self, scene: &mut SceneApi) {
        for id in self.entities.ids() {
            self.destroy_entity(scene, id);
        }
        self.entities.clear();
        self.clear_rebase_anchor();
    }

    // ------------------------------------------------------------------------
    // Per-tick
    // ------------------------------------------------------------------------

    pub fn update(&mut self, input: Option<&InputState>, dt: f32) {
        let mut ctx = ComponentContext::new(input, physics_ref(&mut self.physics));
        self.entities.update_components(&mut ctx, dt);
    }

    pub fn fixed_update(&mut self, input: Option<&InputState>, fixed_dt: f32) {
        let mut ctx = ComponentContext::new(input, physics_ref(&mut self.physics));
        self.entities.fixed_update_components(&mut ctx, fixed_dt);
    }

    /// Snapshot interpolation state and rebase the origins onto the anchor.
    /// Must run before `PhysicsWorld::step` in the same tick.
    pub fn pre_physics_step(&mut self) {
        self.entities.pre_physics_step();

        let body = match self.entities.find(self.rebase_anchor) {
            Some(e) => e.body_id(),
            None => return,
        };
        let Some(physics) = self.physics.as_deref_mut() else {
            return;
        };
        let settings = self.rebase_settings;

        self.context.maybe_rebase_origin_to_body(
            physics,
            body,
            settings.origin_threshold_m,
            settings.origin_snap_m,
        );
        if settings.velocity_threshold_mps > 0.0 {
            self.context
                .maybe_rebase_velocity_to_body(physics, body, settings.velocity_threshold_mps);
        }
    }

    pub fn post_physics_step(&mut self) {
        let origin = self.context.origin_world();
        if let Some(physics) = self.physics.as_deref() {
            self.entities.post_physics_step(physics, origin);
        }
    }

    pub fn sync_to_render(&self, scene: &mut SceneApi, alpha: f64) {
        self.entities.sync_to_render(scene, alpha);
    }

    pub fn teleport(&mut self, id: EntityId, position_world: WorldVec3, rotation: Quat) -> bool {
        let origin = self.context.origin_world();
        self.entities
            .teleport(id, position_world, rotation, physics_ref(&mut self.physics), origin)
    }
}

/// Fluent entity construction. `build` either binds every requested resource
/// or rolls back and returns `None`.
pub struct EntityBuilder<'w> {
    world: &'w mut GameWorld,
    name: String,
    transform: Transform,
    primitive: Option<PrimitiveType>,
    render_name: Option<String>,
    body: Option<BodySettings>,
    interpolate: bool,
    components: Vec<Box<dyn Component>>,
}

impl<'w> EntityBuilder<'w> {
    fn new(world: &'w mut GameWorld, name: &str) -> Self {
        Self {
            world,
            name: name.to_string(),
            transform: Transform::default(),
            primitive: None,
            render_name: None,
            body: None,
            interpolate: true,
            components: Vec::new(),
        }
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn position(mut self, position_world: WorldVec3) -> Self {
        self.transform.position_world = position_world;
        self
    }

    pub fn rotation(mut self, rotation: Quat) -> Self {
        self.transform.rotation = rotation;
        self
    }

    pub fn scale(mut self, scale: Vec3) -> Self {
        self.transform.scale = scale;
        self
    }

    pub fn render_primitive(mut self, primitive: PrimitiveType) -> Self {
        self.primitive = Some(primitive);
        self
    }

    /// Instance name; defaults to the entity name
    pub fn render_name(mut self, name: &str) -> Self {
        self.render_name = Some(name.to_string());
        self
    }

    pub fn physics(mut self, settings: BodySettings) -> Self {
        self.body = Some(settings);
        self
    }

    pub fn interpolate(mut self, enabled: bool) -> Self {
        self.interpolate = enabled;
        self
    }

    pub fn component<C: Component>(mut self, component: C) -> Self {
        self.components.push(Box::new(component));
        self
    }

    pub fn build(self, scene: &mut SceneApi) -> Option<EntityId> {
        let EntityBuilder {
            world,
            name,
            mut transform,
            primitive,
            render_name,
            body,
            interpolate,
            components,
        } = self;

        let Some(id) = world.entities.create_entity(&name) else {
            warn!("Entity name '{}' already in use", name);
            return None;
        };

        transform.rotation = sanitize_rotation(transform.rotation);
        if let Some(entity) = world.entities.find_mut(id) {
            entity.transform = transform;
            entity.use_interpolation = interpolate;
            entity
                .interpolation
                .set_immediate(transform.position_world, transform.rotation);
        }

        // Render instance
        let mut bound_render: Option<String> = None;
        if let Some(primitive) = primitive {
            let instance = render_name
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| if name.is_empty() { format!("entity_{}", id.0) } else { name.clone() });
            if !scene.add_mesh_instance(&instance, primitive, transform.position_world, transform.rotation, transform.scale) {
                warn!("Render instance '{}' could not be created", instance);
                world.entities.destroy_entity(id);
                return None;
            }
            if let Some(entity) = world.entities.find_mut(id) {
                entity.render_name = Some(instance.clone());
            }
            bound_render = Some(instance);
        }

        // Physics body
        if let Some(mut settings) = body {
            let origin = world.context.origin_world();
            let created = match world.physics.as_deref_mut() {
                Some(physics) => {
                    settings.position = transform.position_world - origin;
                    settings.rotation = transform.rotation;
                    settings.user_data = u64::from(id.0);
                    physics.create_body(&settings).map_err(|e| e.to_string())
                }
                None => Err("no physics world".to_string()),
            };
            match created {
                Ok(body) => {
                    if let Some(entity) = world.entities.find_mut(id) {
                        entity.physics_body = Some(body);
                    }
                }
                Err(e) => {
                    warn!("Body for entity '{}' failed: {}", name, e);
                    if let Some(instance) = bound_render {
                        scene.remove_mesh_instance(&instance);
                    }
                    world.entities.destroy_entity(id);
                    return None;
                }
            }
        }

        let mut rejected = 0usize;
        for component in components {
            if !world.entities.add_component_boxed(id, component) {
                rejected += 1;
            }
        }
        if rejected > 0 {
            warn!("Entity '{}' dropped {} duplicate component(s)", name, rejected);
        }
        let mut ctx = ComponentContext::new(None, physics_ref(&mut world.physics));
        if let Some((entity, list)) = world.entities.find_with_components_mut(id) {
            list.init_all(entity, &mut ctx);
        }

        debug!("Spawned entity {} '{}'", id.0, name);
        Some(id)
    }
}
