/// Entity storage
///
/// Entities live in a `hecs::World` as an (`Entity`, `ComponentList`) pair.
/// An id index and a name index give O(1) lookup; `order` keeps creation
/// order so every sweep over the entities is deterministic.

use std::collections::HashMap;

use glam::{Quat, Vec3};

use super::component::{Component, ComponentContext, ComponentList};
use super::entity::{Entity, EntityId};
use crate::physics::{BodyId, PhysicsWorld};
use crate::world::WorldVec3;

/// Receiver of interpolated world-space poses (the render scene)
pub trait RenderSink {
    fn set_instance_transform(&mut self, name: &str, position_world: WorldVec3, rotation: Quat, scale: Vec3) -> bool;
}

pub struct EntityManager {
    world: hecs::World,
    index: HashMap<EntityId, hecs::Entity>,
    names: HashMap<String, EntityId>,
    order: Vec<EntityId>,
    next_id: u32,
}

impl Default for EntityManager {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityManager {
    pub fn new() -> Self {
        Self {
            world: hecs::World::new(),
            index: HashMap::new(),
            names: HashMap::new(),
            order: Vec::new(),
            next_id: 1,
        }
    }

    /// Create an entity. Returns `None` if `name` is non-empty and taken.
    pub fn create_entity(&mut self, name: &str) -> Option<EntityId> {
        if !name.is_empty() && self.names.contains_key(name) {
            return None;
        }
        let id = EntityId(self.next_id);
        self.next_id += 1;

        let handle = self.world.spawn((Entity::new(id, name), ComponentList::new()));
        self.index.insert(id, handle);
        if !name.is_empty() {
            self.names.insert(name.to_string(), id);
        }
        self.order.push(id);
        Some(id)
    }

    pub fn destroy_entity(&mut self, id: EntityId) -> bool {
        let Some(handle) = self.index.remove(&id) else {
            return false;
        };
        if let Ok(entity) = self.world.get::<&Entity>(handle) {
            if !entity.name().is_empty() {
                self.names.remove(entity.name());
            }
        }
        let _ = self.world.despawn(handle);
        self.order.retain(|e| *e != id);
        true
    }

    pub fn destroy_by_name(&mut self, name: &str) -> bool {
        match self.names.get(name).copied() {
            Some(id) => self.destroy_entity(id),
            None => false,
        }
    }

    pub fn clear(&mut self) {
        self.world.clear();
        self.index.clear();
        self.names.clear();
        self.order.clear();
    }

    pub fn count(&self) -> usize {
        self.order.len()
    }

    pub fn exists(&self, id: EntityId) -> bool {
        self.index.contains_key(&id)
    }

    pub fn name_exists(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Ids in creation order
    pub fn ids(&self) -> Vec<EntityId> {
        self.order.clone()
    }

    pub fn find(&self, id: EntityId) -> Option<hecs::Ref<'_, Entity>> {
        let handle = *self.index.get(&id)?;
        self.world.get::<&Entity>(handle).ok()
    }

    pub fn find_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        let handle = *self.index.get(&id)?;
        self.world.query_one_mut::<&mut Entity>(handle).ok()
    }

    /// Entity plus its component list, borrowed together
    pub fn find_with_components_mut(&mut self, id: EntityId) -> Option<(&mut Entity, &mut ComponentList)> {
        let handle = *self.index.get(&id)?;
        self.world
            .query_one_mut::<(&mut Entity, &mut ComponentList)>(handle)
            .ok()
    }

    pub fn find_by_name(&self, name: &str) -> Option<EntityId> {
        self.names.get(name).copied()
    }

    pub fn find_by_physics_body(&self, body: BodyId) -> Option<EntityId> {
        if !body.is_valid() {
            return None;
        }
        self.order.iter().copied().find(|id| {
            self.find(*id)
                .map(|e| e.physics_body == Some(body))
                .unwrap_or(false)
        })
    }

    pub fn find_by_render_name(&self, render_name: &str) -> Option<EntityId> {
        self.order.iter().copied().find(|id| {
            self.find(*id)
                .map(|e| e.render_name.as_deref() == Some(render_name))
                .unwrap_or(false)
        })
    }

    pub fn rename(&mut self, id: EntityId, new_name: &str) -> bool {
        if !new_name.is_empty() && self.names.get(new_name).is_some_and(|other| *other != id) {
            return false;
        }
        let Some(entity) = self.find_mut(id) else {
            return false;
        };
        let old = entity.name().to_string();
        entity.set_name(new_name.to_string());
        if !old.is_empty() {
            self.names.remove(&old);
        }
        if !new_name.is_empty() {
            self.names.insert(new_name.to_string(), id);
        }
        true
    }

    /// Visit every entity in creation order
    pub fn for_each(&self, mut f: impl FnMut(&Entity)) {
        for id in &self.order {
            if let Some(e) = self.find(*id) {
                f(&e);
            }
        }
    }

    pub fn for_each_mut(&mut self, mut f: impl FnMut(&mut Entity)) {
        for id in self.order.clone() {
            if let Some(e) = self.find_mut(id) {
                f(e);
            }
        }
    }

    // ------------------------------------------------------------------------
    // Components
    // ------------------------------------------------------------------------

    /// Rejects a second component of the same type
    pub fn add_component<T: Component>(&mut self, id: EntityId, component: T) -> bool {
        match self.find_with_components_mut(id) {
            Some((_, list)) => list.add(component),
            None => false,
        }
    }

    pub fn add_component_boxed(&mut self, id: EntityId, component: Box<dyn Component>) -> bool {
        match self.find_with_components_mut(id) {
            Some((_, list)) => list.add_boxed(component),
            None => false,
        }
    }

    /// Read a component through a closure; `None` if the entity or component is missing
    pub fn with_component<T: Component, R>(&self, id: EntityId, f: impl FnOnce(&T) -> R) -> Option<R> {
        let handle = *self.index.get(&id)?;
        let list = self.world.get::<&ComponentList>(handle).ok()?;
        list.get::<T>().map(f)
    }

    pub fn get_component_mut<T: Component>(&mut self, id: EntityId) -> Option<&mut T> {
        self.find_with_components_mut(id)
            .and_then(|(_, list)| list.get_mut::<T>())
    }

    pub fn has_component<T: Component>(&self, id: EntityId) -> bool {
        self.index
            .get(&id)
            .and_then(|h| self.world.get::<&ComponentList>(*h).ok())
            .map(|l| l.has::<T>())
            .unwrap_or(false)
    }

    pub fn remove_component<T: Component>(&mut self, id: EntityId) -> bool {
        self.find_with_components_mut(id)
            .and_then(|(_, list)| list.remove::<T>())
            .is_some()
    }

    pub fn update_components(&mut self, ctx: &mut ComponentContext, dt: f32) {
        for id in self.order.clone() {
            if let Some((entity, list)) = self.find_with_components_mut(id) {
                if entity.active {
                    list.update_all(entity, ctx, dt);
                }
            }
        }
    }

    pub fn fixed_update_components(&mut self, ctx: &mut ComponentContext, fixed_dt: f32) {
        for id in self.order.clone() {
            if let Some((entity, list)) = self.find_with_components_mut(id) {
                if entity.active {
                    list.fixed_update_all(entity, ctx, fixed_dt);
                }
            }
        }
    }

    pub fn destroy_components(&mut self, id: EntityId, ctx: &mut ComponentContext) {
        if let Some((entity, list)) = self.find_with_components_mut(id) {
            list.destroy_all(entity, ctx);
        }
    }

    // ------------------------------------------------------------------------
    // Physics synchronisation
    // ------------------------------------------------------------------------

    /// curr -> prev for every active interpolated entity
    pub fn pre_physics_step(&mut self) {
        for (_, entity) in self.world.query_mut::<&mut Entity>() {
            if entity.active && entity.use_interpolation {
                entity.interpolation.store_current_as_previous();
            }
        }
    }

    /// Pull body poses back into world-space entity transforms
    pub fn post_physics_step(&mut self, physics: &dyn PhysicsWorld, origin_world: WorldVec3) {
        for (_, entity) in self.world.query_mut::<&mut Entity>() {
            if !entity.active {
                continue;
            }
            let Some(body) = entity.physics_body else {
                continue;
            };
            if !physics.is_body_valid(body) {
                continue;
            }
            let t = physics.get_transform(body);
            let position_world = origin_world + t.position;
            entity.transform.position_world = position_world;
            entity.transform.rotation = t.rotation;
            if entity.use_interpolation {
                entity.interpolation.curr_position = position_world;
                entity.interpolation.curr_rotation = t.rotation;
            }
        }
    }

    /// Push interpolated world-space poses to the render sink
    pub fn sync_to_render(&self, sink: &mut dyn RenderSink, alpha: f64) {
        for id in &self.order {
            let Some(entity) = self.find(*id) else {
                continue;
            };
            if !entity.active || !entity.visible || !entity.has_render() {
                continue;
            }
            if let Some(name) = entity.render_name.as_deref() {
                sink.set_instance_transform(
                    name,
                    entity.render_position_world(alpha),
                    entity.render_rotation(alpha),
                    entity.scale(),
                );
            }
        }
    }

    /// Set the transform, reset interpolation, and move the body (zeroing its velocities)
    pub fn teleport(
        &mut self,
        id: EntityId,
        position_world: WorldVec3,
        rotation: Quat,
        physics: Option<&mut dyn PhysicsWorld>,
        origin_world: WorldVec3,
    ) -> bool {
        let Some(entity) = self.find_mut(id) else {
            return false;
        };
        let rotation = crate::world::sanitize_rotation(rotation);
        entity.transform.position_world = position_world;
        entity.transform.rotation = rotation;
        if entity.use_interpolation {
            entity.interpolation.set_immediate(position_world, rotation);
        }

        let body = entity.body_id();
        if let Some(physics) = physics {
            if physics.is_body_valid(body) {
                physics.set_transform(body, position_world - origin_world, rotation);
                physics.set_linear_velocity(body, Vec3::ZERO);
                physics.set_angular_velocity(body, Vec3::ZERO);
                physics.activate(body);
            }
        }
        true
    }

    pub fn reset_interpolation(&mut self) {
        for (_, entity) in self.world.query_mut::<&mut Entity>() {
            if entity.use_interpolation {
                let (p, r) = (entity.transform.position_world, entity.transform.rotation);
                entity.interpolation.set_immediate(p, r);
            }
        }
    }
}
