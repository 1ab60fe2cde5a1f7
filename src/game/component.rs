/// Entity behaviours
///
/// Components are stored per entity in insertion order and looked up by
/// their concrete type. At most one component of each type per entity.

use std::any::{Any, TypeId};

use super::entity::Entity;
use crate::physics::PhysicsWorld;
use crate::runtime::input::InputState;

/// Shared data handed to every component callback
pub struct ComponentContext<'a> {
    pub input: Option<&'a InputState>,
    pub physics: Option<&'a mut dyn PhysicsWorld>,
    pub ui_capture_keyboard: bool,
    pub interpolation_alpha: f64,
}

impl<'a> ComponentContext<'a> {
    pub fn new(input: Option<&'a InputState>, physics: Option<&'a mut dyn PhysicsWorld>) -> Self {
        Self {
            input,
            ui_capture_keyboard: input.map(|i| i.ui_capture_keyboard).unwrap_or(false),
            physics,
            interpolation_alpha: 0.0,
        }
    }
}

pub trait Component: Any + Send + Sync {
    fn on_init(&mut self, _entity: &mut Entity, _ctx: &mut ComponentContext) {}

    /// Variable rate; input-driven logic
    fn on_update(&mut self, _entity: &mut Entity, _ctx: &mut ComponentContext, _dt: f32) {}

    /// Fixed rate; anything that applies forces belongs here
    fn on_fixed_update(&mut self, _entity: &mut Entity, _ctx: &mut ComponentContext, _fixed_dt: f32) {}

    fn on_destroy(&mut self, _entity: &mut Entity, _ctx: &mut ComponentContext) {}

    fn is_enabled(&self) -> bool {
        true
    }

    fn as_any(&self) -> &dyn Any;
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Per-entity component storage (hecs component)
#[derive(Default)]
pub struct ComponentList {
    items: Vec<(TypeId, Box<dyn Component>)>,
}

impl ComponentList {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Rejects a second component of the same type
    pub fn add<T: Component>(&mut self, component: T) -> bool {
        self.add_boxed(Box::new(component))
    }

    pub fn add_boxed(&mut self, component: Box<dyn Component>) -> bool {
        let tag = component.as_any().type_id();
        if self.items.iter().any(|(t, _)| *t == tag) {
            return false;
        }
        self.items.push((tag, component));
        true
    }

    pub fn get<T: Component>(&self) -> Option<&T> {
        let tag = TypeId::of::<T>();
        self.items
            .iter()
            .find(|(t, _)| *t == tag)
            .and_then(|(_, c)| c.as_any().downcast_ref::<T>())
    }

    pub fn get_mut<T: Component>(&mut self) -> Option<&mut T> {
        let tag = TypeId::of::<T>();
        self.items
            .iter_mut()
            .find(|(t, _)| *t == tag)
            .and_then(|(_, c)| c.as_any_mut().downcast_mut::<T>())
    }

    pub fn has<T: Component>(&self) -> bool {
        let tag = TypeId::of::<T>();
        self.items.iter().any(|(t, _)| *t == tag)
    }

    pub fn remove<T: Component>(&mut self) -> Option<Box<dyn Component>> {
        let tag = TypeId::of::<T>();
        let index = self.items.iter().position(|(t, _)| *t == tag)?;
        Some(self.items.remove(index).1)
    }

    pub fn init_all(&mut self, entity: &mut Entity, ctx: &mut ComponentContext) {
        for (_, c) in self.items.iter_mut() {
            c.on_init(entity, ctx);
        }
    }

    pub fn update_all(&mut self, entity: &mut Entity, ctx: &mut ComponentContext, dt: f32) {
        for (_, c) in self.items.iter_mut() {
            if c.is_enabled() {
                c.on_update(entity, ctx, dt);
            }
        }
    }

    pub fn fixed_update_all(&mut self, entity: &mut Entity, ctx: &mut ComponentContext, fixed_dt: f32) {
        for (_, c) in self.items.iter_mut() {
            if c.is_enabled() {
                c.on_fixed_update(entity, ctx, fixed_dt);
            }
        }
    }

    pub fn destroy_all(&mut self, entity: &mut Entity, ctx: &mut ComponentContext) {
        for (_, c) in self.items.iter_mut().rev() {
            c.on_destroy(entity, ctx);
        }
        self.items.clear();
    }
}
