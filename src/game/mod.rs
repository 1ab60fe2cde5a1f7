//! Game layer: entities, components and the world that binds them to
//! physics bodies and render instances.

pub mod component;
pub mod entity;
pub mod entity_manager;
pub mod game_world;
pub mod scene_api;
pub mod ship_controller;

pub use component::{Component, ComponentContext, ComponentList};
pub use entity::{Entity, EntityId, InterpolatedTransform, Transform};
pub use entity_manager::{EntityManager, RenderSink};
pub use game_world::{EntityBuilder, GameWorld, RebaseSettings};
pub use scene_api::{Camera, MeshInstance, PrimitiveType, RenderItem, SceneApi};
pub use ship_controller::ShipController;
