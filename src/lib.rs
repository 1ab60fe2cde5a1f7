//! Orbit Engine: a real-time orbital flight simulation core.
//!
//! Authoritative state is double precision in world space. Rigid bodies live
//! in a 32-bit local bubble around a floating origin that follows a chosen
//! anchor, while a rails N-body simulator carries the celestial system and
//! time-warped flight.

pub mod config;
pub mod debug_draw;
pub mod error;
pub mod game;
pub mod gameplay;
pub mod games;
pub mod logging;
pub mod orbit;
pub mod physics;
pub mod runtime;
pub mod world;

pub use config::{EngineConfig, GameKind, LaunchOptions};
pub use error::{ConfigError, PhysicsError, ScenarioError};
pub use world::WorldVec3;
