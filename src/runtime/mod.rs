//! Frame orchestration: clock, input, platform and the outer loop

pub mod game_runtime;
pub mod input;
pub mod platform;
pub mod time_manager;

pub use game_runtime::{AudioSystem, GameCallbacks, Runtime};
pub use input::InputState;
pub use platform::{HeadlessPlatform, Platform};
pub use time_manager::TimeManager;
