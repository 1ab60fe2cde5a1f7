//! Games selectable with `--game=`

pub mod example;
pub mod rebasing_test;
pub mod space_combat;

pub use example::ExampleGame;
pub use rebasing_test::{RebaseStats, RebasingTestGame};
pub use space_combat::SpaceCombatGame;

use crate::config::GameKind;
use crate::runtime::GameCallbacks;

pub fn create_game(kind: GameKind) -> Box<dyn GameCallbacks> {
    match kind {
        GameKind::Example => Box::new(ExampleGame::new()),
        GameKind::RebasingTest => Box::new(RebasingTestGame::new()),
        GameKind::SpaceCombat => Box::new(SpaceCombatGame::new()),
    }
}
