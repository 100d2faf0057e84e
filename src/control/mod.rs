mod desk;
mod dissolve;
mod player;
mod possible_actions;
mod registry;
mod round;
mod runner;
mod wall;

#[cfg(test)]
mod test;

pub use desk::{Candidate, ClaimKind, ClaimWindow, Desk, DeskConfig, DeskMessage, Wait};
pub use dissolve::DissolveContext;
pub use player::{DeskPlayer, PlayerContext, WinRecord};
pub use possible_actions::{calc_claim_hint, calc_turn_hint};
pub use registry::DeskRegistry;
pub use runner::{spawn_desk, DeskHandle};
pub use wall::{create_wall, create_wall_debug, new_deck};
