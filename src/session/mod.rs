//! One actor per game, driven by the game's state stream.

pub mod game_handlers;
pub mod handler;
