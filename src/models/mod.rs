pub mod events;
pub mod game_state;
pub mod memory;
