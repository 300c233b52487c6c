pub mod position;
pub mod utils;
