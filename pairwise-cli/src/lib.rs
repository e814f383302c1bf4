pub mod commands;
pub mod types;
pub mod utils;
