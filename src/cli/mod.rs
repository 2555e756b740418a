pub mod commands;
pub mod reset;
pub mod run;
pub mod status;
pub mod validate;

pub use commands::{Cli, Commands};
