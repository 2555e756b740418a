pub mod credentials;
pub mod parser;
pub mod schema;
pub mod types;

pub use parser::{load_config, parse_config};
pub use types::*;
