pub mod connection;
pub mod schema;
pub mod pages;
pub mod findings;
pub mod authors;
pub mod assignments;
pub mod tasks;

pub use connection::Database;
pub use findings::FindingOutcome;
pub use tasks::StoreCounts;
