pub mod session;
pub mod utils;
pub mod workflow_logger;

pub use session::{JournalEvent, RunJournal};
