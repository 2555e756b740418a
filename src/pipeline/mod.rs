pub mod audit;
pub mod auth;
pub mod authorship;
pub mod compose;
pub mod orchestrator;
pub mod phase;
pub mod registry;
pub mod state;

pub use orchestrator::{Collaborators, PipelineOrchestrator};
pub use state::{PhaseName, PipelineConfig, RunSummary};
