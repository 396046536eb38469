pub mod campaign;
pub mod orchestrator;

pub use campaign::Campaign;
pub use orchestrator::{ComparisonResult, Orchestrator};
