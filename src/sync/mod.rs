pub mod differ;
pub mod orchestrator;
pub mod progress;
pub mod reconciler;

pub use orchestrator::SyncOrchestrator;
