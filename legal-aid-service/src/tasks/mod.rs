// Legal assistant pipeline tasks
pub mod actions;
pub mod assemble;
pub mod document;
pub mod news;
pub mod resources;
pub mod rights;
pub mod safety;
pub mod triage;

// Shared modules
pub mod types;

// Re-export task implementations
pub use actions::ActionStrategistTask;
pub use assemble::AssembleResultTask;
pub use document::DocumentGeneratorTask;
pub use news::NewsMonitorTask;
pub use resources::ResourceConnectorTask;
pub use rights::RightsExplainerTask;
pub use triage::TriageTask;

pub use types::context_keys;
