pub mod config;
pub mod llm;
pub mod models;
pub mod news_api;
pub mod retrieval;
pub mod service;
pub mod tasks;
pub mod telemetry;
pub mod workflow;

pub use config::AppConfig;
pub use models::*;
pub use service::{AppState, build_router};
pub use workflow::{LegalAssistant, PipelineDeps, build_legal_workflow};
