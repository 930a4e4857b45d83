use legal_flow::{Context, GraphError};

/// Keys the pipeline tasks read and write in the shared context
pub mod context_keys {
    pub const QUERY: &str = "query";
    pub const LOCATION: &str = "location";
    pub const TRIAGE: &str = "triage";
    pub const RIGHTS: &str = "rights";
    pub const ACTIONS: &str = "actions";
    pub const DOCUMENT: &str = "document";
    pub const DOCUMENT_TYPE: &str = "document_type";
    pub const RESOURCES: &str = "resources";
    pub const NEWS: &str = "news";
    pub const FINAL_RESULT: &str = "final_result";
    /// Prefix for per-step degradation markers, e.g. `degraded.rights`
    pub const DEGRADED_PREFIX: &str = "degraded.";
}

/// Step names in pipeline order, as reported in `degraded_steps`
pub const STEP_NAMES: [&str; 6] = ["triage", "rights", "actions", "document", "resources", "news"];

/// Flag a step as having returned its placeholder output
pub fn mark_degraded(context: &Context, step: &str) -> legal_flow::Result<()> {
    context.set_sync(format!("{}{}", context_keys::DEGRADED_PREFIX, step), true)
}

pub fn degraded_steps(context: &Context) -> Vec<String> {
    STEP_NAMES
        .iter()
        .filter(|step| {
            context
                .get_sync::<bool>(&format!("{}{}", context_keys::DEGRADED_PREFIX, step))
                .unwrap_or(false)
        })
        .map(|s| s.to_string())
        .collect()
}

/// Fetch a value an earlier task must have written
pub fn require<T: serde::de::DeserializeOwned>(
    context: &Context,
    key: &str,
) -> legal_flow::Result<T> {
    context
        .get_sync(key)
        .ok_or_else(|| GraphError::ContextError(format!("{key} not found in context")))
}
