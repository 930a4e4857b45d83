use std::sync::Arc;

use async_trait::async_trait;
use legal_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::{info, warn};

use super::types::{context_keys, mark_degraded, require};
use crate::llm::CompletionProvider;
use crate::models::{CaseRecord, RightsResult};
use crate::retrieval::{Retriever, SearchResults};

const RIGHTS_TEMPERATURE: f64 = 0.3;
const REFERENCE_DOCS: usize = 2;

pub const RIGHTS_APOLOGY: &str = "We're sorry, we couldn't generate an explanation of your rights right now. \
Please try again in a few minutes, or contact one of the legal aid organizations listed under resources.";

/// Retrieval query: the category followed by the key issues
pub fn retrieval_query(record: &CaseRecord) -> String {
    let mut parts = vec![record.category.as_str().to_string()];
    parts.extend(record.key_issues.iter().cloned());
    parts.join(" ")
}

fn rights_prompt(query: &str, record: &CaseRecord, legal_context: &str) -> String {
    let state = if record.jurisdiction.state.is_empty() {
        "Unknown"
    } else {
        record.jurisdiction.state.as_str()
    };
    format!(
        r#"You are a legal rights expert. Explain the user's rights based on these laws.

User Situation: {query}
Category: {category}
Location: {state}

Relevant Laws:
{legal_context}

Provide:
1. Constitutional rights (if applicable)
2. Federal law protections
3. State law protections
4. Plain English explanation

Be clear, concise, and cite specific laws."#,
        category = record.category,
    )
}

/// Retrieves reference text and asks the model to explain the user's rights
pub struct RightsExplainerTask {
    llm: Arc<dyn CompletionProvider>,
    retriever: Arc<dyn Retriever>,
}

impl RightsExplainerTask {
    pub fn new(llm: Arc<dyn CompletionProvider>, retriever: Arc<dyn Retriever>) -> Self {
        Self { llm, retriever }
    }

    pub async fn explain(&self, query: &str, record: &CaseRecord) -> (RightsResult, bool) {
        let search_query = retrieval_query(record);
        let mut degraded = false;

        let references = match self.retriever.search(&search_query, REFERENCE_DOCS).await {
            Ok(results) => results,
            Err(e) => {
                warn!(error = %e, "Reference retrieval failed, explaining without context");
                degraded = true;
                SearchResults::default()
            }
        };
        info!(
            search_query = %search_query,
            found = references.documents.len(),
            "Retrieved reference documents"
        );

        let legal_context = references.documents.join("\n\n");
        let prompt = rights_prompt(query, record, &legal_context);

        let explanation = match self.llm.complete(&prompt, RIGHTS_TEMPERATURE).await {
            Ok(text) => text,
            Err(e) => {
                warn!(error = %e, backend = self.llm.name(), "Rights completion failed");
                degraded = true;
                RIGHTS_APOLOGY.to_string()
            }
        };

        (
            RightsResult {
                explanation,
                sources: references.metadatas,
            },
            degraded,
        )
    }
}

#[async_trait]
impl Task for RightsExplainerTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let query: String = require(&context, context_keys::QUERY)?;
        let record: CaseRecord = require(&context, context_keys::TRIAGE)?;

        info!(task_id = %self.id(), "Explaining rights");
        let (rights, degraded) = self.explain(&query, &record).await;
        if degraded {
            mark_degraded(&context, "rights")?;
        }

        context.set(context_keys::RIGHTS, rights).await?;
        Ok(TaskResult::new(None, NextAction::Continue))
    }
}
