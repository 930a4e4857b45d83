use std::sync::Arc;

use async_trait::async_trait;
use legal_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::{info, warn};

use super::types::{context_keys, mark_degraded, require};
use crate::llm::CompletionProvider;
use crate::models::{ActionResult, CaseRecord, DocumentKind};

const DOCUMENT_TEMPERATURE: f64 = 0.2;

pub const DOCUMENT_APOLOGY: &str = "We're sorry, we couldn't draft your document right now. \
Please try again in a few minutes.";

/// Drafts a letter whose kind is chosen from the case category
pub struct DocumentGeneratorTask {
    llm: Arc<dyn CompletionProvider>,
}

impl DocumentGeneratorTask {
    pub fn new(llm: Arc<dyn CompletionProvider>) -> Self {
        Self { llm }
    }

    pub async fn generate(
        &self,
        query: &str,
        record: &CaseRecord,
        actions: &ActionResult,
    ) -> (DocumentKind, String, bool) {
        let kind = DocumentKind::for_category(record.category);
        let prompt = format!(
            r#"Generate a professional {doc_type} based on this situation.

User Situation: {query}
Action Plan Context: {plan}

The document should:
1. Be formally formatted
2. Cite relevant laws
3. State demands clearly
4. Use an appropriate tone
5. Have placeholder fields like [YOUR NAME], [DATE], etc.

Generate the complete document now."#,
            doc_type = kind.description(),
            plan = actions.action_plan,
        );

        match self.llm.complete(&prompt, DOCUMENT_TEMPERATURE).await {
            Ok(text) => (kind, text, false),
            Err(e) => {
                warn!(error = %e, backend = self.llm.name(), ?kind, "Document completion failed");
                (kind, DOCUMENT_APOLOGY.to_string(), true)
            }
        }
    }
}

#[async_trait]
impl Task for DocumentGeneratorTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let query: String = require(&context, context_keys::QUERY)?;
        let record: CaseRecord = require(&context, context_keys::TRIAGE)?;
        let actions: ActionResult = require(&context, context_keys::ACTIONS)?;

        info!(task_id = %self.id(), "Generating document");
        let (kind, document, degraded) = self.generate(&query, &record, &actions).await;
        if degraded {
            mark_degraded(&context, "document")?;
        }

        context.set(context_keys::DOCUMENT_TYPE, kind).await?;
        context.set(context_keys::DOCUMENT, document).await?;
        Ok(TaskResult::new(None, NextAction::Continue))
    }
}
