use std::sync::Arc;

use async_trait::async_trait;
use legal_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::{info, warn};

use super::types::{context_keys, mark_degraded, require};
use crate::llm::CompletionProvider;
use crate::models::{ActionResult, CaseRecord, RightsResult};

const ACTIONS_TEMPERATURE: f64 = 0.3;

pub const ACTIONS_APOLOGY: &str = "We're sorry, we couldn't put together an action plan right now. \
Please try again shortly. In the meantime, write down dates, amounts and names related to your situation \
and reach out to one of the listed legal aid resources.";

/// Asks for immediate steps, a communication script, a deadline estimate
/// and an escalation path. The reply is returned verbatim.
pub struct ActionStrategistTask {
    llm: Arc<dyn CompletionProvider>,
}

impl ActionStrategistTask {
    pub fn new(llm: Arc<dyn CompletionProvider>) -> Self {
        Self { llm }
    }

    pub async fn plan(
        &self,
        query: &str,
        rights: &RightsResult,
        record: &CaseRecord,
    ) -> (ActionResult, bool) {
        let prompt = format!(
            r#"You are a legal action strategist. Based on this situation, provide a clear action plan.

User Situation: {query}
Their Rights: {rights}
Category: {category}

Provide:
1. Immediate actions (numbered list, 3-5 steps)
2. A professional script/template for communication
3. Timeline (how long they have to act)
4. Escalation path (what to do if initial steps fail)

Be specific and actionable."#,
            rights = rights.explanation,
            category = record.category,
        );

        match self.llm.complete(&prompt, ACTIONS_TEMPERATURE).await {
            Ok(action_plan) => (ActionResult { action_plan }, false),
            Err(e) => {
                warn!(error = %e, backend = self.llm.name(), "Action plan completion failed");
                (
                    ActionResult {
                        action_plan: ACTIONS_APOLOGY.to_string(),
                    },
                    true,
                )
            }
        }
    }
}

#[async_trait]
impl Task for ActionStrategistTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let query: String = require(&context, context_keys::QUERY)?;
        let rights: RightsResult = require(&context, context_keys::RIGHTS)?;
        let record: CaseRecord = require(&context, context_keys::TRIAGE)?;

        info!(task_id = %self.id(), "Creating action plan");
        let (actions, degraded) = self.plan(&query, &rights, &record).await;
        if degraded {
            mark_degraded(&context, "actions")?;
        }

        context.set(context_keys::ACTIONS, actions).await?;
        Ok(TaskResult::new(None, NextAction::Continue))
    }
}
