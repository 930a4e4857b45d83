use async_trait::async_trait;
use legal_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::info;

use super::safety::alert_for;
use super::types::{context_keys, degraded_steps, require};
use crate::models::{
    ActionResult, CaseRecord, DocumentKind, FinalResult, NewsBundle, ResourceList, RightsResult,
};

/// Collects every step's output into the final result and ends the run
pub struct AssembleResultTask;

#[async_trait]
impl Task for AssembleResultTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let triage: CaseRecord = require(&context, context_keys::TRIAGE)?;
        let rights: RightsResult = require(&context, context_keys::RIGHTS)?;
        let actions: ActionResult = require(&context, context_keys::ACTIONS)?;
        let document: String = require(&context, context_keys::DOCUMENT)?;
        let document_type: DocumentKind = require(&context, context_keys::DOCUMENT_TYPE)?;
        let resources: ResourceList = require(&context, context_keys::RESOURCES)?;
        let news: NewsBundle = require(&context, context_keys::NEWS)?;

        let result = FinalResult {
            alert: alert_for(&triage),
            degraded_steps: degraded_steps(&context),
            triage,
            rights,
            actions,
            document,
            document_type,
            resources,
            news,
        };

        info!(
            task_id = %self.id(),
            category = %result.triage.category,
            alert = result.alert.is_some(),
            degraded = ?result.degraded_steps,
            "Assembled final result"
        );
        context.set(context_keys::FINAL_RESULT, &result).await?;
        Ok(TaskResult::new(
            Some("Legal assistance ready".to_string()),
            NextAction::End,
        ))
    }
}
