use std::sync::Arc;

use async_trait::async_trait;
use legal_flow::{Context, NextAction, Result, Task, TaskResult};
use serde_json::Value;
use tracing::{info, warn};

use super::safety::apply_overrides;
use super::types::{context_keys, mark_degraded, require};
use crate::llm::CompletionProvider;
use crate::models::{
    CaseRecord, Category, Jurisdiction, SituationType, Urgency, state_from_location,
};

const TRIAGE_TEMPERATURE: f64 = 0.1;

/// Query and location are substituted once, so braces inside them stay literal
fn triage_prompt(query: &str, location: &str) -> String {
    format!(
        r#"You are a legal triage specialist. Analyze this situation and respond ONLY with valid JSON.

User Query: {query}
User Location: {location}

IMPORTANT - Distinguish between:
1. CRITICAL (call 911): Active physical violence, weapons, someone attacking the user RIGHT NOW
2. HIGH: Serious situation needing help soon (abuse, threats, severe issues) but not an immediate 911 emergency
3. MEDIUM: Legal issue that should be addressed
4. LOW: Minor issue the user can resolve alone

Examples:
- "My partner is hitting me right now" -> critical
- "My partner threatened me with a gun yesterday" -> high
- "I feel depressed because of my roommate's abuse" -> high (mental health crisis, not 911)
- "My boss yelled at me" -> medium

Classify into ONE category: immigration, housing, employment, criminal, consumer, family

Respond with this exact JSON structure:
{{
  "category": "housing",
  "jurisdiction": {{"state": "Massachusetts", "city": "Boston"}},
  "urgency": "high",
  "requires_lawyer": false,
  "key_issues": ["emotional abuse", "roommate dispute"],
  "situation_type": "mental_health_crisis"
}}

situation_type can be:
- "active_violence" (happening RIGHT NOW, call 911)
- "mental_health_crisis" (suicidal thoughts, severe depression - needs a crisis hotline)
- "past_violence" (threats or violence occurred but are not happening now)
- "legal_dispute" (normal legal issue)
"#
    )
}

/// Non-blank string value
fn text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s.trim().to_string()).filter(|s| !s.is_empty()),
        _ => None,
    }
}

/// Booleans also arrive quoted as "true"/"false" or "yes"/"no"
fn flag(value: Option<&Value>) -> Option<bool> {
    match value? {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

/// A list of strings, or one comma-separated string
fn issues(value: Option<&Value>) -> Vec<String> {
    match value {
        Some(Value::Array(items)) => items.iter().filter_map(|item| text(Some(item))).collect(),
        Some(Value::String(s)) => s
            .split(',')
            .map(str::trim)
            .filter(|issue| !issue.is_empty())
            .map(String::from)
            .collect(),
        _ => Vec::new(),
    }
}

/// `{"state", "city"}` or a bare state name
fn jurisdiction(value: Option<&Value>, location: &str) -> Jurisdiction {
    let (state, city) = match value {
        Some(Value::Object(fields)) => (text(fields.get("state")), text(fields.get("city"))),
        Some(Value::String(_)) => (text(value), None),
        _ => (None, None),
    };
    Jurisdiction {
        state: state.unwrap_or_else(|| state_from_location(location)),
        city,
    }
}

/// Parse the JSON object spanning the first `{` to the last `}` of the
/// response. Returns the record plus the situation type the model claimed.
pub fn parse_case_record(
    response: &str,
    location: &str,
) -> Option<(CaseRecord, Option<SituationType>)> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    if end < start {
        return None;
    }

    // A mistyped field falls back to its default instead of discarding the record
    let Value::Object(fields) = serde_json::from_str(&response[start..=end]).ok()? else {
        return None;
    };
    let model_situation = text(fields.get("situation_type"))
        .as_deref()
        .and_then(SituationType::parse);

    let record = CaseRecord {
        category: text(fields.get("category")).map(Category::from).unwrap_or_default(),
        jurisdiction: jurisdiction(fields.get("jurisdiction"), location),
        urgency: text(fields.get("urgency")).map(Urgency::from).unwrap_or_default(),
        requires_lawyer: flag(fields.get("requires_lawyer")).unwrap_or(false),
        key_issues: issues(fields.get("key_issues")),
        situation_type: model_situation.unwrap_or_default(),
    };
    Some((record, model_situation))
}

/// Classifies the raw query into a `CaseRecord`. Never fails on model
/// trouble: any completion or parse error yields the fallback record.
pub struct TriageTask {
    llm: Arc<dyn CompletionProvider>,
}

impl TriageTask {
    pub fn new(llm: Arc<dyn CompletionProvider>) -> Self {
        Self { llm }
    }

    pub async fn triage(&self, query: &str, location: &str) -> (CaseRecord, bool) {
        let prompt = triage_prompt(query, location);

        let (mut record, model_situation, degraded) =
            match self.llm.complete(&prompt, TRIAGE_TEMPERATURE).await {
                Ok(response) => match parse_case_record(&response, location) {
                    Some((record, situation)) => (record, situation, false),
                    None => {
                        warn!(response = %response, "Triage response was not valid JSON, using fallback");
                        (CaseRecord::fallback(location), None, true)
                    }
                },
                Err(e) => {
                    warn!(error = %e, backend = self.llm.name(), "Triage completion failed, using fallback");
                    (CaseRecord::fallback(location), None, true)
                }
            };

        if let Some(rule) = apply_overrides(&mut record, model_situation, query) {
            info!(rule, situation = ?record.situation_type, urgency = ?record.urgency, "Safety override applied");
        }
        (record, degraded)
    }
}

#[async_trait]
impl Task for TriageTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let query: String = require(&context, context_keys::QUERY)?;
        let location: String = context
            .get(context_keys::LOCATION)
            .await
            .unwrap_or_default();

        info!(task_id = %self.id(), "Triaging legal issue");
        let (record, degraded) = self.triage(&query, &location).await;
        if degraded {
            mark_degraded(&context, "triage")?;
        }

        info!(
            category = %record.category,
            urgency = ?record.urgency,
            state = %record.jurisdiction.state,
            "Triage complete"
        );
        context.set(context_keys::TRIAGE, record).await?;
        Ok(TaskResult::new(None, NextAction::Continue))
    }
}
