use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use legal_aid_service::llm::{CompletionError, CompletionProvider};
use legal_aid_service::news_api::{NewsError, NewsSearch};
use legal_aid_service::retrieval::{LexicalIndex, load_corpus};
use legal_aid_service::{
    AlertLevel, Category, DocumentKind, LegalAssistant, NewsArticle, PipelineDeps, SituationType,
    Urgency,
};
use legal_flow::GraphError;

/// Answers each pipeline prompt with a canned reply, keyed on the prompt's
/// opening line, and records the prompts it saw.
struct ScriptedModel {
    triage_reply: String,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    fn new(triage_reply: &str) -> Arc<Self> {
        Arc::new(Self {
            triage_reply: triage_reply.to_string(),
            prompts: Mutex::new(Vec::new()),
        })
    }
}

#[async_trait]
impl CompletionProvider for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn complete(&self, prompt: &str, _temperature: f64) -> Result<String, CompletionError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let reply = if prompt.starts_with("You are a legal triage specialist") {
            self.triage_reply.clone()
        } else if prompt.starts_with("You are a legal rights expert") {
            "Under the FLSA you are owed 1.5x pay for hours over 40.".to_string()
        } else if prompt.starts_with("You are a legal action strategist") {
            "1. Gather pay stubs\n2. Send a demand letter".to_string()
        } else if prompt.starts_with("Generate a professional") {
            "[YOUR NAME]\n[DATE]\n\nRe: Demand for unpaid overtime wages".to_string()
        } else {
            return Err(CompletionError::InvalidResponse("unexpected prompt".into()));
        };
        Ok(reply)
    }
}

struct Unreachable;

#[async_trait]
impl CompletionProvider for Unreachable {
    fn name(&self) -> &str {
        "unreachable"
    }

    async fn complete(&self, _prompt: &str, _temperature: f64) -> Result<String, CompletionError> {
        Err(CompletionError::Request("connection refused".into()))
    }
}

struct FixedNews(Vec<NewsArticle>);

#[async_trait]
impl NewsSearch for FixedNews {
    async fn search(&self, _query: &str) -> Result<Vec<NewsArticle>, NewsError> {
        Ok(self.0.clone())
    }
}

const EMPLOYMENT_TRIAGE: &str = r#"Here is the analysis:
{
  "category": "employment",
  "jurisdiction": {"state": "Massachusetts", "city": "Boston"},
  "urgency": "medium",
  "requires_lawyer": false,
  "key_issues": ["unpaid overtime", "wages"],
  "situation_type": "legal_dispute"
}"#;

fn data_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("data")
}

fn deps(llm: Arc<dyn CompletionProvider>, news: Option<Arc<dyn NewsSearch>>) -> PipelineDeps {
    let documents = load_corpus(&data_dir().join("legal_corpus")).unwrap();
    PipelineDeps {
        llm,
        retriever: Arc::new(LexicalIndex::new(documents)),
        news,
        resources_path: data_dir().join("resources.json"),
    }
}

fn headline(title: &str) -> NewsArticle {
    NewsArticle {
        title: title.into(),
        description: "Coverage of a wage case".into(),
        url: "https://example.com/story".into(),
        source: "Boston Globe".into(),
        published_at: "2026-10-01T12:00:00Z".into(),
        image_url: None,
    }
}

#[tokio::test]
async fn unpaid_overtime_end_to_end() {
    let model = ScriptedModel::new(EMPLOYMENT_TRIAGE);
    let news: Arc<dyn NewsSearch> = Arc::new(FixedNews(vec![
        headline("Boston restaurant owners ordered to pay back wages"),
        headline("BOSTON RESTAURANT OWNERS ORDERED TO PAY BACK WAGES"),
        headline("Short one"),
    ]));
    let assistant = LegalAssistant::new(&deps(model.clone(), Some(news)));

    let result = assistant
        .run("My boss hasn't paid me overtime for 3 months", "Boston, MA")
        .await
        .unwrap();

    assert_eq!(result.triage.category, Category::Employment);
    assert_ne!(result.triage.urgency, Urgency::Critical);
    assert_eq!(result.triage.situation_type, SituationType::LegalDispute);
    assert_eq!(result.document_type, DocumentKind::WageDemand);
    assert!(result.document.contains("[YOUR NAME]"));
    assert!(result.actions.action_plan.starts_with("1. Gather"));
    assert!(result.alert.is_none());
    assert!(result.degraded_steps.is_empty());

    assert_eq!(result.rights.sources.len(), 2);
    assert_eq!(result.rights.sources[0].source, "flsa_overtime.txt");

    // federal entries first, then Massachusetts
    let names: Vec<&str> = result.resources.resources.iter().map(|r| r.name.as_str()).collect();
    assert_eq!(names[0], "U.S. Department of Labor - Wage and Hour Division");
    assert!(names.iter().any(|n| n.contains("Fair Labor Division")));

    // duplicates across queries and short titles are gone
    assert_eq!(result.news.articles.len(), 1);
    assert_eq!(result.news.query_used, "wage theft massachusetts");

    let prompts = model.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 4);
    assert!(prompts[1].contains("Location: Massachusetts"));
    assert!(prompts[2].contains("Their Rights: Under the FLSA"));
}

#[tokio::test]
async fn offline_model_degrades_every_step_but_answers() {
    let assistant = LegalAssistant::new(&deps(Arc::new(Unreachable), None));

    let result = assistant
        .run("My landlord refuses to return my deposit", "Worcester, MA")
        .await
        .unwrap();

    assert_eq!(result.triage.category, Category::General);
    assert_eq!(result.triage.urgency, Urgency::Medium);
    assert_eq!(result.triage.jurisdiction.state, "MA");
    assert_eq!(result.document_type, DocumentKind::NoticeLetter);
    assert_eq!(
        result.degraded_steps,
        vec!["triage", "rights", "actions", "document", "news"]
    );

    // state code expands to the Massachusetts entries
    assert!(
        result
            .resources
            .resources
            .iter()
            .any(|r| r.name == "Massachusetts Legal Resource Finder")
    );

    assert_eq!(result.news.articles.len(), 1);
    let suggestion = &result.news.articles[0];
    assert_eq!(suggestion.source, "Search Suggestion");
    assert!(suggestion.url.starts_with("https://www.google.com/search?q=legal+news+ma+news"));
}

#[tokio::test]
async fn violence_keywords_override_model_and_raise_alert() {
    let model = ScriptedModel::new(
        r#"{"category": "family", "urgency": "medium", "key_issues": ["partner abuse"], "situation_type": "legal_dispute"}"#,
    );
    let assistant = LegalAssistant::new(&deps(model, None));

    let result = assistant
        .run("My partner is hitting me right now", "Boston, MA")
        .await
        .unwrap();

    assert_eq!(result.triage.situation_type, SituationType::ActiveViolence);
    assert_eq!(result.triage.urgency, Urgency::Critical);
    assert_eq!(result.triage.jurisdiction.state, "MA");
    let alert = result.alert.unwrap();
    assert_eq!(alert.level, AlertLevel::Emergency);
    assert!(alert.contacts.iter().any(|c| c.detail == "911"));
}

#[tokio::test]
async fn missing_resource_dataset_fails_the_request() {
    let mut deps = deps(ScriptedModel::new(EMPLOYMENT_TRIAGE), None);
    let dir = tempfile::tempdir().unwrap();
    deps.resources_path = dir.path().join("resources.json");

    let err = LegalAssistant::new(&deps)
        .run("My boss hasn't paid me overtime", "Boston, MA")
        .await
        .unwrap_err();

    assert!(matches!(err, GraphError::TaskExecutionFailed(msg) if msg.contains("Resource lookup failed")));
}
