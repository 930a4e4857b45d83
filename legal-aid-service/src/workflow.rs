use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context as _;
use legal_flow::{Context, FanOutTask, Graph, GraphBuilder, GraphError, Task};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{AppConfig, RetrieverKind};
use crate::llm::{CompletionProvider, build_provider};
use crate::models::FinalResult;
use crate::news_api::{NewsApiClient, NewsSearch};
use crate::retrieval::{CorpusDocument, LexicalIndex, Retriever, load_corpus};
use crate::tasks::*;

const LOOKUPS_TASK_ID: &str = "resources_and_news";

/// Collaborators shared by every request
#[derive(Clone)]
pub struct PipelineDeps {
    pub llm: Arc<dyn CompletionProvider>,
    pub retriever: Arc<dyn Retriever>,
    pub news: Option<Arc<dyn NewsSearch>>,
    pub resources_path: PathBuf,
}

impl PipelineDeps {
    /// Wire up the configured backends. A missing corpus directory is fatal.
    pub async fn from_config(config: &AppConfig) -> anyhow::Result<Self> {
        let corpus_dir = config.corpus_dir();
        let documents = load_corpus(&corpus_dir)
            .with_context(|| format!("loading legal corpus from {}", corpus_dir.display()))?;
        info!(documents = documents.len(), "Loaded legal corpus");

        let retriever = build_retriever(config.retriever, documents).await?;
        let llm = build_provider(&config.llm).context("configuring completion backend")?;
        info!(backend = llm.name(), "Completion backend ready");

        let news = NewsApiClient::from_config(&config.news)
            .context("configuring news search")?
            .map(|client| Arc::new(client) as Arc<dyn NewsSearch>);
        if news.is_none() {
            warn!("NEWS_API_KEY not set, news will be search suggestions only");
        }

        Ok(Self {
            llm,
            retriever,
            news,
            resources_path: config.resources_path(),
        })
    }
}

#[cfg(feature = "embeddings")]
async fn build_retriever(
    kind: RetrieverKind,
    documents: Vec<CorpusDocument>,
) -> anyhow::Result<Arc<dyn Retriever>> {
    match kind {
        RetrieverKind::Embedding => {
            let index = crate::retrieval::EmbeddingIndex::build(documents)
                .await
                .context("building embedding index")?;
            Ok(Arc::new(index))
        }
        RetrieverKind::Lexical => Ok(Arc::new(LexicalIndex::new(documents))),
    }
}

#[cfg(not(feature = "embeddings"))]
async fn build_retriever(
    kind: RetrieverKind,
    documents: Vec<CorpusDocument>,
) -> anyhow::Result<Arc<dyn Retriever>> {
    if kind == RetrieverKind::Embedding {
        warn!("Built without the embeddings feature, using lexical retrieval");
    }
    Ok(Arc::new(LexicalIndex::new(documents)))
}

/// triage -> rights -> actions -> document -> (resources | news) -> assemble
///
/// Resources and news only need the case record, so they run together once
/// the document is drafted.
pub fn build_legal_workflow(deps: &PipelineDeps) -> Graph {
    let triage = Arc::new(TriageTask::new(deps.llm.clone()));
    let triage_id = triage.id().to_string();

    let rights = Arc::new(RightsExplainerTask::new(
        deps.llm.clone(),
        deps.retriever.clone(),
    ));
    let rights_id = rights.id().to_string();

    let actions = Arc::new(ActionStrategistTask::new(deps.llm.clone()));
    let actions_id = actions.id().to_string();

    let document = Arc::new(DocumentGeneratorTask::new(deps.llm.clone()));
    let document_id = document.id().to_string();

    let lookups = Arc::new(FanOutTask::new(
        LOOKUPS_TASK_ID,
        vec![
            Arc::new(ResourceConnectorTask::new(deps.resources_path.clone())) as Arc<dyn Task>,
            Arc::new(NewsMonitorTask::new(deps.news.clone())),
        ],
    ));

    let assemble = Arc::new(AssembleResultTask);
    let assemble_id = assemble.id().to_string();

    GraphBuilder::new("legal_assistant")
        .add_task(triage)
        .add_task(rights)
        .add_task(actions)
        .add_task(document)
        .add_task(lookups)
        .add_task(assemble)
        .add_sequence(&[
            &triage_id,
            &rights_id,
            &actions_id,
            &document_id,
            LOOKUPS_TASK_ID,
            &assemble_id,
        ])
        .build()
}

/// Runs the legal workflow once per request
#[derive(Clone)]
pub struct LegalAssistant {
    graph: Arc<Graph>,
}

impl LegalAssistant {
    pub fn new(deps: &PipelineDeps) -> Self {
        Self {
            graph: Arc::new(build_legal_workflow(deps)),
        }
    }

    pub async fn run(&self, query: &str, location: &str) -> Result<FinalResult, GraphError> {
        let request_id = Uuid::new_v4();
        info!(%request_id, location = %location, "Running legal workflow");

        let context = Context::new();
        context.set(context_keys::QUERY, query).await?;
        context.set(context_keys::LOCATION, location).await?;

        let execution = self.graph.execute(context.clone()).await?;
        info!(%request_id, steps = execution.steps.len(), "Legal workflow finished");

        context
            .get(context_keys::FINAL_RESULT)
            .await
            .ok_or_else(|| GraphError::ContextError("final result was not produced".to_string()))
    }
}
