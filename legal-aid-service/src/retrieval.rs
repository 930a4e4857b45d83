//! Reference-document retrieval over the bundled legal corpus.
//!
//! The corpus is read once at startup (one document per `*.txt` file) and the
//! resulting index is shared read-only across requests.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tracing::{info, warn};

use crate::models::SourceMetadata;

#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("legal corpus directory not found: {0}")]
    CorpusMissing(PathBuf),

    #[error("failed to read corpus: {0}")]
    Io(#[from] std::io::Error),

    #[error("embedding failed: {0}")]
    Embedding(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorpusDocument {
    pub id: String,
    pub source: String,
    pub text: String,
}

/// Ranked documents with their per-document source metadata, same order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchResults {
    pub documents: Vec<String>,
    pub metadatas: Vec<SourceMetadata>,
}

impl SearchResults {
    fn from_ranked<'a>(docs: impl IntoIterator<Item = &'a CorpusDocument>) -> Self {
        let mut results = SearchResults::default();
        for doc in docs {
            results.documents.push(doc.text.clone());
            results.metadatas.push(SourceMetadata {
                source: doc.source.clone(),
            });
        }
        results
    }
}

#[async_trait]
pub trait Retriever: Send + Sync {
    async fn search(&self, query: &str, limit: usize) -> Result<SearchResults, RetrievalError>;
}

/// Load every `*.txt` file in `dir`, sorted by file name.
pub fn load_corpus(dir: &Path) -> Result<Vec<CorpusDocument>, RetrievalError> {
    if !dir.is_dir() {
        return Err(RetrievalError::CorpusMissing(dir.to_path_buf()));
    }

    let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "txt"))
        .collect();
    paths.sort();

    let mut documents = Vec::with_capacity(paths.len());
    for path in paths {
        let text = std::fs::read_to_string(&path)?;
        let id = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let source = path
            .file_name()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        documents.push(CorpusDocument { id, source, text });
    }

    if documents.is_empty() {
        warn!(dir = %dir.display(), "No documents found in legal corpus folder");
    } else {
        info!(count = documents.len(), "Loaded legal documents");
    }
    Ok(documents)
}

fn tokenize(text: &str) -> HashSet<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.len() > 2)
        .map(|t| t.to_lowercase())
        .collect()
}

/// Term-overlap ranking. Needs no model download, so it also backs the tests.
pub struct LexicalIndex {
    documents: Vec<CorpusDocument>,
    terms: Vec<HashSet<String>>,
}

impl LexicalIndex {
    pub fn new(documents: Vec<CorpusDocument>) -> Self {
        let terms = documents
            .iter()
            .map(|d| {
                let mut t = tokenize(&d.text);
                t.extend(tokenize(&d.id));
                t
            })
            .collect();
        Self { documents, terms }
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }
}

#[async_trait]
impl Retriever for LexicalIndex {
    async fn search(&self, query: &str, limit: usize) -> Result<SearchResults, RetrievalError> {
        let query_terms = tokenize(query);
        let mut scored: Vec<(usize, usize)> = self
            .terms
            .iter()
            .enumerate()
            .map(|(i, doc_terms)| (i, doc_terms.intersection(&query_terms).count()))
            .collect();
        // Stable sort keeps file order among ties
        scored.sort_by(|a, b| b.1.cmp(&a.1));

        Ok(SearchResults::from_ranked(
            scored
                .into_iter()
                .take(limit)
                .map(|(i, _)| &self.documents[i]),
        ))
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        0.0
    } else {
        dot / (norm_a * norm_b)
    }
}

#[cfg(feature = "embeddings")]
pub use embedding::EmbeddingIndex;

#[cfg(feature = "embeddings")]
mod embedding {
    use std::sync::{Arc, Mutex};

    use async_trait::async_trait;
    use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};
    use tracing::info;

    use super::{CorpusDocument, RetrievalError, Retriever, SearchResults, cosine_similarity};

    /// Dense retrieval with a local sentence-embedding model
    pub struct EmbeddingIndex {
        model: Arc<Mutex<TextEmbedding>>,
        documents: Vec<CorpusDocument>,
        vectors: Vec<Vec<f32>>,
    }

    impl EmbeddingIndex {
        /// Loads the model and embeds the whole corpus. ONNX inference runs
        /// on a blocking thread so startup doesn't stall the runtime.
        pub async fn build(documents: Vec<CorpusDocument>) -> Result<Self, RetrievalError> {
            let texts: Vec<String> = documents.iter().map(|d| d.text.clone()).collect();

            let (model, vectors) = tokio::task::spawn_blocking(move || {
                let mut model = TextEmbedding::try_new(
                    InitOptions::new(EmbeddingModel::AllMiniLML6V2)
                        .with_show_download_progress(false),
                )
                .map_err(|e| RetrievalError::Embedding(e.to_string()))?;
                let vectors = if texts.is_empty() {
                    Vec::new()
                } else {
                    model
                        .embed(texts, None)
                        .map_err(|e| RetrievalError::Embedding(e.to_string()))?
                };
                Ok::<_, RetrievalError>((model, vectors))
            })
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))??;

            info!(count = vectors.len(), "Embedded legal corpus");
            Ok(Self {
                model: Arc::new(Mutex::new(model)),
                documents,
                vectors,
            })
        }
    }

    #[async_trait]
    impl Retriever for EmbeddingIndex {
        async fn search(&self, query: &str, limit: usize) -> Result<SearchResults, RetrievalError> {
            if self.documents.is_empty() {
                return Ok(SearchResults::default());
            }

            let model = Arc::clone(&self.model);
            let input = query.to_owned();
            let query_vector = tokio::task::spawn_blocking(move || {
                let mut model = model
                    .lock()
                    .map_err(|_| RetrievalError::Embedding("embedding model lock poisoned".into()))?;
                model
                    .embed(vec![input], None)
                    .map_err(|e| RetrievalError::Embedding(e.to_string()))?
                    .into_iter()
                    .next()
                    .ok_or_else(|| RetrievalError::Embedding("no embedding returned".into()))
            })
            .await
            .map_err(|e| RetrievalError::Embedding(e.to_string()))??;

            let mut scored: Vec<(usize, f32)> = self
                .vectors
                .iter()
                .enumerate()
                .map(|(i, v)| (i, cosine_similarity(&query_vector, v)))
                .collect();
            scored.sort_by(|a, b| b.1.total_cmp(&a.1));

            Ok(SearchResults::from_ranked(
                scored
                    .into_iter()
                    .take(limit)
                    .map(|(i, _)| &self.documents[i]),
            ))
        }
    }
}
