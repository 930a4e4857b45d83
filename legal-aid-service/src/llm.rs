//! Completion providers: the only place that talks to a language model.
//!
//! Tasks hold an `Arc<dyn CompletionProvider>` and never know which backend
//! sits behind it.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rig::client::CompletionClient;
use rig::completion::Prompt;
use rig::providers::openrouter;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::config::{LlmBackend, LlmConfig};

#[derive(Debug, Error)]
pub enum CompletionError {
    #[error("OPENROUTER_API_KEY not set")]
    MissingApiKey,

    #[error("completion timed out after {0:?}")]
    Timeout(Duration),

    #[error("completion request failed: {0}")]
    Request(String),

    #[error("backend returned {status}: {body}")]
    Backend { status: u16, body: String },

    #[error("could not read completion response: {0}")]
    InvalidResponse(String),
}

#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &str;

    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, CompletionError>;
}

/// Hosted chat-completion backend reached through OpenRouter
pub struct HostedProvider {
    client: openrouter::Client,
    model: String,
    timeout: Duration,
}

impl HostedProvider {
    pub fn new(api_key: &str, model: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client: openrouter::Client::new(api_key),
            model: model.into(),
            timeout,
        }
    }
}

#[async_trait]
impl CompletionProvider for HostedProvider {
    fn name(&self) -> &str {
        "openrouter"
    }

    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, CompletionError> {
        let agent = self
            .client
            .agent(&self.model)
            .temperature(temperature)
            .build();

        info!(model = %self.model, temperature, prompt_len = prompt.len(), "Calling hosted model");

        let answer = tokio::time::timeout(self.timeout, async { agent.prompt(prompt).await })
            .await
            .map_err(|_| CompletionError::Timeout(self.timeout))?
            .map_err(|e| CompletionError::Request(e.to_string()))?;

        info!(model = %self.model, output_len = answer.len(), "Hosted model responded");
        Ok(answer)
    }
}

#[derive(Serialize)]
struct GenerateOptions {
    temperature: f64,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: GenerateOptions,
}

#[derive(Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Locally hosted model served by Ollama's generate API
pub struct LocalProvider {
    http: reqwest::Client,
    base_url: String,
    model: String,
    timeout: Duration,
}

impl LocalProvider {
    pub fn new(
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| CompletionError::Request(e.to_string()))?;
        Ok(Self {
            http,
            base_url: base_url.into(),
            model: model.into(),
            timeout,
        })
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl CompletionProvider for LocalProvider {
    fn name(&self) -> &str {
        "ollama"
    }

    async fn complete(&self, prompt: &str, temperature: f64) -> Result<String, CompletionError> {
        let body = GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
            options: GenerateOptions { temperature },
        };

        info!(model = %self.model, base_url = %self.base_url, temperature, "Calling local model");

        let response = match self.http.post(self.generate_url()).json(&body).send().await {
            Ok(r) => r,
            Err(e) if e.is_timeout() => {
                warn!(model = %self.model, timeout_secs = self.timeout.as_secs(), "Local model timed out");
                return Err(CompletionError::Timeout(self.timeout));
            }
            Err(e) => return Err(CompletionError::Request(e.to_string())),
        };

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionError::Backend {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|e| CompletionError::InvalidResponse(e.to_string()))?;

        info!(model = %self.model, output_len = parsed.response.len(), "Local model responded");
        Ok(parsed.response)
    }
}

/// Pick the backend named in the configuration
pub fn build_provider(config: &LlmConfig) -> Result<Arc<dyn CompletionProvider>, CompletionError> {
    match config.backend {
        LlmBackend::Hosted => {
            let key = config
                .openrouter_api_key
                .as_deref()
                .ok_or(CompletionError::MissingApiKey)?;
            Ok(Arc::new(HostedProvider::new(
                key,
                config.hosted_model.clone(),
                config.timeout,
            )))
        }
        LlmBackend::Local => Ok(Arc::new(LocalProvider::new(
            config.ollama_base_url.clone(),
            config.ollama_model.clone(),
            config.timeout,
        )?)),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use axum::extract::State;
    use axum::http::StatusCode;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{Value, json};

    use super::*;

    type Seen = Arc<Mutex<Option<Value>>>;

    /// Serves `app` on an ephemeral local port and returns its base URL
    async fn serve(app: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    async fn record_generate(State(seen): State<Seen>, Json(body): Json<Value>) -> Json<Value> {
        *seen.lock().unwrap() = Some(body);
        Json(json!({"model": "llama3.1", "response": "You are owed overtime.", "done": true}))
    }

    fn local(base_url: &str) -> LocalProvider {
        LocalProvider::new(base_url, "llama3.1", Duration::from_secs(5)).unwrap()
    }

    fn local_config() -> LlmConfig {
        LlmConfig {
            backend: LlmBackend::Local,
            openrouter_api_key: None,
            hosted_model: "unused".into(),
            ollama_base_url: "http://localhost:11434/".into(),
            ollama_model: "llama3.1".into(),
            timeout: Duration::from_secs(5),
        }
    }

    #[test]
    fn builds_local_provider_without_key() {
        let provider = build_provider(&local_config()).unwrap();
        assert_eq!(provider.name(), "ollama");
    }

    #[test]
    fn hosted_provider_needs_key() {
        let config = LlmConfig {
            backend: LlmBackend::Hosted,
            ..local_config()
        };
        assert!(matches!(
            build_provider(&config),
            Err(CompletionError::MissingApiKey)
        ));
    }

    #[test]
    fn generate_url_strips_trailing_slash() {
        let provider =
            LocalProvider::new("http://localhost:11434/", "llama3.1", Duration::from_secs(1))
                .unwrap();
        assert_eq!(provider.generate_url(), "http://localhost:11434/api/generate");
    }

    #[test]
    fn generate_request_shape() {
        let body = GenerateRequest {
            model: "llama3.1",
            prompt: "hi",
            stream: false,
            options: GenerateOptions { temperature: 0.2 },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(value["stream"], serde_json::json!(false));
        assert_eq!(value["options"]["temperature"], serde_json::json!(0.2));
        assert_eq!(value["model"], serde_json::json!("llama3.1"));
    }

    #[tokio::test]
    async fn local_provider_posts_generate_request() {
        let seen: Seen = Arc::default();
        let app = Router::new()
            .route("/api/generate", post(record_generate))
            .with_state(seen.clone());
        let base = serve(app).await;

        let answer = local(&format!("{base}/")).complete("Explain FLSA", 0.3).await.unwrap();
        assert_eq!(answer, "You are owed overtime.");

        let body = seen.lock().unwrap().take().unwrap();
        assert_eq!(body["model"], json!("llama3.1"));
        assert_eq!(body["prompt"], json!("Explain FLSA"));
        assert_eq!(body["stream"], json!(false));
        assert_eq!(body["options"]["temperature"], json!(0.3));
    }

    #[tokio::test]
    async fn local_server_error_is_a_backend_error() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async { (StatusCode::INTERNAL_SERVER_ERROR, "model not loaded") }),
        );
        let base = serve(app).await;

        let err = local(&base).complete("hi", 0.2).await.unwrap_err();
        assert!(matches!(
            err,
            CompletionError::Backend { status: 500, ref body } if body == "model not loaded"
        ));
    }

    #[tokio::test]
    async fn reply_without_response_field_is_invalid() {
        let app = Router::new().route(
            "/api/generate",
            post(|| async { Json(json!({"model": "llama3.1", "done": true})) }),
        );
        let base = serve(app).await;

        let err = local(&base).complete("hi", 0.2).await.unwrap_err();
        assert!(matches!(err, CompletionError::InvalidResponse(_)));
    }
}
