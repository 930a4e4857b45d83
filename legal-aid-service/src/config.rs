//! Process configuration, read once from the environment at startup.
//!
//! A `.env` file in the working directory is loaded first when present; real
//! environment variables take precedence over it.

use std::collections::HashMap;
use std::ops::RangeInclusive;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{key} must be a number, got '{value}'")]
    InvalidNumber { key: &'static str, value: String },

    #[error("unknown {key} '{value}', expected one of: {expected}")]
    InvalidChoice {
        key: &'static str,
        value: String,
        expected: &'static str,
    },

    #[error("{0} is required for the selected backend")]
    Missing(&'static str),

    #[error("failed to load .env file: {0}")]
    DotEnv(#[from] dotenvy::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmBackend {
    Hosted,
    Local,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrieverKind {
    Embedding,
    Lexical,
}

#[derive(Debug, Clone)]
pub struct LlmConfig {
    pub backend: LlmBackend,
    pub openrouter_api_key: Option<String>,
    pub hosted_model: String,
    pub ollama_base_url: String,
    pub ollama_model: String,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct NewsConfig {
    pub api_key: Option<String>,
    pub api_url: String,
    pub timeout: Duration,
    pub days_back: i64,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: String,
    pub port: u16,
    pub llm: LlmConfig,
    pub news: NewsConfig,
    pub data_dir: PathBuf,
    pub retriever: RetrieverKind,
    pub allowed_origins: Vec<String>,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        env_file_loaded(dotenvy::dotenv())?;
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    fn from_lookup(get: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let get = |key: &str| get(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let backend = match get_or("LLM_BACKEND", "hosted").to_lowercase().as_str() {
            "hosted" => LlmBackend::Hosted,
            "local" => LlmBackend::Local,
            other => {
                return Err(ConfigError::InvalidChoice {
                    key: "LLM_BACKEND",
                    value: other.to_string(),
                    expected: "hosted, local",
                });
            }
        };

        let openrouter_api_key = get("OPENROUTER_API_KEY");
        if backend == LlmBackend::Hosted && openrouter_api_key.is_none() {
            return Err(ConfigError::Missing("OPENROUTER_API_KEY"));
        }

        let retriever = match get_or("RETRIEVER", "embedding").to_lowercase().as_str() {
            "embedding" => RetrieverKind::Embedding,
            "lexical" => RetrieverKind::Lexical,
            other => {
                return Err(ConfigError::InvalidChoice {
                    key: "RETRIEVER",
                    value: other.to_string(),
                    expected: "embedding, lexical",
                });
            }
        };

        let llm = LlmConfig {
            backend,
            openrouter_api_key,
            hosted_model: get_or("HOSTED_MODEL", "meta-llama/llama-3.3-70b-instruct"),
            ollama_base_url: get_or("OLLAMA_BASE_URL", "http://localhost:11434"),
            ollama_model: get_or("OLLAMA_MODEL", "llama3.1"),
            timeout: Duration::from_secs(parse_num("LLM_TIMEOUT_SECS", get("LLM_TIMEOUT_SECS"), 90)?),
        };

        let news = NewsConfig {
            api_key: get("NEWS_API_KEY"),
            api_url: get_or("NEWS_API_URL", "https://newsapi.org/v2/everything"),
            timeout: Duration::from_secs(parse_num(
                "NEWS_TIMEOUT_SECS",
                get("NEWS_TIMEOUT_SECS"),
                10,
            )?),
            days_back: parse_in_range(
                "NEWS_DAYS_BACK",
                get("NEWS_DAYS_BACK"),
                60,
                NEWS_DAYS_BACK_RANGE,
            )?,
        };

        let allowed_origins = get_or(
            "ALLOWED_ORIGINS",
            "http://localhost:3000,http://localhost:3001",
        )
        .split(',')
        .map(|o| o.trim().to_string())
        .filter(|o| !o.is_empty())
        .collect();

        Ok(Self {
            bind_addr: get_or("BIND_ADDR", "0.0.0.0"),
            port: parse_num("PORT", get("PORT"), 8000)?,
            llm,
            news,
            data_dir: PathBuf::from(get_or("DATA_DIR", "data")),
            retriever,
            allowed_origins,
        })
    }

    pub fn resources_path(&self) -> PathBuf {
        self.data_dir.join("resources.json")
    }

    pub fn corpus_dir(&self) -> PathBuf {
        self.data_dir.join("legal_corpus")
    }
}

/// A missing `.env` is the normal case in deployment; anything else is an error.
fn env_file_loaded<T>(result: dotenvy::Result<T>) -> Result<(), ConfigError> {
    match result {
        Ok(_) => Ok(()),
        Err(e) if e.not_found() => Ok(()),
        Err(e) => Err(e.into()),
    }
}

/// Accepted window for the news date range, in days
const NEWS_DAYS_BACK_RANGE: RangeInclusive<i64> = 1..=3650;

fn parse_in_range<T: std::str::FromStr + PartialOrd>(
    key: &'static str,
    value: Option<String>,
    default: T,
    range: RangeInclusive<T>,
) -> Result<T, ConfigError> {
    let raw = value.clone();
    let parsed = parse_num(key, value, default)?;
    if range.contains(&parsed) {
        Ok(parsed)
    } else {
        Err(ConfigError::InvalidNumber {
            key,
            value: raw.unwrap_or_default(),
        })
    }
}

fn parse_num<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ConfigError::InvalidNumber { key, value: raw }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn local_backend_needs_no_key_and_uses_defaults() {
        let config = AppConfig::from_map(&vars(&[("LLM_BACKEND", "local")])).unwrap();
        assert_eq!(config.llm.backend, LlmBackend::Local);
        assert_eq!(config.port, 8000);
        assert_eq!(config.llm.timeout, Duration::from_secs(90));
        assert_eq!(config.news.timeout, Duration::from_secs(10));
        assert_eq!(config.news.days_back, 60);
        assert!(config.news.api_key.is_none());
        assert_eq!(config.retriever, RetrieverKind::Embedding);
        assert_eq!(
            config.allowed_origins,
            vec!["http://localhost:3000", "http://localhost:3001"]
        );
        assert_eq!(config.resources_path(), PathBuf::from("data/resources.json"));
        assert_eq!(config.corpus_dir(), PathBuf::from("data/legal_corpus"));
    }

    #[test]
    fn hosted_backend_requires_api_key() {
        let err = AppConfig::from_map(&vars(&[])).unwrap_err();
        assert!(matches!(err, ConfigError::Missing("OPENROUTER_API_KEY")));

        let config =
            AppConfig::from_map(&vars(&[("OPENROUTER_API_KEY", "sk-test"), ("PORT", "9100")]))
                .unwrap();
        assert_eq!(config.llm.backend, LlmBackend::Hosted);
        assert_eq!(config.port, 9100);
    }

    #[test]
    fn rejects_bad_values() {
        let err = AppConfig::from_map(&vars(&[("LLM_BACKEND", "local"), ("PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidNumber { key: "PORT", .. }));

        let err = AppConfig::from_map(&vars(&[("LLM_BACKEND", "cloud")])).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidChoice { key: "LLM_BACKEND", .. }));
    }

    #[test]
    fn news_days_back_must_be_in_range() {
        for value in ["0", "-5", "3651", "100000000"] {
            let err = AppConfig::from_map(&vars(&[
                ("LLM_BACKEND", "local"),
                ("NEWS_API_KEY", "k"),
                ("NEWS_DAYS_BACK", value),
            ]))
            .unwrap_err();
            match err {
                ConfigError::InvalidNumber { key, value: rejected } => {
                    assert_eq!(key, "NEWS_DAYS_BACK");
                    assert_eq!(rejected, value);
                }
                other => panic!("unexpected error for {value}: {other:?}"),
            }
        }

        let config = AppConfig::from_map(&vars(&[
            ("LLM_BACKEND", "local"),
            ("NEWS_DAYS_BACK", "3650"),
        ]))
        .unwrap();
        assert_eq!(config.news.days_back, 3650);
    }

    #[test]
    fn missing_env_file_is_fine_but_broken_one_is_not() {
        let dir = tempfile::tempdir().unwrap();
        assert!(env_file_loaded(dotenvy::from_path(dir.path().join(".env"))).is_ok());

        let broken = dir.path().join("broken.env");
        std::fs::write(&broken, "LEGAL_AID_BROKEN_LINE value without equals\n").unwrap();
        let err = env_file_loaded(dotenvy::from_path(&broken)).unwrap_err();
        assert!(matches!(err, ConfigError::DotEnv(_)));
    }

    #[test]
    fn blank_news_key_counts_as_absent() {
        let config =
            AppConfig::from_map(&vars(&[("LLM_BACKEND", "local"), ("NEWS_API_KEY", "  ")]))
                .unwrap();
        assert!(config.news.api_key.is_none());
    }
}
