//! Client for the keyed news search API (NewsAPI `everything` endpoint).

use std::time::Duration;

use async_trait::async_trait;
use chrono::{Days, Local, NaiveDate};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use crate::config::NewsConfig;
use crate::models::NewsArticle;

/// Sources whose results are aggregator noise
pub const EXCLUDED_SOURCES: &[&str] = &["Google News", "Yahoo"];
const REMOVED_MARKER: &str = "[Removed]";
const PAGE_SIZE: u32 = 10;

#[derive(Debug, Error)]
pub enum NewsError {
    #[error("news search is not configured")]
    NotConfigured,

    #[error("news request failed: {0}")]
    Request(String),

    #[error("news API error: {0}")]
    Api(String),
}

#[async_trait]
pub trait NewsSearch: Send + Sync {
    /// One search, already filtered of removed, empty and excluded entries
    async fn search(&self, query: &str) -> Result<Vec<NewsArticle>, NewsError>;
}

#[derive(Debug, Deserialize)]
struct ApiSource {
    #[serde(default)]
    name: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiArticle {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    source: Option<ApiSource>,
    #[serde(default)]
    published_at: Option<String>,
    #[serde(default)]
    url_to_image: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiResponse {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    articles: Vec<ApiArticle>,
}

fn keep_article(article: ApiArticle) -> Option<NewsArticle> {
    let title = article.title.unwrap_or_default();
    let description = article.description.unwrap_or_default();
    if title.contains(REMOVED_MARKER) || description.trim().is_empty() {
        return None;
    }

    let source = article.source.and_then(|s| s.name).unwrap_or_default();
    if EXCLUDED_SOURCES.contains(&source.as_str()) {
        return None;
    }

    Some(NewsArticle {
        title,
        description,
        url: article.url.unwrap_or_default(),
        source,
        published_at: article.published_at.unwrap_or_default(),
        image_url: article.url_to_image.filter(|u| !u.is_empty()),
    })
}

fn parse_response(body: ApiResponse) -> Result<Vec<NewsArticle>, NewsError> {
    if body.status != "ok" {
        return Err(NewsError::Api(
            body.message.unwrap_or_else(|| "Unknown error".to_string()),
        ));
    }
    Ok(body.articles.into_iter().filter_map(keep_article).collect())
}

pub struct NewsApiClient {
    http: reqwest::Client,
    api_url: String,
    api_key: String,
    days_back: i64,
}

impl NewsApiClient {
    pub fn new(
        api_url: impl Into<String>,
        api_key: impl Into<String>,
        timeout: Duration,
        days_back: i64,
    ) -> Result<Self, NewsError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(NewsError::NotConfigured);
        }
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| NewsError::Request(e.to_string()))?;
        Ok(Self {
            http,
            api_url: api_url.into(),
            api_key,
            days_back,
        })
    }

    /// `None` when no key is configured
    pub fn from_config(config: &NewsConfig) -> Result<Option<Self>, NewsError> {
        match &config.api_key {
            Some(key) => Ok(Some(Self::new(
                config.api_url.clone(),
                key.clone(),
                config.timeout,
                config.days_back,
            )?)),
            None => Ok(None),
        }
    }

    /// Out-of-range windows collapse to today rather than overflow
    fn date_range(&self) -> (NaiveDate, NaiveDate) {
        let to = Local::now().date_naive();
        let days = u64::try_from(self.days_back).unwrap_or(0);
        let from = to.checked_sub_days(Days::new(days)).unwrap_or(to);
        (from, to)
    }
}

#[async_trait]
impl NewsSearch for NewsApiClient {
    async fn search(&self, query: &str) -> Result<Vec<NewsArticle>, NewsError> {
        let (from, to) = self.date_range();
        let from = from.format("%Y-%m-%d").to_string();
        let to = to.format("%Y-%m-%d").to_string();
        let page_size = PAGE_SIZE.to_string();

        info!(query = %query, from = %from, to = %to, "Searching news");

        let response = self
            .http
            .get(&self.api_url)
            .query(&[
                ("q", query),
                ("from", from.as_str()),
                ("to", to.as_str()),
                ("language", "en"),
                ("sortBy", "relevancy"),
                ("apiKey", self.api_key.as_str()),
                ("pageSize", page_size.as_str()),
            ])
            .send()
            .await
            .map_err(|e| NewsError::Request(e.to_string()))?;

        let body: ApiResponse = response
            .json()
            .await
            .map_err(|e| NewsError::Request(e.to_string()))?;

        let articles = parse_response(body).inspect_err(|e| warn!(error = %e, "News API error"))?;
        info!(query = %query, count = articles.len(), "News search returned");
        Ok(articles)
    }
}
