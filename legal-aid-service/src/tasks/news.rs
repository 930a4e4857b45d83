use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use legal_flow::{Context, NextAction, Result, Task, TaskResult};
use tracing::{info, warn};

use super::types::{context_keys, mark_degraded, require};
use crate::models::{CaseRecord, Category, NewsArticle, NewsBundle};
use crate::news_api::NewsSearch;

const MAX_QUERIES: usize = 3;
const ENOUGH_ARTICLES: usize = 8;
const MAX_ARTICLES: usize = 10;
const MIN_TITLE_CHARS: usize = 20;
const MAX_ISSUE_QUERIES: usize = 2;
const FALLBACK_SEARCH_URL: &str = "https://www.google.com/search";

fn collapse(query: String) -> String {
    query.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Candidate search strings, most targeted first. Never empty.
pub fn build_search_queries(
    category: Category,
    state: &str,
    city: &str,
    key_issues: &[String],
) -> Vec<String> {
    let state = state.to_lowercase();
    let city = city.to_lowercase();

    let mut queries: Vec<String> = match category {
        Category::Immigration => vec![
            format!("ICE arrest {state} {city}"),
            format!("immigration enforcement {state}"),
            format!("ICE raid {city}"),
            "deportation united states".into(),
            format!("visa enforcement {state}"),
            "immigration detention center".into(),
        ],
        Category::Employment => vec![
            format!("wage theft {state}"),
            format!("labor law violation {city}"),
            format!("unpaid overtime lawsuit {state}"),
            "department of labor enforcement".into(),
            format!("worker rights {state}"),
            "employment discrimination lawsuit".into(),
        ],
        Category::Housing => vec![
            format!("eviction {city} {state}"),
            format!("landlord lawsuit {state}"),
            format!("tenant rights violation {city}"),
            "housing discrimination".into(),
            format!("rent control {city}"),
            format!("illegal eviction {state}"),
        ],
        Category::Criminal => vec![
            format!("police misconduct {city}"),
            format!("wrongful arrest {state}"),
            format!("police shooting {city}"),
            "civil rights lawsuit police".into(),
            format!("excessive force {state}"),
            "criminal justice reform".into(),
        ],
        Category::Consumer => vec![
            format!("consumer fraud {state}"),
            format!("ftc lawsuit {city}"),
            "consumer protection enforcement".into(),
            format!("class action lawsuit {state}"),
            "consumer rights violation".into(),
        ],
        Category::Family => vec![
            format!("family court {state}"),
            format!("custody case {city}"),
            "divorce law changes".into(),
            format!("child support {state}"),
        ],
        Category::General => Vec::new(),
    };

    for issue in key_issues.iter().take(MAX_ISSUE_QUERIES) {
        queries.push(format!("\"{issue}\" {state}"));
        queries.push(format!("{issue} lawsuit {state}"));
    }

    let mut queries: Vec<String> = queries
        .into_iter()
        .map(collapse)
        .filter(|q| !q.is_empty())
        .collect();
    if queries.is_empty() {
        queries.push(collapse(format!("legal news {state}")));
    }
    queries
}

/// Case-insensitive title dedup; short titles are dropped, output is capped.
pub fn dedupe_articles(articles: Vec<NewsArticle>) -> Vec<NewsArticle> {
    let mut seen = HashSet::new();
    articles
        .into_iter()
        .filter(|article| {
            let title = article.title.to_lowercase();
            title.chars().count() >= MIN_TITLE_CHARS && seen.insert(title)
        })
        .take(MAX_ARTICLES)
        .collect()
}

/// Synthetic entry pointing at a web news search for `query`
pub fn suggestion_article(query: &str, category: Category) -> NewsArticle {
    let search_terms = format!("{query} news");
    let url = reqwest::Url::parse_with_params(
        FALLBACK_SEARCH_URL,
        [("q", search_terms.as_str()), ("tbm", "nws")],
    )
    .map(String::from)
    .unwrap_or_else(|_| FALLBACK_SEARCH_URL.to_string());

    NewsArticle {
        title: format!("Search for Recent {} News", category.title()),
        description: format!(
            "Live news is unavailable right now. Open this search for the latest {} developments.",
            category.title().to_lowercase()
        ),
        url,
        source: "Search Suggestion".into(),
        published_at: chrono::Utc::now().to_rfc3339(),
        image_url: None,
    }
}

/// Best-effort related news. Without a configured search client, or when
/// nothing usable comes back, the bundle holds a single search suggestion.
pub struct NewsMonitorTask {
    search: Option<Arc<dyn NewsSearch>>,
}

impl NewsMonitorTask {
    pub fn new(search: Option<Arc<dyn NewsSearch>>) -> Self {
        Self { search }
    }

    pub async fn find_news(&self, record: &CaseRecord) -> (NewsBundle, bool) {
        let queries = build_search_queries(
            record.category,
            &record.jurisdiction.state,
            record.jurisdiction.city.as_deref().unwrap_or_default(),
            &record.key_issues,
        );
        let query_used = queries[0].clone();

        let mut collected = Vec::new();
        match &self.search {
            Some(search) => {
                for query in queries.iter().take(MAX_QUERIES) {
                    match search.search(query).await {
                        Ok(articles) => collected.extend(articles),
                        Err(e) => {
                            warn!(error = %e, query = %query, "News search failed");
                            break;
                        }
                    }
                    if collected.len() >= ENOUGH_ARTICLES {
                        break;
                    }
                }
            }
            None => info!("No news search configured, using search suggestion"),
        }

        let articles = dedupe_articles(collected);
        let degraded = articles.is_empty();
        let articles = if degraded {
            vec![suggestion_article(&query_used, record.category)]
        } else {
            articles
        };

        (
            NewsBundle {
                articles,
                query_used,
                category: record.category,
            },
            degraded,
        )
    }
}

#[async_trait]
impl Task for NewsMonitorTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let record: CaseRecord = require(&context, context_keys::TRIAGE)?;

        let (news, degraded) = self.find_news(&record).await;
        if degraded {
            mark_degraded(&context, "news")?;
        }
        info!(
            task_id = %self.id(),
            query_used = %news.query_used,
            count = news.articles.len(),
            degraded,
            "Collected news"
        );

        context.set(context_keys::NEWS, news).await?;
        Ok(TaskResult::new(None, NextAction::Continue))
    }
}
