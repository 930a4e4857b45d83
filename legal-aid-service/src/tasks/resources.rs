use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use legal_flow::{Context, GraphError, NextAction, Result, Task, TaskResult};
use thiserror::Error;
use tracing::info;

use super::types::{context_keys, require};
use crate::models::{CaseRecord, Category, ResourceEntry, ResourceList};

#[derive(Debug, Error)]
pub enum ResourceError {
    #[error("resource dataset not found at {0}")]
    Missing(PathBuf),

    #[error("failed to read resource dataset: {0}")]
    Io(#[from] std::io::Error),

    #[error("resource dataset is not valid JSON: {0}")]
    Parse(#[from] serde_json::Error),
}

const US_STATES: &[(&str, &str)] = &[
    ("al", "alabama"), ("ak", "alaska"), ("az", "arizona"), ("ar", "arkansas"),
    ("ca", "california"), ("co", "colorado"), ("ct", "connecticut"), ("de", "delaware"),
    ("dc", "district of columbia"), ("fl", "florida"), ("ga", "georgia"), ("hi", "hawaii"),
    ("id", "idaho"), ("il", "illinois"), ("in", "indiana"), ("ia", "iowa"),
    ("ks", "kansas"), ("ky", "kentucky"), ("la", "louisiana"), ("me", "maine"),
    ("md", "maryland"), ("ma", "massachusetts"), ("mi", "michigan"), ("mn", "minnesota"),
    ("ms", "mississippi"), ("mo", "missouri"), ("mt", "montana"), ("ne", "nebraska"),
    ("nv", "nevada"), ("nh", "new hampshire"), ("nj", "new jersey"), ("nm", "new mexico"),
    ("ny", "new york"), ("nc", "north carolina"), ("nd", "north dakota"), ("oh", "ohio"),
    ("ok", "oklahoma"), ("or", "oregon"), ("pa", "pennsylvania"), ("ri", "rhode island"),
    ("sc", "south carolina"), ("sd", "south dakota"), ("tn", "tennessee"), ("tx", "texas"),
    ("ut", "utah"), ("vt", "vermont"), ("va", "virginia"), ("wa", "washington"),
    ("wv", "west virginia"), ("wi", "wisconsin"), ("wy", "wyoming"),
];

/// category -> jurisdiction ("federal" or a lower-cased state) -> entries
#[derive(Debug, Clone, Default)]
pub struct ResourceCatalog {
    entries: HashMap<String, HashMap<String, Vec<ResourceEntry>>>,
}

impl ResourceCatalog {
    pub async fn load(path: &Path) -> std::result::Result<Self, ResourceError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(ResourceError::Missing(path.to_path_buf()));
            }
            Err(e) => return Err(e.into()),
        };
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> std::result::Result<Self, ResourceError> {
        Ok(Self {
            entries: serde_json::from_str(raw)?,
        })
    }

    /// Federal entries followed by the state's entries.
    pub fn find(&self, category: Category, state: &str) -> Vec<ResourceEntry> {
        let Some(by_jurisdiction) = self
            .entries
            .get(category.as_str())
            .or_else(|| self.entries.get(Category::General.as_str()))
        else {
            return Vec::new();
        };

        let mut resources = by_jurisdiction.get("federal").cloned().unwrap_or_default();
        if let Some(state_entries) = state_keys(state)
            .iter()
            .find_map(|key| by_jurisdiction.get(key))
        {
            resources.extend(state_entries.iter().cloned());
        }
        resources
    }
}

/// Lookup keys for a state, most specific first: the lower-cased value and,
/// for a two-letter code, the full state name.
fn state_keys(state: &str) -> Vec<String> {
    let key = state.trim().to_lowercase();
    if key.is_empty() {
        return Vec::new();
    }
    let mut keys = vec![key.clone()];
    if let Some((_, name)) = US_STATES.iter().find(|(code, _)| *code == key) {
        keys.push(name.to_string());
    }
    keys
}

/// Looks up static aid resources for the case. The dataset is read on every
/// run; a missing or broken dataset fails the request.
pub struct ResourceConnectorTask {
    dataset_path: PathBuf,
}

impl ResourceConnectorTask {
    pub fn new(dataset_path: impl Into<PathBuf>) -> Self {
        Self {
            dataset_path: dataset_path.into(),
        }
    }

    pub async fn find_resources(
        &self,
        record: &CaseRecord,
    ) -> std::result::Result<ResourceList, ResourceError> {
        let catalog = ResourceCatalog::load(&self.dataset_path).await?;
        Ok(ResourceList {
            resources: catalog.find(record.category, &record.jurisdiction.state),
            category: record.category,
        })
    }
}

#[async_trait]
impl Task for ResourceConnectorTask {
    async fn run(&self, context: Context) -> Result<TaskResult> {
        let record: CaseRecord = require(&context, context_keys::TRIAGE)?;

        let resources = self
            .find_resources(&record)
            .await
            .map_err(|e| GraphError::TaskExecutionFailed(format!("Resource lookup failed: {e}")))?;

        info!(
            task_id = %self.id(),
            category = %record.category,
            count = resources.resources.len(),
            "Found resources"
        );
        context.set(context_keys::RESOURCES, resources).await?;
        Ok(TaskResult::new(None, NextAction::Continue))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Jurisdiction;

    const DATASET: &str = r#"{
        "employment": {
            "federal": [
                {"name": "U.S. Department of Labor - Wage and Hour Division", "phone": "1-866-487-9243",
                 "website": "https://www.dol.gov/agencies/whd", "services": "Wage complaints", "eligibility": "All workers"}
            ],
            "massachusetts": [
                {"name": "Massachusetts Attorney General Fair Labor Division", "phone": "617-727-3465",
                 "website": "https://www.mass.gov/fair-labor", "services": "Wage theft", "eligibility": "MA workers"},
                {"name": "Greater Boston Legal Services", "website": "https://www.gbls.org",
                 "services": "Free legal help", "eligibility": "Low income"}
            ]
        },
        "general": {
            "federal": [
                {"name": "LawHelp.org", "website": "https://www.lawhelp.org", "services": "Directory", "eligibility": "Anyone"}
            ]
        }
    }"#;

    fn names(entries: &[ResourceEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.name.as_str()).collect()
    }

    #[test]
    fn federal_entries_come_first() {
        let catalog = ResourceCatalog::from_json(DATASET).unwrap();
        let found = catalog.find(Category::Employment, "massachusetts");
        assert_eq!(
            names(&found),
            vec![
                "U.S. Department of Labor - Wage and Hour Division",
                "Massachusetts Attorney General Fair Labor Division",
                "Greater Boston Legal Services",
            ]
        );
        assert!(found[2].phone.is_none());
    }

    #[test]
    fn state_lookup_is_case_insensitive_and_expands_codes() {
        let catalog = ResourceCatalog::from_json(DATASET).unwrap();
        assert_eq!(catalog.find(Category::Employment, "Massachusetts").len(), 3);
        assert_eq!(catalog.find(Category::Employment, "MA").len(), 3);
        assert_eq!(catalog.find(Category::Employment, "Ohio").len(), 1);
        assert_eq!(catalog.find(Category::Employment, "").len(), 1);
    }

    #[test]
    fn unknown_category_uses_general() {
        let catalog = ResourceCatalog::from_json(DATASET).unwrap();
        assert_eq!(names(&catalog.find(Category::Family, "ma")), vec!["LawHelp.org"]);
        assert!(ResourceCatalog::default().find(Category::Family, "ma").is_empty());
    }

    #[tokio::test]
    async fn missing_dataset_fails_the_task() {
        let dir = tempfile::tempdir().unwrap();
        let task = ResourceConnectorTask::new(dir.path().join("resources.json"));
        let context = Context::new();
        context
            .set(context_keys::TRIAGE, CaseRecord::fallback("Boston, MA"))
            .await
            .unwrap();

        let err = task.run(context).await.unwrap_err();
        assert!(matches!(err, GraphError::TaskExecutionFailed(msg) if msg.contains("not found")));
    }

    #[tokio::test]
    async fn run_reads_dataset_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("resources.json");
        std::fs::write(&path, DATASET).unwrap();

        let record = CaseRecord {
            category: Category::Employment,
            jurisdiction: Jurisdiction {
                state: "massachusetts".into(),
                city: None,
            },
            ..CaseRecord::fallback("")
        };
        let list = ResourceConnectorTask::new(&path)
            .find_resources(&record)
            .await
            .unwrap();
        assert_eq!(list.category, Category::Employment);
        assert_eq!(list.resources.len(), 3);
    }

    #[test]
    fn broken_json_is_a_parse_error() {
        assert!(matches!(
            ResourceCatalog::from_json("{ nope"),
            Err(ResourceError::Parse(_))
        ));
    }
}
