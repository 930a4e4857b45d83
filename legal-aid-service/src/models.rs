use serde::{Deserialize, Serialize};
use std::fmt;

/// Legal area a case is classified into
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Category {
    Immigration,
    Housing,
    Employment,
    Criminal,
    Consumer,
    Family,
    #[default]
    General,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Immigration => "immigration",
            Category::Housing => "housing",
            Category::Employment => "employment",
            Category::Criminal => "criminal",
            Category::Consumer => "consumer",
            Category::Family => "family",
            Category::General => "general",
        }
    }

    /// Capitalised name used in user-facing text
    pub fn title(&self) -> &'static str {
        match self {
            Category::Immigration => "Immigration",
            Category::Housing => "Housing",
            Category::Employment => "Employment",
            Category::Criminal => "Criminal",
            Category::Consumer => "Consumer",
            Category::Family => "Family",
            Category::General => "Legal",
        }
    }
}

impl From<String> for Category {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "immigration" => Category::Immigration,
            "housing" => Category::Housing,
            "employment" => Category::Employment,
            "criminal" => Category::Criminal,
            "consumer" => Category::Consumer,
            "family" => Category::Family,
            _ => Category::General,
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum Urgency {
    Low,
    #[default]
    Medium,
    High,
    Critical,
}

impl From<String> for Urgency {
    fn from(value: String) -> Self {
        match value.trim().to_lowercase().as_str() {
            "low" => Urgency::Low,
            "high" => Urgency::High,
            "critical" => Urgency::Critical,
            _ => Urgency::Medium,
        }
    }
}

/// Drives which safety guidance accompanies the result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SituationType {
    ActiveViolence,
    MentalHealthCrisis,
    PastViolence,
    #[default]
    LegalDispute,
}

impl SituationType {
    /// Lenient parse of model output; `None` for anything unrecognised
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "active_violence" => Some(SituationType::ActiveViolence),
            "mental_health_crisis" => Some(SituationType::MentalHealthCrisis),
            "past_violence" => Some(SituationType::PastViolence),
            "legal_dispute" => Some(SituationType::LegalDispute),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Jurisdiction {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

/// Structured classification of the user's situation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseRecord {
    pub category: Category,
    pub jurisdiction: Jurisdiction,
    pub urgency: Urgency,
    pub requires_lawyer: bool,
    pub key_issues: Vec<String>,
    pub situation_type: SituationType,
}

impl CaseRecord {
    /// Record used when the model output cannot be parsed.
    ///
    /// The state is whatever follows the last comma of the location string.
    pub fn fallback(location: &str) -> Self {
        Self {
            category: Category::General,
            jurisdiction: Jurisdiction {
                state: state_from_location(location),
                city: None,
            },
            urgency: Urgency::Medium,
            requires_lawyer: false,
            key_issues: Vec::new(),
            situation_type: SituationType::LegalDispute,
        }
    }
}

pub fn state_from_location(location: &str) -> String {
    location
        .rsplit(',')
        .next()
        .unwrap_or_default()
        .trim()
        .to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceMetadata {
    pub source: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RightsResult {
    pub explanation: String,
    pub sources: Vec<SourceMetadata>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    pub action_plan: String,
}

/// Kind of letter drafted for the user, picked from the category alone
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    WageDemand,
    LandlordComplaint,
    NoticeLetter,
}

impl DocumentKind {
    pub fn for_category(category: Category) -> Self {
        match category {
            Category::Employment => DocumentKind::WageDemand,
            Category::Housing => DocumentKind::LandlordComplaint,
            _ => DocumentKind::NoticeLetter,
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            DocumentKind::WageDemand => "demand letter for unpaid wages",
            DocumentKind::LandlordComplaint => "formal complaint to landlord",
            DocumentKind::NoticeLetter => "formal notice letter",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceEntry {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(default)]
    pub website: String,
    #[serde(default)]
    pub services: String,
    #[serde(default)]
    pub eligibility: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResourceList {
    pub resources: Vec<ResourceEntry>,
    pub category: Category,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewsArticle {
    pub title: String,
    pub description: String,
    pub url: String,
    pub source: String,
    pub published_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewsBundle {
    pub articles: Vec<NewsArticle>,
    pub query_used: String,
    pub category: Category,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AlertLevel {
    Emergency,
    Crisis,
    HighPriority,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub detail: String,
}

/// Safety guidance shown ahead of the legal content
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SafetyAlert {
    pub level: AlertLevel,
    pub headline: String,
    pub guidance: Vec<String>,
    pub contacts: Vec<Contact>,
}

/// Everything the pipeline produced for one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FinalResult {
    pub triage: CaseRecord,
    pub rights: RightsResult,
    pub actions: ActionResult,
    pub document: String,
    pub document_type: DocumentKind,
    pub resources: ResourceList,
    pub news: NewsBundle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alert: Option<SafetyAlert>,
    #[serde(default)]
    pub degraded_steps: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryRequest {
    pub query: String,
    #[serde(default)]
    pub location: String,
}
