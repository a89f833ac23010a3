//! Record types shared by the pipeline, the run orchestrator and the CLI.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::cluster::Cluster;
use crate::error::{ErrorCode, ResearchError};
use crate::sentiment::SentimentScores;

pub const MIN_TOPIC_CHARS: usize = 3;
pub const MAX_SAMPLE_LIMIT: u32 = 1000;

// ============================================================================
// Request
// ============================================================================

/// Platforms a run may draw items from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Source {
    Reddit,
    X,
}

impl Source {
    pub fn as_str(&self) -> &'static str {
        match self {
            Source::Reddit => "reddit",
            Source::X => "x",
        }
    }

    pub fn all() -> Vec<Source> {
        vec![Source::Reddit, Source::X]
    }
}

impl std::str::FromStr for Source {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "reddit" => Ok(Source::Reddit),
            "x" | "twitter" => Ok(Source::X),
            other => Err(format!("Unknown source: {}. Use 'reddit' or 'x'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum ResearchDepth {
    #[default]
    Default,
    Deep,
}

impl std::str::FromStr for ResearchDepth {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "default" => Ok(ResearchDepth::Default),
            "deep" => Ok(ResearchDepth::Deep),
            other => Err(format!("Unknown depth: {}. Use 'default' or 'deep'", other)),
        }
    }
}

fn default_sources() -> Vec<Source> {
    Source::all()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchRequest {
    pub topic: String,
    #[serde(default)]
    pub from_date: Option<NaiveDate>,
    #[serde(default)]
    pub to_date: Option<NaiveDate>,
    #[serde(default)]
    pub depth: ResearchDepth,
    #[serde(default = "default_sources")]
    pub sources: Vec<Source>,
    #[serde(default)]
    pub sample_limit: Option<u32>,
}

impl ResearchRequest {
    pub fn new(topic: impl Into<String>) -> Self {
        Self {
            topic: topic.into(),
            from_date: None,
            to_date: None,
            depth: ResearchDepth::Default,
            sources: default_sources(),
            sample_limit: None,
        }
    }

    /// Reject malformed requests before a run is created.
    pub fn validate(&self) -> Result<(), ResearchError> {
        let topic_len = self.topic.trim().chars().count();
        if topic_len < MIN_TOPIC_CHARS {
            return Err(ResearchError::invalid_request(format!(
                "Topic must be at least {} characters",
                MIN_TOPIC_CHARS
            ))
            .with_details(format!("topic='{}'", self.topic)));
        }

        if self.sources.is_empty() {
            return Err(ResearchError::invalid_request(
                "At least one source is required",
            ));
        }

        if let Some(limit) = self.sample_limit {
            if limit == 0 || limit > MAX_SAMPLE_LIMIT {
                return Err(ResearchError::invalid_request(format!(
                    "Sample limit must be between 1 and {}",
                    MAX_SAMPLE_LIMIT
                )));
            }
        }

        if let (Some(from), Some(to)) = (self.from_date, self.to_date) {
            if from > to {
                return Err(ResearchError::invalid_request(format!(
                    "from_date {} is after to_date {}",
                    from, to
                )));
            }
        }

        Ok(())
    }
}

// ============================================================================
// Items
// ============================================================================

/// An item as supplied by a collector. Only `text` carries meaning.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RawItem {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default)]
    pub platform: Option<String>,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub replies: Option<f64>,
    #[serde(default, alias = "shares")]
    pub retweets_or_shares: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub subreddit_or_hashtag: Option<String>,
    #[serde(default)]
    pub language: Option<String>,
    #[serde(default)]
    pub removed_content_flag: Option<bool>,
}

impl RawItem {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// Parse a collector's JSON array of items.
pub fn parse_raw_items(json: &str) -> Result<Vec<RawItem>, ResearchError> {
    serde_json::from_str(json).map_err(|e| {
        ResearchError::new(ErrorCode::ParseError, format!("Invalid item list: {}", e))
    })
}

/// A raw item plus everything the pipeline derives from it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProcessedItem {
    pub id: String,
    pub platform: String,
    pub author: String,
    pub timestamp: String,
    pub text: String,
    pub clean_text: String,
    pub tokens: Vec<String>,
    pub score: Option<f64>,
    pub replies: Option<f64>,
    pub retweets_or_shares: Option<f64>,
    pub url: Option<String>,
    pub subreddit_or_hashtag: Option<String>,
    pub language: String,
    pub sentiment: SentimentScores,
    pub keywords: Vec<String>,
    pub relevance: f64,
    pub removed_content_flag: bool,
    pub engagement_score: f64,
    pub source_topic: String,
}

impl ProcessedItem {
    /// Non-empty URL, if any.
    pub fn link(&self) -> Option<&str> {
        self.url.as_deref().filter(|u| !u.trim().is_empty())
    }
}

// ============================================================================
// Results
// ============================================================================

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum PipelineMode {
    Lite,
    #[default]
    Full,
}

impl PipelineMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineMode::Lite => "lite",
            PipelineMode::Full => "full",
        }
    }
}

impl std::str::FromStr for PipelineMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "lite" => Ok(PipelineMode::Lite),
            "full" => Ok(PipelineMode::Full),
            other => Err(format!("Unknown pipeline mode: {}. Use 'lite' or 'full'", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::Low => "low",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

/// Standalone summary record of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchSummary {
    pub run_id: String,
    pub topic: String,
    pub created_at: DateTime<Utc>,
    pub summary_text: String,
    pub top_pain_points: Vec<String>,
    pub product_hypotheses: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub top_sources: Vec<String>,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DateRange {
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

/// Summary block embedded in the payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PayloadSummary {
    pub top_pain_points: Vec<String>,
    pub recommended_actions: Vec<String>,
    pub product_hypotheses: Vec<String>,
    pub top_sources: Vec<String>,
}

/// Full structured output of a run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResearchPayload {
    pub run_id: String,
    pub topic: String,
    pub sources: Vec<Source>,
    pub depth: ResearchDepth,
    pub sample_limit: Option<u32>,
    pub query_terms: Vec<String>,
    pub date_range: DateRange,
    pub created_at: DateTime<Utc>,
    pub items: Vec<ProcessedItem>,
    pub clusters: Vec<Cluster>,
    pub summary: PayloadSummary,
    pub pipeline_mode: PipelineMode,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_raw_items() {
        let items =
            parse_raw_items(r#"[{"text":"sync broke","shares":3},{"text":"again"}]"#).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[0].retweets_or_shares, Some(3.0));

        let error = parse_raw_items(r#"{"text":"not a list"}"#).unwrap_err();
        assert_eq!(error.code, ErrorCode::ParseError);
        assert!(error.message.starts_with("Invalid item list"));
    }

    #[test]
    fn test_request_defaults_from_json() {
        let request: ResearchRequest = serde_json::from_str(r#"{"topic":"vpn setup"}"#).unwrap();
        assert_eq!(request.sources, vec![Source::Reddit, Source::X]);
        assert_eq!(request.depth, ResearchDepth::Default);
        assert!(request.sample_limit.is_none());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_rejects_short_topic() {
        let error = ResearchRequest::new("  ab ").validate().unwrap_err();
        assert!(error.message.contains("at least 3"));
        assert!(error.requires_user_action);
    }

    #[test]
    fn test_request_rejects_bad_sample_limit() {
        let mut request = ResearchRequest::new("router firmware");
        request.sample_limit = Some(0);
        assert!(request.validate().is_err());
        request.sample_limit = Some(1001);
        assert!(request.validate().is_err());
        request.sample_limit = Some(1000);
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_rejects_inverted_dates_and_no_sources() {
        let mut request = ResearchRequest::new("router firmware");
        request.from_date = NaiveDate::from_ymd_opt(2024, 5, 2);
        request.to_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        assert!(request.validate().is_err());

        let mut request = ResearchRequest::new("router firmware");
        request.sources.clear();
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_unknown_source_rejected() {
        assert!(serde_json::from_str::<Source>("\"mastodon\"").is_err());
        assert_eq!("Reddit".parse::<Source>().unwrap(), Source::Reddit);
        assert!("mastodon".parse::<Source>().is_err());
    }

    #[test]
    fn test_raw_item_accepts_shares_alias() {
        let item: RawItem =
            serde_json::from_str(r#"{"text":"hi","score":3,"shares":4}"#).unwrap();
        assert_eq!(item.retweets_or_shares, Some(4.0));
        assert_eq!(item.score, Some(3.0));
        assert!(item.url.is_none());
    }
}
