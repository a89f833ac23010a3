//! Research pipeline: raw items in, payload and summary out.
//!
//! Stages run in order: per-item processing, deduplication, clustering,
//! summarization. Nothing here performs I/O, so a pipeline may be invoked
//! from any thread as long as each call owns its inputs.

use chrono::{DateTime, Utc};
use std::collections::{BTreeSet, HashSet};
use tracing::{debug, info, warn};

use crate::cluster::{cluster_items, DEFAULT_CLUSTER_THRESHOLD};
use crate::config::Settings;
use crate::dedup::{dedupe, DEFAULT_DEDUP_THRESHOLD};
use crate::error::{ErrorCode, ResearchError};
use crate::models::{
    DateRange, PayloadSummary, PipelineMode, ProcessedItem, RawItem, ResearchPayload,
    ResearchRequest, ResearchSummary,
};
use crate::sentiment::{LexiconSentiment, NeutralSentiment, SentimentAnalyzer};
use crate::summary::{summarize, SummaryParts};
use crate::text::{clean_text, extract_keywords, tokenize, DEFAULT_MAX_KEYWORDS};

/// Words appended to the topic to form problem-oriented search phrases.
const PROBLEM_HINTS: [&str; 11] = [
    "problem",
    "issue",
    "bug",
    "error",
    "help",
    "need",
    "stuck",
    "question",
    "anyone else",
    "broken",
    "cannot",
];

const REPLY_WEIGHT: f64 = 0.5;
const SHARE_WEIGHT: f64 = 0.75;

/// Tunable thresholds for one pipeline invocation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PipelineParams {
    pub dedup_threshold: f64,
    pub cluster_threshold: f64,
    pub max_keywords: usize,
}

impl Default for PipelineParams {
    fn default() -> Self {
        Self {
            dedup_threshold: DEFAULT_DEDUP_THRESHOLD,
            cluster_threshold: DEFAULT_CLUSTER_THRESHOLD,
            max_keywords: DEFAULT_MAX_KEYWORDS,
        }
    }
}

impl PipelineParams {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            dedup_threshold: settings.dedup_threshold,
            cluster_threshold: settings.cluster_threshold,
            max_keywords: settings.max_keywords,
        }
    }

    pub fn validate(&self) -> Result<(), ResearchError> {
        for (name, value) in [
            ("dedup_threshold", self.dedup_threshold),
            ("cluster_threshold", self.cluster_threshold),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(ResearchError::new(
                    ErrorCode::InvalidConfig,
                    format!("{} must be within [0, 1], got {}", name, value),
                ));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Per-item derived fields
// ============================================================================

/// Share of the topic's distinct tokens that appear in `tokens`, in [0, 1].
pub fn compute_relevance(tokens: &[String], topic_tokens: &[String]) -> f64 {
    let token_set: HashSet<&str> = tokens.iter().map(String::as_str).collect();
    let topic_set: HashSet<&str> = topic_tokens.iter().map(String::as_str).collect();
    if token_set.is_empty() || topic_set.is_empty() {
        return 0.0;
    }
    let overlap = token_set.intersection(&topic_set).count() as f64;
    (overlap / topic_set.len() as f64).clamp(0.0, 1.0)
}

/// `score + 0.5 * replies + 0.75 * shares`; missing or non-finite fields count as zero.
/// The result is finite and non-negative, saturating at `f64::MAX`.
pub fn compute_engagement(raw: &RawItem) -> f64 {
    fn signal(value: Option<f64>) -> f64 {
        value.filter(|v| v.is_finite()).unwrap_or(0.0)
    }
    let total = signal(raw.score)
        + REPLY_WEIGHT * signal(raw.replies)
        + SHARE_WEIGHT * signal(raw.retweets_or_shares);
    if total.is_finite() {
        total.max(0.0)
    } else {
        f64::MAX
    }
}

/// Deterministic, sorted search phrases derived from the topic.
///
/// Meant for an external collector; no network access happens here.
pub fn build_query_terms(topic: &str) -> Vec<String> {
    let base = clean_text(topic);
    let Some(first_word) = base.split_whitespace().next() else {
        return Vec::new();
    };

    let mut expansions = BTreeSet::new();
    expansions.insert(base.clone());
    for hint in PROBLEM_HINTS {
        expansions.insert(format!("{} {}", base, hint));
    }
    expansions.insert(format!("#{}", first_word));
    expansions.insert(format!("{} help", first_word));
    expansions.into_iter().collect()
}

fn round3(x: f64) -> f64 {
    (x * 1000.0).round() / 1000.0
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value.as_ref().filter(|v| !v.trim().is_empty()).cloned()
}

pub fn process_item(
    raw: &RawItem,
    topic: &str,
    topic_tokens: &[String],
    analyzer: &dyn SentimentAnalyzer,
    created_at: DateTime<Utc>,
    max_keywords: usize,
) -> ProcessedItem {
    let tokens = tokenize(&raw.text);

    ProcessedItem {
        id: raw.id.clone().unwrap_or_default(),
        platform: non_empty(&raw.platform).unwrap_or_else(|| "unknown".to_string()),
        author: raw.author.clone().unwrap_or_default(),
        timestamp: non_empty(&raw.timestamp).unwrap_or_else(|| created_at.to_rfc3339()),
        text: raw.text.clone(),
        clean_text: clean_text(&raw.text),
        score: raw.score,
        replies: raw.replies,
        retweets_or_shares: raw.retweets_or_shares,
        url: non_empty(&raw.url),
        subreddit_or_hashtag: raw.subreddit_or_hashtag.clone(),
        language: non_empty(&raw.language).unwrap_or_else(|| "en".to_string()),
        sentiment: analyzer.polarity_scores(&raw.text),
        keywords: extract_keywords(&tokens, max_keywords),
        relevance: round3(compute_relevance(&tokens, topic_tokens)),
        removed_content_flag: raw.removed_content_flag.unwrap_or(false),
        engagement_score: compute_engagement(raw),
        source_topic: topic.to_string(),
        tokens,
    }
}

// ============================================================================
// Orchestration
// ============================================================================

/// Run every stage and assemble the payload plus standalone summary.
pub fn run_pipeline(
    run_id: &str,
    request: &ResearchRequest,
    raw_items: &[RawItem],
    analyzer: &dyn SentimentAnalyzer,
    params: PipelineParams,
    mode: PipelineMode,
) -> Result<(ResearchPayload, ResearchSummary), ResearchError> {
    params.validate()?;

    let created_at = Utc::now();
    let topic_tokens = tokenize(&request.topic);

    info!(
        "Pipeline started - run_id={}, topic='{}', items={}, mode={}",
        run_id,
        request.topic,
        raw_items.len(),
        mode.as_str()
    );

    let processed: Vec<ProcessedItem> = raw_items
        .iter()
        .map(|raw| {
            process_item(
                raw,
                &request.topic,
                &topic_tokens,
                analyzer,
                created_at,
                params.max_keywords,
            )
        })
        .collect();

    let items = dedupe(processed, params.dedup_threshold);
    debug!("Deduplicated items - kept={}", items.len());

    let clusters = cluster_items(&items, &topic_tokens, params.cluster_threshold);
    let SummaryParts {
        headline,
        pain_points,
        hypotheses,
        actions,
        top_sources,
    } = summarize(&request.topic, &clusters, &items, created_at);
    let confidence = SummaryParts::confidence(clusters.len());

    info!(
        "Pipeline finished - run_id={}, items={}, clusters={}, confidence={}",
        run_id,
        items.len(),
        clusters.len(),
        confidence.as_str()
    );

    let payload = ResearchPayload {
        run_id: run_id.to_string(),
        topic: request.topic.clone(),
        sources: request.sources.clone(),
        depth: request.depth,
        sample_limit: request.sample_limit,
        query_terms: build_query_terms(&request.topic),
        date_range: DateRange {
            from: request.from_date,
            to: request.to_date,
        },
        created_at,
        items,
        clusters,
        summary: PayloadSummary {
            top_pain_points: pain_points.clone(),
            recommended_actions: actions.clone(),
            product_hypotheses: hypotheses.clone(),
            top_sources: top_sources.clone(),
        },
        pipeline_mode: mode,
    };

    let summary = ResearchSummary {
        run_id: run_id.to_string(),
        topic: request.topic.clone(),
        created_at,
        summary_text: headline,
        top_pain_points: pain_points,
        product_hypotheses: hypotheses,
        recommended_actions: actions,
        top_sources,
        confidence,
    };

    Ok((payload, summary))
}

// ============================================================================
// Pipeline strategies
// ============================================================================

/// One capability: turn a request and its raw items into results.
pub trait ResearchPipeline: Send + Sync {
    fn mode(&self) -> PipelineMode;

    fn process(
        &self,
        run_id: &str,
        request: &ResearchRequest,
        raw_items: &[RawItem],
    ) -> Result<(ResearchPayload, ResearchSummary), ResearchError>;
}

/// Heuristic pipeline parameterized by its sentiment analyzer.
#[derive(Debug, Clone)]
pub struct HeuristicPipeline<A> {
    analyzer: A,
    params: PipelineParams,
    mode: PipelineMode,
}

/// Neutral sentiment; used when no analyzer is wanted.
pub type LitePipeline = HeuristicPipeline<NeutralSentiment>;
/// Lexicon sentiment scoring.
pub type FullPipeline = HeuristicPipeline<LexiconSentiment>;

impl LitePipeline {
    pub fn lite(params: PipelineParams) -> Self {
        Self {
            analyzer: NeutralSentiment,
            params,
            mode: PipelineMode::Lite,
        }
    }
}

impl FullPipeline {
    pub fn full(params: PipelineParams) -> Self {
        Self {
            analyzer: LexiconSentiment::new(),
            params,
            mode: PipelineMode::Full,
        }
    }
}

impl<A: SentimentAnalyzer> HeuristicPipeline<A> {
    pub fn params(&self) -> PipelineParams {
        self.params
    }
}

impl<A: SentimentAnalyzer> ResearchPipeline for HeuristicPipeline<A> {
    fn mode(&self) -> PipelineMode {
        self.mode
    }

    fn process(
        &self,
        run_id: &str,
        request: &ResearchRequest,
        raw_items: &[RawItem],
    ) -> Result<(ResearchPayload, ResearchSummary), ResearchError> {
        run_pipeline(
            run_id,
            request,
            raw_items,
            &self.analyzer,
            self.params,
            self.mode,
        )
    }
}

/// Pick the pipeline implementation from configuration, once, at startup.
pub fn select_pipeline(settings: &Settings) -> Box<dyn ResearchPipeline> {
    let params = PipelineParams::from_settings(settings);
    if let Err(e) = params.validate() {
        warn!("Configured thresholds rejected ({}), runs will fail until fixed", e);
    }
    match settings.pipeline_mode {
        PipelineMode::Full => Box::new(FullPipeline::full(params)),
        PipelineMode::Lite => Box::new(LitePipeline::lite(params)),
    }
}
