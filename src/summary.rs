//! Ranking and summary synthesis over finished clusters.

use chrono::{DateTime, Utc};
use std::cmp::Ordering;

use crate::cluster::Cluster;
use crate::models::{Confidence, ProcessedItem};

const MAX_PAIN_POINTS: usize = 5;
const MAX_HYPOTHESES: usize = 3;
const MAX_TOP_SOURCES: usize = 10;

/// Actions recommended for every run, independent of the data.
pub const RECOMMENDED_ACTIONS: [&str; 3] = [
    "Review cluster representatives with the highest engagement for qualitative follow-up interviews.",
    "Schedule community monitoring to verify if pain points persist over the next week.",
    "Share findings with product/support teams to validate feasibility of quick fixes.",
];

/// The synthesized parts of a summary, before they are wrapped into records.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryParts {
    pub headline: String,
    pub pain_points: Vec<String>,
    pub hypotheses: Vec<String>,
    pub actions: Vec<String>,
    pub top_sources: Vec<String>,
}

impl SummaryParts {
    /// `low` with no clusters, `medium` otherwise.
    pub fn confidence(cluster_count: usize) -> Confidence {
        if cluster_count == 0 {
            Confidence::Low
        } else {
            Confidence::Medium
        }
    }
}

/// Order clusters by average engagement, then size, both descending.
///
/// The sort is stable, so fully tied clusters keep creation order.
pub fn rank_clusters(clusters: &[Cluster]) -> Vec<&Cluster> {
    let mut ranked: Vec<&Cluster> = clusters.iter().collect();
    ranked.sort_by(|a, b| {
        b.avg_engagement
            .partial_cmp(&a.avg_engagement)
            .unwrap_or(Ordering::Equal)
            .then_with(|| b.count.cmp(&a.count))
    });
    ranked
}

pub fn summarize(
    topic: &str,
    clusters: &[Cluster],
    items: &[ProcessedItem],
    created_at: DateTime<Utc>,
) -> SummaryParts {
    if clusters.is_empty() {
        return SummaryParts {
            headline: format!(
                "No publicly available Reddit or X posts were collected for '{}' during this run. \
                 Kivo heuristic pipeline executed successfully.",
                topic
            ),
            pain_points: Vec::new(),
            hypotheses: Vec::new(),
            actions: Vec::new(),
            top_sources: Vec::new(),
        };
    }

    let ranked = rank_clusters(clusters);

    let pain_points = ranked
        .iter()
        .take(MAX_PAIN_POINTS)
        .filter_map(|c| c.statements.first().cloned())
        .collect();

    // Top three ranked clusters, skipping any without tags
    let hypotheses = ranked
        .iter()
        .take(MAX_HYPOTHESES)
        .filter_map(|c| {
            c.tags.first().map(|tag| {
                format!(
                    "Consider simplifying workflows related to {} based on {} signals.",
                    tag, c.count
                )
            })
        })
        .collect();

    let top_sources = items
        .iter()
        .filter_map(|item| item.link())
        .take(MAX_TOP_SOURCES)
        .map(str::to_string)
        .collect();

    SummaryParts {
        headline: format!(
            "Identified {} discussion cluster(s) about '{}' on Reddit and X as of {}. \
             Insights generated via heuristic pipeline.",
            clusters.len(),
            topic,
            created_at.date_naive()
        ),
        pain_points,
        hypotheses,
        actions: RECOMMENDED_ACTIONS.iter().map(|s| s.to_string()).collect(),
        top_sources,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::item;
    use chrono::TimeZone;

    fn cluster(id: usize, avg: f64, count: usize, tags: &[&str]) -> Cluster {
        Cluster {
            cluster_id: id,
            representative_text: format!("rep {}", id),
            statements: vec![format!("statement {}", id)],
            count,
            percent_of_total: 0.0,
            avg_engagement: avg,
            confidence: 0.0,
            examples: Vec::new(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            item_indices: Vec::new(),
        }
    }

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 9, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_summarize_no_clusters() {
        let parts = summarize("test topic", &[], &[], created());
        assert!(parts.headline.contains("'test topic'"));
        assert!(parts.headline.starts_with("No publicly available"));
        assert!(parts.pain_points.is_empty());
        assert!(parts.hypotheses.is_empty());
        assert!(parts.actions.is_empty());
        assert!(parts.top_sources.is_empty());
        assert_eq!(SummaryParts::confidence(0), Confidence::Low);
    }

    #[test]
    fn test_rank_by_engagement_then_count() {
        let clusters = vec![
            cluster(1, 5.0, 1, &["a"]),
            cluster(2, 9.0, 1, &["b"]),
            cluster(3, 5.0, 4, &["c"]),
            cluster(4, 5.0, 1, &["d"]),
        ];
        let ids: Vec<usize> = rank_clusters(&clusters).iter().map(|c| c.cluster_id).collect();
        assert_eq!(ids, vec![2, 3, 1, 4]);
    }

    #[test]
    fn test_pain_points_and_hypotheses_limits() {
        let clusters: Vec<Cluster> = (1..=7)
            .map(|i| cluster(i, i as f64, 1, &["tag"]))
            .collect();
        let parts = summarize("printers", &clusters, &[], created());
        assert_eq!(parts.pain_points.len(), 5);
        assert_eq!(parts.pain_points[0], "statement 7");
        assert_eq!(parts.hypotheses.len(), 3);
        assert_eq!(
            parts.hypotheses[0],
            "Consider simplifying workflows related to tag based on 1 signals."
        );
        assert_eq!(parts.actions.len(), 3);
        assert_eq!(
            parts.headline,
            "Identified 7 discussion cluster(s) about 'printers' on Reddit and X as of 2024-03-09. \
             Insights generated via heuristic pipeline."
        );
    }

    #[test]
    fn test_hypotheses_skip_untagged_in_top_three() {
        let clusters = vec![
            cluster(1, 3.0, 1, &[]),
            cluster(2, 2.0, 1, &["beta"]),
            cluster(3, 1.0, 1, &["gamma"]),
            cluster(4, 0.5, 1, &["delta"]),
        ];
        let parts = summarize("topic", &clusters, &[], created());
        assert_eq!(parts.hypotheses.len(), 2);
        assert!(parts.hypotheses[0].contains("beta"));
        assert!(parts.hypotheses[1].contains("gamma"));
    }

    #[test]
    fn test_top_sources_in_item_order() {
        let items: Vec<ProcessedItem> = (0..15)
            .map(|i| {
                let mut it = item(&format!("post number {}", i));
                it.url = if i % 3 == 0 {
                    None
                } else {
                    Some(format!("https://example.com/{}", i))
                };
                it
            })
            .collect();
        let parts = summarize("topic", &[cluster(1, 0.0, 15, &["post"])], &items, created());
        assert_eq!(parts.top_sources.len(), 10);
        assert_eq!(parts.top_sources[0], "https://example.com/1");
        assert_eq!(parts.top_sources[2], "https://example.com/4");
    }
}
