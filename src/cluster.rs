use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{debug, info};

use crate::models::ProcessedItem;
use crate::similarity::jaccard;
use crate::text::{extract_keywords, DEFAULT_MAX_KEYWORDS};

/// Default similarity an item needs to join an existing cluster.
pub const DEFAULT_CLUSTER_THRESHOLD: f64 = 0.6;

const MAX_EXAMPLES: usize = 2;
const FALLBACK_KEYWORD_CHARS: usize = 50;

/// A group of items assigned together, with its derived statistics.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Cluster {
    pub cluster_id: usize,
    pub representative_text: String,
    pub statements: Vec<String>,
    pub count: usize,
    pub percent_of_total: f64,
    pub avg_engagement: f64,
    pub confidence: f64,
    pub examples: Vec<String>,
    pub tags: Vec<String>,
    /// Positions of the members in the deduplicated item list.
    pub item_indices: Vec<usize>,
}

/// Clustering state: members plus the union of their tokens.
///
/// Tokens are kept in first-insertion order so tags are deterministic.
struct Group {
    members: Vec<usize>,
    tokens: Vec<String>,
    seen: HashSet<String>,
}

impl Group {
    fn seeded(index: usize, tokens: &[String]) -> Self {
        let mut group = Group {
            members: vec![index],
            tokens: Vec::new(),
            seen: HashSet::new(),
        };
        group.absorb(tokens);
        group
    }

    // Union only ever grows the set
    fn absorb(&mut self, tokens: &[String]) {
        for token in tokens {
            if self.seen.insert(token.clone()) {
                self.tokens.push(token.clone());
            }
        }
    }
}

/// Greedy single-pass clustering in input order.
///
/// Each item joins the *first* cluster (in creation order) whose accumulated
/// token set reaches `threshold`, otherwise it seeds a new cluster. A seed
/// without tokens borrows the topic tokens so the cluster stays matchable.
pub fn cluster_items(
    items: &[ProcessedItem],
    topic_tokens: &[String],
    threshold: f64,
) -> Vec<Cluster> {
    debug!(
        "Clustering started - items={}, threshold={}",
        items.len(),
        threshold
    );

    let mut groups: Vec<Group> = Vec::new();

    for (index, item) in items.iter().enumerate() {
        let target = groups
            .iter()
            .position(|group| jaccard(&item.tokens, &group.tokens) >= threshold);

        match target {
            Some(g) => {
                groups[g].members.push(index);
                groups[g].absorb(&item.tokens);
            }
            None if item.tokens.is_empty() => groups.push(Group::seeded(index, topic_tokens)),
            None => groups.push(Group::seeded(index, &item.tokens)),
        }
    }

    let clusters: Vec<Cluster> = groups
        .iter()
        .enumerate()
        .map(|(i, group)| describe_cluster(i + 1, group, items))
        .collect();

    if !clusters.is_empty() {
        let max_size = clusters.iter().map(|c| c.count).max().unwrap_or(0);
        info!(
            "Clustering finished - items={}, clusters={}, largest={}",
            items.len(),
            clusters.len(),
            max_size
        );
    }

    clusters
}

fn describe_cluster(cluster_id: usize, group: &Group, items: &[ProcessedItem]) -> Cluster {
    let members: Vec<&ProcessedItem> = group.members.iter().map(|&i| &items[i]).collect();

    // Highest engagement wins, first member on ties
    let mut representative = members[0];
    for member in &members[1..] {
        if member.engagement_score > representative.engagement_score {
            representative = member;
        }
    }

    let top_keyword = extract_keywords(&representative.tokens, 1)
        .into_iter()
        .next()
        .unwrap_or_else(|| {
            representative
                .clean_text
                .chars()
                .take(FALLBACK_KEYWORD_CHARS)
                .collect()
        });
    let discussed = if representative.source_topic.is_empty() {
        "this topic"
    } else {
        representative.source_topic.as_str()
    };
    let statements = vec![format!(
        "Users are having challenges related to '{}' when discussing {}.",
        top_keyword, discussed
    )];

    let count = members.len();
    let percent_of_total = count as f64 / items.len().max(1) as f64;
    let avg_engagement = if count == 0 {
        0.0
    } else {
        let mean = members
            .iter()
            .map(|m| m.engagement_score / count as f64)
            .sum::<f64>();
        // Saturated scores must not average out to infinity
        if mean.is_finite() {
            mean
        } else {
            f64::MAX
        }
    };

    Cluster {
        cluster_id,
        representative_text: representative.text.clone(),
        statements,
        count,
        percent_of_total,
        avg_engagement,
        confidence: (percent_of_total + avg_engagement / 100.0).min(1.0),
        examples: members
            .iter()
            .filter_map(|m| m.link())
            .take(MAX_EXAMPLES)
            .map(str::to_string)
            .collect(),
        tags: extract_keywords(&group.tokens, DEFAULT_MAX_KEYWORDS),
        item_indices: group.members.clone(),
    }
}
