//! Sentiment scoring for collected items.
//!
//! The pipeline only needs a compound polarity in [-1, 1]. When no analyzer
//! is configured the neutral analyzer returns all-zero scores.

use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::text::clean_text;

// Word valences in [-5, 5], one `word<TAB>score` per line
const LEXICON: &str = include_str!("data/sentiment_lexicon.txt");

/// Normalization constant for the compound score.
const ALPHA: f64 = 15.0;
/// Scale applied to a negated sentiment word.
const NEGATION_SCALAR: f64 = -0.74;
const BOOSTER_SCALAR: f64 = 1.3;
/// How many preceding tokens are checked for a negator.
const NEGATION_WINDOW: usize = 3;

lazy_static! {
    static ref VALENCES: HashMap<String, f64> = {
        let mut map = HashMap::new();
        for line in LEXICON.lines() {
            if let Some((word, score)) = line.split_once('\t') {
                if let Ok(score) = score.trim().parse::<i8>() {
                    map.insert(word.trim().to_lowercase(), f64::from(score));
                }
            }
        }
        map
    };
    // "t" covers contractions like "don't", which cleaning splits into "don t"
    static ref NEGATORS: HashSet<&'static str> = [
        "not", "no", "never", "cannot", "nothing", "nobody", "neither", "nor", "without",
        "dont", "doesnt", "didnt", "isnt", "wasnt", "wont", "cant", "t",
    ]
    .into_iter()
    .collect();
    static ref BOOSTERS: HashSet<&'static str> = [
        "very", "really", "so", "extremely", "totally", "super", "incredibly", "absolutely",
        "completely", "utterly",
    ]
    .into_iter()
    .collect();
}

/// Polarity breakdown of a text. All zeros means "no signal".
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct SentimentScores {
    pub compound: f64,
    pub pos: f64,
    pub neu: f64,
    pub neg: f64,
}

/// Text → polarity scores. Implementations must be pure.
pub trait SentimentAnalyzer: Send + Sync {
    fn polarity_scores(&self, text: &str) -> SentimentScores;
}

/// Stand-in used when no sentiment capability is available.
#[derive(Debug, Default, Clone, Copy)]
pub struct NeutralSentiment;

impl SentimentAnalyzer for NeutralSentiment {
    fn polarity_scores(&self, _text: &str) -> SentimentScores {
        SentimentScores::default()
    }
}

/// Lexicon scorer with negation and booster handling.
#[derive(Debug, Default, Clone, Copy)]
pub struct LexiconSentiment;

impl LexiconSentiment {
    pub fn new() -> Self {
        Self
    }
}

impl SentimentAnalyzer for LexiconSentiment {
    fn polarity_scores(&self, text: &str) -> SentimentScores {
        let cleaned = clean_text(text);
        let tokens: Vec<&str> = cleaned.split_whitespace().collect();
        if tokens.is_empty() {
            return SentimentScores::default();
        }

        let mut sum = 0.0;
        let mut pos_sum = 0.0;
        let mut neg_sum = 0.0;
        let mut neutral_count = 0usize;

        for (i, token) in tokens.iter().enumerate() {
            let Some(&base) = VALENCES.get(*token) else {
                neutral_count += 1;
                continue;
            };

            let mut valence = base;
            if i > 0 && BOOSTERS.contains(tokens[i - 1]) {
                valence *= BOOSTER_SCALAR;
            }
            let window_start = i.saturating_sub(NEGATION_WINDOW);
            if tokens[window_start..i].iter().any(|t| NEGATORS.contains(t)) {
                valence *= NEGATION_SCALAR;
            }

            sum += valence;
            if valence > 0.0 {
                pos_sum += valence;
            } else {
                neg_sum += valence.abs();
            }
        }

        let total = pos_sum + neg_sum + neutral_count as f64;
        if total == 0.0 {
            return SentimentScores::default();
        }

        SentimentScores {
            compound: round4(sum / (sum * sum + ALPHA).sqrt()),
            pos: round4(pos_sum / total),
            neu: round4(neutral_count as f64 / total),
            neg: round4(neg_sum / total),
        }
    }
}

fn round4(x: f64) -> f64 {
    (x * 10_000.0).round() / 10_000.0
}
