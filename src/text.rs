//! Text normalization for short social posts.
//!
//! Everything downstream (dedup, clustering, relevance) works on the token
//! lists produced here, so the cleaning rules must stay deterministic.

use lazy_static::lazy_static;
use regex::Regex;
use std::collections::{HashMap, HashSet};

/// Default number of keywords kept per item and per cluster.
pub const DEFAULT_MAX_KEYWORDS: usize = 5;

lazy_static! {
    static ref URL_PATTERN: Regex =
        Regex::new(r"[a-z][a-z0-9+.\-]*://\S+").expect("valid URL pattern");
    static ref NON_ALNUM_PATTERN: Regex =
        Regex::new(r"[^a-z0-9\s]").expect("valid character class");
    static ref STOPWORDS: HashSet<&'static str> = [
        "a", "an", "and", "are", "as", "at", "be", "but", "by", "for", "from", "how", "i",
        "if", "in", "is", "it", "of", "on", "or", "the", "to", "we", "what", "when", "where",
        "who", "why", "with", "you", "your",
    ]
    .into_iter()
    .collect();
}

/// Lowercase, drop URLs and punctuation, collapse whitespace.
///
/// The result only contains `[a-z0-9 ]`, with single spaces and no
/// leading or trailing space.
pub fn clean_text(text: &str) -> String {
    let lowered = text.to_lowercase();
    let without_urls = URL_PATTERN.replace_all(&lowered, " ");
    let alnum_only = NON_ALNUM_PATTERN.replace_all(&without_urls, " ");
    alnum_only.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Clean `text` and split it into non-stopword tokens, in order.
pub fn tokenize(text: &str) -> Vec<String> {
    clean_text(text)
        .split_whitespace()
        .filter(|token| !is_stopword(token))
        .map(str::to_string)
        .collect()
}

pub fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(token)
}

/// Most frequent tokens first; equal counts keep first-occurrence order.
pub fn extract_keywords<I, S>(tokens: I, max_keywords: usize) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for token in tokens {
        let token = token.as_ref();
        match index.get(token) {
            Some(&i) => counts[i].1 += 1,
            None => {
                index.insert(token.to_string(), counts.len());
                counts.push((token.to_string(), 1));
            }
        }
    }

    // Stable sort keeps first-occurrence order among ties
    counts.sort_by(|a, b| b.1.cmp(&a.1));
    counts
        .into_iter()
        .take(max_keywords)
        .map(|(token, _)| token)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_text_removes_urls() {
        let result = clean_text("Check this out https://example.com amazing!");
        assert!(result.contains("amazing"));
        assert!(!result.contains("https"));
        assert!(!result.contains("example.com"));
        assert!(!result.contains("example"));
    }

    #[test]
    fn test_clean_text_lowercases() {
        assert_eq!(clean_text("HELLO World"), "hello world");
    }

    #[test]
    fn test_clean_text_removes_special_chars() {
        let result = clean_text("Hello! How are you? #great");
        assert_eq!(result, "hello how are you great");
    }

    #[test]
    fn test_clean_text_collapses_whitespace() {
        assert_eq!(clean_text("  lots \t of\n\nspace  "), "lots of space");
        assert_eq!(clean_text("don't"), "don t");
    }

    #[test]
    fn test_clean_text_empty() {
        assert_eq!(clean_text(""), "");
        assert_eq!(clean_text("!!! ???"), "");
    }

    #[test]
    fn test_clean_text_is_idempotent() {
        let once = clean_text("Why is the Build BROKEN?? see ftp://mirror/x");
        assert_eq!(clean_text(&once), once);
    }

    #[test]
    fn test_tokenize_removes_stopwords() {
        let tokens = tokenize("the quick brown fox jumps over the lazy dog");
        assert!(!tokens.contains(&"the".to_string()));
        assert_eq!(tokens[0], "quick");
        assert!(tokens.contains(&"brown".to_string()));
    }

    #[test]
    fn test_tokenize_empty_string() {
        assert!(tokenize("").is_empty());
        assert!(tokenize("the and of").is_empty());
    }

    #[test]
    fn test_extract_keywords_top_one() {
        assert_eq!(extract_keywords(["a", "a", "b"], 1), vec!["a"]);
    }

    #[test]
    fn test_extract_keywords_ties_keep_first_occurrence() {
        let keywords = extract_keywords(["sync", "login", "crash", "login", "sync"], 5);
        assert_eq!(keywords, vec!["sync", "login", "crash"]);
    }

    #[test]
    fn test_extract_keywords_fewer_than_max() {
        let tokens = vec!["test".to_string(), "hello".to_string(), "test".to_string()];
        let keywords = extract_keywords(&tokens, 5);
        assert_eq!(keywords, vec!["test", "hello"]);
        assert!(extract_keywords(Vec::<String>::new(), 5).is_empty());
    }
}
