// Deduplication module for collected items
//
// Uses token-set similarity to drop near-duplicate posts before
// clustering. The first item of a near-duplicate group always survives.

use std::collections::HashSet;
use tracing::{debug, info};

use crate::models::ProcessedItem;
use crate::similarity::jaccard_sets;

/// Default similarity at or above which two items count as duplicates.
pub const DEFAULT_DEDUP_THRESHOLD: f64 = 0.9;

/// Check if an item is a near-duplicate of any accepted item
pub fn is_duplicate(tokens: &HashSet<&str>, accepted: &[HashSet<&str>], threshold: f64) -> bool {
    accepted
        .iter()
        .any(|existing| jaccard_sets(tokens, existing) >= threshold)
}

/// Filter out near-duplicate items, keeping input order.
///
/// Candidates are only compared against items already accepted, never
/// against ones skipped earlier.
pub fn dedupe(items: Vec<ProcessedItem>, threshold: f64) -> Vec<ProcessedItem> {
    let original_count = items.len();

    let keep: Vec<bool> = {
        let mut accepted: Vec<HashSet<&str>> = Vec::with_capacity(items.len());
        items
            .iter()
            .map(|item| {
                let tokens: HashSet<&str> = item.tokens.iter().map(String::as_str).collect();
                if is_duplicate(&tokens, &accepted, threshold) {
                    debug!("Duplicate dropped: '{}'", item.clean_text);
                    false
                } else {
                    accepted.push(tokens);
                    true
                }
            })
            .collect()
    };

    let unique: Vec<ProcessedItem> = items
        .into_iter()
        .zip(keep)
        .filter_map(|(item, kept)| kept.then_some(item))
        .collect();

    let removed = original_count - unique.len();
    if removed > 0 {
        info!(
            "Deduplication: removed {} near-duplicate item(s) (threshold: {:.2})",
            removed, threshold
        );
    }

    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pipeline::tests::item;

    fn texts(items: &[ProcessedItem]) -> Vec<&str> {
        items.iter().map(|i| i.clean_text.as_str()).collect()
    }

    #[test]
    fn test_dedupe_removes_duplicates() {
        let items = vec![
            item("hello world test"),
            item("hello world test"),
            item("completely different text"),
        ];
        let result = dedupe(items, 0.9);
        assert_eq!(result.len(), 2);
        assert_eq!(texts(&result), vec!["hello world test", "completely different text"]);
    }

    #[test]
    fn test_dedupe_preserves_unique() {
        let items = vec![item("first item"), item("second item"), item("third item")];
        assert_eq!(dedupe(items, 0.9).len(), 3);
    }

    #[test]
    fn test_dedupe_keeps_first_of_group() {
        let mut first = item("Login broken after update!");
        first.id = "first".to_string();
        let mut second = item("login BROKEN after update");
        second.id = "second".to_string();
        let result = dedupe(vec![first, second], 0.9);
        assert_eq!(result.len(), 1);
        assert_eq!(result[0].id, "first");
    }

    #[test]
    fn test_dedupe_compares_only_against_accepted() {
        // b duplicates a and is dropped; c matches b (0.8) but not a (0.7)
        let items = vec![
            item("aa bb cc dd ee ff gg hh"),
            item("aa bb cc dd ee ff gg hh ii"),
            item("bb cc dd ee ff gg hh ii jj"),
        ];
        let result = dedupe(items, 0.8);
        assert_eq!(
            texts(&result),
            vec!["aa bb cc dd ee ff gg hh", "bb cc dd ee ff gg hh ii jj"]
        );
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let items = vec![
            item("app crashes on start"),
            item("App crashes on start!!"),
            item("sync is slow"),
            item(""),
            item("the and of"),
        ];
        let once = dedupe(items, 0.9);
        let twice = dedupe(once.clone(), 0.9);
        assert_eq!(once, twice);
        // Token-less items are duplicates of each other
        assert_eq!(once.len(), 3);
    }
}
