use std::collections::HashSet;

/// Jaccard similarity of two token sequences, treated as sets.
///
/// Two empty sequences are identical (1.0); exactly one empty side gives 0.0.
pub fn jaccard<A, B>(a: &[A], b: &[B]) -> f64
where
    A: AsRef<str>,
    B: AsRef<str>,
{
    let set_a: HashSet<&str> = a.iter().map(AsRef::as_ref).collect();
    let set_b: HashSet<&str> = b.iter().map(AsRef::as_ref).collect();
    jaccard_sets(&set_a, &set_b)
}

pub(crate) fn jaccard_sets(a: &HashSet<&str>, b: &HashSet<&str>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let inter = a.intersection(b).count() as f64;
    let union = a.union(b).count() as f64;
    inter / union
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toks(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_jaccard_identical() {
        assert_eq!(jaccard(&toks("hello world"), &toks("hello world")), 1.0);
        assert_eq!(jaccard(&toks("hello hello world"), &toks("world hello")), 1.0);
    }

    #[test]
    fn test_jaccard_no_overlap() {
        assert_eq!(jaccard(&toks("hello"), &toks("world")), 0.0);
    }

    #[test]
    fn test_jaccard_partial_is_exact() {
        let sim = jaccard(&toks("hello world"), &toks("hello universe"));
        assert_eq!(sim, 1.0 / 3.0);
    }

    #[test]
    fn test_jaccard_empty_cases() {
        let empty: Vec<String> = Vec::new();
        assert_eq!(jaccard(&empty, &empty), 1.0);
        assert_eq!(jaccard(&empty, &toks("a")), 0.0);
        assert_eq!(jaccard(&toks("a"), &empty), 0.0);
    }

    #[test]
    fn test_jaccard_symmetric() {
        let pairs = [
            ("login fails after update", "update breaks login"),
            ("a b c d", "c d e"),
            ("x", "x y z"),
        ];
        for (a, b) in pairs {
            assert_eq!(jaccard(&toks(a), &toks(b)), jaccard(&toks(b), &toks(a)));
        }
    }
}
