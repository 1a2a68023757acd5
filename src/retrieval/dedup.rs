//! Near-duplicate suppression over ranked retrieval results

use std::collections::HashSet;

use crate::store::RetrievalResult;

/// Text-to-text similarity in `[0, 1]`
///
/// Used as a cheap stand-in for embedding-space cosine similarity during
/// dedup; implementations can be swapped without touching the retriever.
pub trait TextSimilarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f32;
}

/// Jaccard index over lower-cased whitespace-tokenized word sets
///
/// An empty word set never matches anything (similarity 0), so blank
/// passages are kept rather than collapsed into each other.
pub struct JaccardOverlap;

impl TextSimilarity for JaccardOverlap {
    fn similarity(&self, a: &str, b: &str) -> f32 {
        let set_a = word_set(a);
        let set_b = word_set(b);
        if set_a.is_empty() || set_b.is_empty() {
            return 0.0;
        }
        let intersection = set_a.intersection(&set_b).count();
        let union = set_a.union(&set_b).count();
        intersection as f32 / union as f32
    }
}

fn word_set(text: &str) -> HashSet<String> {
    text.to_lowercase()
        .split_whitespace()
        .map(str::to_string)
        .collect()
}

/// Keep ranked results whose text is not a near-duplicate of an earlier keep
///
/// `threshold` is the minimum cosine similarity that counts as a duplicate;
/// with Jaccard as the proxy, a candidate is rejected when its overlap
/// against any already-accepted item exceeds `1 − threshold`. Results are
/// taken in rank order, so of two near-paraphrases the better-ranked one
/// survives.
pub fn dedup_ranked(
    results: Vec<RetrievalResult>,
    threshold: f32,
    similarity: &dyn TextSimilarity,
) -> Vec<RetrievalResult> {
    let mut unique: Vec<RetrievalResult> = Vec::with_capacity(results.len());
    for candidate in results {
        let is_dup = unique
            .iter()
            .any(|kept| similarity.similarity(&candidate.text, &kept.text) > 1.0 - threshold);
        if !is_dup {
            unique.push(candidate);
        }
    }
    unique
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use serde_json::Map;

    fn result(text: &str, distance: f32) -> RetrievalResult {
        RetrievalResult {
            id: format!("id-{}", text.len()),
            text: text.to_string(),
            metadata: Map::new(),
            distance,
        }
    }

    #[test]
    fn test_jaccard_identical_texts() {
        let sim = JaccardOverlap.similarity("use ser for traits", "use ser for traits");
        assert_relative_eq!(sim, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_jaccard_disjoint_texts() {
        let sim = JaccardOverlap.similarity("uno dos tres", "quatre cinq six");
        assert_relative_eq!(sim, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn test_jaccard_case_insensitive() {
        let sim = JaccardOverlap.similarity("Ser Estar", "ser estar");
        assert_relative_eq!(sim, 1.0, epsilon = 1e-6);
    }

    #[test]
    fn test_jaccard_empty_text_never_matches() {
        assert_eq!(JaccardOverlap.similarity("", "anything at all"), 0.0);
        assert_eq!(JaccardOverlap.similarity("", ""), 0.0);
    }

    #[test]
    fn test_jaccard_partial_overlap() {
        // 2 shared words of 4 total distinct words
        let sim = JaccardOverlap.similarity("el gato negro", "el perro negro");
        assert_relative_eq!(sim, 0.5, epsilon = 1e-6);
    }

    #[test]
    fn test_dedup_rejects_overlap_above_threshold() {
        let results = vec![
            result("use ser for permanent traits", 0.1),
            result("use ser for permanent traits and identity", 0.2),
        ];
        let unique = dedup_ranked(results, 0.92, &JaccardOverlap);
        assert_eq!(unique.len(), 1);
        assert_eq!(unique[0].text, "use ser for permanent traits");
    }

    #[test]
    fn test_dedup_keeps_disjoint_passages() {
        let results = vec![
            result("preterite conjugation endings", 0.1),
            result("subjunctive mood triggers", 0.2),
        ];
        let unique = dedup_ranked(results, 0.92, &JaccardOverlap);
        assert_eq!(unique.len(), 2);
    }

    #[test]
    fn test_dedup_preserves_rank_order() {
        let results = vec![
            result("alpha beta", 0.1),
            result("gamma delta", 0.2),
            result("epsilon zeta", 0.3),
        ];
        let unique = dedup_ranked(results, 0.92, &JaccardOverlap);
        let distances: Vec<f32> = unique.iter().map(|r| r.distance).collect();
        assert_eq!(distances, vec![0.1, 0.2, 0.3]);
    }
}
