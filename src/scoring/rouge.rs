//! # ROUGE Summary Scoring
//!
//! ROUGE-1, ROUGE-2, and ROUGE-L between a reference summary and a
//! generated summary, each reported as precision, recall, and F1.
//!
//! Tokenization matches the usual ROUGE convention: lowercase alphanumeric
//! runs, stemmed with the English Snowball stemmer so inflected forms
//! ("exhibits" / "exhibit") count as matches. N-gram overlap is a clipped
//! multiset intersection; ROUGE-L uses longest-common-subsequence length.

use rust_stemmers::{Algorithm, Stemmer};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Precision, recall, and F1 for one ROUGE variant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RougeScore {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

impl RougeScore {
    fn from_counts(overlap: usize, generated_total: usize, reference_total: usize) -> Self {
        let precision = if generated_total > 0 {
            overlap as f64 / generated_total as f64
        } else {
            0.0
        };
        let recall = if reference_total > 0 {
            overlap as f64 / reference_total as f64
        } else {
            0.0
        };
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };

        Self {
            precision,
            recall,
            f1,
        }
    }
}

/// Score a generated summary against a reference summary.
///
/// Returns a map with exactly the keys `rouge1`, `rouge2`, and `rougeL`,
/// or an empty map when either summary has no scoreable tokens.
pub fn score_summaries(reference: &str, generated: &str) -> BTreeMap<String, RougeScore> {
    let stemmer = Stemmer::create(Algorithm::English);
    let reference_tokens = stemmed_tokens(reference, &stemmer);
    let generated_tokens = stemmed_tokens(generated, &stemmer);

    if reference_tokens.is_empty() || generated_tokens.is_empty() {
        return BTreeMap::new();
    }

    let mut scores = BTreeMap::new();
    scores.insert(
        "rouge1".to_string(),
        ngram_score(&reference_tokens, &generated_tokens, 1),
    );
    scores.insert(
        "rouge2".to_string(),
        ngram_score(&reference_tokens, &generated_tokens, 2),
    );
    scores.insert(
        "rougeL".to_string(),
        lcs_score(&reference_tokens, &generated_tokens),
    );
    scores
}

/// Lowercased, stemmed alphanumeric tokens.
fn stemmed_tokens(text: &str, stemmer: &Stemmer) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|token| !token.is_empty())
        .map(|token| stemmer.stem(&token.to_lowercase()).into_owned())
        .collect()
}

fn ngram_counts<'a>(tokens: &'a [String], n: usize) -> HashMap<&'a [String], usize> {
    let mut counts = HashMap::new();
    for gram in tokens.windows(n) {
        *counts.entry(gram).or_insert(0) += 1;
    }
    counts
}

/// Clipped n-gram overlap between the two token sequences.
fn ngram_score(reference: &[String], generated: &[String], n: usize) -> RougeScore {
    let reference_counts = ngram_counts(reference, n);
    let generated_counts = ngram_counts(generated, n);

    let reference_total: usize = reference_counts.values().sum();
    let generated_total: usize = generated_counts.values().sum();

    let overlap: usize = generated_counts
        .iter()
        .map(|(gram, count)| *count.min(reference_counts.get(gram).unwrap_or(&0)))
        .sum();

    RougeScore::from_counts(overlap, generated_total, reference_total)
}

/// ROUGE-L from longest-common-subsequence length.
fn lcs_score(reference: &[String], generated: &[String]) -> RougeScore {
    let lcs = lcs_length(reference, generated);
    RougeScore::from_counts(lcs, generated.len(), reference.len())
}

fn lcs_length(a: &[String], b: &[String]) -> usize {
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];

    for i in 1..=a.len() {
        for j in 1..=b.len() {
            table[i][j] = if a[i - 1] == b[j - 1] {
                table[i - 1][j - 1] + 1
            } else {
                table[i - 1][j].max(table[i][j - 1])
            };
        }
    }

    table[a.len()][b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    const SUMMARY: &str =
        "The patient shows symptoms of fatigue, back pain, and difficulty sleeping.";

    #[test]
    fn test_self_comparison_is_perfect() {
        let scores = score_summaries(SUMMARY, SUMMARY);

        for key in ["rouge1", "rouge2", "rougeL"] {
            let score = scores.get(key).expect(key);
            assert_eq!(score.precision, 1.0, "{} precision", key);
            assert_eq!(score.recall, 1.0, "{} recall", key);
            assert_eq!(score.f1, 1.0, "{} f1", key);
        }
    }

    #[test]
    fn test_exactly_three_variants() {
        let scores = score_summaries(SUMMARY, "Patient exhibits early signs of diabetes.");
        let keys: Vec<&str> = scores.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["rouge1", "rouge2", "rougeL"]);
    }

    #[test]
    fn test_empty_input_yields_empty_map() {
        assert!(score_summaries("", SUMMARY).is_empty());
        assert!(score_summaries(SUMMARY, "").is_empty());
        assert!(score_summaries("...", SUMMARY).is_empty());
    }

    #[test]
    fn test_disjoint_summaries_score_zero() {
        let scores = score_summaries("alpha beta gamma", "delta epsilon zeta");
        for score in scores.values() {
            assert_eq!(score.precision, 0.0);
            assert_eq!(score.recall, 0.0);
            assert_eq!(score.f1, 0.0);
        }
    }

    #[test]
    fn test_stemming_matches_inflected_forms() {
        let scores = score_summaries("patient exhibits signs", "patients exhibit sign");
        let rouge1 = scores.get("rouge1").unwrap();
        assert_eq!(rouge1.precision, 1.0);
        assert_eq!(rouge1.recall, 1.0);
    }

    #[test]
    fn test_case_and_punctuation_insensitive() {
        let scores = score_summaries("The patient.", "the patient");
        assert_eq!(scores.get("rouge1").unwrap().f1, 1.0);
        assert_eq!(scores.get("rougeL").unwrap().f1, 1.0);
    }

    #[test]
    fn test_single_word_summaries_have_no_bigrams() {
        let scores = score_summaries("diabetes", "diabetes");
        assert_eq!(scores.get("rouge1").unwrap().f1, 1.0);
        // No bigrams exist on either side, so rouge2 reports zero rather
        // than being dropped from the map.
        assert_eq!(scores.get("rouge2").unwrap().f1, 0.0);
    }

    #[test]
    fn test_lcs_respects_order() {
        // Same unigrams, different order: rouge1 stays perfect while
        // rougeL drops below 1.
        let scores = score_summaries("alpha beta gamma delta", "delta gamma beta alpha");
        assert_eq!(scores.get("rouge1").unwrap().f1, 1.0);
        assert!(scores.get("rougeL").unwrap().f1 < 1.0);
    }
}
