//! # Transcription Accuracy
//!
//! Word-error-rate between two transcripts, folded into a single accuracy
//! percentage for the evaluation report.
//!
//! WER = (substitutions + deletions + insertions) / reference length,
//! computed as Levenshtein distance over whitespace-separated words. The
//! edit distance itself comes from `strsim`.

/// Word-error-rate between a reference and a hypothesis transcript.
///
/// Returns 0.0 for two empty transcripts and infinity when the reference is
/// empty but the hypothesis is not (there is no reference length to divide
/// by). Can exceed 1.0 when the hypothesis is much longer than the
/// reference.
pub fn word_error_rate(reference: &str, hypothesis: &str) -> f64 {
    let reference_words: Vec<&str> = reference.split_whitespace().collect();
    let hypothesis_words: Vec<&str> = hypothesis.split_whitespace().collect();

    if reference_words.is_empty() && hypothesis_words.is_empty() {
        return 0.0;
    }
    if reference_words.is_empty() {
        return f64::INFINITY;
    }

    let distance = strsim::generic_levenshtein(&reference_words, &hypothesis_words);
    distance as f64 / reference_words.len() as f64
}

/// Accuracy percentage: `max(0, 1 - WER) * 100`, clamped to [0, 100].
///
/// Degenerate input (an empty reference) scores 0.0 rather than erroring;
/// the evaluation report renders it like any other bad transcription.
pub fn transcription_accuracy(reference: &str, hypothesis: &str) -> f64 {
    let wer = word_error_rate(reference, hypothesis);
    if !wer.is_finite() {
        return 0.0;
    }
    (1.0 - wer).max(0.0) * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_transcripts_score_full_accuracy() {
        assert_eq!(transcription_accuracy("the cat sat", "the cat sat"), 100.0);
    }

    #[test]
    fn test_fully_different_transcripts_score_zero() {
        // Three substitutions over a three-word reference: WER = 1.0.
        assert_eq!(transcription_accuracy("the cat sat", "a dog ran"), 0.0);
    }

    #[test]
    fn test_partial_match() {
        // One substitution over three reference words.
        let accuracy = transcription_accuracy("the cat sat", "the dog sat");
        assert!((accuracy - 66.6666).abs() < 0.01);
    }

    #[test]
    fn test_accuracy_stays_in_range() {
        let cases = [
            ("the cat sat", "the cat sat on the mat by the door"),
            ("a", "completely different and much longer hypothesis text"),
            ("some reference text", ""),
            ("", ""),
        ];
        for (reference, hypothesis) in cases {
            let accuracy = transcription_accuracy(reference, hypothesis);
            assert!(
                (0.0..=100.0).contains(&accuracy),
                "accuracy {} out of range for {:?} vs {:?}",
                accuracy,
                reference,
                hypothesis
            );
        }
    }

    #[test]
    fn test_empty_reference_scores_zero() {
        assert_eq!(transcription_accuracy("", "anything at all"), 0.0);
    }

    #[test]
    fn test_empty_hypothesis_scores_zero() {
        // Every reference word is a deletion: WER = 1.0.
        assert_eq!(transcription_accuracy("the cat sat", ""), 0.0);
    }

    #[test]
    fn test_wer_counts_edits() {
        // One deletion over four reference words.
        let wer = word_error_rate("the cat sat down", "the cat sat");
        assert!((wer - 0.25).abs() < 1e-9);
    }
}
