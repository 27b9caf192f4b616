//! Partial-credit scoring of multi-answer questions.

use std::collections::BTreeSet;

use mcqrag_core::error::{Error, Result};
use mcqrag_core::types::{format_letters, Answer, Grade, GroundTruth, OptionLetter};

/// Reject answer keys that cannot be scored against a question with `options`.
pub fn validate_ground_truth(gt: &GroundTruth, options: &BTreeSet<OptionLetter>) -> Result<()> {
    if !gt.invalid.is_empty() {
        return Err(Error::Scoring(format!("answer key has non-letter tokens {:?}", gt.invalid)));
    }
    if gt.num_correct != gt.letters.len() {
        return Err(Error::Scoring(format!(
            "num_correct is {} but the answer key lists {} letters ({})",
            gt.num_correct,
            gt.letters.len(),
            format_letters(&gt.letters)
        )));
    }
    if let Some(letter) = gt.letters.iter().find(|l| !options.contains(l)) {
        return Err(Error::Scoring(format!("answer key letter {letter} is not an option of the question")));
    }
    Ok(())
}

/// Full credit for the exact set, half for exactly one omission with no
/// wrong letter, nothing otherwise.
pub fn grade(answer: &Answer, gt: &GroundTruth) -> Grade {
    let Some(predicted) = answer.letters() else { return Grade::Wrong };
    if predicted == &gt.letters {
        Grade::Correct
    } else if !predicted.is_empty() && predicted.is_subset(&gt.letters) && predicted.len() + 1 == gt.letters.len() {
        Grade::Partial
    } else {
        Grade::Wrong
    }
}

/// Weighted score for one question; a malformed key is a `Scoring` error.
pub fn score(answer: &Answer, gt: &GroundTruth, weight: f64) -> Result<f64> {
    if !gt.is_well_formed() {
        return Err(Error::Scoring(format!(
            "malformed answer key (num_correct={}, letters={}, invalid={:?})",
            gt.num_correct,
            format_letters(&gt.letters),
            gt.invalid
        )));
    }
    Ok(grade(answer, gt).credit() * weight)
}

/// Mean score scaled to 0..=100; no scores gives 0.
pub fn aggregate(scores: &[f64]) -> f64 {
    if scores.is_empty() {
        return 0.0;
    }
    scores.iter().sum::<f64>() / scores.len() as f64 * 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set(s: &str) -> BTreeSet<OptionLetter> {
        s.chars().filter_map(OptionLetter::new).collect()
    }

    fn answer(s: &str) -> Answer {
        Answer::Letters(set(s))
    }

    #[test]
    fn partial_credit_cases() {
        let gt = GroundTruth::new(set("AC"));
        assert_eq!(score(&answer("AC"), &gt, 1.0).unwrap(), 1.0);
        assert_eq!(score(&answer("A"), &gt, 1.0).unwrap(), 0.5);
        assert_eq!(score(&answer("AB"), &gt, 1.0).unwrap(), 0.0);
        assert_eq!(score(&answer(""), &gt, 1.0).unwrap(), 0.0);
        assert_eq!(score(&Answer::Unparseable, &gt, 1.0).unwrap(), 0.0);
    }

    #[test]
    fn partial_requires_exactly_one_omission() {
        let gt = GroundTruth::new(set("ABC"));
        assert_eq!(grade(&answer("AB"), &gt), Grade::Partial);
        assert_eq!(grade(&answer("A"), &gt), Grade::Wrong);
        assert_eq!(grade(&answer("ABCD"), &gt), Grade::Wrong);
        let single = GroundTruth::new(set("B"));
        assert_eq!(grade(&answer(""), &single), Grade::Wrong);
    }

    #[test]
    fn weight_scales_score() {
        let gt = GroundTruth::new(set("AC"));
        assert_eq!(score(&answer("C"), &gt, 2.0).unwrap(), 1.0);
    }

    #[test]
    fn aggregate_is_mean_times_hundred() {
        assert_eq!(aggregate(&[1.0, 0.5, 0.0, 1.0]), 62.5);
        assert_eq!(aggregate(&[]), 0.0);
    }

    #[test]
    fn malformed_keys_are_scoring_errors() {
        let mut gt = GroundTruth::new(set("AC"));
        gt.num_correct = 3;
        assert!(matches!(score(&answer("AC"), &gt, 1.0), Err(Error::Scoring(_))));
        assert!(validate_ground_truth(&gt, &set("ABCD")).is_err());

        let outside = GroundTruth::new(set("AE"));
        assert!(validate_ground_truth(&outside, &set("ABCD")).is_err());
        assert!(validate_ground_truth(&GroundTruth::new(set("AD")), &set("ABCD")).is_ok());
    }
}
