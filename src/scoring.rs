//! Answer comparison shared by the quiz and the spell checker.

use serde::Serialize;
use similar::TextDiff;
use tracing::debug;

use crate::types::{MissCause, Resolution};

/// Cutoff used for "did you mean" suggestions.
pub const SUGGESTION_CUTOFF: f64 = 0.7;

pub fn is_exact(a: &str, b: &str) -> bool {
    a == b
}

pub fn is_case_insensitive_match(a: &str, b: &str) -> bool {
    a.to_lowercase() == b.to_lowercase()
}

/// Matching-blocks similarity in `[0, 1]`: `2 * matched / (len(a) + len(b))`.
///
/// Matched characters come from a character diff of the two strings. The
/// larger of the two directions is taken so the ratio never depends on
/// argument order.
pub fn similarity_ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let forward = TextDiff::from_chars(a, b).ratio();
    let backward = TextDiff::from_chars(b, a).ratio();
    f64::from(forward.max(backward))
}

/// Best corpus entry whose similarity to `word` is at least `cutoff`.
///
/// Ties go to the lexicographically greater word.
pub fn closest_match<'a, I>(word: &str, corpus: I, cutoff: f64) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(f64, &'a str)> = None;
    for candidate in corpus {
        let ratio = similarity_ratio(word, candidate);
        if ratio < cutoff {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_ratio, best_word)) => {
                ratio > best_ratio || (ratio == best_ratio && candidate > best_word)
            }
        };
        if better {
            best = Some((ratio, candidate));
        }
    }
    debug!(word, suggestion = ?best.map(|(_, w)| w), "Closest match lookup");
    best.map(|(_, w)| w)
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "result", rename_all = "kebab-case")]
pub enum SpellCheck {
    Correct,
    Suggestion { word: String, similarity: f64 },
    NoMatch,
}

/// Standalone spell check of `input` against a lowercase corpus.
pub fn check_spelling<'a, I>(input: &str, corpus: I, cutoff: f64) -> SpellCheck
where
    I: IntoIterator<Item = &'a str> + Clone,
{
    let needle = input.trim().to_lowercase();
    if needle.is_empty() {
        return SpellCheck::NoMatch;
    }
    if corpus.clone().into_iter().any(|w| w == needle) {
        return SpellCheck::Correct;
    }
    match closest_match(&needle, corpus, cutoff) {
        Some(word) => SpellCheck::Suggestion {
            similarity: similarity_ratio(&needle, word),
            word: word.to_string(),
        },
        None => SpellCheck::NoMatch,
    }
}

/// Learner-facing tip after a resolution.
pub fn hint_for(resolution: &Resolution) -> String {
    let word = &resolution.word;
    match resolution.cause {
        None => "Correct!".to_string(),
        Some(MissCause::Timeout) => format!("Time's up! The word was: {}", word),
        Some(MissCause::CaseOnly) => format!(
            "Pay attention to uppercase and lowercase letters. The correct word is: {}",
            word
        ),
        Some(MissCause::Spelling) if resolution.similarity > 0.7 => {
            "You're very close! Just a few letters off.".to_string()
        }
        Some(MissCause::Spelling) if resolution.similarity > 0.5 => format!(
            "The word has {} letters and you got most of them right.",
            word.chars().count()
        ),
        Some(MissCause::Spelling) => format!(
            "The word starts with '{}' and has {} letters.",
            word.chars().next().unwrap_or(' '),
            word.chars().count()
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-6
    }

    #[test]
    fn identical_strings_score_one() {
        assert!(approx(similarity_ratio("pronunciation", "pronunciation"), 1.0));
        assert!(approx(similarity_ratio("", ""), 1.0));
    }

    #[test]
    fn one_empty_side_scores_zero() {
        assert!(approx(similarity_ratio("", "word"), 0.0));
    }

    #[test]
    fn closer_strings_score_higher() {
        assert!(similarity_ratio("cat", "dog") < similarity_ratio("cat", "cap"));
        assert!(approx(similarity_ratio("cat", "cap"), 4.0 / 6.0));
    }

    #[test]
    fn transposition_keeps_most_blocks() {
        // "app" plus one of the swapped letters
        assert!(approx(similarity_ratio("appel", "apple"), 0.8));
    }

    #[test]
    fn ratio_is_symmetric() {
        for (a, b) in [("abcd", "bcda"), ("tide", "diet"), ("spelling", "spieling")] {
            assert!(approx(similarity_ratio(a, b), similarity_ratio(b, a)));
        }
    }

    #[test]
    fn case_helpers() {
        assert!(is_exact("Apple", "Apple"));
        assert!(!is_exact("apple", "Apple"));
        assert!(is_case_insensitive_match("apple", "APPLE"));
    }

    #[test]
    fn closest_match_respects_cutoff() {
        let corpus = ["receive", "deceive", "recite"];
        assert_eq!(closest_match("recieve", corpus, 0.7), Some("receive"));
        assert_eq!(closest_match("xyz", corpus, 0.7), None);
    }

    #[test]
    fn spell_check_outcomes() {
        let corpus = ["receive", "believe"];
        assert_eq!(check_spelling("Receive", corpus, 0.7), SpellCheck::Correct);
        assert!(matches!(
            check_spelling("beleive", corpus, 0.7),
            SpellCheck::Suggestion { ref word, .. } if word == "believe"
        ));
        assert_eq!(check_spelling("qqq", corpus, 0.7), SpellCheck::NoMatch);
    }

    #[test]
    fn hints_follow_similarity_bands() {
        let mut r = Resolution {
            word: "elephant".into(),
            answer: "elefant".into(),
            correct: false,
            similarity: 0.8,
            cause: Some(MissCause::Spelling),
        };
        assert!(hint_for(&r).contains("very close"));
        r.similarity = 0.6;
        assert!(hint_for(&r).contains("8 letters"));
        r.similarity = 0.1;
        assert!(hint_for(&r).contains("starts with 'e'"));
    }

    #[test]
    fn hints_for_case_and_timeout() {
        let mut r = Resolution {
            word: "Paris".into(),
            answer: "paris".into(),
            correct: false,
            similarity: 0.8,
            cause: Some(MissCause::CaseOnly),
        };
        assert_eq!(
            hint_for(&r),
            "Pay attention to uppercase and lowercase letters. The correct word is: Paris"
        );
        r.cause = Some(MissCause::Timeout);
        r.answer.clear();
        r.similarity = 0.0;
        assert_eq!(hint_for(&r), "Time's up! The word was: Paris");
        r.cause = None;
        assert_eq!(hint_for(&r), "Correct!");
    }
}
