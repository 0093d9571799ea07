//! Answer parsing for triage questions.
//!
//! Each parser is pure and total: it extracts a value from a free-form reply
//! or returns `None` when nothing usable is present.  A `None` is not an
//! error; the dialogue simply moves on without recording an answer.

use std::sync::LazyLock;

use regex::Regex;
use rescue_types::AnswerValue;
use serde::{Deserialize, Serialize};

const AFFIRMATIVE: &[&str] = &[
    "yes", "yeah", "yep", "ok", "okay", "sure", "please", "correct", "true",
];
const NEGATIVE: &[&str] = &["no", "nope", "nah", "negative", "false", "don't", "dont"];

/// `0`–`10`, optionally followed by `/10` or `out of 10`.
static SCALE_0_10: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(10|[0-9])\b(?:\s*(?:/|out\s+of)\s*10\b)?").expect("valid scale regex")
});

/// Expected shape of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnswerType {
    YesNo,
    #[serde(rename = "scale_0_10")]
    Scale0To10,
    FreeText,
}

impl AnswerType {
    /// Unknown labels fall back to [`AnswerType::FreeText`].
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "yes_no" | "yesno" => AnswerType::YesNo,
            "scale_0_10" | "scale" => AnswerType::Scale0To10,
            _ => AnswerType::FreeText,
        }
    }
}

/// Lowercased whitespace tokens with surrounding punctuation removed.
fn tokens(text: &str) -> Vec<String> {
    text.to_lowercase()
        .replace('\u{2019}', "'")
        .split_whitespace()
        .map(|t| {
            t.trim_matches(|c: char| !c.is_alphanumeric() && c != '\'')
                .trim_matches('\'')
                .to_string()
        })
        .filter(|t| !t.is_empty())
        .collect()
}

/// Affirmative/negative reading of a reply.
///
/// A negative token anywhere wins ("yes, no wait" is `false`).  An
/// affirmative token, or a first word that starts with one ("yesss",
/// "okay!"), gives `true`.  Anything else is `None`.
///
/// ```
/// use rescue_dialogue::parser::parse_yes_no;
///
/// assert_eq!(parse_yes_no("Yeah, go ahead"), Some(true));
/// assert_eq!(parse_yes_no("I don't think so"), Some(false));
/// assert_eq!(parse_yes_no("maybe"), None);
/// ```
pub fn parse_yes_no(text: &str) -> Option<bool> {
    let toks = tokens(text);
    if toks.iter().any(|t| NEGATIVE.contains(&t.as_str())) {
        return Some(false);
    }
    let exact = toks.iter().any(|t| AFFIRMATIVE.contains(&t.as_str()));
    let prefix = toks
        .first()
        .is_some_and(|first| AFFIRMATIVE.iter().any(|w| first.starts_with(w)));
    if exact || prefix { Some(true) } else { None }
}

/// First integer in `0..=10` found in the reply.
///
/// ```
/// use rescue_dialogue::parser::parse_scale_0_10;
///
/// assert_eq!(parse_scale_0_10("maybe a 7/10"), Some(7));
/// assert_eq!(parse_scale_0_10("it's 8 out of 10"), Some(8));
/// assert_eq!(parse_scale_0_10("fifteen, 15"), None);
/// ```
pub fn parse_scale_0_10(text: &str) -> Option<u8> {
    SCALE_0_10
        .captures(text)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u8>().ok())
}

/// The trimmed reply, or `None` when it is blank.
pub fn parse_free_text(text: &str) -> Option<String> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}

/// Dispatch on `expected`.
pub fn parse_for(expected: AnswerType, text: &str) -> Option<AnswerValue> {
    match expected {
        AnswerType::YesNo => parse_yes_no(text).map(AnswerValue::Bool),
        AnswerType::Scale0To10 => parse_scale_0_10(text).map(AnswerValue::Scale),
        AnswerType::FreeText => parse_free_text(text).map(AnswerValue::Text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_affirmatives() {
        for reply in ["yes", "Yeah", "yep!", "OK", "okay then", "sure", "please do", "correct", "True"] {
            assert_eq!(parse_yes_no(reply), Some(true), "{reply}");
        }
    }

    #[test]
    fn first_word_prefix_counts_as_affirmative() {
        assert_eq!(parse_yes_no("yesss"), Some(true));
        assert_eq!(parse_yes_no("Surely"), Some(true));
    }

    #[test]
    fn negatives() {
        for reply in ["no", "Nope.", "nah", "negative", "false", "don't", "dont touch me"] {
            assert_eq!(parse_yes_no(reply), Some(false), "{reply}");
        }
    }

    #[test]
    fn curly_apostrophe_negative() {
        assert_eq!(parse_yes_no("I don\u{2019}t want that"), Some(false));
    }

    #[test]
    fn negative_wins_over_affirmative() {
        assert_eq!(parse_yes_no("yes... no, no"), Some(false));
        assert_eq!(parse_yes_no("okay, no"), Some(false));
    }

    #[test]
    fn neither_class_is_none() {
        assert_eq!(parse_yes_no("what do you mean"), None);
        assert_eq!(parse_yes_no(""), None);
        assert_eq!(parse_yes_no("nothing"), None);
    }

    #[test]
    fn scale_takes_first_valid_number() {
        assert_eq!(parse_scale_0_10("7"), Some(7));
        assert_eq!(parse_scale_0_10("maybe a 7/10"), Some(7));
        assert_eq!(parse_scale_0_10("10/10, terrible"), Some(10));
        assert_eq!(parse_scale_0_10("about 3 or 4"), Some(3));
        assert_eq!(parse_scale_0_10("0"), Some(0));
    }

    #[test]
    fn scale_rejects_out_of_range_and_words() {
        assert_eq!(parse_scale_0_10("11"), None);
        assert_eq!(parse_scale_0_10("100"), None);
        assert_eq!(parse_scale_0_10("a lot"), None);
    }

    #[test]
    fn free_text_trims_and_rejects_blank() {
        assert_eq!(parse_free_text("  my leg  "), Some("my leg".to_string()));
        assert_eq!(parse_free_text(" \t\n"), None);
    }

    #[test]
    fn parse_for_dispatches_by_type() {
        assert_eq!(parse_for(AnswerType::YesNo, "yes"), Some(AnswerValue::Bool(true)));
        assert_eq!(parse_for(AnswerType::Scale0To10, "6"), Some(AnswerValue::Scale(6)));
        assert_eq!(
            parse_for(AnswerType::FreeText, " stuck "),
            Some(AnswerValue::Text("stuck".into()))
        );
        assert_eq!(parse_for(AnswerType::YesNo, "purple"), None);
    }

    #[test]
    fn unknown_type_label_falls_back_to_free_text() {
        assert_eq!(AnswerType::from_label("yes_no"), AnswerType::YesNo);
        assert_eq!(AnswerType::from_label("SCALE_0_10"), AnswerType::Scale0To10);
        assert_eq!(AnswerType::from_label("multiple_choice"), AnswerType::FreeText);
    }
}
