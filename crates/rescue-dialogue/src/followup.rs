//! Body-part follow-ups and short acknowledgement phrases.
//!
//! When a reply to a location-type question mentions a body part, the
//! dialogue asks one fixed follow-up ([`FOLLOWUP_QUESTION`]) before moving
//! on.  Follow-up answers are stored under `<key>_detail` and never trigger
//! another follow-up.

use std::sync::LazyLock;

use regex::Regex;

pub const FOLLOWUP_QUESTION: &str = "Which side, left or right? Is there bleeding or mainly pain?";

/// Suffix of the answer key a follow-up reply is stored under.
pub const DETAIL_SUFFIX: &str = "_detail";
/// Suffix of the answer key the detected body part is stored under.
pub const BODY_PART_SUFFIX: &str = "_body_part";

/// Questions whose replies are worth a location follow-up.
const FOLLOWUP_KEYS: &[&str] = &[
    "initial",
    "bleeding",
    "massive_bleeding_where",
    "small_bleeds",
    "pain",
    "mobility",
];

/// Keyword → canonical label, checked in this order.
const BODY_PARTS: &[(&str, &str)] = &[
    ("leg", "leg"),
    ("legs", "leg"),
    ("arm", "arm"),
    ("arms", "arm"),
    ("shoulder", "shoulder"),
    ("shoulders", "shoulder"),
    ("head", "head"),
    ("neck", "neck"),
    ("chest", "chest"),
    ("back", "back"),
    ("knee", "knee"),
    ("knees", "knee"),
    ("ankle", "ankle"),
    ("ankles", "ankle"),
    ("wrist", "wrist"),
    ("wrists", "wrist"),
    ("hip", "hip"),
    ("hips", "hip"),
    ("hand", "hand"),
    ("hands", "hand"),
    ("foot", "foot"),
    ("feet", "foot"),
];

static PAIN_NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(10|[0-9])\b").expect("valid pain number regex"));

fn words(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .map(str::to_string)
        .collect()
}

/// Canonical label of the first body part mentioned in `text`.
///
/// ```
/// use rescue_dialogue::followup::detect_body_part;
///
/// assert_eq!(detect_body_part("My LEGS are stuck"), Some("leg"));
/// assert_eq!(detect_body_part("I feel fine"), None);
/// ```
pub fn detect_body_part(text: &str) -> Option<&'static str> {
    let words = words(text);
    BODY_PARTS
        .iter()
        .find(|(keyword, _)| words.iter().any(|w| w == keyword))
        .map(|(_, label)| *label)
}

/// `true` when a reply to `question_key` should be followed by
/// [`FOLLOWUP_QUESTION`].
pub fn should_insert_followup(question_key: &str, reply: &str) -> bool {
    if question_key.ends_with(DETAIL_SUFFIX) || !FOLLOWUP_KEYS.contains(&question_key) {
        return false;
    }
    detect_body_part(reply).is_some()
}

pub fn detail_key(question_key: &str) -> String {
    format!("{question_key}{DETAIL_SUFFIX}")
}

pub fn body_part_key(question_key: &str) -> String {
    format!("{question_key}{BODY_PART_SUFFIX}")
}

/// Short phrase describing what a reply told us, e.g. "Leg issue noted."
pub fn summarize_answer(question_key: &str, reply: &str) -> String {
    let text = reply.trim();
    if text.is_empty() {
        return "Noted.".to_string();
    }
    let by_key = match question_key {
        "massive_bleeding" | "massive_bleeding_where" | "bleeding" => Some("Bleeding status noted."),
        "airway_talking" => Some("Airway status noted."),
        "breathing_trouble" | "breathing_difficulty" | "chest_injury" => {
            Some("Breathing status noted.")
        }
        "shock_signs" => Some("Circulation status noted."),
        "head_injury" => Some("Head injury status noted."),
        "keep_warm" => Some("Cold exposure noted."),
        "pain_scale" => Some("Pain level noted."),
        _ => None,
    };
    if let Some(phrase) = by_key {
        return phrase.to_string();
    }
    if let Some(part) = detect_body_part(text) {
        return format!("{} issue noted.", capitalize(part));
    }
    if PAIN_NUMBER.is_match(text) {
        return "Pain level noted.".to_string();
    }
    "Noted.".to_string()
}

/// Full acknowledgement sentence built from a [`summarize_answer`] phrase.
pub fn ack_sentence(summary: &str) -> String {
    let summary = summary.trim();
    if summary.is_empty() || summary == "Noted." {
        "Understood. Sent to the command center.".to_string()
    } else {
        format!("Understood. {summary} Sent to the command center.")
    }
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plural_body_parts_map_to_singular_labels() {
        assert_eq!(detect_body_part("both feet"), Some("foot"));
        assert_eq!(detect_body_part("my knees, mostly"), Some("knee"));
    }

    #[test]
    fn body_part_must_be_a_whole_word() {
        assert_eq!(detect_body_part("I'm armed with a flashlight"), None);
        assert_eq!(detect_body_part("headache"), None);
    }

    #[test]
    fn keyword_order_decides_between_several_parts() {
        assert_eq!(detect_body_part("my arm and my leg"), Some("leg"));
    }

    #[test]
    fn followup_only_for_location_questions() {
        assert!(should_insert_followup("pain", "my left leg"));
        assert!(should_insert_followup("initial", "my arm is stuck"));
        assert!(!should_insert_followup("airway_talking", "my arm is stuck"));
        assert!(!should_insert_followup("pain", "everywhere"));
    }

    #[test]
    fn followup_answers_never_trigger_another_followup() {
        assert!(!should_insert_followup("pain_detail", "left leg"));
        assert!(!should_insert_followup("injury_location_detail", "left leg"));
    }

    #[test]
    fn derived_keys() {
        assert_eq!(detail_key("pain"), "pain_detail");
        assert_eq!(body_part_key("pain"), "pain_body_part");
    }

    #[test]
    fn summaries_by_question_key() {
        assert_eq!(summarize_answer("massive_bleeding", "yes"), "Bleeding status noted.");
        assert_eq!(summarize_answer("airway_talking", "yes"), "Airway status noted.");
        assert_eq!(summarize_answer("chest_injury", "no"), "Breathing status noted.");
        assert_eq!(summarize_answer("shock_signs", "a bit"), "Circulation status noted.");
        assert_eq!(summarize_answer("head_injury", "no"), "Head injury status noted.");
        assert_eq!(summarize_answer("keep_warm", "yes"), "Cold exposure noted.");
    }

    #[test]
    fn summaries_fall_back_to_content() {
        assert_eq!(summarize_answer("pain", "my shoulder"), "Shoulder issue noted.");
        assert_eq!(summarize_answer("pain", "about a 6"), "Pain level noted.");
        assert_eq!(summarize_answer("mobility", "yes I can"), "Noted.");
        assert_eq!(summarize_answer("initial", "   "), "Noted.");
    }

    #[test]
    fn ack_sentence_wraps_summary() {
        assert_eq!(
            ack_sentence("Leg issue noted."),
            "Understood. Leg issue noted. Sent to the command center."
        );
        assert_eq!(ack_sentence("Noted."), "Understood. Sent to the command center.");
    }
}
