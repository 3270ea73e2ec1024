//! Validation of engine replies against a question's expected kind.

use regex::Regex;
use std::sync::LazyLock;

use story_state::{Question, QuestionKind};

static YES: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:yes|true|1)\b").expect("valid regex"));

static NO: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:no|false|0)\b").expect("valid regex"));

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"));

static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

static NAME: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\p{Lu}[\p{L}'\-]*(?:\s+\p{Lu}[\p{L}'\-]*)?$").expect("valid regex")
});

fn trim_sentence(text: &str) -> &str {
    text.trim().trim_end_matches(['.', '!', '?']).trim_end()
}

/// Yes/no → `"1"`/`"0"`. Replies containing both or neither are invalid.
pub fn parse_bool(reply: &str) -> Option<String> {
    match (YES.is_match(reply), NO.is_match(reply)) {
        (true, false) => Some("1".to_string()),
        (false, true) => Some("0".to_string()),
        _ => None,
    }
}

/// Exactly one integer literal.
pub fn parse_int(reply: &str) -> Option<String> {
    let mut numbers = NUMBER.find_iter(reply);
    let only = numbers.next()?;
    if numbers.next().is_some() || only.as_str().contains('.') {
        return None;
    }
    only.as_str().parse::<i64>().ok().map(|n| n.to_string())
}

/// Any non-empty text once tag-like markup is removed.
pub fn parse_string(reply: &str) -> Option<String> {
    let text = TAG.replace_all(reply, "");
    let text = text.trim();
    if text.is_empty() {
        None
    } else {
        Some(text.to_string())
    }
}

/// One or two capitalized words; trailing sentence punctuation is ignored.
pub fn parse_name(reply: &str) -> Option<String> {
    let name = trim_sentence(reply);
    if NAME.is_match(name) {
        Some(name.to_string())
    } else {
        None
    }
}

fn match_choice<'q>(choices: &'q [String], text: &str) -> Option<&'q String> {
    let wanted = trim_sentence(text).to_lowercase();
    choices
        .iter()
        .find(|choice| choice.trim().to_lowercase() == wanted)
}

/// Validate a reply for a question, returning the value to store.
///
/// A reply that names one of the registered choices wins over the
/// kind-based rules; the stored value is then the choice as registered.
pub fn parse_answer(question: &Question, reply: &str) -> Option<String> {
    let parsed = match question.kind {
        QuestionKind::Bool | QuestionKind::None => parse_bool(reply),
        QuestionKind::Int => parse_int(reply),
        QuestionKind::String => parse_string(reply),
        QuestionKind::Name => parse_name(reply),
    };

    if !question.choices.is_empty() {
        let choice = match_choice(&question.choices, reply).or_else(|| {
            parsed
                .as_deref()
                .and_then(|p| match_choice(&question.choices, p))
        });
        if let Some(choice) = choice {
            return Some(choice.clone());
        }
    }
    parsed
}
