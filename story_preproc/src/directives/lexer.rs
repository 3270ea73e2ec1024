//! Line-level lexing for directives.

use regex::Regex;
use std::sync::LazyLock;

use story_state::QuestionKind;

use crate::text::{split_args, strip_quotes};

static TOKEN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"^(?:"[^"]*"|'[^']*'|\S+)"#).expect("valid regex")
});

static KEY_VALUE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^([A-Za-z0-9_:.]+)(?:\s+(.*))?$").expect("valid regex"));

static NEXT_ARGS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(?:\(?\s*(\d+)\s*\)?\s+)?(.*)$").expect("valid regex"));

static QUESTION_TYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\(\s*([A-Za-z]+)\s*\)").expect("valid regex"));

static CHOICE_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)^(?:list\s*=\s*)?\[(.*)\]$").expect("valid regex"));

/// Opening text of an inline author's note.
pub const AUTHORS_NOTE_PREFIX: &str = "[Author's note:";

/// A `#keyword rest` line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectiveLine<'a> {
    /// Keyword without `#`, lowercased.
    pub keyword: String,
    /// Everything after the keyword, trimmed.
    pub rest: &'a str,
}

/// Split a directive line into keyword and remainder. Returns `None` for
/// lines that do not start with `#`.
pub fn parse_directive(line: &str) -> Option<DirectiveLine<'_>> {
    let body = line.strip_prefix('#')?;
    let end = body.find(char::is_whitespace).unwrap_or(body.len());
    Some(DirectiveLine {
        keyword: body[..end].to_lowercase(),
        rest: body[end..].trim(),
    })
}

/// Split off an author's-note prefix that directly precedes a directive.
///
/// `[Author's note: #define X 1` yields `("[Author's note:", "#define X 1")`.
pub fn split_authors_note(line: &str) -> Option<(&str, &str)> {
    let trimmed = line.trim_start();
    let rest = trimmed.strip_prefix(AUTHORS_NOTE_PREFIX)?.trim_start();
    if rest.starts_with('#') {
        let prefix_len = line.len() - trimmed.len() + AUTHORS_NOTE_PREFIX.len();
        Some((&line[..prefix_len], rest))
    } else {
        None
    }
}

/// Take one token: a quoted string (quotes kept) or a run of non-whitespace.
///
/// Returns the token and the trimmed remainder.
pub fn take_token(text: &str) -> Option<(&str, &str)> {
    let text = text.trim_start();
    let m = TOKEN.find(text)?;
    Some((m.as_str(), text[m.end()..].trim_start()))
}

/// `KEY [VALUE]`, as used by `#define` and `#append`.
pub fn key_value(text: &str) -> Option<(&str, &str)> {
    let caps = KEY_VALUE.captures(text)?;
    let key = caps.get(1)?.as_str();
    let value = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
    Some((key, value))
}

/// `[(N)] VALUE`, as used by `#next`.
pub fn next_args(text: &str) -> (Option<i64>, &str) {
    match NEXT_ARGS.captures(text) {
        Some(caps) => {
            let delay = caps.get(1).and_then(|m| m.as_str().parse().ok());
            let data = caps.get(2).map(|m| m.as_str().trim()).unwrap_or("");
            (delay, data)
        }
        None => (None, text.trim()),
    }
}

/// Parsed arguments of `#ask`/`#asking`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AskArgs<'a> {
    pub key: &'a str,
    pub text: &'a str,
    /// Explicit `(type)`, unparsed.
    pub kind: Option<&'a str>,
    pub choices: Vec<String>,
}

impl AskArgs<'_> {
    /// Explicit kind, or the kind inferred from the question text.
    ///
    /// An unknown explicit kind is returned as the error.
    pub fn resolved_kind(&self) -> Result<QuestionKind, String> {
        match self.kind {
            Some(kind) => kind.parse(),
            None => Ok(QuestionKind::infer(self.text)),
        }
    }
}

/// `KEY "question" [(type)] [list=[a, b, c]]`.
pub fn ask_args(text: &str) -> Result<AskArgs<'_>, String> {
    let (key, rest) = take_token(text).ok_or("missing question key")?;
    if !crate::text::is_identifier(key) {
        return Err(format!("invalid question key '{}'", key));
    }

    let quote = rest
        .chars()
        .next()
        .filter(|c| *c == '"' || *c == '\'')
        .ok_or("question text must be quoted")?;
    let close = rest[1..]
        .find(quote)
        .ok_or("unterminated question text")?
        + 1;
    let question = &rest[1..close];
    let mut rest = rest[close + 1..].trim_start();

    let mut kind = None;
    if let Some(caps) = QUESTION_TYPE.captures(rest) {
        kind = caps.get(1).map(|m| m.as_str());
        rest = rest[caps.get(0).map_or(0, |m| m.end())..].trim_start();
    }

    let mut choices = Vec::new();
    if !rest.is_empty() {
        let caps = CHOICE_LIST
            .captures(rest)
            .ok_or_else(|| format!("unexpected text after question: {}", rest))?;
        let list = caps.get(1).map_or("", |m| m.as_str());
        choices = split_args(list)
            .into_iter()
            .map(|item| strip_quotes(item.trim()).to_string())
            .filter(|item| !item.is_empty())
            .collect();
    }

    Ok(AskArgs {
        key,
        text: question,
        kind,
        choices,
    })
}

/// Remove `/* … */` comments from a line.
///
/// `in_comment` carries an unterminated comment into the next line. Returns
/// `None` when nothing but comments and whitespace was on the line.
pub fn strip_block_comments(line: &str, in_comment: &mut bool) -> Option<String> {
    if !*in_comment && !line.contains("/*") {
        return Some(line.to_string());
    }

    let mut out = String::new();
    let mut rest = line;
    loop {
        if *in_comment {
            match rest.find("*/") {
                Some(end) => {
                    rest = &rest[end + 2..];
                    *in_comment = false;
                }
                None => break,
            }
        } else {
            match rest.find("/*") {
                Some(start) => {
                    out.push_str(&rest[..start]);
                    rest = &rest[start + 2..];
                    *in_comment = true;
                }
                None => {
                    out.push_str(rest);
                    break;
                }
            }
        }
    }

    if out.trim().is_empty() {
        None
    } else {
        Some(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_directive() {
        let line = parse_directive("#DEFINE  HP 10 ").unwrap();
        assert_eq!(line.keyword, "define");
        assert_eq!(line.rest, "HP 10");

        let bare = parse_directive("#else").unwrap();
        assert_eq!(bare.keyword, "else");
        assert_eq!(bare.rest, "");

        assert!(parse_directive("  #define X").is_none());
        assert!(parse_directive("plain").is_none());
    }

    #[test]
    fn test_split_authors_note() {
        assert_eq!(
            split_authors_note("[Author's note: #define X 1"),
            Some(("[Author's note:", "#define X 1"))
        );
        assert_eq!(split_authors_note("[Author's note: be terse]"), None);
    }

    #[test]
    fn test_take_token() {
        assert_eq!(take_token("  \"two words\" rest"), Some(("\"two words\"", "rest")));
        assert_eq!(take_token("one two"), Some(("one", "two")));
        assert_eq!(take_token("   "), None);
    }

    #[test]
    fn test_key_value() {
        assert_eq!(key_value("HP 10"), Some(("HP", "10")));
        assert_eq!(key_value("L:gold"), Some(("L:gold", "")));
        assert_eq!(key_value("bad key"), Some(("bad", "key")));
        assert_eq!(key_value("!bad"), None);
    }

    #[test]
    fn test_next_args() {
        assert_eq!(next_args("(3) Rain falls"), (Some(3), "Rain falls"));
        assert_eq!(next_args("2 Rain falls"), (Some(2), "Rain falls"));
        assert_eq!(next_args("Rain falls"), (None, "Rain falls"));
        assert_eq!(next_args(""), (None, ""));
    }

    #[test]
    fn test_ask_args() {
        let args = ask_args("AGE \"How old is Mira?\" (int)").unwrap();
        assert_eq!(args.key, "AGE");
        assert_eq!(args.text, "How old is Mira?");
        assert_eq!(args.resolved_kind(), Ok(QuestionKind::Int));
        assert!(args.choices.is_empty());

        let args = ask_args("MOOD 'How does she feel?' list=[happy, \"very sad\"]").unwrap();
        assert_eq!(args.choices, vec!["happy".to_string(), "very sad".to_string()]);
        assert_eq!(args.resolved_kind(), Ok(QuestionKind::String));

        let args = ask_args("AWAKE \"Is the dragon awake?\"").unwrap();
        assert_eq!(args.resolved_kind(), Ok(QuestionKind::None));

        assert!(ask_args("AGE How old?").is_err());
        assert!(ask_args("AGE \"open").is_err());
        assert!(ask_args("AGE \"ok\" trailing").is_err());
        assert!(ask_args("AGE \"ok\" (color)").unwrap().resolved_kind().is_err());
    }

    #[test]
    fn test_block_comments() {
        let mut open = false;
        assert_eq!(strip_block_comments("a /* b */ c", &mut open).as_deref(), Some("a  c"));
        assert!(!open);

        assert_eq!(strip_block_comments("keep /* start", &mut open).as_deref(), Some("keep "));
        assert!(open);
        assert_eq!(strip_block_comments("still hidden", &mut open), None);
        assert_eq!(strip_block_comments("end */ shown", &mut open).as_deref(), Some(" shown"));
        assert!(!open);

        assert_eq!(strip_block_comments("/* only */", &mut open), None);
        assert_eq!(strip_block_comments("", &mut open).as_deref(), Some(""));
    }
}
