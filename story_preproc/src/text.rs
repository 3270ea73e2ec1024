//! Small text helpers shared by the interpreter, evaluator and hooks.

use regex::{Regex, RegexBuilder};
use std::sync::LazyLock;

/// Tag whose contents never survive into the next pass.
pub const RESERVED_OPEN: &str = "<SYSTEM>";
pub const RESERVED_CLOSE: &str = "</SYSTEM>";

static IDENTIFIER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_:.]+$").expect("valid regex"));

static FLOAT_PREFIX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[+-]?(?:\d+\.?\d*|\.\d+)(?:[eE][+-]?\d+)?").expect("valid regex")
});

static INT_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[+-]?\d+").expect("valid regex"));

static BLANK_RUN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\n(?:[ \t]*\n){2,}").expect("valid regex"));

/// Check whether `text` is a bare definition name.
pub fn is_identifier(text: &str) -> bool {
    IDENTIFIER.is_match(text)
}

/// Remove one pair of matching surrounding quotes (`"` or `'`).
pub fn strip_quotes(text: &str) -> &str {
    let bytes = text.as_bytes();
    if bytes.len() >= 2 {
        let first = bytes[0];
        if (first == b'"' || first == b'\'') && bytes[bytes.len() - 1] == first {
            return &text[1..text.len() - 1];
        }
    }
    text
}

/// Find the byte index of the bracket closing the one at `open`.
///
/// Only the bracket type found at `open` is counted; quotes are not special.
pub fn matching_close(text: &str, open: usize) -> Option<usize> {
    let open_char = text[open..].chars().next()?;
    let close_char = match open_char {
        '{' => '}',
        '(' => ')',
        '[' => ']',
        _ => return None,
    };

    let mut depth = 0usize;
    for (i, c) in text[open..].char_indices() {
        if c == open_char {
            depth += 1;
        } else if c == close_char {
            depth -= 1;
            if depth == 0 {
                return Some(open + i);
            }
        }
    }
    None
}

/// Split an argument list at commas that are not nested in brackets.
///
/// An argument that starts with a quote runs to its closing quote, so quoted
/// commas do not split. Quotes elsewhere, such as apostrophes, are plain text.
pub fn split_args(text: &str) -> Vec<&str> {
    let mut args = Vec::new();
    let mut depth = 0i32;
    let mut start = 0;
    let mut at_arg_start = true;
    let mut skip_to = 0;
    for (i, c) in text.char_indices() {
        if i < skip_to {
            continue;
        }
        if at_arg_start && depth == 0 && (c == '"' || c == '\'') {
            skip_to = literal_end(text, i, c);
            at_arg_start = false;
            continue;
        }
        if !c.is_whitespace() {
            at_arg_start = false;
        }
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            ',' if depth == 0 => {
                args.push(&text[start..i]);
                start = i + 1;
                at_arg_start = true;
            }
            _ => {}
        }
    }
    args.push(&text[start..]);
    args
}

/// Byte index just past the literal that opens with `quote` at `start`.
/// Backslash escapes the next character. Unterminated literals run to the end.
pub fn literal_end(text: &str, start: usize, quote: char) -> usize {
    let body = start + quote.len_utf8();
    let mut escaped = false;
    for (i, c) in text[body..].char_indices() {
        if escaped {
            escaped = false;
        } else if c == '\\' {
            escaped = true;
        } else if c == quote {
            return body + i + c.len_utf8();
        }
    }
    text.len()
}

/// [`strip_quotes`], then undo the `\\`, `\"` and `\'` escapes of a quoted literal.
pub fn unquote(text: &str) -> String {
    let inner = strip_quotes(text);
    if inner.len() == text.len() {
        return text.to_string();
    }
    let mut out = String::with_capacity(inner.len());
    let mut chars = inner.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some(next @ ('\\' | '"' | '\'')) => out.push(next),
            Some(other) => {
                out.push('\\');
                out.push(other);
            }
            None => out.push('\\'),
        }
    }
    out
}

/// Parse a leading integer the lenient way (`"12 gold"` → 12).
pub fn parse_int_prefix(text: &str) -> Option<i64> {
    INT_PREFIX
        .find(text.trim())
        .and_then(|m| m.as_str().parse::<i64>().ok())
}

/// Parse a leading float the lenient way (`"2.5kg"` → 2.5).
pub fn parse_float_prefix(text: &str) -> Option<f64> {
    FLOAT_PREFIX
        .find(text.trim())
        .and_then(|m| m.as_str().parse::<f64>().ok())
}

/// Split a `/pattern/flags` literal into its pattern and flags.
pub fn parse_regex_literal(text: &str) -> Option<(&str, &str)> {
    let rest = text.strip_prefix('/')?;
    let end = rest.rfind('/')?;
    let flags = &rest[end + 1..];
    if flags.chars().all(|c| c.is_ascii_alphabetic()) {
        Some((&rest[..end], flags))
    } else {
        None
    }
}

/// Compile a pattern with `i`, `m` and `s` flags. Other flags are ignored.
pub fn build_regex(pattern: &str, flags: &str) -> Result<Regex, regex::Error> {
    RegexBuilder::new(pattern)
        .case_insensitive(flags.contains('i'))
        .multi_line(flags.contains('m'))
        .dot_matches_new_line(flags.contains('s'))
        .build()
}

/// Compile either a `/pattern/flags` literal or a bare pattern.
pub fn compile_pattern(text: &str) -> Result<Regex, regex::Error> {
    match parse_regex_literal(text) {
        Some((pattern, flags)) => build_regex(pattern, flags),
        None => Regex::new(text),
    }
}

/// Remove every reserved block, innermost first.
pub fn strip_reserved_tags(text: &str) -> String {
    let mut text = text.to_string();
    loop {
        let Some(close) = text.find(RESERVED_CLOSE) else {
            break;
        };
        let Some(open) = text[..close].rfind(RESERVED_OPEN) else {
            break;
        };
        text.replace_range(open..close + RESERVED_CLOSE.len(), "");
    }
    text
}

/// Wrap text in the reserved tag.
pub fn wrap_reserved(text: &str) -> String {
    format!("{}\n{}\n{}", RESERVED_OPEN, text, RESERVED_CLOSE)
}

/// Collapse runs of blank lines to a single empty line.
pub fn collapse_blank_lines(text: &str) -> String {
    BLANK_RUN.replace_all(text, "\n\n").into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_quotes() {
        assert_eq!(strip_quotes("\"hello\""), "hello");
        assert_eq!(strip_quotes("'hi'"), "hi");
        assert_eq!(strip_quotes("\"mixed'"), "\"mixed'");
        assert_eq!(strip_quotes("\""), "\"");
        assert_eq!(strip_quotes("plain"), "plain");
    }

    #[test]
    fn test_unquote() {
        assert_eq!(unquote(r#""say \"hi\"""#), r#"say "hi""#);
        assert_eq!(unquote(r#"'a\\b \d'"#), r"a\b \d");
        assert_eq!(unquote(r#"plain \"x\""#), r#"plain \"x\""#);
    }

    #[test]
    fn test_literal_end() {
        assert_eq!(literal_end(r#""a\"b" + 1"#, 0, '"'), 6);
        assert_eq!(literal_end("'open", 0, '\''), 5);
    }

    #[test]
    fn test_matching_close() {
        let text = "a{b{c}d}e";
        assert_eq!(matching_close(text, 1), Some(7));
        assert_eq!(matching_close(text, 3), Some(5));
        assert_eq!(matching_close("{open", 0), None);
    }

    #[test]
    fn test_split_args_respects_nesting() {
        assert_eq!(split_args("1, [a, b], f(x, y)"), vec!["1", " [a, b]", " f(x, y)"]);
        assert_eq!(split_args(""), vec![""]);
        assert_eq!(split_args("\"a, b\", c"), vec!["\"a, b\"", " c"]);
        assert_eq!(split_args(" 'x,\\'y', z"), vec![" 'x,\\'y'", " z"]);
        assert_eq!(split_args("Mira's, sword"), vec!["Mira's", " sword"]);
    }

    #[test]
    fn test_lenient_number_prefixes() {
        assert_eq!(parse_int_prefix(" 12 gold"), Some(12));
        assert_eq!(parse_int_prefix("-3.9"), Some(-3));
        assert_eq!(parse_int_prefix("gold"), None);
        assert_eq!(parse_float_prefix("2.5kg"), Some(2.5));
        assert_eq!(parse_float_prefix(".5"), Some(0.5));
        assert_eq!(parse_float_prefix("x"), None);
    }

    #[test]
    fn test_regex_literal() {
        assert_eq!(parse_regex_literal("/sw(o)rd/gi"), Some(("sw(o)rd", "gi")));
        assert_eq!(parse_regex_literal("/a/b/"), Some(("a/b", "")));
        assert_eq!(parse_regex_literal("sword"), None);
        assert_eq!(parse_regex_literal("/path/to file"), None);

        let re = compile_pattern("/SWORD/i").unwrap();
        assert!(re.is_match("a sword"));
    }

    #[test]
    fn test_strip_reserved_tags_nested() {
        let text = "keep <SYSTEM>a <SYSTEM>b</SYSTEM> c</SYSTEM> this";
        assert_eq!(strip_reserved_tags(text), "keep  this");
        assert_eq!(strip_reserved_tags("no tags"), "no tags");
        assert_eq!(strip_reserved_tags("<SYSTEM>unclosed"), "<SYSTEM>unclosed");
    }

    #[test]
    fn test_collapse_blank_lines() {
        assert_eq!(collapse_blank_lines("a\n\n\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n\nb"), "a\n\nb");
        assert_eq!(collapse_blank_lines("a\n \n\t\nb"), "a\n\nb");
    }
}
