//! Built-in macro functions.
//!
//! Names are case-insensitive. Arguments are macro-expanded and stripped of
//! surrounding quotes before use. A call that does not fit its function's
//! shape returns `None` and falls through to expression handling.

use rand::Rng;
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;
use tracing::debug;

use story_state::{format_number, keys};

use super::Evaluator;
use crate::lz;
use crate::text::{
    compile_pattern, matching_close, parse_float_prefix, parse_int_prefix, split_args, unquote,
};

static CALL_HEAD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([A-Za-z]+)\s*\(").expect("valid regex"));

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+(?:\.\d+)?)\s*%$").expect("valid regex"));

/// The functions callable from macros and conditions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Regex,
    Includes,
    Chance,
    Random,
    Select,
    Min,
    Max,
    Avg,
    ToRegex,
    Compress,
    Decompress,
}

impl Builtin {
    pub const ALL: [Builtin; 11] = [
        Builtin::Regex,
        Builtin::Includes,
        Builtin::Chance,
        Builtin::Random,
        Builtin::Select,
        Builtin::Min,
        Builtin::Max,
        Builtin::Avg,
        Builtin::ToRegex,
        Builtin::Compress,
        Builtin::Decompress,
    ];

    /// Name as written in macros.
    pub fn name(&self) -> &'static str {
        match self {
            Builtin::Regex => "REGEX",
            Builtin::Includes => "INCLUDES",
            Builtin::Chance => "P",
            Builtin::Random => "RND",
            Builtin::Select => "SELECT",
            Builtin::Min => "MIN",
            Builtin::Max => "MAX",
            Builtin::Avg => "AVG",
            Builtin::ToRegex => "TOREGEX",
            Builtin::Compress => "TOLZ",
            Builtin::Decompress => "LZ",
        }
    }
}

impl FromStr for Builtin {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Builtin::ALL
            .iter()
            .find(|b| b.name().eq_ignore_ascii_case(s))
            .copied()
            .ok_or_else(|| format!("unknown function '{}'", s))
    }
}

/// Locate a call `NAME(...)` at the start of `text`.
///
/// Returns the function, its raw argument text and the byte length of the call.
pub(crate) fn parse_call(text: &str) -> Option<(Builtin, &str, usize)> {
    let caps = CALL_HEAD.captures(text)?;
    let builtin = caps.get(1)?.as_str().parse::<Builtin>().ok()?;
    let open = caps.get(0)?.end() - 1;
    let close = matching_close(text, open)?;
    Some((builtin, &text[open + 1..close], close + 1))
}

/// Evaluate a whole token such as `RND(1, 6)`.
pub(crate) fn call(ev: &mut Evaluator<'_>, token: &str) -> Option<String> {
    let token = token.trim();
    let (builtin, raw, len) = parse_call(token)?;
    if len != token.len() {
        return None;
    }

    let result = match builtin {
        Builtin::Regex => regex_match(ev, raw),
        Builtin::Includes => includes(ev, raw),
        Builtin::Chance => chance(ev, raw),
        Builtin::Random => random(ev, raw),
        Builtin::Select => select(ev, raw),
        Builtin::Min | Builtin::Max | Builtin::Avg => aggregate(ev, builtin, raw),
        Builtin::ToRegex => to_regex(ev, raw),
        Builtin::Compress => Some(lz::compress(&argument(ev, raw))),
        Builtin::Decompress => Some(decompress(ev, raw)),
    }?;

    debug!(function = builtin.name(), args = raw, result = %result, "Evaluated built-in");
    Some(result)
}

fn argument(ev: &mut Evaluator<'_>, raw: &str) -> String {
    let expanded = ev.expand(raw.trim());
    unquote(expanded.trim())
}

/// First argument plus the remaining text rejoined, for functions whose
/// second argument may itself contain commas.
fn head_and_rest<'r>(raw: &'r str) -> Option<(&'r str, &'r str)> {
    let args = split_args(raw);
    if args.len() < 2 {
        return None;
    }
    let head = args[0];
    Some((head, &raw[head.len() + 1..]))
}

fn regex_match(ev: &mut Evaluator<'_>, raw: &str) -> Option<String> {
    let (subject, pattern) = head_and_rest(raw)?;
    let subject = argument(ev, subject);
    let pattern = argument(ev, pattern);

    let re = match compile_pattern(&pattern) {
        Ok(re) => re,
        Err(err) => {
            ev.log.system_error(format!("REGEX(): invalid pattern '{}': {}", pattern, err));
            return Some("0".to_string());
        }
    };

    match re.captures(&subject) {
        Some(caps) => {
            for (i, key) in keys::MATCH_GROUPS.iter().enumerate() {
                let group = caps.get(i + 1).map(|m| m.as_str()).unwrap_or("");
                ev.defs.set(*key, group);
            }
            Some("1".to_string())
        }
        None => {
            for key in keys::MATCH_GROUPS {
                ev.defs.remove(key);
            }
            Some("0".to_string())
        }
    }
}

fn includes(ev: &mut Evaluator<'_>, raw: &str) -> Option<String> {
    let (haystack, needle) = head_and_rest(raw)?;
    let haystack = argument(ev, haystack);
    let needle = argument(ev, needle);
    Some(bool_result(haystack.contains(&needle)))
}

fn chance(ev: &mut Evaluator<'_>, raw: &str) -> Option<String> {
    let arg = argument(ev, raw);
    let hit = if let Some(caps) = PERCENT.captures(&arg) {
        let pct: f64 = caps[1].parse().ok()?;
        ev.rng.gen::<f64>() * 100.0 < pct
    } else if let Some(p) = parse_float_prefix(&arg) {
        ev.rng.gen::<f64>() < p
    } else {
        false
    };
    Some(bool_result(hit))
}

fn random(ev: &mut Evaluator<'_>, raw: &str) -> Option<String> {
    let args = split_args(raw);
    if args.len() != 2 {
        return None;
    }
    let low = parse_int_prefix(&argument(ev, args[0]));
    let high = parse_int_prefix(&argument(ev, args[1]));
    let (Some(mut low), Some(mut high)) = (low, high) else {
        return Some(String::new());
    };
    if low > high {
        std::mem::swap(&mut low, &mut high);
    }
    Some(ev.rng.gen_range(low..=high).to_string())
}

fn select(ev: &mut Evaluator<'_>, raw: &str) -> Option<String> {
    let (index, list) = head_and_rest(raw)?;
    let list = list.trim();
    let items = list.strip_prefix('[')?.strip_suffix(']')?;

    let Some(index) = parse_int_prefix(&argument(ev, index)) else {
        return Some(String::new());
    };
    let items = split_args(items);
    if index < 1 || index as usize > items.len() {
        return Some(String::new());
    }
    Some(argument(ev, items[index as usize - 1]))
}

fn aggregate(ev: &mut Evaluator<'_>, builtin: Builtin, raw: &str) -> Option<String> {
    if raw.trim().is_empty() {
        return None;
    }

    let mut values = Vec::new();
    for arg in split_args(raw) {
        match parse_float_prefix(&argument(ev, arg)) {
            Some(v) => values.push(v),
            None => return Some("NaN".to_string()),
        }
    }

    let result = match builtin {
        Builtin::Min => values.iter().copied().fold(f64::INFINITY, f64::min),
        Builtin::Max => values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
        _ => values.iter().sum::<f64>() / values.len() as f64,
    };
    Some(format_number(result))
}

fn to_regex(ev: &mut Evaluator<'_>, raw: &str) -> Option<String> {
    let args = split_args(raw);
    let text = argument(ev, args[0]);
    let flags = match args.get(1) {
        Some(flags) => argument(ev, flags),
        None => String::new(),
    };
    if args.len() > 2 {
        return None;
    }
    Some(format!("/{}/{}", text, flags))
}

fn decompress(ev: &mut Evaluator<'_>, raw: &str) -> String {
    let text = argument(ev, raw);
    match lz::decompress(&text) {
        Ok(plain) => plain,
        Err(err) => {
            ev.log.error(format!("LZ(): {}", err));
            text
        }
    }
}

fn bool_result(value: bool) -> String {
    let digit = if value { "1" } else { "0" };
    digit.to_string()
}
