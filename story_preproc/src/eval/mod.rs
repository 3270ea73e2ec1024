//! Macro expansion and evaluation.
//!
//! A macro is a `{…}` span anywhere in text. Spans are expanded innermost
//! first; the inner text then resolves as
//! 1. a definition name, replaced by its fully expanded value,
//! 2. a built-in call such as `RND(1,6)`,
//! 3. an expression, replaced by its result,
//!
//! and otherwise stays as written. Whole-text scans repeat until nothing
//! changes or the round limit is hit.

pub mod builtins;
pub mod expr;

pub use builtins::Builtin;
pub use expr::{evaluate, NoSymbols, Scope, Value};

use rand::rngs::StdRng;
use regex::Regex;
use std::sync::LazyLock;
use tracing::trace;

use story_state::{format_number, resolve_key, DefValue, Defs, PassLog};

use crate::error::EvalError;
use crate::text::{is_identifier, literal_end, matching_close, strip_quotes};

static CALL_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:REGEX|INCLUDES|P|RND|SELECT|MIN|MAX|AVG|TOREGEX|TOLZ|LZ)\s*\(")
        .expect("valid regex")
});

/// Deepest allowed nesting of `{…}` spans, counting definitions expanded
/// inside definitions.
pub const MAX_MACRO_DEPTH: usize = 32;

static ARITHMETIC_ONLY: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9+\-*/().\s]+$").expect("valid regex"));

/// Identifier lookup against the definitions store.
pub struct DefsScope<'a> {
    pub defs: &'a Defs,
    pub namespace: &'a str,
}

impl Scope for DefsScope<'_> {
    fn lookup(&self, name: &str) -> Option<Value> {
        let key = resolve_key(self.namespace, name);
        self.defs.get(&key).map(|raw| match DefValue::classify(raw) {
            DefValue::Number(n) => Value::Num(n),
            DefValue::Text(s) => Value::Str(s),
        })
    }
}

/// Expands macros and evaluates conditions for one pass.
pub struct Evaluator<'a> {
    defs: &'a mut Defs,
    namespace: &'a str,
    log: &'a mut PassLog,
    rng: &'a mut StdRng,
    max_rounds: usize,
    /// Keys currently being expanded, innermost last.
    expanding: Vec<String>,
    /// Set when a span was left alone because its key is already being expanded.
    cycle_hit: bool,
    /// Current `{…}` nesting.
    depth: usize,
    /// Set when a span below the current one hit [`MAX_MACRO_DEPTH`].
    depth_hit: bool,
    depth_logged: bool,
}

impl<'a> Evaluator<'a> {
    pub fn new(
        defs: &'a mut Defs,
        namespace: &'a str,
        log: &'a mut PassLog,
        rng: &'a mut StdRng,
        max_rounds: usize,
    ) -> Self {
        Self {
            defs,
            namespace,
            log,
            rng,
            max_rounds: max_rounds.max(1),
            expanding: Vec::new(),
            cycle_hit: false,
            depth: 0,
            depth_hit: false,
            depth_logged: false,
        }
    }

    /// Expand every macro in `text`.
    ///
    /// Expanding the result again changes nothing once no known names remain
    /// inside braces. A self-referencing definition is expanded once per call
    /// and its inner reference is left as written.
    pub fn expand(&mut self, text: &str) -> String {
        let outer_cycle = std::mem::take(&mut self.cycle_hit);
        let mut current = text.to_string();
        let mut settled = false;

        for round in 0..self.max_rounds {
            let (next, changed) = self.expand_round(&current);
            current = next;
            if !changed || self.cycle_hit {
                settled = true;
                break;
            }
            trace!(round, "Macro expansion round changed text");
        }
        if !settled {
            self.log.error(format!(
                "Macro expansion stopped after {} rounds: {}",
                self.max_rounds, current
            ));
        }

        self.cycle_hit |= outer_cycle;
        current
    }

    /// One left-to-right scan. Reports whether any span was replaced by
    /// something different.
    fn expand_round(&mut self, text: &str) -> (String, bool) {
        let mut out = String::with_capacity(text.len());
        let mut changed = false;
        let mut rest = text;

        while let Some(open) = rest.find('{') {
            out.push_str(&rest[..open]);
            match matching_close(rest, open) {
                Some(close) => {
                    let span = &rest[open..=close];
                    let replacement = self.expand_span(span);
                    if replacement != span {
                        changed = true;
                    }
                    out.push_str(&replacement);
                    rest = &rest[close + 1..];
                }
                None => {
                    out.push('{');
                    rest = &rest[open + 1..];
                }
            }
        }
        out.push_str(rest);
        (out, changed)
    }

    /// Expand one span. A span that is nested too deeply, or that contains
    /// one, is left as written.
    fn expand_span(&mut self, span: &str) -> String {
        if self.depth >= MAX_MACRO_DEPTH {
            if !self.depth_logged {
                self.depth_logged = true;
                self.log.error(format!(
                    "Macros nested deeper than {} levels were left as written",
                    MAX_MACRO_DEPTH
                ));
            }
            self.depth_hit = true;
            return span.to_string();
        }

        let outer_hit = std::mem::take(&mut self.depth_hit);
        self.depth += 1;
        let resolved = self.resolve_span(span);
        self.depth -= 1;
        let hit = self.depth_hit;
        self.depth_hit |= outer_hit;

        if hit {
            span.to_string()
        } else {
            resolved
        }
    }

    fn resolve_span(&mut self, span: &str) -> String {
        let inner = span[1..span.len() - 1].trim();
        if inner.is_empty() {
            return span.to_string();
        }
        let inner = self.expand(inner);

        if is_identifier(&inner) {
            let key = resolve_key(self.namespace, &inner);
            if self.expanding.contains(&key) {
                self.cycle_hit = true;
                return format!("{{{}}}", inner);
            }
            let Some(value) = self.defs.get(&key).map(str::to_string) else {
                return format!("{{{}}}", inner);
            };
            self.expanding.push(key);
            let expanded = self.expand(&value);
            self.expanding.pop();
            return expanded;
        }

        if let Some(result) = builtins::call(self, &inner) {
            return result;
        }

        match self.evaluate(&inner) {
            Ok(Value::Num(n)) if n.is_finite() => format_number(n),
            Ok(Value::Str(s)) => s,
            _ => inner,
        }
    }

    fn evaluate(&self, src: &str) -> Result<Value, EvalError> {
        let scope = DefsScope {
            defs: &*self.defs,
            namespace: self.namespace,
        };
        evaluate(src, &scope)
    }

    /// Replace bare definition names in a condition with their values as
    /// literals, so built-in calls see values rather than names.
    ///
    /// Quoted strings, `/regex/` arguments and names directly followed by `(`
    /// are left alone, as are names that are not defined.
    fn substitute_defs(&self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut previous: Option<char> = None;
        let mut i = 0;

        while let Some(c) = text[i..].chars().next() {
            let end = match c {
                '"' | '\'' => literal_end(text, i, c),
                '/' if matches!(previous, None | Some('(') | Some(',')) => {
                    let close = literal_end(text, i, '/');
                    text[close..]
                        .find(|f: char| !f.is_ascii_alphabetic())
                        .map_or(text.len(), |n| close + n)
                }
                c if c.is_alphanumeric() || c == '_' => {
                    let word_end = text[i..]
                        .find(|w: char| !(w.is_alphanumeric() || matches!(w, '_' | ':' | '.')))
                        .map_or(text.len(), |n| i + n);
                    let name = &text[i..word_end];
                    let is_call = text[word_end..].trim_start().starts_with('(');
                    let value = if c.is_alphabetic() || c == '_' {
                        self.defs.get(&resolve_key(self.namespace, name))
                    } else {
                        None
                    };
                    match value {
                        Some(value) if !is_call && name != "true" && name != "false" => {
                            out.push_str(&as_literal(value));
                            i = word_end;
                            previous = Some(c);
                            continue;
                        }
                        _ => word_end,
                    }
                }
                _ => i + c.len_utf8(),
            };
            out.push_str(&text[i..end]);
            if !c.is_whitespace() {
                previous = Some(c);
            }
            i = end;
        }
        out
    }

    /// Replace each built-in call in an expression with its result as a literal.
    fn substitute_calls(&mut self, text: &str) -> String {
        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        loop {
            let call = CALL_START.find(rest).map(|m| m.start());
            let quote = rest.find(['"', '\'']);
            match (call, quote) {
                (call, Some(q)) if call.map_or(true, |c| q < c) => {
                    let quote_char = if rest[q..].starts_with('"') { '"' } else { '\'' };
                    let end = literal_end(rest, q, quote_char);
                    out.push_str(&rest[..end]);
                    rest = &rest[end..];
                }
                (Some(start), _) => {
                    let Some((_, _, len)) = builtins::parse_call(&rest[start..]) else {
                        break;
                    };
                    let call = &rest[start..start + len];
                    out.push_str(&rest[..start]);
                    match builtins::call(self, call) {
                        Some(result) => out.push_str(&as_literal(&result)),
                        None => out.push_str(call),
                    }
                    rest = &rest[start + len..];
                }
                (None, _) => break,
            }
        }
        out.push_str(rest);
        out
    }

    /// Evaluate a `#if`/`#elif` condition. Failures log and count as false.
    pub fn eval_condition(&mut self, condition: &str) -> bool {
        let expanded = self.expand(condition);
        let resolved = self.substitute_defs(&expanded);
        let substituted = self.substitute_calls(&resolved);
        match self.evaluate(&substituted) {
            Ok(value) => value.truthy(),
            Err(err) => {
                self.log
                    .error(format!("Condition error in '{}': {}", condition.trim(), err));
                false
            }
        }
    }

    /// Evaluate a directive value: expand macros and, when only arithmetic
    /// remains, compute it.
    pub fn eval_value(&mut self, value: &str) -> String {
        let expanded = self.expand(value);
        let expanded = expanded.trim();
        if ARITHMETIC_ONLY.is_match(expanded) {
            if let Ok(Value::Num(n)) = evaluate(expanded, &NoSymbols) {
                if n.is_finite() {
                    return format_number(n);
                }
            }
        }
        expanded.to_string()
    }

    /// [`Evaluator::eval_value`] with surrounding quotes removed.
    pub fn eval_text(&mut self, value: &str) -> String {
        strip_quotes(&self.eval_value(value)).to_string()
    }
}

/// Render a built-in result so the expression parser reads it back unchanged.
fn as_literal(result: &str) -> String {
    if DefValue::is_numeric(result) {
        result.trim().to_string()
    } else {
        let escaped = result.replace('\\', "\\\\").replace('"', "\\\"");
        format!("\"{}\"", escaped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use story_state::Verbosity;

    struct Fixture {
        defs: Defs,
        log: PassLog,
        rng: StdRng,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                defs: Defs::new(),
                log: PassLog::new(Verbosity::Commands),
                rng: StdRng::seed_from_u64(1),
            }
        }

        fn eval(&mut self) -> Evaluator<'_> {
            Evaluator::new(&mut self.defs, "", &mut self.log, &mut self.rng, 32)
        }

        fn eval_in<'s>(&'s mut self, namespace: &'s str) -> Evaluator<'s> {
            Evaluator::new(&mut self.defs, namespace, &mut self.log, &mut self.rng, 32)
        }
    }

    #[test]
    fn test_identifier_expansion() {
        let mut fx = Fixture::new();
        fx.defs.set("NAME", "Mira");
        fx.defs.set("GREETING", "Hello, {NAME}!");
        assert_eq!(fx.eval().expand("{GREETING} {MISSING}"), "Hello, Mira! {MISSING}");
    }

    #[test]
    fn test_innermost_first() {
        let mut fx = Fixture::new();
        fx.defs.set("WHICH", "HERO");
        fx.defs.set("HERO", "Mira");
        assert_eq!(fx.eval().expand("{{WHICH}}"), "Mira");
    }

    #[test]
    fn test_self_reference_is_identity() {
        let mut fx = Fixture::new();
        fx.defs.set("LOOP", "again {LOOP}");
        let once = fx.eval().expand("{LOOP}");
        assert_eq!(once, "again {LOOP}");
    }

    #[test]
    fn test_mutual_recursion_terminates() {
        let mut fx = Fixture::new();
        fx.defs.set("A", "{B}");
        fx.defs.set("B", "{A}");
        let out = fx.eval().expand("{A}");
        assert!(out.contains("{A}") || out.contains("{B}"));
    }

    #[test]
    fn test_expansion_is_a_fixed_point() {
        let mut fx = Fixture::new();
        fx.defs.set("HP", "7");
        fx.defs.set("LINE", "HP is {HP}, doubled {HP * 2}, {UNKNOWN}");
        let once = fx.eval().expand("{LINE}");
        let twice = fx.eval().expand(&once);
        assert_eq!(once, "HP is 7, doubled 14, {UNKNOWN}");
        assert_eq!(once, twice);
    }

    #[test]
    fn test_expression_and_builtin_macros() {
        let mut fx = Fixture::new();
        fx.defs.set("GOLD", "12");
        assert_eq!(fx.eval().expand("{GOLD + 3}"), "15");
        assert_eq!(fx.eval().expand("{SELECT(2,[a,b,c])}"), "b");
        assert_eq!(fx.eval().expand("{'The ' + 'end'}"), "The end");
        assert_eq!(fx.eval().expand("{not an expression}"), "not an expression");
    }

    #[test]
    fn test_unbalanced_braces_are_kept() {
        let mut fx = Fixture::new();
        fx.defs.set("X", "1");
        assert_eq!(fx.eval().expand("a { b {X}"), "a { b 1");
        assert_eq!(fx.eval().expand("close } only"), "close } only");
    }

    #[test]
    fn test_namespace_local_keys() {
        let mut fx = Fixture::new();
        fx.defs.set("town_inn", "The Gull");
        assert_eq!(fx.eval_in("town").expand("{L:inn}"), "The Gull");
        assert_eq!(fx.eval_in("town").expand("{local:inn}"), "The Gull");
    }

    #[test]
    fn test_conditions() {
        let mut fx = Fixture::new();
        fx.defs.set("HP", "3");
        fx.defs.set("CLASS", "mage");
        let mut ev = fx.eval();
        assert!(ev.eval_condition("HP < 5"));
        assert!(ev.eval_condition("{HP} == 3 && CLASS == 'mage'"));
        assert!(ev.eval_condition("!(HP > 5)"));
        assert!(ev.eval_condition("MAX({HP}, 9) == 9"));
        assert!(!ev.eval_condition("HP >"));
        assert!(!ev.eval_condition("MISSING == 1"));
    }

    #[test]
    fn test_condition_errors_are_logged() {
        let mut fx = Fixture::new();
        assert!(!fx.eval().eval_condition("1 +"));
        assert!(fx.log.as_str().starts_with("ERROR: Condition error"));
    }

    #[test]
    fn test_condition_with_text_builtin() {
        let mut fx = Fixture::new();
        fx.defs.set("USER_INPUT", "I draw my sword");
        let mut ev = fx.eval();
        assert!(ev.eval_condition("INCLUDES({USER_INPUT}, sword)"));
        assert!(ev.eval_condition("SELECT(1,[north,south]) == 'north'"));
    }

    #[test]
    fn test_condition_resolves_definitions_before_builtins() {
        let mut fx = Fixture::new();
        fx.defs.set("USER_INPUT", "I draw my sword");
        fx.defs.set("CHANCE", "100%");
        fx.defs.set("MOTTO", "say \"hi\", then, \\ leave");
        fx.defs.set("town_gate", "open");
        {
            let mut ev = fx.eval();
            assert!(ev.eval_condition("INCLUDES(USER_INPUT, sword)"));
            assert!(ev.eval_condition("REGEX(USER_INPUT, /SWORD/i)"));
            assert!(ev.eval_condition("P(CHANCE)"));
            assert!(ev.eval_condition("USER_INPUT == \"I draw my sword\""));
            assert!(ev.eval_condition("INCLUDES(MOTTO, 'then')"));
            assert!(ev.eval_condition("MOTTO == 'say \"hi\", then, \\\\ leave'"));
            assert!(!ev.eval_condition("INCLUDES(USER_INPUT, 'shield')"));
            assert!(!ev.eval_condition("INCLUDES('USER_INPUT', sword)"));
        }
        assert!(fx.eval_in("town").eval_condition("L:gate == 'open'"));
        assert!(fx.eval_in("town").eval_condition("INCLUDES(L:gate, pen)"));
        assert!(fx.log.as_str().is_empty());
    }

    #[test]
    fn test_quoted_call_names_are_text() {
        let mut fx = Fixture::new();
        let mut ev = fx.eval();
        assert!(ev.eval_condition("'RND(1,6)' == 'RND(1,6)'"));
    }

    #[test]
    fn test_deep_macro_nesting_is_left_as_written() {
        let mut fx = Fixture::new();
        fx.defs.set("X", "1");
        let deep = format!("{}X{}", "{".repeat(3000), "}".repeat(3000));
        assert_eq!(fx.eval().expand(&deep), deep);
        assert_eq!(fx.eval().expand("{{{X}}}"), "1");
        assert!(fx.log.as_str().contains("nested deeper than 32 levels"));
    }

    #[test]
    fn test_deep_condition_is_false() {
        let mut fx = Fixture::new();
        let deep = format!("{}1{}", "(".repeat(3000), ")".repeat(3000));
        assert!(!fx.eval().eval_condition(&deep));
        assert!(fx.log.as_str().contains("Condition error"));
    }

    #[test]
    fn test_eval_value() {
        let mut fx = Fixture::new();
        fx.defs.set("GOLD", "12");
        let mut ev = fx.eval();
        assert_eq!(ev.eval_value("{GOLD} + 3"), "15");
        assert_eq!(ev.eval_value("(2 + 3) * 2"), "10");
        assert_eq!(ev.eval_value(" a sword "), "a sword");
        assert_eq!(ev.eval_value("1 / 0"), "1 / 0");
        assert_eq!(ev.eval_text("\"quoted\""), "quoted");
    }
}
