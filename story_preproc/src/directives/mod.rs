//! Directive interpreter.
//!
//! Runs `#`-directive lines over a block of text, keeps the conditional
//! stack, expands macros in emitted lines and applies the side effects of
//! each directive to the session.

pub mod lexer;

pub use lexer::*;

use rand::rngs::StdRng;
use std::str::FromStr;
use tracing::{debug, instrument, warn};

use story_state::{
    keys, resolve_key, GateKind, GateRate, InputGate, OutputCommand, OutputKind,
    PreprocessorConfig, Question, SessionState, Verbosity,
};

use crate::eval::Evaluator;
use crate::text::strip_quotes;

/// Every directive keyword.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    Define,
    Undef,
    Ifdef,
    Ifndef,
    If,
    Elif,
    Else,
    Endif,
    Append,
    Ask,
    Asking,
    Refresh,
    Next,
    Scene,
    Fact,
    UserGate(GateKind),
    Output,
    Debug,
    Namespace,
    FrontMemory,
    Raw,
    EndRaw,
}

impl Directive {
    /// Directives that manage the conditional stack run even inside inactive blocks.
    pub fn is_structural(&self) -> bool {
        matches!(
            self,
            Directive::Ifdef
                | Directive::Ifndef
                | Directive::If
                | Directive::Elif
                | Directive::Else
                | Directive::Endif
                | Directive::Raw
                | Directive::EndRaw
        )
    }
}

impl FromStr for Directive {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let keyword = s.trim().to_ascii_lowercase();
        let directive = match keyword.as_str() {
            "define" | "set" => Directive::Define,
            "undef" => Directive::Undef,
            "ifdef" => Directive::Ifdef,
            "ifndef" => Directive::Ifndef,
            "if" => Directive::If,
            "elif" => Directive::Elif,
            "else" => Directive::Else,
            "endif" | "end" => Directive::Endif,
            "append" => Directive::Append,
            "ask" => Directive::Ask,
            "asking" => Directive::Asking,
            "refresh" => Directive::Refresh,
            "next" => Directive::Next,
            "scene" => Directive::Scene,
            "fact" => Directive::Fact,
            "out" | "output" => Directive::Output,
            "debug" => Directive::Debug,
            "ns" | "namespace" => Directive::Namespace,
            "front_memory" => Directive::FrontMemory,
            "raw" | "verbatim" => Directive::Raw,
            "endraw" | "endverbatim" => Directive::EndRaw,
            other => match other.strip_prefix("user_") {
                Some(gate) => Directive::UserGate(gate.parse()?),
                None => return Err(format!("unknown directive '#{}'", other)),
            },
        };
        Ok(directive)
    }
}

/// Conditional and lexical state of one block.
#[derive(Debug, Clone)]
struct BlockState {
    /// Activation per nesting level; the bottom entry is always `true`.
    active: Vec<bool>,
    /// Whether a branch of the chain at each level was taken.
    taken: Vec<bool>,
    namespace: String,
    in_comment: bool,
    in_raw: bool,
}

impl BlockState {
    fn new() -> Self {
        Self {
            active: vec![true],
            taken: vec![true],
            namespace: String::new(),
            in_comment: false,
            in_raw: false,
        }
    }

    fn is_active(&self) -> bool {
        self.active.last().copied().unwrap_or(true)
    }

    fn depth(&self) -> usize {
        self.active.len()
    }

    fn push(&mut self, cond: bool) {
        self.active.push(cond);
        self.taken.push(cond);
    }

    /// Pop the current level, returning whether its chain was taken.
    fn pop(&mut self) -> Option<bool> {
        if self.active.len() <= 1 {
            return None;
        }
        self.active.pop();
        self.taken.pop()
    }
}

/// Annotations collected over a pass and appended at its end.
#[derive(Debug, Clone, Default)]
struct PassBuffers {
    facts: Vec<String>,
    scene: Vec<String>,
}

/// Runs directives for one pass.
///
/// Blocks are independent for conditionals and namespace; the pass buffers
/// are shared by all blocks of the pass.
pub struct DirectiveInterpreter<'s> {
    session: &'s mut SessionState,
    rng: &'s mut StdRng,
    config: &'s PreprocessorConfig,
    buffers: PassBuffers,
}

impl<'s> DirectiveInterpreter<'s> {
    pub fn new(
        session: &'s mut SessionState,
        rng: &'s mut StdRng,
        config: &'s PreprocessorConfig,
    ) -> Self {
        Self {
            session,
            rng,
            config,
            buffers: PassBuffers::default(),
        }
    }

    fn evaluator<'e>(&'e mut self, namespace: &'e str) -> Evaluator<'e> {
        Evaluator::new(
            &mut self.session.defs,
            namespace,
            &mut self.session.log,
            &mut *self.rng,
            self.config.max_expansion_rounds,
        )
    }

    /// Process one block of text and return the retained, expanded lines.
    #[instrument(skip_all, fields(session = %self.session.id, lines = text.lines().count()))]
    pub fn run_block(&mut self, text: &str) -> String {
        let mut block = BlockState::new();
        let mut out: Vec<String> = Vec::new();

        for line in text.split('\n') {
            let line = line.strip_suffix('\r').unwrap_or(line);
            self.process_line(&mut block, line, &mut out);
        }

        if block.depth() != 1 {
            let unclosed = block.depth() - 1;
            warn!(unclosed, "Unbalanced conditional block");
            self.session.log.error(format!(
                "Unbalanced #if/#endif: {} unclosed level(s)",
                unclosed
            ));
        }
        if block.in_raw {
            self.session.log.error("Unterminated #raw block");
        }

        out.join("\n").trim().to_string()
    }

    fn process_line(&mut self, block: &mut BlockState, line: &str, out: &mut Vec<String>) {
        if block.in_raw {
            let closes = parse_directive(line.trim())
                .map(|d| matches!(d.keyword.as_str(), "endraw" | "endverbatim"))
                .unwrap_or(false);
            if closes {
                block.in_raw = false;
            } else if block.is_active() {
                out.push(line.to_string());
            }
            return;
        }

        let Some(line) = strip_block_comments(line, &mut block.in_comment) else {
            return;
        };

        let (prefix, body) = match split_authors_note(&line) {
            Some((prefix, body)) => (Some(prefix.to_string()), body.to_string()),
            None => (None, line),
        };

        let Some(directive_line) = parse_directive(&body) else {
            if block.is_active() {
                let expanded = self.evaluator(&block.namespace).expand(&body);
                out.push(expanded);
            }
            return;
        };

        let mark = out.len();
        self.execute(block, &directive_line, &body, out);
        if let Some(prefix) = prefix {
            if block.is_active() {
                out.insert(mark, prefix);
            }
        }
    }

    fn execute(
        &mut self,
        block: &mut BlockState,
        line: &DirectiveLine<'_>,
        raw: &str,
        out: &mut Vec<String>,
    ) {
        let directive = match line.keyword.parse::<Directive>() {
            Ok(directive) => directive,
            Err(_) => {
                self.session
                    .log
                    .error(format!("Unknown directive: #{} {}", line.keyword, line.rest));
                return;
            }
        };

        let parent = block.is_active();
        if !parent && !directive.is_structural() {
            return;
        }
        debug!(?directive, rest = line.rest, "Directive");

        let rest = line.rest;
        match directive {
            Directive::Ifdef | Directive::Ifndef => {
                let key = resolve_key(&block.namespace, first_word(rest));
                let defined = self.session.defs.contains(&key);
                let cond = parent && (defined == (directive == Directive::Ifdef));
                block.push(cond);
            }
            Directive::If => {
                let cond = parent && self.evaluator(&block.namespace).eval_condition(rest);
                block.push(cond);
            }
            Directive::Elif | Directive::Else => {
                let Some(taken) = block.pop() else {
                    self.session.log.error(format!(
                        "Unexpected #{} without matching #if: {}",
                        line.keyword, raw
                    ));
                    return;
                };
                let outer = block.is_active();
                let cond = outer
                    && !taken
                    && (directive == Directive::Else
                        || self.evaluator(&block.namespace).eval_condition(rest));
                block.active.push(cond);
                block.taken.push(taken || cond);
            }
            Directive::Endif => {
                if block.pop().is_none() {
                    self.session
                        .log
                        .error(format!("Unexpected #endif without matching #if: {}", raw));
                }
                if !rest.is_empty() && block.is_active() {
                    let trailing = self.evaluator(&block.namespace).expand(rest);
                    out.push(trailing);
                }
            }
            Directive::Raw => block.in_raw = true,
            Directive::EndRaw => {
                self.session.log.error(format!("#{} without #raw", line.keyword));
            }
            Directive::Define | Directive::Append => self.define(block, directive, rest, raw),
            Directive::Undef => {
                if rest.is_empty() {
                    self.session
                        .log
                        .error(format!("Missing argument for #undef: {}", raw));
                    return;
                }
                let key = resolve_key(&block.namespace, first_word(rest));
                if key == keys::TURN {
                    self.session.log.error("TURN cannot be undefined");
                    return;
                }
                self.session.defs.remove(&key);
                self.session.log.command(format!("{} <- undefined", key));
            }
            Directive::Ask | Directive::Asking => self.ask(block, directive, rest, raw),
            Directive::Refresh => {
                let key = resolve_key(&block.namespace, first_word(rest));
                if self.session.questions.refresh(&key) {
                    self.session.log.command(format!("{} <- refreshed", key));
                } else {
                    self.session
                        .log
                        .error(format!("#refresh of unknown question: {}", raw));
                }
            }
            Directive::Next => self.next(block, rest, raw),
            Directive::Scene | Directive::Fact => {
                if rest.is_empty() {
                    self.session
                        .log
                        .error(format!("Missing argument for #{}: {}", line.keyword, raw));
                    return;
                }
                let value = self.evaluator(&block.namespace).eval_text(rest);
                self.session
                    .log
                    .record(Verbosity::Story, format!("{} <- {}", line.keyword, value));
                match directive {
                    Directive::Scene => self.buffers.scene.push(value),
                    _ => self.buffers.facts.push(value),
                }
            }
            Directive::UserGate(kind) => self.user_gate(block, kind, rest, raw),
            Directive::Output => self.output(block, rest, raw),
            Directive::Debug => {
                if self.session.defs.contains(keys::DEBUG_OFF) {
                    return;
                }
                let value = self.evaluator(&block.namespace).eval_text(rest);
                self.session.defs.append(keys::DEBUG, &format!("{}\n", value));
            }
            Directive::Namespace => {
                let ns = strip_quotes(rest.trim());
                block.namespace = if ns.eq_ignore_ascii_case("global") {
                    String::new()
                } else {
                    ns.to_string()
                };
                self.session
                    .log
                    .command(format!("NAMESPACE <- {}", block.namespace));
            }
            Directive::FrontMemory => {
                let value = self.evaluator(&block.namespace).eval_text(rest);
                self.session
                    .log
                    .record(Verbosity::Story, format!("front memory <- {}", value));
                self.session.front_memory = Some(value);
            }
        }
    }

    fn define(&mut self, block: &BlockState, directive: Directive, rest: &str, raw: &str) {
        let Some((key, value)) = key_value(rest) else {
            self.session
                .log
                .error(format!("Invalid #define/#set/#append format: {}", raw));
            return;
        };
        let key = resolve_key(&block.namespace, key);
        let value = self.evaluator(&block.namespace).eval_text(value);

        if directive == Directive::Append {
            self.session.defs.append(&key, &value);
            self.session.log.command(format!("{} <- +{}", key, value));
        } else {
            self.session.log.command(format!("{} <- {}", key, value));
            self.session.defs.set(key, value);
        }
    }

    fn ask(&mut self, block: &BlockState, directive: Directive, rest: &str, raw: &str) {
        let args = match ask_args(rest) {
            Ok(args) => args,
            Err(err) => {
                self.session
                    .log
                    .error(format!("Invalid #ask format ({}): {}", err, raw));
                return;
            }
        };
        let kind = match args.resolved_kind() {
            Ok(kind) => kind,
            Err(err) => {
                self.session.log.error(format!("{}: {}", err, raw));
                story_state::QuestionKind::infer(args.text)
            }
        };

        let key = resolve_key(&block.namespace, args.key);
        let text = self.evaluator(&block.namespace).expand(args.text);
        let question = Question::new(key.clone(), text, kind).with_choices(args.choices);
        self.session
            .questions
            .register(question, directive == Directive::Asking);
        self.session
            .log
            .command(format!("question {} ({}) registered", key, kind));
    }

    fn next(&mut self, block: &BlockState, rest: &str, raw: &str) {
        let (delay, data) = next_args(rest);
        if data.is_empty() {
            self.session
                .log
                .error(format!("Missing argument for #next: {}", raw));
            return;
        }

        let value = self.evaluator(&block.namespace).eval_text(data);
        self.session.defs.set(keys::NEXT, value.clone());
        match delay {
            Some(delay) => {
                let expires = self.session.defs.turn() + delay;
                self.session.defs.set(keys::TURNXT, expires.to_string());
                self.session.log.record(
                    Verbosity::Story,
                    format!("NEXT <- {} with delay {}", value, delay),
                );
            }
            None => {
                self.session.defs.remove(keys::TURNXT);
                self.session
                    .log
                    .record(Verbosity::Story, format!("NEXT <- {}", value));
            }
        }
    }

    fn user_gate(&mut self, block: &BlockState, kind: GateKind, rest: &str, raw: &str) {
        let Some((rate, text)) = take_token(rest) else {
            self.session
                .log
                .error(format!("Missing rate for #user_{}: {}", kind, raw));
            return;
        };
        let rate = match strip_quotes(rate).parse::<GateRate>() {
            Ok(rate) => rate,
            Err(err) => {
                self.session.log.error(format!("{}: {}", err, raw));
                return;
            }
        };

        let text = if text.is_empty() {
            kind.default_text().to_string()
        } else {
            self.evaluator(&block.namespace).eval_text(text)
        };
        self.session
            .log
            .command(format!("user_{} <- {:?} {}", kind, rate, text));
        self.session.gates.set(kind, InputGate { rate, text });
    }

    fn output(&mut self, block: &BlockState, rest: &str, raw: &str) {
        let Some((first, rest)) = take_token(rest) else {
            self.session
                .log
                .error(format!("Invalid #output format: {}", raw));
            return;
        };
        let arg1 = take_token(rest);
        let arg2 = arg1.and_then(|(_, rest)| take_token(rest)).map(|(t, _)| t);
        let arg1 = arg1.map(|(t, _)| t);

        let kind = strip_quotes(first).parse::<OutputKind>();
        let command = match (kind, arg1) {
            (Ok(kind), _) => {
                let arg1 = self.output_arg(block, arg1);
                let arg2 = self.output_arg(block, arg2);
                OutputCommand::new(kind, arg1, arg2)
            }
            (Err(_), None) => {
                let text = self.output_arg(block, Some(first));
                OutputCommand::new(OutputKind::Prepend, text, "")
            }
            (Err(err), Some(_)) => {
                self.session.log.error(format!("{}: {}", err, raw));
                return;
            }
        };

        self.session.log.command(format!(
            "output <- {} \"{}\" \"{}\"",
            command.kind, command.arg1, command.arg2
        ));
        self.session.output.push(command);
    }

    fn output_arg(&mut self, block: &BlockState, arg: Option<&str>) -> String {
        match arg {
            Some(arg) => self.evaluator(&block.namespace).eval_text(arg),
            None => String::new(),
        }
    }

    /// Append the pass annotations and trim the result.
    pub fn finish(self, text: &str) -> String {
        let mut text = text.to_string();

        if !self.buffers.facts.is_empty() {
            text.push_str(&format!("\n[Facts: {}]", self.buffers.facts.join(" ")));
        }

        let scene = self.buffers.scene.join(" ");
        match self.session.defs.get(keys::NEXT) {
            Some(next) => {
                let annotation = if scene.is_empty() {
                    format!("[Guidance for continuation: {}]", next)
                } else {
                    format!("[Scene: {} Guidance for continuation: {}]", scene, next)
                };
                self.session
                    .log
                    .record(Verbosity::Story, annotation.clone());
                text.push('\n');
                text.push_str(&annotation);
            }
            None if !scene.is_empty() => {
                text.push_str(&format!("\n[Scene: {}]", scene));
            }
            None => {}
        }

        text.trim().to_string()
    }
}

fn first_word(text: &str) -> &str {
    text.split_whitespace().next().unwrap_or("")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    struct Fixture {
        session: SessionState,
        rng: StdRng,
        config: PreprocessorConfig,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                session: SessionState::new(Verbosity::Commands),
                rng: StdRng::seed_from_u64(3),
                config: PreprocessorConfig::default(),
            }
        }

        fn run(&mut self, text: &str) -> String {
            let mut interp = DirectiveInterpreter::new(&mut self.session, &mut self.rng, &self.config);
            let body = interp.run_block(text);
            interp.finish(&body)
        }
    }

    #[test]
    fn test_directive_keywords() {
        assert_eq!("SET".parse::<Directive>(), Ok(Directive::Define));
        assert_eq!("end".parse::<Directive>(), Ok(Directive::Endif));
        assert_eq!(
            "user_trusted".parse::<Directive>(),
            Ok(Directive::UserGate(GateKind::Trusted))
        );
        assert!("user_lucky".parse::<Directive>().is_err());
        assert!("shout".parse::<Directive>().is_err());
    }

    #[test]
    fn test_define_undef_ifdef() {
        let mut fx = Fixture::new();
        let out = fx.run("#define HERO Mira\n#ifdef HERO\n{HERO} wakes.\n#endif");
        assert_eq!(out, "Mira wakes.");

        let out = fx.run("#undef HERO\n#ifdef HERO\nhidden\n#else\nshown\n#endif");
        assert_eq!(out, "shown");
        assert!(!fx.session.defs.contains("HERO"));
    }

    #[test]
    fn test_inactive_parent_forces_nested_false() {
        let mut fx = Fixture::new();
        let out = fx.run("#if false\n#if true\ninner\n#endif\n#define X 1\n#endif\nafter");
        assert_eq!(out, "after");
        assert!(!fx.session.defs.contains("X"));
    }

    #[test]
    fn test_exactly_one_branch() {
        let mut fx = Fixture::new();
        fx.session.defs.set("HP", "5");
        let text = "#if HP > 10\nA\n#elif HP > 3\nB\n#elif HP > 1\nC\n#else\nD\n#endif";
        assert_eq!(fx.run(text), "B");

        fx.session.defs.set("HP", "0");
        assert_eq!(fx.run(text), "D");
    }

    #[test]
    fn test_ifndef_and_trailing_endif_text() {
        let mut fx = Fixture::new();
        fx.session.defs.set("NAME", "Mira");
        let out = fx.run("#ifndef SEEN\nfirst visit\n#endif {NAME} enters.");
        assert_eq!(out, "first visit\nMira enters.");
    }

    #[test]
    fn test_unbalanced_is_logged() {
        let mut fx = Fixture::new();
        let out = fx.run("#if true\nopen");
        assert_eq!(out, "open");
        assert!(fx.session.log.as_str().contains("Unbalanced #if/#endif"));

        fx.session.log.clear();
        fx.run("#endif");
        assert!(fx.session.log.as_str().contains("Unexpected #endif"));
        fx.run("#elif true");
        assert!(fx.session.log.as_str().contains("Unexpected #elif"));
    }

    #[test]
    fn test_unknown_directive_is_dropped() {
        let mut fx = Fixture::new();
        let out = fx.run("before\n#shout loudly\nafter");
        assert_eq!(out, "before\nafter");
        assert!(fx.session.log.as_str().contains("ERROR: Unknown directive: #shout loudly"));
    }

    #[test]
    fn test_define_evaluates_and_appends() {
        let mut fx = Fixture::new();
        fx.run("#set GOLD 10\n#set GOLD {GOLD} + 5\n#define TITLE \"the Bold\"\n#append TITLE !");
        assert_eq!(fx.session.defs.get("GOLD"), Some("15"));
        assert_eq!(fx.session.defs.get("TITLE"), Some("the Bold!"));
    }

    #[test]
    fn test_namespace_locals() {
        let mut fx = Fixture::new();
        let out = fx.run("#ns town\n#define L:inn The Gull\n{L:inn}\n#ns global\n{L:inn}");
        assert_eq!(out, "The Gull\n{L:inn}");
        assert_eq!(fx.session.defs.get("town_inn"), Some("The Gull"));
    }

    #[test]
    fn test_namespace_resets_per_block() {
        let mut fx = Fixture::new();
        fx.run("#ns town\n#define L:x 1");
        fx.run("#define L:y 2");
        assert!(fx.session.defs.contains("town_x"));
        assert!(fx.session.defs.contains("_y"));
    }

    #[test]
    fn test_raw_and_comments() {
        let mut fx = Fixture::new();
        fx.session.defs.set("X", "1");
        let text = "#raw\n#define Y 2\n{X}\n#endraw\n{X} /* note */\n/* multi\n#define Z 3\n*/ tail";
        let out = fx.run(text);
        assert_eq!(out, "#define Y 2\n{X}\n1 \n tail");
        assert!(!fx.session.defs.contains("Y"));
        assert!(!fx.session.defs.contains("Z"));
    }

    #[test]
    fn test_authors_note_prefix() {
        let mut fx = Fixture::new();
        let out = fx.run("[Author's note: #define MOOD grim\nKeep it {MOOD}.]");
        assert_eq!(out, "[Author's note:\nKeep it grim.]");
    }

    #[test]
    fn test_next_with_delay_and_scene() {
        let mut fx = Fixture::new();
        fx.session.begin_pass();
        let out = fx.run("Story.\n#scene A storm gathers.\n#next (2) The ship sinks.");
        assert_eq!(
            out,
            "Story.\n[Scene: A storm gathers. Guidance for continuation: The ship sinks.]"
        );
        assert_eq!(fx.session.defs.get(keys::TURNXT), Some("2"));

        fx.session.begin_pass();
        assert!(fx.session.defs.contains(keys::NEXT));
        fx.session.begin_pass();
        assert!(!fx.session.defs.contains(keys::NEXT));
        assert!(!fx.session.defs.contains(keys::TURNXT));
    }

    #[test]
    fn test_facts_and_scene_only() {
        let mut fx = Fixture::new();
        let out = fx.run("Story.\n#fact Mira is a mage.\n#fact She is 30.\n#scene Night.");
        assert_eq!(out, "Story.\n[Facts: Mira is a mage. She is 30.]\n[Scene: Night.]");
    }

    #[test]
    fn test_ask_registers_question() {
        let mut fx = Fixture::new();
        fx.session.defs.set("HERO", "Mira");
        fx.run("#ask AGE \"How old is {HERO}?\" (int)\n#ask MOOD \"Her mood?\" list=[calm, angry]");

        let age = fx.session.questions.get("AGE").unwrap();
        assert_eq!(age.text, "How old is Mira?");
        assert_eq!(age.kind, story_state::QuestionKind::Int);
        assert_eq!(fx.session.questions.get("MOOD").unwrap().choices.len(), 2);

        fx.session.questions.accept_answer("AGE", "30");
        fx.run("#ask AGE \"How old is {HERO}?\" (int)");
        assert!(fx.session.questions.get("AGE").unwrap().ready);
        fx.run("#asking AGE \"How old is {HERO}?\" (int)");
        assert!(!fx.session.questions.get("AGE").unwrap().ready);
    }

    #[test]
    fn test_refresh() {
        let mut fx = Fixture::new();
        fx.run("#ask AWAKE \"Is the dragon awake?\"");
        fx.session.questions.accept_answer("AWAKE", "1");
        fx.run("#refresh AWAKE");
        assert!(!fx.session.questions.get("AWAKE").unwrap().ready);

        fx.run("#refresh NOPE");
        assert!(fx.session.log.as_str().contains("#refresh of unknown question"));
    }

    #[test]
    fn test_output_commands_queue() {
        let mut fx = Fixture::new();
        fx.session.defs.set("N", "3");
        fx.run("#output append \"The end.\" \"\\n\"\n#out \"Chapter {N}\"\n#output clear\n#output shout x");

        let queued: Vec<_> = fx.session.output.iter().cloned().collect();
        assert_eq!(queued.len(), 3);
        assert_eq!(queued[0].kind, OutputKind::Append);
        assert_eq!(queued[0].arg1, "The end.");
        assert_eq!(queued[1], OutputCommand::new(OutputKind::Prepend, "Chapter 3", ""));
        assert_eq!(queued[2].kind, OutputKind::Clear);
        assert!(fx.session.log.as_str().contains("unknown output command"));
    }

    #[test]
    fn test_user_gates() {
        let mut fx = Fixture::new();
        fx.run("#user_success 50% You land the blow.\n#user_suspicious /lie/i");

        let success = fx.session.gates.get(GateKind::Success).unwrap();
        assert_eq!(success.rate, GateRate::Probability(0.5));
        assert_eq!(success.text, "You land the blow.");
        let suspicious = fx.session.gates.get(GateKind::Suspicious).unwrap();
        assert_eq!(suspicious.text, GateKind::Suspicious.default_text());

        fx.run("#user_fail sometimes");
        assert!(fx.session.gates.get(GateKind::Fail).is_none());
    }

    #[test]
    fn test_debug_buffer_and_switch() {
        let mut fx = Fixture::new();
        fx.run("#debug first\n#debug second");
        assert_eq!(fx.session.defs.get(keys::DEBUG), Some("first\nsecond\n"));

        fx.session.defs.remove(keys::DEBUG);
        fx.run("#define DEBUG_OFF\n#debug hidden");
        assert!(!fx.session.defs.contains(keys::DEBUG));
    }

    #[test]
    fn test_front_memory() {
        let mut fx = Fixture::new();
        fx.session.defs.set("HERO", "Mira");
        fx.run("#front_memory You are {HERO}.");
        assert_eq!(fx.session.front_memory.as_deref(), Some("You are Mira."));
    }

    #[test]
    fn test_turn_cannot_be_undefined() {
        let mut fx = Fixture::new();
        fx.run("#undef TURN");
        assert!(fx.session.defs.contains(keys::TURN));
    }
}
