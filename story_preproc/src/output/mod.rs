//! Output hook pipeline: queued command drain and the author's annotation block.

use regex::Regex;
use tracing::{debug, instrument};

use story_state::{keys, OutputCommand, OutputKind, PassLog, PreprocessorConfig, SessionState, Verbosity};

use crate::text::{build_regex, parse_regex_literal, RESERVED_CLOSE, RESERVED_OPEN};

/// Apply one command to the reply.
pub fn apply_command(command: &OutputCommand, reply: &str, log: &mut PassLog) -> String {
    let OutputCommand { kind, arg1, arg2 } = command;
    match kind {
        OutputKind::Prepend => format!("{wrap}{text}{wrap}{reply}", wrap = arg2, text = arg1),
        OutputKind::Append => format!("{reply}{wrap}{text}{wrap}", wrap = arg2, text = arg1),
        OutputKind::Replace => replace(reply, arg1, arg2, log),
        OutputKind::Swap => literal_replace(reply, arg1, arg2, log),
        OutputKind::Remove => literal_replace(reply, arg1, "", log),
        OutputKind::Clear => String::new(),
        OutputKind::Stop => reply.to_string(),
    }
}

fn literal_replace(reply: &str, pattern: &str, replacement: &str, log: &mut PassLog) -> String {
    if pattern.is_empty() {
        log.error("#output: empty search text ignored");
        return reply.to_string();
    }
    reply.replace(pattern, replacement)
}

fn replace(reply: &str, pattern: &str, replacement: &str, log: &mut PassLog) -> String {
    let Some((source, flags)) = parse_regex_literal(pattern) else {
        return literal_replace(reply, pattern, replacement, log);
    };
    match build_regex(source, flags) {
        Ok(re) => regex_replace(reply, &re, flags.contains('g'), replacement),
        Err(err) => {
            log.system_error(format!("#output replace: invalid pattern '{}': {}", pattern, err));
            reply.to_string()
        }
    }
}

/// Replace the first capture group's span when it took part in the match,
/// otherwise the whole match.
fn regex_replace(reply: &str, re: &Regex, global: bool, replacement: &str) -> String {
    let mut out = String::with_capacity(reply.len());
    let mut last = 0;

    for caps in re.captures_iter(reply) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let target = caps.get(1).unwrap_or(whole);
        out.push_str(&reply[last..target.start()]);
        out.push_str(replacement);
        last = target.end();
        if !global {
            break;
        }
    }
    out.push_str(&reply[last..]);
    out
}

/// Drain the queue in order. `stop` discards everything queued after it.
pub fn drain_commands(session: &mut SessionState, reply: &str) -> String {
    let mut text = reply.to_string();
    while let Some(command) = session.output.pop() {
        debug!(kind = %command.kind, "Applying output command");
        if command.kind == OutputKind::Stop {
            let dropped = session.output.clear();
            session
                .log
                .command(format!("output stop: {} command(s) discarded", dropped));
            break;
        }
        text = apply_command(&command, &text, &mut session.log);
        session.log.command(format!("output {} applied", command.kind));
    }
    text
}

/// Assemble the annotation block shown to the author, gated by verbosity.
///
/// At verbosity 3 the version line is shown once and the level drops to 2.
pub fn system_block(session: &mut SessionState, config: &PreprocessorConfig) -> Option<String> {
    let verbosity = session.verbosity();
    if verbosity == Verbosity::Off {
        return None;
    }

    let mut block = String::new();
    if !session.log.is_empty() {
        block.push_str(&format!("\ndebugOutput:\n{}\n", session.log.as_str()));
    }
    if let Some(debug) = session.defs.get(keys::DEBUG).filter(|d| !d.is_empty()) {
        block.push_str(&format!("\n#DEBUG directives:\n{}\n", debug));
    }
    if verbosity >= Verbosity::Variables {
        if !session.questions.is_empty() {
            block.push_str(&format!("\nQuestions:\n{}\n", session.questions.dump()));
        }
        block.push_str(&format!("\nUser Variables:\n{}\n", session.defs.dump()));
    }
    if verbosity >= Verbosity::Version {
        block.push_str(&format!("\nVersion: {}", config.version_label));
        if verbosity == Verbosity::Version {
            session.log.set_verbosity(Verbosity::SystemErrors);
        }
    }

    if block.is_empty() {
        None
    } else {
        Some(block)
    }
}

/// Run the output pipeline after the answer catch step.
#[instrument(skip_all, fields(session = %session.id))]
pub fn finish_output(session: &mut SessionState, config: &PreprocessorConfig, reply: &str) -> String {
    let mut text = drain_commands(session, reply);
    session.last_output = text.clone();

    if let Some(block) = system_block(session, config) {
        text.push_str(&format!("\n{}\n{}\n{}\n", RESERVED_OPEN, block, RESERVED_CLOSE));
    }

    session.last_input.clear();
    session.defs.remove(keys::USER_INPUT);
    text
}
