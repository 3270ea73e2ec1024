//! Host-facing entry points.
//!
//! A host calls the three hooks in turn order:
//! 1. [`Preprocessor::on_input`] with the player's text
//! 2. [`Preprocessor::on_context`] with the full context before generation
//! 3. [`Preprocessor::on_output`] with the engine's reply
//!
//! All persistent state lives in the [`SessionState`] the host passes in.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::{debug, instrument, warn};

use story_state::{GateKind, GateRate, PreprocessorConfig, SessionState, Verbosity};

use crate::directives::DirectiveInterpreter;
use crate::output::finish_output;
use crate::questions::{ask_next, catch_answer};
use crate::sections::{normalize_authors_note, SectionKind, Sections};
use crate::text::{compile_pattern, strip_reserved_tags};

/// The preprocessor. Holds configuration and the random source.
pub struct Preprocessor {
    config: PreprocessorConfig,
    rng: StdRng,
}

impl Preprocessor {
    /// Create a preprocessor seeded from entropy.
    pub fn new(config: PreprocessorConfig) -> Self {
        Self {
            config,
            rng: StdRng::from_entropy(),
        }
    }

    /// Create a preprocessor with default configuration.
    pub fn with_defaults() -> Self {
        Self::new(PreprocessorConfig::default())
    }

    /// Create a preprocessor with a fixed seed, for reproducible passes.
    pub fn with_seed(config: PreprocessorConfig, seed: u64) -> Self {
        Self {
            config,
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn config(&self) -> &PreprocessorConfig {
        &self.config
    }

    /// Start a session at the configured verbosity.
    pub fn new_session(&self) -> SessionState {
        SessionState::new(self.config.verbosity)
    }

    /// Input hook: apply the gates configured by the last pass and remember the input.
    #[instrument(skip_all, fields(session = %session.id))]
    pub fn on_input(&mut self, session: &mut SessionState, text: &str) -> String {
        let mut text = text.trim().to_string();

        for pair in [
            [GateKind::Success, GateKind::Fail],
            [GateKind::Trusted, GateKind::Suspicious],
        ] {
            let fired = pair
                .into_iter()
                .find(|kind| self.gate_fires(session, *kind, &text));
            if let Some(kind) = fired {
                if let Some(gate) = session.gates.get(kind) {
                    debug!(gate = %kind, "Input gate fired");
                    text.push(' ');
                    text.push_str(&gate.text);
                }
            }
        }

        session.last_input = text.clone();
        text
    }

    fn gate_fires(&mut self, session: &mut SessionState, kind: GateKind, input: &str) -> bool {
        let Some(gate) = session.gates.get(kind) else {
            return false;
        };
        match &gate.rate {
            GateRate::Probability(p) => self.rng.gen::<f64>() < *p,
            GateRate::Pattern(pattern) => match compile_pattern(pattern) {
                Ok(re) => re.is_match(input),
                Err(err) => {
                    let message = format!("#user_{}: invalid pattern '{}': {}", kind, pattern, err);
                    warn!(gate = %kind, "Invalid gate pattern");
                    session.log.system_error(message);
                    false
                }
            },
        }
    }

    /// Context hook: run one directive pass over the full context.
    ///
    /// # Pass
    ///
    /// 1. Remove reserved blocks left by earlier passes
    /// 2. Reset per-pass state and advance the turn
    /// 3. Put the author's note body on its own lines
    /// 4. Run directives over the whole text, or per section in advanced mode
    /// 5. Append facts, scene and guidance
    /// 6. Ask the next question when the cooldown allows
    #[instrument(skip_all, fields(session = %session.id))]
    pub fn on_context(&mut self, session: &mut SessionState, text: &str) -> String {
        let text = strip_reserved_tags(text);
        let turn = session.begin_pass();
        let text = normalize_authors_note(&text);
        debug!(turn, advanced = self.config.advanced_sections, "Running context pass");

        let kinds = if self.config.advanced_sections {
            Some(section_kinds(session, &self.config.sections))
        } else {
            None
        };

        let mut interp = DirectiveInterpreter::new(session, &mut self.rng, &self.config);
        let body = if let Some(kinds) = kinds {
            run_sections(&mut interp, &kinds, &text)
        } else {
            interp.run_block(&text)
        };
        let text = interp.finish(&body);

        let text = ask_next(session, self.config.question_cooldown, text);
        session
            .log
            .record(Verbosity::Context, format!("Context:\n{}", text));
        session.last_context = text.clone();
        text
    }

    /// Output hook: catch a pending answer, then drain the output queue.
    #[instrument(skip_all, fields(session = %session.id))]
    pub fn on_output(&mut self, session: &mut SessionState, reply: &str) -> String {
        let reply = catch_answer(session, reply);
        finish_output(session, &self.config, &reply)
    }
}

fn section_kinds(session: &mut SessionState, names: &[String]) -> Vec<SectionKind> {
    names
        .iter()
        .filter_map(|name| match name.parse::<SectionKind>() {
            Ok(kind) => Some(kind),
            Err(err) => {
                session.log.system_error(format!("Section list: {}", err));
                None
            }
        })
        .collect()
}

/// Run each listed section as its own block, then reassemble.
fn run_sections(interp: &mut DirectiveInterpreter<'_>, kinds: &[SectionKind], text: &str) -> String {
    let mut sections = Sections::split(text);
    for &kind in kinds {
        let Some(body) = sections.get(kind) else {
            continue;
        };
        let body = interp.run_block(body);
        sections.set(kind, body);
    }
    sections.merge()
}
