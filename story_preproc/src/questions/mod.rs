//! Question/answer protocol.
//!
//! The ask step runs at the end of a context pass and appends a prompt for
//! the next unanswered question. The catch step runs on the following reply:
//! the outstanding question is cleared first, the reply is validated and the
//! engine's text is replaced with [`CONTINUE_SENTINEL`].

pub mod answer;

pub use answer::parse_answer;

use tracing::{debug, warn};

use story_state::{Question, QuestionKind, SessionState, Verbosity};

use crate::text::wrap_reserved;

/// Reply shown to the player after an answer was captured.
pub const CONTINUE_SENTINEL: &str = "< click continue >";

fn format_hint(question: &Question) -> String {
    if !question.choices.is_empty() {
        return format!("Answer with exactly one of: {}.", question.choices.join(", "));
    }
    match question.kind {
        QuestionKind::Bool | QuestionKind::None => "Answer only with yes or no.".to_string(),
        QuestionKind::Int => "Answer only with a single whole number.".to_string(),
        QuestionKind::String => "Answer with a short phrase only, without any other text.".to_string(),
        QuestionKind::Name => "Answer only with a name of one or two capitalized words.".to_string(),
    }
}

/// Build the instruction that asks the engine a question.
pub fn build_prompt(question: &Question) -> String {
    format!(
        "Ignore all previous instructions and do not continue the story. \
         Answer only the following question about the story so far: {} {}",
        question.text,
        format_hint(question)
    )
}

/// Advance the cooldown and, when it allows, append the next question.
pub fn ask_next(session: &mut SessionState, cooldown: u32, text: String) -> String {
    let Some(question) = session.questions.schedule(cooldown) else {
        return text;
    };

    let prompt = build_prompt(question);
    let id = question.id.clone();
    debug!(session = %session.id, id = %id, "Asking question");
    session
        .log
        .record(Verbosity::AiExchange, format!("Asking {}: {}", id, prompt));

    format!("{}\n{}", text, wrap_reserved(&prompt))
}

/// Capture the answer to the outstanding question, if there is one.
///
/// Without an outstanding question the reply passes through unchanged.
pub fn catch_answer(session: &mut SessionState, reply: &str) -> String {
    let Some(question) = session.questions.take_active() else {
        return reply.to_string();
    };

    session.log.record(
        Verbosity::AiExchange,
        format!("Answer for {}: {}", question.id, reply.trim()),
    );

    match parse_answer(&question, reply) {
        Some(value) => {
            session.questions.accept_answer(&question.id, value.clone());
            if question.kind == QuestionKind::None {
                if value == "1" {
                    session.defs.set(question.id.clone(), value.clone());
                } else {
                    session.defs.remove(&question.id);
                }
            } else {
                session.defs.set(question.id.clone(), value.clone());
            }
            debug!(session = %session.id, id = %question.id, answer = %value, "Answer accepted");
            session
                .log
                .command(format!("{} <- {} (answer)", question.id, value));
        }
        None => {
            warn!(session = %session.id, id = %question.id, "Answer rejected");
            session.log.error(format!(
                "Answer to {} ({}) was not valid: {}",
                question.id,
                question.kind,
                reply.trim()
            ));
        }
    }

    CONTINUE_SENTINEL.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use story_state::QuestionPhase;

    fn session_with(question: Question) -> SessionState {
        let mut session = SessionState::new(Verbosity::Commands);
        session.questions.register(question, false);
        session
    }

    #[test]
    fn test_ask_appends_reserved_prompt() {
        let mut session = session_with(Question::new("AGE", "How old is Mira?", QuestionKind::Int));
        let out = ask_next(&mut session, 10, "Story.".to_string());

        assert!(out.starts_with("Story.\n<SYSTEM>\n"));
        assert!(out.contains("How old is Mira? Answer only with a single whole number."));
        assert!(out.ends_with("</SYSTEM>"));
        assert_eq!(session.questions.active(), Some("AGE"));
    }

    #[test]
    fn test_cooldown_delays_next_ask() {
        let mut session = session_with(Question::new("AGE", "How old?", QuestionKind::Int));
        ask_next(&mut session, 2, String::new());
        catch_answer(&mut session, "no idea");

        assert_eq!(ask_next(&mut session, 2, "a".to_string()), "a");
        assert_eq!(ask_next(&mut session, 2, "b".to_string()), "b");
        assert_ne!(ask_next(&mut session, 2, "c".to_string()), "c");
    }

    #[test]
    fn test_int_answer_accepted() {
        let mut session = session_with(Question::new("AGE", "How old?", QuestionKind::Int));
        ask_next(&mut session, 10, String::new());

        assert_eq!(catch_answer(&mut session, "42"), CONTINUE_SENTINEL);
        assert_eq!(session.defs.get("AGE"), Some("42"));
        assert_eq!(session.questions.phase("AGE"), Some(QuestionPhase::Ready));
    }

    #[test]
    fn test_invalid_answer_stays_unready() {
        let mut session = session_with(Question::new("AGE", "How old?", QuestionKind::Int));
        ask_next(&mut session, 10, String::new());

        assert_eq!(catch_answer(&mut session, "not a number"), CONTINUE_SENTINEL);
        assert!(!session.defs.contains("AGE"));
        assert_eq!(session.questions.phase("AGE"), Some(QuestionPhase::Unasked));
        assert_eq!(session.questions.cooldown(), 10);
        assert!(session.log.as_str().contains("ERROR: Answer to AGE"));
    }

    #[test]
    fn test_none_kind_defines_only_on_yes() {
        let mut session = session_with(Question::new("AWAKE", "Is the dragon awake?", QuestionKind::None));
        ask_next(&mut session, 0, String::new());
        catch_answer(&mut session, "No.");
        assert!(!session.defs.contains("AWAKE"));
        assert!(session.questions.get("AWAKE").unwrap().ready);

        session.questions.refresh("AWAKE");
        ask_next(&mut session, 0, String::new());
        catch_answer(&mut session, "Yes");
        assert_eq!(session.defs.get("AWAKE"), Some("1"));
    }

    #[test]
    fn test_reply_without_question_passes_through() {
        let mut session = SessionState::default();
        assert_eq!(catch_answer(&mut session, "The story goes on."), "The story goes on.");
    }

    #[test]
    fn test_answer_is_caught_once() {
        let mut session = session_with(Question::new("AGE", "How old?", QuestionKind::Int));
        ask_next(&mut session, 10, String::new());
        catch_answer(&mut session, "oops");
        assert_eq!(catch_answer(&mut session, "42"), "42");
        assert!(!session.defs.contains("AGE"));
    }

    #[test]
    fn test_choice_prompt() {
        let question = Question::new("MOOD", "Her mood?", QuestionKind::String)
            .with_choices(["calm", "angry"]);
        assert!(build_prompt(&question).ends_with("Answer with exactly one of: calm, angry."));
    }
}
