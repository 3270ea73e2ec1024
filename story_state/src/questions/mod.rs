//! Question registry - the persisted half of the question/answer protocol.
//!
//! A question moves through three phases:
//! 1. **Unasked**: registered, not answered, not currently outstanding
//! 2. **Asked**: selected as the outstanding question, waiting for a reply
//! 3. **Ready**: a valid answer was captured
//!
//! Only one question is outstanding at a time and a single global cooldown
//! spaces out the asks.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// Passes to wait after asking before the next question may be asked.
pub const DEFAULT_QUESTION_COOLDOWN: u32 = 10;

/// Expected shape of an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum QuestionKind {
    /// Yes/no answer stored as `1`/`0`.
    Bool,
    /// A single integer.
    Int,
    /// Any non-empty text.
    String,
    /// One or two capitalized words.
    Name,
    /// Yes/no answer that only defines the key when the answer is yes.
    None,
}

impl QuestionKind {
    /// Guess the kind from the wording of a question.
    ///
    /// Yes/no phrasing ("Is ...", "Does ...") and either/or phrasing
    /// (" or ") both map to [`QuestionKind::None`]; anything else is free text.
    pub fn infer(text: &str) -> Self {
        const AUXILIARIES: [&str; 20] = [
            "is", "are", "am", "was", "were", "do", "does", "did", "can", "could", "will",
            "would", "should", "shall", "has", "have", "had", "may", "might", "must",
        ];

        let lower = text.trim().to_lowercase();
        let first = lower
            .split(|c: char| !c.is_alphanumeric() && c != '\'')
            .find(|w| !w.is_empty())
            .unwrap_or("");

        if AUXILIARIES.contains(&first) || lower.contains(" or ") {
            QuestionKind::None
        } else {
            QuestionKind::String
        }
    }

    /// Whether answers of this kind are yes/no.
    pub fn is_boolean(&self) -> bool {
        matches!(self, QuestionKind::Bool | QuestionKind::None)
    }
}

impl FromStr for QuestionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "bool" | "boolean" => Ok(QuestionKind::Bool),
            "int" | "integer" | "number" => Ok(QuestionKind::Int),
            "string" | "text" => Ok(QuestionKind::String),
            "name" => Ok(QuestionKind::Name),
            "none" => Ok(QuestionKind::None),
            other => Err(format!("unknown question type '{}'", other)),
        }
    }
}

impl fmt::Display for QuestionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            QuestionKind::Bool => "bool",
            QuestionKind::Int => "int",
            QuestionKind::String => "string",
            QuestionKind::Name => "name",
            QuestionKind::None => "none",
        };
        write!(f, "{}", name)
    }
}

/// A question the engine will be asked about the story.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Question {
    /// Definition key the answer is stored under.
    pub id: String,

    /// Question text sent to the engine.
    pub text: String,

    pub kind: QuestionKind,

    /// Allowed answers; empty means unrestricted.
    pub choices: Vec<String>,

    /// Last accepted answer.
    pub answer: Option<String>,

    /// Set once a valid answer was captured.
    pub ready: bool,
}

impl Question {
    /// Create an unanswered question.
    pub fn new(id: impl Into<String>, text: impl Into<String>, kind: QuestionKind) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            kind,
            choices: Vec::new(),
            answer: None,
            ready: false,
        }
    }

    /// Restrict the answer to a set of choices.
    pub fn with_choices(mut self, choices: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.choices = choices.into_iter().map(Into::into).collect();
        self
    }
}

/// Lifecycle phase of a single question.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QuestionPhase {
    Unasked,
    Asked,
    Ready,
}

/// All registered questions plus the outstanding id and cooldown.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct QuestionBook {
    /// Questions in registration order.
    questions: Vec<Question>,

    /// Id of the question waiting for a reply.
    active: Option<String>,

    /// Passes left before another question may be asked.
    cooldown: u32,
}

impl QuestionBook {
    /// Create an empty question book.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a question or update an existing one.
    ///
    /// Updating keeps the captured answer and ready flag unless `rearm` is set,
    /// in which case the question is marked unanswered again.
    pub fn register(&mut self, question: Question, rearm: bool) {
        match self.questions.iter_mut().find(|q| q.id == question.id) {
            Some(existing) => {
                existing.text = question.text;
                existing.kind = question.kind;
                existing.choices = question.choices;
                if rearm {
                    existing.ready = false;
                }
                debug!(id = %existing.id, rearm, "Updated question");
            }
            None => {
                debug!(id = %question.id, kind = %question.kind, "Registered question");
                self.questions.push(Question {
                    ready: false,
                    ..question
                });
            }
        }
    }

    /// Mark a question unanswered so it is asked again. Returns false if unknown.
    pub fn refresh(&mut self, id: &str) -> bool {
        match self.get_mut(id) {
            Some(q) => {
                q.ready = false;
                debug!(id = %id, "Refreshed question");
                true
            }
            None => false,
        }
    }

    /// Get a question by id.
    pub fn get(&self, id: &str) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    /// Get a mutable question by id.
    pub fn get_mut(&mut self, id: &str) -> Option<&mut Question> {
        self.questions.iter_mut().find(|q| q.id == id)
    }

    /// Iterate questions in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.iter()
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Phase of a question, or `None` if it is not registered.
    pub fn phase(&self, id: &str) -> Option<QuestionPhase> {
        let question = self.get(id)?;
        Some(if question.ready {
            QuestionPhase::Ready
        } else if self.active.as_deref() == Some(id) {
            QuestionPhase::Asked
        } else {
            QuestionPhase::Unasked
        })
    }

    /// Id of the outstanding question.
    pub fn active(&self) -> Option<&str> {
        self.active.as_deref()
    }

    pub fn cooldown(&self) -> u32 {
        self.cooldown
    }

    /// Advance the ask schedule by one pass.
    ///
    /// While the cooldown is running it is decremented and nothing is asked.
    /// Once it reaches zero the first unanswered question becomes outstanding
    /// and the cooldown restarts at `cooldown`.
    pub fn schedule(&mut self, cooldown: u32) -> Option<&Question> {
        if self.cooldown > 0 {
            self.cooldown -= 1;
            return None;
        }

        let index = self.questions.iter().position(|q| !q.ready)?;
        let id = self.questions[index].id.clone();
        debug!(id = %id, cooldown, "Asking question");
        self.active = Some(id);
        self.cooldown = cooldown;
        self.questions.get(index)
    }

    /// Take the outstanding question, leaving none active.
    ///
    /// Called before the reply is parsed so the same reply is never processed twice.
    pub fn take_active(&mut self) -> Option<Question> {
        let id = self.active.take()?;
        self.get(&id).cloned()
    }

    /// Store a validated answer and mark the question ready.
    pub fn accept_answer(&mut self, id: &str, answer: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(q) => {
                q.answer = Some(answer.into());
                q.ready = true;
                true
            }
            None => false,
        }
    }

    /// Render the registry for the author log.
    pub fn dump(&self) -> String {
        self.questions
            .iter()
            .map(|q| {
                format!(
                    "{} ({}{}): \"{}\" -> {}",
                    q.id,
                    q.kind,
                    if q.ready { ", ready" } else { "" },
                    q.text,
                    q.answer.as_deref().unwrap_or("?")
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_infer_kind() {
        assert_eq!(QuestionKind::infer("Is the dragon awake?"), QuestionKind::None);
        assert_eq!(QuestionKind::infer("Day or night?"), QuestionKind::None);
        assert_eq!(QuestionKind::infer("What is the inn called?"), QuestionKind::String);
    }

    #[test]
    fn test_kind_from_str() {
        assert_eq!("INT".parse::<QuestionKind>(), Ok(QuestionKind::Int));
        assert_eq!("name".parse::<QuestionKind>(), Ok(QuestionKind::Name));
        assert!("color".parse::<QuestionKind>().is_err());
    }

    #[test]
    fn test_schedule_respects_cooldown() {
        let mut book = QuestionBook::new();
        book.register(Question::new("AGE", "How old is the hero?", QuestionKind::Int), false);

        let asked = book.schedule(3).map(|q| q.id.clone());
        assert_eq!(asked.as_deref(), Some("AGE"));
        assert_eq!(book.phase("AGE"), Some(QuestionPhase::Asked));
        assert_eq!(book.cooldown(), 3);

        for _ in 0..3 {
            assert!(book.schedule(3).is_none());
        }
        assert_eq!(book.cooldown(), 0);
        assert!(book.schedule(3).is_some());
    }

    #[test]
    fn test_schedule_picks_first_unanswered() {
        let mut book = QuestionBook::new();
        book.register(Question::new("A", "First?", QuestionKind::Bool), false);
        book.register(Question::new("B", "Second?", QuestionKind::Bool), false);
        book.accept_answer("A", "1");

        let asked = book.schedule(10).map(|q| q.id.clone());
        assert_eq!(asked.as_deref(), Some("B"));
    }

    #[test]
    fn test_take_active_clears_outstanding() {
        let mut book = QuestionBook::new();
        book.register(Question::new("A", "First?", QuestionKind::Bool), false);
        book.schedule(10);

        let taken = book.take_active();
        assert_eq!(taken.map(|q| q.id), Some("A".to_string()));
        assert!(book.active().is_none());
        assert!(book.take_active().is_none());
        assert_eq!(book.phase("A"), Some(QuestionPhase::Unasked));
    }

    #[test]
    fn test_register_keeps_answer_unless_rearmed() {
        let mut book = QuestionBook::new();
        book.register(Question::new("A", "First?", QuestionKind::Bool), false);
        book.accept_answer("A", "1");

        book.register(Question::new("A", "First, reworded?", QuestionKind::Bool), false);
        assert_eq!(book.phase("A"), Some(QuestionPhase::Ready));
        assert_eq!(book.get("A").map(|q| q.text.as_str()), Some("First, reworded?"));

        book.register(Question::new("A", "First?", QuestionKind::Bool), true);
        assert_eq!(book.phase("A"), Some(QuestionPhase::Unasked));
        assert_eq!(book.get("A").and_then(|q| q.answer.as_deref()), Some("1"));
    }

    #[test]
    fn test_refresh() {
        let mut book = QuestionBook::new();
        book.register(Question::new("A", "First?", QuestionKind::Bool), false);
        book.accept_answer("A", "0");
        assert!(book.refresh("A"));
        assert_eq!(book.phase("A"), Some(QuestionPhase::Unasked));
        assert!(!book.refresh("missing"));
    }
}
