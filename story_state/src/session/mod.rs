//! Session state - everything one story carries from pass to pass.

use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use crate::defs::{keys, Defs};
use crate::error::StateResult;
use crate::gates::InputGates;
use crate::log::{PassLog, Verbosity};
use crate::output::OutputQueue;
use crate::questions::QuestionBook;
use crate::store::StateStore;

/// Store key the serialized session lives under.
pub const SESSION_KEY: &str = "story_preproc.session";

/// Unique identifier for sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The complete persisted state of one story.
///
/// A pass needs exclusive access (`&mut SessionState`); passes of the same
/// session must never overlap.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    pub id: SessionId,

    /// Persistent definitions.
    pub defs: Defs,

    /// Registered questions, outstanding id and cooldown.
    pub questions: QuestionBook,

    /// Commands waiting for the next reply.
    pub output: OutputQueue,

    /// Input gates configured by the last context pass.
    pub gates: InputGates,

    /// Author log of the current pass.
    pub log: PassLog,

    /// Player input captured by the input hook.
    pub last_input: String,

    /// Reply after output commands, without the annotation block.
    pub last_output: String,

    /// Context text produced by the last context pass.
    pub last_context: String,

    /// Text the host should pin at the front of its memory.
    pub front_memory: Option<String>,
}

impl Default for SessionState {
    fn default() -> Self {
        Self::new(Verbosity::default())
    }
}

impl SessionState {
    /// Create a fresh session.
    pub fn new(verbosity: Verbosity) -> Self {
        Self {
            id: SessionId::new(),
            defs: Defs::new(),
            questions: QuestionBook::new(),
            output: OutputQueue::new(),
            gates: InputGates::new(),
            log: PassLog::new(verbosity),
            last_input: String::new(),
            last_output: String::new(),
            last_context: String::new(),
            front_memory: None,
        }
    }

    /// Reset per-pass data and advance the turn counter.
    ///
    /// Returns the new turn number.
    pub fn begin_pass(&mut self) -> i64 {
        self.log.clear();
        self.defs.remove(keys::DEBUG);
        self.gates.clear();
        self.front_memory = None;

        if !self.last_input.is_empty() {
            self.defs.set(keys::USER_INPUT, self.last_input.clone());
        }
        if !self.last_output.is_empty() {
            self.defs.set(keys::LAST_OUTPUT, self.last_output.clone());
        }

        let turn = self.defs.advance_turn();
        self.defs.expire_guidance();
        debug!(session = %self.id, turn, "Pass started");
        turn
    }

    pub fn verbosity(&self) -> Verbosity {
        self.log.verbosity()
    }

    /// Persist the session as JSON under [`SESSION_KEY`].
    pub fn save(&self, store: &mut dyn StateStore) -> StateResult<()> {
        let json = serde_json::to_string(self)?;
        store.set(SESSION_KEY, json);
        debug!(session = %self.id, "Saved session");
        Ok(())
    }

    /// Load a session saved with [`SessionState::save`], if one exists.
    pub fn load(store: &dyn StateStore) -> StateResult<Option<Self>> {
        match store.get(SESSION_KEY) {
            Some(json) => {
                let state: SessionState = serde_json::from_str(&json)?;
                debug!(session = %state.id, "Loaded session");
                Ok(Some(state))
            }
            None => Ok(None),
        }
    }

    /// Load a saved session or start a new one.
    pub fn load_or_new(store: &dyn StateStore, verbosity: Verbosity) -> StateResult<Self> {
        Ok(Self::load(store)?.unwrap_or_else(|| Self::new(verbosity)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::questions::{Question, QuestionKind};
    use crate::store::MemoryStore;

    #[test]
    fn test_begin_pass_advances_turn() {
        let mut state = SessionState::default();
        assert_eq!(state.begin_pass(), 0);
        assert_eq!(state.begin_pass(), 1);
    }

    #[test]
    fn test_begin_pass_resets_per_pass_data() {
        let mut state = SessionState::default();
        state.log.error("old error");
        state.defs.set(keys::DEBUG, "old debug\n");
        state.last_input = "You open the door.".to_string();
        state.last_output = "It creaks.".to_string();

        state.begin_pass();

        assert!(state.log.is_empty());
        assert!(!state.defs.contains(keys::DEBUG));
        assert_eq!(state.defs.get(keys::USER_INPUT), Some("You open the door."));
        assert_eq!(state.defs.get(keys::LAST_OUTPUT), Some("It creaks."));
    }

    #[test]
    fn test_save_and_load() {
        let mut store = MemoryStore::new();
        let mut state = SessionState::new(Verbosity::Commands);
        state.defs.set("GOLD", "12");
        state
            .questions
            .register(Question::new("AGE", "How old?", QuestionKind::Int), false);

        state.save(&mut store).unwrap();
        let loaded = SessionState::load(&store).unwrap().unwrap();

        assert_eq!(loaded, state);
        assert_eq!(loaded.verbosity(), Verbosity::Commands);
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let mut store = MemoryStore::new();
        assert!(SessionState::load(&store).unwrap().is_none());

        store.set(SESSION_KEY, "{not json".to_string());
        assert!(SessionState::load(&store).is_err());
    }
}
