//! Output commands queued by `#output` and applied to the next reply.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use std::str::FromStr;

/// Kinds of reply mutations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OutputKind {
    Prepend,
    Append,
    Replace,
    Swap,
    Remove,
    Clear,
    /// Discard every command queued after this one.
    Stop,
}

impl FromStr for OutputKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "prepend" => Ok(OutputKind::Prepend),
            "append" => Ok(OutputKind::Append),
            "replace" => Ok(OutputKind::Replace),
            "swap" => Ok(OutputKind::Swap),
            "remove" => Ok(OutputKind::Remove),
            "clear" => Ok(OutputKind::Clear),
            "stop" => Ok(OutputKind::Stop),
            other => Err(format!("unknown output command '{}'", other)),
        }
    }
}

impl fmt::Display for OutputKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            OutputKind::Prepend => "prepend",
            OutputKind::Append => "append",
            OutputKind::Replace => "replace",
            OutputKind::Swap => "swap",
            OutputKind::Remove => "remove",
            OutputKind::Clear => "clear",
            OutputKind::Stop => "stop",
        };
        write!(f, "{}", name)
    }
}

/// One queued reply mutation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputCommand {
    pub kind: OutputKind,
    pub arg1: String,
    pub arg2: String,
}

impl OutputCommand {
    pub fn new(kind: OutputKind, arg1: impl Into<String>, arg2: impl Into<String>) -> Self {
        Self {
            kind,
            arg1: arg1.into(),
            arg2: arg2.into(),
        }
    }
}

/// FIFO of pending output commands.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputQueue {
    commands: VecDeque<OutputCommand>,
}

impl OutputQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a command behind the existing ones.
    pub fn push(&mut self, command: OutputCommand) {
        self.commands.push_back(command);
    }

    /// Take the oldest command.
    pub fn pop(&mut self) -> Option<OutputCommand> {
        self.commands.pop_front()
    }

    /// Drop every pending command, returning how many were discarded.
    pub fn clear(&mut self) -> usize {
        let count = self.commands.len();
        self.commands.clear();
        count
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &OutputCommand> {
        self.commands.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_parsing_is_case_insensitive() {
        assert_eq!("PREPEND".parse::<OutputKind>(), Ok(OutputKind::Prepend));
        assert_eq!("Stop".parse::<OutputKind>(), Ok(OutputKind::Stop));
        assert!("shout".parse::<OutputKind>().is_err());
    }

    #[test]
    fn test_queue_is_fifo() {
        let mut queue = OutputQueue::new();
        queue.push(OutputCommand::new(OutputKind::Prepend, "a", ""));
        queue.push(OutputCommand::new(OutputKind::Append, "b", ""));

        assert_eq!(queue.pop().map(|c| c.kind), Some(OutputKind::Prepend));
        assert_eq!(queue.pop().map(|c| c.kind), Some(OutputKind::Append));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_clear_reports_discarded() {
        let mut queue = OutputQueue::new();
        queue.push(OutputCommand::new(OutputKind::Clear, "", ""));
        queue.push(OutputCommand::new(OutputKind::Clear, "", ""));
        assert_eq!(queue.clear(), 2);
        assert!(queue.is_empty());
    }
}
