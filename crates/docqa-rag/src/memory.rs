//! Conversation memory for multi-turn question answering

use std::collections::VecDeque;

use crate::types::{Role, Turn};

/// Ordered log of conversation turns, oldest first
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: VecDeque<Turn>,
    /// Oldest exchanges are dropped beyond this many turns
    max_turns: Option<usize>,
}

impl ConversationMemory {
    /// Unbounded memory
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_turns(max_turns: Option<usize>) -> Self {
        Self {
            turns: VecDeque::new(),
            max_turns,
        }
    }

    pub fn append(&mut self, turn: Turn) {
        self.turns.push_back(turn);
        self.trim();
    }

    /// Record a question and its answer together
    pub fn append_exchange(&mut self, question: Turn, answer: Turn) {
        self.turns.push_back(question);
        self.turns.push_back(answer);
        self.trim();
    }

    /// Drop the oldest turns beyond the cap, never leaving an answer
    /// without its question at the front
    fn trim(&mut self) {
        let Some(max) = self.max_turns else {
            return;
        };
        while self.turns.len() > max {
            self.turns.pop_front();
        }
        while self
            .turns
            .front()
            .is_some_and(|turn| turn.role == Role::Assistant)
        {
            self.turns.pop_front();
        }
    }

    /// History rendered one line per turn, e.g. `User: ...` then `Assistant: ...`
    pub fn history_as_text(&self) -> String {
        self.turns
            .iter()
            .map(|turn| format!("{}: {}", turn.role.label(), turn.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn turns(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn max_turns(&self) -> Option<usize> {
        self.max_turns
    }
}
