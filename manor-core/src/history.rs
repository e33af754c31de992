//! Bounded conversation history used as planner context.

use std::collections::VecDeque;

use serde::Serialize;

use crate::world::Actor;

/// Default number of entries kept.
pub const DEFAULT_HISTORY_SIZE: usize = 10;

/// Ring of `Speaker: text` entries, oldest first.
#[derive(Debug, Clone, Serialize)]
pub struct History {
    entries: VecDeque<String>,
    capacity: usize,
}

impl History {
    /// Empty history keeping at most `capacity` entries (at least one).
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self { entries: VecDeque::with_capacity(capacity), capacity }
    }

    fn push(&mut self, entry: String) {
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Record what `actor` tried to do.
    pub fn record_actor(&mut self, actor: &Actor, text: &str) {
        self.push(format!("{}: {}", actor.tag(), text.trim()));
    }

    /// Record a narration.
    pub fn record_narration(&mut self, text: &str) {
        self.push(format!("Narrator: {}", text.trim()));
    }

    /// Entries, oldest first.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        self.entries.iter().cloned().collect()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for History {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_SIZE)
    }
}
