//! Turn log with per-NPC read cursors.
//!
//! Every finished turn is appended with its canonical events and sounds.
//! Before an NPC acts it reads everything past its cursor (minus its own
//! turns) and the cursor moves to the end. Entries every NPC has read are
//! dropped.

use std::collections::{HashMap, VecDeque};

use serde::Serialize;

use crate::perception::SensoryEvent;
use crate::world::Actor;

/// One logged turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LoggedTurn {
    /// Position in the log; strictly increasing.
    pub seq: u64,
    /// Who acted.
    pub actor: Actor,
    /// Canonical event lines.
    pub events: Vec<String>,
    /// Sounds the turn produced.
    pub sounds: Vec<SensoryEvent>,
}

/// Events and sounds not yet seen by one NPC.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Unseen {
    /// Event lines, oldest first.
    pub events: Vec<String>,
    /// Sounds, oldest first.
    pub sounds: Vec<SensoryEvent>,
}

/// Append-only log of turns with per-NPC cursors.
#[derive(Debug, Default)]
pub struct TurnLog {
    entries: VecDeque<LoggedTurn>,
    next_seq: u64,
    cursors: HashMap<String, u64>,
}

impl TurnLog {
    /// Empty log.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn and return its sequence number.
    pub fn record(&mut self, actor: Actor, events: Vec<String>, sounds: Vec<SensoryEvent>) -> u64 {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.entries.push_back(LoggedTurn { seq, actor, events, sounds });
        seq
    }

    fn cursor(&self, npc_id: &str) -> u64 {
        self.cursors.get(npc_id).copied().unwrap_or(0)
    }

    /// What `npc_id` has not seen, excluding its own turns.
    #[must_use]
    pub fn unseen_by(&self, npc_id: &str) -> Unseen {
        let cursor = self.cursor(npc_id);
        let mut unseen = Unseen::default();
        for turn in self.entries.iter().filter(|t| t.seq >= cursor) {
            if matches!(&turn.actor, Actor::Npc(id) if id == npc_id) {
                continue;
            }
            unseen.events.extend(turn.events.iter().cloned());
            unseen.sounds.extend(turn.sounds.iter().cloned());
        }
        unseen
    }

    /// Move `npc_id`'s cursor to the end of the log.
    pub fn mark_seen(&mut self, npc_id: &str) {
        self.cursors.insert(npc_id.to_string(), self.next_seq);
    }

    /// Drop entries every NPC in `npc_ids` has seen, and forget departed NPCs.
    pub fn compact(&mut self, npc_ids: &[String]) {
        self.cursors.retain(|id, _| npc_ids.contains(id));
        let oldest_needed = npc_ids.iter().map(|id| self.cursor(id)).min().unwrap_or(self.next_seq);
        while self.entries.front().is_some_and(|t| t.seq < oldest_needed) {
            self.entries.pop_front();
        }
    }

    /// Number of retained turns.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether no turns are retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
