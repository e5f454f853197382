//! Conversation memory and per-session agent state.
//!
//! Each agent keeps its own turn history. A [`Session`] bundles the six
//! histories of one conversation; [`SessionRoster`] hands sessions out by key
//! so separate conversations never share an agent's memory.

use std::collections::HashMap;
use std::sync::Arc;

use serde::Serialize;

use crate::roles::AgentRole;

/// Who produced a turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Speaker {
    User,
    Agent,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Turn {
    pub speaker: Speaker,
    pub text: String,
}

/// Ordered, append-only turn history owned by one agent.
#[derive(Debug, Clone, Default)]
pub struct ConversationMemory {
    turns: Vec<Turn>,
}

impl ConversationMemory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_user(&mut self, text: &str) {
        self.turns.push(Turn {
            speaker: Speaker::User,
            text: text.to_string(),
        });
    }

    pub fn add_agent(&mut self, text: &str) {
        self.turns.push(Turn {
            speaker: Speaker::Agent,
            text: text.to_string(),
        });
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    /// The last `max` turns with non-blank text.
    pub fn recent(&self, max: usize) -> impl Iterator<Item = &Turn> {
        let start = self.turns.len().saturating_sub(max);
        self.turns[start..].iter().filter(|t| !t.text.trim().is_empty())
    }
}

/// The six agent memories of one conversation.
#[derive(Debug, Default)]
pub struct Session {
    memories: HashMap<AgentRole, ConversationMemory>,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn memory(&self, role: AgentRole) -> Option<&ConversationMemory> {
        self.memories.get(&role)
    }

    pub fn memory_mut(&mut self, role: AgentRole) -> &mut ConversationMemory {
        self.memories.entry(role).or_default()
    }
}

/// Session key used when a request names no project.
pub const DEFAULT_SESSION: &str = "default";

/// Sessions by conversation key.
///
/// The outer lock is held only to look up or create a session. Callers then
/// lock the session itself for the whole of one user message, so requests in
/// the same conversation run one after another.
#[derive(Default)]
pub struct SessionRoster {
    sessions: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<Session>>>>,
}

impl SessionRoster {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn session(&self, key: &str) -> Arc<tokio::sync::Mutex<Session>> {
        self.sessions
            .lock()
            .entry(key.to_string())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(Session::new())))
            .clone()
    }

    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }
}
