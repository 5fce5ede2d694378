//! In-memory chat sessions.
//!
//! Sessions live only for the life of the process. Each holds its turns
//! oldest first, trimmed to `2 × max_history` turns (that many exchanges).
//! The store is owned by the server state, not by the pipeline.

use std::collections::HashMap;
use std::sync::RwLock;

use portfolio_rag_core::models::{ChatTurn, Role};

pub struct SessionStore {
    max_history: usize,
    sessions: RwLock<HashMap<String, Vec<ChatTurn>>>,
}

impl SessionStore {
    pub fn new(max_history: usize) -> Self {
        Self {
            max_history,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    /// The caller's id if it is non-blank, otherwise a fresh UUID v4.
    pub fn resolve_id(requested: Option<&str>) -> String {
        match requested.map(str::trim) {
            Some(id) if !id.is_empty() => id.to_string(),
            _ => uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Snapshot of a session's turns, oldest first. Unknown ids are empty.
    pub fn history(&self, session_id: &str) -> Vec<ChatTurn> {
        self.sessions
            .read()
            .map(|sessions| sessions.get(session_id).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn append_user(&self, session_id: &str, content: &str) {
        self.append(session_id, ChatTurn::user(content));
    }

    pub fn append_assistant(&self, session_id: &str, content: &str) {
        self.append(session_id, ChatTurn::assistant(content));
    }

    /// Remove a trailing user turn that never got an answer, so the
    /// session keeps alternating user and assistant turns.
    pub fn discard_unanswered(&self, session_id: &str, content: &str) {
        let mut sessions = match self.sessions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(turns) = sessions.get_mut(session_id) {
            let is_orphan = turns
                .last()
                .map_or(false, |t| t.role == Role::User && t.content == content);
            if is_orphan {
                turns.pop();
            }
            if turns.is_empty() {
                sessions.remove(session_id);
            }
        }
    }

    /// Number of live sessions.
    pub fn len(&self) -> usize {
        self.sessions.read().map(|s| s.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn append(&self, session_id: &str, turn: ChatTurn) {
        let limit = self.max_history * 2;
        let mut sessions = match self.sessions.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let turns = sessions.entry(session_id.to_string()).or_default();
        turns.push(turn);
        if turns.len() > limit {
            let excess = turns.len() - limit;
            turns.drain(..excess);
        }
    }
}
