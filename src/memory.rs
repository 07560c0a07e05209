//! Bounded per-session conversation buffers.
//!
//! Each session key (plus the unkeyed default session) owns an ordered
//! buffer of [`ChatTurn`]s capped at the store's limit; the oldest turns are
//! evicted first. The store does no locking: one writer per session.

use rustc_hash::FxHashMap;

use crate::config::MemoryConfig;
use crate::error::CanonicalError;
use crate::protocol::canonical::{ChatResult, ChatTurn};

#[derive(Debug, Clone)]
pub struct SessionMemory {
    limit: usize,
    default: Vec<ChatTurn>,
    sessions: FxHashMap<String, Vec<ChatTurn>>,
}

impl SessionMemory {
    /// # Errors
    ///
    /// Returns [`CanonicalError::Configuration`] when `limit` is not positive.
    pub fn new(limit: i64) -> Result<Self, CanonicalError> {
        let limit = usize::try_from(limit)
            .ok()
            .filter(|limit| *limit > 0)
            .ok_or_else(|| {
                CanonicalError::Configuration(format!(
                    "memory limit must be greater than 0, got {limit}"
                ))
            })?;
        Ok(Self {
            limit,
            default: Vec::new(),
            sessions: FxHashMap::default(),
        })
    }

    /// # Errors
    ///
    /// Returns [`CanonicalError::Configuration`] when the configured limit is
    /// not positive.
    pub fn from_config(config: &MemoryConfig) -> Result<Self, CanonicalError> {
        Self::new(config.limit)
    }

    #[must_use]
    pub fn limit(&self) -> usize {
        self.limit
    }

    pub fn add(&mut self, turn: &ChatTurn, session_id: Option<&str>) {
        self.add_all(std::slice::from_ref(turn), session_id);
    }

    /// Append copies of `turns`, then evict from the front down to the limit.
    pub fn add_all(&mut self, turns: &[ChatTurn], session_id: Option<&str>) {
        let limit = self.limit;
        let buffer = self.buffer_mut(session_id);
        buffer.extend_from_slice(turns);
        if buffer.len() > limit {
            let excess = buffer.len() - limit;
            buffer.drain(..excess);
            tracing::trace!(session = session_id.unwrap_or(""), evicted = excess, "memory evicted");
        }
    }

    /// Append an assistant turn built from a decoded result.
    pub fn add_result(&mut self, result: &ChatResult, session_id: Option<&str>) {
        let turn = ChatTurn::Assistant {
            content: result.content.clone(),
            name: result.name.clone(),
            function_calls: result.function_calls.clone(),
        };
        self.add(&turn, session_id);
    }

    /// Patch the tail turn in place with the non-empty fields of `result`
    /// that the tail's role carries. Empty values never overwrite.
    pub fn update_result(&mut self, result: &ChatResult, session_id: Option<&str>) {
        let content = result.content.as_deref().filter(|c| !c.is_empty());
        let name = result.name.as_deref().filter(|n| !n.is_empty());
        let Some(tail) = self.buffer_mut(session_id).last_mut() else {
            tracing::debug!(session = session_id.unwrap_or(""), "update_result on empty memory");
            return;
        };
        match tail {
            ChatTurn::System { content: current } | ChatTurn::Function { content: current, .. } => {
                if let Some(content) = content {
                    content.clone_into(current);
                }
            }
            ChatTurn::User {
                content: current,
                name: current_name,
            } => {
                if let Some(content) = content {
                    content.clone_into(current);
                }
                if let Some(name) = name {
                    *current_name = Some(name.to_owned());
                }
            }
            ChatTurn::Assistant {
                content: current,
                name: current_name,
                function_calls,
            } => {
                if let Some(content) = content {
                    *current = Some(content.to_owned());
                }
                if let Some(name) = name {
                    *current_name = Some(name.to_owned());
                }
                if !result.function_calls.is_empty() {
                    function_calls.clone_from(&result.function_calls);
                }
            }
        }
    }

    /// The live buffer of a session. Unknown sessions read as empty.
    #[must_use]
    pub fn history(&self, session_id: Option<&str>) -> &[ChatTurn] {
        match session_key(session_id) {
            None => &self.default,
            Some(key) => self.sessions.get(key).map_or(&[], Vec::as_slice),
        }
    }

    #[must_use]
    pub fn peek(&self, session_id: Option<&str>) -> &[ChatTurn] {
        self.history(session_id)
    }

    #[must_use]
    pub fn get_last(&self, session_id: Option<&str>) -> Option<&ChatTurn> {
        self.history(session_id).last()
    }

    /// Clear one session's buffer; other sessions are untouched.
    pub fn reset(&mut self, session_id: Option<&str>) {
        match session_key(session_id) {
            None => self.default.clear(),
            Some(key) => {
                if let Some(buffer) = self.sessions.get_mut(key) {
                    buffer.clear();
                }
            }
        }
    }

    fn buffer_mut(&mut self, session_id: Option<&str>) -> &mut Vec<ChatTurn> {
        match session_key(session_id) {
            None => &mut self.default,
            Some(key) => self.sessions.entry(key.to_owned()).or_default(),
        }
    }
}

/// An empty session id addresses the default session.
fn session_key(session_id: Option<&str>) -> Option<&str> {
    session_id.filter(|id| !id.is_empty())
}
