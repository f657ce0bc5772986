use std::collections::HashSet;
use std::sync::{PoisonError, RwLock};

use crate::domain::ChatId;

/// Set of chats that have talked to the bot at least once.
///
/// Entries are never removed. `snapshot` copies the ids out so callers can do network I/O
/// without holding the lock.
#[derive(Debug, Default)]
pub struct ChatRegistry {
    chats: RwLock<HashSet<ChatId>>,
}

impl ChatRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns `true` if the chat was not known before.
    pub fn register(&self, chat_id: ChatId) -> bool {
        self.chats
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(chat_id)
    }

    pub fn contains(&self, chat_id: ChatId) -> bool {
        self.chats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(&chat_id)
    }

    pub fn len(&self) -> usize {
        self.chats.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn snapshot(&self) -> Vec<ChatId> {
        let mut ids: Vec<ChatId> = self
            .chats
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .copied()
            .collect();
        ids.sort();
        ids
    }
}
