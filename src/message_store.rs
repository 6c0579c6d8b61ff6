use std::sync::Arc;
use tokio::sync::RwLock;

use crate::context_manager::ContextManagerError;
use crate::models::ConversationMessage;
use crate::storage::{DurableStore, KeyPersister};

pub const CONVERSATION_HISTORY_KEY: &str = "conversationHistory";
pub const DEFAULT_HISTORY_CAPACITY: usize = 200;

const SERVICE_NAME: &str = "message store";

struct HistoryState {
    messages: Vec<ConversationMessage>,
    capacity: usize,
}

impl HistoryState {
    /// Drops the oldest messages until the history fits. Returns whether anything was dropped.
    fn enforce_capacity(&mut self) -> bool {
        if self.messages.len() <= self.capacity {
            return false;
        }
        let excess = self.messages.len() - self.capacity;
        self.messages.drain(..excess);
        true
    }
}

/// Bounded, persisted append log of conversation turns.
pub struct MessageStore {
    state: RwLock<HistoryState>,
    persister: KeyPersister,
}

impl MessageStore {
    /// Loads the stored history. A missing key starts empty; an unreadable
    /// store or a malformed value is an error.
    pub async fn initialize(store: Arc<dyn DurableStore>, capacity: usize) -> Result<Self, ContextManagerError> {
        validate_capacity(capacity)?;

        let persister = KeyPersister::new(store, CONVERSATION_HISTORY_KEY);
        let messages: Vec<ConversationMessage> = persister
            .load()
            .await
            .map_err(|e| ContextManagerError::initialization(SERVICE_NAME, e))?
            .unwrap_or_default();

        let mut state = HistoryState { messages, capacity };
        state.enforce_capacity();
        log::debug!("Loaded {} conversation messages", state.messages.len());

        Ok(Self {
            state: RwLock::new(state),
            persister,
        })
    }

    pub async fn add_message(&self, message: ConversationMessage) {
        let mut state = self.state.write().await;
        state.messages.push(message);
        state.enforce_capacity();
        self.persister.persist_best_effort(&state.messages);
    }

    /// The last `limit` messages in original order.
    pub async fn get_recent_messages(&self, limit: usize) -> Vec<ConversationMessage> {
        let state = self.state.read().await;
        let start = state.messages.len().saturating_sub(limit);
        state.messages[start..].to_vec()
    }

    pub async fn get_all_messages(&self) -> Vec<ConversationMessage> {
        self.state.read().await.messages.clone()
    }

    /// Case-insensitive substring search over message content.
    pub async fn search_messages(&self, term: &str) -> Vec<ConversationMessage> {
        let needle = term.to_lowercase();
        let state = self.state.read().await;
        state
            .messages
            .iter()
            .filter(|msg| msg.content.to_lowercase().contains(&needle))
            .cloned()
            .collect()
    }

    /// Messages with `start <= timestamp <= end`.
    pub async fn get_messages_by_date_range(&self, start: i64, end: i64) -> Vec<ConversationMessage> {
        let state = self.state.read().await;
        state
            .messages
            .iter()
            .filter(|msg| msg.timestamp >= start && msg.timestamp <= end)
            .cloned()
            .collect()
    }

    pub async fn clear_history(&self) -> Result<(), ContextManagerError> {
        let mut state = self.state.write().await;
        state.messages.clear();
        self.persister
            .persist_now(&state.messages)
            .await
            .map_err(|e| ContextManagerError::persistence(SERVICE_NAME, e))?;
        log::info!("Conversation history cleared");
        Ok(())
    }

    /// Changes the history bound, trimming the oldest messages if needed.
    pub async fn set_capacity(&self, capacity: usize) -> Result<(), ContextManagerError> {
        validate_capacity(capacity)?;

        let mut state = self.state.write().await;
        state.capacity = capacity;
        if state.enforce_capacity() {
            self.persister.persist_best_effort(&state.messages);
        }
        Ok(())
    }

    pub async fn capacity(&self) -> usize {
        self.state.read().await.capacity
    }

    pub async fn len(&self) -> usize {
        self.state.read().await.messages.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.state.read().await.messages.is_empty()
    }

    pub async fn flush(&self) {
        self.persister.flush().await;
    }
}

fn validate_capacity(capacity: usize) -> Result<(), ContextManagerError> {
    if capacity == 0 {
        return Err(ContextManagerError::InvalidArgument(
            "history limit must be greater than 0".to_string(),
        ));
    }
    Ok(())
}
