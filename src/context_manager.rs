use serde::{Deserialize, Serialize};
use std::fmt::Display;
use std::sync::Arc;

use crate::context_analysis::{ContextAnalysisService, DEFAULT_CONTEXT_MESSAGE_COUNT, DEFAULT_MAX_SUGGESTIONS};
use crate::file_preferences::FilePreferenceTracker;
use crate::message_store::{MessageStore, DEFAULT_HISTORY_CAPACITY};
use crate::models::{ConversationMessage, LanguageUsage, MessageRole};
use crate::storage::{DurableStore, MemoryStore};
use crate::user_preferences::UserPreferenceTracker;

pub const DEFAULT_HISTORY_LIMIT: usize = 10;
pub const DEFAULT_LANGUAGE_LIMIT: usize = 3;
pub const DEFAULT_EXTENSION_LIMIT: usize = 5;
pub const DEFAULT_DIRECTORY_LIMIT: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextManagerConfig {
    /// Maximum number of conversation messages kept.
    pub history_limit: usize,
    /// Messages included at the end of the context string.
    pub context_message_count: usize,
    pub max_suggestions: usize,
}

impl Default for ContextManagerConfig {
    fn default() -> Self {
        Self {
            history_limit: DEFAULT_HISTORY_CAPACITY,
            context_message_count: DEFAULT_CONTEXT_MESSAGE_COUNT,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ContextManagerError {
    #[error("Failed to initialize {service}: {message}")]
    Initialization { service: &'static str, message: String },
    #[error("Failed to persist {service}: {message}")]
    Persistence { service: &'static str, message: String },
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
    #[error("Failed to initialize context manager: {0}")]
    ManagerInitialization(#[source] Box<ContextManagerError>),
    #[error("Failed to clear context data: {0}")]
    ClearFailed(#[source] Box<ContextManagerError>),
}

impl ContextManagerError {
    pub(crate) fn initialization(service: &'static str, cause: impl Display) -> Self {
        Self::Initialization {
            service,
            message: cause.to_string(),
        }
    }

    pub(crate) fn persistence(service: &'static str, cause: impl Display) -> Self {
        Self::Persistence {
            service,
            message: cause.to_string(),
        }
    }
}

/// Single entry point for conversation history and derived preferences.
///
/// A `ContextManager` only exists once every service has loaded, so callers
/// never observe a half-initialized manager.
pub struct ContextManager {
    config: ContextManagerConfig,
    message_store: MessageStore,
    user_preferences: UserPreferenceTracker,
    file_preferences: FilePreferenceTracker,
    analysis: ContextAnalysisService,
}

impl ContextManager {
    pub async fn initialize(
        store: Arc<dyn DurableStore>,
        config: ContextManagerConfig,
    ) -> Result<Self, ContextManagerError> {
        Self::validate_config(&config)?;

        let (message_store, user_preferences, file_preferences) = tokio::try_join!(
            MessageStore::initialize(store.clone(), config.history_limit),
            UserPreferenceTracker::initialize(store.clone()),
            FilePreferenceTracker::initialize(store),
        )
        .map_err(|e| ContextManagerError::ManagerInitialization(Box::new(e)))?;

        let analysis = ContextAnalysisService::new()
            .with_context_message_count(config.context_message_count)
            .with_max_suggestions(config.max_suggestions);

        log::info!("Context manager initialized");

        Ok(Self {
            config,
            message_store,
            user_preferences,
            file_preferences,
            analysis,
        })
    }

    /// Manager over a process-local store; nothing is kept across restarts.
    pub async fn in_memory() -> Result<Self, ContextManagerError> {
        Self::initialize(Arc::new(MemoryStore::new()), ContextManagerConfig::default()).await
    }

    fn validate_config(config: &ContextManagerConfig) -> Result<(), ContextManagerError> {
        if config.history_limit == 0 {
            return Err(ContextManagerError::InvalidConfiguration(
                "history_limit must be greater than 0".to_string(),
            ));
        }

        if config.max_suggestions == 0 {
            return Err(ContextManagerError::InvalidConfiguration(
                "max_suggestions must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn config(&self) -> &ContextManagerConfig {
        &self.config
    }

    /// Swaps in a custom analysis service, typically one with its own rule
    /// table. The configured context size and suggestion cap still apply.
    pub fn with_analysis(mut self, analysis: ContextAnalysisService) -> Self {
        self.analysis = analysis
            .with_context_message_count(self.config.context_message_count)
            .with_max_suggestions(self.config.max_suggestions);
        self
    }

    pub async fn add_message(&self, message: ConversationMessage) {
        let analyze = message.role == MessageRole::User;
        let content = if analyze { Some(message.content.clone()) } else { None };

        self.message_store.add_message(message).await;

        if let Some(content) = content {
            self.analysis
                .analyze_message(&content, &self.user_preferences, &self.file_preferences)
                .await;
        }
    }

    pub async fn get_conversation_history(&self, limit: Option<usize>) -> Vec<ConversationMessage> {
        self.message_store
            .get_recent_messages(limit.unwrap_or(DEFAULT_HISTORY_LIMIT))
            .await
    }

    pub async fn search_messages(&self, term: &str) -> Vec<ConversationMessage> {
        self.message_store.search_messages(term).await
    }

    pub async fn get_messages_by_date_range(&self, start: i64, end: i64) -> Vec<ConversationMessage> {
        self.message_store.get_messages_by_date_range(start, end).await
    }

    pub async fn set_history_limit(&self, limit: usize) -> Result<(), ContextManagerError> {
        self.message_store.set_capacity(limit).await
    }

    pub async fn get_preferred_language(&self) -> Option<String> {
        self.user_preferences.get_preferred_language().await
    }

    pub async fn set_preferred_language(&self, language: &str) {
        self.user_preferences.set_preferred_language(language).await
    }

    pub async fn get_frequent_languages(&self, limit: Option<usize>) -> Vec<LanguageUsage> {
        self.user_preferences
            .get_frequent_languages(limit.unwrap_or(DEFAULT_LANGUAGE_LIMIT))
            .await
    }

    pub async fn get_preferred_framework(&self) -> Option<String> {
        self.user_preferences.get_preferred_framework().await
    }

    pub async fn set_preferred_framework(&self, framework: &str) {
        self.user_preferences.set_preferred_framework(framework).await
    }

    pub async fn get_recent_file_extensions(&self, limit: Option<usize>) -> Vec<String> {
        self.file_preferences
            .get_recent_extensions(limit.unwrap_or(DEFAULT_EXTENSION_LIMIT))
            .await
    }

    pub async fn get_recent_directories(&self, limit: Option<usize>) -> Vec<String> {
        self.file_preferences
            .get_recent_directories(limit.unwrap_or(DEFAULT_DIRECTORY_LIMIT))
            .await
    }

    pub async fn get_file_naming_patterns(&self) -> Vec<String> {
        self.file_preferences.get_naming_patterns().await
    }

    pub async fn build_context_string(&self) -> String {
        self.analysis
            .build_context_string(&self.user_preferences, &self.file_preferences, &self.message_store)
            .await
    }

    pub async fn generate_suggestions(&self, input: &str) -> Vec<String> {
        self.analysis
            .generate_suggestions(input, &self.user_preferences, &self.file_preferences)
            .await
    }

    /// Clears every persisted service concurrently. The first failure is
    /// returned; services that did clear stay cleared (no rollback).
    pub async fn clear_all_context_data(&self) -> Result<(), ContextManagerError> {
        tokio::try_join!(
            self.message_store.clear_history(),
            self.user_preferences.clear_preferences(),
            self.file_preferences.clear_preferences(),
        )
        .map_err(|e| ContextManagerError::ClearFailed(Box::new(e)))?;

        log::info!("All context data cleared");
        Ok(())
    }

    /// Waits for outstanding background writes of every service.
    pub async fn flush(&self) {
        tokio::join!(
            self.message_store.flush(),
            self.user_preferences.flush(),
            self.file_preferences.flush(),
        );
    }

    /// Nothing to release; background writes finish on their own.
    pub fn dispose(&self) {}
}
