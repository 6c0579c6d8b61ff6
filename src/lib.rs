pub mod cli;
pub mod config;
pub mod context_analysis;
pub mod context_manager;
pub mod file_preferences;
pub mod message_store;
pub mod models;
pub mod router;
pub mod storage;
pub mod user_preferences;

pub use context_manager::{ContextManager, ContextManagerConfig, ContextManagerError};
pub use models::{ConversationMessage, LanguageUsage, MessageRole};
pub use storage::{DurableStore, JsonFileStore, MemoryStore};
