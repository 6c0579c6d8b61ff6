use std::sync::Arc;
use tokio::sync::RwLock;

use crate::context_manager::ContextManagerError;
use crate::models::FilePreferences;
use crate::storage::{DurableStore, KeyPersister};

pub const FILE_PREFERENCES_KEY: &str = "filePreferences";

pub const MAX_RECENT_EXTENSIONS: usize = 10;
pub const MAX_RECENT_DIRECTORIES: usize = 5;
pub const MAX_NAMING_PATTERNS: usize = 5;

const SERVICE_NAME: &str = "file preferences";

/// Recency-ranked file-system usage signals.
///
/// Extensions and directories are most-recent-first: re-adding moves an entry
/// to the front and overflow drops the tail. Naming patterns are a set kept in
/// insertion order: re-adding is a no-op and overflow drops the oldest.
pub struct FilePreferenceTracker {
    preferences: RwLock<FilePreferences>,
    persister: KeyPersister,
}

impl FilePreferenceTracker {
    pub async fn initialize(store: Arc<dyn DurableStore>) -> Result<Self, ContextManagerError> {
        let persister = KeyPersister::new(store, FILE_PREFERENCES_KEY);
        let mut preferences: FilePreferences = persister
            .load()
            .await
            .map_err(|e| ContextManagerError::initialization(SERVICE_NAME, e))?
            .unwrap_or_default();

        preferences.recent_extensions.truncate(MAX_RECENT_EXTENSIONS);
        preferences.recent_directories.truncate(MAX_RECENT_DIRECTORIES);
        let excess = preferences.naming_patterns.len().saturating_sub(MAX_NAMING_PATTERNS);
        preferences.naming_patterns.drain(..excess);

        Ok(Self {
            preferences: RwLock::new(preferences),
            persister,
        })
    }

    pub async fn add_recent_extension(&self, extension: &str) {
        let mut prefs = self.preferences.write().await;
        move_to_front(&mut prefs.recent_extensions, extension, MAX_RECENT_EXTENSIONS);
        self.persister.persist_best_effort(&*prefs);
    }

    pub async fn add_recent_directory(&self, directory: &str) {
        let mut prefs = self.preferences.write().await;
        move_to_front(&mut prefs.recent_directories, directory, MAX_RECENT_DIRECTORIES);
        self.persister.persist_best_effort(&*prefs);
    }

    pub async fn add_naming_pattern(&self, pattern: &str) {
        let mut prefs = self.preferences.write().await;
        if prefs.naming_patterns.iter().any(|p| p == pattern) {
            return;
        }
        prefs.naming_patterns.push(pattern.to_string());
        if prefs.naming_patterns.len() > MAX_NAMING_PATTERNS {
            prefs.naming_patterns.remove(0);
        }
        self.persister.persist_best_effort(&*prefs);
    }

    pub async fn get_recent_extensions(&self, limit: usize) -> Vec<String> {
        let prefs = self.preferences.read().await;
        prefs.recent_extensions.iter().take(limit).cloned().collect()
    }

    pub async fn get_recent_directories(&self, limit: usize) -> Vec<String> {
        let prefs = self.preferences.read().await;
        prefs.recent_directories.iter().take(limit).cloned().collect()
    }

    pub async fn get_naming_patterns(&self) -> Vec<String> {
        self.preferences.read().await.naming_patterns.clone()
    }

    pub async fn snapshot(&self) -> FilePreferences {
        self.preferences.read().await.clone()
    }

    /// Resets every list and removes the stored key.
    pub async fn clear_preferences(&self) -> Result<(), ContextManagerError> {
        let mut prefs = self.preferences.write().await;
        *prefs = FilePreferences::default();
        self.persister
            .remove_now()
            .await
            .map_err(|e| ContextManagerError::persistence(SERVICE_NAME, e))?;
        log::info!("File preferences cleared");
        Ok(())
    }

    pub async fn flush(&self) {
        self.persister.flush().await;
    }
}

fn move_to_front(entries: &mut Vec<String>, value: &str, capacity: usize) {
    entries.retain(|entry| entry != value);
    entries.insert(0, value.to_string());
    entries.truncate(capacity);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::test_support::FailingStore;
    use crate::storage::MemoryStore;
    use serde_json::json;

    async fn tracker() -> FilePreferenceTracker {
        FilePreferenceTracker::initialize(Arc::new(MemoryStore::new())).await.unwrap()
    }

    #[tokio::test]
    async fn test_readded_extension_moves_to_front() {
        let prefs = tracker().await;
        prefs.add_recent_extension(".ts").await;
        prefs.add_recent_extension(".py").await;
        prefs.add_recent_extension(".ts").await;

        assert_eq!(prefs.get_recent_extensions(2).await, vec![".ts", ".py"]);
        assert_eq!(prefs.get_recent_extensions(10).await.len(), 2);
    }

    #[tokio::test]
    async fn test_extension_overflow_drops_least_recent() {
        let prefs = tracker().await;
        for i in 0..12 {
            let ext = format!(".e{}", i);
            prefs.add_recent_extension(&ext).await;
            assert_eq!(prefs.get_recent_extensions(1).await, vec![ext]);
        }

        let all = prefs.get_recent_extensions(100).await;
        assert_eq!(all.len(), MAX_RECENT_EXTENSIONS);
        assert_eq!(all.first().map(String::as_str), Some(".e11"));
        assert_eq!(all.last().map(String::as_str), Some(".e2"));
    }

    #[tokio::test]
    async fn test_directories_capped_at_five() {
        let prefs = tracker().await;
        for dir in ["a", "b", "c", "d", "e", "f"] {
            prefs.add_recent_directory(dir).await;
        }
        prefs.add_recent_directory("c").await;

        assert_eq!(prefs.get_recent_directories(10).await, vec!["c", "f", "e", "d", "b"]);
        assert_eq!(prefs.get_recent_directories(2).await, vec!["c", "f"]);
    }

    #[tokio::test]
    async fn test_naming_patterns_are_a_fifo_set() {
        let prefs = tracker().await;
        prefs.add_naming_pattern("kebab-case").await;
        prefs.add_naming_pattern("camelCase").await;
        prefs.add_naming_pattern("kebab-case").await;
        assert_eq!(prefs.get_naming_patterns().await, vec!["kebab-case", "camelCase"]);

        for pattern in ["snake_case", "PascalCase", "SCREAMING_SNAKE_CASE", "dot.case"] {
            prefs.add_naming_pattern(pattern).await;
        }
        assert_eq!(
            prefs.get_naming_patterns().await,
            vec!["camelCase", "snake_case", "PascalCase", "SCREAMING_SNAKE_CASE", "dot.case"]
        );
    }

    #[tokio::test]
    async fn test_clear_removes_key_and_reloads_empty() {
        let backing = Arc::new(FailingStore::new());
        let prefs = FilePreferenceTracker::initialize(backing.clone()).await.unwrap();
        prefs.add_recent_extension(".rs").await;
        prefs.add_recent_directory("src").await;
        prefs.add_naming_pattern("snake_case").await;
        prefs.flush().await;
        assert!(backing.raw(FILE_PREFERENCES_KEY).await.is_some());

        prefs.clear_preferences().await.unwrap();
        prefs.flush().await;

        assert!(prefs.get_recent_extensions(5).await.is_empty());
        assert!(prefs.get_recent_directories(5).await.is_empty());
        assert!(prefs.get_naming_patterns().await.is_empty());
        assert_eq!(backing.raw(FILE_PREFERENCES_KEY).await, None);

        let reloaded = FilePreferenceTracker::initialize(backing).await.unwrap();
        assert!(reloaded.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_empty_structure_loads_like_absent() {
        let backing = Arc::new(FailingStore::new());
        backing.seed(FILE_PREFERENCES_KEY, json!({})).await;

        let prefs = FilePreferenceTracker::initialize(backing).await.unwrap();
        assert!(prefs.snapshot().await.is_empty());
    }

    #[tokio::test]
    async fn test_oversized_stored_lists_are_trimmed_on_load() {
        let backing = Arc::new(FailingStore::new());
        backing
            .seed(
                FILE_PREFERENCES_KEY,
                json!({
                    "recentDirectories": ["a", "b", "c", "d", "e", "f", "g"],
                    "namingPatterns": ["p1", "p2", "p3", "p4", "p5", "p6"]
                }),
            )
            .await;

        let prefs = FilePreferenceTracker::initialize(backing).await.unwrap();
        assert_eq!(prefs.get_recent_directories(10).await, vec!["a", "b", "c", "d", "e"]);
        assert_eq!(prefs.get_naming_patterns().await, vec!["p2", "p3", "p4", "p5", "p6"]);
    }
}
