use std::sync::Arc;
use tokio::sync::RwLock;

use crate::context_manager::ContextManagerError;
use crate::models::{LanguageUsage, UserPreferences};
use crate::storage::{DurableStore, KeyPersister};

pub const USER_PREFERENCES_KEY: &str = "userPreferences";

const SERVICE_NAME: &str = "user preferences";

/// Explicit and inferred language/framework preferences with usage counts.
pub struct UserPreferenceTracker {
    preferences: RwLock<UserPreferences>,
    persister: KeyPersister,
}

impl UserPreferenceTracker {
    pub async fn initialize(store: Arc<dyn DurableStore>) -> Result<Self, ContextManagerError> {
        let persister = KeyPersister::new(store, USER_PREFERENCES_KEY);
        let preferences: UserPreferences = persister
            .load()
            .await
            .map_err(|e| ContextManagerError::initialization(SERVICE_NAME, e))?
            .unwrap_or_default();

        log::debug!(
            "Loaded user preferences ({} languages tracked)",
            preferences.language_usage.len()
        );

        Ok(Self {
            preferences: RwLock::new(preferences),
            persister,
        })
    }

    pub async fn set_preferred_language(&self, language: &str) {
        let mut prefs = self.preferences.write().await;
        prefs.preferred_language = Some(language.to_string());
        self.persister.persist_best_effort(&*prefs);
    }

    pub async fn set_preferred_framework(&self, framework: &str) {
        let mut prefs = self.preferences.write().await;
        prefs.preferred_framework = Some(framework.to_string());
        self.persister.persist_best_effort(&*prefs);
    }

    pub async fn increment_language_usage(&self, language: &str) {
        let mut prefs = self.preferences.write().await;
        *prefs.language_usage.entry(language.to_string()).or_insert(0) += 1;
        self.persister.persist_best_effort(&*prefs);
    }

    pub async fn get_preferred_language(&self) -> Option<String> {
        self.preferences.read().await.preferred_language.clone()
    }

    pub async fn get_preferred_framework(&self) -> Option<String> {
        self.preferences.read().await.preferred_framework.clone()
    }

    /// Up to `limit` languages by descending usage. Equal counts are ordered by name.
    pub async fn get_frequent_languages(&self, limit: usize) -> Vec<LanguageUsage> {
        let prefs = self.preferences.read().await;
        let mut usage: Vec<LanguageUsage> = prefs
            .language_usage
            .iter()
            .map(|(language, count)| LanguageUsage {
                language: language.clone(),
                count: *count,
            })
            .collect();

        usage.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.language.cmp(&b.language)));
        usage.truncate(limit);
        usage
    }

    pub async fn snapshot(&self) -> UserPreferences {
        self.preferences.read().await.clone()
    }

    pub async fn clear_preferences(&self) -> Result<(), ContextManagerError> {
        let mut prefs = self.preferences.write().await;
        *prefs = UserPreferences::default();
        self.persister
            .persist_now(&*prefs)
            .await
            .map_err(|e| ContextManagerError::persistence(SERVICE_NAME, e))?;
        log::info!("User preferences cleared");
        Ok(())
    }

    pub async fn flush(&self) {
        self.persister.flush().await;
    }
}
