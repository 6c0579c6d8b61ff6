use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use crate::context_manager::ContextManagerError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    User,
    Assistant,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::System => "system",
        }
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MessageRole {
    type Err = ContextManagerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            "system" => Ok(MessageRole::System),
            other => Err(ContextManagerError::InvalidArgument(format!(
                "Unknown message role '{}'. Must be user, assistant or system",
                other
            ))),
        }
    }
}

/// One conversation turn. `timestamp` is epoch milliseconds and is informational:
/// stores keep insertion order and never sort by it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: MessageRole,
    pub content: String,
    pub timestamp: i64,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self::with_timestamp(role, content, chrono::Utc::now().timestamp_millis())
    }

    pub fn with_timestamp(role: MessageRole, content: impl Into<String>, timestamp: i64) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(MessageRole::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new(MessageRole::System, content)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserPreferences {
    pub preferred_language: Option<String>,
    pub preferred_framework: Option<String>,
    pub language_usage: HashMap<String, u64>,
}

impl UserPreferences {
    pub fn is_empty(&self) -> bool {
        self.preferred_language.is_none()
            && self.preferred_framework.is_none()
            && self.language_usage.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FilePreferences {
    /// Most recent first.
    pub recent_extensions: Vec<String>,
    /// Most recent first.
    pub recent_directories: Vec<String>,
    /// Oldest first.
    pub naming_patterns: Vec<String>,
}

impl FilePreferences {
    pub fn is_empty(&self) -> bool {
        self.recent_extensions.is_empty()
            && self.recent_directories.is_empty()
            && self.naming_patterns.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LanguageUsage {
    pub language: String,
    pub count: u64,
}
