//! Derives preference signals from user text and renders the aggregated
//! context back out for prompt builders.
//!
//! Detection is heuristic. Keywords (languages, frameworks, naming-convention
//! markers, extension aliases) come from a rule table that callers may extend;
//! paths and extensions are recognised per whitespace-separated token.

use regex::Regex;

use crate::file_preferences::FilePreferenceTracker;
use crate::message_store::MessageStore;
use crate::user_preferences::UserPreferenceTracker;

pub const DEFAULT_CONTEXT_MESSAGE_COUNT: usize = 3;
pub const DEFAULT_MAX_SUGGESTIONS: usize = 5;

const CONTEXT_LANGUAGE_LIMIT: usize = 3;
const CONTEXT_EXTENSION_LIMIT: usize = 5;
const CONTEXT_DIRECTORY_LIMIT: usize = 3;
const CONTEXT_MESSAGE_MAX_CHARS: usize = 200;

const CREATION_WORDS: &[&str] = &["create", "new", "add", "file", "generate", "scaffold"];
const PLACEMENT_WORDS: &[&str] = &["where", "folder", "directory", "dir", "put", "place", "move"];
const NAMING_WORDS: &[&str] = &["name", "rename", "variable", "function", "class", "method", "identifier"];

/// Slash-separated tokens that read as prose rather than paths.
const NON_PATH_TOKENS: &[&str] = &[
    "and/or", "either/or", "i/o", "input/output", "yes/no", "true/false", "read/write", "client/server",
    "w/o", "n/a", "24/7", "ci/cd", "ui/ux", "km/h", "m/s",
];

/// Endings that make `name.ext` a host name rather than a file.
const DOMAIN_SUFFIXES: &[&str] = &["com", "org", "net", "io", "dev", "edu", "gov", "co", "ai"];

/// What a keyword match means.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Signal {
    Language(String),
    Framework(String),
    NamingPattern(String),
}

/// Maps a lowercase keyword (possibly several words, or an extension such as
/// `.py`) to the signal it stands for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DetectionRule {
    pub keyword: String,
    pub signal: Signal,
}

impl DetectionRule {
    pub fn language(keyword: &str, language: &str) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
            signal: Signal::Language(language.to_string()),
        }
    }

    pub fn framework(keyword: &str, framework: &str) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
            signal: Signal::Framework(framework.to_string()),
        }
    }

    pub fn naming_pattern(keyword: &str, pattern: &str) -> Self {
        Self {
            keyword: keyword.to_lowercase(),
            signal: Signal::NamingPattern(pattern.to_string()),
        }
    }
}

pub fn default_rules() -> Vec<DetectionRule> {
    let languages = [
        ("python", "python"),
        ("py", "python"),
        (".py", "python"),
        ("javascript", "javascript"),
        ("js", "javascript"),
        (".js", "javascript"),
        ("typescript", "typescript"),
        ("ts", "typescript"),
        (".ts", "typescript"),
        (".tsx", "typescript"),
        ("rust", "rust"),
        (".rs", "rust"),
        ("golang", "go"),
        (".go", "go"),
        ("java", "java"),
        (".java", "java"),
        ("kotlin", "kotlin"),
        (".kt", "kotlin"),
        ("c#", "csharp"),
        ("csharp", "csharp"),
        (".cs", "csharp"),
        ("c++", "cpp"),
        ("cpp", "cpp"),
        (".cpp", "cpp"),
        ("ruby", "ruby"),
        (".rb", "ruby"),
        ("php", "php"),
        (".php", "php"),
        ("swift", "swift"),
        (".swift", "swift"),
        ("scala", "scala"),
        ("haskell", "haskell"),
        ("elixir", "elixir"),
        ("dart", "dart"),
    ];
    let frameworks = [
        ("react", "react"),
        ("angular", "angular"),
        ("vue", "vue"),
        ("vue.js", "vue"),
        ("svelte", "svelte"),
        ("next.js", "next.js"),
        ("nextjs", "next.js"),
        ("express", "express"),
        ("django", "django"),
        ("flask", "flask"),
        ("fastapi", "fastapi"),
        ("spring", "spring"),
        ("spring boot", "spring"),
        ("rails", "rails"),
        ("ruby on rails", "rails"),
        ("laravel", "laravel"),
        ("axum", "axum"),
        ("actix", "actix"),
        ("rocket", "rocket"),
        ("flutter", "flutter"),
    ];
    let naming = [
        ("camelcase", "camelCase"),
        ("camel case", "camelCase"),
        ("pascalcase", "PascalCase"),
        ("pascal case", "PascalCase"),
        ("snake_case", "snake_case"),
        ("snake case", "snake_case"),
        ("kebab-case", "kebab-case"),
        ("kebab case", "kebab-case"),
    ];

    languages
        .iter()
        .map(|(k, v)| DetectionRule::language(k, v))
        .chain(frameworks.iter().map(|(k, v)| DetectionRule::framework(k, v)))
        .chain(naming.iter().map(|(k, v)| DetectionRule::naming_pattern(k, v)))
        .collect()
}

/// Signals found in one message, deduplicated, in order of first appearance.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetectedSignals {
    pub languages: Vec<String>,
    pub frameworks: Vec<String>,
    pub extensions: Vec<String>,
    pub directories: Vec<String>,
    pub naming_patterns: Vec<String>,
}

impl DetectedSignals {
    pub fn is_empty(&self) -> bool {
        self.languages.is_empty()
            && self.frameworks.is_empty()
            && self.extensions.is_empty()
            && self.directories.is_empty()
            && self.naming_patterns.is_empty()
    }

    fn record(&mut self, signal: &Signal) {
        match signal {
            Signal::Language(name) => push_unique(&mut self.languages, name),
            Signal::Framework(name) => push_unique(&mut self.frameworks, name),
            Signal::NamingPattern(name) => push_unique(&mut self.naming_patterns, name),
        }
    }
}

pub struct ContextAnalysisService {
    rules: Vec<DetectionRule>,
    file_token: Regex,
    bare_extension: Regex,
    directory_token: Regex,
    context_message_count: usize,
    max_suggestions: usize,
}

impl ContextAnalysisService {
    pub fn new() -> Self {
        Self::with_rules(default_rules())
    }

    pub fn with_rules(rules: Vec<DetectionRule>) -> Self {
        Self {
            rules,
            // The patterns are literals; a failure here is a programming error caught by tests.
            file_token: Regex::new(r"^(?:(?P<dir>[\w.\-~/]*)/)?(?P<stem>[\w\-]+)\.(?P<ext>[A-Za-z][A-Za-z0-9]{0,7})$")
                .expect("file token pattern is valid"),
            bare_extension: Regex::new(r"^\.(?P<ext>[A-Za-z][A-Za-z0-9]{0,7})$")
                .expect("extension pattern is valid"),
            directory_token: Regex::new(r"^[\w.\-~]*(?:/[\w.\-]+)+/?$|^[\w.\-~]+/$")
                .expect("directory pattern is valid"),
            context_message_count: DEFAULT_CONTEXT_MESSAGE_COUNT,
            max_suggestions: DEFAULT_MAX_SUGGESTIONS,
        }
    }

    pub fn with_context_message_count(mut self, count: usize) -> Self {
        self.context_message_count = count;
        self
    }

    pub fn with_max_suggestions(mut self, max: usize) -> Self {
        self.max_suggestions = max;
        self
    }

    pub fn add_rule(&mut self, rule: DetectionRule) {
        self.rules.push(rule);
    }

    /// Finds every signal in `content` without touching any tracker.
    pub fn detect(&self, content: &str) -> DetectedSignals {
        let mut signals = DetectedSignals::default();
        let tokens: Vec<&str> = content
            .split_whitespace()
            .map(trim_token)
            .filter(|t| !t.is_empty())
            .flat_map(|t| self.split_compound(t))
            .collect();
        let lowered: Vec<String> = tokens.iter().map(|t| t.to_lowercase()).collect();
        let phrase = format!(" {} ", lowered.join(" "));

        // Keywords are matched in the order they appear in the message.
        let mut keyword_hits: Vec<(usize, &DetectionRule)> = self
            .rules
            .iter()
            .filter(|rule| !rule.keyword.starts_with('.'))
            .filter_map(|rule| phrase.find(&format!(" {} ", rule.keyword)).map(|pos| (pos, rule)))
            .collect();
        keyword_hits.sort_by_key(|(pos, _)| *pos);
        for (_, rule) in &keyword_hits {
            signals.record(&rule.signal);
        }

        for (token, lower) in tokens.iter().zip(&lowered) {
            if lower.contains("://") || self.is_keyword(lower) {
                continue;
            }
            self.detect_path_token(token, lower, &mut signals);
        }

        signals
    }

    /// Splits tokens that glue words together rather than name a path:
    /// `python/rust`, and `python.Then` from a missing space after a full stop.
    fn split_compound<'a>(&self, token: &'a str) -> Vec<&'a str> {
        let lower = token.to_lowercase();
        if self.is_keyword(&lower) || lower.contains("://") {
            return vec![token];
        }

        if token.contains('/') {
            let parts: Vec<&str> = token.split('/').collect();
            if parts.len() > 1 && parts.iter().all(|part| self.is_keyword(&part.to_lowercase())) {
                return parts;
            }
            return vec![token];
        }

        if let Some((stem, rest)) = token.split_once('.') {
            if stem.is_empty() || rest.is_empty() {
                return vec![token];
            }
            let keyword_stem = self.is_keyword(&stem.to_lowercase())
                && !self.is_extension_rule(&format!(".{}", rest.to_lowercase()));
            if keyword_stem || starts_sentence(rest) {
                return vec![stem, rest];
            }
        }

        vec![token]
    }

    fn detect_path_token(&self, token: &str, lower: &str, signals: &mut DetectedSignals) {
        if let Some(caps) = self.bare_extension.captures(token) {
            self.record_extension(&caps["ext"], signals);
            return;
        }

        if let Some(caps) = self.file_token.captures(token) {
            let dir = caps.name("dir").map(|m| m.as_str()).unwrap_or("");
            let ext = &caps["ext"];
            // "e.g" and friends: a one-letter extension needs a directory to be believable.
            if dir.is_empty() && ext.len() < 2 {
                return;
            }
            let ext_lower = ext.to_lowercase();
            if dir.is_empty()
                && DOMAIN_SUFFIXES.contains(&ext_lower.as_str())
                && !self.is_extension_rule(&format!(".{}", ext_lower))
            {
                return;
            }
            self.record_extension(ext, signals);
            if let Some(directory) = normalize_directory(dir) {
                push_unique(&mut signals.directories, &directory);
            }
            if let Some(pattern) = classify_identifier(&caps["stem"]) {
                push_unique(&mut signals.naming_patterns, pattern);
            }
            return;
        }

        if self.directory_token.is_match(token) && !NON_PATH_TOKENS.contains(&lower) && is_plausible_directory(token) {
            if let Some(directory) = normalize_directory(token) {
                push_unique(&mut signals.directories, &directory);
            }
        }
    }

    fn record_extension(&self, ext: &str, signals: &mut DetectedSignals) {
        let extension = format!(".{}", ext.to_lowercase());
        if let Some(rule) = self.rules.iter().find(|rule| rule.keyword == extension) {
            signals.record(&rule.signal);
        }
        push_unique(&mut signals.extensions, &extension);
    }

    fn is_keyword(&self, token: &str) -> bool {
        self.rules.iter().any(|rule| rule.keyword == token && !rule.keyword.starts_with('.'))
    }

    fn is_extension_rule(&self, extension: &str) -> bool {
        self.rules.iter().any(|rule| rule.keyword == extension)
    }

    /// Pushes the signals found in `content` into the trackers. Each distinct
    /// signal produces one tracker call however often it is mentioned; only the
    /// first framework mentioned becomes the preferred framework.
    pub async fn analyze_message(
        &self,
        content: &str,
        user_preferences: &UserPreferenceTracker,
        file_preferences: &FilePreferenceTracker,
    ) {
        let signals = self.detect(content);
        if signals.is_empty() {
            return;
        }
        log::debug!("Detected context signals: {:?}", signals);

        for language in &signals.languages {
            user_preferences.increment_language_usage(language).await;
        }
        if let Some(framework) = signals.frameworks.first() {
            user_preferences.set_preferred_framework(framework).await;
        }
        for extension in &signals.extensions {
            file_preferences.add_recent_extension(extension).await;
        }
        for directory in &signals.directories {
            file_preferences.add_recent_directory(directory).await;
        }
        for pattern in &signals.naming_patterns {
            file_preferences.add_naming_pattern(pattern).await;
        }
    }

    /// Renders known preferences and the latest messages as a prompt block.
    /// Returns an empty string when nothing is known.
    pub async fn build_context_string(
        &self,
        user_preferences: &UserPreferenceTracker,
        file_preferences: &FilePreferenceTracker,
        messages: &MessageStore,
    ) -> String {
        let mut lines = Vec::new();

        if let Some(language) = user_preferences.get_preferred_language().await {
            lines.push(format!("Preferred language: {}", language));
        }

        let frequent = user_preferences.get_frequent_languages(CONTEXT_LANGUAGE_LIMIT).await;
        if !frequent.is_empty() {
            let rendered: Vec<String> = frequent
                .iter()
                .map(|usage| {
                    let unit = if usage.count == 1 { "use" } else { "uses" };
                    format!("{} ({} {})", usage.language, usage.count, unit)
                })
                .collect();
            lines.push(format!("Frequently used languages: {}", rendered.join(", ")));
        }

        if let Some(framework) = user_preferences.get_preferred_framework().await {
            lines.push(format!("Preferred framework: {}", framework));
        }

        let extensions = file_preferences.get_recent_extensions(CONTEXT_EXTENSION_LIMIT).await;
        if !extensions.is_empty() {
            lines.push(format!("Recent file types: {}", extensions.join(", ")));
        }

        let directories = file_preferences.get_recent_directories(CONTEXT_DIRECTORY_LIMIT).await;
        if !directories.is_empty() {
            lines.push(format!("Recent directories: {}", directories.join(", ")));
        }

        let patterns = file_preferences.get_naming_patterns().await;
        if !patterns.is_empty() {
            lines.push(format!("Naming conventions: {}", patterns.join(", ")));
        }

        let mut sections = Vec::new();
        if !lines.is_empty() {
            sections.push(format!("User context:\n{}", lines.join("\n")));
        }

        if self.context_message_count > 0 {
            let recent = messages.get_recent_messages(self.context_message_count).await;
            if !recent.is_empty() {
                let rendered: Vec<String> = recent
                    .iter()
                    .map(|msg| format!("{}: {}", msg.role, truncate_chars(&msg.content, CONTEXT_MESSAGE_MAX_CHARS)))
                    .collect();
                sections.push(format!("Recent conversation:\n{}", rendered.join("\n")));
            }
        }

        sections.join("\n\n")
    }

    /// Short hints derived from preferences that the input does not already cover.
    pub async fn generate_suggestions(
        &self,
        input: &str,
        user_preferences: &UserPreferenceTracker,
        file_preferences: &FilePreferenceTracker,
    ) -> Vec<String> {
        let input = input.trim();
        if input.is_empty() {
            return Vec::new();
        }
        let lower = input.to_lowercase();
        let words: Vec<&str> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
            .collect();
        let mentions_any = |candidates: &[&str]| candidates.iter().any(|c| words.contains(c));
        let mentions = |term: &str| mentions_term(&words, term);

        let mut suggestions = Vec::new();

        let language = match user_preferences.get_preferred_language().await {
            Some(language) => Some(language),
            None => user_preferences
                .get_frequent_languages(1)
                .await
                .into_iter()
                .next()
                .map(|usage| usage.language),
        };
        if let Some(language) = language {
            if !mentions(language.as_str()) {
                suggestions.push(format!("Write it in {}", language));
            }
        }

        if let Some(framework) = user_preferences.get_preferred_framework().await {
            if !mentions(framework.as_str()) {
                suggestions.push(format!("Follow {} conventions", framework));
            }
        }

        if mentions_any(CREATION_WORDS) {
            let extension = file_preferences
                .get_recent_extensions(CONTEXT_EXTENSION_LIMIT)
                .await
                .into_iter()
                .find(|ext| !mentions(ext.as_str()));
            if let Some(extension) = extension {
                suggestions.push(format!("Create a {} file", extension));
            }
        }

        if mentions_any(PLACEMENT_WORDS) {
            if let Some(directory) = file_preferences.get_recent_directories(1).await.into_iter().next() {
                suggestions.push(format!("Place it in {}", directory));
            }
        }

        if mentions_any(NAMING_WORDS) {
            if let Some(pattern) = file_preferences.get_naming_patterns().await.pop() {
                suggestions.push(format!("Name identifiers in {}", pattern));
            }
        }

        suggestions.truncate(self.max_suggestions);
        suggestions
    }
}

impl Default for ContextAnalysisService {
    fn default() -> Self {
        Self::new()
    }
}

fn push_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

fn trim_token(token: &str) -> &str {
    token
        .trim_matches(|c: char| matches!(c, '"' | '\'' | '`' | '(' | ')' | '[' | ']' | '{' | '}' | ',' | ';' | ':' | '!' | '?'))
        .trim_end_matches('.')
}

/// True when `term` appears in `words` as whole words, in order.
fn mentions_term(words: &[&str], term: &str) -> bool {
    let lowered = term.to_lowercase();
    let term_words: Vec<&str> = lowered
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect();
    !term_words.is_empty() && words.windows(term_words.len()).any(|window| window == term_words.as_slice())
}

/// `Then` in `python.Then`: a capitalised word right after a full stop.
fn starts_sentence(text: &str) -> bool {
    let mut chars = text.chars();
    chars.next().is_some_and(|c| c.is_ascii_uppercase())
        && text.len() > 1
        && chars.all(|c| c.is_ascii_lowercase())
}

/// Rejects slash tokens that are ratios, units, acronym pairs or URLs without a scheme.
fn is_plausible_directory(token: &str) -> bool {
    let segments: Vec<&str> = token
        .split('/')
        .filter(|s| !s.is_empty() && *s != "." && *s != ".." && *s != "~")
        .collect();
    let Some(first) = segments.first() else {
        return false;
    };

    let has_word = segments.iter().any(|s| s.chars().any(char::is_alphabetic));
    let explicit = token.starts_with("./") || token.starts_with("~/") || token.ends_with('/');
    let all_short = segments.iter().all(|s| s.chars().count() <= 2);
    let all_acronyms = segments
        .iter()
        .all(|s| s.len() <= 3 && s.chars().all(|c| c.is_ascii_uppercase()));
    let host = first
        .rsplit_once('.')
        .is_some_and(|(_, suffix)| DOMAIN_SUFFIXES.contains(&suffix.to_ascii_lowercase().as_str()));

    has_word && (explicit || !all_short) && !all_acronyms && !host
}

fn normalize_directory(raw: &str) -> Option<String> {
    let trimmed = raw.trim_start_matches("./").trim_end_matches('/');
    if trimmed.is_empty() || trimmed == "." || trimmed == ".." || trimmed == "~" {
        return None;
    }
    Some(trimmed.to_string())
}

/// Names the casing convention of an identifier, if it has a recognisable one.
pub fn classify_identifier(identifier: &str) -> Option<&'static str> {
    let has_lower = identifier.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = identifier.chars().any(|c| c.is_ascii_uppercase());

    if identifier.contains('-') && !identifier.contains('_') {
        return (!has_upper && has_lower).then_some("kebab-case");
    }
    if identifier.contains('_') && !identifier.contains('-') {
        if has_lower && !has_upper {
            return Some("snake_case");
        }
        if has_upper && !has_lower {
            return Some("SCREAMING_SNAKE_CASE");
        }
        return None;
    }
    if identifier.contains('-') || !identifier.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }

    let first = identifier.chars().next()?;
    if first.is_ascii_lowercase() && has_upper {
        Some("camelCase")
    } else if first.is_ascii_uppercase() && has_lower && identifier.chars().skip(1).any(|c| c.is_ascii_uppercase()) {
        Some("PascalCase")
    } else {
        None
    }
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ConversationMessage, MessageRole};
    use crate::storage::MemoryStore;
    use std::sync::Arc;

    struct Fixture {
        prefs: UserPreferenceTracker,
        files: FilePreferenceTracker,
        messages: MessageStore,
    }

    async fn fixture() -> Fixture {
        let store = Arc::new(MemoryStore::new());
        Fixture {
            prefs: UserPreferenceTracker::initialize(store.clone()).await.unwrap(),
            files: FilePreferenceTracker::initialize(store.clone()).await.unwrap(),
            messages: MessageStore::initialize(store, 200).await.unwrap(),
        }
    }

    #[test]
    fn test_detects_languages_frameworks_and_patterns() {
        let service = ContextAnalysisService::new();
        let signals = service.detect("Build a Django view in Python, then port it to Rust. Use snake case please.");

        assert_eq!(signals.languages, vec!["python", "rust"]);
        assert_eq!(signals.frameworks, vec!["django"]);
        assert_eq!(signals.naming_patterns, vec!["snake_case"]);
    }

    #[test]
    fn test_keywords_need_word_boundaries() {
        let service = ContextAnalysisService::new();
        let signals = service.detect("The trusty javascripting reactor");
        assert!(signals.languages.is_empty());
        assert!(signals.frameworks.is_empty());
    }

    #[test]
    fn test_detects_paths_extensions_and_stem_casing() {
        let service = ContextAnalysisService::new();
        let signals = service.detect("Open ./src/api/user_service.py and components/UserCard.tsx, e.g. the .toml too");

        assert_eq!(signals.extensions, vec![".py", ".tsx", ".toml"]);
        assert_eq!(signals.directories, vec!["src/api", "components"]);
        assert_eq!(signals.naming_patterns, vec!["snake_case", "PascalCase"]);
        assert_eq!(signals.languages, vec!["python", "typescript"]);
    }

    #[test]
    fn test_framework_names_with_dots_are_not_files() {
        let service = ContextAnalysisService::new();
        let signals = service.detect("Is next.js better than vue.js?");

        assert_eq!(signals.frameworks, vec!["next.js", "vue"]);
        assert!(signals.extensions.is_empty());
    }

    #[test]
    fn test_prose_slashes_and_urls_are_ignored() {
        let service = ContextAnalysisService::new();
        let signals = service.detect("Read and/or write https://example.com/docs/page.html");
        assert!(signals.directories.is_empty());
        assert!(signals.extensions.is_empty());
    }

    #[test]
    fn test_ratios_units_and_acronyms_are_not_directories() {
        let service = ContextAnalysisService::new();
        let signals = service.detect("TCP/IP stack at 50/50 odds, km/h and 3/4 of CI/CD");
        assert!(signals.directories.is_empty());
    }

    #[test]
    fn test_slash_joined_keywords_are_keywords() {
        let service = ContextAnalysisService::new();
        let signals = service.detect("use python/rust with react/vue");

        assert_eq!(signals.languages, vec!["python", "rust"]);
        assert_eq!(signals.frameworks, vec!["react", "vue"]);
        assert!(signals.directories.is_empty());
    }

    #[test]
    fn test_missing_space_after_full_stop_is_not_an_extension() {
        let service = ContextAnalysisService::new();
        let signals = service.detect("I like python.Then go on.Next we ship");

        assert_eq!(signals.languages, vec!["python"]);
        assert!(signals.extensions.is_empty());
    }

    #[test]
    fn test_host_names_are_not_files_or_directories() {
        let service = ContextAnalysisService::new();
        let signals = service.detect("see example.com and example.org/docs, then edit config.toml");

        assert_eq!(signals.extensions, vec![".toml"]);
        assert!(signals.directories.is_empty());
    }

    #[test]
    fn test_keyword_stem_with_known_extension_is_still_a_file() {
        let service = ContextAnalysisService::new();
        let signals = service.detect("run python.py");

        assert_eq!(signals.extensions, vec![".py"]);
        assert_eq!(signals.languages, vec!["python"]);
    }

    #[test]
    fn test_detects_bare_directories() {
        let service = ContextAnalysisService::new();
        let signals = service.detect("move it into tests/ or src/handlers");
        assert_eq!(signals.directories, vec!["tests", "src/handlers"]);
    }

    #[test]
    fn test_custom_rules_extend_detection() {
        let mut service = ContextAnalysisService::new();
        service.add_rule(DetectionRule::language("zig", "zig"));
        service.add_rule(DetectionRule::language(".zig", "zig"));

        let signals = service.detect("zig please, see build.zig");
        assert_eq!(signals.languages, vec!["zig"]);
        assert_eq!(signals.extensions, vec![".zig"]);
    }

    #[test]
    fn test_classify_identifier() {
        assert_eq!(classify_identifier("user-card"), Some("kebab-case"));
        assert_eq!(classify_identifier("user_card"), Some("snake_case"));
        assert_eq!(classify_identifier("MAX_SIZE"), Some("SCREAMING_SNAKE_CASE"));
        assert_eq!(classify_identifier("userCard"), Some("camelCase"));
        assert_eq!(classify_identifier("UserCard"), Some("PascalCase"));
        assert_eq!(classify_identifier("main"), None);
        assert_eq!(classify_identifier("Readme"), None);
    }

    #[tokio::test]
    async fn test_repeated_mentions_count_once() {
        let f = fixture().await;
        let service = ContextAnalysisService::new();

        service
            .analyze_message("python python PYTHON, and more python", &f.prefs, &f.files)
            .await;

        let frequent = f.prefs.get_frequent_languages(5).await;
        assert_eq!(frequent.len(), 1);
        assert_eq!(frequent[0].count, 1);
    }

    #[tokio::test]
    async fn test_analyze_updates_trackers() {
        let f = fixture().await;
        let service = ContextAnalysisService::new();

        service
            .analyze_message("Add a React hook in src/hooks/use-auth.ts with Express later", &f.prefs, &f.files)
            .await;

        assert_eq!(f.prefs.get_preferred_framework().await.as_deref(), Some("react"));
        assert_eq!(f.prefs.get_frequent_languages(3).await[0].language, "typescript");
        assert_eq!(f.files.get_recent_extensions(5).await, vec![".ts"]);
        assert_eq!(f.files.get_recent_directories(5).await, vec!["src/hooks"]);
        assert_eq!(f.files.get_naming_patterns().await, vec!["kebab-case"]);
    }

    #[tokio::test]
    async fn test_context_string_is_empty_without_data() {
        let f = fixture().await;
        let service = ContextAnalysisService::new();
        assert_eq!(service.build_context_string(&f.prefs, &f.files, &f.messages).await, "");
    }

    #[tokio::test]
    async fn test_context_string_layout() {
        let f = fixture().await;
        let service = ContextAnalysisService::new().with_context_message_count(2);

        f.prefs.set_preferred_language("rust").await;
        f.prefs.increment_language_usage("rust").await;
        f.prefs.increment_language_usage("rust").await;
        f.prefs.increment_language_usage("go").await;
        f.prefs.set_preferred_framework("axum").await;
        f.files.add_recent_extension(".rs").await;
        f.files.add_recent_directory("src/api").await;
        f.files.add_naming_pattern("snake_case").await;
        f.messages.add_message(ConversationMessage::with_timestamp(MessageRole::User, "first", 1)).await;
        f.messages.add_message(ConversationMessage::with_timestamp(MessageRole::User, "hello", 2)).await;
        f.messages.add_message(ConversationMessage::with_timestamp(MessageRole::Assistant, "hi there", 3)).await;

        let expected = "User context:\n\
                        Preferred language: rust\n\
                        Frequently used languages: rust (2 uses), go (1 use)\n\
                        Preferred framework: axum\n\
                        Recent file types: .rs\n\
                        Recent directories: src/api\n\
                        Naming conventions: snake_case\n\
                        \n\
                        Recent conversation:\n\
                        user: hello\n\
                        assistant: hi there";
        let first = service.build_context_string(&f.prefs, &f.files, &f.messages).await;
        assert_eq!(first, expected);
        assert_eq!(service.build_context_string(&f.prefs, &f.files, &f.messages).await, first);
    }

    #[tokio::test]
    async fn test_context_string_truncates_long_messages() {
        let f = fixture().await;
        let service = ContextAnalysisService::new();
        f.messages.add_message(ConversationMessage::with_timestamp(MessageRole::User, "é".repeat(300), 1)).await;

        let context = service.build_context_string(&f.prefs, &f.files, &f.messages).await;
        let expected = format!("Recent conversation:\nuser: {}...", "é".repeat(CONTEXT_MESSAGE_MAX_CHARS));
        assert_eq!(context, expected);
    }

    #[tokio::test]
    async fn test_suggestions_empty_for_blank_input_or_no_preferences() {
        let f = fixture().await;
        let service = ContextAnalysisService::new();

        assert!(service.generate_suggestions("create a file", &f.prefs, &f.files).await.is_empty());

        f.prefs.set_preferred_language("rust").await;
        assert!(service.generate_suggestions("   ", &f.prefs, &f.files).await.is_empty());
    }

    #[tokio::test]
    async fn test_suggestions_follow_preferences() {
        let f = fixture().await;
        let service = ContextAnalysisService::new();
        f.prefs.increment_language_usage("python").await;
        f.prefs.set_preferred_framework("flask").await;
        f.files.add_recent_extension(".py").await;
        f.files.add_recent_directory("app/routes").await;
        f.files.add_naming_pattern("camelCase").await;
        f.files.add_naming_pattern("snake_case").await;

        let suggestions = service
            .generate_suggestions("Create a new endpoint and name the function, where should it go?", &f.prefs, &f.files)
            .await;
        assert_eq!(
            suggestions,
            vec![
                "Write it in python",
                "Follow flask conventions",
                "Create a .py file",
                "Place it in app/routes",
                "Name identifiers in snake_case",
            ]
        );

        let covered = service.generate_suggestions("a python flask thing", &f.prefs, &f.files).await;
        assert!(covered.is_empty());
    }

    #[tokio::test]
    async fn test_suggestions_are_capped() {
        let f = fixture().await;
        let service = ContextAnalysisService::new().with_max_suggestions(1);
        f.prefs.set_preferred_language("go").await;
        f.prefs.set_preferred_framework("gin").await;

        let suggestions = service.generate_suggestions("help me", &f.prefs, &f.files).await;
        assert_eq!(suggestions, vec!["Write it in go"]);
    }

    #[tokio::test]
    async fn test_suggestions_match_whole_words_only() {
        let f = fixture().await;
        let service = ContextAnalysisService::new();
        f.prefs.set_preferred_language("go").await;
        f.prefs.set_preferred_framework("next.js").await;

        let suggestions = service.generate_suggestions("a good idea for the next step", &f.prefs, &f.files).await;
        assert_eq!(suggestions, vec!["Write it in go", "Follow next.js conventions"]);

        let covered = service.generate_suggestions("port it to Go with Next.js", &f.prefs, &f.files).await;
        assert!(covered.is_empty());
    }
}
