//! Clipboard capture pipeline.
//!
//! Text arriving from the clipboard watcher passes through registered
//! transforms, is classified, encrypted and appended to history, then
//! checked against the notification matchers.

mod heuristic;

pub use heuristic::is_code;

use crate::crypto::KeyMaterial;
use crate::history::HistoryStore;
use crate::timestamp::now_timestamp;
use crate::{ClipkeepError, Result};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, warn};

/// Rewrites captured text before it is stored
pub trait ClipboardTransform: Send + Sync {
    fn name(&self) -> &str;

    /// Return replacement text, or `None` to leave the text unchanged
    fn transform(&self, text: &str) -> Option<String>;
}

/// Flags captured text that deserves attention
pub trait ClipboardMatcher: Send + Sync {
    fn name(&self) -> &str;

    fn matches(&self, text: &str) -> bool;
}

/// Case-insensitive regex rule
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RuleConfig", into = "RuleConfig")]
pub struct PatternRule {
    name: String,
    pattern: Regex,
    pub enabled: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RuleConfig {
    name: String,
    pattern: String,
    #[serde(default = "enabled_by_default")]
    enabled: bool,
}

fn enabled_by_default() -> bool {
    true
}

impl TryFrom<RuleConfig> for PatternRule {
    type Error = ClipkeepError;

    fn try_from(config: RuleConfig) -> Result<Self> {
        let mut rule = Self::new(&config.name, &config.pattern)?;
        rule.enabled = config.enabled;
        Ok(rule)
    }
}

impl From<PatternRule> for RuleConfig {
    fn from(rule: PatternRule) -> Self {
        Self {
            name: rule.name,
            pattern: rule.pattern.as_str().to_string(),
            enabled: rule.enabled,
        }
    }
}

impl PatternRule {
    pub fn new(name: &str, pattern: &str) -> Result<Self> {
        let pattern = RegexBuilder::new(pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| ClipkeepError::InvalidInput(format!("rule '{}': {}", name, e)))?;
        Ok(Self {
            name: name.to_string(),
            pattern,
            enabled: true,
        })
    }

    /// Fenced code blocks, URLs and email addresses
    pub fn defaults() -> Vec<Self> {
        [
            ("Code Snippet", r"```[\s\S]*?```"),
            ("URL", r"https?://\S+"),
            ("Email", r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}"),
        ]
        .iter()
        .filter_map(|(name, pattern)| Self::new(name, pattern).ok())
        .collect()
    }

    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }
}

impl ClipboardMatcher for PatternRule {
    fn name(&self) -> &str {
        &self.name
    }

    fn matches(&self, text: &str) -> bool {
        self.enabled && self.pattern.is_match(text)
    }
}

/// Prepends a fixed prefix to every capture
#[derive(Debug, Clone)]
pub struct PrefixTransform {
    name: String,
    prefix: String,
}

impl PrefixTransform {
    pub fn new(name: &str, prefix: &str) -> Self {
        Self {
            name: name.to_string(),
            prefix: prefix.to_string(),
        }
    }
}

impl ClipboardTransform for PrefixTransform {
    fn name(&self) -> &str {
        &self.name
    }

    fn transform(&self, text: &str) -> Option<String> {
        Some(format!("{}{}", self.prefix, text))
    }
}

/// Result of storing one capture
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CaptureOutcome {
    pub id: i64,
    /// Text after transforms
    pub text: String,
    pub is_code: bool,
    pub matched_rules: Vec<String>,
    /// Names of transforms that changed the text
    pub transformed: Vec<String>,
}

pub struct CapturePipeline {
    history: HistoryStore,
    keys: Arc<KeyMaterial>,
    transforms: Vec<Box<dyn ClipboardTransform>>,
    matchers: Vec<Box<dyn ClipboardMatcher>>,
    last_text: Option<String>,
}

impl CapturePipeline {
    pub fn new(history: HistoryStore, keys: Arc<KeyMaterial>) -> Self {
        Self {
            history,
            keys,
            transforms: Vec::new(),
            matchers: Vec::new(),
            last_text: None,
        }
    }

    pub fn with_transform(mut self, transform: Box<dyn ClipboardTransform>) -> Self {
        self.transforms.push(transform);
        self
    }

    pub fn with_matcher(mut self, matcher: Box<dyn ClipboardMatcher>) -> Self {
        self.matchers.push(matcher);
        self
    }

    /// Store `text` as a new history entry.
    ///
    /// Returns `Ok(None)` for empty text or a repeat of the previous capture.
    pub fn capture(&mut self, text: &str) -> Result<Option<CaptureOutcome>> {
        if text.trim().is_empty() {
            return Ok(None);
        }
        if self.last_text.as_deref() == Some(text) {
            debug!("Ignoring repeated clipboard text");
            return Ok(None);
        }

        let mut current = text.to_string();
        let mut transformed = Vec::new();
        for transform in &self.transforms {
            match transform.transform(&current) {
                Some(next) if !next.is_empty() && next != current => {
                    current = next;
                    transformed.push(transform.name().to_string());
                }
                Some(next) if next.is_empty() => {
                    warn!("Transform {} produced empty text, ignoring", transform.name());
                }
                _ => {}
            }
        }

        let code = is_code(&current);
        let ciphertext = self.keys.encrypt(&current)?;
        let id = self.history.append(&ciphertext, &now_timestamp(), code)?;
        self.last_text = Some(text.to_string());

        let matched_rules = self
            .matchers
            .iter()
            .filter(|m| m.matches(&current))
            .map(|m| m.name().to_string())
            .collect();

        debug!("Captured history entry {}", id);
        Ok(Some(CaptureOutcome {
            id,
            text: current,
            is_code: code,
            matched_rules,
            transformed,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::TokenKey;

    struct Silent;

    impl ClipboardTransform for Silent {
        fn name(&self) -> &str {
            "silent"
        }

        fn transform(&self, _text: &str) -> Option<String> {
            None
        }
    }

    fn pipeline() -> (CapturePipeline, HistoryStore, Arc<KeyMaterial>) {
        let history = HistoryStore::in_memory().unwrap();
        let keys = Arc::new(KeyMaterial::fixed(TokenKey::generate()));
        let mut pipeline = CapturePipeline::new(history.clone(), keys.clone())
            .with_transform(Box::new(Silent))
            .with_transform(Box::new(PrefixTransform::new("prefix", "> ")));
        for rule in PatternRule::defaults() {
            pipeline = pipeline.with_matcher(Box::new(rule));
        }
        (pipeline, history, keys)
    }

    #[test]
    fn test_capture_stores_encrypted_entry() {
        let (mut pipeline, history, keys) = pipeline();
        let outcome = pipeline.capture("see https://example.com").unwrap().unwrap();

        assert_eq!(outcome.text, "> see https://example.com");
        assert_eq!(outcome.transformed, vec!["prefix".to_string()]);
        assert_eq!(outcome.matched_rules, vec!["URL".to_string()]);
        assert!(!outcome.is_code);

        let entry = history.get(outcome.id).unwrap();
        assert_ne!(entry.ciphertext, outcome.text.as_bytes());
        assert_eq!(keys.decrypt(&entry.ciphertext), outcome.text);
        assert!(crate::timestamp::is_valid_timestamp(&entry.timestamp));
    }

    #[test]
    fn test_empty_and_repeated_text_skipped() {
        let (mut pipeline, history, _) = pipeline();
        assert!(pipeline.capture("   ").unwrap().is_none());
        assert!(pipeline.capture("hello").unwrap().is_some());
        assert!(pipeline.capture("hello").unwrap().is_none());
        assert!(pipeline.capture("world").unwrap().is_some());
        assert!(pipeline.capture("hello").unwrap().is_some());
        assert_eq!(history.count().unwrap(), 3);
    }

    #[test]
    fn test_rules_are_case_insensitive_and_toggle() {
        let mut rule = PatternRule::new("Secret", "password").unwrap();
        assert!(rule.matches("my PASSWORD is"));
        rule.enabled = false;
        assert!(!rule.matches("my PASSWORD is"));
        assert!(PatternRule::new("Broken", "(").is_err());
    }

    #[test]
    fn test_rule_serde() {
        let rules: Vec<PatternRule> =
            serde_json::from_str(r#"[{"name":"Ticket","pattern":"[A-Z]+-\\d+","enabled":false}]"#).unwrap();
        assert_eq!(rules[0].pattern(), r"[A-Z]+-\d+");
        assert!(!rules[0].enabled);

        let json = serde_json::to_string(&rules[0]).unwrap();
        assert!(json.contains("\"Ticket\""));
        assert!(serde_json::from_str::<PatternRule>(r#"{"name":"x","pattern":"("}"#).is_err());
    }
}
