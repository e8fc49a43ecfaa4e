//! Deterministic engine for tests and offline runs
//!
//! ```ignore
//! use l10n_tm::mt::{MachineTranslator, MockMode, MockTranslator};
//!
//! let mock = MockTranslator::new(MockMode::Suffix);
//! assert_eq!(mock.translate("Hi <x1 />", "en", "fr").await?, "Hi <x1 />_fr");
//! ```

use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::MachineTranslator;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// How the mock engine "translates"
#[derive(Debug, Clone)]
pub enum MockMode {
    /// Append the target locale: `hello` → `hello_fr`
    Suffix,
    /// `(text, target_locale)` → translation, falling back to [`MockMode::Suffix`]
    Mappings(HashMap<(String, String), String>),
    /// Reverse whitespace-separated words
    Reorder,
    /// Fail every call with a translation error
    Error(String),
    /// Return the input unchanged
    NoOp,
}

/// Mock engine; clones share one call counter
#[derive(Debug, Clone)]
pub struct MockTranslator {
    mode: MockMode,
    delay_ms: u64,
    batches: Arc<AtomicUsize>,
}

impl MockTranslator {
    pub fn new(mode: MockMode) -> Self {
        Self::with_delay(mode, 0)
    }

    /// Sleep `delay_ms` before answering each call
    pub fn with_delay(mode: MockMode, delay_ms: u64) -> Self {
        Self {
            mode,
            delay_ms,
            batches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of engine calls so far
    pub fn batches(&self) -> usize {
        self.batches.load(Ordering::SeqCst)
    }

    async fn answer_call(&self) {
        self.batches.fetch_add(1, Ordering::SeqCst);
        if self.delay_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.delay_ms)).await;
        }
    }

    fn apply_translation(&self, text: &str, target: &str) -> MtResult<String> {
        match &self.mode {
            MockMode::Suffix => Ok(format!("{}_{}", text, target)),
            MockMode::Mappings(map) => Ok(map
                .get(&(text.to_string(), target.to_string()))
                .cloned()
                .unwrap_or_else(|| format!("{}_{}", text, target))),
            MockMode::Reorder => {
                let mut words: Vec<&str> = text.split_whitespace().collect();
                words.reverse();
                Ok(words.join(" "))
            }
            MockMode::Error(msg) => Err(MtError::TranslationError(msg.clone())),
            MockMode::NoOp => Ok(text.to_string()),
        }
    }
}

#[async_trait]
impl MachineTranslator for MockTranslator {
    async fn translate(
        &self,
        text: &str,
        _source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        self.answer_call().await;
        self.apply_translation(text, target_locale)
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        _source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        self.answer_call().await;
        texts
            .iter()
            .map(|text| self.apply_translation(text, target_locale))
            .collect()
    }

    fn provider_name(&self) -> &str {
        "Mock Translator"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== Mode Tests ==========

    #[tokio::test]
    async fn test_suffix_keeps_tags() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let result = mock.translate("Hi <x1 />", "en", "fr").await.unwrap();
        assert_eq!(result, "Hi <x1 />_fr");
    }

    #[tokio::test]
    async fn test_mappings_with_fallback() {
        let mut map = HashMap::new();
        map.insert(("hello".to_string(), "fr".to_string()), "bonjour".to_string());
        let mock = MockTranslator::new(MockMode::Mappings(map));
        let texts = vec!["hello".to_string(), "unknown".to_string()];
        let results = mock.translate_batch(&texts, "en", "fr").await.unwrap();
        assert_eq!(results, vec!["bonjour", "unknown_fr"]);
    }

    #[tokio::test]
    async fn test_reorder_moves_tags_with_words() {
        let mock = MockTranslator::new(MockMode::Reorder);
        let result = mock
            .translate("<x1>Acme</x1> sent <x2>now</x2>", "en", "ja")
            .await
            .unwrap();
        assert_eq!(result, "<x2>now</x2> sent <x1>Acme</x1>");
    }

    #[tokio::test]
    async fn test_error_mode_fails_batch() {
        let mock = MockTranslator::new(MockMode::Error("API unavailable".to_string()));
        let texts = vec!["hello".to_string()];
        match mock.translate_batch(&texts, "en", "fr").await {
            Err(MtError::TranslationError(msg)) => assert_eq!(msg, "API unavailable"),
            other => panic!("Expected TranslationError, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_noop_returns_unchanged() {
        let mock = MockTranslator::new(MockMode::NoOp);
        let texts = vec!["a &amp; b".to_string(), "c".to_string()];
        assert_eq!(mock.translate_batch(&texts, "en", "fr").await.unwrap(), texts);
    }

    // ========== Call Accounting Tests ==========

    #[tokio::test]
    async fn test_clones_share_call_counter() {
        let mock = MockTranslator::new(MockMode::Suffix);
        let clone = mock.clone();
        mock.translate("a", "en", "fr").await.unwrap();
        clone
            .translate_batch(&["b".to_string(), "c".to_string()], "en", "fr")
            .await
            .unwrap();
        assert_eq!(mock.batches(), 2);
    }

    #[tokio::test]
    async fn test_delay_adds_latency() {
        let mock = MockTranslator::with_delay(MockMode::Suffix, 50);
        let start = std::time::Instant::now();
        mock.translate("hello", "en", "fr").await.unwrap();
        assert!(start.elapsed().as_millis() >= 50);
    }

    #[test]
    fn test_provider_name() {
        assert_eq!(MockTranslator::new(MockMode::NoOp).provider_name(), "Mock Translator");
    }
}
