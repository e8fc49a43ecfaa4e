//! Google Translate API v2 engine
//!
//! Strings are sent with `format: "html"` so the `<xN>` placeholder tags produced by
//! the XML codec are treated as markup and moved rather than translated. The API key
//! is read from the `GOOGLE_TRANSLATE_API_KEY` environment variable.

use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::{MachineTranslator, normalize_locale, validate_locale};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

/// Google Translate API v2 engine
#[derive(Clone)]
pub struct GoogleTranslateProvider {
    api_key: String,
    client: reqwest::Client,
    base_url: String,
}

#[derive(Deserialize)]
struct ApiResponse {
    data: ApiData,
}

#[derive(Deserialize)]
struct ApiData {
    translations: Vec<ApiTranslation>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ApiTranslation {
    translated_text: String,
}

impl GoogleTranslateProvider {
    /// Google Translate v2 accepts up to 128 texts per request
    const MAX_BATCH_SIZE: usize = 128;

    const MAX_CHARS_PER_STRING: usize = 30_000;

    const DEFAULT_BASE_URL: &'static str =
        "https://translation.googleapis.com/language/translate/v2";

    pub fn new(api_key: String) -> MtResult<Self> {
        if api_key.trim().is_empty() {
            return Err(MtError::ConfigError("API key cannot be empty".to_string()));
        }

        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .map_err(|e| MtError::NetworkError(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            api_key,
            client,
            base_url: Self::DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Read the key from `GOOGLE_TRANSLATE_API_KEY`
    pub fn from_env() -> MtResult<Self> {
        let api_key = std::env::var("GOOGLE_TRANSLATE_API_KEY").map_err(|_| {
            MtError::ConfigError(
                "GOOGLE_TRANSLATE_API_KEY environment variable not set".to_string(),
            )
        })?;

        Self::new(api_key)
    }

    /// Point the engine at another endpoint (proxies, test servers)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn check_length(index: usize, text: &str) -> MtResult<()> {
        if text.len() > Self::MAX_CHARS_PER_STRING {
            return Err(MtError::TranslationError(format!(
                "Text at index {} exceeds maximum length of {} characters",
                index,
                Self::MAX_CHARS_PER_STRING
            )));
        }
        Ok(())
    }

    async fn translate_chunk(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        let url = format!("{}?key={}", self.base_url, self.api_key);
        let body = json!({
            "q": texts,
            "source": normalize_locale(source_locale),
            "target": normalize_locale(target_locale),
            "format": "html"
        });

        let response = self.client.post(&url).json(&body).send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());

            return Err(if status.is_client_error() {
                MtError::ConfigError(format!("API client error ({}): {}", status, error_text))
            } else {
                MtError::TranslationError(format!("API server error ({}): {}", status, error_text))
            });
        }

        let parsed: ApiResponse = response.json().await.map_err(|e| {
            MtError::TranslationError(format!("Failed to parse API response: {}", e))
        })?;

        Ok(parsed
            .data
            .translations
            .into_iter()
            .map(|t| t.translated_text)
            .collect())
    }
}

impl std::fmt::Debug for GoogleTranslateProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleTranslateProvider")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .finish()
    }
}

#[async_trait]
impl MachineTranslator for GoogleTranslateProvider {
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        if text.is_empty() {
            return Ok(String::new());
        }
        Self::check_length(0, text)?;

        let results = self
            .translate_chunk(&[text.to_string()], source_locale, target_locale)
            .await?;
        results.into_iter().next().ok_or_else(|| {
            MtError::TranslationError("API returned no translation".to_string())
        })
    }

    async fn translate_batch(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>> {
        validate_locale(source_locale)?;
        validate_locale(target_locale)?;

        if texts.is_empty() {
            return Ok(Vec::new());
        }
        for (i, text) in texts.iter().enumerate() {
            Self::check_length(i, text)?;
        }

        let mut all_results = Vec::with_capacity(texts.len());
        for chunk in texts.chunks(Self::MAX_BATCH_SIZE) {
            let chunk_results = self
                .translate_chunk(chunk, source_locale, target_locale)
                .await?;
            if chunk_results.len() != chunk.len() {
                return Err(MtError::TranslationError(format!(
                    "API returned {} translations for {} texts",
                    chunk_results.len(),
                    chunk.len()
                )));
            }
            all_results.extend(chunk_results);
        }

        Ok(all_results)
    }

    fn provider_name(&self) -> &str {
        "Google Translate"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ========== Initialization Tests ==========

    #[test]
    fn test_new_with_valid_key() {
        let provider = GoogleTranslateProvider::new("test-api-key".to_string()).unwrap();
        assert_eq!(provider.provider_name(), "Google Translate");
    }

    #[test]
    fn test_new_with_blank_key() {
        for key in ["", "   "] {
            match GoogleTranslateProvider::new(key.to_string()) {
                Err(MtError::ConfigError(msg)) => assert!(msg.contains("empty")),
                _ => panic!("Expected ConfigError"),
            }
        }
    }

    #[test]
    fn test_debug_masks_key() {
        let provider = GoogleTranslateProvider::new("test-key".to_string())
            .unwrap()
            .with_base_url("http://localhost:9");
        let debug_str = format!("{:?}", provider);
        assert!(debug_str.contains("***"));
        assert!(debug_str.contains("localhost:9"));
        assert!(!debug_str.contains("test-key"));
    }

    #[test]
    fn test_response_shape() {
        let parsed: ApiResponse = serde_json::from_str(
            r#"{"data":{"translations":[{"translatedText":"Bonjour <x1 />"}]}}"#,
        )
        .unwrap();
        assert_eq!(parsed.data.translations[0].translated_text, "Bonjour <x1 />");
    }

    // ========== Validation Tests ==========

    #[tokio::test]
    async fn test_translate_empty_text() {
        let provider = GoogleTranslateProvider::new("test-key".to_string()).unwrap();
        assert_eq!(provider.translate("", "en", "fr").await.unwrap(), "");
    }

    #[tokio::test]
    async fn test_translate_invalid_locales() {
        let provider = GoogleTranslateProvider::new("test-key".to_string()).unwrap();
        assert!(provider.translate("hello", "invalid@code", "fr").await.is_err());
        assert!(provider.translate("hello", "en", "invalid#code").await.is_err());
    }

    #[tokio::test]
    async fn test_batch_text_too_long() {
        let provider = GoogleTranslateProvider::new("test-key".to_string()).unwrap();
        let texts = vec![
            "ok".to_string(),
            "x".repeat(GoogleTranslateProvider::MAX_CHARS_PER_STRING + 1),
        ];
        match provider.translate_batch(&texts, "en", "fr").await {
            Err(MtError::TranslationError(msg)) => assert!(msg.contains("index 1")),
            _ => panic!("Expected TranslationError"),
        }
    }

    #[tokio::test]
    async fn test_batch_empty() {
        let provider = GoogleTranslateProvider::new("test-key".to_string()).unwrap();
        assert!(provider.translate_batch(&[], "en", "fr").await.unwrap().is_empty());
    }

    // ========== Live API Tests (require GOOGLE_TRANSLATE_API_KEY) ==========

    #[tokio::test]
    #[ignore]
    async fn test_real_api_keeps_placeholder_tags() {
        if std::env::var("GOOGLE_TRANSLATE_API_KEY").is_err() {
            eprintln!("Skipping: GOOGLE_TRANSLATE_API_KEY not set");
            return;
        }

        let provider = GoogleTranslateProvider::from_env().unwrap();
        let texts = vec!["Hello <x1 />, you have <x2>3</x2> messages".to_string()];
        let results = provider.translate_batch(&texts, "en", "fr").await.unwrap();
        assert_eq!(results.len(), 1);
        assert!(results[0].contains("<x1"));
        assert!(results[0].contains("</x2>"));
    }

    #[tokio::test]
    #[ignore]
    async fn test_real_api_invalid_key() {
        let provider = GoogleTranslateProvider::new("invalid-key-xyz".to_string()).unwrap();
        let result = provider.translate("hello", "en", "fr").await;
        assert!(matches!(
            result,
            Err(MtError::ConfigError(_)) | Err(MtError::TranslationError(_))
        ));
    }
}
