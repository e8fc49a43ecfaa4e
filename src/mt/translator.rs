//! Translation traits and locale utilities
//!
//! Two levels of abstraction:
//!
//! - [`MachineTranslator`] is a raw string engine (Google Translate, mock). It knows
//!   nothing about placeholders or jobs.
//! - [`Translator`] is the job-level collaborator the pipeline talks to: it takes a
//!   [`JobRequest`] and answers with a [`JobResponse`]. [`MtProvider`] adapts any
//!   `MachineTranslator` into a `Translator`.
//!
//! [`MtProvider`]: crate::mt::MtProvider
//!
//! # Example
//!
//! ```ignore
//! use l10n_tm::mt::{MachineTranslator, GoogleTranslateProvider};
//!
//! let provider = GoogleTranslateProvider::from_env()?;
//! let texts = vec!["Hello".to_string(), "Goodbye".to_string()];
//! let results = provider.translate_batch(&texts, "en", "fr").await?;
//! ```

use crate::mt::error::{MtError, MtResult};
use crate::tu::{JobRequest, JobResponse};
use async_trait::async_trait;

/// Generic trait for machine translation engines
///
/// All methods are async to support I/O-bound operations like network requests.
#[async_trait]
pub trait MachineTranslator: Send + Sync {
    /// Translate a single text string from source to target locale
    async fn translate(
        &self,
        text: &str,
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<String>;

    /// Translate multiple strings in a single batch operation
    ///
    /// # Guarantees
    ///
    /// - Output order matches input order
    /// - Output length equals input length
    async fn translate_batch(
        &self,
        texts: &[String],
        source_locale: &str,
        target_locale: &str,
    ) -> MtResult<Vec<String>>;

    /// Name used in logs and in [`JobResponse::translation_provider`]
    fn provider_name(&self) -> &str;
}

/// Job-level translation collaborator, one per vendor
#[async_trait]
pub trait Translator: Send + Sync {
    fn name(&self) -> &str;

    /// Translate every TU of a job
    ///
    /// # Errors
    ///
    /// A single [`MtError::ProviderFailed`] describing the first failing vendor call.
    async fn request_translations(&self, request: &JobRequest) -> MtResult<JobResponse>;

    /// Like [`Translator::request_translations`], but only TUs whose target content
    /// differs from the target already in the request are returned
    async fn refresh_translations(&self, request: &JobRequest) -> MtResult<JobResponse> {
        let mut response = self.request_translations(request).await?;
        response.tus.retain(|tu| {
            let previous = request.tu(&tu.guid).and_then(|old| old.tgt.as_ref());
            match (tu.tgt.as_ref(), previous) {
                (Some(new), Some(old)) => !new.same_content(old),
                _ => true,
            }
        });
        Ok(response)
    }

    /// Poll a pending job; engines that answer synchronously have nothing to fetch
    async fn fetch_translations(
        &self,
        _pending: &JobResponse,
        _request: &JobRequest,
    ) -> MtResult<Option<JobResponse>> {
        Ok(None)
    }
}

/// Normalize a locale code by stripping region information
///
/// - `en-US` → `en`
/// - `zh-Hans` → `zh`
/// - `en` → `en` (unchanged)
pub fn normalize_locale(locale: &str) -> String {
    locale.split('-').next().unwrap_or(locale).to_lowercase()
}

/// Check that a locale code contains only alphanumerics, hyphens and underscores
pub fn validate_locale(locale: &str) -> MtResult<()> {
    if locale.is_empty() {
        return Err(MtError::InvalidLocale("Locale code is empty".to_string()));
    }

    if !locale
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Err(MtError::InvalidLocale(format!(
            "Invalid characters in locale code: {}",
            locale
        )));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tu::{JobState, TranslationUnit};

    // ========== Locale Tests ==========

    #[test]
    fn test_normalize_locale_with_region() {
        assert_eq!(normalize_locale("en-US"), "en");
        assert_eq!(normalize_locale("fr-FR"), "fr");
    }

    #[test]
    fn test_normalize_locale_with_script() {
        assert_eq!(normalize_locale("zh-Hans"), "zh");
        assert_eq!(normalize_locale("sr-Latn"), "sr");
    }

    #[test]
    fn test_normalize_locale_case_insensitive() {
        assert_eq!(normalize_locale("EN"), "en");
        assert_eq!(normalize_locale("EN-US"), "en");
    }

    #[test]
    fn test_validate_locale_valid_codes() {
        assert!(validate_locale("en").is_ok());
        assert!(validate_locale("zh-Hans").is_ok());
        assert!(validate_locale("de_DE").is_ok());
    }

    #[test]
    fn test_validate_locale_invalid_codes() {
        assert!(validate_locale("").is_err());
        assert!(validate_locale("fr#bad").is_err());
        match validate_locale("en@US") {
            Err(MtError::InvalidLocale(msg)) => assert!(msg.contains("Invalid characters")),
            _ => panic!("Expected InvalidLocale error"),
        }
    }

    // ========== Translator Default Tests ==========

    /// Uppercases plain sources
    struct Shouty;

    #[async_trait]
    impl Translator for Shouty {
        fn name(&self) -> &str {
            "shouty"
        }

        async fn request_translations(&self, request: &JobRequest) -> MtResult<JobResponse> {
            let mut response = JobResponse::for_request(request, JobState::Done);
            response.tus = request
                .tus
                .iter()
                .map(|tu| {
                    let src = tu.src.as_ref().map(|s| s.to_string()).unwrap_or_default();
                    TranslationUnit::new(tu.guid.as_str())
                        .with_tgt(src.to_uppercase())
                        .with_quality(1)
                })
                .collect();
            Ok(response)
        }
    }

    #[tokio::test]
    async fn test_refresh_returns_only_changed_targets() {
        let request = JobRequest {
            job_guid: "j".to_string(),
            source_lang: "en".to_string(),
            target_lang: "fr".to_string(),
            translation_provider: None,
            tus: vec![
                TranslationUnit::new("same").with_src("ok").with_tgt("OK"),
                TranslationUnit::new("changed").with_src("hi").with_tgt("hello"),
                TranslationUnit::new("new").with_src("yo"),
            ],
        };
        let response = Shouty.refresh_translations(&request).await.unwrap();
        let guids: Vec<&str> = response.tus.iter().map(|tu| tu.guid.as_str()).collect();
        assert_eq!(guids, vec!["changed", "new"]);
    }

    #[tokio::test]
    async fn test_fetch_defaults_to_nothing() {
        let request = JobRequest::default();
        let pending = JobResponse::for_request(&request, JobState::Pending);
        assert!(Shouty.fetch_translations(&pending, &request).await.unwrap().is_none());
    }
}
