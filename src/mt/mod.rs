/// Translation collaborators
///
/// String engines ([`MachineTranslator`]) translate flat text; [`MtProvider`] wraps an
/// engine into a job-level [`Translator`] that protects placeholders by sending the XML
/// tag form and restoring it afterwards.
///
/// # Example
///
/// ```ignore
/// use l10n_tm::mt::{MockMode, MockTranslator, MtProvider, Translator};
/// use l10n_tm::tu::{JobRequest, TranslationUnit};
///
/// let provider = MtProvider::new(MockTranslator::new(MockMode::Suffix)).with_quality(40);
/// let request = JobRequest {
///     job_guid: "job-1".into(),
///     source_lang: "en".into(),
///     target_lang: "fr".into(),
///     translation_provider: None,
///     tus: vec![TranslationUnit::new("greeting").with_src("Hello")],
/// };
/// let response = provider.request_translations(&request).await?;
/// ```
pub mod error;
pub mod google_translate;
pub mod mock;
pub mod provider;
pub mod translator;

pub use error::{MtError, MtResult};
pub use google_translate::GoogleTranslateProvider;
pub use mock::{MockMode, MockTranslator};
pub use provider::MtProvider;
pub use translator::{MachineTranslator, Translator, normalize_locale, validate_locale};
