use crate::codec::CodecError;
use thiserror::Error;

/// Error types for the translation collaborators
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MtError {
    /// The engine refused or mangled a translation
    #[error("Translation error: {0}")]
    TranslationError(String),
    /// Missing API key, bad endpoint, client-side HTTP errors
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error("Network error: {0}")]
    NetworkError(String),
    #[error("Invalid locale: {0}")]
    InvalidLocale(String),
    /// Placeholders could not be restored from the engine output
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// Any failure of a vendor call, tagged with the provider that made it
    #[error("{provider} failed: {source}")]
    ProviderFailed {
        provider: String,
        source: Box<MtError>,
    },
}

impl MtError {
    pub fn provider_failed(provider: impl Into<String>, source: MtError) -> Self {
        match source {
            already @ MtError::ProviderFailed { .. } => already,
            source => MtError::ProviderFailed {
                provider: provider.into(),
                source: Box::new(source),
            },
        }
    }
}

impl From<reqwest::Error> for MtError {
    fn from(e: reqwest::Error) -> Self {
        MtError::NetworkError(e.to_string())
    }
}

/// Result type for MT operations
pub type MtResult<T> = Result<T, MtError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_failed_display() {
        let e = MtError::provider_failed("mock", MtError::TranslationError("boom".to_string()));
        assert_eq!(e.to_string(), "mock failed: Translation error: boom");
    }

    #[test]
    fn test_provider_failed_is_not_nested() {
        let inner = MtError::provider_failed("a", MtError::NetworkError("down".to_string()));
        let outer = MtError::provider_failed("b", inner.clone());
        assert_eq!(outer, inner);
    }

    #[test]
    fn test_codec_error_converts() {
        let e: MtError = CodecError::UnresolvedTag("<x9 />".to_string()).into();
        assert!(matches!(e, MtError::Codec(_)));
    }
}
