//! Project configuration (`l10n-tm.json`) and the config seal

use crate::pipeline::{Glossary, GlossaryTranslator};
use icu_locale::Locale;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const CONFIG_FILE_NAME: &str = "l10n-tm.json";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Configuration error in '{field_path}': {message}")]
pub struct ValidationError {
    /// JSON path to the field (e.g., "targetLangs[0]")
    pub field_path: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field_path: field_path.into(),
            message: message.into(),
        }
    }
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration validation failed:\n{}", format_validation_errors(.0))]
    ValidationErrors(Vec<ValidationError>),

    #[error("Failed to load configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse configuration: {0}")]
    ParseError(#[from] serde_json::Error),
}

fn format_validation_errors(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .enumerate()
        .map(|(i, err)| format!("  {}. {} - {}", i + 1, err.field_path, err.message))
        .collect::<Vec<_>>()
        .join("\n")
}

/// String engine behind the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Engine {
    #[default]
    Google,
    Mock,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ProviderConfig {
    pub engine: Engine,
    /// Quality assigned to machine translations
    pub quality: i64,
    pub max_chunk_size: usize,
    pub max_char_length: usize,
    pub glossary: Glossary,
    /// Ledger language → engine language code
    pub language_map: BTreeMap<String, String>,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            engine: Engine::Google,
            quality: 40,
            max_chunk_size: 125,
            max_char_length: 9900,
            glossary: Glossary::new(),
            language_map: BTreeMap::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Config {
    pub source_lang: String,
    pub target_langs: Vec<String>,
    /// As written in the file; see [`Config::tm_path`]
    pub tm_dir: PathBuf,
    pub job_dir: PathBuf,
    pub provider: ProviderConfig,
    /// Project directory the configuration was loaded from
    #[serde(skip)]
    pub root: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            source_lang: "en".to_string(),
            target_langs: Vec::new(),
            tm_dir: PathBuf::from(".l10n/tm"),
            job_dir: PathBuf::from(".l10n/jobs"),
            provider: ProviderConfig::default(),
            root: PathBuf::new(),
        }
    }
}

impl Config {
    /// Read `l10n-tm.json` from `root`
    ///
    /// # Returns
    /// - `Ok(None)` when the file does not exist
    ///
    /// # Errors
    /// - File read error
    /// - JSON parse error
    pub fn load_from_dir(root: &Path) -> Result<Option<Self>, ConfigError> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            tracing::debug!("No {} in {}", CONFIG_FILE_NAME, root.display());
            return Ok(None);
        }
        tracing::debug!("Loading configuration from {}", path.display());
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Load (or default) and validate the configuration of the project at `root`
    pub fn load(root: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::load_from_dir(root)?.unwrap_or_default();
        config.validate().map_err(ConfigError::ValidationErrors)?;
        config.root = root.to_path_buf();
        Ok(config)
    }

    /// TM directory resolved against the project root
    pub fn tm_path(&self) -> PathBuf {
        self.root.join(&self.tm_dir)
    }

    /// Job directory resolved against the project root
    pub fn job_path(&self) -> PathBuf {
        self.root.join(&self.job_dir)
    }

    /// # Errors
    /// Every problem found, not just the first one.
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.source_lang.is_empty() {
            errors.push(ValidationError::new(
                "sourceLang",
                "The source language cannot be empty. Example: \"en\"",
            ));
        } else if let Err(e) = self.source_lang.parse::<Locale>() {
            errors.push(ValidationError::new(
                "sourceLang",
                format!("Invalid language tag '{}': {e}", self.source_lang),
            ));
        }

        for (index, lang) in self.target_langs.iter().enumerate() {
            if let Err(e) = lang.parse::<Locale>() {
                errors.push(ValidationError::new(
                    format!("targetLangs[{index}]"),
                    format!("Invalid language tag '{lang}': {e}"),
                ));
            }
        }

        if self.provider.max_chunk_size == 0 {
            errors.push(ValidationError::new(
                "provider.maxChunkSize",
                "Must be at least 1",
            ));
        }
        if self.provider.max_char_length == 0 {
            errors.push(ValidationError::new(
                "provider.maxCharLength",
                "Must be at least 1",
            ));
        }

        if let Err(e) = GlossaryTranslator::new(self.provider.glossary.clone()) {
            errors.push(ValidationError::new(
                "provider.glossary",
                format!("Glossary keywords do not form a valid pattern: {e}"),
            ));
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }

    /// Lowercase hex SHA-256 of the canonical JSON form
    ///
    /// Any change to the file contents changes the seal, which invalidates every
    /// stored TM on next access. The project root is not part of it.
    pub fn seal(&self) -> Result<String, ConfigError> {
        let canonical = serde_json::to_vec(self)?;
        Ok(format!("{:x}", Sha256::digest(&canonical)))
    }

    pub fn glossary(&self) -> Result<GlossaryTranslator, ConfigError> {
        GlossaryTranslator::new(self.provider.glossary.clone()).map_err(|e| {
            ConfigError::ValidationErrors(vec![ValidationError::new(
                "provider.glossary",
                e.to_string(),
            )])
        })
    }
}
