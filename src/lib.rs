//! Placeholder-safe machine translation and a reconciled translation memory
//!
//! - [`nstr`]: the normalized string model (literal runs and placeholders)
//! - [`codec`]: mangled-token and XML-tag wire forms, and back
//! - [`pipeline`]: decoders and encoders between raw strings and normalized strings
//! - [`tu`]: translation units and job records
//! - [`tm`]: the translation memory, its storage, and reconciliation against the job
//!   ledger
//! - [`mt`]: translation engines and the job-level provider
//! - [`config`]: project configuration and the config seal

pub mod codec;
pub mod config;
pub mod mt;
pub mod notes;
pub mod nstr;
pub mod pipeline;
pub mod tm;
pub mod tu;


pub use codec::{CodecError, CodecResult, PlaceholderMap};
pub use config::{Config, ConfigError};
pub use notes::{Notes, extract_structured_notes};
pub use nstr::{DecodedPart, Flags, NormalizedString, Part, Placeholder, PlaceholderKind};
pub use tm::{TmError, TmManager, TmResult, TranslationMemory};
pub use tu::{JobRequest, JobResponse, JobState, LangPair, TranslationUnit, TuText};
