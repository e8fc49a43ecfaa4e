//! Translation memory
//!
//! One [`TranslationMemory`] per language pair holds the best known translation of
//! every TU plus the status of every job that fed it. It is a derived cache of the
//! job ledger: [`TmManager`] replays ledger jobs into it and throws it away whenever
//! the configuration seal or the job set no longer match.
//!
//! # Example
//!
//! ```ignore
//! use l10n_tm::tm::{FsJobStore, FsTmStorage, TmManager};
//! use std::sync::Arc;
//!
//! let storage = Arc::new(FsTmStorage::new(".l10n/tm"));
//! let ledger = Arc::new(FsJobStore::new(".l10n/jobs"));
//! let mut manager = TmManager::new(storage, ledger, config.seal()?);
//! let tm = manager.get_tm("en", "fr").await?;
//! for tu in tm.lookup_by_source(&"Hello".into()) {
//!     println!("{}: {:?}", tu.guid, tu.tgt);
//! }
//! ```

pub mod ledger;
pub mod manager;
pub mod storage;
pub mod store;

pub use ledger::{FsJobStore, JobLedger};
pub use manager::TmManager;
pub use storage::{FsTmStorage, MemoryTmStorage, TmStorage};
pub use store::{SourceUnits, TmFile, TranslationMemory};

use crate::codec::CodecError;
use crate::tu::JobStatus;
use indexmap::IndexMap;
use thiserror::Error;

/// Job guid → last applied status, in application order
pub type JobStatusMap = IndexMap<String, JobStatus>;

/// Errors raised by the TM store, its storage and the job ledger
#[derive(Debug, Error)]
pub enum TmError {
    /// A TU missing a mandatory field was about to be stored
    #[error("cannot set TM entry `{guid}`: {reason}")]
    InvalidEntry { guid: String, reason: String },
    #[error("job `{0}` not found in the job ledger")]
    JobNotFound(String),
    #[error("invalid language tag {0}")]
    InvalidLanguage(String),
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type TmResult<T> = Result<T, TmError>;
