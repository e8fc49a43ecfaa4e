//! Per-language-pair translation memory

use super::{JobStatusMap, TmError, TmResult, TmStorage};
use crate::tu::{JobRequest, JobResponse, JobStatus, LangPair, TranslationUnit, TuText};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Current source units by guid, used to refresh merged entries
pub type SourceUnits = HashMap<String, TranslationUnit>;

/// The persisted form of a TM
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TmFile {
    pub source_lang: String,
    pub target_lang: String,
    pub config_seal: String,
    #[serde(default)]
    pub job_status: JobStatusMap,
    #[serde(default)]
    pub tus: IndexMap<String, TranslationUnit>,
}

impl TmFile {
    pub fn empty(pair: &LangPair, config_seal: &str) -> Self {
        TmFile {
            source_lang: pair.source_lang.clone(),
            target_lang: pair.target_lang.clone(),
            config_seal: config_seal.to_string(),
            job_status: JobStatusMap::new(),
            tus: IndexMap::new(),
        }
    }
}

/// TUs and job history for one language pair
///
/// Entries are keyed by guid; a content index groups guids by the ordinal flattening
/// of their source. The table is written back only when it changed.
pub struct TranslationMemory {
    pair: LangPair,
    file_name: String,
    data: TmFile,
    by_source: HashMap<String, Vec<String>>,
    dirty: bool,
    storage: Arc<dyn TmStorage>,
    source_units: Option<Arc<SourceUnits>>,
}

impl std::fmt::Debug for TranslationMemory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TranslationMemory")
            .field("pair", &self.pair)
            .field("tus", &self.data.tus.len())
            .field("jobs", &self.data.job_status.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl TranslationMemory {
    /// A fresh TM that has never been stored
    pub fn empty(pair: LangPair, config_seal: &str, storage: Arc<dyn TmStorage>) -> Self {
        TranslationMemory {
            file_name: pair.tm_file_name(),
            data: TmFile::empty(&pair, config_seal),
            pair,
            by_source: HashMap::new(),
            dirty: false,
            storage,
            source_units: None,
        }
    }

    /// Load the stored TM for `pair`, or start empty
    ///
    /// The stored content is discarded (and the empty TM marked dirty) when its seal
    /// differs from `config_seal`, when it references a job missing from `known_jobs`,
    /// when it cannot be parsed, or when one of its entries fails validation.
    ///
    /// # Errors
    ///
    /// Storage I/O failures other than unparsable content.
    pub fn open(
        pair: LangPair,
        config_seal: &str,
        storage: Arc<dyn TmStorage>,
        known_jobs: &JobStatusMap,
    ) -> TmResult<Self> {
        let mut tm = Self::empty(pair, config_seal, storage);
        let stored = match tm.storage.load(&tm.file_name) {
            Ok(stored) => stored,
            Err(TmError::Json(e)) => {
                warn!("Unreadable TM {}, rebuilding: {}", tm.file_name, e);
                tm.dirty = true;
                return Ok(tm);
            }
            Err(e) => return Err(e),
        };
        let Some(stored) = stored else {
            debug!("Starting empty TM for {}", tm.pair);
            return Ok(tm);
        };
        if stored.config_seal != config_seal {
            info!("Nuking existing TM {}: config seal changed", tm.file_name);
            tm.dirty = true;
            return Ok(tm);
        }
        if let Some(orphan) = stored
            .job_status
            .keys()
            .find(|job_guid| !known_jobs.contains_key(*job_guid))
        {
            info!("Nuking existing TM {}: job {} is gone", tm.file_name, orphan);
            tm.dirty = true;
            return Ok(tm);
        }
        tm.data.job_status = stored.job_status;
        for (guid, tu) in stored.tus {
            if let Err(e) = tm.insert(&guid, tu) {
                warn!("Corrupt entry in TM {}, rebuilding: {}", tm.file_name, e);
                tm.reset();
                return Ok(tm);
            }
        }
        debug!(
            "Loaded TM {} with {} entries and {} jobs",
            tm.file_name,
            tm.data.tus.len(),
            tm.data.job_status.len()
        );
        Ok(tm)
    }

    /// Refresh merged entries from these source units
    pub fn with_source_units(mut self, source_units: Option<Arc<SourceUnits>>) -> Self {
        self.source_units = source_units;
        self
    }

    fn reset(&mut self) {
        self.data.tus.clear();
        self.data.job_status.clear();
        self.by_source.clear();
        self.dirty = true;
    }

    pub fn pair(&self) -> &LangPair {
        &self.pair
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn config_seal(&self) -> &str {
        &self.data.config_seal
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn len(&self) -> usize {
        self.data.tus.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.tus.is_empty()
    }

    /// Guids in insertion order
    pub fn guids(&self) -> impl Iterator<Item = &str> {
        self.data.tus.keys().map(String::as_str)
    }

    pub fn get(&self, guid: &str) -> Option<&TranslationUnit> {
        self.data.tus.get(guid)
    }

    /// Store `tu` under `guid`
    ///
    /// # Errors
    ///
    /// [`TmError::InvalidEntry`] if a mandatory field is missing, or a codec error if
    /// the target placeholders cannot be matched to the source.
    pub fn set(&mut self, guid: &str, tu: TranslationUnit) -> TmResult<()> {
        self.insert(guid, tu)?;
        self.dirty = true;
        Ok(())
    }

    fn insert(&mut self, guid: &str, tu: TranslationUnit) -> TmResult<()> {
        tu.validate()?;
        let tu = tu.whitelisted()?;
        let key = tu.src.as_ref().map(TuText::flatten_ordinal);
        let previous_key = self
            .data
            .tus
            .get(guid)
            .and_then(|old| old.src.as_ref())
            .map(TuText::flatten_ordinal);
        if let Some(previous_key) = previous_key.filter(|previous| Some(previous) != key.as_ref()) {
            if let Some(guids) = self.by_source.get_mut(&previous_key) {
                guids.retain(|g| g != guid);
            }
        }
        if let Some(key) = key {
            let guids = self.by_source.entry(key).or_default();
            if !guids.iter().any(|g| g == guid) {
                guids.push(guid.to_string());
            }
        }
        self.data.tus.insert(guid.to_string(), tu);
        Ok(())
    }

    /// Every stored TU whose source has the same ordinal flattening as `src`,
    /// in insertion order
    pub fn lookup_by_source(&self, src: &TuText) -> Vec<&TranslationUnit> {
        self.by_source
            .get(&src.flatten_ordinal())
            .map(|guids| guids.iter().filter_map(|g| self.data.tus.get(g)).collect())
            .unwrap_or_default()
    }

    pub fn job_status(&self, job_guid: &str) -> Option<&JobStatus> {
        self.data.job_status.get(job_guid)
    }

    pub fn job_statuses(&self) -> &JobStatusMap {
        &self.data.job_status
    }

    pub fn set_job_status(&mut self, job_guid: &str, status: JobStatus) {
        self.data.job_status.insert(job_guid.to_string(), status);
        self.dirty = true;
    }

    /// Merge a job response into the TM
    ///
    /// In-flight guids with no entry get a quality-0 placeholder. Each returned TU is
    /// layered over its request entry, stamped with the job, refreshed from the current
    /// source, and stored if it outranks the existing entry: higher quality wins, equal
    /// quality falls back to the later timestamp, and a full tie goes to the incoming
    /// entry. The job status is recorded in every case.
    pub fn apply_job_response(
        &mut self,
        response: &JobResponse,
        request: Option<&JobRequest>,
        mtime: i64,
    ) -> TmResult<()> {
        let requested = |guid: &str| {
            request
                .and_then(|request| request.tu(guid))
                .cloned()
                .unwrap_or_default()
        };
        for guid in &response.inflight {
            if self.get(guid).is_some() {
                continue;
            }
            let mut entry = requested(guid);
            entry.guid = guid.clone();
            entry.ts = response.ts;
            entry.q = Some(0);
            entry.job_guid = Some(response.job_guid.clone());
            entry.inflight = true;
            self.set(guid, entry)?;
        }
        for tu in &response.tus {
            let mut base = requested(&tu.guid);
            base.ts = response.ts;
            let mut rectified = base.overlay(tu.clone());
            rectified.job_guid = Some(response.job_guid.clone());
            if let Some(source) = self
                .source_units
                .as_ref()
                .and_then(|units| units.get(&tu.guid))
            {
                rectified.refresh_from_source(source);
            }
            if self.outranks(&rectified) {
                self.set(&tu.guid, rectified)?;
            }
        }
        self.set_job_status(
            &response.job_guid,
            JobStatus {
                status: response.status,
                mtime,
            },
        );
        Ok(())
    }

    fn outranks(&self, incoming: &TranslationUnit) -> bool {
        match self.get(&incoming.guid) {
            None => true,
            Some(existing) => {
                incoming.q > existing.q || (incoming.q == existing.q && incoming.ts >= existing.ts)
            }
        }
    }

    /// Write the TM if it changed since the last commit
    ///
    /// # Returns
    ///
    /// Whether a write happened.
    pub fn commit(&mut self) -> TmResult<bool> {
        if !self.dirty {
            return Ok(false);
        }
        info!("Updating {}...", self.file_name);
        self.storage.save(&self.file_name, &self.data)?;
        self.dirty = false;
        Ok(true)
    }
}
