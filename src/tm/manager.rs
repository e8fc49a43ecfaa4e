//! TM manager: lazy loading and reconciliation against the job ledger

use super::{JobLedger, JobStatusMap, SourceUnits, TmError, TmResult, TmStorage, TranslationMemory};
use crate::tu::LangPair;
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::sync::Arc;
use tracing::info;

/// Owns one reconciled [`TranslationMemory`] per language pair
///
/// The first request for a pair loads the stored TM, replays every pending or done
/// job whose status changed since the TM last saw it, and commits. Later requests in
/// the same session return the already reconciled TM without touching the ledger.
pub struct TmManager {
    storage: Arc<dyn TmStorage>,
    ledger: Arc<dyn JobLedger>,
    config_seal: String,
    source_units: Option<Arc<SourceUnits>>,
    reconciled: HashMap<LangPair, TranslationMemory>,
}

impl TmManager {
    pub fn new(
        storage: Arc<dyn TmStorage>,
        ledger: Arc<dyn JobLedger>,
        config_seal: impl Into<String>,
    ) -> Self {
        TmManager {
            storage,
            ledger,
            config_seal: config_seal.into(),
            source_units: None,
            reconciled: HashMap::new(),
        }
    }

    /// Current source units; merged entries take their source fields from here
    pub fn with_source_units(mut self, source_units: SourceUnits) -> Self {
        self.source_units = Some(Arc::new(source_units));
        self
    }

    pub fn config_seal(&self) -> &str {
        &self.config_seal
    }

    /// Whether the pair was already reconciled in this session
    pub fn is_reconciled(&self, pair: &LangPair) -> bool {
        self.reconciled.contains_key(pair)
    }

    /// The reconciled TM of a language pair
    ///
    /// # Errors
    ///
    /// Invalid language tags, ledger or storage failures, a job listed by the ledger
    /// whose body is missing, or an invalid TU in a job response.
    pub async fn get_tm(
        &mut self,
        source_lang: &str,
        target_lang: &str,
    ) -> TmResult<&mut TranslationMemory> {
        let pair = LangPair::new(source_lang, target_lang)?;
        match self.reconciled.entry(pair) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let tm = reconcile(
                    entry.key().clone(),
                    &self.config_seal,
                    &self.storage,
                    self.ledger.as_ref(),
                    self.source_units.clone(),
                )
                .await?;
                Ok(entry.insert(tm))
            }
        }
    }

    /// Commit every reconciled TM that changed since it was reconciled
    ///
    /// # Returns
    ///
    /// The number of TMs written.
    pub fn commit_all(&mut self) -> TmResult<usize> {
        let mut written = 0;
        for tm in self.reconciled.values_mut() {
            if tm.commit()? {
                written += 1;
            }
        }
        Ok(written)
    }
}

async fn reconcile(
    pair: LangPair,
    config_seal: &str,
    storage: &Arc<dyn TmStorage>,
    ledger: &dyn JobLedger,
    source_units: Option<Arc<SourceUnits>>,
) -> TmResult<TranslationMemory> {
    let jobs: JobStatusMap = ledger
        .job_status_by_lang_pair(&pair.source_lang, &pair.target_lang)
        .await?
        .into_iter()
        .filter(|(_, status)| status.status.is_tracked())
        .collect();
    let mut tm = TranslationMemory::open(pair, config_seal, storage.clone(), &jobs)?
        .with_source_units(source_units);
    for (job_guid, status) in &jobs {
        if tm.job_status(job_guid) == Some(status) {
            continue;
        }
        info!("Applying job {} to the {} TM...", job_guid, tm.pair());
        let response = ledger
            .get_job(job_guid)
            .await?
            .ok_or_else(|| TmError::JobNotFound(job_guid.clone()))?;
        let request = ledger.get_job_request(job_guid).await?;
        tm.apply_job_response(&response, request.as_ref(), status.mtime)?;
    }
    tm.commit()?;
    Ok(tm)
}
