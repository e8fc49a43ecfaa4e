//! Job ledger: the authoritative record of translation jobs
//!
//! [`FsJobStore`] keeps one JSON file per job state in a directory:
//!
//! ```text
//! <sourceLang>_<targetLang>_job_<jobGuid>-req.json      the JobRequest
//! <sourceLang>_<targetLang>_job_<jobGuid>-pending.json  a pending JobResponse
//! <sourceLang>_<targetLang>_job_<jobGuid>-done.json     the final JobResponse
//! ```

use super::TmResult;
use crate::tu::{JobRequest, JobResponse, JobState, JobStatus};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Read access to the job ledger
#[async_trait]
pub trait JobLedger: Send + Sync {
    /// Every job of a language pair with its current status, in a stable order
    async fn job_status_by_lang_pair(
        &self,
        source_lang: &str,
        target_lang: &str,
    ) -> TmResult<Vec<(String, JobStatus)>>;

    /// The latest response body of a job
    async fn get_job(&self, job_guid: &str) -> TmResult<Option<JobResponse>>;

    /// The request a job was created from
    async fn get_job_request(&self, job_guid: &str) -> TmResult<Option<JobRequest>>;
}

/// A directory of job files
#[derive(Debug, Clone)]
pub struct FsJobStore {
    dir: PathBuf,
}

/// Request < blocked < pending < done
fn progress(state: JobState) -> u8 {
    match state {
        JobState::Req => 0,
        JobState::Blocked => 1,
        JobState::Pending => 2,
        JobState::Done => 3,
    }
}

fn parse_state(state: &str) -> Option<JobState> {
    match state {
        "req" => Some(JobState::Req),
        "pending" => Some(JobState::Pending),
        "done" => Some(JobState::Done),
        "blocked" => Some(JobState::Blocked),
        _ => None,
    }
}

impl FsJobStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsJobStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file_name(source_lang: &str, target_lang: &str, job_guid: &str, state: JobState) -> String {
        format!("{}_{}_job_{}-{}.json", source_lang, target_lang, job_guid, state)
    }

    /// Names of all files in the ledger directory; empty if it does not exist yet
    async fn file_names(&self) -> TmResult<Vec<String>> {
        let mut names = Vec::new();
        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(names),
            Err(e) => return Err(e.into()),
        };
        while let Some(entry) = entries.next_entry().await? {
            if let Some(name) = entry.file_name().to_str() {
                names.push(name.to_string());
            }
        }
        Ok(names)
    }

    /// The file of `job_guid` in the most advanced of `states`
    async fn find_job_file(&self, job_guid: &str, states: &[JobState]) -> TmResult<Option<PathBuf>> {
        let names = self.file_names().await?;
        for state in states {
            let suffix = format!("_job_{}-{}.json", job_guid, state);
            if let Some(name) = names.iter().find(|name| name.ends_with(&suffix)) {
                return Ok(Some(self.dir.join(name)));
            }
        }
        Ok(None)
    }

    async fn read_json<T: DeserializeOwned>(path: &Path) -> TmResult<T> {
        debug!("Reading job file {}", path.display());
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_json<T: Serialize>(&self, file_name: String, value: &T) -> TmResult<PathBuf> {
        tokio::fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(file_name);
        tokio::fs::write(&path, serde_json::to_string_pretty(value)?).await?;
        debug!("Wrote job file {}", path.display());
        Ok(path)
    }

    /// Record a job request
    pub async fn write_request(&self, request: &JobRequest) -> TmResult<PathBuf> {
        let name = Self::file_name(
            &request.source_lang,
            &request.target_lang,
            &request.job_guid,
            JobState::Req,
        );
        self.write_json(name, request).await
    }

    /// Record a job response under its status
    pub async fn write_response(&self, response: &JobResponse) -> TmResult<PathBuf> {
        let name = Self::file_name(
            &response.source_lang,
            &response.target_lang,
            &response.job_guid,
            response.status,
        );
        self.write_json(name, response).await
    }
}

/// Modification time in milliseconds since the epoch
async fn mtime_millis(path: &Path) -> TmResult<i64> {
    let modified = tokio::fs::metadata(path).await?.modified()?;
    Ok(DateTime::<Utc>::from(modified).timestamp_millis())
}

#[async_trait]
impl JobLedger for FsJobStore {
    async fn job_status_by_lang_pair(
        &self,
        source_lang: &str,
        target_lang: &str,
    ) -> TmResult<Vec<(String, JobStatus)>> {
        let prefix = format!("{}_{}_job_", source_lang, target_lang);
        let mut latest: BTreeMap<String, (JobState, String)> = BTreeMap::new();
        for name in self.file_names().await? {
            let Some(rest) = name
                .strip_prefix(&prefix)
                .and_then(|rest| rest.strip_suffix(".json"))
            else {
                continue;
            };
            let Some((job_guid, state)) = rest.rsplit_once('-') else {
                continue;
            };
            let Some(state) = parse_state(state) else {
                continue;
            };
            let advanced = latest
                .get(job_guid)
                .is_none_or(|(current, _)| progress(state) > progress(*current));
            if advanced {
                latest.insert(job_guid.to_string(), (state, name.clone()));
            }
        }
        let mut jobs = Vec::with_capacity(latest.len());
        for (job_guid, (status, name)) in latest {
            let mtime = mtime_millis(&self.dir.join(&name)).await?;
            jobs.push((job_guid, JobStatus { status, mtime }));
        }
        Ok(jobs)
    }

    async fn get_job(&self, job_guid: &str) -> TmResult<Option<JobResponse>> {
        match self
            .find_job_file(job_guid, &[JobState::Done, JobState::Pending])
            .await?
        {
            Some(path) => Ok(Some(Self::read_json(&path).await?)),
            None => Ok(None),
        }
    }

    async fn get_job_request(&self, job_guid: &str) -> TmResult<Option<JobRequest>> {
        match self.find_job_file(job_guid, &[JobState::Req]).await? {
            Some(path) => Ok(Some(Self::read_json(&path).await?)),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tu::TranslationUnit;

    fn request(job_guid: &str, target_lang: &str) -> JobRequest {
        JobRequest {
            job_guid: job_guid.to_string(),
            source_lang: "en".to_string(),
            target_lang: target_lang.to_string(),
            translation_provider: Some("mock".to_string()),
            tus: vec![TranslationUnit::new("g1").with_src("Hello")],
        }
    }

    fn response(request: &JobRequest, status: JobState) -> JobResponse {
        let mut response = JobResponse::for_request(request, status);
        response.ts = Some(1);
        response.tus = vec![
            TranslationUnit::new("g1")
                .with_tgt("Bonjour")
                .with_quality(1),
        ];
        response
    }

    #[tokio::test]
    async fn test_missing_directory_is_an_empty_ledger() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsJobStore::new(dir.path().join("nothing-here"));
        assert!(store.job_status_by_lang_pair("en", "fr").await.unwrap().is_empty());
        assert!(store.get_job("x").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_status_is_most_advanced_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsJobStore::new(dir.path());

        let req_b = request("job-b", "fr");
        store.write_request(&req_b).await.unwrap();
        store.write_response(&response(&req_b, JobState::Pending)).await.unwrap();

        let req_a = request("job-a", "fr");
        store.write_request(&req_a).await.unwrap();
        store.write_response(&response(&req_a, JobState::Pending)).await.unwrap();
        let done = store.write_response(&response(&req_a, JobState::Done)).await.unwrap();

        store.write_request(&request("job-c", "de")).await.unwrap();

        let jobs = store.job_status_by_lang_pair("en", "fr").await.unwrap();
        let summary: Vec<(&str, JobState)> =
            jobs.iter().map(|(guid, s)| (guid.as_str(), s.status)).collect();
        assert_eq!(
            summary,
            vec![("job-a", JobState::Done), ("job-b", JobState::Pending)]
        );
        assert_eq!(jobs[0].1.mtime, mtime_millis(&done).await.unwrap());
        assert!(jobs[0].1.mtime > 0);
    }

    #[tokio::test]
    async fn test_get_job_and_request() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsJobStore::new(dir.path());
        let req = request("job-1", "fr");
        store.write_request(&req).await.unwrap();
        assert!(store.get_job("job-1").await.unwrap().is_none());

        store.write_response(&response(&req, JobState::Pending)).await.unwrap();
        assert_eq!(
            store.get_job("job-1").await.unwrap().unwrap().status,
            JobState::Pending
        );

        store.write_response(&response(&req, JobState::Done)).await.unwrap();
        let job = store.get_job("job-1").await.unwrap().unwrap();
        assert_eq!(job.status, JobState::Done);
        assert_eq!(job.tus.len(), 1);

        let stored_request = store.get_job_request("job-1").await.unwrap().unwrap();
        assert_eq!(stored_request, req);
    }

    #[tokio::test]
    async fn test_foreign_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("notes.txt"), "hi").unwrap();
        std::fs::write(dir.path().join("en_fr_job_x-weird.json"), "{}").unwrap();
        let store = FsJobStore::new(dir.path());
        assert!(store.job_status_by_lang_pair("en", "fr").await.unwrap().is_empty());
    }
}
