//! Translation units and job records
//!
//! These are the records exchanged with the job ledger and stored in the TM. On the
//! wire a TU carries either a plain `src`/`tgt` string or a normalized `nsrc`/`ntgt`
//! part list; in memory that choice is the [`TuText`] sum type.

use crate::codec::{
    CodecError, CodecResult, flatten_to_mini_v1, flatten_to_ordinal, flatten_v1,
    source_and_target_are_compatible,
};
use crate::notes::Notes;
use crate::nstr::NormalizedString;
use crate::tm::{TmError, TmResult};
use icu_locale::Locale;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

/// Source or target content of a TU
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TuText {
    Plain(String),
    Normalized(NormalizedString),
}

impl TuText {
    /// Content-index key: literal text with placeholders reduced to their kind
    pub fn flatten_ordinal(&self) -> String {
        match self {
            TuText::Plain(text) => text.clone(),
            TuText::Normalized(nstr) => flatten_to_ordinal(nstr),
        }
    }

    pub fn to_normalized(&self) -> NormalizedString {
        match self {
            TuText::Plain(text) => NormalizedString::from_text(text.as_str()),
            TuText::Normalized(nstr) => nstr.clone(),
        }
    }

    pub fn as_normalized(&self) -> Option<&NormalizedString> {
        match self {
            TuText::Normalized(nstr) => Some(nstr),
            TuText::Plain(_) => None,
        }
    }

    /// Compare by minified-`v1` flattening, so renamed placeholder values do not count
    /// as a content change
    pub fn same_content(&self, other: &TuText) -> bool {
        self.mini_v1() == other.mini_v1()
    }

    fn mini_v1(&self) -> String {
        match self {
            TuText::Plain(text) => text.clone(),
            TuText::Normalized(nstr) => flatten_to_mini_v1(nstr),
        }
    }
}

impl From<&str> for TuText {
    fn from(text: &str) -> Self {
        TuText::Plain(text.to_string())
    }
}

impl From<String> for TuText {
    fn from(text: String) -> Self {
        TuText::Plain(text)
    }
}

impl From<NormalizedString> for TuText {
    fn from(nstr: NormalizedString) -> Self {
        TuText::Normalized(nstr)
    }
}

impl fmt::Display for TuText {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TuText::Plain(text) => f.write_str(text),
            TuText::Normalized(nstr) => nstr.fmt(f),
        }
    }
}

/// A translation unit
///
/// `guid` is computed upstream and never changes. Fields outside the stored schema
/// are kept in `extra` until the TU is written to a TM.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "TuRecord", into = "TuRecord")]
pub struct TranslationUnit {
    pub guid: String,
    pub rid: Option<String>,
    pub sid: Option<String>,
    pub prj: Option<String>,
    pub seq: Option<i64>,
    pub src: Option<TuText>,
    pub tgt: Option<TuText>,
    pub notes: Option<Notes>,
    /// Quality rank, higher wins
    pub q: Option<i64>,
    /// Update time in milliseconds since the epoch
    pub ts: Option<i64>,
    pub job_guid: Option<String>,
    pub inflight: bool,
    pub extra: BTreeMap<String, Value>,
}

#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TuRecord {
    #[serde(default)]
    guid: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    rid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    sid: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    prj: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    seq: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    src: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    nsrc: Option<NormalizedString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tgt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ntgt: Option<NormalizedString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    notes: Option<Notes>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    q: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    job_guid: Option<String>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    inflight: bool,
    #[serde(flatten)]
    extra: BTreeMap<String, Value>,
}

fn split_text(text: Option<TuText>) -> (Option<String>, Option<NormalizedString>) {
    match text {
        Some(TuText::Plain(text)) => (Some(text), None),
        Some(TuText::Normalized(nstr)) => (None, Some(nstr)),
        None => (None, None),
    }
}

fn join_text(plain: Option<String>, normalized: Option<NormalizedString>) -> Option<TuText> {
    normalized
        .map(TuText::Normalized)
        .or(plain.map(TuText::Plain))
}

impl From<TuRecord> for TranslationUnit {
    fn from(record: TuRecord) -> Self {
        TranslationUnit {
            guid: record.guid,
            rid: record.rid,
            sid: record.sid,
            prj: record.prj,
            seq: record.seq,
            src: join_text(record.src, record.nsrc),
            tgt: join_text(record.tgt, record.ntgt),
            notes: record.notes,
            q: record.q,
            ts: record.ts,
            job_guid: record.job_guid,
            inflight: record.inflight,
            extra: record.extra,
        }
    }
}

impl From<TranslationUnit> for TuRecord {
    fn from(tu: TranslationUnit) -> Self {
        let (src, nsrc) = split_text(tu.src);
        let (tgt, ntgt) = split_text(tu.tgt);
        TuRecord {
            guid: tu.guid,
            rid: tu.rid,
            sid: tu.sid,
            prj: tu.prj,
            seq: tu.seq,
            src,
            nsrc,
            tgt,
            ntgt,
            notes: tu.notes,
            q: tu.q,
            ts: tu.ts,
            job_guid: tu.job_guid,
            inflight: tu.inflight,
            extra: tu.extra,
        }
    }
}

fn replace_if_some<T>(field: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *field = value;
    }
}

impl TranslationUnit {
    pub fn new(guid: impl Into<String>) -> Self {
        TranslationUnit {
            guid: guid.into(),
            ..Default::default()
        }
    }

    pub fn with_src(mut self, src: impl Into<TuText>) -> Self {
        self.src = Some(src.into());
        self
    }

    pub fn with_tgt(mut self, tgt: impl Into<TuText>) -> Self {
        self.tgt = Some(tgt.into());
        self
    }

    pub fn with_quality(mut self, q: i64) -> Self {
        self.q = Some(q);
        self
    }

    pub fn with_ts(mut self, ts: i64) -> Self {
        self.ts = Some(ts);
        self
    }

    /// Layer `other` on top of `self`: every field `other` carries replaces ours
    pub fn overlay(mut self, other: TranslationUnit) -> Self {
        if !other.guid.is_empty() {
            self.guid = other.guid;
        }
        replace_if_some(&mut self.rid, other.rid);
        replace_if_some(&mut self.sid, other.sid);
        replace_if_some(&mut self.prj, other.prj);
        replace_if_some(&mut self.seq, other.seq);
        replace_if_some(&mut self.src, other.src);
        replace_if_some(&mut self.tgt, other.tgt);
        replace_if_some(&mut self.notes, other.notes);
        replace_if_some(&mut self.q, other.q);
        replace_if_some(&mut self.ts, other.ts);
        replace_if_some(&mut self.job_guid, other.job_guid);
        self.inflight |= other.inflight;
        self.extra.extend(other.extra);
        self
    }

    /// Copy the fields that always follow the current source content
    pub fn refresh_from_source(&mut self, source: &TranslationUnit) {
        replace_if_some(&mut self.src, source.src.clone());
        replace_if_some(&mut self.rid, source.rid.clone());
        replace_if_some(&mut self.sid, source.sid.clone());
        replace_if_some(&mut self.prj, source.prj.clone());
        replace_if_some(&mut self.seq, source.seq);
        replace_if_some(&mut self.notes, source.notes.clone());
    }

    /// Check the mandatory fields of a stored entry
    ///
    /// # Errors
    ///
    /// [`TmError::InvalidEntry`] when the guid is empty, the quality is missing, or the
    /// entry has neither a timestamped target nor the in-flight mark.
    pub fn validate(&self) -> TmResult<()> {
        let reason = if self.guid.is_empty() {
            Some("missing guid")
        } else if self.q.is_none() {
            Some("missing quality")
        } else if !(self.inflight || (self.ts.is_some() && self.tgt.is_some())) {
            Some("missing timestamp or target and not in flight")
        } else {
            None
        };
        match reason {
            Some(reason) => Err(TmError::InvalidEntry {
                guid: self.guid.clone(),
                reason: reason.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Whether the target carries exactly the placeholders of the source
    ///
    /// Missing source or target is never compatible; plain strings are compared as
    /// single literal runs.
    pub fn is_compatible(&self) -> bool {
        match (&self.src, &self.tgt) {
            (Some(src), Some(tgt)) => {
                source_and_target_are_compatible(&src.to_normalized(), &tgt.to_normalized())
            }
            _ => false,
        }
    }

    /// Give every target placeholder the `v1` of the source placeholder with the same
    /// value, first in first out. No-op unless some target placeholder lacks `v1`.
    ///
    /// # Errors
    ///
    /// [`CodecError::PlaceholderMismatch`] for a target placeholder with no remaining
    /// source counterpart.
    pub fn backfill_target_v1(&mut self) -> CodecResult<()> {
        let (Some(TuText::Normalized(nsrc)), Some(TuText::Normalized(ntgt))) =
            (&self.src, &mut self.tgt)
        else {
            return Ok(());
        };
        if ntgt.placeholders().all(|ph| ph.v1.is_some()) {
            return Ok(());
        }
        let mut lookup: HashMap<String, VecDeque<String>> = HashMap::new();
        for (token, ph) in flatten_v1(nsrc).1 {
            lookup.entry(ph.value).or_default().push_back(token);
        }
        for ph in ntgt.placeholders_mut() {
            let v1 = lookup
                .get_mut(&ph.value)
                .and_then(VecDeque::pop_front)
                .ok_or_else(|| CodecError::PlaceholderMismatch(ph.value.clone()))?;
            ph.v1 = Some(v1);
        }
        Ok(())
    }

    /// The TU as stored in a TM: unknown fields dropped, target `v1` back-filled
    pub fn whitelisted(mut self) -> CodecResult<Self> {
        self.extra.clear();
        self.backfill_target_v1()?;
        Ok(self)
    }
}

/// Lifecycle state of a translation job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Request written, not yet sent
    Req,
    /// Accepted by an asynchronous vendor, results pending
    Pending,
    Done,
    Blocked,
}

impl JobState {
    /// Whether jobs in this state feed the TM
    pub fn is_tracked(self) -> bool {
        matches!(self, JobState::Pending | JobState::Done)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            JobState::Req => "req",
            JobState::Pending => "pending",
            JobState::Done => "done",
            JobState::Blocked => "blocked",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Job status as recorded by the ledger and mirrored in the TM
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobStatus {
    pub status: JobState,
    /// Modification time of the job body in milliseconds
    pub mtime: i64,
}

/// What was sent to a translation collaborator
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRequest {
    pub job_guid: String,
    pub source_lang: String,
    pub target_lang: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_provider: Option<String>,
    #[serde(default)]
    pub tus: Vec<TranslationUnit>,
}

impl JobRequest {
    pub fn tu(&self, guid: &str) -> Option<&TranslationUnit> {
        self.tus.iter().find(|tu| tu.guid == guid)
    }
}

/// What a translation collaborator returned
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobResponse {
    pub job_guid: String,
    pub source_lang: String,
    pub target_lang: String,
    pub status: JobState,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub translation_provider: Option<String>,
    #[serde(default)]
    pub tus: Vec<TranslationUnit>,
    /// Guids still awaiting a translation
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub inflight: Vec<String>,
}

impl JobResponse {
    /// An empty response echoing the identity of `request`
    pub fn for_request(request: &JobRequest, status: JobState) -> Self {
        JobResponse {
            job_guid: request.job_guid.clone(),
            source_lang: request.source_lang.clone(),
            target_lang: request.target_lang.clone(),
            status,
            ts: None,
            translation_provider: request.translation_provider.clone(),
            tus: Vec::new(),
            inflight: Vec::new(),
        }
    }
}

/// A (sourceLang, targetLang) pair with both tags validated
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LangPair {
    pub source_lang: String,
    pub target_lang: String,
}

impl LangPair {
    /// # Errors
    ///
    /// [`TmError::InvalidLanguage`] if either tag is not a valid BCP-47 locale.
    pub fn new(source_lang: &str, target_lang: &str) -> TmResult<Self> {
        for lang in [source_lang, target_lang] {
            lang.parse::<Locale>()
                .map_err(|e| TmError::InvalidLanguage(format!("{}: {}", lang, e)))?;
        }
        Ok(LangPair {
            source_lang: source_lang.to_string(),
            target_lang: target_lang.to_string(),
        })
    }

    /// `tmCache_<src>_<tgt>.json`
    pub fn tm_file_name(&self) -> String {
        format!("tmCache_{}_{}.json", self.source_lang, self.target_lang)
    }
}

impl fmt::Display for LangPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} -> {}", self.source_lang, self.target_lang)
    }
}
