//! Job-level provider over a string engine
//!
//! [`MtProvider`] turns a [`MachineTranslator`] into a [`Translator`]:
//!
//! 1. each source is decoded with the glossary (if any) and flattened to the XML
//!    tag form, so the engine only ever sees `<xN>` markup around the words
//! 2. the flattened strings are sent in chunks bounded by string count and total
//!    character length
//! 3. translated strings are mapped back to placeholders and glossary terms are
//!    rendered in the target language

use crate::codec::{PlaceholderMap, extract_xml_v1, flatten_xml_v1};
use crate::mt::error::{MtError, MtResult};
use crate::mt::translator::{MachineTranslator, Translator};
use crate::nstr::Flags;
use crate::pipeline::{Decoder, GlossaryTranslator, decode_normalized_string};
use crate::tu::{JobRequest, JobResponse, JobState, TranslationUnit, TuText};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::ops::Range;
use tracing::{info, warn};

/// A source string ready for the engine
struct Prepared {
    guid: String,
    plain: bool,
    xml: String,
    map: PlaceholderMap,
}

/// Adapts a string engine to the job-level [`Translator`] interface
#[derive(Debug, Clone)]
pub struct MtProvider<T: MachineTranslator> {
    engine: T,
    quality: i64,
    max_chunk_size: usize,
    max_char_length: usize,
    glossary: Option<GlossaryTranslator>,
    language_map: BTreeMap<String, String>,
    fixed_ts: Option<i64>,
}

impl<T: MachineTranslator> MtProvider<T> {
    pub const DEFAULT_MAX_CHUNK_SIZE: usize = 125;
    pub const DEFAULT_MAX_CHAR_LENGTH: usize = 9900;

    pub fn new(engine: T) -> Self {
        MtProvider {
            engine,
            quality: 0,
            max_chunk_size: Self::DEFAULT_MAX_CHUNK_SIZE,
            max_char_length: Self::DEFAULT_MAX_CHAR_LENGTH,
            glossary: None,
            language_map: BTreeMap::new(),
            fixed_ts: None,
        }
    }

    /// Quality stamped on every returned TU
    pub fn with_quality(mut self, quality: i64) -> Self {
        self.quality = quality;
        self
    }

    /// At most `max_chunk_size` strings and fewer than `max_char_length` characters
    /// per engine call
    pub fn with_chunk_limits(mut self, max_chunk_size: usize, max_char_length: usize) -> Self {
        self.max_chunk_size = max_chunk_size.max(1);
        self.max_char_length = max_char_length.max(1);
        self
    }

    pub fn with_glossary(mut self, glossary: GlossaryTranslator) -> Self {
        self.glossary = (!glossary.is_empty()).then_some(glossary);
        self
    }

    /// Ledger language → engine language code
    pub fn with_language_map(mut self, language_map: BTreeMap<String, String>) -> Self {
        self.language_map = language_map;
        self
    }

    /// Stamp every TU with `ts` instead of the wall clock (regression runs)
    pub fn with_fixed_ts(mut self, ts: i64) -> Self {
        self.fixed_ts = Some(ts);
        self
    }

    pub fn engine(&self) -> &T {
        &self.engine
    }

    fn engine_lang<'a>(&'a self, lang: &'a str) -> &'a str {
        self.language_map.get(lang).map_or(lang, String::as_str)
    }

    fn prepare(&self, tu: &TranslationUnit, src: &TuText) -> Prepared {
        let mut nsrc = src.to_normalized();
        if let Some(glossary) = &self.glossary {
            let decoders: [&dyn Decoder; 1] = [glossary];
            nsrc = decode_normalized_string(nsrc, &decoders, &mut Flags::new());
        }
        let (xml, map) = flatten_xml_v1(&nsrc);
        Prepared {
            guid: tu.guid.clone(),
            plain: matches!(src, TuText::Plain(_)),
            xml,
            map,
        }
    }

    /// Split `texts` into consecutive engine calls
    fn chunk_ranges(&self, texts: &[String]) -> MtResult<Vec<Range<usize>>> {
        let mut ranges = Vec::new();
        let mut start = 0;
        let mut chars = 0;
        for (i, text) in texts.iter().enumerate() {
            let len = text.chars().count();
            if len >= self.max_char_length {
                return Err(MtError::TranslationError(format!(
                    "String at index {} has {} characters, chunks must stay under {}",
                    i, len, self.max_char_length
                )));
            }
            if i > start && (i - start >= self.max_chunk_size || chars + len >= self.max_char_length)
            {
                ranges.push(start..i);
                start = i;
                chars = 0;
            }
            chars += len;
        }
        if start < texts.len() {
            ranges.push(start..texts.len());
        }
        Ok(ranges)
    }

    async fn translate_job(&self, request: &JobRequest) -> MtResult<JobResponse> {
        let source_lang = self.engine_lang(&request.source_lang);
        let target_lang = self.engine_lang(&request.target_lang);

        let mut prepared = Vec::with_capacity(request.tus.len());
        for tu in &request.tus {
            match &tu.src {
                Some(src) => prepared.push(self.prepare(tu, src)),
                None => warn!(
                    "Skipping TU {} of job {} without source",
                    tu.guid, request.job_guid
                ),
            }
        }
        let texts: Vec<String> = prepared.iter().map(|p| p.xml.clone()).collect();

        let chunks = self.chunk_ranges(&texts)?;
        let mut translated = Vec::with_capacity(texts.len());
        for (i, range) in chunks.iter().enumerate() {
            info!(
                "Preparing chunk {}/{} with {} strings for {} ({} -> {})",
                i + 1,
                chunks.len(),
                range.len(),
                self.name(),
                source_lang,
                target_lang
            );
            let batch = self
                .engine
                .translate_batch(&texts[range.clone()], source_lang, target_lang)
                .await?;
            if batch.len() != range.len() {
                return Err(MtError::TranslationError(format!(
                    "Expected {} translations, engine returned {}",
                    range.len(),
                    batch.len()
                )));
            }
            translated.extend(batch);
        }

        let ts = self
            .fixed_ts
            .unwrap_or_else(|| Utc::now().timestamp_millis());
        let flags = Flags::for_target(&request.target_lang);
        let mut response = JobResponse::for_request(request, JobState::Done);
        response.ts = Some(ts);
        response.translation_provider = Some(self.name().to_string());
        for (source, text) in prepared.into_iter().zip(translated) {
            let mut ntgt = extract_xml_v1(&text, &source.map)?;
            if let Some(glossary) = &self.glossary {
                ntgt = glossary.restore(ntgt, &flags);
            }
            let tgt = if source.plain {
                TuText::Plain(ntgt.to_string())
            } else {
                TuText::Normalized(ntgt)
            };
            response.tus.push(
                TranslationUnit::new(source.guid)
                    .with_tgt(tgt)
                    .with_quality(self.quality)
                    .with_ts(ts),
            );
        }
        Ok(response)
    }
}

#[async_trait]
impl<T: MachineTranslator> Translator for MtProvider<T> {
    fn name(&self) -> &str {
        self.engine.provider_name()
    }

    async fn request_translations(&self, request: &JobRequest) -> MtResult<JobResponse> {
        self.translate_job(request)
            .await
            .map_err(|e| MtError::provider_failed(self.name(), e))
    }
}
