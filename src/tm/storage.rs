//! TM persistence backends

use super::{TmFile, TmResult};
use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tracing::debug;

/// Where TM files live
///
/// `load` returns `Ok(None)` for a TM that was never written.
pub trait TmStorage: Send + Sync {
    fn load(&self, file_name: &str) -> TmResult<Option<TmFile>>;
    fn save(&self, file_name: &str, tm: &TmFile) -> TmResult<()>;
}

/// Tab-indented JSON, the on-disk TM format
pub fn to_pretty_json(tm: &TmFile) -> TmResult<String> {
    let mut buf = Vec::new();
    let mut serializer =
        serde_json::Serializer::with_formatter(&mut buf, PrettyFormatter::with_indent(b"\t"));
    tm.serialize(&mut serializer)?;
    // serde_json only ever writes UTF-8
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// TM files in a directory on disk
#[derive(Debug, Clone)]
pub struct FsTmStorage {
    dir: PathBuf,
}

impl FsTmStorage {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FsTmStorage { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path(&self, file_name: &str) -> PathBuf {
        self.dir.join(file_name)
    }
}

impl TmStorage for FsTmStorage {
    fn load(&self, file_name: &str) -> TmResult<Option<TmFile>> {
        let path = self.path(file_name);
        if !path.exists() {
            debug!("No TM at {}", path.display());
            return Ok(None);
        }
        debug!("Loading TM from {}", path.display());
        let content = std::fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&content)?))
    }

    fn save(&self, file_name: &str, tm: &TmFile) -> TmResult<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path(file_name), to_pretty_json(tm)?)?;
        Ok(())
    }
}

/// In-process storage that counts writes
#[derive(Debug, Default)]
pub struct MemoryTmStorage {
    files: Mutex<HashMap<String, String>>,
    writes: AtomicUsize,
}

impl MemoryTmStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of `save` calls so far
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    /// Raw content of a stored file
    pub fn raw(&self, file_name: &str) -> Option<String> {
        self.files
            .lock()
            .ok()
            .and_then(|files| files.get(file_name).cloned())
    }

    /// Seed a file with arbitrary content
    pub fn insert_raw(&self, file_name: &str, content: impl Into<String>) {
        if let Ok(mut files) = self.files.lock() {
            files.insert(file_name.to_string(), content.into());
        }
    }
}

impl TmStorage for MemoryTmStorage {
    fn load(&self, file_name: &str) -> TmResult<Option<TmFile>> {
        match self.raw(file_name) {
            Some(content) => Ok(Some(serde_json::from_str(&content)?)),
            None => Ok(None),
        }
    }

    fn save(&self, file_name: &str, tm: &TmFile) -> TmResult<()> {
        let content = to_pretty_json(tm)?;
        self.insert_raw(file_name, content);
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tu::{LangPair, TranslationUnit};

    fn tm_file() -> TmFile {
        let pair = LangPair::new("en", "fr").unwrap();
        let mut file = TmFile::empty(&pair, "seal");
        let tu = TranslationUnit::new("g1")
            .with_src("Hello")
            .with_tgt("Bonjour")
            .with_quality(1)
            .with_ts(7);
        file.tus.insert(tu.guid.clone(), tu);
        file
    }

    #[test]
    fn test_pretty_json_uses_tabs() {
        let json = to_pretty_json(&tm_file()).unwrap();
        assert!(json.starts_with("{\n\t\"sourceLang\": \"en\""));
        assert!(json.contains("\n\t\t\"g1\": {\n\t\t\t\"guid\": \"g1\""));
    }

    #[test]
    fn test_fs_storage_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = FsTmStorage::new(dir.path().join("tm"));
        assert!(storage.load("tmCache_en_fr.json").unwrap().is_none());

        storage.save("tmCache_en_fr.json", &tm_file()).unwrap();
        assert!(dir.path().join("tm/tmCache_en_fr.json").exists());
        let loaded = storage.load("tmCache_en_fr.json").unwrap().unwrap();
        assert_eq!(loaded, tm_file());
    }

    #[test]
    fn test_fs_storage_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("tmCache_en_fr.json"), "{not json").unwrap();
        let storage = FsTmStorage::new(dir.path());
        assert!(matches!(
            storage.load("tmCache_en_fr.json"),
            Err(crate::tm::TmError::Json(_))
        ));
    }

    #[test]
    fn test_memory_storage_counts_writes() {
        let storage = MemoryTmStorage::new();
        storage.save("a.json", &tm_file()).unwrap();
        storage.save("a.json", &tm_file()).unwrap();
        assert_eq!(storage.writes(), 2);
        assert_eq!(storage.load("a.json").unwrap(), Some(tm_file()));
    }
}
