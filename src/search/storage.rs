//! JSON index file.
//!
//! File format:
//!
//! ```json
//! {"version": "1.0", "total_chunks": 2, "chunks": [{"page_url": ..., "embedding": [...]}, ...]}
//! ```
//!
//! Only chunks and their embeddings are persisted; the keyword index is
//! rebuilt on load by replaying the chunks through
//! [`VectorIndex::add_chunks`].

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::search::index::{PageChunk, VectorIndex};

/// Current file format version
pub const INDEX_VERSION: &str = "1.0";

#[derive(Debug, thiserror::Error)]
pub enum IndexFileError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed index file: {0}")]
    Malformed(String),

    #[error("unsupported index version {0:?}, expected \"1.0\"")]
    UnsupportedVersion(String),
}

#[derive(Serialize)]
struct IndexFileRef<'a> {
    version: &'static str,
    total_chunks: usize,
    chunks: &'a [PageChunk],
}

#[derive(Deserialize)]
struct IndexFile {
    total_chunks: usize,
    chunks: Vec<PageChunk>,
}

pub struct IndexStorage {
    path: PathBuf,
}

impl IndexStorage {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    pub fn load(&self) -> Result<VectorIndex, IndexFileError> {
        let data = std::fs::read(&self.path)?;

        let value: serde_json::Value = serde_json::from_slice(&data)
            .map_err(|e| IndexFileError::Malformed(e.to_string()))?;

        match value.get("version") {
            Some(serde_json::Value::String(version)) if version == INDEX_VERSION => {}
            Some(serde_json::Value::String(version)) => {
                return Err(IndexFileError::UnsupportedVersion(version.clone()))
            }
            Some(other) => return Err(IndexFileError::UnsupportedVersion(other.to_string())),
            None => return Err(IndexFileError::Malformed("missing field `version`".to_string())),
        }

        let file: IndexFile =
            serde_json::from_value(value).map_err(|e| IndexFileError::Malformed(e.to_string()))?;

        if file.total_chunks != file.chunks.len() {
            return Err(IndexFileError::Malformed(format!(
                "total_chunks is {} but file holds {} chunks",
                file.total_chunks,
                file.chunks.len()
            )));
        }

        let mut index = VectorIndex::new();
        index.add_chunks(file.chunks);

        log::info!("index loaded path={} chunks={}", self.path.display(), index.len());
        Ok(index)
    }

    /// Uses atomic write: temp file -> rename
    pub fn save(&self, index: &VectorIndex) -> Result<(), IndexFileError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let file = IndexFileRef {
            version: INDEX_VERSION,
            total_chunks: index.len(),
            chunks: index.chunks(),
        };
        let data =
            serde_json::to_vec(&file).map_err(|e| IndexFileError::Malformed(e.to_string()))?;

        let temp_path = self.path.with_extension("tmp");
        if let Err(e) = std::fs::write(&temp_path, &data) {
            let _ = std::fs::remove_file(&temp_path);
            return Err(e.into());
        }
        std::fs::rename(&temp_path, &self.path)?;

        log::info!("index saved path={} chunks={}", self.path.display(), index.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn sample_index() -> VectorIndex {
        let mut index = VectorIndex::new();
        index.add_chunks(vec![
            PageChunk {
                page_url: "/guide/".to_string(),
                title: "Guide".to_string(),
                text: "## Setup\nInstall the plugin and enable search.".to_string(),
                embedding: vec![0.25, -0.5, 1.0],
                start_pos: 0,
                end_pos: 46,
                section: Some("Setup".to_string()),
                metadata: BTreeMap::new(),
            },
            PageChunk {
                page_url: "/api/".to_string(),
                title: "API".to_string(),
                text: "The search endpoint returns ranked chunks.".to_string(),
                embedding: vec![0.1, 0.2, 0.3],
                start_pos: 10,
                end_pos: 52,
                section: None,
                metadata: BTreeMap::from([("lang".to_string(), "en".to_string())]),
            },
        ]);
        index
    }

    #[test]
    fn test_save_and_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = IndexStorage::new(dir.path().join("nested/search_index.json"));
        let index = sample_index();

        storage.save(&index).unwrap();
        assert!(storage.exists());

        let loaded = storage.load().unwrap();
        assert_eq!(loaded.chunks(), index.chunks());
        assert_eq!(loaded.stats(), index.stats());
    }

    #[test]
    fn test_loaded_index_is_searchable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        sample_index().save(&path).unwrap();

        let loaded = VectorIndex::load(&path).unwrap();
        let results = loaded.search_with_embedding("endpoint", None, 5, 0.5);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].page_url, "/api/");
    }

    #[test]
    fn test_file_layout() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        sample_index().save(&path).unwrap();

        let value: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert_eq!(value["version"], "1.0");
        assert_eq!(value["total_chunks"], 2);
        assert_eq!(value["chunks"][0]["section"], "Setup");
        assert!(value["chunks"][1]["section"].is_null());
        assert!(value["chunks"][0].get("metadata").is_none());
        assert_eq!(value["chunks"][1]["metadata"]["lang"], "en");
    }

    #[test]
    fn test_missing_fields_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(
            &path,
            r#"{"version": "1.0", "total_chunks": 1, "chunks": [{"page_url": "/a/", "text": "x"}]}"#,
        )
        .unwrap();

        let err = IndexStorage::new(path).load().unwrap_err();
        assert!(matches!(err, IndexFileError::Malformed(_)));
    }

    #[test]
    fn test_count_mismatch_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, r#"{"version": "1.0", "total_chunks": 3, "chunks": []}"#).unwrap();

        assert!(matches!(
            IndexStorage::new(path).load(),
            Err(IndexFileError::Malformed(_))
        ));
    }

    #[test]
    fn test_unknown_version_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, r#"{"version": "2.0", "total_chunks": 0, "chunks": []}"#).unwrap();

        assert!(matches!(
            IndexStorage::new(path).load(),
            Err(IndexFileError::UnsupportedVersion(v)) if v == "2.0"
        ));
    }

    #[test]
    fn test_not_json_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.json");
        std::fs::write(&path, "not json").unwrap();

        assert!(matches!(
            IndexStorage::new(path).load(),
            Err(IndexFileError::Malformed(_))
        ));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = IndexStorage::new(dir.path().join("absent.json"));
        assert!(matches!(storage.load(), Err(IndexFileError::Io(_))));
    }
}
