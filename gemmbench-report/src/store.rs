//! Document Store
//!
//! File-backed collections of result documents. Each collection lives in
//! `<root>/<name>.json` as a JSON array; upserts replace documents by `id`.

use gemmbench_core::ResultRow;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("invalid collection name '{0}'")]
    InvalidCollection(String),

    #[error("store I/O error on {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("corrupt collection {path}: {source}")]
    Corrupt {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to serialize collection {collection}: {source}")]
    Serialize {
        collection: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Counts from an upsert.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertStats {
    pub inserted: usize,
    pub replaced: usize,
}

/// Destination for result documents.
pub trait ResultStore {
    /// Insert or replace documents by id.
    fn upsert(&self, collection: &str, rows: &[ResultRow]) -> Result<UpsertStats, StoreError>;

    /// All documents of a collection. A missing collection is empty.
    fn load(&self, collection: &str) -> Result<Vec<ResultRow>, StoreError>;
}

/// Store keeping one JSON file per collection under a root directory.
#[derive(Debug, Clone)]
pub struct DocumentStore {
    root: PathBuf,
}

impl DocumentStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_path(&self, collection: &str) -> Result<PathBuf, StoreError> {
        validate_collection(collection)?;
        Ok(self.root.join(format!("{}.json", collection)))
    }
}

/// Collection names become file names, so only `[A-Za-z0-9_.-]` is allowed.
pub fn validate_collection(name: &str) -> Result<(), StoreError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'));
    if valid {
        Ok(())
    } else {
        Err(StoreError::InvalidCollection(name.to_string()))
    }
}

impl ResultStore for DocumentStore {
    fn upsert(&self, collection: &str, rows: &[ResultRow]) -> Result<UpsertStats, StoreError> {
        let path = self.collection_path(collection)?;
        let mut documents = self.load(collection)?;

        let mut index: HashMap<String, usize> = documents
            .iter()
            .enumerate()
            .map(|(i, doc)| (doc.id.clone(), i))
            .collect();

        let mut stats = UpsertStats::default();
        for row in rows {
            match index.get(&row.id) {
                Some(&i) => {
                    documents[i] = row.clone();
                    stats.replaced += 1;
                }
                None => {
                    index.insert(row.id.clone(), documents.len());
                    documents.push(row.clone());
                    stats.inserted += 1;
                }
            }
            tracing::debug!(collection, id = %row.id, "upserted document");
        }

        let io_err = |source: std::io::Error| StoreError::Io {
            path: path.display().to_string(),
            source,
        };
        std::fs::create_dir_all(&self.root).map_err(io_err)?;

        let json = serde_json::to_string_pretty(&documents).map_err(|source| {
            StoreError::Serialize {
                collection: collection.to_string(),
                source,
            }
        })?;

        // Write beside the target and rename so readers never see a partial file.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, json).map_err(io_err)?;
        std::fs::rename(&tmp, &path).map_err(io_err)?;

        Ok(stats)
    }

    fn load(&self, collection: &str) -> Result<Vec<ResultRow>, StoreError> {
        let path = self.collection_path(collection)?;
        let content = match std::fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        serde_json::from_str(&content).map_err(|source| StoreError::Corrupt {
            path: path.display().to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::row;

    #[test]
    fn missing_collection_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        assert!(store.load("rocblas").unwrap().is_empty());
    }

    #[test]
    fn upsert_inserts_then_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path().join("nested"));

        let first = vec![row("aaa", 1024, 10.0), row("aaa", 2048, 20.0)];
        let stats = store.upsert("rocblas", &first).unwrap();
        assert_eq!(stats, UpsertStats { inserted: 2, replaced: 0 });

        let rerun = vec![row("aaa", 1024, 12.0), row("bbb", 1024, 11.0)];
        let stats = store.upsert("rocblas", &rerun).unwrap();
        assert_eq!(stats, UpsertStats { inserted: 1, replaced: 1 });

        let docs = store.load("rocblas").unwrap();
        assert_eq!(docs.len(), 3);
        let replaced = docs.iter().find(|d| d.id == rerun[0].id).unwrap();
        assert_eq!(replaced.tflops, 12.0);
        assert!(!dir.path().join("nested/rocblas.json.tmp").exists());
    }

    #[test]
    fn collections_are_isolated() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        store.upsert("cutlass", &[row("aaa", 64, 1.0)]).unwrap();
        assert!(store.load("cublas").unwrap().is_empty());
        assert_eq!(store.load("cutlass").unwrap().len(), 1);
    }

    #[test]
    fn rejects_path_like_names() {
        let dir = tempfile::tempdir().unwrap();
        let store = DocumentStore::new(dir.path());
        for name in ["", "../escape", "a/b", ".hidden", "with space"] {
            assert!(matches!(
                store.load(name),
                Err(StoreError::InvalidCollection(_))
            ));
        }
        assert!(validate_collection("composable_kernel").is_ok());
        assert!(validate_collection("nightly-2024.03").is_ok());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();
        let store = DocumentStore::new(dir.path());
        assert!(matches!(store.load("broken"), Err(StoreError::Corrupt { .. })));
    }

    #[test]
    fn write_failures_are_not_reported_as_corruption() {
        let source = serde_json::from_str::<u8>("x").unwrap_err();
        let err = StoreError::Serialize {
            collection: "rocblas".to_string(),
            source,
        };
        assert!(err.to_string().starts_with("failed to serialize collection rocblas"));
        assert!(!matches!(err, StoreError::Corrupt { .. }));
    }
}
