//! Result-set cache - last known good descriptions on disk
//!
//! One pretty-printed JSON file per object under `<content root>/ResultSets`.
//! Writes go to a temp file in the same directory and are renamed into
//! place, so readers see either the old or the new file, never a partial one.
//! Loaded and saved entries are also kept in memory until invalidated.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{MetadataError, Result};
use crate::types::{ObjectName, ResultSet};

const CACHE_EXTENSION: &str = "json";

/// On-disk result-set cache with an in-process read-through layer.
#[derive(Debug)]
pub struct ResultSetCache {
    dir: PathBuf,
    memo: Option<RwLock<HashMap<ObjectName, ResultSet>>>,
}

impl ResultSetCache {
    /// Cache rooted at `dir` (usually `<content root>/ResultSets`).
    ///
    /// The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>, memoize: bool) -> Self {
        Self {
            dir: dir.into(),
            memo: memoize.then(|| RwLock::new(HashMap::new())),
        }
    }

    /// Cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File that holds the entry for `name`.
    pub fn path_for(&self, name: &ObjectName) -> PathBuf {
        self.dir
            .join(format!("{}.{}", name.cache_file_stem(), CACHE_EXTENSION))
    }

    /// True when an entry for `name` exists on disk.
    pub fn contains(&self, name: &ObjectName) -> bool {
        self.path_for(name).is_file()
    }

    /// Persist `result_set` as the entry for `name`, replacing any previous one.
    pub fn save(&self, name: &ObjectName, result_set: &ResultSet) -> Result<PathBuf> {
        let path = self.path_for(name);

        fs::create_dir_all(&self.dir).map_err(|source| MetadataError::CacheWrite {
            path: self.dir.clone(),
            source,
        })?;

        let json = serde_json::to_string_pretty(result_set).map_err(MetadataError::Serialization)?;

        let write_err = |source| MetadataError::CacheWrite {
            path: path.clone(),
            source,
        };
        let mut tmp = NamedTempFile::new_in(&self.dir).map_err(write_err)?;
        tmp.write_all(json.as_bytes()).map_err(write_err)?;
        tmp.as_file().sync_all().map_err(write_err)?;
        tmp.persist(&path).map_err(|e| write_err(e.error))?;

        if let Some(memo) = &self.memo {
            if let Ok(mut map) = memo.write() {
                map.insert(name.clone(), result_set.clone());
            }
        }

        debug!(object = %name, path = %path.display(), fields = result_set.len(), "Cached result set");
        Ok(path)
    }

    /// Load the entry for `name`, from memory if it was seen before.
    pub fn load(&self, name: &ObjectName) -> Result<ResultSet> {
        if let Some(hit) = self.memoized(name) {
            return Ok(hit);
        }

        let path = self.path_for(name);
        let json = fs::read_to_string(&path).map_err(|source| MetadataError::CacheRead {
            path: path.clone(),
            source,
        })?;
        let result_set: ResultSet =
            serde_json::from_str(&json).map_err(|source| MetadataError::CacheParse {
                path: path.clone(),
                source,
            })?;

        if let Some(memo) = &self.memo {
            if let Ok(mut map) = memo.write() {
                map.insert(name.clone(), result_set.clone());
            }
        }

        debug!(object = %name, path = %path.display(), fields = result_set.len(), "Loaded cached result set");
        Ok(result_set)
    }

    /// Forget the in-memory copy of `name`. The file is left alone.
    pub fn invalidate(&self, name: &ObjectName) {
        if let Some(memo) = &self.memo {
            if let Ok(mut map) = memo.write() {
                map.remove(name);
            }
        }
    }

    /// Forget all in-memory copies.
    pub fn invalidate_all(&self) {
        if let Some(memo) = &self.memo {
            if let Ok(mut map) = memo.write() {
                map.clear();
            }
        }
    }

    /// Objects with an entry on disk, sorted by name.
    ///
    /// Files whose names are not cache keys are skipped.
    pub fn list(&self) -> Result<Vec<ObjectName>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(MetadataError::CacheRead {
                    path: self.dir.clone(),
                    source,
                })
            }
        };

        let mut names: Vec<ObjectName> = entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some(CACHE_EXTENSION))
            .filter_map(|path| {
                path.file_stem()
                    .and_then(|s| s.to_str())
                    .and_then(ObjectName::from_cache_file_stem)
            })
            .collect();
        names.sort();
        Ok(names)
    }

    fn memoized(&self, name: &ObjectName) -> Option<ResultSet> {
        let memo = self.memo.as_ref()?;
        let map = memo.read().ok()?;
        map.get(name).cloned()
    }
}
