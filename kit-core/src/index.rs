//! Staging index
//!
//! The index records what the next commit will contain: one entry per
//! repository-relative path with the blob it stages. Stored as a
//! bincode-encoded file at `<root>/index` and rewritten wholesale on change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::UNIX_EPOCH;

use crate::error::{Error, Result};
use crate::fsutil::atomic_write;
use crate::object::{validate_segment, Blob, EntryMode, Object, ObjectId};
use crate::storage::ObjectStore;

/// On-disk format version
pub const INDEX_VERSION: u32 = 1;

/// Name of the repository directory, never stageable
pub const REPO_DIR_NAME: &str = ".kit";

/// Stat-like information captured when a path is staged
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMeta {
    pub size: u64,
    pub mtime_secs: i64,
    pub mtime_nanos: u32,
}

impl EntryMeta {
    pub fn from_metadata(metadata: &fs::Metadata) -> Self {
        let (mtime_secs, mtime_nanos) = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| (d.as_secs() as i64, d.subsec_nanos()))
            .unwrap_or_default();
        Self {
            size: metadata.len(),
            mtime_secs,
            mtime_nanos,
        }
    }
}

/// A staged path
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexEntry {
    /// Repository-relative, `/`-separated path
    pub path: String,
    /// Blob holding the staged content
    pub id: ObjectId,
    pub mode: EntryMode,
    pub meta: EntryMeta,
}

#[derive(Serialize, Deserialize)]
struct IndexFile {
    version: u32,
    entries: Vec<IndexEntry>,
}

/// Normalize a user-supplied relative path into index form.
///
/// Empty and `.` segments are dropped; `..` and anything inside the
/// repository directory are rejected.
pub fn normalize_path(raw: &str) -> Result<String> {
    let mut segments = Vec::new();
    for segment in raw.split(['/', '\\']) {
        match segment {
            "" | "." => continue,
            ".." => return Err(Error::InvalidPath(format!("{} escapes the worktree", raw))),
            seg => {
                validate_segment(seg)?;
                segments.push(seg);
            }
        }
    }
    match segments.first() {
        None => Err(Error::InvalidPath(format!("{:?} names no file", raw))),
        Some(&REPO_DIR_NAME) => Err(Error::InvalidPath(format!(
            "{} is inside the repository directory",
            raw
        ))),
        Some(_) => Ok(segments.join("/")),
    }
}

/// The full set of staged entries, kept in path order
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Index {
    entries: BTreeMap<String, IndexEntry>,
}

impl Index {
    /// Load the index, or return an empty one if none has been written yet
    pub fn load(path: &Path) -> Result<Self> {
        let data = match fs::read(path) {
            Ok(data) => data,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(e) => return Err(e.into()),
        };
        let file: IndexFile = bincode::deserialize(&data)?;
        if file.version != INDEX_VERSION {
            return Err(Error::Serialization(format!(
                "unsupported index version {}",
                file.version
            )));
        }
        Ok(Self::from_entries(file.entries))
    }

    /// Save the index (atomic: temp + fsync + rename)
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = IndexFile {
            version: INDEX_VERSION,
            entries: self.entries.values().cloned().collect(),
        };
        atomic_write(path, &bincode::serialize(&file)?)
    }

    /// Build an index from entries; later duplicates of a path win
    pub fn from_entries(entries: impl IntoIterator<Item = IndexEntry>) -> Self {
        let mut index = Self::default();
        for entry in entries {
            index.upsert(entry);
        }
        index
    }

    /// Insert or replace the entry for a path.
    ///
    /// Entries that would collide with it as a directory (`a` vs `a/b`) are
    /// dropped so the index always describes a buildable tree.
    pub fn upsert(&mut self, entry: IndexEntry) {
        let mut prefix = entry.path.as_str();
        while let Some((parent, _)) = prefix.rsplit_once('/') {
            self.entries.remove(parent);
            prefix = parent;
        }

        let dir = format!("{}/", entry.path);
        let nested: Vec<String> = self
            .entries
            .range(dir.clone()..)
            .take_while(|(path, _)| path.starts_with(&dir))
            .map(|(path, _)| path.clone())
            .collect();
        for path in nested {
            self.entries.remove(&path);
        }

        self.entries.insert(entry.path.clone(), entry);
    }

    /// Store `content` as a blob and stage it at `path`
    pub fn stage(
        &mut self,
        store: &ObjectStore,
        path: &str,
        content: &[u8],
        mode: EntryMode,
        meta: EntryMeta,
    ) -> Result<ObjectId> {
        let path = normalize_path(path)?;
        let id = store.put(&Object::Blob(Blob::new(content.to_vec())))?;
        tracing::debug!("staged {} as {}", path, id);
        self.upsert(IndexEntry { path, id, mode, meta });
        Ok(id)
    }

    /// Remove a path from the index
    pub fn remove(&mut self, path: &str) -> bool {
        self.entries.remove(path).is_some()
    }

    /// Remove a path and everything staged beneath it; returns how many went
    pub fn remove_recursive(&mut self, path: &str) -> usize {
        let dir = format!("{}/", path);
        let doomed: Vec<String> = self
            .entries
            .keys()
            .filter(|key| key.as_str() == path || key.starts_with(&dir))
            .cloned()
            .collect();
        for key in &doomed {
            self.entries.remove(key);
        }
        doomed.len()
    }

    /// Drop every entry; returns how many there were
    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        removed
    }

    pub fn get(&self, path: &str) -> Option<&IndexEntry> {
        self.entries.get(path)
    }

    pub fn contains(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    /// Iterate entries in path order
    pub fn entries(&self) -> impl Iterator<Item = &IndexEntry> {
        self.entries.values()
    }

    pub fn into_entries(self) -> Vec<IndexEntry> {
        self.entries.into_values().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Read the staged entries in path order; empty when no index exists yet
pub fn read_index(path: &Path) -> Result<Vec<IndexEntry>> {
    Ok(Index::load(path)?.into_entries())
}

/// Persist a full entry set, replacing whatever was staged before.
///
/// Every path must already be in normalized form.
pub fn write_index(path: &Path, entries: &[IndexEntry]) -> Result<()> {
    for entry in entries {
        if normalize_path(&entry.path)? != entry.path {
            return Err(Error::InvalidPath(format!(
                "{:?} is not a normalized index path",
                entry.path
            )));
        }
    }
    Index::from_entries(entries.iter().cloned()).save(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::Compression;
    use tempfile::TempDir;

    fn entry(path: &str, byte: u8) -> IndexEntry {
        IndexEntry {
            path: path.to_string(),
            id: ObjectId::new([byte; 20]),
            mode: EntryMode::File,
            meta: EntryMeta::default(),
        }
    }

    fn paths(index: &Index) -> Vec<&str> {
        index.entries().map(|e| e.path.as_str()).collect()
    }

    #[test]
    fn test_missing_index_is_empty() {
        let dir = TempDir::new().unwrap();
        assert!(read_index(&dir.path().join("index")).unwrap().is_empty());
    }

    #[test]
    fn test_write_and_read() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index");
        write_index(&path, &[entry("z.txt", 1), entry("a.txt", 2)]).unwrap();

        let entries = read_index(&path).unwrap();
        let names: Vec<_> = entries.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(names, ["a.txt", "z.txt"]);
        assert_eq!(entries[1].id, ObjectId::new([1; 20]));
    }

    #[test]
    fn test_upsert_last_write_wins() {
        let mut index = Index::default();
        index.upsert(entry("f", 1));
        index.upsert(entry("f", 2));
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("f").unwrap().id, ObjectId::new([2; 20]));
    }

    #[test]
    fn test_upsert_resolves_directory_conflicts() {
        let mut index = Index::default();
        index.upsert(entry("a", 1));
        index.upsert(entry("a/b", 2));
        assert_eq!(paths(&index), ["a/b"]);

        index.upsert(entry("a/c/d", 3));
        index.upsert(entry("ab", 4));
        index.upsert(entry("a", 5));
        assert_eq!(paths(&index), ["a", "ab"]);
    }

    #[test]
    fn test_stage_stores_blob() {
        let dir = TempDir::new().unwrap();
        let store = ObjectStore::new(dir.path().join("objects"), Compression::default());
        let mut index = Index::default();
        let id = index
            .stage(&store, "./docs//readme.md", b"hi", EntryMode::File, EntryMeta::default())
            .unwrap();
        assert!(store.exists(&id));
        assert_eq!(paths(&index), ["docs/readme.md"]);
        assert_eq!(store.get_blob(&id).unwrap().data, b"hi");
    }

    #[test]
    fn test_remove() {
        let mut index = Index::from_entries([entry("file.txt", 1)]);
        assert!(index.remove("file.txt"));
        assert!(!index.contains("file.txt"));
        assert!(!index.remove("nonexistent"));
    }

    #[test]
    fn test_remove_recursive() {
        let mut index = Index::from_entries([
            entry("src/a.rs", 1),
            entry("src/b/c.rs", 2),
            entry("srcx", 3),
        ]);
        assert_eq!(index.remove_recursive("src"), 2);
        assert_eq!(paths(&index), ["srcx"]);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("a/./b").unwrap(), "a/b");
        assert_eq!(normalize_path("a\\b").unwrap(), "a/b");
        assert!(normalize_path("../x").is_err());
        assert!(normalize_path("").is_err());
        assert!(normalize_path(".kit/HEAD").is_err());
    }

    #[test]
    fn test_write_rejects_unnormalized_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index");
        for bad in ["a//b", "./a", ".kit/HEAD", "../x", "a/"] {
            assert!(
                matches!(write_index(&path, &[entry(bad, 1)]), Err(Error::InvalidPath(_))),
                "{} should be rejected",
                bad
            );
        }
        assert!(!path.exists());
        write_index(&path, &[entry("a/b", 1)]).unwrap();
    }

    #[test]
    fn test_clear() {
        let mut index = Index::from_entries([entry("a", 1), entry("b/c", 2)]);
        assert_eq!(index.clear(), 2);
        assert!(index.is_empty());
    }

    #[test]
    fn test_rejects_unknown_version() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("index");
        let file = IndexFile {
            version: 99,
            entries: Vec::new(),
        };
        fs::write(&path, bincode::serialize(&file).unwrap()).unwrap();
        assert!(matches!(Index::load(&path), Err(Error::Serialization(_))));
    }
}
