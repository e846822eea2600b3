//! Content-addressed object storage
//!
//! Objects live one per file under `objects/<hash[0..2]>/<hash[2..]>`, the
//! same loose layout git uses. Files are written once through a temp file and
//! a rename, and are never modified afterwards.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::object::{Blob, Commit, Object, ObjectId, Tree, HEX_LEN};

/// Magic number that opens every zstd frame
const ZSTD_MAGIC: [u8; 4] = [0x28, 0xb5, 0x2f, 0xfd];

/// Shortest prefix accepted by [`ObjectStore::resolve_prefix`]
pub const MIN_PREFIX_LEN: usize = 4;

/// On-disk compression for object files
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "codec", rename_all = "lowercase")]
pub enum Compression {
    None,
    Zstd { level: i32 },
}

impl Default for Compression {
    fn default() -> Self {
        Compression::Zstd { level: 3 }
    }
}

impl Compression {
    fn compress(&self, data: Vec<u8>) -> Result<Vec<u8>> {
        match self {
            Compression::None => Ok(data),
            Compression::Zstd { level } => Ok(zstd::encode_all(data.as_slice(), *level)?),
        }
    }
}

/// Undo whatever compression an object file was written with.
///
/// Framed objects start with an ASCII type tag, so a zstd magic number at the
/// front can only mean a compressed file.
fn decompress(raw: Vec<u8>) -> Result<Vec<u8>> {
    if raw.starts_with(&ZSTD_MAGIC) {
        zstd::decode_all(raw.as_slice())
            .map_err(|e| Error::malformed(format!("corrupt compressed object: {}", e)))
    } else {
        Ok(raw)
    }
}

/// Loose object store rooted at a repository's `objects/` directory
#[derive(Debug, Clone)]
pub struct ObjectStore {
    dir: PathBuf,
    compression: Compression,
}

impl ObjectStore {
    pub fn new(dir: impl Into<PathBuf>, compression: Compression) -> Self {
        Self {
            dir: dir.into(),
            compression,
        }
    }

    /// Directory holding the fan-out subdirectories
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn object_path(&self, id: &ObjectId) -> PathBuf {
        let hex = id.to_hex();
        self.dir.join(&hex[..2]).join(&hex[2..])
    }

    /// Check if object exists
    pub fn exists(&self, id: &ObjectId) -> bool {
        self.object_path(id).is_file()
    }

    /// Store an object, returning its id. Storing existing content is a no-op.
    pub fn put(&self, object: &Object) -> Result<ObjectId> {
        let framed = object.encode();
        let id = ObjectId::from_framed(&framed);
        let path = self.object_path(&id);
        if path.exists() {
            tracing::debug!("{} {} already stored", object.kind(), id);
            return Ok(id);
        }

        let data = self.compression.compress(framed)?;
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        // Write atomically via temp file
        let tmp_path = path.with_extension("tmp");
        fs::write(&tmp_path, &data)?;
        fs::rename(&tmp_path, &path)?;

        tracing::debug!("stored {} {} ({} bytes on disk)", object.kind(), id, data.len());
        Ok(id)
    }

    /// Load and decode an object
    pub fn get(&self, id: &ObjectId) -> Result<Object> {
        let path = self.object_path(id);
        let raw = match fs::read(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(Error::ObjectNotFound(*id));
            }
            Err(e) => return Err(e.into()),
        };

        let framed = decompress(raw)?;
        let actual = ObjectId::from_framed(&framed);
        if actual != *id {
            return Err(Error::malformed(format!(
                "object {} hashes to {}; stored content is corrupt",
                id, actual
            )));
        }
        Object::decode(&framed)
    }

    pub fn get_blob(&self, id: &ObjectId) -> Result<Blob> {
        match self.get(id)? {
            Object::Blob(blob) => Ok(blob),
            other => Err(kind_mismatch(id, "blob", &other)),
        }
    }

    pub fn get_tree(&self, id: &ObjectId) -> Result<Tree> {
        match self.get(id)? {
            Object::Tree(tree) => Ok(tree),
            other => Err(kind_mismatch(id, "tree", &other)),
        }
    }

    pub fn get_commit(&self, id: &ObjectId) -> Result<Commit> {
        match self.get(id)? {
            Object::Commit(commit) => Ok(commit),
            other => Err(kind_mismatch(id, "commit", &other)),
        }
    }

    /// List all stored object ids, sorted
    pub fn ids(&self) -> Result<Vec<ObjectId>> {
        let mut ids = Vec::new();
        if !self.dir.is_dir() {
            return Ok(ids);
        }
        for fanout in fs::read_dir(&self.dir)? {
            let fanout = fanout?;
            let prefix = fanout.file_name().to_string_lossy().into_owned();
            if prefix.len() != 2 || !fanout.file_type()?.is_dir() {
                continue;
            }
            for file in fs::read_dir(fanout.path())? {
                let rest = file?.file_name().to_string_lossy().into_owned();
                // skips leftover temp files
                if let Ok(id) = ObjectId::from_hex(&format!("{}{}", prefix, rest)) {
                    ids.push(id);
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Expand an abbreviated hex id to the unique stored object it names
    pub fn resolve_prefix(&self, prefix: &str) -> Result<ObjectId> {
        let prefix = prefix.to_ascii_lowercase();
        if prefix.len() == HEX_LEN {
            let id = ObjectId::from_hex(&prefix)?;
            return if self.exists(&id) {
                Ok(id)
            } else {
                Err(Error::ObjectNotFound(id))
            };
        }
        if prefix.len() < MIN_PREFIX_LEN
            || prefix.len() > HEX_LEN
            || !prefix.bytes().all(|b| b.is_ascii_hexdigit())
        {
            return Err(Error::InvalidObjectId(prefix));
        }

        let fanout = self.dir.join(&prefix[..2]);
        let mut found = None;
        if fanout.is_dir() {
            for file in fs::read_dir(&fanout)? {
                let rest = file?.file_name().to_string_lossy().into_owned();
                if !rest.starts_with(&prefix[2..]) {
                    continue;
                }
                let Ok(id) = ObjectId::from_hex(&format!("{}{}", &prefix[..2], rest)) else {
                    continue;
                };
                if found.replace(id).is_some() {
                    return Err(Error::AmbiguousObjectId(prefix));
                }
            }
        }
        found.ok_or(Error::InvalidObjectId(prefix))
    }

    /// Fail with `ObjectNotFound` unless every object `object` names is stored.
    ///
    /// Trees and commits may only be written after their children.
    pub fn check_references(&self, object: &Object) -> Result<()> {
        let missing = match object {
            Object::Blob(_) => None,
            Object::Tree(tree) => tree.iter().map(|e| e.id).find(|id| !self.exists(id)),
            Object::Commit(commit) => std::iter::once(commit.tree)
                .chain(commit.parent)
                .find(|id| !self.exists(id)),
        };
        match missing {
            Some(id) => Err(Error::ObjectNotFound(id)),
            None => Ok(()),
        }
    }
}

fn kind_mismatch(id: &ObjectId, expected: &str, found: &Object) -> Error {
    Error::malformed(format!("object {} is a {}, expected a {}", id, found.kind(), expected))
}
