//! Kit Core Library
//!
//! Core functionality for kit, a minimal content-addressable version control engine:
//! - Object model (Blob, Tree, Commit) and canonical encoding
//! - Loose object store with optional zstd compression
//! - Staging index
//! - Refs and HEAD resolution
//! - Lazy commit history traversal

pub mod config;
pub mod error;
pub mod fsutil;
pub mod history;
pub mod index;
pub mod object;
pub mod refs;
pub mod repository;
pub mod storage;

pub use config::{Identity, RepoConfig};
pub use error::{Error, Result};
pub use history::{walk, History};
pub use index::{read_index, write_index, EntryMeta, Index, IndexEntry, REPO_DIR_NAME};
pub use object::{
    hash_object, Blob, Commit, EntryMode, Object, ObjectId, ObjectKind, Signature, Tree, TreeEntry,
};
pub use refs::{RefStore, RefValue, Resolved, HEAD};
pub use repository::Repository;
pub use storage::{Compression, ObjectStore};
