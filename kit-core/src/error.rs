//! Error type shared by every kit-core component

use std::path::PathBuf;

use crate::object::ObjectId;

/// Result type for repository operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while reading or writing a repository
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("object not found: {0}")]
    ObjectNotFound(ObjectId),

    #[error("malformed object: {0}")]
    MalformedObject(String),

    #[error("symbolic ref cycle while resolving {0}")]
    RefCycle(String),

    #[error("nothing staged to commit")]
    NothingStaged,

    #[error("malformed ref {name}: {reason}")]
    MalformedRef { name: String, reason: String },

    #[error("invalid ref name: {0:?}")]
    InvalidRefName(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    #[error("invalid object id: {0:?}")]
    InvalidObjectId(String),

    #[error("ambiguous object id prefix: {0}")]
    AmbiguousObjectId(String),

    #[error("not a kit repository: {}", .0.display())]
    NotARepository(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("serialization error: {0}")]
    Serialization(String),
}

impl Error {
    pub(crate) fn malformed(msg: impl Into<String>) -> Self {
        Error::MalformedObject(msg.into())
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}
