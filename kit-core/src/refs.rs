//! Ref store
//!
//! Refs are small text files under the repository root. A ref holds either a
//! commit id or `ref: <other-ref>`; HEAD is normally the latter, pointing at
//! the current branch under `refs/heads/`.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::fsutil::atomic_write;
use crate::object::ObjectId;

pub const HEAD: &str = "HEAD";

/// Directory (relative to the root) that holds branches
pub const HEADS_DIR: &str = "refs/heads";

/// Maximum number of symbolic hops followed before giving up
pub const MAX_SYMREF_DEPTH: usize = 8;

const SYMREF_PREFIX: &str = "ref: ";

/// Parsed contents of a ref file
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefValue {
    Direct(ObjectId),
    Symbolic(String),
}

impl RefValue {
    fn parse(name: &str, content: &str) -> Result<Self> {
        let content = content.trim();
        if let Some(target) = content.strip_prefix(SYMREF_PREFIX) {
            let target = target.trim();
            validate_ref_name(target).map_err(|_| Error::MalformedRef {
                name: name.to_string(),
                reason: format!("invalid symbolic target {:?}", target),
            })?;
            return Ok(RefValue::Symbolic(target.to_string()));
        }
        ObjectId::from_hex(content)
            .map(RefValue::Direct)
            .map_err(|_| Error::MalformedRef {
                name: name.to_string(),
                reason: format!("neither a commit id nor a symbolic ref: {:?}", content),
            })
    }

    fn render(&self) -> String {
        match self {
            RefValue::Direct(id) => format!("{}\n", id),
            RefValue::Symbolic(target) => format!("{}{}\n", SYMREF_PREFIX, target),
        }
    }
}

/// Outcome of following a ref to the commit it names
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolved {
    Commit(ObjectId),
    /// The chain ends at a ref that does not exist yet; holds its name
    Unborn(String),
}

impl Resolved {
    pub fn commit(&self) -> Option<ObjectId> {
        match self {
            Resolved::Commit(id) => Some(*id),
            Resolved::Unborn(_) => None,
        }
    }
}

/// Check that a ref name is a relative, well-formed path
pub fn validate_ref_name(name: &str) -> Result<()> {
    let bad = name.is_empty()
        || name.starts_with('/')
        || name.ends_with('/')
        || name.ends_with(".lock")
        || name.chars().any(|c| c.is_whitespace() || c.is_control() || c == '\\')
        || name.split('/').any(|seg| seg.is_empty() || seg == "." || seg == "..");
    if bad {
        return Err(Error::InvalidRefName(name.to_string()));
    }
    Ok(())
}

/// Full ref name of a branch
pub fn branch_ref(branch: &str) -> String {
    format!("{}/{}", HEADS_DIR, branch)
}

/// Refs area of a repository
#[derive(Debug, Clone)]
pub struct RefStore {
    root: PathBuf,
}

impl RefStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn ref_path(&self, name: &str) -> Result<PathBuf> {
        validate_ref_name(name)?;
        Ok(self.root.join(name))
    }

    /// Read one ref without following it; None if the ref file is absent
    pub fn read(&self, name: &str) -> Result<Option<RefValue>> {
        let path = self.ref_path(name)?;
        match fs::read_to_string(&path) {
            Ok(content) => RefValue::parse(name, &content).map(Some),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, name: &str, value: &RefValue) -> Result<()> {
        let path = self.ref_path(name)?;
        atomic_write(&path, value.render().as_bytes())
    }

    /// Follow symbolic refs from `name` to the last ref in the chain
    pub fn terminal_ref(&self, name: &str) -> Result<String> {
        let mut current = name.to_string();
        for _ in 0..=MAX_SYMREF_DEPTH {
            match self.read(&current)? {
                Some(RefValue::Symbolic(target)) => current = target,
                _ => return Ok(current),
            }
        }
        Err(Error::RefCycle(name.to_string()))
    }

    /// Follow `name` to a commit id, or report the unborn ref it ends at
    pub fn resolve(&self, name: &str) -> Result<Resolved> {
        let terminal = self.terminal_ref(name)?;
        Ok(match self.read(&terminal)? {
            Some(RefValue::Direct(id)) => Resolved::Commit(id),
            _ => Resolved::Unborn(terminal),
        })
    }

    pub fn head(&self) -> Result<Resolved> {
        self.resolve(HEAD)
    }

    /// Point a ref directly at a commit
    pub fn update(&self, name: &str, id: &ObjectId) -> Result<()> {
        self.write(name, &RefValue::Direct(*id))?;
        tracing::info!("{} -> {}", name, id);
        Ok(())
    }

    /// Make `name` a symbolic ref to `target`
    pub fn set_symbolic(&self, name: &str, target: &str) -> Result<()> {
        validate_ref_name(target)?;
        self.write(name, &RefValue::Symbolic(target.to_string()))
    }

    /// Branch HEAD points at, or None when HEAD is detached
    pub fn current_branch(&self) -> Result<Option<String>> {
        let terminal = self.terminal_ref(HEAD)?;
        let prefix = format!("{}/", HEADS_DIR);
        Ok(terminal.strip_prefix(&prefix).map(str::to_string))
    }

    /// Create a branch pointing at `id`; fails if it already exists
    pub fn create_branch(&self, branch: &str, id: &ObjectId) -> Result<()> {
        let name = branch_ref(branch);
        if self.read(&name)?.is_some() {
            return Err(Error::InvalidRefName(format!("branch {} already exists", branch)));
        }
        self.update(&name, id)
    }

    /// Branch names with the commit each points at, sorted by name
    pub fn branches(&self) -> Result<Vec<(String, ObjectId)>> {
        let heads = self.root.join(HEADS_DIR);
        let mut out = Vec::new();
        if !heads.is_dir() {
            return Ok(out);
        }
        for entry in walkdir::WalkDir::new(&heads).sort_by_file_name() {
            let entry = entry.map_err(|e| Error::Io(e.into()))?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(branch) = relative_name(&heads, entry.path()) else {
                continue;
            };
            if let Some(RefValue::Direct(id)) = self.read(&branch_ref(&branch))? {
                out.push((branch, id));
            }
        }
        out.sort();
        Ok(out)
    }
}

fn relative_name(base: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(base).ok()?;
    let parts: Option<Vec<&str>> = rel.components().map(|c| c.as_os_str().to_str()).collect();
    let name = parts?.join("/");
    validate_ref_name(&name).ok()?;
    Some(name)
}
