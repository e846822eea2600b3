//! Core object model for kit
//!
//! Implements content-addressable objects (Blob, Tree, Commit) with a canonical
//! byte encoding. An object's id is the SHA-1 of `"<kind> <len>\0" + payload`,
//! the same framing git uses, so ids are interchangeable with git's.

use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};
use std::cmp::Ordering;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, FixedOffset, TimeZone};

use crate::error::{Error, Result};

/// Length of a raw object id in bytes
pub const ID_LEN: usize = 20;

/// Length of a hex-encoded object id
pub const HEX_LEN: usize = ID_LEN * 2;

/// Unique identifier for any stored object
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjectId([u8; ID_LEN]);

impl ObjectId {
    /// Create a new ObjectId from raw bytes
    pub fn new(bytes: [u8; ID_LEN]) -> Self {
        Self(bytes)
    }

    /// Compute the id of already-framed object bytes
    pub fn from_framed(data: &[u8]) -> Self {
        Self(Sha1::digest(data).into())
    }

    /// Convert to hexadecimal string
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a 40 character hexadecimal string
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        if hex_str.len() != HEX_LEN {
            return Err(Error::InvalidObjectId(hex_str.to_string()));
        }
        let mut arr = [0u8; ID_LEN];
        hex::decode_to_slice(hex_str, &mut arr)
            .map_err(|_| Error::InvalidObjectId(hex_str.to_string()))?;
        Ok(Self(arr))
    }

    fn from_slice(bytes: &[u8]) -> Option<Self> {
        let arr: [u8; ID_LEN] = bytes.try_into().ok()?;
        Some(Self(arr))
    }

    /// Get raw bytes
    pub fn as_bytes(&self) -> &[u8; ID_LEN] {
        &self.0
    }

    /// Abbreviated hex form used in human-facing output
    pub fn short(&self) -> String {
        let mut hex = self.to_hex();
        hex.truncate(7);
        hex
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_hex(s)
    }
}

/// Object type discriminator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ObjectKind {
    Blob,
    Tree,
    Commit,
}

impl ObjectKind {
    /// The type tag written in the object header
    pub fn as_str(&self) -> &'static str {
        match self {
            ObjectKind::Blob => "blob",
            ObjectKind::Tree => "tree",
            ObjectKind::Commit => "commit",
        }
    }

    fn from_tag(tag: &[u8]) -> Result<Self> {
        match tag {
            b"blob" => Ok(ObjectKind::Blob),
            b"tree" => Ok(ObjectKind::Tree),
            b"commit" => Ok(ObjectKind::Commit),
            other => Err(Error::malformed(format!(
                "unknown object type {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }
}

impl fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ObjectKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_tag(s.as_bytes())
    }
}

/// Prepend the `"<kind> <len>\0"` header to a payload
pub fn frame(kind: ObjectKind, payload: &[u8]) -> Vec<u8> {
    let header = format!("{} {}\0", kind.as_str(), payload.len());
    let mut out = Vec::with_capacity(header.len() + payload.len());
    out.extend_from_slice(header.as_bytes());
    out.extend_from_slice(payload);
    out
}

/// Hash a payload as an object of the given kind without storing it
pub fn hash_object(data: &[u8], kind: ObjectKind) -> ObjectId {
    let mut hasher = Sha1::new();
    hasher.update(kind.as_str().as_bytes());
    hasher.update(b" ");
    hasher.update(data.len().to_string().as_bytes());
    hasher.update([0u8]);
    hasher.update(data);
    ObjectId(hasher.finalize().into())
}

/// Split framed bytes into their kind and payload, validating the header
pub fn decode_framed(data: &[u8]) -> Result<(ObjectKind, &[u8])> {
    let space = data
        .iter()
        .position(|&b| b == b' ')
        .ok_or_else(|| Error::malformed("object header missing type separator"))?;
    let kind = ObjectKind::from_tag(&data[..space])?;

    let rest = &data[space + 1..];
    let nul = rest
        .iter()
        .position(|&b| b == 0)
        .ok_or_else(|| Error::malformed("object header missing NUL terminator"))?;
    let len_digits = &rest[..nul];
    let canonical = !len_digits.is_empty()
        && len_digits.iter().all(u8::is_ascii_digit)
        && (len_digits.len() == 1 || len_digits[0] != b'0');
    if !canonical {
        return Err(Error::malformed("object header has an invalid length"));
    }
    let declared: usize = std::str::from_utf8(len_digits)
        .ok()
        .and_then(|s| s.parse().ok())
        .ok_or_else(|| Error::malformed("object header length overflows"))?;

    let payload = &rest[nul + 1..];
    if payload.len() != declared {
        return Err(Error::malformed(format!(
            "{} declares {} bytes but carries {}",
            kind,
            declared,
            payload.len()
        )));
    }
    Ok((kind, payload))
}

/// File content object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    /// Raw content data
    pub data: Vec<u8>,
}

impl Blob {
    /// Create a new blob from data
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn serialize(&self) -> Vec<u8> {
        self.data.clone()
    }

    pub fn deserialize(data: &[u8]) -> Self {
        Self::new(data.to_vec())
    }

    /// Compute the object ID
    pub fn id(&self) -> ObjectId {
        hash_object(&self.data, ObjectKind::Blob)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Mode tag of a tree entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntryMode {
    /// Regular file
    File,
    /// Executable file
    Executable,
    /// Symbolic link (blob holds the link target)
    Symlink,
    /// Nested tree
    Tree,
}

impl EntryMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryMode::File => "100644",
            EntryMode::Executable => "100755",
            EntryMode::Symlink => "120000",
            EntryMode::Tree => "40000",
        }
    }

    fn parse(tag: &[u8]) -> Result<Self> {
        match tag {
            b"100644" => Ok(EntryMode::File),
            b"100755" => Ok(EntryMode::Executable),
            b"120000" => Ok(EntryMode::Symlink),
            b"40000" => Ok(EntryMode::Tree),
            other => Err(Error::malformed(format!(
                "unknown tree entry mode {:?}",
                String::from_utf8_lossy(other)
            ))),
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Tree)
    }

    /// Kind of object an entry with this mode points at
    pub fn object_kind(&self) -> ObjectKind {
        match self {
            EntryMode::Tree => ObjectKind::Tree,
            _ => ObjectKind::Blob,
        }
    }
}

impl fmt::Display for EntryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Directory tree entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeEntry {
    pub mode: EntryMode,
    /// Single path segment
    pub name: String,
    /// Object ID (points to Blob or Tree)
    pub id: ObjectId,
}

impl TreeEntry {
    /// Create a new tree entry
    pub fn new(mode: EntryMode, name: impl Into<String>, id: ObjectId) -> Self {
        Self {
            mode,
            name: name.into(),
            id,
        }
    }

    /// Canonical ordering: byte order of names, subtrees compared as `name/`
    fn canonical_cmp(&self, other: &TreeEntry) -> Ordering {
        let lhs = self.name.bytes().chain(self.mode.is_tree().then_some(b'/'));
        let rhs = other.name.bytes().chain(other.mode.is_tree().then_some(b'/'));
        lhs.cmp(rhs)
    }
}

/// Reject names that cannot appear as a single path segment.
pub(crate) fn validate_segment(name: &str) -> Result<()> {
    if name.is_empty() || name == "." || name == ".." || name.contains(['/', '\0']) {
        return Err(Error::InvalidPath(format!("invalid tree entry name {:?}", name)));
    }
    Ok(())
}

/// Directory object
///
/// Entries are unique by name and always held in canonical order, so two trees
/// with the same entries serialize identically no matter how they were built.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tree {
    entries: Vec<TreeEntry>,
}

impl Tree {
    /// Create an empty tree
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from entries in any order
    pub fn from_entries(entries: impl IntoIterator<Item = TreeEntry>) -> Result<Self> {
        let mut tree = Self::new();
        for entry in entries {
            tree.insert(entry)?;
        }
        Ok(tree)
    }

    /// Add or replace the entry with the same name
    pub fn insert(&mut self, entry: TreeEntry) -> Result<()> {
        validate_segment(&entry.name)?;
        self.remove(&entry.name);
        let pos = self
            .entries
            .binary_search_by(|probe| probe.canonical_cmp(&entry))
            .unwrap_or_else(|pos| pos);
        self.entries.insert(pos, entry);
        Ok(())
    }

    /// Remove an entry
    pub fn remove(&mut self, name: &str) -> Option<TreeEntry> {
        let pos = self.entries.iter().position(|e| e.name == name)?;
        Some(self.entries.remove(pos))
    }

    /// Get an entry
    pub fn get(&self, name: &str) -> Option<&TreeEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    /// Iterate over entries in canonical order
    pub fn iter(&self) -> impl Iterator<Item = &TreeEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.entries.len() * 48);
        for entry in &self.entries {
            out.extend_from_slice(entry.mode.as_str().as_bytes());
            out.push(b' ');
            out.extend_from_slice(entry.name.as_bytes());
            out.push(0);
            out.extend_from_slice(entry.id.as_bytes());
        }
        out
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let mut entries: Vec<TreeEntry> = Vec::new();
        let mut seen = HashSet::new();
        let mut rest = data;

        while !rest.is_empty() {
            let space = rest
                .iter()
                .position(|&b| b == b' ')
                .ok_or_else(|| Error::malformed("tree entry missing mode separator"))?;
            let mode = EntryMode::parse(&rest[..space])?;
            rest = &rest[space + 1..];

            let nul = rest
                .iter()
                .position(|&b| b == 0)
                .ok_or_else(|| Error::malformed("tree entry missing name terminator"))?;
            let name = std::str::from_utf8(&rest[..nul])
                .map_err(|_| Error::malformed("tree entry name is not UTF-8"))?
                .to_string();
            validate_segment(&name).map_err(|e| Error::malformed(e.to_string()))?;
            rest = &rest[nul + 1..];

            if rest.len() < ID_LEN {
                return Err(Error::malformed(format!("tree entry {:?} has a truncated id", name)));
            }
            let id = ObjectId::from_slice(&rest[..ID_LEN])
                .ok_or_else(|| Error::malformed("tree entry id has the wrong width"))?;
            rest = &rest[ID_LEN..];

            let entry = TreeEntry::new(mode, name, id);
            if let Some(prev) = entries.last() {
                if prev.canonical_cmp(&entry) != Ordering::Less {
                    return Err(Error::malformed(format!(
                        "tree entries out of order at {:?}",
                        entry.name
                    )));
                }
            }
            if !seen.insert(entry.name.clone()) {
                return Err(Error::malformed(format!("duplicate tree entry {:?}", entry.name)));
            }
            entries.push(entry);
        }

        Ok(Self { entries })
    }

    /// Compute the object ID
    pub fn id(&self) -> ObjectId {
        hash_object(&self.serialize(), ObjectKind::Tree)
    }
}

/// Largest UTC offset the `±HHMM` header form can carry
pub const MAX_OFFSET_MINUTES: i32 = 99 * 60 + 59;

/// Author or committer identity with a point in time
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Signature {
    pub name: String,
    pub email: String,
    /// Seconds since the Unix epoch
    pub time: i64,
    /// Offset from UTC in minutes
    pub offset_minutes: i32,
}

impl Signature {
    /// Characters that would break the header line are dropped and the offset
    /// is clamped to `±MAX_OFFSET_MINUTES`.
    pub fn new(name: &str, email: &str, time: i64, offset_minutes: i32) -> Self {
        let clean = |s: &str| -> String {
            s.chars()
                .filter(|c| !matches!(c, '<' | '>' | '\n' | '\0'))
                .collect::<String>()
                .trim()
                .to_string()
        };
        Self {
            name: clean(name),
            email: clean(email),
            time,
            offset_minutes: offset_minutes.clamp(-MAX_OFFSET_MINUTES, MAX_OFFSET_MINUTES),
        }
    }

    pub fn from_datetime<Tz: TimeZone>(name: &str, email: &str, when: &DateTime<Tz>) -> Self {
        let offset = when.fixed_offset().offset().local_minus_utc() / 60;
        Self::new(name, email, when.timestamp(), offset)
    }

    /// Signature stamped with the local wall-clock time
    pub fn now(name: &str, email: &str) -> Self {
        Self::from_datetime(name, email, &chrono::Local::now())
    }

    pub fn datetime(&self) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.offset_minutes * 60)?;
        offset.timestamp_opt(self.time, 0).single()
    }
}

impl fmt::Display for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.offset_minutes < 0 { '-' } else { '+' };
        let abs = self.offset_minutes.unsigned_abs();
        write!(
            f,
            "{} <{}> {} {}{:02}{:02}",
            self.name,
            self.email,
            self.time,
            sign,
            abs / 60,
            abs % 60
        )
    }
}

impl FromStr for Signature {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let bad = || Error::malformed(format!("invalid signature {:?}", s));

        let lt = s.find('<').ok_or_else(bad)?;
        let gt = lt + s[lt..].find('>').ok_or_else(bad)?;
        let name = s[..lt].strip_suffix(' ').ok_or_else(bad)?;
        let email = &s[lt + 1..gt];
        let (time, tz) = s[gt + 1..]
            .strip_prefix(' ')
            .and_then(|rest| rest.split_once(' '))
            .ok_or_else(bad)?;

        let time: i64 = time.parse().map_err(|_| bad())?;
        let tz = tz.as_bytes();
        if tz.len() != 5 || !tz[1..].iter().all(u8::is_ascii_digit) {
            return Err(bad());
        }
        let hours = i32::from(tz[1] - b'0') * 10 + i32::from(tz[2] - b'0');
        let minutes = i32::from(tz[3] - b'0') * 10 + i32::from(tz[4] - b'0');
        let magnitude = hours * 60 + minutes;
        let offset_minutes = match tz[0] {
            b'+' => magnitude,
            b'-' => -magnitude,
            _ => return Err(bad()),
        };

        let sig = Signature {
            name: name.to_string(),
            email: email.to_string(),
            time,
            offset_minutes,
        };
        // Only canonical spellings are accepted so decoding never loses bytes.
        if sig.to_string() != s {
            return Err(bad());
        }
        Ok(sig)
    }
}

/// Commit object
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    /// Tree object ID for this snapshot
    pub tree: ObjectId,
    /// Parent commit (None for a root commit)
    pub parent: Option<ObjectId>,
    pub author: Signature,
    pub committer: Signature,
    /// Commit message
    pub message: String,
}

impl Commit {
    /// Create a new commit authored and committed by the same identity
    pub fn new(tree: ObjectId, parent: Option<ObjectId>, author: Signature, message: String) -> Self {
        Self {
            tree,
            parent,
            committer: author.clone(),
            author,
            message,
        }
    }

    pub fn with_committer(mut self, committer: Signature) -> Self {
        self.committer = committer;
        self
    }

    /// Check if this is a root commit (no parent)
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// First line of the message
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or("")
    }

    pub fn serialize(&self) -> Vec<u8> {
        let mut out = format!("tree {}\n", self.tree);
        if let Some(parent) = &self.parent {
            out.push_str(&format!("parent {}\n", parent));
        }
        out.push_str(&format!("author {}\n", self.author));
        out.push_str(&format!("committer {}\n", self.committer));
        out.push('\n');
        out.push_str(&self.message);
        out.into_bytes()
    }

    pub fn deserialize(data: &[u8]) -> Result<Self> {
        let text =
            std::str::from_utf8(data).map_err(|_| Error::malformed("commit is not valid UTF-8"))?;
        let (headers, message) = text
            .split_once("\n\n")
            .ok_or_else(|| Error::malformed("commit missing header terminator"))?;

        let mut lines = headers.split('\n').peekable();

        let tree = ObjectId::from_hex(header_value(lines.next(), "tree")?)
            .map_err(|_| Error::malformed("commit tree reference is not a valid id"))?;

        let parent = match lines.next_if(|line| line.starts_with("parent ")) {
            Some(line) => Some(
                ObjectId::from_hex(&line["parent ".len()..])
                    .map_err(|_| Error::malformed("commit parent is not a valid id"))?,
            ),
            None => None,
        };
        if lines.peek().is_some_and(|line| line.starts_with("parent ")) {
            return Err(Error::malformed("commit has more than one parent"));
        }

        let author: Signature = header_value(lines.next(), "author")?.parse()?;
        let committer: Signature = header_value(lines.next(), "committer")?.parse()?;

        if let Some(extra) = lines.next() {
            return Err(Error::malformed(format!("unexpected commit header {:?}", extra)));
        }

        Ok(Self {
            tree,
            parent,
            author,
            committer,
            message: message.to_string(),
        })
    }

    /// Compute the object ID
    pub fn id(&self) -> ObjectId {
        hash_object(&self.serialize(), ObjectKind::Commit)
    }
}

fn header_value<'a>(line: Option<&'a str>, key: &str) -> Result<&'a str> {
    line.and_then(|line| line.strip_prefix(key))
        .and_then(|line| line.strip_prefix(' '))
        .ok_or_else(|| Error::malformed(format!("commit missing {} header", key)))
}

/// Generic object that can be any type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Object {
    Blob(Blob),
    Tree(Tree),
    Commit(Commit),
}

impl Object {
    /// Get the object kind
    pub fn kind(&self) -> ObjectKind {
        match self {
            Object::Blob(_) => ObjectKind::Blob,
            Object::Tree(_) => ObjectKind::Tree,
            Object::Commit(_) => ObjectKind::Commit,
        }
    }

    /// Canonical payload bytes (without the header)
    pub fn serialize(&self) -> Vec<u8> {
        match self {
            Object::Blob(blob) => blob.serialize(),
            Object::Tree(tree) => tree.serialize(),
            Object::Commit(commit) => commit.serialize(),
        }
    }

    pub fn deserialize(kind: ObjectKind, data: &[u8]) -> Result<Self> {
        Ok(match kind {
            ObjectKind::Blob => Object::Blob(Blob::deserialize(data)),
            ObjectKind::Tree => Object::Tree(Tree::deserialize(data)?),
            ObjectKind::Commit => Object::Commit(Commit::deserialize(data)?),
        })
    }

    /// Header plus payload, the bytes the id is computed over
    pub fn encode(&self) -> Vec<u8> {
        frame(self.kind(), &self.serialize())
    }

    /// Parse framed bytes back into an object
    pub fn decode(data: &[u8]) -> Result<Self> {
        let (kind, payload) = decode_framed(data)?;
        Self::deserialize(kind, payload)
    }

    /// Get the object ID
    pub fn id(&self) -> ObjectId {
        hash_object(&self.serialize(), self.kind())
    }
}

impl From<Blob> for Object {
    fn from(blob: Blob) -> Self {
        Object::Blob(blob)
    }
}

impl From<Tree> for Object {
    fn from(tree: Tree) -> Self {
        Object::Tree(tree)
    }
}

impl From<Commit> for Object {
    fn from(commit: Commit) -> Self {
        Object::Commit(commit)
    }
}
