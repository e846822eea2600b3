//! Repository operations
//!
//! Ties the object store, index and refs of one repository directory
//! together. Every operation takes the repository explicitly; nothing depends
//! on the process working directory.
//!
//! Layout on disk:
//! ```text
//! {worktree}/.kit/
//!   HEAD                               - "ref: refs/heads/<branch>" or a commit id
//!   config.json                        - repository configuration
//!   index                              - staged entries (bincode)
//!   refs/heads/{branch}                - branch tips
//!   objects/{hash[0..2]}/{hash[2..]}   - content-addressed object store
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::{RepoConfig, CONFIG_FILE};
use crate::error::{Error, Result};
use crate::history::History;
use crate::index::{normalize_path, EntryMeta, Index, IndexEntry, REPO_DIR_NAME};
use crate::object::{
    hash_object, Commit, EntryMode, Object, ObjectId, ObjectKind, Signature, Tree, TreeEntry,
};
use crate::refs::{branch_ref, RefStore, RefValue, Resolved, HEAD, HEADS_DIR};
use crate::storage::ObjectStore;

pub const OBJECTS_DIR: &str = "objects";
pub const INDEX_FILE: &str = "index";

/// A kit repository and the worktree it tracks
#[derive(Debug)]
pub struct Repository {
    root: PathBuf,
    worktree: PathBuf,
    config: RepoConfig,
    objects: ObjectStore,
    refs: RefStore,
}

impl Repository {
    /// Create a repository in `worktree` with default configuration
    pub fn init(worktree: &Path) -> Result<Self> {
        Self::init_with_config(worktree, RepoConfig::default())
    }

    /// Create the on-disk layout.
    ///
    /// Re-running on an existing repository only fills in what is missing:
    /// objects, refs, HEAD, config and index are left untouched.
    pub fn init_with_config(worktree: &Path, config: RepoConfig) -> Result<Self> {
        let root = worktree.join(REPO_DIR_NAME);
        let existed = root.join(HEAD).is_file();

        fs::create_dir_all(root.join(OBJECTS_DIR))?;
        fs::create_dir_all(root.join(HEADS_DIR))?;

        let config = if root.join(CONFIG_FILE).exists() {
            RepoConfig::load(&root)?
        } else {
            config.save(&root)?;
            config
        };

        let refs = RefStore::new(&root);
        if !existed {
            refs.set_symbolic(HEAD, &branch_ref(&config.default_branch))?;
            tracing::info!("Initialized empty repository in {}", root.display());
        } else {
            tracing::info!("Reinitialized existing repository in {}", root.display());
        }

        Self::open(worktree)
    }

    /// Open the repository whose worktree is `worktree`
    pub fn open(worktree: &Path) -> Result<Self> {
        let root = worktree.join(REPO_DIR_NAME);
        if !root.join(HEAD).is_file() || !root.join(OBJECTS_DIR).is_dir() {
            return Err(Error::NotARepository(worktree.to_path_buf()));
        }
        let worktree = fs::canonicalize(worktree)?;
        let root = worktree.join(REPO_DIR_NAME);
        let config = RepoConfig::load(&root)?;

        Ok(Self {
            objects: ObjectStore::new(root.join(OBJECTS_DIR), config.compression),
            refs: RefStore::new(&root),
            root,
            worktree,
            config,
        })
    }

    /// Open the repository containing `start`, searching parent directories
    pub fn discover(start: &Path) -> Result<Self> {
        let start = fs::canonicalize(start)?;
        for dir in start.ancestors() {
            if dir.join(REPO_DIR_NAME).join(HEAD).is_file() {
                return Self::open(dir);
            }
        }
        Err(Error::NotARepository(start))
    }

    /// The repository directory (`<worktree>/.kit`)
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn worktree(&self) -> &Path {
        &self.worktree
    }

    pub fn config(&self) -> &RepoConfig {
        &self.config
    }

    pub fn objects(&self) -> &ObjectStore {
        &self.objects
    }

    pub fn refs(&self) -> &RefStore {
        &self.refs
    }

    pub fn index_path(&self) -> PathBuf {
        self.root.join(INDEX_FILE)
    }

    // ==================== Index ====================

    pub fn read_index(&self) -> Result<Vec<IndexEntry>> {
        crate::index::read_index(&self.index_path())
    }

    pub fn write_index(&self, entries: &[IndexEntry]) -> Result<()> {
        for entry in entries {
            if !self.objects.exists(&entry.id) {
                return Err(Error::ObjectNotFound(entry.id));
            }
        }
        crate::index::write_index(&self.index_path(), entries)
    }

    /// Stage in-memory content at a repository-relative path
    pub fn stage_bytes(&self, path: &str, content: &[u8], mode: EntryMode) -> Result<ObjectId> {
        let mut index = Index::load(&self.index_path())?;
        let meta = EntryMeta {
            size: content.len() as u64,
            ..EntryMeta::default()
        };
        let id = index.stage(&self.objects, path, content, mode, meta)?;
        index.save(&self.index_path())?;
        Ok(id)
    }

    /// Stage a file, symlink or directory from the worktree.
    ///
    /// `path` is relative to the worktree or absolute inside it. Directories
    /// are staged recursively. A path that no longer exists is dropped from
    /// the index. Returns the entries that were (re)staged.
    pub fn stage(&self, path: impl AsRef<Path>) -> Result<Vec<IndexEntry>> {
        let abs = self.absolute(path.as_ref())?;
        let mut index = Index::load(&self.index_path())?;
        let mut staged = Vec::new();

        match fs::symlink_metadata(&abs) {
            Ok(meta) if meta.is_dir() => {
                let walker = walkdir::WalkDir::new(&abs)
                    .follow_links(false)
                    .sort_by_file_name()
                    .into_iter()
                    .filter_entry(|e| e.file_name() != REPO_DIR_NAME);
                for entry in walker {
                    let entry = entry.map_err(|e| Error::Io(e.into()))?;
                    if entry.file_type().is_dir() {
                        continue;
                    }
                    let rel = self.relative(entry.path())?;
                    let meta = fs::symlink_metadata(entry.path())?;
                    staged.push(self.stage_one(&mut index, &rel, entry.path(), &meta)?);
                }
            }
            Ok(meta) => {
                let rel = self.relative(&abs)?;
                staged.push(self.stage_one(&mut index, &rel, &abs, &meta)?);
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let rel = self.relative(&abs)?;
                if index.remove_recursive(&rel) == 0 {
                    return Err(Error::InvalidPath(format!("{} did not match any file", rel)));
                }
                tracing::debug!("dropped deleted path {} from the index", rel);
            }
            Err(e) => return Err(e.into()),
        }

        index.save(&self.index_path())?;
        Ok(staged)
    }

    fn stage_one(
        &self,
        index: &mut Index,
        rel: &str,
        abs: &Path,
        meta: &fs::Metadata,
    ) -> Result<IndexEntry> {
        let (content, mode) = if meta.file_type().is_symlink() {
            let target = fs::read_link(abs)?;
            (target.to_string_lossy().into_owned().into_bytes(), EntryMode::Symlink)
        } else {
            (fs::read(abs)?, file_mode(meta))
        };
        let meta = EntryMeta::from_metadata(meta);
        let id = index.stage(&self.objects, rel, &content, mode, meta)?;
        Ok(IndexEntry {
            path: rel.to_string(),
            id,
            mode,
            meta,
        })
    }

    /// Remove a path (and anything beneath it) from the index. A path naming
    /// the worktree root (`""` or `.`) clears the whole index.
    pub fn unstage(&self, path: &str) -> Result<usize> {
        let mut index = Index::load(&self.index_path())?;
        let whole = path.split(['/', '\\']).all(|seg| seg.is_empty() || seg == ".");
        let removed = if whole {
            index.clear()
        } else {
            index.remove_recursive(&normalize_path(path)?)
        };
        if removed > 0 {
            index.save(&self.index_path())?;
        }
        Ok(removed)
    }

    fn absolute(&self, path: &Path) -> Result<PathBuf> {
        let abs = if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.worktree.join(path)
        };
        if abs.starts_with(&self.worktree) {
            return Ok(abs);
        }
        // The caller may have used a non-canonical spelling of the worktree.
        match fs::canonicalize(&abs) {
            Ok(canonical) if canonical.starts_with(&self.worktree) => Ok(canonical),
            _ => Err(Error::InvalidPath(format!(
                "{} is outside the worktree",
                path.display()
            ))),
        }
    }

    fn relative(&self, abs: &Path) -> Result<String> {
        let rel = abs
            .strip_prefix(&self.worktree)
            .map_err(|_| Error::InvalidPath(format!("{} is outside the worktree", abs.display())))?;
        let rel = rel
            .to_str()
            .ok_or_else(|| Error::InvalidPath(format!("{} is not valid UTF-8", rel.display())))?;
        normalize_path(rel)
    }

    // ==================== Trees and commits ====================

    /// Write the staged entries as a tree hierarchy and return the root tree id
    pub fn write_tree(&self) -> Result<ObjectId> {
        let entries = self.read_index()?;
        self.write_tree_from(&entries)
    }

    fn write_tree_from(&self, entries: &[IndexEntry]) -> Result<ObjectId> {
        for entry in entries {
            if !self.objects.exists(&entry.id) {
                return Err(Error::ObjectNotFound(entry.id));
            }
        }
        let level = entries.iter().map(|e| (e.path.as_str(), e)).collect();
        self.write_tree_level(level)
    }

    // Subtrees are written before the tree that names them.
    fn write_tree_level(&self, entries: Vec<(&str, &IndexEntry)>) -> Result<ObjectId> {
        let mut tree = Tree::new();
        let mut subdirs: BTreeMap<&str, Vec<(&str, &IndexEntry)>> = BTreeMap::new();
        for (rel, entry) in entries {
            match rel.split_once('/') {
                Some((dir, rest)) => subdirs.entry(dir).or_default().push((rest, entry)),
                None => tree.insert(TreeEntry::new(entry.mode, rel, entry.id))?,
            }
        }
        for (dir, children) in subdirs {
            let id = self.write_tree_level(children)?;
            tree.insert(TreeEntry::new(EntryMode::Tree, dir, id))?;
        }
        self.objects.put(&Object::Tree(tree))
    }

    /// Commit the staged entries on top of HEAD and advance the current branch
    pub fn commit(&self, message: &str, author: &Signature) -> Result<ObjectId> {
        let entries = self.read_index()?;
        if entries.is_empty() {
            return Err(Error::NothingStaged);
        }
        let tree = self.write_tree_from(&entries)?;
        let parent = self.refs.head()?.commit();

        let mut message = message.to_string();
        if !message.ends_with('\n') {
            message.push('\n');
        }
        // Fields are public; rebuild so the header parses back.
        let author = Signature::new(&author.name, &author.email, author.time, author.offset_minutes);
        let commit = Commit::new(tree, parent, author, message);
        let summary = commit.summary().to_string();
        let id = self.objects.put(&Object::Commit(commit))?;

        let target = self.refs.terminal_ref(HEAD)?;
        self.refs.update(&target, &id)?;
        tracing::info!("[{} {}] {}", target, id.short(), summary);
        Ok(id)
    }

    // ==================== History ====================

    /// History starting at `start`
    pub fn walk(&self, start: ObjectId) -> History<'_> {
        History::new(&self.objects, Some(start))
    }

    /// History starting at HEAD; empty while HEAD is unborn
    pub fn log(&self) -> Result<History<'_>> {
        Ok(History::new(&self.objects, self.refs.head()?.commit()))
    }

    pub fn head(&self) -> Result<Resolved> {
        self.refs.head()
    }

    // ==================== Objects ====================

    /// Hash `data` as an object of `kind`, storing it when `write` is set.
    ///
    /// Stored trees and commits must parse and may only name objects that are
    /// already stored.
    pub fn hash_object(&self, data: &[u8], kind: ObjectKind, write: bool) -> Result<ObjectId> {
        if !write {
            return Ok(hash_object(data, kind));
        }
        let object = Object::deserialize(kind, data)?;
        self.objects.check_references(&object)?;
        self.objects.put(&object)
    }

    /// Resolve a ref name, branch name or (abbreviated) object id
    pub fn rev_parse(&self, name: &str) -> Result<ObjectId> {
        // Only HEAD and names under refs/ are looked up as given, so files
        // such as `index` or `config.json` are never read as refs.
        let mut candidates = vec![branch_ref(name)];
        if name == HEAD || name.starts_with("refs/") {
            candidates.insert(0, name.to_string());
        }
        for candidate in candidates {
            if crate::refs::validate_ref_name(&candidate).is_err() {
                continue;
            }
            if candidate == HEAD || self.refs.read(&candidate)?.is_some() {
                return match self.refs.resolve(&candidate)? {
                    Resolved::Commit(id) => Ok(id),
                    Resolved::Unborn(branch) => Err(Error::InvalidRefName(format!(
                        "{} does not point at a commit yet",
                        branch
                    ))),
                };
            }
        }
        self.objects.resolve_prefix(name)
    }

    /// Start a new branch at the current HEAD commit
    pub fn create_branch(&self, branch: &str) -> Result<ObjectId> {
        let Resolved::Commit(id) = self.refs.head()? else {
            return Err(Error::InvalidRefName(format!(
                "cannot create {} before the first commit",
                branch
            )));
        };
        self.refs.create_branch(branch, &id)?;
        Ok(id)
    }

    /// Whether HEAD names a branch or a commit directly
    pub fn head_value(&self) -> Result<Option<RefValue>> {
        self.refs.read(HEAD)
    }
}

#[cfg(unix)]
fn file_mode(meta: &fs::Metadata) -> EntryMode {
    use std::os::unix::fs::PermissionsExt;
    if meta.permissions().mode() & 0o111 != 0 {
        EntryMode::Executable
    } else {
        EntryMode::File
    }
}

#[cfg(not(unix))]
fn file_mode(_meta: &fs::Metadata) -> EntryMode {
    EntryMode::File
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn author(t: i64) -> Signature {
        Signature::new("Tester", "tester@example.com", t, 0)
    }

    #[test]
    fn test_init_layout() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        assert!(repo.root().join("objects").is_dir());
        assert!(repo.root().join("refs/heads").is_dir());
        let head = fs::read_to_string(repo.root().join("HEAD")).unwrap();
        assert_eq!(head.trim(), "ref: refs/heads/main");
        assert_eq!(repo.head().unwrap(), Resolved::Unborn("refs/heads/main".into()));
        assert!(repo.read_index().unwrap().is_empty());
    }

    #[test]
    fn test_open_non_repository() {
        let tmp = TempDir::new().unwrap();
        assert!(matches!(Repository::open(tmp.path()), Err(Error::NotARepository(_))));
    }

    #[test]
    fn test_commit_requires_staged_entries() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        assert!(matches!(repo.commit("empty", &author(1)), Err(Error::NothingStaged)));
    }

    #[test]
    fn test_nested_write_tree() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        repo.stage_bytes("src/lib.rs", b"pub fn f() {}", EntryMode::File).unwrap();
        repo.stage_bytes("src/bin/main.rs", b"fn main() {}", EntryMode::File).unwrap();
        repo.stage_bytes("README", b"hi", EntryMode::File).unwrap();

        let root = repo.objects().get_tree(&repo.write_tree().unwrap()).unwrap();
        let names: Vec<_> = root.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["README", "src"]);

        let src = root.get("src").unwrap();
        assert_eq!(src.mode, EntryMode::Tree);
        let src = repo.objects().get_tree(&src.id).unwrap();
        let names: Vec<_> = src.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, ["bin", "lib.rs"]);
    }

    #[test]
    fn test_commit_moves_branch() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        repo.stage_bytes("a.txt", b"a", EntryMode::File).unwrap();
        let first = repo.commit("first", &author(1)).unwrap();
        assert_eq!(repo.refs().resolve("refs/heads/main").unwrap(), Resolved::Commit(first));

        repo.stage_bytes("b.txt", b"b", EntryMode::File).unwrap();
        let second = repo.commit("second", &author(2)).unwrap();
        let commit = repo.objects().get_commit(&second).unwrap();
        assert_eq!(commit.parent, Some(first));
        assert_eq!(commit.message, "second\n");
        assert_eq!(repo.head().unwrap(), Resolved::Commit(second));
    }

    #[test]
    fn test_commit_on_detached_head() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        repo.stage_bytes("a.txt", b"a", EntryMode::File).unwrap();
        let first = repo.commit("first", &author(1)).unwrap();
        repo.refs().update(HEAD, &first).unwrap();

        repo.stage_bytes("a.txt", b"changed", EntryMode::File).unwrap();
        let second = repo.commit("detached", &author(2)).unwrap();
        assert_eq!(repo.head_value().unwrap(), Some(RefValue::Direct(second)));
        assert_eq!(repo.rev_parse("main").unwrap(), first);
    }

    #[test]
    fn test_stage_from_worktree() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        fs::create_dir_all(tmp.path().join("dir/sub")).unwrap();
        fs::write(tmp.path().join("dir/one.txt"), "one").unwrap();
        fs::write(tmp.path().join("dir/sub/two.txt"), "two").unwrap();

        let staged = repo.stage("dir").unwrap();
        let paths: Vec<_> = staged.iter().map(|e| e.path.as_str()).collect();
        assert_eq!(paths, ["dir/one.txt", "dir/sub/two.txt"]);
        assert_eq!(staged[0].meta.size, 3);

        fs::remove_file(tmp.path().join("dir/one.txt")).unwrap();
        assert!(repo.stage("dir/one.txt").unwrap().is_empty());
        let paths: Vec<_> = repo.read_index().unwrap().into_iter().map(|e| e.path).collect();
        assert_eq!(paths, ["dir/sub/two.txt"]);

        assert!(matches!(repo.stage("nope.txt"), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_stage_worktree_root_skips_repo_dir() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        fs::write(tmp.path().join("top.txt"), "top").unwrap();
        let staged = repo.stage(".").unwrap();
        assert_eq!(staged.len(), 1);
        assert_eq!(staged[0].path, "top.txt");
    }

    #[cfg(unix)]
    #[test]
    fn test_stage_executable_and_symlink() {
        use std::os::unix::fs::PermissionsExt;
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let script = tmp.path().join("run.sh");
        fs::write(&script, "#!/bin/sh\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();
        std::os::unix::fs::symlink("run.sh", tmp.path().join("link")).unwrap();

        assert_eq!(repo.stage("run.sh").unwrap()[0].mode, EntryMode::Executable);
        let link = &repo.stage("link").unwrap()[0];
        assert_eq!(link.mode, EntryMode::Symlink);
        assert_eq!(repo.objects().get_blob(&link.id).unwrap().data, b"run.sh");
    }

    #[test]
    fn test_stage_rejects_outside_paths() {
        let tmp = TempDir::new().unwrap();
        let other = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        fs::write(other.path().join("x"), "x").unwrap();
        assert!(matches!(repo.stage(other.path().join("x")), Err(Error::InvalidPath(_))));
        assert!(matches!(repo.stage(".kit/HEAD"), Err(Error::InvalidPath(_))));
    }

    #[test]
    fn test_unstage() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        repo.stage_bytes("d/a", b"a", EntryMode::File).unwrap();
        repo.stage_bytes("d/b", b"b", EntryMode::File).unwrap();
        repo.stage_bytes("e", b"e", EntryMode::File).unwrap();
        assert_eq!(repo.unstage("d").unwrap(), 2);
        assert_eq!(repo.read_index().unwrap().len(), 1);
    }

    #[test]
    fn test_write_index_checks_objects() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let entry = IndexEntry {
            path: "ghost".into(),
            id: ObjectId::new([3; 20]),
            mode: EntryMode::File,
            meta: EntryMeta::default(),
        };
        assert!(matches!(repo.write_index(&[entry]), Err(Error::ObjectNotFound(_))));
    }

    #[test]
    fn test_hash_object_write() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let dry = repo.hash_object(b"data", ObjectKind::Blob, false).unwrap();
        assert!(!repo.objects().exists(&dry));
        let stored = repo.hash_object(b"data", ObjectKind::Blob, true).unwrap();
        assert_eq!(dry, stored);
        assert!(repo.objects().exists(&stored));
        assert!(matches!(
            repo.hash_object(b"not a commit", ObjectKind::Commit, true),
            Err(Error::MalformedObject(_))
        ));
    }

    #[test]
    fn test_hash_object_rejects_dangling_references() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let ghost = ObjectId::new([7; 20]);

        let tree = Tree::from_entries([TreeEntry::new(EntryMode::File, "f", ghost)]).unwrap();
        assert!(matches!(
            repo.hash_object(&tree.serialize(), ObjectKind::Tree, true),
            Err(Error::ObjectNotFound(id)) if id == ghost
        ));
        assert!(!repo.objects().exists(&tree.id()));

        let commit = Commit::new(ghost, Some(ghost), author(1), "m\n".into());
        assert!(matches!(
            repo.hash_object(&commit.serialize(), ObjectKind::Commit, true),
            Err(Error::ObjectNotFound(_))
        ));
        assert!(repo.objects().ids().unwrap().is_empty());

        let blob = repo.hash_object(b"f", ObjectKind::Blob, true).unwrap();
        let tree = Tree::from_entries([TreeEntry::new(EntryMode::File, "f", blob)]).unwrap();
        let tree_id = repo.hash_object(&tree.serialize(), ObjectKind::Tree, true).unwrap();
        let commit = Commit::new(tree_id, None, author(1), "m\n".into());
        let commit_id = repo.hash_object(&commit.serialize(), ObjectKind::Commit, true).unwrap();
        assert_eq!(repo.objects().get_commit(&commit_id).unwrap(), commit);
    }

    #[test]
    fn test_commit_with_out_of_range_offset_reads_back() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        repo.stage_bytes("f", b"f", EntryMode::File).unwrap();
        let wild = Signature {
            name: "a".into(),
            email: "b@c".into(),
            time: 1,
            offset_minutes: 6000,
        };
        let id = repo.commit("m", &wild).unwrap();
        let commit = repo.objects().get_commit(&id).unwrap();
        assert_eq!(commit.author.offset_minutes, crate::object::MAX_OFFSET_MINUTES);
        assert_eq!(repo.log().unwrap().count(), 1);
        assert!(repo.log().unwrap().all(|r| r.is_ok()));
    }

    #[test]
    fn test_write_index_rejects_bad_paths() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        let id = repo.hash_object(b"x", ObjectKind::Blob, true).unwrap();
        for bad in ["a//b", ".kit/HEAD"] {
            let entry = IndexEntry {
                path: bad.into(),
                id,
                mode: EntryMode::File,
                meta: EntryMeta::default(),
            };
            assert!(matches!(repo.write_index(&[entry]), Err(Error::InvalidPath(_))));
        }
        assert!(repo.read_index().unwrap().is_empty());
    }

    #[test]
    fn test_unstage_worktree_root_clears_index() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        repo.stage_bytes("a", b"a", EntryMode::File).unwrap();
        repo.stage_bytes("d/b", b"b", EntryMode::File).unwrap();
        assert_eq!(repo.unstage("").unwrap(), 2);
        assert!(repo.read_index().unwrap().is_empty());

        repo.stage_bytes("a", b"a", EntryMode::File).unwrap();
        assert_eq!(repo.unstage(".").unwrap(), 1);
        assert_eq!(repo.unstage(".").unwrap(), 0);
    }

    #[test]
    fn test_rev_parse_ignores_repository_files() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        repo.stage_bytes("f", b"f", EntryMode::File).unwrap();
        repo.commit("c", &author(1)).unwrap();
        assert!(repo.index_path().is_file());

        for name in ["index", "config.json", "objects"] {
            assert!(
                matches!(repo.rev_parse(name), Err(Error::InvalidObjectId(_))),
                "{} should not resolve",
                name
            );
        }
    }

    #[test]
    fn test_rev_parse_and_branches() {
        let tmp = TempDir::new().unwrap();
        let repo = Repository::init(tmp.path()).unwrap();
        assert!(repo.rev_parse("HEAD").is_err());
        assert!(repo.create_branch("topic").is_err());

        repo.stage_bytes("f", b"f", EntryMode::File).unwrap();
        let id = repo.commit("c", &author(5)).unwrap();
        assert_eq!(repo.rev_parse("HEAD").unwrap(), id);
        assert_eq!(repo.rev_parse("main").unwrap(), id);
        assert_eq!(repo.rev_parse("refs/heads/main").unwrap(), id);
        assert_eq!(repo.rev_parse(&id.to_hex()[..10]).unwrap(), id);

        assert_eq!(repo.create_branch("topic").unwrap(), id);
        assert_eq!(repo.rev_parse("topic").unwrap(), id);
        assert_eq!(repo.refs().current_branch().unwrap().as_deref(), Some("main"));
    }
}
