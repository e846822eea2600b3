//! Subcommand handlers
//!
//! Each handler receives the invocation context explicitly and writes its
//! normal output to `out`; diagnostics go through tracing.

use anyhow::{bail, Context as _, Result};
use chrono::{DateTime, FixedOffset};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use kit_core::{
    hash_object as hash_bytes, Object, ObjectKind, RepoConfig, Repository, Signature, Tree,
    HEAD, REPO_DIR_NAME,
};

use crate::{CatMode, IdentityArgs};

/// Where the command was started
pub struct Context {
    dir: PathBuf,
}

impl Context {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    /// The repository containing the start directory
    pub fn repo(&self) -> Result<Repository> {
        Ok(Repository::discover(&self.dir)?)
    }

    /// Absolute form of a user-supplied path. The final component is not
    /// resolved so symlinks and deleted files keep their own name.
    fn resolve(&self, path: &Path) -> Result<PathBuf> {
        let base = fs::canonicalize(&self.dir)
            .with_context(|| format!("cannot access {}", self.dir.display()))?;
        let joined = base.join(path);
        match (joined.parent(), joined.file_name()) {
            (Some(parent), Some(name)) => Ok(fs::canonicalize(parent)
                .with_context(|| format!("cannot access {}", parent.display()))?
                .join(name)),
            _ => fs::canonicalize(&joined)
                .with_context(|| format!("cannot access {}", joined.display())),
        }
    }
}

pub fn init(ctx: &Context, out: &mut impl Write) -> Result<()> {
    fs::create_dir_all(&ctx.dir)
        .with_context(|| format!("cannot create {}", ctx.dir.display()))?;
    let existed = ctx.dir.join(REPO_DIR_NAME).join(HEAD).is_file();
    let repo = Repository::init(&ctx.dir)?;
    if existed {
        writeln!(out, "Reinitialized existing kit repository in {}", repo.root().display())?;
    } else {
        writeln!(out, "Initialized empty kit repository in {}", repo.root().display())?;
    }
    Ok(())
}

pub fn add(ctx: &Context, paths: &[PathBuf], _out: &mut impl Write) -> Result<()> {
    let repo = ctx.repo()?;
    for path in paths {
        let staged = repo
            .stage(ctx.resolve(path)?)
            .with_context(|| format!("cannot add {}", path.display()))?;
        tracing::debug!("{}: {} entries staged", path.display(), staged.len());
    }
    Ok(())
}

pub fn unstage(ctx: &Context, paths: &[PathBuf], _out: &mut impl Write) -> Result<()> {
    let repo = ctx.repo()?;
    for path in paths {
        let abs = ctx.resolve(path)?;
        let rel = abs
            .strip_prefix(repo.worktree())
            .ok()
            .and_then(Path::to_str)
            .with_context(|| format!("{} is outside the worktree", path.display()))?;
        if repo.unstage(rel)? == 0 {
            bail!("{} did not match any staged path", path.display());
        }
    }
    Ok(())
}

/// Identity for a new commit: flags and environment first, then config.json
pub fn resolve_identity(args: &IdentityArgs, config: &RepoConfig) -> Result<Signature> {
    let fallback = config.author.as_ref();
    let name = args
        .author_name
        .clone()
        .or_else(|| fallback.map(|a| a.name.clone()))
        .context("no author name: pass --author-name, set KIT_AUTHOR_NAME or add an author to config.json")?;
    let email = args
        .author_email
        .clone()
        .or_else(|| fallback.map(|a| a.email.clone()))
        .context("no author email: pass --author-email, set KIT_AUTHOR_EMAIL or add an author to config.json")?;
    Ok(Signature::now(&name, &email))
}

pub fn commit(
    ctx: &Context,
    message: &str,
    identity: &IdentityArgs,
    out: &mut impl Write,
) -> Result<()> {
    let repo = ctx.repo()?;
    let author = resolve_identity(identity, repo.config())?;
    let id = repo.commit(message, &author)?;

    let label = repo
        .refs()
        .current_branch()?
        .unwrap_or_else(|| "detached HEAD".to_string());
    let commit = repo.objects().get_commit(&id)?;
    let root = if commit.is_root() { " (root-commit)" } else { "" };
    writeln!(out, "[{}{} {}] {}", label, root, id.short(), commit.summary())?;
    Ok(())
}

fn format_date(sig: &Signature) -> String {
    let when: Option<DateTime<FixedOffset>> = sig.datetime();
    when.map(|d| d.format("%a %b %e %H:%M:%S %Y %z").to_string())
        .unwrap_or_else(|| sig.time.to_string())
}

pub fn log(
    ctx: &Context,
    max_count: Option<usize>,
    oneline: bool,
    out: &mut impl Write,
) -> Result<()> {
    let repo = ctx.repo()?;
    for item in repo.log()?.take(max_count.unwrap_or(usize::MAX)) {
        let (id, commit) = item?;
        if oneline {
            writeln!(out, "{} {}", id.short(), commit.summary())?;
            continue;
        }
        writeln!(out, "commit {}", id)?;
        writeln!(out, "Author: {} <{}>", commit.author.name, commit.author.email)?;
        writeln!(out, "Date:   {}", format_date(&commit.author))?;
        writeln!(out)?;
        for line in commit.message.lines() {
            writeln!(out, "    {}", line)?;
        }
        writeln!(out)?;
    }
    Ok(())
}

pub fn hash_object(
    ctx: &Context,
    file: &Path,
    kind: &str,
    write: bool,
    out: &mut impl Write,
) -> Result<()> {
    let kind: ObjectKind = kind.parse()?;
    let path = ctx.dir.join(file);
    let data = fs::read(&path).with_context(|| format!("cannot read {}", path.display()))?;

    let id = if write {
        ctx.repo()?.hash_object(&data, kind, true)?
    } else {
        hash_bytes(&data, kind)
    };
    writeln!(out, "{}", id)?;
    Ok(())
}

fn print_tree(tree: &Tree, out: &mut impl Write) -> Result<()> {
    for entry in tree.iter() {
        writeln!(
            out,
            "{:0>6} {} {}\t{}",
            entry.mode.as_str(),
            entry.mode.object_kind(),
            entry.id,
            entry.name
        )?;
    }
    Ok(())
}

pub fn cat_file(ctx: &Context, mode: &CatMode, object: &str, out: &mut impl Write) -> Result<()> {
    let repo = ctx.repo()?;
    let id = repo.rev_parse(object)?;
    let object = repo.objects().get(&id)?;

    if mode.kind {
        writeln!(out, "{}", object.kind())?;
    } else if mode.size {
        writeln!(out, "{}", object.serialize().len())?;
    } else {
        match &object {
            Object::Blob(blob) => out.write_all(&blob.data)?,
            Object::Tree(tree) => print_tree(tree, out)?,
            Object::Commit(commit) => out.write_all(&commit.serialize())?,
        }
    }
    Ok(())
}

pub fn write_tree(ctx: &Context, out: &mut impl Write) -> Result<()> {
    let repo = ctx.repo()?;
    writeln!(out, "{}", repo.write_tree()?)?;
    Ok(())
}

pub fn ls_files(ctx: &Context, stage: bool, out: &mut impl Write) -> Result<()> {
    let repo = ctx.repo()?;
    for entry in repo.read_index()? {
        if stage {
            writeln!(out, "{} {} 0\t{}", entry.mode, entry.id, entry.path)?;
        } else {
            writeln!(out, "{}", entry.path)?;
        }
    }
    Ok(())
}

pub fn branch(ctx: &Context, name: Option<&str>, out: &mut impl Write) -> Result<()> {
    let repo = ctx.repo()?;
    if let Some(name) = name {
        let id = repo.create_branch(name)?;
        tracing::info!("created branch {} at {}", name, id.short());
        return Ok(());
    }

    let current = repo.refs().current_branch()?;
    for (branch, _) in repo.refs().branches()? {
        let marker = if current.as_deref() == Some(branch.as_str()) { '*' } else { ' ' };
        writeln!(out, "{} {}", marker, branch)?;
    }
    Ok(())
}

pub fn rev_parse(ctx: &Context, name: &str, out: &mut impl Write) -> Result<()> {
    let repo = ctx.repo()?;
    writeln!(out, "{}", repo.rev_parse(name)?)?;
    Ok(())
}
