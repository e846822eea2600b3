//! Commit history traversal
//!
//! [`History`] walks the parent chain lazily: each call to `next` loads one
//! commit from the object store. Nothing is cached, so starting a new walk
//! always reflects what is on disk.

use crate::error::Result;
use crate::object::{Commit, ObjectId};
use crate::storage::ObjectStore;

/// Iterator over a commit and its ancestors, newest first
pub struct History<'a> {
    store: &'a ObjectStore,
    next: Option<ObjectId>,
}

impl<'a> History<'a> {
    pub fn new(store: &'a ObjectStore, start: Option<ObjectId>) -> Self {
        Self { store, next: start }
    }
}

impl Iterator for History<'_> {
    type Item = Result<(ObjectId, Commit)>;

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next.take()?;
        match self.store.get_commit(&id) {
            Ok(commit) => {
                self.next = commit.parent;
                Some(Ok((id, commit)))
            }
            // A missing ancestor ends the walk with the error; `next` stays None.
            Err(e) => Some(Err(e)),
        }
    }
}

impl std::iter::FusedIterator for History<'_> {}

/// Walk the history starting at `start`
pub fn walk(store: &ObjectStore, start: ObjectId) -> History<'_> {
    History::new(store, Some(start))
}
